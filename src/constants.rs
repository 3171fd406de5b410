/// Constants used by row sources and dataset profiles.
pub mod source {
    /// Country substrings excluded by the APTClass profile.
    pub const APTCLASS_EXCLUDED_COUNTRIES: &[&str] = &[
        "unknown",
        ",",
        "no_linked_nation",
        "Iran Israel",
        "North Korea South Korea",
        "NATO",
        "China Iran",
        "Russia Ukraine",
    ];
    /// Actor substrings excluded by the APTClass profile.
    pub const APTCLASS_EXCLUDED_GROUPS: &[&str] = &["unknown"];
    /// Status substrings excluded by the cyber-research profile.
    pub const CYBER_RESEARCH_EXCLUDED_STATUS: &[&str] = &["X"];
    /// File types retained by the cyber-research profile.
    pub const CYBER_RESEARCH_FILE_TYPES: &[&str] = &[
        "Win16 EXE",
        "Win32 EXE",
        "Win32 DLL",
        "Windows Installer",
        "DOS EXE",
    ];
    /// Column header for the parent hash in a children manifest.
    pub const MANIFEST_PARENT_COLUMN: &str = "parent_sha256";
    /// Column header for the child hash in a children manifest.
    pub const MANIFEST_CHILD_COLUMN: &str = "child_sha256";
}

/// Constants used by ingestion and alias resolution.
pub mod ingestion {
    /// Separator between aliases inside one actor field.
    pub const ALIAS_SEPARATOR: char = ',';
    /// Separator between report hashes inside one report-hash field.
    pub const REPORT_HASH_SEPARATOR: char = ',';
    /// Prefix collapsed by the `CollapseAptPrefix` group-name style.
    pub const APT_PREFIX_SPACED: &str = "APT_";
    /// Replacement for `APT_PREFIX_SPACED`.
    pub const APT_PREFIX: &str = "APT";
}

/// Constants used by stratified fold assignment.
pub mod folds {
    /// Default number of stratified folds.
    pub const DEFAULT_N_SPLITS: u32 = 8;
    /// Default shuffle seed.
    pub const DEFAULT_SEED: u64 = 42;
}

/// Constants used by artifact parsers.
pub mod artifacts {
    /// Line marker carrying an AST node type.
    pub const AST_TYPE_MARKER: &str = "type:";
    /// File extension of disassembly trace files.
    pub const AST_EXTENSION: &str = "ast";
    /// Default sandbox report suffix (`<hash>_<suffix>.json`).
    pub const DEFAULT_SANDBOX_SUFFIX: &str = "vmray";
    /// Default n for string n-grams.
    pub const DEFAULT_STRING_NGRAM: usize = 3;
    /// Default n for dynamic-behavior n-grams.
    pub const DEFAULT_DYNAMIC_NGRAM: usize = 2;
    /// Placeholder replacing the sandbox temp directory.
    pub const TMP_PLACEHOLDER: &str = "%TMP%";
    /// Placeholder replacing the sandbox user profile directory.
    pub const USR_PLACEHOLDER: &str = "%USR%";
    /// Suffix stripped from the temp dir to derive the short profile path.
    pub const TEMP_DIR_TAIL: &str = "\\appdata\\local\\temp";
    /// Log message used when an artifact source is missing.
    pub const SKIP_MISSING_MSG: &str = "artifact source missing; unit excluded";
}

/// Constants used by persisted snapshots and feature archives.
pub mod archive {
    /// Prefix marker for bitcode-encoded payloads.
    pub const BITCODE_PREFIX: u8 = b'B';
    /// Version tag for corpus snapshot payloads.
    pub const SNAPSHOT_VERSION: u8 = 1;
    /// Version tag for feature archive payloads.
    pub const ARCHIVE_VERSION: u8 = 1;
    /// Default filename for persisted corpus snapshots.
    pub const DEFAULT_SNAPSHOT_FILENAME: &str = "corpus.bin";
    /// Default directory for corpus snapshots written by the CLI.
    pub const DEFAULT_SNAPSHOT_DIR: &str = ".apt_corpus";
}
