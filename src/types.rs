/// Normalized, deduplication-ready form of a free-text label.
/// Examples: `LAZARUS_GROUP`, `NORTH_KOREA`, `WIN32_EXE`
pub type CanonicalKey = String;
/// Process-local surrogate key assigned on first materialization (starts at 1).
/// Example: `17`
pub type EntityId = u64;
/// Cross-validation fold identifier in `1..=n_splits`.
/// Example: `3`
pub type FoldId = u32;
/// Raw actor field as it appears in an input row.
/// Examples: `Lazarus Group`, `Guardians of Peace, Lazarus`
pub type RawName = String;
/// Upper-cased hex digest string.
/// Example: `D41D8CD98F00B204E9800998ECF8427E`
pub type HexDigest = String;
/// Report location (file path or URL).
/// Examples: `reports/2019/op_ghost.pdf`, `https://example.org/apt-report`
pub type ReportLocation = String;
/// Single feature token produced by an artifact parser.
/// Examples: `cot`, `%tm`, `T1055`
pub type ArtifactToken = String;
/// Occurrence count for one artifact in one extraction.
pub type Count = u64;
/// Warning/log message text.
/// Example: `row 12 skipped: aliases resolve to 2 groups`
pub type LogMessage = String;
