use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::artifacts::{
    DEFAULT_DYNAMIC_NGRAM, DEFAULT_SANDBOX_SUFFIX, DEFAULT_STRING_NGRAM,
};
use crate::constants::folds::{DEFAULT_N_SPLITS, DEFAULT_SEED};
use crate::errors::CorpusError;
use crate::normalize::GroupNameStyle;

/// What to do when two rows give one sample hash different group labels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictPolicy {
    /// Keep the label seen first; the conflict is still reported.
    FirstWins,
    /// Relabel with the most recent row; the conflict is still reported.
    LastWins,
    /// Treat the conflicting row as a row error.
    #[default]
    Reject,
}

/// What to do with a row that fails validation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowErrorPolicy {
    /// Stop ingestion and return the error.
    #[default]
    Abort,
    /// Record the error in the ingest report and continue.
    Skip,
}

/// Ingestion behavior for one `CorpusBuilder` run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Resolve comma-joined actor fields through the alias map.
    pub alias_aware: bool,
    /// Canonicalization style for group and alias names.
    pub group_style: GroupNameStyle,
    /// Label-conflict handling.
    pub conflict_policy: ConflictPolicy,
    /// Row validation failure handling. Structural errors always abort.
    pub row_errors: RowErrorPolicy,
}

impl IngestConfig {
    pub fn with_alias_aware(mut self, alias_aware: bool) -> Self {
        self.alias_aware = alias_aware;
        self
    }

    pub fn with_group_style(mut self, style: GroupNameStyle) -> Self {
        self.group_style = style;
        self
    }

    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }

    pub fn with_row_errors(mut self, policy: RowErrorPolicy) -> Self {
        self.row_errors = policy;
        self
    }
}

/// Stratified fold settings.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct FoldConfig {
    /// Number of folds (`k`); labels with fewer samples are excluded.
    pub n_splits: u32,
    /// Shuffle seed.
    pub seed: u64,
}

impl Default for FoldConfig {
    fn default() -> Self {
        Self {
            n_splits: DEFAULT_N_SPLITS,
            seed: DEFAULT_SEED,
        }
    }
}

impl FoldConfig {
    /// Validate that at least two folds are requested.
    pub fn validated(self) -> Result<Self, CorpusError> {
        if self.n_splits < 2 {
            return Err(CorpusError::Configuration(format!(
                "n_splits must be at least 2, got {}",
                self.n_splits
            )));
        }
        Ok(self)
    }
}

/// How the hash component of artifact paths is spelled on disk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashCase {
    #[default]
    Upper,
    Lower,
}

/// Artifact extraction settings shared by all parsers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Root of the `<prefix>/<hash>/` sample folder layout.
    pub sample_folder: PathBuf,
    /// Hash spelling used when deriving artifact paths.
    pub path_case: HashCase,
    /// Character n-gram size for user strings.
    pub string_ngram: usize,
    /// Character n-gram size for dynamic-behavior channels.
    pub dynamic_ngram: usize,
    /// Sandbox report suffix (`<hash>_<suffix>.json`).
    pub sandbox_suffix: String,
    /// Worker threads for extraction; `0` uses the rayon default.
    pub threads: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            sample_folder: PathBuf::from("samples"),
            path_case: HashCase::default(),
            string_ngram: DEFAULT_STRING_NGRAM,
            dynamic_ngram: DEFAULT_DYNAMIC_NGRAM,
            sandbox_suffix: DEFAULT_SANDBOX_SUFFIX.to_string(),
            threads: 0,
        }
    }
}

impl ExtractionConfig {
    pub fn new(sample_folder: impl Into<PathBuf>) -> Self {
        Self {
            sample_folder: sample_folder.into(),
            ..Self::default()
        }
    }

    pub fn with_string_ngram(mut self, n: usize) -> Self {
        self.string_ngram = n;
        self
    }

    pub fn with_dynamic_ngram(mut self, n: usize) -> Self {
        self.dynamic_ngram = n;
        self
    }

    pub fn with_path_case(mut self, case: HashCase) -> Self {
        self.path_case = case;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Validate n-gram sizes.
    pub fn validated(self) -> Result<Self, CorpusError> {
        if self.string_ngram == 0 || self.dynamic_ngram == 0 {
            return Err(CorpusError::Configuration(
                "n-gram sizes must be positive".into(),
            ));
        }
        Ok(self)
    }
}
