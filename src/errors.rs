use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::data::{EntityKind, HashKind};
use crate::types::{EntityId, FoldId, HexDigest};

/// Error type for ingestion, fold assignment, extraction, and persistence failures.
#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("invalid {kind}: '{value}'")]
    InvalidHash { kind: HashKind, value: String },
    #[error("report list mismatch: {paths} paths but {hashes} hashes")]
    ReportListMismatch { paths: usize, hashes: usize },
    #[error("malformed report path list: {0}")]
    MalformedReportList(String),
    #[error("sample {sha256} is labeled '{existing}' but row assigns '{incoming}'")]
    LabelConflict {
        sha256: HexDigest,
        existing: String,
        incoming: String,
    },
    #[error("sample {sample_id} already has fold {fold_id}")]
    FoldAlreadyAssigned { sample_id: EntityId, fold_id: FoldId },
    #[error("unknown {kind} id {id}")]
    UnknownEntity { kind: EntityKind, id: EntityId },
    #[error("unknown sample {0}")]
    UnknownSample(HexDigest),
    #[error("artifact source not found: {}", .0.display())]
    ArtifactMissing(PathBuf),
    #[error("no artifact document for sample {0}")]
    DocumentMissing(HexDigest),
    #[error("degenerate vectorizer input: {0}")]
    DegenerateCorpus(String),
    #[error("feature matrix shape mismatch: {extractions} extractions but {row_ids} row ids")]
    RowIdMismatch { extractions: usize, row_ids: usize },
    #[error("repository failure: {0}")]
    Repository(String),
    #[error("archive failure: {0}")]
    Archive(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("row {row}: missing column '{column}'")]
    MissingColumn { row: usize, column: &'static str },
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl CorpusError {
    /// True for errors that must abort the whole run regardless of row policy.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            CorpusError::ReportListMismatch { .. }
                | CorpusError::MalformedReportList(_)
                | CorpusError::Repository(_)
                | CorpusError::Io(_)
        )
    }
}
