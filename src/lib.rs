#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Actor alias maps and resolution.
pub mod alias;
/// Command-line runners used by the `apt-corpus` binary.
pub mod apps;
/// Artifact parsers and parallel batch extraction.
pub mod artifacts;
/// Per-run entity memoization.
pub mod cache;
/// Ingestion, fold, and extraction configuration types.
pub mod config;
/// Centralized constants used across sources, ingestion, folds, and artifacts.
pub mod constants;
/// Entity records and row identities.
pub mod data;
/// Vocabulary accumulation, feature matrices, and feature archives.
pub mod features;
/// Stratified fold assignment.
pub mod folds;
/// In-memory entity graph.
pub mod graph;
/// Hex digest validation.
pub mod hash;
/// Row-by-row corpus ingestion.
pub mod ingestion;
/// Label distribution metrics.
pub mod metrics;
/// Canonical keys for free-text labels.
pub mod normalize;
/// Persistence backends for materialized entities.
pub mod repository;
/// Row sources, dataset profiles, and row filters.
pub mod source;
/// Artifact inputs read from the filesystem.
pub mod transport;
/// Shared type aliases.
pub mod types;
/// Text normalization helpers.
pub mod utils;

mod errors;

pub use alias::{AliasMap, AliasResolution, AliasResolver};
pub use artifacts::{
    ArtifactChannel, ArtifactCounts, ArtifactKey, ArtifactParser, AstParser, DynamicParser,
    ExtractionBatch, ExtractionUnit, InMemoryStringStore, StringNgramParser, StringStore,
    extract_batch, plan_units,
};
pub use cache::{CacheStats, EntityCache};
pub use config::{
    ConflictPolicy, ExtractionConfig, FoldConfig, HashCase, IngestConfig, RowErrorPolicy,
};
pub use data::{
    Alias, Child, Country, EntityKind, EntityRecord, FileType, Group, HashKind, Report, RowId,
    Sample,
};
pub use errors::CorpusError;
pub use features::{
    ArchiveFormat, FeatureArchive, FeatureMatrix, FeatureMatrixBuilder, FeatureSet,
    OrderedVocabulary, VocabularyAccumulator, build_feature_set,
};
pub use folds::{FoldAssigner, FoldAssignment, FoldSummary, stratified_folds};
pub use graph::CorpusGraph;
pub use ingestion::{CorpusBuilder, IngestReport, RowIssue, RowOutcome, SkipReason};
pub use metrics::{LabelShare, LabelSkew, label_counts, label_skew};
pub use normalize::{GroupNameStyle, normalize};
pub use repository::{CorpusRepository, FileRepository, InMemoryRepository};
pub use source::{CsvRowSource, DatasetProfile, RawReports, RawRow, RowBatch, RowFilter};
pub use transport::SampleFolder;
pub use types::{
    ArtifactToken, CanonicalKey, Count, EntityId, FoldId, HexDigest, LogMessage, RawName,
    ReportLocation,
};
