//! Per-sample artifact parsers and parallel batch extraction.
//!
//! Ownership model:
//! - Units (row id + artifact hash) are planned up front in a fixed order.
//! - `extract_batch` fans units out over rayon and writes results back by
//!   position, so row ids and extractions stay aligned.
//! - Failed or empty extractions are dropped from the batch, never zero-filled.

use std::collections::BTreeMap;
use std::fmt;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::data::{EntityKind, RowId};
use crate::errors::CorpusError;
use crate::graph::CorpusGraph;
use crate::types::{ArtifactToken, Count, HexDigest};

/// AST node-type counter.
pub mod ast;
/// Sandbox behavior summaries.
pub mod dynamic;
/// Character n-gram vectorizer.
pub mod ngrams;
/// User-string n-grams from a document store.
pub mod strings;

pub use ast::AstParser;
pub use dynamic::DynamicParser;
pub use ngrams::CharNgramVectorizer;
pub use strings::{InMemoryStringStore, StringNgramParser, StringStore};

/// Family an artifact key was drawn from.
///
/// Declaration order is the column order of dynamic feature matrices.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    bitcode::Encode,
    bitcode::Decode,
)]
pub enum ArtifactChannel {
    AstNode,
    StringNgram,
    Files,
    Urls,
    Mutexes,
    Registries,
    Processes,
    Mitre,
}

impl ArtifactChannel {
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactChannel::AstNode => "ast",
            ArtifactChannel::StringNgram => "strings",
            ArtifactChannel::Files => "files",
            ArtifactChannel::Urls => "urls",
            ArtifactChannel::Mutexes => "mutexes",
            ArtifactChannel::Registries => "registries",
            ArtifactChannel::Processes => "processes",
            ArtifactChannel::Mitre => "mitre",
        }
    }

    /// True for sandbox-derived channels, whose labels carry a channel prefix.
    pub fn is_dynamic(self) -> bool {
        !matches!(self, ArtifactChannel::AstNode | ArtifactChannel::StringNgram)
    }
}

/// One feature column: a token within its channel.
#[derive(
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    bitcode::Encode,
    bitcode::Decode,
)]
pub struct ArtifactKey {
    pub channel: ArtifactChannel,
    pub token: ArtifactToken,
}

impl ArtifactKey {
    pub fn new(channel: ArtifactChannel, token: impl Into<ArtifactToken>) -> Self {
        Self {
            channel,
            token: token.into(),
        }
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.channel.is_dynamic() {
            write!(f, "{}:{}", self.channel.as_str(), self.token)
        } else {
            f.write_str(&self.token)
        }
    }
}

/// Sparse counts produced by one extraction.
pub type ArtifactCounts = BTreeMap<ArtifactKey, Count>;

/// One row-to-be: the row id plus the hash whose artifacts are read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractionUnit {
    pub row_id: RowId,
    /// Child hash for `(parent, child)` rows, parent hash otherwise.
    pub sha256: HexDigest,
}

/// Turns one unit into sparse artifact counts.
///
/// A missing artifact source yields `Ok` with empty counts; `Err` is reserved
/// for unreadable or malformed sources. Either way the unit is dropped by
/// `extract_batch`.
pub trait ArtifactParser: Sync {
    /// Short name used in logs and archives.
    fn name(&self) -> &'static str;

    /// Whether packed samples expand into one unit per child.
    fn expands_children(&self) -> bool {
        true
    }

    fn extract(&self, unit: &ExtractionUnit) -> Result<ArtifactCounts, CorpusError>;
}

/// Units for every fold-assigned sample, in sample id order.
///
/// With `expand_children`, a sample with children yields one `(parent, child)`
/// unit per child instead of its own `(parent, None)` unit.
pub fn plan_units(
    graph: &CorpusGraph,
    expand_children: bool,
) -> Result<Vec<ExtractionUnit>, CorpusError> {
    let mut units = Vec::new();
    for sample in graph.fold_assigned() {
        if !expand_children || sample.child_ids.is_empty() {
            units.push(ExtractionUnit {
                row_id: RowId::parent(sample.id),
                sha256: sample.sha256.clone(),
            });
            continue;
        }
        for child_id in &sample.child_ids {
            let child = graph.child(*child_id).ok_or(CorpusError::UnknownEntity {
                kind: EntityKind::Child,
                id: *child_id,
            })?;
            units.push(ExtractionUnit {
                row_id: RowId::child(sample.id, child.id),
                sha256: child.sha256.clone(),
            });
        }
    }
    Ok(units)
}

/// Unit excluded from a batch and why.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DroppedUnit {
    pub row_id: RowId,
    pub reason: String,
}

/// Aligned extraction results ready for vocabulary accumulation.
#[derive(Clone, Debug, Default)]
pub struct ExtractionBatch {
    pub row_ids: Vec<RowId>,
    pub extractions: Vec<ArtifactCounts>,
    pub dropped: Vec<DroppedUnit>,
}

impl ExtractionBatch {
    pub fn len(&self) -> usize {
        self.extractions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extractions.is_empty()
    }
}

/// Run `parser` over `units` in parallel and keep non-empty results in unit order.
///
/// `threads == 0` uses the global rayon pool.
pub fn extract_batch<P>(
    parser: &P,
    units: &[ExtractionUnit],
    threads: usize,
) -> Result<ExtractionBatch, CorpusError>
where
    P: ArtifactParser + ?Sized,
{
    info!(
        "[apt_corpus:extract] {}: extracting {} units",
        parser.name(),
        units.len()
    );
    let run = || {
        units
            .par_iter()
            .map(|unit| parser.extract(unit))
            .collect::<Vec<_>>()
    };
    let results = if threads > 0 {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|err| CorpusError::Configuration(format!("thread pool: {err}")))?;
        pool.install(run)
    } else {
        run()
    };

    let mut batch = ExtractionBatch::default();
    for (unit, result) in units.iter().zip(results) {
        match result {
            Ok(counts) if !counts.is_empty() => {
                batch.row_ids.push(unit.row_id);
                batch.extractions.push(counts);
            }
            Ok(_) => {
                debug!(
                    "[apt_corpus:extract] {}: no artifacts for {}; unit excluded",
                    parser.name(),
                    unit.sha256
                );
                batch.dropped.push(DroppedUnit {
                    row_id: unit.row_id,
                    reason: "no artifacts".into(),
                });
            }
            Err(err) => {
                warn!(
                    "[apt_corpus:extract] {}: extraction failed for {}: {}",
                    parser.name(),
                    unit.sha256,
                    err
                );
                batch.dropped.push(DroppedUnit {
                    row_id: unit.row_id,
                    reason: err.to_string(),
                });
            }
        }
    }
    info!(
        "[apt_corpus:extract] {}: {} rows kept, {} units dropped",
        parser.name(),
        batch.len(),
        batch.dropped.len()
    );
    Ok(batch)
}
