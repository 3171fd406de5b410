//! Vocabulary accumulation and dense feature matrices.
//!
//! Two passes: `VocabularyAccumulator` unions every extraction's keys into a
//! sorted `OrderedVocabulary`, then `FeatureMatrixBuilder` lays extractions
//! out row by row against that column order.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use chrono::Utc;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::artifacts::{ArtifactCounts, ArtifactKey};
use crate::constants::archive::{ARCHIVE_VERSION, BITCODE_PREFIX};
use crate::data::RowId;
use crate::errors::CorpusError;
use crate::repository::{decode_bitcode_payload, encode_bitcode_payload, ensure_parent_dir};

/// Union of artifact keys across extractions.
#[derive(Clone, Debug, Default)]
pub struct VocabularyAccumulator {
    keys: BTreeSet<ArtifactKey>,
}

impl VocabularyAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, counts: &ArtifactCounts) {
        self.keys.extend(counts.keys().cloned());
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Freeze into column order (channel, then token).
    pub fn finish(self) -> OrderedVocabulary {
        OrderedVocabulary::from_ordered(self.keys)
    }
}

/// Union the keys of `extractions` into a deterministic vocabulary.
pub fn accumulate<'a, I>(extractions: I) -> OrderedVocabulary
where
    I: IntoIterator<Item = &'a ArtifactCounts>,
{
    let mut accumulator = VocabularyAccumulator::new();
    for counts in extractions {
        accumulator.add(counts);
    }
    accumulator.finish()
}

/// Artifact key to column index, built once.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OrderedVocabulary {
    columns: IndexMap<ArtifactKey, usize>,
}

impl OrderedVocabulary {
    /// Vocabulary with columns in the given order; duplicates keep their first column.
    pub fn from_ordered<I>(keys: I) -> Self
    where
        I: IntoIterator<Item = ArtifactKey>,
    {
        let mut columns = IndexMap::new();
        for key in keys {
            let next = columns.len();
            columns.entry(key).or_insert(next);
        }
        Self { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column(&self, key: &ArtifactKey) -> Option<usize> {
        self.columns.get(key).copied()
    }

    /// Keys in column order.
    pub fn keys(&self) -> impl Iterator<Item = &ArtifactKey> {
        self.columns.keys()
    }

    /// Printable column labels (`channel:token` for dynamic channels).
    pub fn labels(&self) -> Vec<String> {
        self.keys().map(ToString::to_string).collect()
    }
}

/// Dense row-major matrix of artifact counts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, bitcode::Encode, bitcode::Decode)]
pub struct FeatureMatrix {
    rows: usize,
    cols: usize,
    values: Vec<f64>,
}

impl FeatureMatrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            values: vec![0.0; rows * cols],
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.values.get(row * self.cols + col).copied()
    }

    pub fn row(&self, row: usize) -> Option<&[f64]> {
        if row >= self.rows {
            return None;
        }
        let start = row * self.cols;
        self.values.get(start..start + self.cols)
    }

    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        (0..self.rows)
            .filter_map(|row| self.row(row).map(<[f64]>::to_vec))
            .collect()
    }

    fn is_consistent(&self) -> bool {
        self.values.len() == self.rows * self.cols
    }
}

/// Matrix plus the row ids and vocabulary it is aligned with.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureSet {
    pub matrix: FeatureMatrix,
    pub row_ids: Vec<RowId>,
    pub vocabulary: OrderedVocabulary,
}

/// Lays extractions out against a fixed vocabulary.
#[derive(Clone, Copy, Debug)]
pub struct FeatureMatrixBuilder<'a> {
    vocabulary: &'a OrderedVocabulary,
}

impl<'a> FeatureMatrixBuilder<'a> {
    pub fn new(vocabulary: &'a OrderedVocabulary) -> Self {
        Self { vocabulary }
    }

    /// One row per extraction, in order; keys outside the vocabulary are ignored.
    pub fn build(
        &self,
        extractions: &[ArtifactCounts],
        row_ids: &[RowId],
    ) -> Result<FeatureSet, CorpusError> {
        if extractions.len() != row_ids.len() {
            return Err(CorpusError::RowIdMismatch {
                extractions: extractions.len(),
                row_ids: row_ids.len(),
            });
        }
        let cols = self.vocabulary.len();
        let mut matrix = FeatureMatrix::zeros(extractions.len(), cols);
        let mut out_of_vocabulary = 0usize;
        for (row, counts) in extractions.iter().enumerate() {
            for (key, count) in counts {
                match self.vocabulary.column(key) {
                    Some(col) => matrix.values[row * cols + col] = *count as f64,
                    None => out_of_vocabulary += 1,
                }
            }
        }
        if out_of_vocabulary > 0 {
            debug!(
                "[apt_corpus:extract] {} artifact keys outside the vocabulary ignored",
                out_of_vocabulary
            );
        }
        Ok(FeatureSet {
            matrix,
            row_ids: row_ids.to_vec(),
            vocabulary: self.vocabulary.clone(),
        })
    }
}

/// Accumulate a vocabulary over `extractions` and build the matrix.
pub fn build_feature_set(
    extractions: &[ArtifactCounts],
    row_ids: &[RowId],
) -> Result<FeatureSet, CorpusError> {
    let vocabulary = accumulate(extractions);
    FeatureMatrixBuilder::new(&vocabulary).build(extractions, row_ids)
}

/// On-disk encoding of a feature archive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum ArchiveFormat {
    #[default]
    Bitcode,
    Json,
}

/// Self-describing export of one feature set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, bitcode::Encode, bitcode::Decode)]
pub struct FeatureArchive {
    pub version: u8,
    /// Parser that produced the rows (`ast`, `strings`, `dynamic`).
    pub extractor: String,
    pub created_at: String,
    pub matrix: FeatureMatrix,
    pub row_ids: Vec<RowId>,
    /// Column keys in matrix order.
    pub features: Vec<ArtifactKey>,
}

impl FeatureArchive {
    pub fn new(extractor: impl Into<String>, set: FeatureSet) -> Self {
        Self {
            version: ARCHIVE_VERSION,
            extractor: extractor.into(),
            created_at: Utc::now().to_rfc3339(),
            matrix: set.matrix,
            row_ids: set.row_ids,
            features: set.vocabulary.keys().cloned().collect(),
        }
    }

    /// Column labels in matrix order.
    pub fn feature_labels(&self) -> Vec<String> {
        self.features.iter().map(ToString::to_string).collect()
    }

    /// Rebuild the column index of this archive.
    pub fn vocabulary(&self) -> OrderedVocabulary {
        OrderedVocabulary::from_ordered(self.features.iter().cloned())
    }

    /// Check version and that rows, row ids, and columns agree.
    pub fn validate(&self) -> Result<(), CorpusError> {
        if self.version != ARCHIVE_VERSION {
            return Err(CorpusError::Archive(format!(
                "feature archive version mismatch (expected {}, found {})",
                ARCHIVE_VERSION, self.version
            )));
        }
        let (rows, cols) = self.matrix.shape();
        if !self.matrix.is_consistent() || rows != self.row_ids.len() || cols != self.features.len()
        {
            return Err(CorpusError::Archive(format!(
                "feature archive shape {}x{} does not match {} row ids and {} features",
                rows,
                cols,
                self.row_ids.len(),
                self.features.len()
            )));
        }
        Ok(())
    }

    pub fn to_bytes(&self, format: ArchiveFormat) -> Result<Vec<u8>, CorpusError> {
        match format {
            ArchiveFormat::Bitcode => Ok(encode_bitcode_payload(&bitcode::encode(self))),
            ArchiveFormat::Json => Ok(serde_json::to_vec_pretty(self)?),
        }
    }

    /// Decode either encoding; bitcode payloads carry a one-byte prefix.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CorpusError> {
        let archive: Self = if bytes.first() == Some(&BITCODE_PREFIX) {
            let raw = decode_bitcode_payload(bytes)?;
            bitcode::decode(raw).map_err(|err| {
                CorpusError::Archive(format!("failed to decode feature archive: {err}"))
            })?
        } else {
            serde_json::from_slice(bytes)?
        };
        archive.validate()?;
        Ok(archive)
    }

    /// Write atomically through a `.partial` staging file.
    pub fn write(&self, path: &Path, format: ArchiveFormat) -> Result<(), CorpusError> {
        self.validate()?;
        ensure_parent_dir(path)?;
        let staging = path.with_extension("partial");
        fs::write(&staging, self.to_bytes(format)?)?;
        fs::rename(&staging, path)?;
        let (rows, cols) = self.matrix.shape();
        info!(
            "[apt_corpus:extract] wrote {} archive {} ({} rows x {} features, {:?})",
            self.extractor,
            path.display(),
            rows,
            cols,
            format
        );
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self, CorpusError> {
        Self::from_bytes(&fs::read(path)?)
    }
}
