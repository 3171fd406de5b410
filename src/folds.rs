//! Stratified k-fold assignment.
//!
//! Labels with fewer than `k` samples are removed first (ids and labels in
//! lock-step), then every remaining label is shuffled with a seeded RNG and
//! dealt round-robin across folds `1..=k`. The round-robin offset carries
//! over from one label to the next so fold sizes stay balanced.

use std::collections::BTreeMap;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{info, warn};

use crate::config::FoldConfig;
use crate::data::{EntityKind, EntityRecord};
use crate::errors::CorpusError;
use crate::graph::CorpusGraph;
use crate::repository::CorpusRepository;
use crate::types::{EntityId, FoldId};

/// Samples that survived the minimum-class-size rule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Eligible<L> {
    pub ids: Vec<EntityId>,
    pub labels: Vec<L>,
    pub excluded_ids: Vec<EntityId>,
    /// Distinct labels that were too small, sorted.
    pub excluded_labels: Vec<L>,
}

/// Drop every sample whose label occurs fewer than `k` times.
///
/// `ids` and `labels` are parallel; relative order is preserved.
pub fn filter_eligible<L: Ord + Clone>(
    ids: &[EntityId],
    labels: &[L],
    k: u32,
) -> Result<Eligible<L>, CorpusError> {
    if ids.len() != labels.len() {
        return Err(CorpusError::Configuration(format!(
            "fold input has {} ids but {} labels",
            ids.len(),
            labels.len()
        )));
    }
    let mut counts: BTreeMap<&L, usize> = BTreeMap::new();
    for label in labels {
        *counts.entry(label).or_insert(0) += 1;
    }
    let min = k as usize;
    let mut eligible = Eligible {
        ids: Vec::with_capacity(ids.len()),
        labels: Vec::with_capacity(labels.len()),
        excluded_ids: Vec::new(),
        excluded_labels: counts
            .iter()
            .filter(|(_, count)| **count < min)
            .map(|(label, _)| (*label).clone())
            .collect(),
    };
    for (id, label) in ids.iter().zip(labels) {
        if counts.get(label).copied().unwrap_or(0) < min {
            eligible.excluded_ids.push(*id);
        } else {
            eligible.ids.push(*id);
            eligible.labels.push(label.clone());
        }
    }
    Ok(eligible)
}

/// Fold id (`1..=k`) for every position of `labels`.
///
/// Deterministic for a given label sequence and seed. Each label's members
/// are spread over `min(count, k)` distinct folds.
pub fn stratified_folds<L: Ord>(labels: &[L], k: u32, seed: u64) -> Vec<FoldId> {
    let mut by_label: BTreeMap<&L, Vec<usize>> = BTreeMap::new();
    for (position, label) in labels.iter().enumerate() {
        by_label.entry(label).or_default().push(position);
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let mut folds = vec![0; labels.len()];
    let mut offset = 0usize;
    let k = k.max(1) as usize;
    for positions in by_label.values_mut() {
        positions.shuffle(&mut rng);
        for (slot, position) in positions.iter().enumerate() {
            folds[*position] = ((offset + slot) % k) as FoldId + 1;
        }
        offset = (offset + positions.len()) % k;
    }
    folds
}

/// Result of a pure fold computation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FoldAssignment<L> {
    /// `(sample id, fold id)` in input order.
    pub assignments: Vec<(EntityId, FoldId)>,
    pub excluded_ids: Vec<EntityId>,
    pub excluded_labels: Vec<L>,
}

/// Counts describing one fold assignment pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FoldSummary {
    pub n_splits: u32,
    pub retained: usize,
    pub excluded: usize,
    pub excluded_labels: Vec<String>,
    /// Samples per fold; index 0 is fold 1.
    pub fold_sizes: Vec<usize>,
}

/// Assigns stratified folds to samples.
#[derive(Clone, Copy, Debug)]
pub struct FoldAssigner {
    config: FoldConfig,
}

impl FoldAssigner {
    pub fn new(config: FoldConfig) -> Result<Self, CorpusError> {
        Ok(Self {
            config: config.validated()?,
        })
    }

    pub fn config(&self) -> FoldConfig {
        self.config
    }

    /// Compute folds for parallel `ids` and `labels` without side effects.
    pub fn assign<L: Ord + Clone>(
        &self,
        ids: &[EntityId],
        labels: &[L],
    ) -> Result<FoldAssignment<L>, CorpusError> {
        let eligible = filter_eligible(ids, labels, self.config.n_splits)?;
        let folds = stratified_folds(&eligible.labels, self.config.n_splits, self.config.seed);
        Ok(FoldAssignment {
            assignments: eligible.ids.into_iter().zip(folds).collect(),
            excluded_ids: eligible.excluded_ids,
            excluded_labels: eligible.excluded_labels,
        })
    }

    /// Assign folds to every sample of `graph`, labeled by group name.
    ///
    /// Samples are taken in id order. Writes go through `repository` with one
    /// commit per fold. Fails without writing if any sample already has a fold.
    pub fn apply<R: CorpusRepository>(
        &self,
        graph: &mut CorpusGraph,
        repository: &mut R,
    ) -> Result<FoldSummary, CorpusError> {
        if let Some(sample) = graph.fold_assigned().next() {
            return Err(CorpusError::FoldAlreadyAssigned {
                sample_id: sample.id,
                fold_id: sample.fold_id.unwrap_or_default(),
            });
        }

        let mut ids = Vec::with_capacity(graph.samples().len());
        let mut labels = Vec::with_capacity(graph.samples().len());
        for sample in graph.samples() {
            let label = graph
                .label_name(sample)
                .ok_or(CorpusError::UnknownEntity {
                    kind: EntityKind::Group,
                    id: sample.group_id,
                })?;
            ids.push(sample.id);
            labels.push(label.to_string());
        }

        let assignment = self.assign(&ids, &labels)?;
        for label in &assignment.excluded_labels {
            info!(
                "[apt_corpus:folds] label '{}' has fewer than {} samples; excluded from folds",
                label, self.config.n_splits
            );
        }
        if assignment.assignments.is_empty() {
            warn!(
                "[apt_corpus:folds] no label has at least {} samples; nothing assigned",
                self.config.n_splits
            );
        }

        let k = self.config.n_splits;
        let mut fold_sizes = vec![0usize; k as usize];
        for fold in 1..=k {
            for (sample_id, _) in assignment
                .assignments
                .iter()
                .filter(|(_, assigned)| *assigned == fold)
            {
                let sample = graph.sample_mut(*sample_id)?;
                sample.fold_id = Some(fold);
                repository.persist(&EntityRecord::Sample(sample.clone()))?;
                fold_sizes[(fold - 1) as usize] += 1;
            }
            repository.commit()?;
        }

        let summary = FoldSummary {
            n_splits: k,
            retained: assignment.assignments.len(),
            excluded: assignment.excluded_ids.len(),
            excluded_labels: assignment.excluded_labels,
            fold_sizes,
        };
        info!(
            "[apt_corpus:folds] assigned {} samples to {} folds (excluded={}, seed={}, sizes={:?})",
            summary.retained, k, summary.excluded, self.config.seed, summary.fold_sizes
        );
        Ok(summary)
    }
}
