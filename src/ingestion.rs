//! Row-by-row corpus ingestion.
//!
//! `CorpusBuilder` owns the entity cache, the graph, and the repository for a
//! single run. Every row is fully validated before anything is materialized,
//! so a rejected row never leaves partial entities behind.

use tracing::{debug, info, warn};

use crate::alias::{AliasMap, AliasResolution, AliasResolver};
use crate::cache::{CacheStats, EntityCache};
use crate::config::{ConflictPolicy, IngestConfig, RowErrorPolicy};
use crate::constants::ingestion::REPORT_HASH_SEPARATOR;
use crate::data::{EntityKind, EntityRecord, Sample};
use crate::errors::CorpusError;
use crate::graph::CorpusGraph;
use crate::hash::{validate_md5, validate_sha1, validate_sha256};
use crate::normalize::normalize;
use crate::repository::CorpusRepository;
use crate::source::{RawReports, RawRow};
use crate::types::{CanonicalKey, EntityId, HexDigest, RawName, ReportLocation};
use crate::utils::{parse_string_list_literal, split_joined};

/// Row rejected under `RowErrorPolicy::Skip`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RowIssue {
    /// Zero-based data-row index.
    pub row: usize,
    pub reason: String,
}

/// Counters describing one ingestion run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub rows_seen: usize,
    pub rows_ingested: usize,
    /// Rows whose aliases resolved to more than one group.
    pub ambiguous_alias_rows: usize,
    /// Comma-joined actor rows seen while alias resolution was disabled.
    pub multi_actor_rows: usize,
    pub invalid_rows: Vec<RowIssue>,
    /// Rows that gave an existing sample a different group, under any policy.
    pub label_conflicts: usize,
    /// Rows that repeated an already-ingested sample with the same group.
    pub duplicate_samples: usize,
    /// Rows whose country differs from the country already bound to the group.
    pub group_country_mismatches: usize,
    pub children_attached: usize,
}

impl IngestReport {
    /// Rows dropped for any reason.
    pub fn rows_skipped(&self) -> usize {
        self.rows_seen.saturating_sub(self.rows_ingested)
    }
}

/// What happened to one row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowOutcome {
    /// A new sample was created.
    Created(EntityId),
    /// The row repeated an existing sample; its reports were merged.
    Merged(EntityId),
    /// The row moved an existing sample to its group (`LastWins`).
    Relabeled(EntityId),
    /// The row was dropped without error.
    Skipped(SkipReason),
    /// The row failed validation and was recorded in the report.
    Invalid,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    AmbiguousAlias,
    MultiActor,
    /// Kept the first label (`FirstWins`).
    LabelConflict,
}

/// A row after validation, before materialization.
struct PreparedRow {
    country: CanonicalKey,
    group: CanonicalKey,
    aliases: Vec<CanonicalKey>,
    file_type: CanonicalKey,
    md5: HexDigest,
    sha1: HexDigest,
    sha256: HexDigest,
    reports: Vec<(ReportLocation, Option<HexDigest>)>,
}

/// Builds a deduplicated entity graph from raw rows.
pub struct CorpusBuilder<R: CorpusRepository> {
    config: IngestConfig,
    resolver: AliasResolver,
    cache: EntityCache,
    graph: CorpusGraph,
    repository: R,
    report: IngestReport,
}

impl<R: CorpusRepository> CorpusBuilder<R> {
    /// New builder persisting through `repository`.
    ///
    /// With `alias_aware` set and no map installed, every alias passes
    /// through unmapped.
    pub fn new(config: IngestConfig, repository: R) -> Self {
        let resolver = if config.alias_aware {
            AliasResolver::aware(AliasMap::default(), config.group_style)
        } else {
            AliasResolver::disabled(config.group_style)
        };
        Self {
            config,
            resolver,
            cache: EntityCache::new(),
            graph: CorpusGraph::new(),
            repository,
            report: IngestReport::default(),
        }
    }

    /// Enable alias resolution backed by `map`.
    pub fn with_alias_map(mut self, map: AliasMap) -> Self {
        self.config.alias_aware = true;
        self.resolver = AliasResolver::aware(map, self.config.group_style);
        self
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn graph(&self) -> &CorpusGraph {
        &self.graph
    }

    pub fn report(&self) -> &IngestReport {
        &self.report
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Ingest every row in order, stopping at the first fatal error.
    pub fn ingest_rows<I>(&mut self, rows: I) -> Result<(), CorpusError>
    where
        I: IntoIterator<Item = RawRow>,
    {
        for row in rows {
            self.ingest_row(&row)?;
        }
        Ok(())
    }

    /// Ingest a single row.
    ///
    /// Structural errors always propagate. Validation errors propagate under
    /// `RowErrorPolicy::Abort` and are recorded under `RowErrorPolicy::Skip`.
    pub fn ingest_row(&mut self, row: &RawRow) -> Result<RowOutcome, CorpusError> {
        self.report.rows_seen += 1;
        match self.try_ingest(row) {
            Ok(outcome) => {
                if matches!(
                    outcome,
                    RowOutcome::Created(_) | RowOutcome::Merged(_) | RowOutcome::Relabeled(_)
                ) {
                    self.report.rows_ingested += 1;
                }
                Ok(outcome)
            }
            Err(err) if err.is_structural() => Err(err),
            Err(err) => match self.config.row_errors {
                RowErrorPolicy::Abort => Err(err),
                RowErrorPolicy::Skip => {
                    warn!(
                        "[apt_corpus:ingest] row {} rejected: {}",
                        row.index, err
                    );
                    self.report.invalid_rows.push(RowIssue {
                        row: row.index,
                        reason: err.to_string(),
                    });
                    Ok(RowOutcome::Invalid)
                }
            },
        }
    }

    fn try_ingest(&mut self, row: &RawRow) -> Result<RowOutcome, CorpusError> {
        let (group_raw, aliases_raw) = match self.resolver.classify(&row.group) {
            AliasResolution::Resolved { group, aliases } => (group, aliases),
            AliasResolution::Conflicting { candidates } => {
                self.report.ambiguous_alias_rows += 1;
                warn!(
                    "[apt_corpus:ingest] row {} skipped: aliases '{}' resolve to {:?}",
                    row.index, row.group, candidates
                );
                return Ok(RowOutcome::Skipped(SkipReason::AmbiguousAlias));
            }
            AliasResolution::MultiActor => {
                self.report.multi_actor_rows += 1;
                warn!(
                    "[apt_corpus:ingest] row {} skipped: multi-actor field '{}' without alias resolution",
                    row.index, row.group
                );
                return Ok(RowOutcome::Skipped(SkipReason::MultiActor));
            }
            AliasResolution::Empty => {
                return Err(CorpusError::MissingColumn {
                    row: row.index,
                    column: "group",
                });
            }
        };

        let prepared = self.prepare(row, &group_raw, &aliases_raw)?;

        let existing = self
            .graph
            .sample_by_sha256(&prepared.sha256)
            .map(|sample| (sample.id, sample.group_id));
        let mut relabel = false;
        if let Some((_, group_id)) = existing {
            let existing_label = self
                .graph
                .group(group_id)
                .map(|group| group.name.clone())
                .unwrap_or_default();
            if existing_label != prepared.group {
                self.report.label_conflicts += 1;
                warn!(
                    "[apt_corpus:ingest] label conflict for {} at row {}: '{}' vs '{}' (policy={:?})",
                    prepared.sha256,
                    row.index,
                    existing_label,
                    prepared.group,
                    self.config.conflict_policy
                );
                match self.config.conflict_policy {
                    ConflictPolicy::Reject => {
                        return Err(CorpusError::LabelConflict {
                            sha256: prepared.sha256,
                            existing: existing_label,
                            incoming: prepared.group,
                        });
                    }
                    ConflictPolicy::FirstWins => {
                        return Ok(RowOutcome::Skipped(SkipReason::LabelConflict));
                    }
                    ConflictPolicy::LastWins => relabel = true,
                }
            }
        }

        let group_id = self.materialize_group(&prepared, row.index)?;
        let file_type_id = self.materialize_named(EntityKind::FileType, &prepared.file_type)?;
        let mut report_ids = Vec::with_capacity(prepared.reports.len());
        for (location, sha256) in &prepared.reports {
            let id = self.materialize_report(location, sha256.as_ref())?;
            if !report_ids.contains(&id) {
                report_ids.push(id);
            }
        }

        match existing {
            None => {
                let sample = Sample {
                    id: 0,
                    md5: prepared.md5,
                    sha1: prepared.sha1,
                    sha256: prepared.sha256,
                    group_id,
                    file_type_id,
                    report_ids,
                    child_ids: Vec::new(),
                    fold_id: None,
                };
                let cache_key = sample.sha256.clone();
                let graph = &mut self.graph;
                let repository = &mut self.repository;
                let id = self.cache.get_or_create(EntityKind::Sample, &cache_key, || {
                    let id = graph.insert_sample(sample);
                    persist_sample(graph, repository, id)?;
                    Ok(id)
                })?;
                Ok(RowOutcome::Created(id))
            }
            Some((sample_id, _)) => {
                let sample = self.graph.sample_mut(sample_id)?;
                let mut changed = false;
                for report_id in report_ids {
                    if !sample.report_ids.contains(&report_id) {
                        sample.report_ids.push(report_id);
                        changed = true;
                    }
                }
                if relabel {
                    sample.group_id = group_id;
                    changed = true;
                }
                if changed {
                    persist_sample(&self.graph, &mut self.repository, sample_id)?;
                }
                if relabel {
                    Ok(RowOutcome::Relabeled(sample_id))
                } else {
                    self.report.duplicate_samples += 1;
                    debug!(
                        "[apt_corpus:ingest] row {} repeats sample {}",
                        row.index, sample_id
                    );
                    Ok(RowOutcome::Merged(sample_id))
                }
            }
        }
    }

    /// Validate hashes and report lists and compute every canonical key.
    fn prepare(
        &self,
        row: &RawRow,
        group_raw: &str,
        aliases_raw: &[RawName],
    ) -> Result<PreparedRow, CorpusError> {
        let reports = match &row.reports {
            RawReports::Listed { paths, hashes } => {
                let paths = parse_string_list_literal(paths)?;
                let hashes = split_joined(hashes, REPORT_HASH_SEPARATOR);
                if paths.len() != hashes.len() {
                    return Err(CorpusError::ReportListMismatch {
                        paths: paths.len(),
                        hashes: hashes.len(),
                    });
                }
                paths
                    .into_iter()
                    .zip(hashes)
                    .map(|(path, hash)| -> Result<_, CorpusError> {
                        Ok((path, Some(validate_sha256(hash)?)))
                    })
                    .collect::<Result<Vec<_>, _>>()?
            }
            RawReports::Url(url) if !url.trim().is_empty() => {
                vec![(url.trim().to_string(), None)]
            }
            RawReports::Url(_) | RawReports::None => Vec::new(),
        };

        let style = self.config.group_style;
        let group = style.canonical(group_raw);
        if group.is_empty() {
            return Err(CorpusError::MissingColumn {
                row: row.index,
                column: "group",
            });
        }
        let mut aliases = Vec::new();
        if self.resolver.is_alias_aware() {
            for alias in aliases_raw {
                let key = style.canonical(alias);
                if !key.is_empty() && key != group && !aliases.contains(&key) {
                    aliases.push(key);
                }
            }
        }

        Ok(PreparedRow {
            country: normalize(&row.country),
            group,
            aliases,
            file_type: normalize(&row.file_type),
            md5: validate_md5(&row.md5)?,
            sha1: validate_sha1(&row.sha1)?,
            sha256: validate_sha256(&row.sha256)?,
            reports,
        })
    }

    fn materialize_group(
        &mut self,
        prepared: &PreparedRow,
        row_index: usize,
    ) -> Result<EntityId, CorpusError> {
        let country_id = if prepared.country.is_empty() {
            None
        } else {
            Some(self.materialize_named(EntityKind::Country, &prepared.country)?)
        };

        let graph = &mut self.graph;
        let repository = &mut self.repository;
        let group_id = self
            .cache
            .get_or_create(EntityKind::Group, &prepared.group, || {
                let id = graph.insert_group(prepared.group.clone(), country_id);
                if let Some(group) = graph.group(id) {
                    repository.persist(&EntityRecord::Group(group.clone()))?;
                }
                Ok(id)
            })?;

        let bound_country = self.graph.group(group_id).and_then(|group| group.country_id);
        if bound_country != country_id {
            self.report.group_country_mismatches += 1;
            warn!(
                "[apt_corpus:ingest] row {} places group '{}' in country '{}' but it is bound to {:?}",
                row_index,
                prepared.group,
                prepared.country,
                bound_country.and_then(|id| self.graph.country(id)).map(|c| c.name.as_str())
            );
        }

        for alias in &prepared.aliases {
            let graph = &mut self.graph;
            let repository = &mut self.repository;
            self.cache.get_or_create(EntityKind::Alias, alias, || {
                let id = graph.insert_alias(alias.clone(), group_id);
                if let Some(entity) = graph.alias(id) {
                    repository.persist(&EntityRecord::Alias(entity.clone()))?;
                }
                Ok(id)
            })?;
        }
        Ok(group_id)
    }

    /// Get-or-create a country or file type by canonical name.
    fn materialize_named(
        &mut self,
        kind: EntityKind,
        key: &CanonicalKey,
    ) -> Result<EntityId, CorpusError> {
        let graph = &mut self.graph;
        let repository = &mut self.repository;
        self.cache.get_or_create(kind, key, || {
            let record = match kind {
                EntityKind::Country => {
                    let id = graph.insert_country(key.clone());
                    graph.country(id).cloned().map(EntityRecord::Country)
                }
                _ => {
                    let id = graph.insert_file_type(key.clone());
                    graph.file_type(id).cloned().map(EntityRecord::FileType)
                }
            };
            let record = record.ok_or_else(|| {
                CorpusError::Repository(format!("{kind} '{key}' vanished after insert"))
            })?;
            repository.persist(&record)?;
            Ok(record.id())
        })
    }

    fn materialize_report(
        &mut self,
        location: &ReportLocation,
        sha256: Option<&HexDigest>,
    ) -> Result<EntityId, CorpusError> {
        let key = sha256.cloned().unwrap_or_else(|| location.clone());
        let graph = &mut self.graph;
        let repository = &mut self.repository;
        self.cache.get_or_create(EntityKind::Report, &key, || {
            let id = graph.insert_report(location.clone(), sha256.cloned());
            if let Some(report) = graph.report(id) {
                repository.persist(&EntityRecord::Report(report.clone()))?;
            }
            Ok(id)
        })
    }

    /// Link an unpacked child to an already-ingested parent sample.
    ///
    /// Attaching the same child twice is a no-op.
    pub fn attach_child(
        &mut self,
        parent_sha256: &str,
        child_sha256: &str,
    ) -> Result<EntityId, CorpusError> {
        let parent_sha256 = validate_sha256(parent_sha256)?;
        let child_sha256 = validate_sha256(child_sha256)?;
        let parent_id = self
            .graph
            .sample_by_sha256(&parent_sha256)
            .map(|sample| sample.id)
            .ok_or_else(|| CorpusError::UnknownSample(parent_sha256.clone()))?;

        let graph = &mut self.graph;
        let repository = &mut self.repository;
        let child_id = self.cache.get_or_create(EntityKind::Child, &child_sha256, || {
            let id = graph.insert_child(child_sha256.clone());
            if let Some(child) = graph.child(id) {
                repository.persist(&EntityRecord::Child(child.clone()))?;
            }
            Ok(id)
        })?;

        let parent = self.graph.sample_mut(parent_id)?;
        if !parent.child_ids.contains(&child_id) {
            parent.child_ids.push(child_id);
            persist_sample(&self.graph, &mut self.repository, parent_id)?;
            self.report.children_attached += 1;
        }
        Ok(child_id)
    }

    /// Commit pending writes and hand back the graph, report, and repository.
    pub fn finish(mut self) -> Result<(CorpusGraph, IngestReport, R), CorpusError> {
        self.repository.commit()?;
        let stats = self.cache.stats();
        info!(
            "[apt_corpus:ingest] run complete (rows={}, ingested={}, samples={}, groups={}, invalid={}, conflicts={}, cache_hits={}, cache_misses={})",
            self.report.rows_seen,
            self.report.rows_ingested,
            self.graph.samples().len(),
            self.graph.groups().len(),
            self.report.invalid_rows.len(),
            self.report.label_conflicts,
            stats.hits,
            stats.misses
        );
        Ok((self.graph, self.report, self.repository))
    }
}

fn persist_sample<R: CorpusRepository>(
    graph: &CorpusGraph,
    repository: &mut R,
    id: EntityId,
) -> Result<(), CorpusError> {
    let sample = graph.sample(id).ok_or(CorpusError::UnknownEntity {
        kind: EntityKind::Sample,
        id,
    })?;
    repository.persist(&EntityRecord::Sample(sample.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryRepository;

    fn hex(ch: char, len: usize) -> String {
        ch.to_string().repeat(len)
    }

    fn row(index: usize, group: &str, sha: char) -> RawRow {
        RawRow {
            index,
            country: "North Korea".into(),
            group: group.into(),
            file_type: "Win32 EXE".into(),
            md5: hex(sha, 32),
            sha1: hex(sha, 40),
            sha256: hex(sha, 64),
            reports: RawReports::None,
            status: None,
        }
    }

    fn builder(config: IngestConfig) -> CorpusBuilder<InMemoryRepository> {
        CorpusBuilder::new(config, InMemoryRepository::new())
    }

    #[test]
    fn same_group_key_materializes_once() {
        let mut builder = builder(IngestConfig::default());
        builder
            .ingest_rows([row(0, "Lazarus Group", 'a'), row(1, "lazarus-group", 'b')])
            .unwrap();
        let graph = builder.graph();
        assert_eq!(graph.groups().len(), 1);
        assert_eq!(graph.countries().len(), 1);
        assert_eq!(graph.samples().len(), 2);
        assert!(graph.samples().iter().all(|sample| sample.group_id == 1));
        assert_eq!(builder.repository().insert_count(EntityKind::Group), 1);
        assert_eq!(builder.repository().insert_count(EntityKind::FileType), 1);
    }

    #[test]
    fn hashes_are_stored_upper_case() {
        let mut builder = builder(IngestConfig::default());
        builder.ingest_row(&row(0, "APT28", 'c')).unwrap();
        let sample = &builder.graph().samples()[0];
        assert_eq!(sample.sha256, hex('C', 64));
        assert_eq!(sample.md5, hex('C', 32));
    }

    #[test]
    fn report_list_mismatch_is_fatal_even_when_skipping() {
        let config = IngestConfig::default().with_row_errors(RowErrorPolicy::Skip);
        let mut builder = builder(config);
        let mut bad = row(0, "APT1", 'd');
        bad.reports = RawReports::Listed {
            paths: "['a.pdf', 'b.pdf']".into(),
            hashes: hex('e', 64),
        };
        let err = builder.ingest_row(&bad).unwrap_err();
        assert!(matches!(
            err,
            CorpusError::ReportListMismatch { paths: 2, hashes: 1 }
        ));
        assert!(builder.graph().samples().is_empty());
    }

    #[test]
    fn reports_dedupe_by_hash_across_rows() {
        let mut builder = builder(IngestConfig::default());
        let shared = hex('f', 64);
        let mut first = row(0, "APT1", '1');
        first.reports = RawReports::Listed {
            paths: "['2013/apt1.pdf']".into(),
            hashes: shared.clone(),
        };
        let mut second = row(1, "APT1", '2');
        second.reports = RawReports::Listed {
            paths: "['mirror/apt1.pdf', 'x.pdf']".into(),
            hashes: format!("{shared}, {}", hex('0', 64)),
        };
        builder.ingest_rows([first, second]).unwrap();
        let graph = builder.graph();
        assert_eq!(graph.reports().len(), 2);
        assert_eq!(graph.samples()[0].report_ids, vec![1]);
        assert_eq!(graph.samples()[1].report_ids, vec![1, 2]);
        assert_eq!(graph.report(1).unwrap().location, "2013/apt1.pdf");
    }

    #[test]
    fn invalid_hash_aborts_or_skips_per_policy() {
        let mut bad = row(3, "APT1", 'a');
        bad.md5 = hex('a', 31);

        let mut aborting = builder(IngestConfig::default());
        assert!(matches!(
            aborting.ingest_row(&bad),
            Err(CorpusError::InvalidHash { .. })
        ));

        let mut skipping = builder(IngestConfig::default().with_row_errors(RowErrorPolicy::Skip));
        assert_eq!(skipping.ingest_row(&bad).unwrap(), RowOutcome::Invalid);
        assert_eq!(skipping.report().invalid_rows[0].row, 3);
        assert!(skipping.graph().groups().is_empty());
    }

    #[test]
    fn label_conflicts_follow_policy() {
        let rows = [row(0, "APT28", 'a'), row(1, "APT29", 'a')];

        let mut rejecting = builder(IngestConfig::default());
        rejecting.ingest_row(&rows[0]).unwrap();
        assert!(matches!(
            rejecting.ingest_row(&rows[1]),
            Err(CorpusError::LabelConflict { .. })
        ));
        assert_eq!(rejecting.report().label_conflicts, 1);

        let mut first = builder(IngestConfig::default().with_conflict_policy(ConflictPolicy::FirstWins));
        first.ingest_rows(rows.clone()).unwrap();
        assert_eq!(first.graph().label_name(&first.graph().samples()[0]), Some("APT28"));
        assert_eq!(first.report().label_conflicts, 1);
        assert_eq!(first.graph().groups().len(), 1);

        let mut last = builder(IngestConfig::default().with_conflict_policy(ConflictPolicy::LastWins));
        last.ingest_rows(rows).unwrap();
        assert_eq!(last.graph().label_name(&last.graph().samples()[0]), Some("APT29"));
        assert_eq!(last.report().label_conflicts, 1);
        assert_eq!(last.graph().samples().len(), 1);
    }

    #[test]
    fn repeated_sample_merges_without_duplicating() {
        let mut builder = builder(IngestConfig::default());
        let mut second = row(1, "APT28", 'a');
        second.reports = RawReports::Url("https://example.org/report".into());
        builder.ingest_rows([row(0, "APT28", 'a'), second]).unwrap();
        assert_eq!(builder.graph().samples().len(), 1);
        assert_eq!(builder.graph().samples()[0].report_ids, vec![1]);
        assert_eq!(builder.report().duplicate_samples, 1);
        assert_eq!(builder.report().rows_ingested, 2);
    }

    #[test]
    fn aliases_resolve_and_materialize() {
        let map = AliasMap::from_pairs(
            [("Guardians of Peace", "LAZARUS")],
            Default::default(),
        );
        let mut builder = builder(IngestConfig::default()).with_alias_map(map);
        builder
            .ingest_rows([
                row(0, "Guardians of Peace, Lazarus", 'a'),
                row(1, "Lazarus, APT38", 'b'),
            ])
            .unwrap();
        let graph = builder.graph();
        assert_eq!(graph.samples().len(), 1);
        assert_eq!(graph.groups()[0].name, "LAZARUS");
        let aliases: Vec<_> = graph.aliases_of(1).map(|alias| alias.name.as_str()).collect();
        assert_eq!(aliases, vec!["GUARDIANS_OF_PEACE"]);
        assert_eq!(builder.report().ambiguous_alias_rows, 1);
    }

    #[test]
    fn multi_actor_rows_skip_without_alias_map() {
        let mut builder = builder(IngestConfig::default());
        let outcome = builder.ingest_row(&row(0, "Sofacy, APT28", 'a')).unwrap();
        assert_eq!(outcome, RowOutcome::Skipped(SkipReason::MultiActor));
        assert_eq!(builder.report().multi_actor_rows, 1);
        assert_eq!(builder.report().rows_skipped(), 1);
    }

    #[test]
    fn group_country_mismatch_is_counted() {
        let mut builder = builder(IngestConfig::default());
        let mut moved = row(1, "APT28", 'b');
        moved.country = "Russia".into();
        builder.ingest_rows([row(0, "APT28", 'a'), moved]).unwrap();
        assert_eq!(builder.report().group_country_mismatches, 1);
        assert_eq!(builder.graph().groups().len(), 1);
    }

    #[test]
    fn children_attach_once_per_parent() {
        let mut builder = builder(IngestConfig::default());
        builder.ingest_row(&row(0, "APT28", 'a')).unwrap();
        let child = hex('b', 64);
        let first = builder.attach_child(&hex('a', 64), &child).unwrap();
        let second = builder.attach_child(&hex('A', 64), &child).unwrap();
        assert_eq!(first, second);
        assert_eq!(builder.graph().samples()[0].child_ids, vec![first]);
        assert_eq!(builder.report().children_attached, 1);
        assert!(matches!(
            builder.attach_child(&hex('c', 64), &child),
            Err(CorpusError::UnknownSample(_))
        ));
    }

    #[test]
    fn finish_commits_once() {
        let mut builder = builder(IngestConfig::default());
        builder.ingest_row(&row(0, "APT28", 'a')).unwrap();
        let (graph, report, repository) = builder.finish().unwrap();
        assert_eq!(graph.samples().len(), 1);
        assert_eq!(report.rows_ingested, 1);
        assert_eq!(repository.commit_count(), 1);
    }
}
