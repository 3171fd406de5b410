//! In-memory entity graph.
//!
//! Relationships are id fields on the entities plus lookup indices owned by
//! the graph; traversal always goes through id lookups.

use std::collections::HashMap;

use crate::data::{
    Alias, Child, Country, EntityKind, EntityRecord, FileType, Group, Report, Sample,
};
use crate::errors::CorpusError;
use crate::types::{CanonicalKey, EntityId, HexDigest, ReportLocation};

/// Dense tables of materialized entities. Ids are `index + 1` per table.
#[derive(Clone, Debug, Default)]
pub struct CorpusGraph {
    countries: Vec<Country>,
    groups: Vec<Group>,
    aliases: Vec<Alias>,
    file_types: Vec<FileType>,
    reports: Vec<Report>,
    children: Vec<Child>,
    samples: Vec<Sample>,
    sample_by_sha256: HashMap<HexDigest, EntityId>,
}

fn next_id(len: usize) -> EntityId {
    len as EntityId + 1
}

fn slot(id: EntityId) -> usize {
    (id as usize).wrapping_sub(1)
}

impl CorpusGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a graph from persisted records (any order).
    pub fn from_records<I>(records: I) -> Result<Self, CorpusError>
    where
        I: IntoIterator<Item = EntityRecord>,
    {
        let mut records: Vec<EntityRecord> = records.into_iter().collect();
        records.sort_by_key(|record| (record.kind(), record.id()));
        let mut graph = Self::new();
        for record in records {
            let kind = record.kind();
            let id = record.id();
            let expected = match kind {
                EntityKind::Country => next_id(graph.countries.len()),
                EntityKind::Group => next_id(graph.groups.len()),
                EntityKind::Alias => next_id(graph.aliases.len()),
                EntityKind::FileType => next_id(graph.file_types.len()),
                EntityKind::Report => next_id(graph.reports.len()),
                EntityKind::Child => next_id(graph.children.len()),
                EntityKind::Sample => next_id(graph.samples.len()),
            };
            if id != expected {
                return Err(CorpusError::Repository(format!(
                    "{kind} ids are not dense: expected {expected}, found {id}"
                )));
            }
            match record {
                EntityRecord::Country(entity) => graph.countries.push(entity),
                EntityRecord::Group(entity) => graph.groups.push(entity),
                EntityRecord::Alias(entity) => graph.aliases.push(entity),
                EntityRecord::FileType(entity) => graph.file_types.push(entity),
                EntityRecord::Report(entity) => graph.reports.push(entity),
                EntityRecord::Child(entity) => graph.children.push(entity),
                EntityRecord::Sample(entity) => {
                    graph
                        .sample_by_sha256
                        .insert(entity.sha256.clone(), entity.id);
                    graph.samples.push(entity);
                }
            }
        }
        Ok(graph)
    }

    /// Every entity as a persistable record, grouped by kind.
    pub fn records(&self) -> Vec<EntityRecord> {
        let mut records = Vec::new();
        records.extend(self.countries.iter().cloned().map(EntityRecord::Country));
        records.extend(self.groups.iter().cloned().map(EntityRecord::Group));
        records.extend(self.aliases.iter().cloned().map(EntityRecord::Alias));
        records.extend(self.file_types.iter().cloned().map(EntityRecord::FileType));
        records.extend(self.reports.iter().cloned().map(EntityRecord::Report));
        records.extend(self.children.iter().cloned().map(EntityRecord::Child));
        records.extend(self.samples.iter().cloned().map(EntityRecord::Sample));
        records
    }

    pub(crate) fn insert_country(&mut self, name: CanonicalKey) -> EntityId {
        let id = next_id(self.countries.len());
        self.countries.push(Country { id, name });
        id
    }

    pub(crate) fn insert_group(
        &mut self,
        name: CanonicalKey,
        country_id: Option<EntityId>,
    ) -> EntityId {
        let id = next_id(self.groups.len());
        self.groups.push(Group {
            id,
            name,
            country_id,
        });
        id
    }

    pub(crate) fn insert_alias(&mut self, name: CanonicalKey, group_id: EntityId) -> EntityId {
        let id = next_id(self.aliases.len());
        self.aliases.push(Alias { id, name, group_id });
        id
    }

    pub(crate) fn insert_file_type(&mut self, name: CanonicalKey) -> EntityId {
        let id = next_id(self.file_types.len());
        self.file_types.push(FileType { id, name });
        id
    }

    pub(crate) fn insert_report(
        &mut self,
        location: ReportLocation,
        sha256: Option<HexDigest>,
    ) -> EntityId {
        let id = next_id(self.reports.len());
        self.reports.push(Report {
            id,
            location,
            sha256,
        });
        id
    }

    pub(crate) fn insert_child(&mut self, sha256: HexDigest) -> EntityId {
        let id = next_id(self.children.len());
        self.children.push(Child { id, sha256 });
        id
    }

    /// Insert a new sample; `sample.id` is overwritten with the assigned id.
    pub(crate) fn insert_sample(&mut self, mut sample: Sample) -> EntityId {
        let id = next_id(self.samples.len());
        sample.id = id;
        self.sample_by_sha256.insert(sample.sha256.clone(), id);
        self.samples.push(sample);
        id
    }

    pub fn country(&self, id: EntityId) -> Option<&Country> {
        self.countries.get(slot(id))
    }

    pub fn group(&self, id: EntityId) -> Option<&Group> {
        self.groups.get(slot(id))
    }

    pub fn alias(&self, id: EntityId) -> Option<&Alias> {
        self.aliases.get(slot(id))
    }

    pub fn file_type(&self, id: EntityId) -> Option<&FileType> {
        self.file_types.get(slot(id))
    }

    pub fn report(&self, id: EntityId) -> Option<&Report> {
        self.reports.get(slot(id))
    }

    pub fn child(&self, id: EntityId) -> Option<&Child> {
        self.children.get(slot(id))
    }

    pub fn sample(&self, id: EntityId) -> Option<&Sample> {
        self.samples.get(slot(id))
    }

    pub(crate) fn sample_mut(&mut self, id: EntityId) -> Result<&mut Sample, CorpusError> {
        self.samples
            .get_mut(slot(id))
            .ok_or(CorpusError::UnknownEntity {
                kind: EntityKind::Sample,
                id,
            })
    }

    /// Sample with the given (upper-case) SHA-256.
    pub fn sample_by_sha256(&self, sha256: &str) -> Option<&Sample> {
        self.sample_by_sha256
            .get(sha256)
            .and_then(|id| self.sample(*id))
    }

    pub fn countries(&self) -> &[Country] {
        &self.countries
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn aliases(&self) -> &[Alias] {
        &self.aliases
    }

    pub fn file_types(&self) -> &[FileType] {
        &self.file_types
    }

    pub fn reports(&self) -> &[Report] {
        &self.reports
    }

    pub fn children(&self) -> &[Child] {
        &self.children
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Aliases belonging to `group_id`.
    pub fn aliases_of(&self, group_id: EntityId) -> impl Iterator<Item = &Alias> {
        self.aliases
            .iter()
            .filter(move |alias| alias.group_id == group_id)
    }

    /// Samples labeled with `group_id`.
    pub fn samples_of(&self, group_id: EntityId) -> impl Iterator<Item = &Sample> {
        self.samples
            .iter()
            .filter(move |sample| sample.group_id == group_id)
    }

    /// Canonical group name of a sample's label.
    pub fn label_name(&self, sample: &Sample) -> Option<&str> {
        self.group(sample.group_id).map(|group| group.name.as_str())
    }

    /// Samples with a fold id, in id order.
    pub fn fold_assigned(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter().filter(|sample| sample.fold_id.is_some())
    }
}
