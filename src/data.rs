use std::fmt;

use serde::{Deserialize, Serialize};

pub use crate::types::{CanonicalKey, EntityId, FoldId, HexDigest, ReportLocation};

/// Entity tables tracked by the corpus graph and entity cache.
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
pub enum EntityKind {
    Country,
    Group,
    Alias,
    FileType,
    Report,
    Child,
    Sample,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Country => "country",
            EntityKind::Group => "group",
            EntityKind::Alias => "alias",
            EntityKind::FileType => "file type",
            EntityKind::Report => "report",
            EntityKind::Child => "child",
            EntityKind::Sample => "sample",
        };
        f.write_str(name)
    }
}

/// Digest families validated on ingestion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HashKind {
    Md5,
    Sha1,
    Sha256,
}

impl HashKind {
    /// Number of hex characters in a digest of this kind.
    pub const fn hex_len(self) -> usize {
        match self {
            HashKind::Md5 => 32,
            HashKind::Sha1 => 40,
            HashKind::Sha256 => 64,
        }
    }
}

impl fmt::Display for HashKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HashKind::Md5 => "MD5",
            HashKind::Sha1 => "SHA-1",
            HashKind::Sha256 => "SHA-256",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, bitcode::Encode, bitcode::Decode)]
pub struct Country {
    pub id: EntityId,
    pub name: CanonicalKey,
}

/// Threat actor group; the attribution label of its samples.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, bitcode::Encode, bitcode::Decode)]
pub struct Group {
    pub id: EntityId,
    pub name: CanonicalKey,
    pub country_id: Option<EntityId>,
}

/// Known alternate spelling of a group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, bitcode::Encode, bitcode::Decode)]
pub struct Alias {
    pub id: EntityId,
    pub name: CanonicalKey,
    pub group_id: EntityId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, bitcode::Encode, bitcode::Decode)]
pub struct FileType {
    pub id: EntityId,
    pub name: CanonicalKey,
}

/// Source document referenced by one or more samples.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, bitcode::Encode, bitcode::Decode)]
pub struct Report {
    pub id: EntityId,
    /// Path or URL of the document.
    pub location: ReportLocation,
    /// Content hash when the source provides one; URL-keyed reports carry `None`.
    pub sha256: Option<HexDigest>,
}

impl Report {
    /// Natural key used for deduplication (content hash, falling back to location).
    pub fn natural_key(&self) -> &str {
        self.sha256.as_deref().unwrap_or(&self.location)
    }
}

/// Unpacked artifact of a sample.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, bitcode::Encode, bitcode::Decode)]
pub struct Child {
    pub id: EntityId,
    pub sha256: HexDigest,
}

/// Labeled malware sample.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, bitcode::Encode, bitcode::Decode)]
pub struct Sample {
    pub id: EntityId,
    pub md5: HexDigest,
    pub sha1: HexDigest,
    pub sha256: HexDigest,
    pub group_id: EntityId,
    pub file_type_id: EntityId,
    pub report_ids: Vec<EntityId>,
    pub child_ids: Vec<EntityId>,
    /// `None` until fold assignment runs.
    pub fold_id: Option<FoldId>,
}

/// Any persisted entity, as handed to a `CorpusRepository`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, bitcode::Encode, bitcode::Decode)]
pub enum EntityRecord {
    Country(Country),
    Group(Group),
    Alias(Alias),
    FileType(FileType),
    Report(Report),
    Child(Child),
    Sample(Sample),
}

impl EntityRecord {
    /// Table this record belongs to.
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityRecord::Country(_) => EntityKind::Country,
            EntityRecord::Group(_) => EntityKind::Group,
            EntityRecord::Alias(_) => EntityKind::Alias,
            EntityRecord::FileType(_) => EntityKind::FileType,
            EntityRecord::Report(_) => EntityKind::Report,
            EntityRecord::Child(_) => EntityKind::Child,
            EntityRecord::Sample(_) => EntityKind::Sample,
        }
    }

    /// Surrogate id of the record within its table.
    pub fn id(&self) -> EntityId {
        match self {
            EntityRecord::Country(entity) => entity.id,
            EntityRecord::Group(entity) => entity.id,
            EntityRecord::Alias(entity) => entity.id,
            EntityRecord::FileType(entity) => entity.id,
            EntityRecord::Report(entity) => entity.id,
            EntityRecord::Child(entity) => entity.id,
            EntityRecord::Sample(entity) => entity.id,
        }
    }
}

/// Identity of one feature-matrix row: `(parent sample, unpacked child or none)`.
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
pub struct RowId {
    pub parent: EntityId,
    pub child: Option<EntityId>,
}

impl RowId {
    pub fn parent(parent: EntityId) -> Self {
        Self {
            parent,
            child: None,
        }
    }

    pub fn child(parent: EntityId, child: EntityId) -> Self {
        Self {
            parent,
            child: Some(child),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_natural_key_prefers_hash() {
        let hashed = Report {
            id: 1,
            location: "reports/a.pdf".into(),
            sha256: Some("AB".repeat(32)),
        };
        assert_eq!(hashed.natural_key(), "AB".repeat(32));

        let url = Report {
            id: 2,
            location: "https://example.org/report".into(),
            sha256: None,
        };
        assert_eq!(url.natural_key(), "https://example.org/report");
    }

    #[test]
    fn entity_record_reports_kind_and_id() {
        let record = EntityRecord::Group(Group {
            id: 9,
            name: "LAZARUS".into(),
            country_id: None,
        });
        assert_eq!(record.kind(), EntityKind::Group);
        assert_eq!(record.id(), 9);
        assert_eq!(EntityKind::FileType.to_string(), "file type");
        assert_eq!(HashKind::Sha1.hex_len(), 40);
    }
}
