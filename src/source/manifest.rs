use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::ReaderBuilder;
use serde::Deserialize;

use crate::errors::CorpusError;
use crate::types::HexDigest;

/// One `parent_sha256,child_sha256` manifest line.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ChildLink {
    pub parent_sha256: HexDigest,
    pub child_sha256: HexDigest,
}

/// Read a children manifest from disk.
///
/// Hashes are returned as written; `CorpusBuilder::attach_child` validates them.
pub fn read_children_manifest(path: &Path) -> Result<Vec<ChildLink>, CorpusError> {
    parse_children_manifest(File::open(path)?)
}

/// Parse a children manifest with `parent_sha256` and `child_sha256` headers.
pub fn parse_children_manifest<R: Read>(reader: R) -> Result<Vec<ChildLink>, CorpusError> {
    let mut reader = ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut links = Vec::new();
    for link in reader.deserialize::<ChildLink>() {
        links.push(link?);
    }
    Ok(links)
}
