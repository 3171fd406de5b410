use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::artifacts::{
    ArtifactChannel, ArtifactCounts, ArtifactKey, ArtifactParser, CharNgramVectorizer,
    ExtractionUnit,
};
use crate::errors::CorpusError;
use crate::types::HexDigest;

/// Lookup of user-string documents by sample hash.
///
/// Lookups are case-insensitive on the hash.
pub trait StringStore: Send + Sync {
    /// Strings recorded for `sha256`, or `None` when no document exists.
    fn strings(&self, sha256: &str) -> Result<Option<Vec<String>>, CorpusError>;
}

/// One exported strings document.
#[derive(Clone, Debug, Deserialize)]
pub struct StringsDocument {
    #[serde(rename = "FileSHA256")]
    pub file_sha256: HexDigest,
    #[serde(rename = "Strings", default)]
    pub strings: Vec<String>,
}

/// String store held in memory, keyed by lower-cased hash.
#[derive(Clone, Debug, Default)]
pub struct InMemoryStringStore {
    documents: HashMap<HexDigest, Vec<String>>,
}

impl InMemoryStringStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<I, S>(&mut self, sha256: &str, strings: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.documents.insert(
            sha256.to_ascii_lowercase(),
            strings.into_iter().map(Into::into).collect(),
        );
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Parse one JSON document per line; blank lines are skipped.
    pub fn from_json_lines<R: Read>(reader: R) -> Result<Self, CorpusError> {
        let mut store = Self::new();
        for line in BufReader::new(reader).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let document: StringsDocument = serde_json::from_str(&line)?;
            store.insert(&document.file_sha256, document.strings);
        }
        Ok(store)
    }

    /// Load a JSON-lines strings export from disk.
    pub fn load_json_lines(path: &Path) -> Result<Self, CorpusError> {
        let store = Self::from_json_lines(File::open(path)?)?;
        info!(
            "[apt_corpus:extract] loaded {} strings documents from {}",
            store.len(),
            path.display()
        );
        Ok(store)
    }
}

impl StringStore for InMemoryStringStore {
    fn strings(&self, sha256: &str) -> Result<Option<Vec<String>>, CorpusError> {
        Ok(self.documents.get(&sha256.to_ascii_lowercase()).cloned())
    }
}

/// Character n-grams over a sample's user strings.
pub struct StringNgramParser<S> {
    store: S,
    vectorizer: CharNgramVectorizer,
}

impl<S: StringStore> StringNgramParser<S> {
    pub fn new(store: S, n: usize) -> Self {
        Self {
            store,
            vectorizer: CharNgramVectorizer::new(n),
        }
    }
}

impl<S: StringStore> ArtifactParser for StringNgramParser<S> {
    fn name(&self) -> &'static str {
        "strings"
    }

    fn extract(&self, unit: &ExtractionUnit) -> Result<ArtifactCounts, CorpusError> {
        let Some(strings) = self.store.strings(&unit.sha256)? else {
            warn!(
                "[apt_corpus:extract] strings: {}",
                CorpusError::DocumentMissing(unit.sha256.clone())
            );
            return Ok(ArtifactCounts::new());
        };
        match self.vectorizer.count(&strings) {
            Ok(grams) => Ok(grams
                .into_iter()
                .map(|(gram, count)| (ArtifactKey::new(ArtifactChannel::StringNgram, gram), count))
                .collect()),
            Err(err @ CorpusError::DegenerateCorpus(_)) => {
                warn!("[apt_corpus:extract] strings: {} -> {}", err, unit.sha256);
                Ok(ArtifactCounts::new())
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::RowId;

    fn unit(sha: &str) -> ExtractionUnit {
        ExtractionUnit {
            row_id: RowId::parent(1),
            sha256: sha.to_string(),
        }
    }

    #[test]
    fn lookups_ignore_hash_case() {
        let mut store = InMemoryStringStore::new();
        store.insert("ABCD", ["kernel32"]);
        assert!(store.strings("abcd").unwrap().is_some());
        assert!(store.strings("ABCD").unwrap().is_some());
        assert!(store.strings("ef01").unwrap().is_none());
    }

    #[test]
    fn parser_counts_lowercased_trigrams() {
        let mut store = InMemoryStringStore::new();
        store.insert("AA", ["CMD", "cmd.exe"]);
        let parser = StringNgramParser::new(store, 3);
        let counts = parser.extract(&unit("aa")).unwrap();
        let key = ArtifactKey::new(ArtifactChannel::StringNgram, "cmd");
        assert_eq!(counts.get(&key), Some(&2));
        assert_eq!(counts.len(), 5);
    }

    #[test]
    fn missing_or_degenerate_documents_are_empty() {
        let mut store = InMemoryStringStore::new();
        store.insert("BB", ["ab"]);
        let parser = StringNgramParser::new(store, 3);
        assert!(parser.extract(&unit("BB")).unwrap().is_empty());
        assert!(parser.extract(&unit("CC")).unwrap().is_empty());
    }

    #[test]
    fn json_lines_export_is_parsed() {
        let input = "{\"FileSHA256\": \"aa\", \"Strings\": [\"x\"]}\n\n{\"FileSHA256\": \"BB\"}\n";
        let store = InMemoryStringStore::from_json_lines(input.as_bytes()).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.strings("bb").unwrap(), Some(Vec::new()));
        assert!(InMemoryStringStore::from_json_lines("not json".as_bytes()).is_err());
    }
}
