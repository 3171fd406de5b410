use std::collections::BTreeMap;

use crate::errors::CorpusError;
use crate::types::{ArtifactToken, Count};
use crate::utils::collapse_whitespace_runs;

/// Character n-gram counter over a small corpus of strings.
///
/// Each document has whitespace runs collapsed to one space, then every
/// window of exactly `n` characters is counted. Documents shorter than `n`
/// contribute nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CharNgramVectorizer {
    n: usize,
    lowercase: bool,
}

impl CharNgramVectorizer {
    /// Vectorizer for n-grams of length `n`, lower-casing documents first.
    pub fn new(n: usize) -> Self {
        Self { n, lowercase: true }
    }

    pub fn with_lowercase(mut self, lowercase: bool) -> Self {
        self.lowercase = lowercase;
        self
    }

    pub fn n(&self) -> usize {
        self.n
    }

    /// N-grams of one document, in order of appearance.
    pub fn ngrams(&self, document: &str) -> Vec<ArtifactToken> {
        let document = if self.lowercase {
            document.to_lowercase()
        } else {
            document.to_string()
        };
        let chars: Vec<char> = collapse_whitespace_runs(document).chars().collect();
        if self.n == 0 || chars.len() < self.n {
            return Vec::new();
        }
        chars
            .windows(self.n)
            .map(|window| window.iter().collect())
            .collect()
    }

    /// Total n-gram counts across `documents`.
    ///
    /// Fails with `DegenerateCorpus` when no document yields a single n-gram.
    pub fn count<I, S>(&self, documents: I) -> Result<BTreeMap<ArtifactToken, Count>, CorpusError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut counts = BTreeMap::new();
        for document in documents {
            for gram in self.ngrams(document.as_ref()) {
                *counts.entry(gram).or_insert(0) += 1;
            }
        }
        if counts.is_empty() {
            return Err(CorpusError::DegenerateCorpus(format!(
                "empty vocabulary; documents contain no {}-grams",
                self.n
            )));
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_windows_across_documents() {
        let counts = CharNgramVectorizer::new(2).count(["abab", "AB"]).unwrap();
        assert_eq!(counts.get("ab"), Some(&3));
        assert_eq!(counts.get("ba"), Some(&1));
        assert_eq!(counts.len(), 2);
    }

    #[test]
    fn whitespace_runs_collapse_before_windowing() {
        let vectorizer = CharNgramVectorizer::new(3);
        assert_eq!(vectorizer.ngrams("a   b"), vec!["a b"]);
        assert_eq!(vectorizer.ngrams("a\tb"), vec!["a\tb"]);
    }

    #[test]
    fn case_is_kept_when_lowercase_is_disabled() {
        let vectorizer = CharNgramVectorizer::new(2).with_lowercase(false);
        assert_eq!(vectorizer.ngrams("%T"), vec!["%T"]);
    }

    #[test]
    fn multibyte_characters_are_single_units() {
        assert_eq!(CharNgramVectorizer::new(2).ngrams("äöü"), vec!["äö", "öü"]);
    }

    #[test]
    fn short_or_empty_corpora_are_degenerate() {
        let vectorizer = CharNgramVectorizer::new(4);
        assert!(matches!(
            vectorizer.count(["abc", ""]),
            Err(CorpusError::DegenerateCorpus(_))
        ));
        assert!(vectorizer.count(Vec::<String>::new()).is_err());
    }
}
