use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::{ExtractionConfig, HashCase};
use crate::constants::artifacts::AST_EXTENSION;
use crate::errors::CorpusError;

/// Sample folder laid out as `<root>/<hash[0..2]>/<hash>/`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SampleFolder {
    root: PathBuf,
    case: HashCase,
}

impl SampleFolder {
    pub fn new(root: impl Into<PathBuf>, case: HashCase) -> Self {
        Self {
            root: root.into(),
            case,
        }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(config.sample_folder.clone(), config.path_case)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn spell(&self, sha256: &str) -> String {
        match self.case {
            HashCase::Upper => sha256.to_ascii_uppercase(),
            HashCase::Lower => sha256.to_ascii_lowercase(),
        }
    }

    /// Directory holding every artifact of `sha256`.
    pub fn sample_dir(&self, sha256: &str) -> PathBuf {
        let hash = self.spell(sha256);
        let prefix = hash.get(..2).unwrap_or(&hash);
        self.root.join(prefix).join(&hash)
    }

    /// `<hash>.ast` disassembly trace.
    pub fn ast_path(&self, sha256: &str) -> PathBuf {
        let hash = self.spell(sha256);
        self.sample_dir(sha256)
            .join(format!("{hash}.{AST_EXTENSION}"))
    }

    /// `<hash>_<suffix>.json` sandbox summary.
    pub fn sandbox_report_path(&self, sha256: &str, suffix: &str) -> PathBuf {
        let hash = self.spell(sha256);
        self.sample_dir(sha256)
            .join(format!("{hash}_{suffix}.json"))
    }
}

/// Read `path` as UTF-8 (lossy), mapping a missing file to `ArtifactMissing`.
pub fn read_artifact(path: &Path) -> Result<String, CorpusError> {
    match fs::read(path) {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            Err(CorpusError::ArtifactMissing(path.to_path_buf()))
        }
        Err(err) => Err(err.into()),
    }
}
