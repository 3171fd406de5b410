use serde::Deserialize;
use tracing::{debug, warn};

use crate::artifacts::{
    ArtifactChannel, ArtifactCounts, ArtifactKey, ArtifactParser, CharNgramVectorizer,
    ExtractionUnit,
};
use crate::constants::artifacts::{SKIP_MISSING_MSG, TEMP_DIR_TAIL, TMP_PLACEHOLDER, USR_PLACEHOLDER};
use crate::errors::CorpusError;
use crate::transport::{SampleFolder, read_artifact};

/// Sandbox analysis summary (only the fields used for features).
#[derive(Clone, Debug, Deserialize)]
pub struct SandboxSummary {
    pub vm_and_analyzer_details: VmDetails,
    #[serde(default)]
    pub artifacts: SandboxArtifacts,
    #[serde(default)]
    pub mitre_attack: MitreAttack,
}

#[derive(Clone, Debug, Deserialize)]
pub struct VmDetails {
    pub vm_temp_dir: String,
    pub vm_user_profile: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct SandboxArtifacts {
    pub files: Vec<FileArtifact>,
    pub urls: Vec<UrlArtifact>,
    pub mutexes: Vec<MutexArtifact>,
    pub registry: Vec<RegistryArtifact>,
    pub processes: Vec<ProcessArtifact>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileCategory {
    Embedded,
    CodeDump,
    MemoryDump,
    Accessed,
    Modified,
    Script,
    Misc,
    Dropped,
    Sample,
    #[serde(other)]
    Other,
}

impl FileCategory {
    /// Categories whose file names are behavioral evidence.
    pub fn is_behavioral(self) -> bool {
        matches!(
            self,
            FileCategory::Dropped
                | FileCategory::Modified
                | FileCategory::Accessed
                | FileCategory::CodeDump
        )
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct FileArtifact {
    pub filename: Option<String>,
    pub category: FileCategory,
}

#[derive(Clone, Debug, Deserialize)]
pub struct UrlArtifact {
    pub url: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MutexArtifact {
    pub mutex_name: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RegistryArtifact {
    pub reg_key_name: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ProcessArtifact {
    pub cmd_line: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct MitreAttack {
    #[serde(default)]
    pub techniques: Vec<Technique>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Technique {
    pub id: String,
}

/// Replaces sandbox-specific directories with stable placeholders.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathMasker {
    temp_dir: String,
    short_profile: String,
    user_profile: String,
}

impl PathMasker {
    pub fn new(details: &VmDetails) -> Self {
        let temp_dir = details.vm_temp_dir.to_lowercase();
        let short_profile = temp_dir.replace(TEMP_DIR_TAIL, "");
        Self {
            temp_dir,
            short_profile,
            user_profile: details.vm_user_profile.to_lowercase(),
        }
    }

    /// Lower-case `text`, then mask the temp dir and the user profile.
    ///
    /// The temp dir is replaced first so it never degrades to `%USR%\...`.
    pub fn mask(&self, text: &str) -> String {
        let mut masked = text.to_lowercase();
        for (needle, placeholder) in [
            (&self.temp_dir, TMP_PLACEHOLDER),
            (&self.short_profile, USR_PLACEHOLDER),
            (&self.user_profile, USR_PLACEHOLDER),
        ] {
            if !needle.is_empty() {
                masked = masked.replace(needle.as_str(), placeholder);
            }
        }
        masked
    }
}

/// Channel documents of one summary, before n-gram decomposition.
pub fn channel_documents(
    summary: &SandboxSummary,
    sha256: &str,
) -> Vec<(ArtifactChannel, Vec<String>)> {
    let masker = PathMasker::new(&summary.vm_and_analyzer_details);
    let artifacts = &summary.artifacts;
    let own_hash = sha256.to_lowercase();

    let files: Vec<String> = artifacts
        .files
        .iter()
        .filter(|file| file.category.is_behavioral())
        .filter_map(|file| file.filename.as_deref())
        .map(|name| masker.mask(name))
        .collect();
    let urls: Vec<String> = artifacts.urls.iter().map(|url| url.url.to_lowercase()).collect();
    let mutexes: Vec<String> = artifacts
        .mutexes
        .iter()
        .map(|mutex| mutex.mutex_name.to_lowercase())
        .collect();
    let registries: Vec<String> = artifacts
        .registry
        .iter()
        .map(|key| key.reg_key_name.to_lowercase())
        .collect();
    let processes: Vec<String> = artifacts
        .processes
        .iter()
        .filter_map(|process| process.cmd_line.as_deref())
        .filter(|cmd_line| !cmd_line.to_lowercase().contains(&own_hash))
        .map(|cmd_line| masker.mask(cmd_line))
        .collect();

    vec![
        (ArtifactChannel::Files, files),
        (ArtifactChannel::Urls, urls),
        (ArtifactChannel::Mutexes, mutexes),
        (ArtifactChannel::Registries, registries),
        (ArtifactChannel::Processes, processes),
    ]
}

/// Decompose a summary into channel-namespaced counts.
///
/// Text channels contribute n-gram counts; MITRE technique ids count once each.
pub fn summarize(
    summary: &SandboxSummary,
    sha256: &str,
    vectorizer: &CharNgramVectorizer,
) -> Result<ArtifactCounts, CorpusError> {
    let mut counts = ArtifactCounts::new();
    for (channel, documents) in channel_documents(summary, sha256) {
        if documents.is_empty() {
            continue;
        }
        match vectorizer.count(&documents) {
            Ok(grams) => {
                for (gram, count) in grams {
                    counts.insert(ArtifactKey::new(channel, gram), count);
                }
            }
            Err(CorpusError::DegenerateCorpus(reason)) => {
                debug!(
                    "[apt_corpus:extract] dynamic: {} channel of {} skipped: {}",
                    channel.as_str(),
                    sha256,
                    reason
                );
            }
            Err(err) => return Err(err),
        }
    }
    for technique in &summary.mitre_attack.techniques {
        counts.insert(ArtifactKey::new(ArtifactChannel::Mitre, technique.id.clone()), 1);
    }
    Ok(counts)
}

/// Reads `<hash>_<suffix>.json` sandbox summaries for parent samples.
#[derive(Clone, Debug)]
pub struct DynamicParser {
    folder: SampleFolder,
    suffix: String,
    vectorizer: CharNgramVectorizer,
}

impl DynamicParser {
    pub fn new(folder: SampleFolder, suffix: impl Into<String>, n: usize) -> Self {
        Self {
            folder,
            suffix: suffix.into(),
            // Documents are lower-cased before masking; placeholders keep their case.
            vectorizer: CharNgramVectorizer::new(n).with_lowercase(false),
        }
    }
}

impl ArtifactParser for DynamicParser {
    fn name(&self) -> &'static str {
        "dynamic"
    }

    fn expands_children(&self) -> bool {
        false
    }

    fn extract(&self, unit: &ExtractionUnit) -> Result<ArtifactCounts, CorpusError> {
        let path = self.folder.sandbox_report_path(&unit.sha256, &self.suffix);
        let json = match read_artifact(&path) {
            Ok(json) => json,
            Err(CorpusError::ArtifactMissing(path)) => {
                warn!(
                    "[apt_corpus:extract] dynamic: {} ({})",
                    SKIP_MISSING_MSG,
                    path.display()
                );
                return Ok(ArtifactCounts::new());
            }
            Err(err) => return Err(err),
        };
        let summary: SandboxSummary = serde_json::from_str(&json)?;
        summarize(&summary, &unit.sha256, &self.vectorizer)
    }
}
