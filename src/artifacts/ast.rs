use tracing::warn;

use crate::artifacts::{ArtifactChannel, ArtifactCounts, ArtifactKey, ArtifactParser, ExtractionUnit};
use crate::constants::artifacts::{AST_TYPE_MARKER, SKIP_MISSING_MSG};
use crate::errors::CorpusError;
use crate::transport::{SampleFolder, read_artifact};

/// Count AST node types in a decompiler trace.
///
/// Only lines beginning with `type:` count, and only when the remainder is
/// purely alphabetic (separators such as `\\` are ignored).
pub fn count_ast_nodes(trace: &str) -> ArtifactCounts {
    let mut counts = ArtifactCounts::new();
    for line in trace.lines() {
        let Some(node) = line.strip_prefix(AST_TYPE_MARKER) else {
            continue;
        };
        if !node.is_empty() && node.chars().all(char::is_alphabetic) {
            *counts
                .entry(ArtifactKey::new(ArtifactChannel::AstNode, node))
                .or_insert(0) += 1;
        }
    }
    counts
}

/// Reads `<hash>.ast` traces from a sample folder.
#[derive(Clone, Debug)]
pub struct AstParser {
    folder: SampleFolder,
}

impl AstParser {
    pub fn new(folder: SampleFolder) -> Self {
        Self { folder }
    }
}

impl ArtifactParser for AstParser {
    fn name(&self) -> &'static str {
        "ast"
    }

    fn extract(&self, unit: &ExtractionUnit) -> Result<ArtifactCounts, CorpusError> {
        let path = self.folder.ast_path(&unit.sha256);
        match read_artifact(&path) {
            Ok(trace) => Ok(count_ast_nodes(&trace)),
            Err(CorpusError::ArtifactMissing(path)) => {
                warn!(
                    "[apt_corpus:extract] ast: {} ({})",
                    SKIP_MISSING_MSG,
                    path.display()
                );
                Ok(ArtifactCounts::new())
            }
            Err(err) => Err(err),
        }
    }
}
