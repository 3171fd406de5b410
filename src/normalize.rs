//! Canonical keys for free-text labels (countries, groups, aliases, file types).

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::constants::ingestion::{APT_PREFIX, APT_PREFIX_SPACED};
use crate::types::CanonicalKey;

static NON_ALNUM_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^0-9A-Z]+").expect("static pattern compiles"));

/// Upper-case `raw` and collapse every run of characters outside `[0-9A-Z]`
/// into a single `_`.
///
/// Runs at either edge of the label collapse to nothing, so
/// `normalize("Lazarus-Group!!")` is `LAZARUS_GROUP`.
pub fn normalize(raw: &str) -> CanonicalKey {
    let upper = raw.to_uppercase();
    let collapsed = NON_ALNUM_RUN.replace_all(&upper, "_");
    collapsed.trim_matches('_').to_string()
}

/// How group names are canonicalized beyond `normalize`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupNameStyle {
    /// Plain `normalize`.
    #[default]
    Plain,
    /// `normalize`, then `APT_28` → `APT28`.
    CollapseAptPrefix,
}

impl GroupNameStyle {
    /// Canonical key for a group or alias name under this style.
    pub fn canonical(self, raw: &str) -> CanonicalKey {
        let key = normalize(raw);
        match self {
            GroupNameStyle::Plain => key,
            GroupNameStyle::CollapseAptPrefix => key.replace(APT_PREFIX_SPACED, APT_PREFIX),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_runs_to_single_underscore() {
        assert_eq!(normalize("Lazarus Group"), "LAZARUS_GROUP");
        assert_eq!(normalize("lazarus-group"), "LAZARUS_GROUP");
        assert_eq!(normalize("Lazarus -- Group"), "LAZARUS_GROUP");
        assert_eq!(normalize("APT28"), "APT28");
        assert_eq!(normalize("Win32 EXE"), "WIN32_EXE");
    }

    #[test]
    fn normalize_drops_edge_runs() {
        assert_eq!(normalize("Lazarus-Group!!"), "LAZARUS_GROUP");
        assert_eq!(normalize("  North Korea"), "NORTH_KOREA");
        assert_eq!(normalize("!!!"), "");
    }

    #[test]
    fn normalize_handles_empty_and_is_idempotent() {
        assert_eq!(normalize(""), "");
        for raw in ["Lazarus-Group!!", "apt 28", "Win16 EXE", "__", "Équipe"] {
            let once = normalize(raw);
            assert_eq!(normalize(&once), once, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn collapse_apt_prefix_style_joins_number() {
        assert_eq!(GroupNameStyle::CollapseAptPrefix.canonical("APT 28"), "APT28");
        assert_eq!(GroupNameStyle::Plain.canonical("APT 28"), "APT_28");
        let once = GroupNameStyle::CollapseAptPrefix.canonical("apt-3");
        assert_eq!(GroupNameStyle::CollapseAptPrefix.canonical(&once), once);
    }
}
