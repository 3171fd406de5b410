//! Actor alias resolution.
//!
//! An actor field may list several comma-separated names for one group. Each
//! name is mapped through the alias map (unmapped names pass through) and the
//! row is accepted only when every candidate shares one canonical key.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use crate::constants::ingestion::ALIAS_SEPARATOR;
use crate::errors::CorpusError;
use crate::normalize::GroupNameStyle;
use crate::types::{CanonicalKey, RawName};
use crate::utils::split_joined;

/// Raw alias → canonical raw group name.
#[derive(Clone, Debug, Default)]
pub struct AliasMap {
    raw: HashMap<RawName, RawName>,
    by_key: HashMap<CanonicalKey, RawName>,
    style: GroupNameStyle,
}

impl AliasMap {
    /// Build a map from `(alias, group)` pairs.
    pub fn from_pairs<I, A, G>(pairs: I, style: GroupNameStyle) -> Self
    where
        I: IntoIterator<Item = (A, G)>,
        A: Into<RawName>,
        G: Into<RawName>,
    {
        let mut map = Self {
            style,
            ..Self::default()
        };
        for (alias, group) in pairs {
            let alias = alias.into();
            let group = group.into();
            map.by_key.insert(style.canonical(&alias), group.clone());
            map.raw.insert(alias, group);
        }
        map
    }

    /// Parse a JSON object of `{"alias": "group"}` entries.
    pub fn from_json_str(json: &str, style: GroupNameStyle) -> Result<Self, CorpusError> {
        let pairs: HashMap<RawName, RawName> = serde_json::from_str(json)?;
        Ok(Self::from_pairs(pairs, style))
    }

    /// Load a JSON alias document from disk.
    pub fn load(path: &Path, style: GroupNameStyle) -> Result<Self, CorpusError> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json, style)
    }

    /// Group name for `alias`: exact spelling first, then by canonical key.
    pub fn lookup(&self, alias: &str) -> Option<&str> {
        self.raw
            .get(alias)
            .or_else(|| self.by_key.get(&self.style.canonical(alias)))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

/// Outcome of resolving one actor field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AliasResolution {
    /// All names agree on one group.
    Resolved {
        /// Raw group name (first candidate in field order).
        group: RawName,
        /// Raw names as they appeared on the row.
        aliases: Vec<RawName>,
    },
    /// Names map to more than one canonical group.
    Conflicting { candidates: Vec<CanonicalKey> },
    /// Comma-joined field while alias resolution is disabled.
    MultiActor,
    /// Field carries no names.
    Empty,
}

/// Resolves actor fields to a single group name.
#[derive(Clone, Debug, Default)]
pub struct AliasResolver {
    map: Option<AliasMap>,
    style: GroupNameStyle,
}

impl AliasResolver {
    /// Alias-aware resolver backed by `map`.
    pub fn aware(map: AliasMap, style: GroupNameStyle) -> Self {
        Self {
            map: Some(map),
            style,
        }
    }

    /// Resolver that uses the raw field as-is and rejects comma-joined fields.
    pub fn disabled(style: GroupNameStyle) -> Self {
        Self { map: None, style }
    }

    pub fn is_alias_aware(&self) -> bool {
        self.map.is_some()
    }

    /// Single raw group name for `field`, or `None` when the row must be dropped.
    pub fn resolve(&self, field: &str) -> Option<RawName> {
        match self.classify(field) {
            AliasResolution::Resolved { group, .. } => Some(group),
            _ => None,
        }
    }

    /// Detailed resolution of `field`.
    pub fn classify(&self, field: &str) -> AliasResolution {
        let Some(map) = self.map.as_ref() else {
            if field.contains(ALIAS_SEPARATOR) {
                return AliasResolution::MultiActor;
            }
            if field.trim().is_empty() {
                return AliasResolution::Empty;
            }
            return AliasResolution::Resolved {
                group: field.to_string(),
                aliases: vec![field.to_string()],
            };
        };

        let aliases = split_joined(field, ALIAS_SEPARATOR);
        if aliases.is_empty() {
            return AliasResolution::Empty;
        }
        let candidates: Vec<&str> = aliases
            .iter()
            .map(|alias| map.lookup(alias).unwrap_or(*alias))
            .collect();
        let keys: BTreeSet<CanonicalKey> = candidates
            .iter()
            .map(|candidate| self.style.canonical(candidate))
            .collect();
        if keys.len() != 1 {
            return AliasResolution::Conflicting {
                candidates: keys.into_iter().collect(),
            };
        }
        AliasResolution::Resolved {
            group: candidates[0].to_string(),
            aliases: aliases.into_iter().map(str::to_string).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lazarus_resolver() -> AliasResolver {
        let map = AliasMap::from_pairs([("Guardians of Peace", "LAZARUS")], GroupNameStyle::Plain);
        AliasResolver::aware(map, GroupNameStyle::Plain)
    }

    #[test]
    fn mapped_and_unmapped_aliases_agree() {
        let resolver = lazarus_resolver();
        assert_eq!(
            resolver.resolve("Guardians of Peace, Lazarus"),
            Some("LAZARUS".to_string())
        );
        match resolver.classify("Guardians of Peace, Lazarus") {
            AliasResolution::Resolved { aliases, .. } => {
                assert_eq!(aliases, vec!["Guardians of Peace", "Lazarus"]);
            }
            other => panic!("unexpected resolution {other:?}"),
        }
    }

    #[test]
    fn distinct_groups_are_rejected() {
        let resolver = lazarus_resolver();
        assert_eq!(resolver.resolve("Lazarus, APT38"), None);
        assert_eq!(
            resolver.classify("Lazarus, APT38"),
            AliasResolution::Conflicting {
                candidates: vec!["APT38".to_string(), "LAZARUS".to_string()]
            }
        );
    }

    #[test]
    fn lookup_falls_back_to_canonical_spelling() {
        let resolver = lazarus_resolver();
        assert_eq!(resolver.resolve("guardians-of-peace"), Some("LAZARUS".into()));
    }

    #[test]
    fn disabled_resolver_rejects_comma_rows() {
        let resolver = AliasResolver::disabled(GroupNameStyle::Plain);
        assert!(!resolver.is_alias_aware());
        assert_eq!(resolver.resolve("Sofacy"), Some("Sofacy".into()));
        assert_eq!(resolver.classify("Sofacy, APT28"), AliasResolution::MultiActor);
        assert_eq!(resolver.classify("   "), AliasResolution::Empty);
    }

    #[test]
    fn alias_map_parses_json() {
        let map = AliasMap::from_json_str(r#"{"Fancy Bear": "APT28", "Sofacy": "APT28"}"#, GroupNameStyle::Plain)
            .unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.lookup("Sofacy"), Some("APT28"));
        assert!(AliasMap::from_json_str("[1, 2]", GroupNameStyle::Plain).is_err());
    }
}
