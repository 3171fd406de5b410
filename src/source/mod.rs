//! Raw row model, dataset profiles, and caller-side row filters.
//!
//! Ownership model:
//! - A row source reads delimited records and applies its `RowFilter`.
//! - Rows that survive filtering reach `CorpusBuilder` untouched; all
//!   normalization and validation happens there.

use serde::{Deserialize, Serialize};

use crate::constants::source::{
    APTCLASS_EXCLUDED_COUNTRIES, APTCLASS_EXCLUDED_GROUPS, CYBER_RESEARCH_EXCLUDED_STATUS,
    CYBER_RESEARCH_FILE_TYPES,
};
use crate::normalize::GroupNameStyle;

/// Delimited-file row sources.
pub mod csv_source;
/// Children manifest reader.
pub mod manifest;

pub use csv_source::{CsvRowSource, RowBatch};
pub use manifest::read_children_manifest;

/// Report references carried by a row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RawReports {
    /// List literal of report paths plus a parallel comma-joined hash list.
    Listed { paths: String, hashes: String },
    /// A single report identified by its URL.
    Url(String),
    None,
}

/// One input record before normalization or validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRow {
    /// Zero-based data-row position in the input (headers excluded).
    pub index: usize,
    pub country: String,
    /// Actor field, possibly comma-joined aliases.
    pub group: String,
    pub file_type: String,
    pub md5: String,
    pub sha1: String,
    pub sha256: String,
    pub reports: RawReports,
    pub status: Option<String>,
}

/// Why a row was filtered before ingestion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterReason {
    Country,
    Group,
    Status,
    FileType,
}

/// Caller-supplied row predicates (substring exclusions and an allow-list).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RowFilter {
    /// Drop rows whose country contains any of these substrings.
    pub excluded_countries: Vec<String>,
    /// Drop rows whose actor field contains any of these substrings.
    pub excluded_groups: Vec<String>,
    /// Drop rows whose status contains any of these substrings.
    pub excluded_statuses: Vec<String>,
    /// Keep only rows whose file type is listed, when set.
    pub allowed_file_types: Option<Vec<String>>,
}

impl RowFilter {
    /// Filter that accepts every row.
    pub fn accept_all() -> Self {
        Self::default()
    }

    /// First reason `row` is rejected, or `None` if it passes.
    pub fn rejects(&self, row: &RawRow) -> Option<FilterReason> {
        let contains_any =
            |value: &str, needles: &[String]| needles.iter().any(|needle| value.contains(needle.as_str()));
        if contains_any(&row.country, &self.excluded_countries) {
            return Some(FilterReason::Country);
        }
        if contains_any(&row.group, &self.excluded_groups) {
            return Some(FilterReason::Group);
        }
        if let Some(status) = row.status.as_deref()
            && contains_any(status, &self.excluded_statuses)
        {
            return Some(FilterReason::Status);
        }
        if let Some(allowed) = self.allowed_file_types.as_ref()
            && !allowed.iter().any(|file_type| file_type == &row.file_type)
        {
            return Some(FilterReason::FileType);
        }
        None
    }
}

/// Column layout of a supported input dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColumnLayout {
    pub delimiter: u8,
    pub country: &'static str,
    pub group: &'static str,
    pub file_type: &'static str,
    pub md5: &'static str,
    pub sha1: &'static str,
    pub sha256: &'static str,
    /// Report path list literal column (paired with `report_hashes`).
    pub report_paths: Option<&'static str>,
    pub report_hashes: Option<&'static str>,
    /// Single report URL column.
    pub report_url: Option<&'static str>,
    pub status: Option<&'static str>,
}

/// Supported input datasets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatasetProfile {
    /// Pipe-delimited APTClass export with report path/hash lists.
    AptClass,
    /// Comma-delimited cyber-research overview with one report URL per row.
    CyberResearch,
}

impl DatasetProfile {
    pub fn layout(self) -> ColumnLayout {
        match self {
            DatasetProfile::AptClass => ColumnLayout {
                delimiter: b'|',
                country: "apt_country",
                group: "apt_name",
                file_type: "vt_file_type",
                md5: "vt_md5",
                sha1: "vt_sha1",
                sha256: "checked_sha256",
                report_paths: Some("path"),
                report_hashes: Some("report_hash"),
                report_url: None,
                status: None,
            },
            DatasetProfile::CyberResearch => ColumnLayout {
                delimiter: b',',
                country: "Country",
                group: "APT-group",
                file_type: "Filetype",
                md5: "MD5",
                sha1: "SHA1",
                sha256: "SHA256",
                report_paths: None,
                report_hashes: None,
                report_url: Some("Source"),
                status: Some("Status"),
            },
        }
    }

    /// Filters the dataset's authors recommend, plus known-ambiguous countries.
    ///
    /// With alias resolution disabled, comma-joined actor fields are rejected
    /// later by the alias resolver, not here.
    pub fn default_filter(self) -> RowFilter {
        let owned = |values: &[&str]| values.iter().map(|value| value.to_string()).collect();
        match self {
            DatasetProfile::AptClass => RowFilter {
                excluded_countries: owned(APTCLASS_EXCLUDED_COUNTRIES),
                excluded_groups: owned(APTCLASS_EXCLUDED_GROUPS),
                ..RowFilter::default()
            },
            DatasetProfile::CyberResearch => RowFilter {
                excluded_statuses: owned(CYBER_RESEARCH_EXCLUDED_STATUS),
                allowed_file_types: Some(owned(CYBER_RESEARCH_FILE_TYPES)),
                ..RowFilter::default()
            },
        }
    }

    /// Group-name canonicalization used by this dataset.
    pub fn group_style(self) -> GroupNameStyle {
        match self {
            DatasetProfile::AptClass => GroupNameStyle::Plain,
            DatasetProfile::CyberResearch => GroupNameStyle::CollapseAptPrefix,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(country: &str, group: &str, file_type: &str, status: Option<&str>) -> RawRow {
        RawRow {
            index: 0,
            country: country.into(),
            group: group.into(),
            file_type: file_type.into(),
            md5: String::new(),
            sha1: String::new(),
            sha256: String::new(),
            reports: RawReports::None,
            status: status.map(str::to_string),
        }
    }

    #[test]
    fn aptclass_filter_drops_ambiguous_countries_and_unknown_actors() {
        let filter = DatasetProfile::AptClass.default_filter();
        assert_eq!(
            filter.rejects(&row("North Korea South Korea", "Lazarus", "Win32 EXE", None)),
            Some(FilterReason::Country)
        );
        assert_eq!(
            filter.rejects(&row("China, Iran", "APT1", "Win32 EXE", None)),
            Some(FilterReason::Country)
        );
        assert_eq!(
            filter.rejects(&row("China", "unknown", "Win32 EXE", None)),
            Some(FilterReason::Group)
        );
        assert_eq!(filter.rejects(&row("China", "APT1", "ZIP", None)), None);
    }

    #[test]
    fn cyber_research_filter_checks_status_and_file_type() {
        let filter = DatasetProfile::CyberResearch.default_filter();
        assert_eq!(
            filter.rejects(&row("Russia", "APT 28", "Win32 EXE", Some("X"))),
            Some(FilterReason::Status)
        );
        assert_eq!(
            filter.rejects(&row("Russia", "APT 28", "PDF", Some(""))),
            Some(FilterReason::FileType)
        );
        assert_eq!(
            filter.rejects(&row("Russia", "APT 28", "Win32 DLL", None)),
            None
        );
        assert!(RowFilter::accept_all()
            .rejects(&row("unknown", "unknown", "PDF", Some("X")))
            .is_none());
    }

    #[test]
    fn profiles_expose_layouts_and_styles() {
        assert_eq!(DatasetProfile::AptClass.layout().delimiter, b'|');
        assert_eq!(DatasetProfile::CyberResearch.layout().report_url, Some("Source"));
        assert_eq!(
            DatasetProfile::CyberResearch.group_style(),
            GroupNameStyle::CollapseAptPrefix
        );
    }
}
