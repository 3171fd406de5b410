use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord};
use tracing::{debug, info};

use crate::errors::CorpusError;
use crate::source::{ColumnLayout, DatasetProfile, FilterReason, RawReports, RawRow, RowFilter};

/// Rows that passed filtering plus per-reason drop counts.
#[derive(Clone, Debug, Default)]
pub struct RowBatch {
    pub rows: Vec<RawRow>,
    pub filtered: HashMap<FilterReason, usize>,
}

impl RowBatch {
    /// Total rows dropped by the filter.
    pub fn filtered_total(&self) -> usize {
        self.filtered.values().sum()
    }
}

/// Delimited-file row source for one dataset profile.
#[derive(Clone, Debug)]
pub struct CsvRowSource {
    path: PathBuf,
    profile: DatasetProfile,
    filter: RowFilter,
}

impl CsvRowSource {
    /// Source over `path` using the profile's default filter.
    pub fn new(path: impl Into<PathBuf>, profile: DatasetProfile) -> Self {
        Self {
            path: path.into(),
            profile,
            filter: profile.default_filter(),
        }
    }

    /// Replace the row filter.
    pub fn with_filter(mut self, filter: RowFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn profile(&self) -> DatasetProfile {
        self.profile
    }

    /// Read and filter every row. An unreadable file is fatal.
    pub fn read_rows(&self) -> Result<RowBatch, CorpusError> {
        let file = File::open(&self.path)?;
        let batch = read_filtered(file, self.profile, &self.filter)?;
        info!(
            "[apt_corpus:ingest] read {} rows from {} ({} filtered, profile={:?})",
            batch.rows.len(),
            self.path.display(),
            batch.filtered_total(),
            self.profile
        );
        Ok(batch)
    }
}

/// Column positions resolved from the header row.
struct ColumnIndex {
    country: usize,
    group: usize,
    file_type: usize,
    md5: usize,
    sha1: usize,
    sha256: usize,
    report_paths: Option<usize>,
    report_hashes: Option<usize>,
    report_url: Option<usize>,
    status: Option<usize>,
}

impl ColumnIndex {
    fn resolve(headers: &StringRecord, layout: &ColumnLayout) -> Result<Self, CorpusError> {
        let position = |name: &'static str| {
            headers
                .iter()
                .position(|header| header.trim() == name)
                .ok_or(CorpusError::MissingColumn { row: 0, column: name })
        };
        let optional = |name: Option<&'static str>| name.map(position).transpose();
        Ok(Self {
            country: position(layout.country)?,
            group: position(layout.group)?,
            file_type: position(layout.file_type)?,
            md5: position(layout.md5)?,
            sha1: position(layout.sha1)?,
            sha256: position(layout.sha256)?,
            report_paths: optional(layout.report_paths)?,
            report_hashes: optional(layout.report_hashes)?,
            report_url: optional(layout.report_url)?,
            // Status is advisory; datasets without it are accepted.
            status: layout
                .status
                .and_then(|name| headers.iter().position(|header| header.trim() == name)),
        })
    }

    fn row(&self, index: usize, record: &StringRecord) -> RawRow {
        let field = |position: usize| record.get(position).unwrap_or_default().trim().to_string();
        let reports = match (self.report_paths, self.report_hashes, self.report_url) {
            (Some(paths), Some(hashes), _) => RawReports::Listed {
                paths: field(paths),
                hashes: field(hashes),
            },
            (_, _, Some(url)) => RawReports::Url(field(url)),
            _ => RawReports::None,
        };
        RawRow {
            index,
            country: field(self.country),
            group: field(self.group),
            file_type: field(self.file_type),
            md5: field(self.md5),
            sha1: field(self.sha1),
            sha256: field(self.sha256),
            reports,
            status: self.status.map(field),
        }
    }
}

/// Parse delimited input for `profile`, applying `filter`.
pub fn read_filtered<R: Read>(
    reader: R,
    profile: DatasetProfile,
    filter: &RowFilter,
) -> Result<RowBatch, CorpusError> {
    let layout = profile.layout();
    let mut reader = ReaderBuilder::new()
        .delimiter(layout.delimiter)
        .flexible(true)
        .from_reader(reader);
    let headers = reader.headers()?.clone();
    let columns = ColumnIndex::resolve(&headers, &layout)?;

    let mut batch = RowBatch::default();
    for (index, record) in reader.records().enumerate() {
        let row = columns.row(index, &record?);
        if let Some(reason) = filter.rejects(&row) {
            debug!(
                "[apt_corpus:ingest] row {} filtered ({:?}): country='{}' group='{}'",
                index, reason, row.country, row.group
            );
            *batch.filtered.entry(reason).or_insert(0) += 1;
            continue;
        }
        batch.rows.push(row);
    }
    Ok(batch)
}
