use std::error::Error;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum, error::ErrorKind};
use tracing::{info, warn};

use crate::alias::AliasMap;
use crate::artifacts::{
    ArtifactParser, AstParser, DynamicParser, InMemoryStringStore, StringNgramParser,
    extract_batch, plan_units,
};
use crate::config::{
    ConflictPolicy, ExtractionConfig, FoldConfig, HashCase, IngestConfig, RowErrorPolicy,
};
use crate::constants::archive::DEFAULT_SNAPSHOT_DIR;
use crate::constants::artifacts::{
    DEFAULT_DYNAMIC_NGRAM, DEFAULT_SANDBOX_SUFFIX, DEFAULT_STRING_NGRAM,
};
use crate::constants::folds::{DEFAULT_N_SPLITS, DEFAULT_SEED};
use crate::errors::CorpusError;
use crate::features::{ArchiveFormat, FeatureArchive, build_feature_set};
use crate::folds::{FoldAssigner, FoldSummary};
use crate::graph::CorpusGraph;
use crate::ingestion::{CorpusBuilder, IngestReport};
use crate::metrics::{label_counts, label_skew};
use crate::repository::FileRepository;
use crate::source::{CsvRowSource, DatasetProfile, read_children_manifest};
use crate::transport::SampleFolder;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProfileArg {
    AptClass,
    CyberResearch,
}

impl From<ProfileArg> for DatasetProfile {
    fn from(value: ProfileArg) -> Self {
        match value {
            ProfileArg::AptClass => DatasetProfile::AptClass,
            ProfileArg::CyberResearch => DatasetProfile::CyberResearch,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ConflictArg {
    FirstWins,
    LastWins,
    Reject,
}

impl From<ConflictArg> for ConflictPolicy {
    fn from(value: ConflictArg) -> Self {
        match value {
            ConflictArg::FirstWins => ConflictPolicy::FirstWins,
            ConflictArg::LastWins => ConflictPolicy::LastWins,
            ConflictArg::Reject => ConflictPolicy::Reject,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum HashCaseArg {
    Upper,
    Lower,
}

impl From<HashCaseArg> for HashCase {
    fn from(value: HashCaseArg) -> Self {
        match value {
            HashCaseArg::Upper => HashCase::Upper,
            HashCaseArg::Lower => HashCase::Lower,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ExtractorArg {
    Ast,
    Strings,
    Dynamic,
}

#[derive(Debug, Parser)]
#[command(
    name = "apt-corpus",
    disable_help_subcommand = true,
    about = "Build labeled malware corpora and artifact feature matrices",
    long_about = "Ingest labeled sample listings into a deduplicated corpus snapshot with stratified folds, then extract per-sample artifact counts into feature archives.",
    after_help = "Every option also resolves from its APT_CORPUS_* environment variable before falling back to defaults."
)]
struct AptCorpusCli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Read a sample listing, assign folds, and write a corpus snapshot.
    Ingest(IngestArgs),
    /// Run one artifact extractor over a snapshot and write a feature archive.
    Extract(ExtractArgs),
}

#[derive(Debug, Args)]
struct SnapshotArgs {
    #[arg(
        long = "snapshot-path",
        value_name = "SNAPSHOT_PATH",
        env = "APT_CORPUS_SNAPSHOT_PATH",
        help = "Corpus snapshot file"
    )]
    snapshot_path: Option<PathBuf>,
    #[arg(
        long = "snapshot-dir",
        value_name = "DIR",
        env = "APT_CORPUS_SNAPSHOT_DIR",
        conflicts_with = "snapshot_path",
        help = "Directory holding the corpus snapshot (uses corpus.bin filename)"
    )]
    snapshot_dir: Option<PathBuf>,
}

impl SnapshotArgs {
    fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.snapshot_path {
            return path.clone();
        }
        let dir = self
            .snapshot_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SNAPSHOT_DIR));
        FileRepository::default_path_in_dir(dir)
    }
}

#[derive(Debug, Args)]
struct IngestArgs {
    #[arg(
        long,
        value_name = "CSV",
        env = "APT_CORPUS_INPUT",
        help = "Delimited sample listing"
    )]
    input: PathBuf,
    #[arg(
        long,
        value_enum,
        default_value = "apt-class",
        env = "APT_CORPUS_PROFILE",
        help = "Column layout and default row filters of the input"
    )]
    profile: ProfileArg,
    #[arg(
        long = "alias-map",
        value_name = "JSON",
        env = "APT_CORPUS_ALIAS_MAP",
        help = "Alias-to-group JSON object; enables alias resolution"
    )]
    alias_map: Option<PathBuf>,
    #[arg(
        long = "alias-aware",
        env = "APT_CORPUS_ALIAS_AWARE",
        help = "Resolve comma-joined actor fields even without an alias map"
    )]
    alias_aware: bool,
    #[arg(
        long,
        value_name = "CSV",
        env = "APT_CORPUS_CHILDREN",
        help = "Children manifest with parent_sha256,child_sha256 columns"
    )]
    children: Option<PathBuf>,
    #[arg(
        long = "conflict-policy",
        value_enum,
        default_value = "reject",
        env = "APT_CORPUS_CONFLICT_POLICY",
        help = "Handling of rows that relabel an existing sample"
    )]
    conflict_policy: ConflictArg,
    #[arg(
        long = "skip-invalid-rows",
        env = "APT_CORPUS_SKIP_INVALID_ROWS",
        help = "Record invalid rows in the report instead of aborting"
    )]
    skip_invalid_rows: bool,
    #[arg(
        long = "n-splits",
        default_value_t = DEFAULT_N_SPLITS,
        env = "APT_CORPUS_N_SPLITS",
        help = "Number of stratified folds"
    )]
    n_splits: u32,
    #[arg(
        long,
        default_value_t = DEFAULT_SEED,
        env = "APT_CORPUS_SEED",
        help = "Deterministic seed for fold shuffling"
    )]
    seed: u64,
    #[command(flatten)]
    snapshot: SnapshotArgs,
}

#[derive(Debug, Args)]
struct ExtractArgs {
    #[arg(
        long,
        value_enum,
        env = "APT_CORPUS_EXTRACTOR",
        help = "Artifact extractor to run"
    )]
    extractor: ExtractorArg,
    #[command(flatten)]
    snapshot: SnapshotArgs,
    #[arg(
        long = "sample-folder",
        value_name = "DIR",
        env = "APT_CORPUS_SAMPLE_FOLDER",
        help = "Root of the <prefix>/<hash>/ artifact layout (ast, dynamic)"
    )]
    sample_folder: Option<PathBuf>,
    #[arg(
        long = "hash-case",
        value_enum,
        default_value = "upper",
        env = "APT_CORPUS_HASH_CASE",
        help = "Spelling of hashes in artifact paths"
    )]
    hash_case: HashCaseArg,
    #[arg(
        long = "strings",
        value_name = "JSONL",
        env = "APT_CORPUS_STRINGS",
        help = "JSON-lines strings export with FileSHA256/Strings fields (strings)"
    )]
    strings: Option<PathBuf>,
    #[arg(
        long = "string-ngram",
        default_value_t = DEFAULT_STRING_NGRAM,
        value_parser = parse_positive_usize,
        env = "APT_CORPUS_STRING_NGRAM",
        help = "Character n-gram size for user strings"
    )]
    string_ngram: usize,
    #[arg(
        long = "dynamic-ngram",
        default_value_t = DEFAULT_DYNAMIC_NGRAM,
        value_parser = parse_positive_usize,
        env = "APT_CORPUS_DYNAMIC_NGRAM",
        help = "Character n-gram size for sandbox behavior channels"
    )]
    dynamic_ngram: usize,
    #[arg(
        long = "sandbox-suffix",
        default_value = DEFAULT_SANDBOX_SUFFIX,
        env = "APT_CORPUS_SANDBOX_SUFFIX",
        help = "Sandbox summary suffix (<hash>_<suffix>.json)"
    )]
    sandbox_suffix: String,
    #[arg(
        long,
        default_value_t = 0,
        env = "APT_CORPUS_THREADS",
        help = "Extraction worker threads (0 uses all cores)"
    )]
    threads: usize,
    #[arg(
        long,
        value_name = "PATH",
        env = "APT_CORPUS_OUTPUT",
        help = "Feature archive output path"
    )]
    output: PathBuf,
    #[arg(
        long,
        value_enum,
        default_value = "bitcode",
        env = "APT_CORPUS_FORMAT",
        help = "Feature archive encoding"
    )]
    format: ArchiveFormat,
}

/// Run the `apt-corpus` command line (`args_iter` excludes the program name).
pub fn run_apt_corpus<I>(args_iter: I) -> Result<(), Box<dyn Error>>
where
    I: Iterator<Item = String>,
{
    let Some(cli) =
        parse_cli::<AptCorpusCli, _>(std::iter::once("apt-corpus".to_string()).chain(args_iter))?
    else {
        return Ok(());
    };
    match cli.command {
        Command::Ingest(args) => {
            let (graph, report, summary) = run_ingest(&args)?;
            print_ingest_report(&report);
            print_fold_summary(&summary);
            print_label_skew(&graph);
        }
        Command::Extract(args) => {
            let archive = run_extract(&args)?;
            let (rows, cols) = archive.matrix.shape();
            println!("=== {} features ===", archive.extractor);
            println!("rows: {rows}");
            println!("features: {cols}");
            println!("output: {}", args.output.display());
        }
    }
    Ok(())
}

fn run_ingest(args: &IngestArgs) -> Result<(CorpusGraph, IngestReport, FoldSummary), CorpusError> {
    let profile = DatasetProfile::from(args.profile);
    let config = IngestConfig::default()
        .with_alias_aware(args.alias_aware)
        .with_group_style(profile.group_style())
        .with_conflict_policy(args.conflict_policy.into())
        .with_row_errors(if args.skip_invalid_rows {
            RowErrorPolicy::Skip
        } else {
            RowErrorPolicy::Abort
        });
    let assigner = FoldAssigner::new(FoldConfig {
        n_splits: args.n_splits,
        seed: args.seed,
    })?;

    let batch = CsvRowSource::new(&args.input, profile).read_rows()?;
    let snapshot_path = args.snapshot.resolve();
    let repository = FileRepository::create(&snapshot_path)?;
    let mut builder = CorpusBuilder::new(config, repository);
    if let Some(path) = &args.alias_map {
        let map = AliasMap::load(path, profile.group_style())?;
        info!(
            "[apt_corpus:ingest] loaded {} aliases from {}",
            map.len(),
            path.display()
        );
        builder = builder.with_alias_map(map);
    }
    builder.ingest_rows(batch.rows)?;

    if let Some(path) = &args.children {
        attach_children(&mut builder, path)?;
    }

    let (mut graph, report, mut repository) = builder.finish()?;
    let summary = assigner.apply(&mut graph, &mut repository)?;
    info!(
        "[apt_corpus:ingest] snapshot written to {}",
        repository.path().display()
    );
    Ok((graph, report, summary))
}

fn attach_children(
    builder: &mut CorpusBuilder<FileRepository>,
    path: &Path,
) -> Result<(), CorpusError> {
    let links = read_children_manifest(path)?;
    let mut unmatched = 0usize;
    for link in &links {
        match builder.attach_child(&link.parent_sha256, &link.child_sha256) {
            Ok(_) => {}
            // Parents may have been filtered or rejected upstream.
            Err(err @ (CorpusError::UnknownSample(_) | CorpusError::InvalidHash { .. })) => {
                warn!("[apt_corpus:ingest] children manifest: {}", err);
                unmatched += 1;
            }
            Err(err) => return Err(err),
        }
    }
    info!(
        "[apt_corpus:ingest] children manifest {}: {} links, {} unmatched",
        path.display(),
        links.len(),
        unmatched
    );
    Ok(())
}

fn run_extract(args: &ExtractArgs) -> Result<FeatureArchive, CorpusError> {
    let snapshot_path = args.snapshot.resolve();
    let graph = CorpusGraph::from_records(FileRepository::load(&snapshot_path)?)?;
    info!(
        "[apt_corpus:extract] loaded {} samples ({} fold-assigned) from {}",
        graph.samples().len(),
        graph.fold_assigned().count(),
        snapshot_path.display()
    );

    let mut config = ExtractionConfig::default()
        .with_string_ngram(args.string_ngram)
        .with_dynamic_ngram(args.dynamic_ngram)
        .with_path_case(args.hash_case.into())
        .with_threads(args.threads);
    config.sandbox_suffix = args.sandbox_suffix.clone();
    if let Some(folder) = &args.sample_folder {
        config.sample_folder = folder.clone();
    }
    let config = config.validated()?;

    let parser = build_parser(args, &config)?;
    let units = plan_units(&graph, parser.expands_children())?;
    let batch = extract_batch(parser.as_ref(), &units, config.threads)?;
    if batch.is_empty() {
        return Err(CorpusError::DegenerateCorpus(format!(
            "{} extractor produced no rows from {} units",
            parser.name(),
            units.len()
        )));
    }
    let set = build_feature_set(&batch.extractions, &batch.row_ids)?;
    let archive = FeatureArchive::new(parser.name(), set);
    archive.write(&args.output, args.format)?;
    Ok(archive)
}

fn build_parser(
    args: &ExtractArgs,
    config: &ExtractionConfig,
) -> Result<Box<dyn ArtifactParser>, CorpusError> {
    let require_folder = || {
        if args.sample_folder.is_none() {
            return Err(CorpusError::Configuration(
                "--sample-folder is required for this extractor".into(),
            ));
        }
        Ok(SampleFolder::from_config(config))
    };
    Ok(match args.extractor {
        ExtractorArg::Ast => Box::new(AstParser::new(require_folder()?)),
        ExtractorArg::Dynamic => Box::new(DynamicParser::new(
            require_folder()?,
            config.sandbox_suffix.clone(),
            config.dynamic_ngram,
        )),
        ExtractorArg::Strings => {
            let path = args.strings.as_ref().ok_or_else(|| {
                CorpusError::Configuration("--strings is required for the strings extractor".into())
            })?;
            let store = InMemoryStringStore::load_json_lines(path)?;
            Box::new(StringNgramParser::new(store, config.string_ngram))
        }
    })
}

fn print_ingest_report(report: &IngestReport) {
    println!("=== ingest ===");
    println!("rows seen: {}", report.rows_seen);
    println!("rows ingested: {}", report.rows_ingested);
    println!("rows skipped: {}", report.rows_skipped());
    println!("  ambiguous aliases: {}", report.ambiguous_alias_rows);
    println!("  multi-actor: {}", report.multi_actor_rows);
    println!("  invalid: {}", report.invalid_rows.len());
    println!("label conflicts: {}", report.label_conflicts);
    println!("duplicate samples: {}", report.duplicate_samples);
    println!(
        "group-country mismatches: {}",
        report.group_country_mismatches
    );
    println!("children attached: {}", report.children_attached);
    for issue in &report.invalid_rows {
        println!("  row {}: {}", issue.row, issue.reason);
    }
    println!();
}

fn print_fold_summary(summary: &FoldSummary) {
    println!("=== folds (k={}) ===", summary.n_splits);
    println!("retained: {}", summary.retained);
    println!("excluded: {}", summary.excluded);
    if !summary.excluded_labels.is_empty() {
        println!("excluded labels: {}", summary.excluded_labels.join(", "));
    }
    for (index, size) in summary.fold_sizes.iter().enumerate() {
        println!("  fold {}: {}", index + 1, size);
    }
    println!();
}

fn print_label_skew(graph: &CorpusGraph) {
    let Some(skew) = label_skew(&label_counts(graph, true)) else {
        return;
    };
    println!("--- fold-assigned samples by label ---");
    for entry in &skew.per_label {
        println!(
            "{}: count={} share={:.2}",
            entry.label, entry.count, entry.share
        );
    }
    println!(
        "skew: labels={} total={} min={} max={} mean={:.2} ratio={:.2}",
        skew.labels, skew.total, skew.min, skew.max, skew.mean, skew.ratio
    );
}

fn parse_positive_usize(raw: &str) -> Result<usize, String> {
    let parsed = raw
        .parse::<usize>()
        .map_err(|_| format!("Could not parse '{}' as a positive integer", raw))?;
    if parsed == 0 {
        return Err("value must be greater than zero".to_string());
    }
    Ok(parsed)
}

fn parse_cli<T, I>(args: I) -> Result<Option<T>, Box<dyn Error>>
where
    T: Parser,
    I: IntoIterator,
    I::Item: Into<std::ffi::OsString> + Clone,
{
    match T::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                err.print()?;
                Ok(None)
            }
            _ => Err(err.into()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn sha(ch: char) -> String {
        ch.to_string().repeat(64)
    }

    fn listing() -> String {
        let mut out = String::from(
            "apt_country|apt_name|vt_file_type|vt_md5|vt_sha1|checked_sha256|path|report_hash\n",
        );
        for (group, ch) in [
            ("APT28", 'a'),
            ("APT28", 'b'),
            ("Lazarus", 'c'),
            ("Lazarus", 'd'),
            ("Turla", 'e'),
        ] {
            out.push_str(&format!(
                "Russia|{group}|Win32 EXE|{}|{}|{}|[]|\n",
                ch.to_string().repeat(32),
                ch.to_string().repeat(40),
                sha(ch)
            ));
        }
        out
    }

    fn args(parts: &[&str]) -> AptCorpusCli {
        AptCorpusCli::try_parse_from(std::iter::once("apt-corpus").chain(parts.iter().copied()))
            .unwrap()
    }

    #[test]
    fn ingest_then_extract_writes_archive() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("listing.csv");
        fs::write(&input, listing()).unwrap();
        let snapshot = dir.path().join("store").join("corpus.bin");
        let samples = dir.path().join("samples");
        for ch in ['a', 'c'] {
            let folder = SampleFolder::new(&samples, HashCase::Upper);
            let path = folder.ast_path(&sha(ch));
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, "type:Call\ntype:If\n").unwrap();
        }

        let Command::Ingest(ingest) = args(&[
            "ingest",
            "--input",
            input.to_str().unwrap(),
            "--n-splits",
            "2",
            "--snapshot-path",
            snapshot.to_str().unwrap(),
        ])
        .command
        else {
            panic!("expected ingest");
        };
        let (graph, report, summary) = run_ingest(&ingest).unwrap();
        assert_eq!(report.rows_ingested, 5);
        assert_eq!(summary.retained, 4);
        assert_eq!(summary.excluded_labels, vec!["TURLA".to_string()]);
        assert_eq!(graph.fold_assigned().count(), 4);

        let output = dir.path().join("ast.json");
        let Command::Extract(extract) = args(&[
            "extract",
            "--extractor",
            "ast",
            "--snapshot-path",
            snapshot.to_str().unwrap(),
            "--sample-folder",
            samples.to_str().unwrap(),
            "--output",
            output.to_str().unwrap(),
            "--format",
            "json",
        ])
        .command
        else {
            panic!("expected extract");
        };
        let archive = run_extract(&extract).unwrap();
        assert_eq!(archive.matrix.shape(), (2, 2));
        assert_eq!(archive.feature_labels(), vec!["Call", "If"]);
        assert_eq!(FeatureArchive::read(&output).unwrap(), archive);
    }

    #[test]
    fn extractors_require_their_inputs() {
        let Command::Extract(extract) = args(&[
            "extract",
            "--extractor",
            "strings",
            "--output",
            "out.bin",
        ])
        .command
        else {
            panic!("expected extract");
        };
        let config = ExtractionConfig::default();
        assert!(matches!(
            build_parser(&extract, &config),
            Err(CorpusError::Configuration(_))
        ));
    }

    #[test]
    fn snapshot_dir_uses_default_filename() {
        let Command::Ingest(ingest) = args(&[
            "ingest",
            "--input",
            "x.csv",
            "--snapshot-dir",
            "/tmp/store",
        ])
        .command
        else {
            panic!("expected ingest");
        };
        assert_eq!(
            ingest.snapshot.resolve(),
            PathBuf::from("/tmp/store/corpus.bin")
        );
        assert!(
            AptCorpusCli::try_parse_from([
                "apt-corpus",
                "ingest",
                "--input",
                "x.csv",
                "--snapshot-dir",
                "a",
                "--snapshot-path",
                "b"
            ])
            .is_err()
        );
        assert!(
            AptCorpusCli::try_parse_from([
                "apt-corpus",
                "extract",
                "--extractor",
                "ast",
                "--output",
                "o",
                "--string-ngram",
                "0"
            ])
            .is_err()
        );
    }
}
