use std::collections::{BTreeSet, HashMap};

use apt_corpus::{
    CorpusBuilder, CorpusError, CorpusGraph, EntityKind, FoldAssigner, FoldConfig, FoldId,
    IngestConfig, InMemoryRepository, RawReports, RawRow, label_counts, label_skew,
};

fn sha(n: usize) -> String {
    format!("{n:064X}")
}

fn row(index: usize, group: &str) -> RawRow {
    RawRow {
        index,
        country: "China".into(),
        group: group.into(),
        file_type: "Win32 EXE".into(),
        md5: format!("{index:032X}"),
        sha1: format!("{index:040X}"),
        sha256: sha(index),
        reports: RawReports::None,
        status: None,
    }
}

fn corpus(groups: &[(&str, usize)], repository: &mut InMemoryRepository) -> CorpusGraph {
    let mut builder = CorpusBuilder::new(IngestConfig::default(), repository);
    let mut index = 0;
    for (group, count) in groups {
        for _ in 0..*count {
            builder.ingest_row(&row(index, group)).unwrap();
            index += 1;
        }
    }
    let (graph, _, _) = builder.finish().unwrap();
    graph
}

fn folds_by_label(graph: &CorpusGraph) -> HashMap<String, Vec<FoldId>> {
    let mut out: HashMap<String, Vec<FoldId>> = HashMap::new();
    for sample in graph.fold_assigned() {
        let label = graph.label_name(sample).unwrap().to_string();
        out.entry(label).or_default().extend(sample.fold_id);
    }
    out
}

#[test]
fn apply_commits_once_per_fold_and_excludes_small_labels() {
    let mut repository = InMemoryRepository::new();
    let mut graph = corpus(&[("APT10", 4), ("APT41", 6), ("Winnti", 3)], &mut repository);
    assert_eq!(repository.commit_count(), 1);

    let assigner = FoldAssigner::new(FoldConfig { n_splits: 4, seed: 7 }).unwrap();
    let summary = assigner.apply(&mut graph, &mut repository).unwrap();

    assert_eq!(summary.retained, 10);
    assert_eq!(summary.excluded, 3);
    assert_eq!(summary.fold_sizes.iter().sum::<usize>(), 10);
    assert!(summary.fold_sizes.iter().all(|size| (2..=3).contains(size)));
    assert_eq!(repository.commit_count(), 1 + 4);
    assert_eq!(repository.update_count(EntityKind::Sample), 10);

    let by_label = folds_by_label(&graph);
    assert!(!by_label.contains_key("WINNTI"));
    let apt10: BTreeSet<FoldId> = by_label["APT10"].iter().copied().collect();
    assert_eq!(apt10, (1..=4).collect::<BTreeSet<FoldId>>());

    let skew = label_skew(&label_counts(&graph, true)).unwrap();
    assert_eq!(skew.labels, 2);
    assert_eq!(skew.total, 10);
    assert_eq!(skew.max, 6);
}

#[test]
fn folds_are_immutable_once_assigned() {
    let mut repository = InMemoryRepository::new();
    let mut graph = corpus(&[("APT10", 2)], &mut repository);
    let assigner = FoldAssigner::new(FoldConfig { n_splits: 2, seed: 42 }).unwrap();
    assigner.apply(&mut graph, &mut repository).unwrap();
    let commits = repository.commit_count();
    let before: Vec<_> = graph.samples().iter().map(|s| s.fold_id).collect();

    let err = assigner.apply(&mut graph, &mut repository).unwrap_err();
    assert!(matches!(err, CorpusError::FoldAlreadyAssigned { .. }));
    assert_eq!(repository.commit_count(), commits);
    let after: Vec<_> = graph.samples().iter().map(|s| s.fold_id).collect();
    assert_eq!(before, after);
}

#[test]
fn same_seed_reproduces_assignment_across_runs() {
    let run = |seed: u64| {
        let mut repository = InMemoryRepository::new();
        let mut graph = corpus(&[("APT10", 5), ("APT41", 5)], &mut repository);
        FoldAssigner::new(FoldConfig { n_splits: 5, seed })
            .unwrap()
            .apply(&mut graph, &mut repository)
            .unwrap();
        graph
            .samples()
            .iter()
            .map(|s| s.fold_id)
            .collect::<Vec<_>>()
    };
    assert_eq!(run(42), run(42));
    assert!(run(42).iter().all(Option::is_some));
}
