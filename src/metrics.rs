use std::collections::HashMap;

use crate::graph::CorpusGraph;

/// Aggregate skew metrics for per-label sample counts.
#[derive(Clone, Debug, PartialEq)]
pub struct LabelSkew {
    pub total: usize,
    pub labels: usize,
    pub min: usize,
    pub max: usize,
    pub mean: f64,
    pub max_share: f64,
    pub min_share: f64,
    /// `max / min`; infinite when some label has no samples.
    pub ratio: f64,
    /// Largest label first, ties by name.
    pub per_label: Vec<LabelShare>,
}

/// One label's share of the corpus.
#[derive(Clone, Debug, PartialEq)]
pub struct LabelShare {
    pub label: String,
    pub count: usize,
    pub share: f64,
}

fn share(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

/// Compute skew metrics from per-label counts; `None` for an empty map.
pub fn label_skew(counts: &HashMap<String, usize>) -> Option<LabelSkew> {
    let min = *counts.values().min()?;
    let max = *counts.values().max()?;
    let total: usize = counts.values().sum();
    let labels = counts.len();
    let ratio = if min == 0 {
        f64::INFINITY
    } else {
        max as f64 / min as f64
    };
    let mut per_label: Vec<LabelShare> = counts
        .iter()
        .map(|(label, count)| LabelShare {
            label: label.clone(),
            count: *count,
            share: share(*count, total),
        })
        .collect();
    per_label.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    Some(LabelSkew {
        total,
        labels,
        min,
        max,
        mean: total as f64 / labels as f64,
        max_share: share(max, total),
        min_share: share(min, total),
        ratio,
        per_label,
    })
}

/// Samples per group name; with `folded_only`, only fold-assigned samples count.
pub fn label_counts(graph: &CorpusGraph, folded_only: bool) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for sample in graph.samples() {
        if folded_only && sample.fold_id.is_none() {
            continue;
        }
        if let Some(label) = graph.label_name(sample) {
            *counts.entry(label.to_string()).or_insert(0) += 1;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_skew_reports_balance() {
        let mut counts = HashMap::new();
        counts.insert("APT28".to_string(), 2);
        counts.insert("LAZARUS".to_string(), 2);
        let skew = label_skew(&counts).unwrap();
        assert_eq!(skew.total, 4);
        assert_eq!(skew.labels, 2);
        assert!((skew.max_share - 0.5).abs() < 1e-6);
        assert!((skew.ratio - 1.0).abs() < 1e-6);
        assert!(
            skew.per_label
                .iter()
                .all(|entry| (entry.share - 0.5).abs() < 1e-6)
        );
    }

    #[test]
    fn label_skew_orders_largest_first() {
        let mut counts = HashMap::new();
        counts.insert("APT1".to_string(), 4);
        counts.insert("APT28".to_string(), 2);
        counts.insert("APT29".to_string(), 2);
        let skew = label_skew(&counts).unwrap();
        assert_eq!(skew.min, 2);
        assert_eq!(skew.max, 4);
        assert!((skew.ratio - 2.0).abs() < 1e-6);
        assert_eq!(skew.per_label[0].label, "APT1");
        assert_eq!(skew.per_label[1].label, "APT28");
    }

    #[test]
    fn empty_counts_have_no_skew() {
        assert!(label_skew(&HashMap::new()).is_none());
    }
}
