use crate::snapshot::Snapshot;
use serde::Serialize;
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedDocument {
    pub path: String,
    pub score: f64,
}

/// Ranks the documents of a snapshot against a list of terms.
#[derive(Debug, Clone, Copy)]
pub struct QueryEngine {
    min_score: f64,
}

impl Default for QueryEngine {
    fn default() -> Self {
        Self { min_score: 0.0 }
    }
}

impl QueryEngine {
    /// Documents scoring at or below `min_score` are left out of results.
    pub fn new(min_score: f64) -> Self {
        Self { min_score: min_score.max(0.0) }
    }

    pub fn min_score(&self) -> f64 {
        self.min_score
    }

    /// Score every document as the sum of its TF-IDF scores for `terms` and
    /// return matches best first. Equal scores keep snapshot order.
    pub fn rank(&self, snapshot: &Snapshot, terms: &[String]) -> Vec<RankedDocument> {
        if terms.is_empty() {
            return Vec::new();
        }
        let mut ranked: Vec<RankedDocument> = snapshot
            .entries()
            .iter()
            .filter_map(|entry| {
                let score: f64 = terms.iter().filter_map(|t| entry.scores.get(t)).sum();
                (score > self.min_score).then(|| RankedDocument { path: entry.path.clone(), score })
            })
            .collect();
        // sort_by is stable, so ties stay in corpus order
        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SnapshotEntry;
    use std::collections::HashMap;

    fn snapshot(entries: &[(&str, &[(&str, f64)])]) -> Snapshot {
        Snapshot::from_entries(
            entries
                .iter()
                .map(|(path, scores)| SnapshotEntry {
                    path: path.to_string(),
                    scores: scores.iter().map(|(t, s)| (t.to_string(), *s)).collect::<HashMap<_, _>>(),
                })
                .collect(),
        )
    }

    fn terms(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn sums_matching_terms() {
        let snap = snapshot(&[
            ("rare.txt", &[("zebra", 0.9)]),
            ("both.txt", &[("zebra", 0.5), ("stripe", 0.6)]),
        ]);
        let ranked = QueryEngine::default().rank(&snap, &terms(&["zebra", "stripe"]));
        assert_eq!(ranked[0].path, "both.txt");
        assert!((ranked[0].score - 1.1).abs() < 1e-12);
        assert_eq!(ranked[1].path, "rare.txt");
    }

    #[test]
    fn ties_keep_snapshot_order() {
        let snap = snapshot(&[("b.txt", &[("x", 1.0)]), ("a.txt", &[("x", 1.0)]), ("c.txt", &[("x", 1.0)])]);
        let paths: Vec<String> = QueryEngine::default().rank(&snap, &terms(&["x"])).into_iter().map(|r| r.path).collect();
        assert_eq!(paths, vec!["b.txt", "a.txt", "c.txt"]);
    }

    #[test]
    fn excludes_non_positive_and_below_threshold() {
        let snap = snapshot(&[("zero.txt", &[("x", 0.0)]), ("tiny.txt", &[("x", 0.005)]), ("big.txt", &[("x", 0.5)])]);
        assert_eq!(QueryEngine::default().rank(&snap, &terms(&["x"])).len(), 2);
        let ranked = QueryEngine::new(0.01).rank(&snap, &terms(&["x"]));
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].path, "big.txt");
    }

    #[test]
    fn empty_inputs_give_empty_results() {
        assert!(QueryEngine::default().rank(&Snapshot::empty(), &terms(&["x"])).is_empty());
        let snap = snapshot(&[("a.txt", &[("x", 1.0)])]);
        assert!(QueryEngine::default().rank(&snap, &[]).is_empty());
        assert!(QueryEngine::default().rank(&snap, &terms(&["unknown"])).is_empty());
    }
}
