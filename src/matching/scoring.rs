use serde::Serialize;
use std::collections::BTreeMap;

use crate::core::entity::{EntityRecord, ExampleEntity};
use crate::matching::algorithms::ScoringAlgorithm;
use crate::search::fetch::EntityResponse;

/// A scored candidate in a match response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchEntry {
    #[serde(flatten)]
    pub entity: EntityResponse,

    /// Score in `[0, 1]`
    pub score: f64,

    /// Raw value of every feature the algorithm computed
    pub features: BTreeMap<String, f64>,

    /// Score is at or above the match threshold
    #[serde(rename = "match")]
    pub is_match: bool,
}

/// Ranked candidates for one query
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredResults {
    pub results: Vec<MatchEntry>,
    /// Number of candidates scored, before the cutoff and limit
    pub considered: usize,
}

/// Score every candidate against the example and rank them.
///
/// Candidates scoring below `cutoff` are dropped; those at or above
/// `threshold` are flagged as matches. The sort is stable, so candidates
/// with equal scores keep the backend's order. At most `limit` entries are
/// returned. `cutoff` and `threshold` are applied as given, even when the
/// cutoff exceeds the threshold.
#[must_use]
pub fn score_results(
    algorithm: &dyn ScoringAlgorithm,
    query: &ExampleEntity,
    candidates: &[EntityRecord],
    threshold: f64,
    cutoff: f64,
    limit: usize,
) -> ScoredResults {
    let mut scored: Vec<(f64, BTreeMap<String, f64>, &EntityRecord)> = candidates
        .iter()
        .map(|candidate| {
            let result = algorithm.compare(query, candidate);
            (result.score, result.features, candidate)
        })
        .collect();

    scored.sort_by(|a, b| b.0.total_cmp(&a.0));

    let results = scored
        .into_iter()
        .filter(|(score, _, _)| *score >= cutoff)
        .take(limit)
        .map(|(score, features, candidate)| MatchEntry {
            entity: EntityResponse::from_record(candidate),
            score,
            features,
            is_match: score >= threshold,
        })
        .collect();

    ScoredResults {
        results,
        considered: candidates.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entity::EntityExample;
    use crate::matching::algorithms::NameBased;

    fn query() -> ExampleEntity {
        ExampleEntity::from_example(&EntityExample::new("Person").with("name", &["John Doe"]))
            .unwrap()
    }

    fn candidates() -> Vec<EntityRecord> {
        vec![
            EntityRecord::new("far", "Person").with_property("name", &["Xi Qiang"]),
            EntityRecord::new("near", "Person").with_property("name", &["John Dough"]),
            EntityRecord::new("exact-1", "Person").with_property("name", &["John Doe"]),
            EntityRecord::new("exact-2", "Person").with_property("name", &["john doe"]),
        ]
    }

    #[test]
    fn test_sorted_and_stable() {
        let scored = score_results(&NameBased, &query(), &candidates(), 0.7, 0.0, 10);
        let ids: Vec<&str> = scored.results.iter().map(|e| e.entity.id.as_str()).collect();
        assert_eq!(ids, vec!["exact-1", "exact-2", "near", "far"]);
        assert_eq!(scored.considered, 4);
        for pair in scored.results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_cutoff_threshold_and_limit() {
        let scored = score_results(&NameBased, &query(), &candidates(), 0.99, 0.5, 2);
        assert_eq!(scored.results.len(), 2);
        assert!(scored.results.iter().all(|e| e.score >= 0.5 && e.is_match));

        let scored = score_results(&NameBased, &query(), &candidates(), 0.99, 0.5, 10);
        assert!(scored.results.iter().all(|e| e.score >= 0.5));
        assert!(!scored.results.iter().any(|e| e.entity.id == "far"));
        let near = scored.results.iter().find(|e| e.entity.id == "near").unwrap();
        assert!(!near.is_match);
    }

    #[test]
    fn test_cutoff_above_threshold_applied_literally() {
        let scored = score_results(&NameBased, &query(), &candidates(), 0.1, 1.0, 10);
        assert_eq!(scored.results.len(), 2);
        assert!(scored.results.iter().all(|e| e.is_match));
    }

    #[test]
    fn test_no_candidates() {
        let scored = score_results(&NameBased, &query(), &[], 0.7, 0.5, 5);
        assert!(scored.results.is_empty());
        assert_eq!(scored.considered, 0);
    }

    #[test]
    fn test_entry_serialization() {
        let scored = score_results(&NameBased, &query(), &candidates()[2..3], 0.7, 0.5, 5);
        let json = serde_json::to_value(&scored.results[0]).unwrap();
        assert_eq!(json["id"], "exact-1");
        assert_eq!(json["match"], true);
        assert_eq!(json["features"]["name_jaro_winkler"], 1.0);
        assert_eq!(json["properties"]["name"][0], "John Doe");
    }
}
