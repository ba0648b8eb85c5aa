//! Scoring algorithms.
//!
//! An algorithm compares a validated example with one candidate record and
//! returns a score in `[0, 1]` together with the raw value of every feature it
//! computed. Features are in `[0, 1]`; negative features lower the score.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::core::entity::{EntityRecord, ExampleEntity, PropertyAccess};
use crate::core::schema::PropertyType;
use crate::utils::text::{normalize_name, sorted_tokens};
use crate::utils::validation::normalize_identifier;

/// A named scoring feature and its weight in the algorithm
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Feature {
    pub name: &'static str,
    pub description: &'static str,
    pub weight: f64,
}

/// Score of one candidate with the per-feature breakdown
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlgorithmScore {
    pub score: f64,
    pub features: BTreeMap<String, f64>,
}

impl AlgorithmScore {
    /// Weighted sum of the features, clamped to `[0, 1]`
    fn weighted(features: &[Feature], values: &[f64]) -> Self {
        let mut score = 0.0;
        let mut breakdown = BTreeMap::new();
        for (feature, value) in features.iter().zip(values) {
            score += feature.weight * value;
            breakdown.insert(feature.name.to_string(), *value);
        }
        Self {
            score: clamp_score(score),
            features: breakdown,
        }
    }
}

/// Clamp to `[0, 1]`, mapping NaN to 0
#[must_use]
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

/// A candidate scoring function
pub trait ScoringAlgorithm: Send + Sync {
    /// Registry name, lowercase
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn features(&self) -> &'static [Feature];

    /// Score a candidate against the example
    fn compare(&self, query: &ExampleEntity, candidate: &EntityRecord) -> AlgorithmScore;
}

fn normalized_names(entity: &impl PropertyAccess) -> Vec<String> {
    let mut names: Vec<String> = entity
        .names()
        .iter()
        .map(|n| normalize_name(n))
        .filter(|n| !n.is_empty())
        .collect();
    if names.is_empty() {
        names = entity
            .type_values(PropertyType::Name)
            .into_iter()
            .map(normalize_name)
            .filter(|n| !n.is_empty())
            .collect();
    }
    names
}

/// 1.0 if any name of the query equals a name of the candidate
fn name_literal_match(query: &[String], candidate: &[String]) -> f64 {
    let hit = query.iter().any(|q| candidate.contains(q));
    if hit {
        1.0
    } else {
        0.0
    }
}

/// Best Jaro-Winkler similarity over all name pairs, ignoring token order
fn name_jaro_winkler(query: &[String], candidate: &[String]) -> f64 {
    let mut best: f64 = 0.0;
    for q in query {
        let q_sorted = sorted_tokens(q);
        for c in candidate {
            let direct = strsim::jaro_winkler(q, c);
            let sorted = strsim::jaro_winkler(&q_sorted, &sorted_tokens(c));
            best = best.max(direct).max(sorted);
        }
    }
    best
}

fn identifiers(entity: &impl PropertyAccess) -> Vec<String> {
    entity
        .type_values(PropertyType::Identifier)
        .into_iter()
        .map(normalize_identifier)
        .filter(|i| !i.is_empty())
        .collect()
}

/// 1.0 if the entities share an identifier
fn identifier_match(query: &ExampleEntity, candidate: &EntityRecord) -> f64 {
    let candidate_ids = identifiers(candidate);
    let hit = identifiers(query).iter().any(|q| candidate_ids.contains(q));
    if hit {
        1.0
    } else {
        0.0
    }
}

/// 1.0 if both entities name countries and none overlap
fn country_mismatch(query: &ExampleEntity, candidate: &EntityRecord) -> f64 {
    let q: Vec<String> = query
        .type_values(PropertyType::Country)
        .into_iter()
        .map(str::to_lowercase)
        .collect();
    let c: Vec<String> = candidate
        .type_values(PropertyType::Country)
        .into_iter()
        .map(str::to_lowercase)
        .collect();
    if q.is_empty() || c.is_empty() || q.iter().any(|x| c.contains(x)) {
        0.0
    } else {
        1.0
    }
}

/// 1.0 if both entities carry dates and none agree on the given prefix
/// length (4 for years, 10 for full days). Dates shorter than the prefix
/// are ignored.
fn date_disjoint(query: &ExampleEntity, candidate: &EntityRecord, prefix: usize) -> f64 {
    let prefixes = |values: Vec<&str>| -> Vec<String> {
        values
            .into_iter()
            .filter_map(|d| d.get(..prefix))
            .map(str::to_string)
            .collect()
    };
    let q = prefixes(query.type_values(PropertyType::Date));
    let c = prefixes(candidate.type_values(PropertyType::Date));
    if q.is_empty() || c.is_empty() || q.iter().any(|x| c.contains(x)) {
        0.0
    } else {
        1.0
    }
}

/// Best name similarity
pub struct NameBased;

static NAME_BASED_FEATURES: &[Feature] = &[Feature {
    name: "name_jaro_winkler",
    description: "Best Jaro-Winkler similarity between normalized names",
    weight: 1.0,
}];

impl ScoringAlgorithm for NameBased {
    fn name(&self) -> &'static str {
        "name-based"
    }

    fn description(&self) -> &'static str {
        "Scores candidates by the similarity of their names alone"
    }

    fn features(&self) -> &'static [Feature] {
        NAME_BASED_FEATURES
    }

    fn compare(&self, query: &ExampleEntity, candidate: &EntityRecord) -> AlgorithmScore {
        let jw = name_jaro_winkler(&normalized_names(query), &normalized_names(candidate));
        AlgorithmScore::weighted(NAME_BASED_FEATURES, &[jw])
    }
}

/// Name similarity with penalties for contradicting countries and dates
pub struct NameQualified;

static NAME_QUALIFIED_FEATURES: &[Feature] = &[
    Feature {
        name: "name_jaro_winkler",
        description: "Best Jaro-Winkler similarity between normalized names",
        weight: 1.0,
    },
    Feature {
        name: "country_mismatch",
        description: "Both entities are linked to countries, but none overlap",
        weight: -0.2,
    },
    Feature {
        name: "dob_year_disjoint",
        description: "Both entities carry dates, but no years agree",
        weight: -0.15,
    },
];

impl ScoringAlgorithm for NameQualified {
    fn name(&self) -> &'static str {
        "name-qualified"
    }

    fn description(&self) -> &'static str {
        "Name similarity, lowered when countries or dates contradict each other"
    }

    fn features(&self) -> &'static [Feature] {
        NAME_QUALIFIED_FEATURES
    }

    fn compare(&self, query: &ExampleEntity, candidate: &EntityRecord) -> AlgorithmScore {
        let jw = name_jaro_winkler(&normalized_names(query), &normalized_names(candidate));
        let values = [
            jw,
            country_mismatch(query, candidate),
            date_disjoint(query, candidate, 4),
        ];
        AlgorithmScore::weighted(NAME_QUALIFIED_FEATURES, &values)
    }
}

/// Rule-based matcher: the strongest positive signal decides, contradicting
/// countries and dates subtract.
pub struct LogicV1;

static LOGIC_V1_FEATURES: &[Feature] = &[
    Feature {
        name: "name_literal_match",
        description: "A normalized name of the query equals one of the candidate",
        weight: 1.0,
    },
    Feature {
        name: "name_fuzzy_match",
        description: "Best Jaro-Winkler similarity between normalized names",
        weight: 0.9,
    },
    Feature {
        name: "identifier_match",
        description: "The entities share a registration, tax or document number",
        weight: 0.95,
    },
    Feature {
        name: "country_mismatch",
        description: "Both entities are linked to countries, but none overlap",
        weight: -0.2,
    },
    Feature {
        name: "dob_year_disjoint",
        description: "Both entities carry dates, but no years agree",
        weight: -0.15,
    },
    Feature {
        name: "dob_day_disjoint",
        description: "Both entities carry full dates, but no days agree",
        weight: -0.1,
    },
];

impl ScoringAlgorithm for LogicV1 {
    fn name(&self) -> &'static str {
        "logic-v1"
    }

    fn description(&self) -> &'static str {
        "Rule-based matcher combining name, identifier, country and date evidence"
    }

    fn features(&self) -> &'static [Feature] {
        LOGIC_V1_FEATURES
    }

    fn compare(&self, query: &ExampleEntity, candidate: &EntityRecord) -> AlgorithmScore {
        let query_names = normalized_names(query);
        let candidate_names = normalized_names(candidate);
        let values = [
            name_literal_match(&query_names, &candidate_names),
            name_jaro_winkler(&query_names, &candidate_names),
            identifier_match(query, candidate),
            country_mismatch(query, candidate),
            date_disjoint(query, candidate, 4),
            date_disjoint(query, candidate, 10),
        ];

        // Positive evidence does not add up: the strongest signal counts
        let positive = LOGIC_V1_FEATURES
            .iter()
            .zip(&values)
            .filter(|(f, _)| f.weight > 0.0)
            .map(|(f, v)| f.weight * v)
            .fold(0.0_f64, f64::max);
        let negative: f64 = LOGIC_V1_FEATURES
            .iter()
            .zip(&values)
            .filter(|(f, _)| f.weight < 0.0)
            .map(|(f, v)| f.weight * v)
            .sum();

        AlgorithmScore {
            score: clamp_score(positive + negative),
            features: LOGIC_V1_FEATURES
                .iter()
                .zip(values)
                .map(|(f, v)| (f.name.to_string(), v))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entity::EntityExample;

    fn john_doe() -> ExampleEntity {
        ExampleEntity::from_example(
            &EntityExample::new("Person")
                .with("name", &["John Doe"])
                .with("birthDate", &["1975-04-21"])
                .with("nationality", &["us"]),
        )
        .unwrap()
    }

    fn candidate(name: &str, birth: &str, country: &str) -> EntityRecord {
        EntityRecord::new("c", "Person")
            .with_property("name", &[name])
            .with_property("birthDate", &[birth])
            .with_property("nationality", &[country])
    }

    #[test]
    fn test_exact_match_scores_one() {
        let c = candidate("John Doe", "1975-04-21", "us");
        for algo in [&NameBased as &dyn ScoringAlgorithm, &NameQualified, &LogicV1] {
            let result = algo.compare(&john_doe(), &c);
            assert!((result.score - 1.0).abs() < 1e-9, "{}", algo.name());
        }
    }

    #[test]
    fn test_token_order_ignored() {
        let c = candidate("DOE, John", "1975-04-21", "us");
        let result = NameBased.compare(&john_doe(), &c);
        assert!((result.score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_penalties() {
        let c = candidate("John Doe", "1980-01-01", "ru");
        let result = LogicV1.compare(&john_doe(), &c);
        assert!((result.score - (1.0 - 0.2 - 0.15 - 0.1)).abs() < 1e-9);
        assert!((result.features["country_mismatch"] - 1.0).abs() < f64::EPSILON);
        assert!((result.features["dob_day_disjoint"] - 1.0).abs() < f64::EPSILON);

        let qualified = NameQualified.compare(&john_doe(), &c);
        assert!((qualified.score - 0.65).abs() < 1e-9);

        // Names alone ignore the contradiction
        assert!((NameBased.compare(&john_doe(), &c).score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_same_year_is_not_disjoint() {
        let c = candidate("John Doe", "1975-12-01", "us");
        let result = LogicV1.compare(&john_doe(), &c);
        assert!(result.features["dob_year_disjoint"].abs() < f64::EPSILON);
        assert!((result.features["dob_day_disjoint"] - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_identifier_match() {
        let query = ExampleEntity::from_example(
            &EntityExample::new("Company")
                .with("name", &["Brilliant Amazing Limited"])
                .with("registrationNumber", &["84BA99810"]),
        )
        .unwrap();
        let c = EntityRecord::new("c", "Company")
            .with_property("name", &["Totally Different Corp"])
            .with_property("registrationNumber", &["84ba-998-10"]);
        let result = LogicV1.compare(&query, &c);
        assert!((result.features["identifier_match"] - 1.0).abs() < f64::EPSILON);
        assert!(result.score >= 0.95 - 1e-9);
    }

    #[test]
    fn test_scores_stay_in_range() {
        let query = ExampleEntity::from_example(&EntityExample::new("Person")).unwrap();
        let c = EntityRecord::new("c", "Person");
        for algo in [&NameBased as &dyn ScoringAlgorithm, &NameQualified, &LogicV1] {
            let result = algo.compare(&query, &c);
            assert!((0.0..=1.0).contains(&result.score));
        }
        assert_eq!(clamp_score(f64::NAN), 0.0);
        assert_eq!(clamp_score(-0.5), 0.0);
        assert_eq!(clamp_score(1.5), 1.0);
    }
}
