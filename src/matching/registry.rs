use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use crate::matching::algorithms::{Feature, LogicV1, NameBased, NameQualified, ScoringAlgorithm};

/// Shared handle to a registered algorithm
pub type AlgorithmHandle = Arc<dyn ScoringAlgorithm>;

/// Alias resolving to the configured best algorithm
pub const BEST_ALIAS: &str = "best";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown algorithm: {0}")]
pub struct UnknownAlgorithm(pub String);

/// Description of an algorithm for API responses
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlgorithmInfo {
    pub name: String,
    pub description: String,
    pub features: Vec<Feature>,
}

impl AlgorithmInfo {
    #[must_use]
    pub fn from_algorithm(algorithm: &dyn ScoringAlgorithm) -> Self {
        Self {
            name: algorithm.name().to_string(),
            description: algorithm.description().to_string(),
            features: algorithm.features().to_vec(),
        }
    }
}

/// Listing of the registry for the algorithms endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlgorithmListing {
    pub algorithms: Vec<AlgorithmInfo>,
    pub default: String,
    pub best: String,
}

/// Named scoring algorithms with a default and a `best` alias.
///
/// Built once at startup and shared read-only.
pub struct AlgorithmRegistry {
    algorithms: BTreeMap<String, AlgorithmHandle>,
    default: String,
    best: String,
}

impl AlgorithmRegistry {
    /// Registry of the shipped algorithms, with `logic-v1` as default and best
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self {
            algorithms: BTreeMap::new(),
            default: String::new(),
            best: String::new(),
        };
        registry.register(Arc::new(NameBased));
        registry.register(Arc::new(NameQualified));
        registry.register(Arc::new(LogicV1));
        registry.default = "logic-v1".to_string();
        registry.best = "logic-v1".to_string();
        registry
    }

    /// Select the default and best algorithms by name
    ///
    /// # Errors
    ///
    /// Returns `UnknownAlgorithm` if either name is not registered.
    pub fn with_aliases(mut self, default: &str, best: &str) -> Result<Self, UnknownAlgorithm> {
        let default = normalize(default);
        let best = normalize(best);
        for name in [&default, &best] {
            if !self.algorithms.contains_key(name) {
                return Err(UnknownAlgorithm(name.clone()));
            }
        }
        self.default = default;
        self.best = best;
        Ok(self)
    }

    /// Add an algorithm, replacing any algorithm with the same name
    pub fn register(&mut self, algorithm: AlgorithmHandle) {
        self.algorithms
            .insert(normalize(algorithm.name()), algorithm);
    }

    /// Resolve a name to an algorithm. Names are trimmed and matched
    /// case-insensitively; `best` selects the best algorithm.
    ///
    /// # Errors
    ///
    /// Returns `UnknownAlgorithm` if no algorithm has this name.
    pub fn resolve(&self, name: &str) -> Result<AlgorithmHandle, UnknownAlgorithm> {
        let mut key = normalize(name);
        if key == BEST_ALIAS {
            key.clone_from(&self.best);
        }
        self.algorithms
            .get(&key)
            .cloned()
            .ok_or_else(|| UnknownAlgorithm(name.trim().to_string()))
    }

    /// Resolve an optional name, falling back to the default algorithm
    ///
    /// # Errors
    ///
    /// Returns `UnknownAlgorithm` if a name is given and not registered.
    pub fn resolve_or_default(
        &self,
        name: Option<&str>,
    ) -> Result<AlgorithmHandle, UnknownAlgorithm> {
        self.resolve(name.unwrap_or(&self.default))
    }

    #[must_use]
    pub fn default_name(&self) -> &str {
        &self.default
    }

    #[must_use]
    pub fn best_name(&self) -> &str {
        &self.best
    }

    /// Registered names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.algorithms.keys().map(String::as_str).collect()
    }

    #[must_use]
    pub fn listing(&self) -> AlgorithmListing {
        AlgorithmListing {
            algorithms: self
                .algorithms
                .values()
                .map(|a| AlgorithmInfo::from_algorithm(a.as_ref()))
                .collect(),
            default: self.default.clone(),
            best: self.best.clone(),
        }
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_alias_variants() {
        let registry = AlgorithmRegistry::builtin();
        let best = registry.resolve(registry.best_name()).unwrap();
        for name in ["best", "BEST", " Best "] {
            let resolved = registry.resolve(name).unwrap();
            assert!(Arc::ptr_eq(&resolved, &best), "{name}");
        }
    }

    #[test]
    fn test_case_insensitive() {
        let registry = AlgorithmRegistry::builtin();
        assert_eq!(registry.resolve(" Name-Based").unwrap().name(), "name-based");
    }

    #[test]
    fn test_unknown_algorithm() {
        let registry = AlgorithmRegistry::builtin();
        assert_eq!(
            registry.resolve("regression-v9").err(),
            Some(UnknownAlgorithm("regression-v9".to_string()))
        );
    }

    #[test]
    fn test_with_aliases() {
        let registry = AlgorithmRegistry::builtin()
            .with_aliases("name-based", "name-qualified")
            .unwrap();
        assert_eq!(registry.resolve("best").unwrap().name(), "name-qualified");
        assert_eq!(registry.resolve_or_default(None).unwrap().name(), "name-based");

        assert!(AlgorithmRegistry::builtin()
            .with_aliases("logic-v1", "nope")
            .is_err());
    }

    #[test]
    fn test_listing() {
        let registry = AlgorithmRegistry::builtin();
        let listing = registry.listing();
        assert_eq!(listing.algorithms.len(), 3);
        assert_eq!(listing.default, "logic-v1");
        assert_eq!(registry.names(), vec!["logic-v1", "name-based", "name-qualified"]);
    }
}
