use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

use crate::core::dataset::Dataset;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read catalog: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse catalog: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Duplicate dataset in catalog: {0}")]
    DuplicateDataset(String),

    #[error("Dataset '{parent}' lists unknown child '{child}'")]
    UnknownChild { parent: String, child: String },
}

/// Lookup of a dataset name that is not in the catalog
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Dataset not found: {0}")]
pub struct DatasetNotFound(pub String);

/// Catalog version for compatibility checking
pub const CATALOG_VERSION: &str = "1.0.0";

/// Serializable catalog format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogData {
    pub version: String,
    pub created_at: String,
    pub datasets: Vec<Dataset>,
}

/// The dataset catalog with a name index
#[derive(Debug, Default)]
pub struct DatasetCatalog {
    /// All datasets, in catalog order
    pub datasets: Vec<Dataset>,

    /// Index: dataset name -> index in datasets vec
    name_to_index: HashMap<String, usize>,
}

impl DatasetCatalog {
    /// Create an empty catalog
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the embedded default catalog
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded catalog is malformed.
    pub fn load_embedded() -> Result<Self, CatalogError> {
        // Validated at compile time by build.rs
        const EMBEDDED_CATALOG: &str = include_str!("../../catalogs/datasets.json");
        Self::from_json(EMBEDDED_CATALOG)
    }

    /// Load catalog from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid catalog.
    pub fn load_from_file(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse catalog from JSON string
    ///
    /// # Errors
    ///
    /// Returns an error on malformed JSON, duplicate dataset names, or
    /// children that are not defined in the catalog.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let data: CatalogData = serde_json::from_str(json)?;

        // Version check (warn but don't fail)
        if data.version != CATALOG_VERSION {
            tracing::warn!(
                expected = CATALOG_VERSION,
                found = %data.version,
                "Catalog version mismatch"
            );
        }

        let mut catalog = Self::new();
        for dataset in data.datasets {
            catalog.add_dataset(dataset)?;
        }

        for dataset in &catalog.datasets {
            if let Some(child) = dataset
                .children
                .iter()
                .find(|c| !catalog.name_to_index.contains_key(*c))
            {
                return Err(CatalogError::UnknownChild {
                    parent: dataset.name.clone(),
                    child: child.clone(),
                });
            }
        }

        Ok(catalog)
    }

    /// Add a dataset to the catalog
    ///
    /// # Errors
    ///
    /// Returns an error if a dataset with the same name is already present.
    pub fn add_dataset(&mut self, dataset: Dataset) -> Result<(), CatalogError> {
        if self.name_to_index.contains_key(&dataset.name) {
            return Err(CatalogError::DuplicateDataset(dataset.name));
        }
        self.name_to_index
            .insert(dataset.name.clone(), self.datasets.len());
        self.datasets.push(dataset);
        Ok(())
    }

    /// Get a dataset by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Dataset> {
        self.name_to_index.get(name).map(|&idx| &self.datasets[idx])
    }

    /// Get a dataset by name, failing if it is unknown
    ///
    /// # Errors
    ///
    /// Returns `DatasetNotFound` if no dataset has this name.
    pub fn resolve(&self, name: &str) -> Result<&Dataset, DatasetNotFound> {
        self.get(name)
            .ok_or_else(|| DatasetNotFound(name.to_string()))
    }

    /// Names of the dataset and all of its transitive children, in
    /// breadth-first order. Cycles are tolerated.
    #[must_use]
    pub fn scope(&self, dataset: &Dataset) -> Vec<String> {
        let mut names = vec![dataset.name.clone()];
        let mut idx = 0;
        while idx < names.len() {
            if let Some(current) = self.get(&names[idx]) {
                for child in &current.children {
                    if !names.contains(child) {
                        names.push(child.clone());
                    }
                }
            }
            idx += 1;
        }
        names
    }

    /// Title of a dataset, falling back to its name
    #[must_use]
    pub fn title<'a>(&'a self, name: &'a str) -> &'a str {
        self.get(name).map_or(name, |d| d.title.as_str())
    }

    /// Export catalog to JSON
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, CatalogError> {
        let data = CatalogData {
            version: CATALOG_VERSION.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            datasets: self.datasets.clone(),
        };
        Ok(serde_json::to_string_pretty(&data)?)
    }

    /// Number of datasets in catalog
    #[must_use]
    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    /// Check if catalog is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_embedded_catalog() {
        let catalog = DatasetCatalog::load_embedded().unwrap();
        assert!(!catalog.is_empty());
        assert!(catalog.get("default").is_some());
    }

    #[test]
    fn test_resolve_unknown() {
        let catalog = DatasetCatalog::load_embedded().unwrap();
        assert_eq!(
            catalog.resolve("nonexistent").unwrap_err(),
            DatasetNotFound("nonexistent".to_string())
        );
    }

    #[test]
    fn test_scope_is_transitive() {
        let catalog = DatasetCatalog::load_embedded().unwrap();
        let default = catalog.resolve("default").unwrap();
        let scope = catalog.scope(default);
        assert_eq!(scope[0], "default");
        assert!(scope.contains(&"sanctions".to_string()));
        assert!(scope.contains(&"us_ofac_sdn".to_string()));
        assert!(scope.contains(&"interpol_red_notices".to_string()));

        let leaf = catalog.resolve("us_ofac_sdn").unwrap();
        assert_eq!(catalog.scope(leaf), vec!["us_ofac_sdn".to_string()]);
    }

    #[test]
    fn test_scope_tolerates_cycles() {
        let mut catalog = DatasetCatalog::new();
        catalog
            .add_dataset(Dataset::new("a", "A").with_children(&["b"]))
            .unwrap();
        catalog
            .add_dataset(Dataset::new("b", "B").with_children(&["a"]))
            .unwrap();
        let a = catalog.resolve("a").unwrap();
        assert_eq!(catalog.scope(a), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_duplicate_dataset() {
        let mut catalog = DatasetCatalog::new();
        catalog.add_dataset(Dataset::new("a", "A")).unwrap();
        assert!(matches!(
            catalog.add_dataset(Dataset::new("a", "Again")),
            Err(CatalogError::DuplicateDataset(_))
        ));
    }

    #[test]
    fn test_unknown_child_rejected() {
        let json = r#"{"version": "1.0.0", "created_at": "", "datasets": [
            {"name": "a", "title": "A", "children": ["missing"]}
        ]}"#;
        assert!(matches!(
            DatasetCatalog::from_json(json),
            Err(CatalogError::UnknownChild { .. })
        ));
    }

    #[test]
    fn test_catalog_to_json() {
        let catalog = DatasetCatalog::load_embedded().unwrap();
        let json = catalog.to_json().unwrap();

        assert!(json.contains("\"version\""));
        assert!(json.contains("\"datasets\""));
        assert!(json.contains("us_ofac_sdn"));

        let reloaded = DatasetCatalog::from_json(&json).unwrap();
        assert_eq!(reloaded.len(), catalog.len());
    }

    #[test]
    fn test_title_fallback() {
        let catalog = DatasetCatalog::load_embedded().unwrap();
        assert_eq!(catalog.title("peps"), "Politically exposed persons");
        assert_eq!(catalog.title("unknown_ds"), "unknown_ds");
    }
}
