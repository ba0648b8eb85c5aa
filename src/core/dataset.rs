use serde::{Deserialize, Serialize};

/// A named data source or collection of sources in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    /// Unique, URL-safe name
    pub name: String,

    /// Human-readable title
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,

    /// Datasets contained in this collection
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Dataset {
    pub fn new(name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            summary: None,
            publisher: None,
            children: Vec::new(),
            updated_at: None,
        }
    }

    #[must_use]
    pub fn with_children(mut self, children: &[&str]) -> Self {
        self.children = children.iter().map(|c| (*c).to_string()).collect();
        self
    }

    /// True if this dataset groups other datasets
    #[must_use]
    pub fn is_collection(&self) -> bool {
        !self.children.is_empty()
    }
}
