//! Free-text entity search.
//!
//! A simple, user-facing search over names and other text, with facets for
//! countries, topics and data sources. For matching structured records the
//! match API should be used instead.

use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::catalog::DatasetCatalog;
use crate::config::Settings;
use crate::core::dataset::Dataset;
use crate::core::schema::Schema;
use crate::core::types::{Total, TraceToken};
use crate::search::backend::{BackendError, FacetBucket};
use crate::search::executor::SearchExecutor;
use crate::search::fetch::EntityResponse;
use crate::search::query::{
    build_text_query, facet_aggregations, fields, parse_sorts, SearchFilters, SearchRequest,
};
use crate::utils::validation::limit_window;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("{0}")]
    InvalidParameter(String),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Parameters of a free-text search
#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    /// Query text; empty browses the dataset
    pub q: String,
    /// Schema to search, defaults to the root of the taxonomy
    pub schema: Option<String>,
    pub filters: SearchFilters,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub fuzzy: bool,
    /// `field[:asc|desc]` tokens
    pub sort: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchFacetItem {
    pub name: String,
    pub label: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchFacet {
    pub label: String,
    pub values: Vec<SearchFacetItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    pub results: Vec<EntityResponse>,
    pub facets: BTreeMap<String, SearchFacet>,
    pub total: Total,
    pub limit: usize,
    pub offset: usize,
}

fn facet_label(field: &str) -> &'static str {
    match field {
        f if f == fields::COUNTRIES => "Countries",
        f if f == fields::TOPICS => "Topics",
        f if f == fields::DATASETS => "Data sources",
        f if f == fields::TARGET => "Target",
        _ => "Other",
    }
}

/// Label facet buckets for display; datasets are labelled with their
/// catalog title.
fn label_facets(
    facets: BTreeMap<String, Vec<FacetBucket>>,
    catalog: &DatasetCatalog,
) -> BTreeMap<String, SearchFacet> {
    facets
        .into_iter()
        .map(|(field, buckets)| {
            let values = buckets
                .into_iter()
                .map(|bucket| {
                    let label = if field == fields::DATASETS {
                        catalog.title(&bucket.name).to_string()
                    } else {
                        bucket.name.clone()
                    };
                    SearchFacetItem {
                        name: bucket.name,
                        label,
                        count: bucket.count,
                    }
                })
                .collect();
            let facet = SearchFacet {
                label: facet_label(&field).to_string(),
                values,
            };
            (field, facet)
        })
        .collect()
}

/// Run a free-text search scoped to a dataset and its children.
///
/// # Errors
///
/// Returns `SearchError::InvalidSchema` for a schema outside the taxonomy,
/// `SearchError::InvalidParameter` for a limit or offset above the configured
/// maximum, and the backend's error if the search fails.
pub async fn search_entities(
    executor: &SearchExecutor,
    catalog: &DatasetCatalog,
    settings: &Settings,
    dataset: &Dataset,
    params: &SearchParams,
    trace: &TraceToken,
) -> Result<SearchResponse, SearchError> {
    if let Some(limit) = params.limit.filter(|l| *l > settings.max_page) {
        return Err(SearchError::InvalidParameter(format!(
            "limit {limit} exceeds the maximum of {}",
            settings.max_page
        )));
    }
    if let Some(offset) = params.offset.filter(|o| *o > settings.max_offset) {
        return Err(SearchError::InvalidParameter(format!(
            "offset {offset} exceeds the maximum of {}",
            settings.max_offset
        )));
    }
    let schema_name = params.schema.as_deref().unwrap_or(&settings.base_schema);
    let schema = Schema::get(schema_name)
        .ok_or_else(|| SearchError::InvalidSchema(schema_name.to_string()))?;

    let (limit, offset) =
        limit_window(settings, params.limit, params.offset, settings.default_page);
    let scope = catalog.scope(dataset);
    let query = build_text_query(&scope, schema, &params.q, &params.filters, params.fuzzy);
    let request = SearchRequest::new(query, limit)
        .with_offset(offset)
        .with_aggregations(facet_aggregations(&params.filters.names()))
        .with_sort(parse_sorts(&params.sort));

    let result = executor.execute(&request, trace).await?;

    tracing::info!(
        action = "search",
        trace = %trace,
        length = params.q.len(),
        dataset = %dataset.name,
        total = result.total.value,
        "Query"
    );

    Ok(SearchResponse {
        results: result.hits.iter().map(EntityResponse::from_record).collect(),
        facets: label_facets(result.facets.unwrap_or_default(), catalog),
        total: result.total,
        limit,
        offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entity::EntityRecord;
    use crate::search::memory::MemoryBackend;
    use std::sync::Arc;
    use std::time::Duration;

    fn executor() -> SearchExecutor {
        let backend = MemoryBackend::new(vec![
            EntityRecord::new("NK-1", "Person")
                .with_property("name", &["Vladimir Putin"])
                .with_property("nationality", &["ru"])
                .with_property("topics", &["role.pep"])
                .with_datasets(&["wd_peps"]),
            EntityRecord::new("NK-2", "Company")
                .with_property("name", &["Putin Holdings"])
                .with_property("jurisdiction", &["cy"])
                .with_datasets(&["eu_fsf"])
                .with_target(true),
        ]);
        SearchExecutor::new(Arc::new(backend), Duration::from_secs(5))
    }

    async fn search(params: SearchParams) -> Result<SearchResponse, SearchError> {
        let catalog = DatasetCatalog::load_embedded().unwrap();
        let dataset = catalog.resolve("default").unwrap().clone();
        search_entities(
            &executor(),
            &catalog,
            &Settings::default(),
            &dataset,
            &params,
            &TraceToken::generate(),
        )
        .await
    }

    #[tokio::test]
    async fn test_search_with_facets() {
        let response = search(SearchParams {
            q: "putin".to_string(),
            ..SearchParams::default()
        })
        .await
        .unwrap();
        assert_eq!(response.total.value, 2);
        assert_eq!(response.limit, 10);
        assert_eq!(response.offset, 0);

        let datasets = &response.facets["datasets"];
        assert_eq!(datasets.label, "Data sources");
        let eu = datasets.values.iter().find(|v| v.name == "eu_fsf").unwrap();
        assert_eq!(eu.label, "EU Financial Sanctions Files (FSF)");
        assert!(!response.facets.contains_key("target"));
    }

    #[tokio::test]
    async fn test_search_schema_and_target() {
        let response = search(SearchParams {
            q: "putin".to_string(),
            schema: Some("Person".to_string()),
            ..SearchParams::default()
        })
        .await
        .unwrap();
        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].id, "NK-1");

        let response = search(SearchParams {
            filters: SearchFilters {
                target: Some(true),
                ..SearchFilters::default()
            },
            ..SearchParams::default()
        })
        .await
        .unwrap();
        assert_eq!(response.total.value, 1);
        assert_eq!(response.facets["target"].values[0].name, "true");
    }

    #[tokio::test]
    async fn test_search_invalid_schema() {
        let err = search(SearchParams {
            schema: Some("Spaceship".to_string()),
            ..SearchParams::default()
        })
        .await
        .unwrap_err();
        assert_eq!(err, SearchError::InvalidSchema("Spaceship".to_string()));
    }

    #[tokio::test]
    async fn test_search_limit_above_max() {
        let err = search(SearchParams {
            limit: Some(100_000),
            ..SearchParams::default()
        })
        .await
        .unwrap_err();
        assert!(matches!(err, SearchError::InvalidParameter(_)));
    }
}
