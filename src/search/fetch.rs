//! Single-entity fetch with redirect resolution.
//!
//! Entities that were merged into another record keep resolving: a lookup by
//! an old id finds the record that lists it among its referents and reports a
//! redirect to the canonical id. Only one hop is ever reported.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::core::entity::{EntityRecord, PropertyAccess};
use crate::core::types::TraceToken;
use crate::search::backend::BackendError;
use crate::search::executor::SearchExecutor;
use crate::search::query::{fields, Filter, Query, SearchRequest};

/// A property value in a response: either a plain string or, for nested
/// responses, an inlined adjacent entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Text(String),
    Entity(Box<EntityResponse>),
}

impl PropertyValue {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Entity(_) => None,
        }
    }

    #[must_use]
    pub fn as_entity(&self) -> Option<&EntityResponse> {
        match self {
            Self::Text(_) => None,
            Self::Entity(e) => Some(e),
        }
    }
}

/// An entity as returned by the API
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityResponse {
    pub id: String,
    pub caption: String,
    pub schema: String,
    pub properties: BTreeMap<String, Vec<PropertyValue>>,
    pub datasets: Vec<String>,
    pub referents: Vec<String>,
    pub target: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_seen: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<String>,
}

impl EntityResponse {
    /// Serialize a record without inlining adjacent entities
    #[must_use]
    pub fn from_record(record: &EntityRecord) -> Self {
        let properties = record
            .properties
            .iter()
            .map(|(name, values)| {
                let values = values.iter().cloned().map(PropertyValue::Text).collect();
                (name.clone(), values)
            })
            .collect();
        Self {
            id: record.id.clone(),
            caption: record.display_caption(),
            schema: record.schema.clone(),
            properties,
            datasets: record.datasets.clone(),
            referents: record.referents.clone(),
            target: record.target,
            first_seen: record.first_seen.clone(),
            last_seen: record.last_seen.clone(),
        }
    }
}

/// Result of looking up an entity by id
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Found(Box<EntityResponse>),
    /// The id was merged into the record with this canonical id
    Redirect(String),
    NotFound,
}

/// Records fetched by one id lookup: the record itself plus any records
/// that list the id among their referents
const LOOKUP_PAGE: usize = 10;

/// Looks up entities by id through the search executor
#[derive(Clone)]
pub struct EntityResolver {
    executor: SearchExecutor,
    /// Most adjacent records inlined per direction
    max_adjacent: usize,
}

impl EntityResolver {
    pub fn new(executor: SearchExecutor, max_adjacent: usize) -> Self {
        Self {
            executor,
            max_adjacent,
        }
    }

    /// Fetch an entity, reporting a redirect if `id` was merged into
    /// another record.
    ///
    /// # Errors
    ///
    /// Returns the `BackendError` of any failed lookup.
    pub async fn fetch_entity(
        &self,
        id: &str,
        nested: bool,
        trace: &TraceToken,
    ) -> Result<FetchOutcome, BackendError> {
        let query = Query::by_filter(Filter::IdOrReferent { id: id.to_string() });
        let result = self
            .executor
            .execute(&SearchRequest::new(query, LOOKUP_PAGE), trace)
            .await?;

        // A canonical record claiming the id wins over a stale one stored under it
        let canonical = result
            .hits
            .iter()
            .find(|r| r.id != id && r.referents.iter().any(|referent| referent == id));
        if let Some(canonical) = canonical {
            tracing::debug!(trace = %trace, id, canonical = %canonical.id, "Entity redirect");
            return Ok(FetchOutcome::Redirect(canonical.id.clone()));
        }
        let Some(record) = result.hits.into_iter().find(|r| r.id == id) else {
            return Ok(FetchOutcome::NotFound);
        };

        let response = if nested {
            self.nest(&record, trace).await?
        } else {
            EntityResponse::from_record(&record)
        };
        Ok(FetchOutcome::Found(Box::new(response)))
    }

    /// Inline records adjacent to `record`: those referencing it, grouped
    /// under the reverse property name, and those it references, in place of
    /// their ids.
    async fn nest(
        &self,
        record: &EntityRecord,
        trace: &TraceToken,
    ) -> Result<EntityResponse, BackendError> {
        let forward_ids: Vec<String> = record
            .entity_refs()
            .iter()
            .map(|(_, id)| (*id).to_string())
            .collect();

        let reverse = SearchRequest::new(
            Query::by_filter(Filter::Terms {
                field: fields::ENTITIES,
                values: vec![record.id.clone()],
            }),
            self.max_adjacent,
        );
        let forward = SearchRequest::new(
            Query::by_filter(Filter::Ids {
                ids: forward_ids.clone(),
            }),
            self.max_adjacent,
        );

        let (referencing, referenced) = futures::try_join!(
            self.executor.execute(&reverse, trace),
            async {
                if forward_ids.is_empty() {
                    Ok(Vec::new())
                } else {
                    self.executor
                        .execute(&forward, trace)
                        .await
                        .map(|r| r.hits)
                }
            }
        )?;

        let mut response = EntityResponse::from_record(record);

        let by_id: BTreeMap<&str, &EntityRecord> =
            referenced.iter().map(|r| (r.id.as_str(), r)).collect();
        for (property, values) in &mut response.properties {
            let is_edge = record
                .schema_def()
                .and_then(|s| s.property(property))
                .is_some_and(|p| p.reverse.is_some());
            if !is_edge {
                continue;
            }
            for value in values.iter_mut() {
                let adjacent = value.as_str().and_then(|id| by_id.get(id));
                if let Some(adjacent) = adjacent {
                    *value = PropertyValue::Entity(Box::new(EntityResponse::from_record(adjacent)));
                }
            }
        }

        for adjacent in &referencing.hits {
            if adjacent.id == record.id {
                continue;
            }
            for (prop, target) in adjacent.entity_refs() {
                if target != record.id {
                    continue;
                }
                let name = prop.reverse.unwrap_or(prop.name).to_string();
                let values = response.properties.entry(name).or_default();
                let inlined =
                    PropertyValue::Entity(Box::new(EntityResponse::from_record(adjacent)));
                if !values.contains(&inlined) {
                    values.push(inlined);
                }
            }
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::memory::MemoryBackend;
    use std::sync::Arc;
    use std::time::Duration;

    fn resolver() -> EntityResolver {
        let backend = MemoryBackend::new(vec![
            EntityRecord::new("NK-1", "Person")
                .with_property("name", &["John Doe"])
                .with_referents(&["ofac-123", "eu-456"])
                .with_datasets(&["us_ofac_sdn"]),
            EntityRecord::new("san-1", "Sanction")
                .with_property("entity", &["NK-1"])
                .with_property("program", &["SDN"]),
            EntityRecord::new("pass-1", "Passport")
                .with_property("holder", &["NK-1"])
                .with_property("number", &["X123"]),
        ]);
        EntityResolver::new(
            SearchExecutor::new(Arc::new(backend), Duration::from_secs(5)),
            100,
        )
    }

    fn found(outcome: FetchOutcome) -> EntityResponse {
        match outcome {
            FetchOutcome::Found(entity) => *entity,
            other => panic!("expected entity, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_found() {
        let outcome = resolver()
            .fetch_entity("NK-1", false, &TraceToken::generate())
            .await
            .unwrap();
        let entity = found(outcome);
        assert_eq!(entity.caption, "John Doe");
        assert!(!entity.properties.contains_key("sanctions"));
    }

    #[tokio::test]
    async fn test_merged_id_redirects() {
        let outcome = resolver()
            .fetch_entity("eu-456", false, &TraceToken::generate())
            .await
            .unwrap();
        assert_eq!(outcome, FetchOutcome::Redirect("NK-1".to_string()));
    }

    #[tokio::test]
    async fn test_stale_record_under_merged_id_redirects() {
        let backend = MemoryBackend::new(vec![
            EntityRecord::new("old-1", "Person").with_property("name", &["John Doe"]),
            EntityRecord::new("NK-1", "Person")
                .with_property("name", &["John Doe"])
                .with_referents(&["old-1"]),
        ]);
        let resolver = EntityResolver::new(
            SearchExecutor::new(Arc::new(backend), Duration::from_secs(5)),
            100,
        );
        let trace = TraceToken::generate();

        let outcome = resolver.fetch_entity("old-1", false, &trace).await.unwrap();
        assert_eq!(outcome, FetchOutcome::Redirect("NK-1".to_string()));

        let outcome = resolver.fetch_entity("NK-1", false, &trace).await.unwrap();
        assert_eq!(found(outcome).id, "NK-1");
    }

    #[tokio::test]
    async fn test_not_found() {
        let outcome = resolver()
            .fetch_entity("nope", true, &TraceToken::generate())
            .await
            .unwrap();
        assert_eq!(outcome, FetchOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_nested_reverse_edges() {
        let outcome = resolver()
            .fetch_entity("NK-1", true, &TraceToken::generate())
            .await
            .unwrap();
        let entity = found(outcome);
        let sanctions = &entity.properties["sanctions"];
        assert_eq!(sanctions.len(), 1);
        assert_eq!(sanctions[0].as_entity().unwrap().id, "san-1");
        let ids = &entity.properties["identification"];
        assert_eq!(ids[0].as_entity().unwrap().schema, "Passport");
    }

    #[tokio::test]
    async fn test_nested_forward_edges() {
        let outcome = resolver()
            .fetch_entity("san-1", true, &TraceToken::generate())
            .await
            .unwrap();
        let sanction = found(outcome);
        let target = sanction.properties["entity"][0].as_entity().unwrap();
        assert_eq!(target.id, "NK-1");
        // One hop only: the adjacent entity is not nested further
        assert!(!target.properties.contains_key("sanctions"));
        assert_eq!(sanction.properties["program"][0].as_str(), Some("SDN"));
    }
}
