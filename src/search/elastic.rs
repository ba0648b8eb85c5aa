//! Elasticsearch-compatible search backend.
//!
//! Translates a [`Query`] into a `bool` query and POSTs it to
//! `{url}/{index}/_search`. Each call carries the request's trace token as the
//! `X-Opaque-Id` header so slow queries can be traced back to the request in
//! the cluster logs.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::core::entity::EntityRecord;
use crate::core::types::{Total, TotalRelation, TraceToken};
use crate::search::backend::{BackendError, FacetBucket, SearchBackend, SearchResult};
use crate::search::query::{fields, Filter, Operator, Query, SearchRequest, Signal};

/// HTTP header carrying the trace token
pub const OPAQUE_ID_HEADER: &str = "X-Opaque-Id";

/// Search backend talking to an Elasticsearch (or OpenSearch) cluster
pub struct ElasticBackend {
    client: Client,
    url: String,
    index: String,
}

impl ElasticBackend {
    /// Create a backend for one index.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(url: &str, index: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            index: index.to_string(),
        })
    }

    fn search_url(&self) -> String {
        format!("{}/{}/_search", self.url, self.index)
    }
}

fn signal_json(signal: &Signal) -> Value {
    match signal {
        Signal::Text {
            field,
            text,
            boost,
            fuzzy,
            operator,
        } => {
            let mut clause = json!({
                "query": text,
                "boost": boost,
                "operator": match operator {
                    Operator::And => "AND",
                    Operator::Or => "OR",
                },
            });
            if *fuzzy {
                clause["fuzziness"] = json!("AUTO");
            }
            json!({ "match": { *field: clause } })
        }
        Signal::Term {
            field,
            value,
            boost,
        } => json!({ "term": { *field: { "value": value, "boost": boost } } }),
    }
}

fn filter_json(filter: &Filter) -> Value {
    match filter {
        Filter::Terms { field, values } => json!({ "terms": { *field: values } }),
        Filter::Flag { field, value } => json!({ "term": { *field: value } }),
        Filter::IdOrReferent { id } => json!({
            "bool": {
                "should": [
                    { "ids": { "values": [id] } },
                    { "term": { (fields::REFERENTS): id } },
                ],
                "minimum_should_match": 1,
            }
        }),
        Filter::Ids { ids } => json!({ "ids": { "values": ids } }),
    }
}

/// Translate a query into the Elasticsearch query DSL
#[must_use]
pub fn es_query(query: &Query) -> Value {
    let mut filter: Vec<Value> = Vec::new();
    if !query.schemata.is_empty() {
        filter.push(json!({ "terms": { (fields::SCHEMA): query.schemata } }));
    }
    if !query.datasets.is_empty() {
        filter.push(json!({ "terms": { (fields::DATASETS): query.datasets } }));
    }
    filter.extend(query.filters.iter().map(filter_json));

    let mut bool_query = json!({
        "filter": filter,
        "must": query.must.iter().map(signal_json).collect::<Vec<_>>(),
        "should": query.should.iter().map(signal_json).collect::<Vec<_>>(),
    });
    if !query.should.is_empty() {
        bool_query["minimum_should_match"] = json!(1);
    }
    json!({ "bool": bool_query })
}

/// Build the full `_search` request body
#[must_use]
pub fn es_body(request: &SearchRequest) -> Value {
    let mut body = json!({
        "query": es_query(&request.query),
        "size": request.limit,
        "from": request.offset,
        "track_total_hits": true,
    });
    if !request.sort.is_empty() {
        let sort: Vec<Value> = request
            .sort
            .iter()
            .map(|s| {
                if s.field == "_score" {
                    json!({ "_score": { "order": s.order.to_string() } })
                } else {
                    json!({ &s.field: { "order": s.order.to_string(), "missing": "_last" } })
                }
            })
            .collect();
        body["sort"] = json!(sort);
    }
    if !request.aggregations.is_empty() {
        let aggs: Map<String, Value> = request
            .aggregations
            .iter()
            .map(|f| {
                (
                    f.field.clone(),
                    json!({ "terms": { "field": f.field, "size": f.size } }),
                )
            })
            .collect();
        body["aggs"] = Value::Object(aggs);
    }
    body
}

#[derive(Deserialize)]
struct EsResponse {
    hits: EsHits,
    #[serde(default)]
    aggregations: Option<BTreeMap<String, EsAggregation>>,
}

#[derive(Deserialize)]
struct EsHits {
    total: EsTotal,
    hits: Vec<EsHit>,
}

#[derive(Deserialize)]
struct EsTotal {
    value: u64,
    relation: TotalRelation,
}

#[derive(Deserialize)]
struct EsHit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_source", default)]
    source: Map<String, Value>,
}

#[derive(Deserialize)]
struct EsAggregation {
    #[serde(default)]
    buckets: Vec<EsBucket>,
}

#[derive(Deserialize)]
struct EsBucket {
    key: Value,
    #[serde(default)]
    key_as_string: Option<String>,
    doc_count: u64,
}

impl EsBucket {
    fn name(&self) -> String {
        if let Some(key) = &self.key_as_string {
            return key.clone();
        }
        match &self.key {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Parse a `_search` response body
///
/// # Errors
///
/// Returns a 502 `BackendError` if the body is not a valid search response.
pub fn parse_response(body: Value) -> Result<SearchResult, BackendError> {
    let response: EsResponse = serde_json::from_value(body)
        .map_err(|e| BackendError::unavailable(format!("Invalid search response: {e}")))?;

    let mut hits = Vec::with_capacity(response.hits.hits.len());
    for hit in response.hits.hits {
        let mut source = hit.source;
        source.insert("id".to_string(), Value::String(hit.id));
        let record: EntityRecord = serde_json::from_value(Value::Object(source))
            .map_err(|e| BackendError::unavailable(format!("Invalid entity in response: {e}")))?;
        hits.push(record);
    }

    let facets = response.aggregations.map(|aggs| {
        aggs.into_iter()
            .map(|(field, agg)| {
                let buckets = agg
                    .buckets
                    .iter()
                    .map(|b| FacetBucket {
                        name: b.name(),
                        count: b.doc_count,
                    })
                    .collect();
                (field, buckets)
            })
            .collect()
    });

    Ok(SearchResult {
        hits,
        total: Total {
            value: response.hits.total.value,
            relation: response.hits.total.relation,
        },
        facets,
    })
}

/// Extract the most specific reason from an error response body
fn error_reason(body: &Value) -> Option<String> {
    let error = body.get("error")?;
    if let Some(reason) = error.as_str() {
        return Some(reason.to_string());
    }
    error
        .get("root_cause")
        .and_then(|causes| causes.get(0))
        .and_then(|cause| cause.get("reason"))
        .or_else(|| error.get("reason"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn transport_error(err: &reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::timeout()
    } else if err.is_connect() {
        BackendError::unavailable(format!("Cannot connect to search backend: {err}"))
    } else {
        BackendError::unavailable(format!("Search backend request failed: {err}"))
    }
}

#[async_trait]
impl SearchBackend for ElasticBackend {
    async fn search(
        &self,
        request: &SearchRequest,
        trace: &TraceToken,
    ) -> Result<SearchResult, BackendError> {
        let response = self
            .client
            .post(self.search_url())
            .header(OPAQUE_ID_HEADER, trace.as_str())
            .json(&es_body(request))
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let status = response.status();
        let body: Value = response.json().await.map_err(|e| transport_error(&e))?;

        if !status.is_success() {
            let message = error_reason(&body)
                .or_else(|| status.canonical_reason().map(str::to_string))
                .unwrap_or_else(|| "Search backend error".to_string());
            return Err(BackendError::new(status.as_u16(), message));
        }
        parse_response(body)
    }

    fn name(&self) -> &'static str {
        "elasticsearch"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entity::{EntityExample, ExampleEntity};
    use crate::core::types::SortOrder;
    use crate::search::query::{build_entity_query, parse_sorts, Facet};

    #[test]
    fn test_entity_query_translation() {
        let example = ExampleEntity::from_example(
            &EntityExample::new("Person")
                .with("name", &["John Doe"])
                .with("nationality", &["us"]),
        )
        .unwrap();
        let query = build_entity_query(&["sanctions".to_string()], &example).unwrap();
        let es = es_query(&query);

        assert_eq!(es["bool"]["minimum_should_match"], 1);
        assert_eq!(es["bool"]["filter"][1]["terms"]["datasets"][0], "sanctions");
        let should = es["bool"]["should"].as_array().unwrap();
        assert_eq!(should.len(), 2);
        assert_eq!(should[0]["match"]["names"]["query"], "John Doe");
        assert_eq!(should[0]["match"]["names"]["fuzziness"], "AUTO");
        assert_eq!(should[1]["term"]["countries"]["value"], "us");
    }

    #[test]
    fn test_id_lookup_translation() {
        let query = Query::by_filter(Filter::IdOrReferent {
            id: "NK-1".to_string(),
        });
        let es = es_query(&query);
        let lookup = &es["bool"]["filter"][0]["bool"]["should"];
        assert_eq!(lookup[0]["ids"]["values"][0], "NK-1");
        assert_eq!(lookup[1]["term"]["referents"], "NK-1");
        assert!(es["bool"].get("minimum_should_match").is_none());
    }

    #[test]
    fn test_body_sort_and_aggs() {
        let request = SearchRequest::new(Query::default(), 10)
            .with_offset(20)
            .with_sort(parse_sorts(&["last_seen:desc".to_string()]))
            .with_aggregations(vec![Facet {
                field: "countries".to_string(),
                size: 1000,
            }]);
        let body = es_body(&request);
        assert_eq!(body["size"], 10);
        assert_eq!(body["from"], 20);
        assert_eq!(body["sort"][0]["last_seen"]["order"], "desc");
        assert_eq!(body["sort"][1]["_score"]["order"], SortOrder::Desc.to_string());
        assert_eq!(body["aggs"]["countries"]["terms"]["size"], 1000);
    }

    #[test]
    fn test_parse_response() {
        let body = json!({
            "hits": {
                "total": {"value": 10000, "relation": "gte"},
                "hits": [
                    {"_id": "NK-1", "_source": {"schema": "Person", "caption": "John Doe",
                        "properties": {"name": ["John Doe"]}, "datasets": ["us_ofac_sdn"]}}
                ]
            },
            "aggregations": {
                "target": {"buckets": [{"key": 1, "key_as_string": "true", "doc_count": 4}]},
                "countries": {"buckets": [{"key": "ru", "doc_count": 7}]}
            }
        });
        let result = parse_response(body).unwrap();
        assert_eq!(result.hits[0].id, "NK-1");
        assert_eq!(result.total.relation, TotalRelation::Gte);
        assert!(!result.total.is_exact());
        let facets = result.facets.unwrap();
        assert_eq!(facets["target"][0].name, "true");
        assert_eq!(facets["countries"][0].count, 7);
    }

    #[test]
    fn test_parse_invalid_response() {
        let err = parse_response(json!({"unexpected": true})).unwrap_err();
        assert_eq!(err.status, 502);
    }

    #[test]
    fn test_error_reason() {
        let body = json!({"error": {"root_cause": [{"reason": "no such index [entities]"}],
            "reason": "outer"}, "status": 404});
        assert_eq!(error_reason(&body).unwrap(), "no such index [entities]");
        assert_eq!(error_reason(&json!({"error": "boom"})).unwrap(), "boom");
        assert!(error_reason(&json!({})).is_none());
    }

    #[tokio::test]
    async fn test_unreachable_backend() {
        let backend =
            ElasticBackend::new("http://127.0.0.1:9", "entities", Duration::from_secs(2)).unwrap();
        let request = SearchRequest::new(Query::default(), 1);
        let err = backend
            .search(&request, &TraceToken::generate())
            .await
            .unwrap_err();
        assert!(err.status == 502 || err.status == 504);
    }
}
