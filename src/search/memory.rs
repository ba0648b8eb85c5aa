//! In-process search backend.
//!
//! Holds a fixed set of [`EntityRecord`]s and evaluates [`Query`]s against
//! them directly. Used by the CLI when no Elasticsearch cluster is available,
//! and by tests.
//!
//! ## Example
//!
//! ```rust
//! use entity_matcher::core::entity::EntityRecord;
//! use entity_matcher::search::memory::MemoryBackend;
//!
//! let backend = MemoryBackend::new(vec![
//!     EntityRecord::new("NK-1", "Person")
//!         .with_property("name", &["John Doe"])
//!         .with_datasets(&["us_ofac_sdn"]),
//! ]);
//! assert_eq!(backend.len(), 1);
//! ```

use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use thiserror::Error;

use crate::core::entity::{EntityRecord, PropertyAccess};
use crate::core::schema::PropertyType;
use crate::core::types::{SortOrder, Total, TraceToken};
use crate::search::backend::{BackendError, FacetBucket, SearchBackend, SearchResult};
use crate::search::query::{fields, Filter, Operator, Query, SearchRequest, Signal, SortSpec};
use crate::utils::text::{name_tokens, normalize_name};
use crate::utils::validation::normalize_identifier;

/// Minimum Jaro-Winkler similarity for two tokens to match fuzzily
const FUZZY_TOKEN_SIMILARITY: f64 = 0.85;

/// Tokens shorter than this only match exactly
const FUZZY_MIN_TOKEN_LEN: usize = 4;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to read entities: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Invalid entity on line {line}: {source}")]
    ParseError {
        line: usize,
        source: serde_json::Error,
    },
}

/// Searchable field values derived from one record
#[derive(Debug, Default)]
struct IndexedFields {
    terms: HashMap<&'static str, BTreeSet<String>>,
    name_tokens: BTreeSet<String>,
    text_tokens: BTreeSet<String>,
}

impl IndexedFields {
    fn from_record(record: &EntityRecord) -> Self {
        let mut indexed = Self::default();
        let schema = record.schema_def();

        for (property, values) in &record.properties {
            let ptype = schema
                .and_then(|s| s.property(property))
                .map(|p| p.ptype);
            for value in values {
                match ptype {
                    Some(PropertyType::Name) => {
                        indexed.add(fields::NAMES, normalize_name(value));
                        indexed.name_tokens.extend(name_tokens(value));
                    }
                    Some(PropertyType::Identifier) => {
                        indexed.add(fields::IDENTIFIERS, normalize_identifier(value));
                    }
                    Some(PropertyType::Date) => {
                        // Partial dates match on year and month prefixes
                        for len in [4, 7, 10] {
                            if let Some(prefix) = value.get(..len) {
                                indexed.add(fields::DATES, prefix.to_string());
                            }
                        }
                    }
                    Some(PropertyType::Country) => {
                        indexed.add(fields::COUNTRIES, value.to_lowercase());
                    }
                    Some(PropertyType::Topic) => {
                        indexed.add(fields::TOPICS, value.clone());
                    }
                    Some(PropertyType::Entity) => {
                        indexed.add(fields::ENTITIES, value.clone());
                        continue;
                    }
                    _ => {}
                }
                indexed.text_tokens.extend(name_tokens(value));
            }
        }

        for name in record.names() {
            indexed.add(fields::NAMES, normalize_name(&name));
            indexed.name_tokens.extend(name_tokens(&name));
        }
        indexed.text_tokens.extend(indexed.name_tokens.iter().cloned());

        for dataset in &record.datasets {
            indexed.add(fields::DATASETS, dataset.clone());
        }
        for referent in &record.referents {
            indexed.add(fields::REFERENTS, referent.clone());
        }
        indexed.add(fields::SCHEMA, record.schema.clone());
        indexed.add(fields::TARGET, record.target.to_string());
        indexed
    }

    fn add(&mut self, field: &'static str, value: String) {
        if !value.is_empty() {
            self.terms.entry(field).or_default().insert(value);
        }
    }

    fn has_term(&self, field: &str, value: &str) -> bool {
        self.terms.get(field).is_some_and(|v| v.contains(value))
    }

    fn terms(&self, field: &str) -> impl Iterator<Item = &String> {
        self.terms.get(field).into_iter().flatten()
    }

    fn tokens(&self, field: &str) -> &BTreeSet<String> {
        if field == fields::NAMES {
            &self.name_tokens
        } else {
            &self.text_tokens
        }
    }
}

struct IndexedRecord {
    record: EntityRecord,
    fields: IndexedFields,
}

/// An immutable in-memory entity index
pub struct MemoryBackend {
    records: Vec<IndexedRecord>,
}

impl MemoryBackend {
    /// Index a set of records
    #[must_use]
    pub fn new(records: Vec<EntityRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|record| IndexedRecord {
                fields: IndexedFields::from_record(&record),
                record,
            })
            .collect();
        Self { records }
    }

    /// Load records from a JSON lines file, one entity per line.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a line is not a valid
    /// entity record.
    pub fn load_from_file(path: &Path) -> Result<Self, LoadError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_lines(&content)
    }

    /// Parse records from JSON lines; blank lines are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first line that is not a valid record.
    pub fn from_json_lines(content: &str) -> Result<Self, LoadError> {
        let mut records = Vec::new();
        for (idx, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record = serde_json::from_str(line).map_err(|source| LoadError::ParseError {
                line: idx + 1,
                source,
            })?;
            records.push(record);
        }
        Ok(Self::new(records))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Score a record against a query, or None if it does not match
fn evaluate(query: &Query, indexed: &IndexedRecord) -> Option<f64> {
    let terms = &indexed.fields;
    if !query.schemata.is_empty()
        && !query.schemata.iter().any(|s| *s == indexed.record.schema)
    {
        return None;
    }
    if !query.datasets.is_empty()
        && !indexed
            .record
            .datasets
            .iter()
            .any(|d| query.datasets.contains(d))
    {
        return None;
    }
    if !query.filters.iter().all(|f| filter_matches(f, indexed)) {
        return None;
    }

    let mut score = 0.0;
    for signal in &query.must {
        score += signal_score(signal, terms)?;
    }
    let mut any_should = query.should.is_empty();
    for signal in &query.should {
        if let Some(s) = signal_score(signal, terms) {
            any_should = true;
            score += s;
        }
    }
    any_should.then_some(score)
}

fn filter_matches(filter: &Filter, indexed: &IndexedRecord) -> bool {
    match filter {
        Filter::Terms { field, values } => {
            values.iter().any(|v| indexed.fields.has_term(field, v))
        }
        Filter::Flag { field, value } => indexed.fields.has_term(field, &value.to_string()),
        Filter::IdOrReferent { id } => {
            indexed.record.id == *id || indexed.record.referents.contains(id)
        }
        Filter::Ids { ids } => ids.contains(&indexed.record.id),
    }
}

fn token_matches(query_token: &str, tokens: &BTreeSet<String>, fuzzy: bool) -> bool {
    if tokens.contains(query_token) {
        return true;
    }
    fuzzy
        && query_token.chars().count() >= FUZZY_MIN_TOKEN_LEN
        && tokens
            .iter()
            .any(|t| strsim::jaro_winkler(query_token, t) >= FUZZY_TOKEN_SIMILARITY)
}

/// Contribution of one signal to the record score, or None if it misses
fn signal_score(signal: &Signal, indexed: &IndexedFields) -> Option<f64> {
    match signal {
        Signal::Term {
            field,
            value,
            boost,
        } => indexed.has_term(field, value).then_some(*boost),
        Signal::Text {
            field,
            text,
            boost,
            fuzzy,
            operator,
        } => {
            let query_tokens = name_tokens(text);
            if query_tokens.is_empty() {
                return None;
            }
            let tokens = indexed.tokens(field);
            let matched = query_tokens
                .iter()
                .filter(|t| token_matches(t, tokens, *fuzzy))
                .count();
            let ok = match operator {
                Operator::And => matched == query_tokens.len(),
                Operator::Or => matched > 0,
            };
            if !ok {
                return None;
            }
            #[allow(clippy::cast_precision_loss)]
            let fraction = matched as f64 / query_tokens.len() as f64;
            // Whole-name hits rank above scattered token hits
            let exact = *field == fields::NAMES && indexed.has_term(field, &normalize_name(text));
            Some(boost * fraction * if exact { 2.0 } else { 1.0 })
        }
    }
}

/// Sort key value of a record for one sort field
fn sort_value<'a>(record: &'a EntityRecord, field: &str) -> Option<&'a str> {
    match field {
        "id" => Some(record.id.as_str()),
        "caption" => Some(record.caption.as_str()),
        "schema" => Some(record.schema.as_str()),
        "first_seen" => record.first_seen.as_deref(),
        "last_seen" => record.last_seen.as_deref(),
        _ => None,
    }
}

fn compare_hits(
    a: &(f64, &EntityRecord),
    b: &(f64, &EntityRecord),
    sort: &[SortSpec],
) -> Ordering {
    for spec in sort {
        let ordering = if spec.field == "_score" {
            a.0.total_cmp(&b.0)
        } else {
            match (sort_value(a.1, &spec.field), sort_value(b.1, &spec.field)) {
                (Some(x), Some(y)) => x.cmp(y),
                // Missing values sort last in either direction
                (Some(_), None) => return Ordering::Less,
                (None, Some(_)) => return Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        };
        let ordering = match spec.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

#[async_trait]
impl SearchBackend for MemoryBackend {
    async fn search(
        &self,
        request: &SearchRequest,
        trace: &TraceToken,
    ) -> Result<SearchResult, BackendError> {
        let mut hits: Vec<(f64, &IndexedRecord)> = self
            .records
            .iter()
            .filter_map(|r| evaluate(&request.query, r).map(|score| (score, r)))
            .collect();

        let facets = if request.aggregations.is_empty() {
            None
        } else {
            let mut facets = BTreeMap::new();
            for facet in &request.aggregations {
                let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
                for (_, indexed) in &hits {
                    for value in indexed.fields.terms(&facet.field) {
                        *counts.entry(value.as_str()).or_default() += 1;
                    }
                }
                let mut buckets: Vec<FacetBucket> = counts
                    .into_iter()
                    .map(|(name, count)| FacetBucket {
                        name: name.to_string(),
                        count,
                    })
                    .collect();
                buckets.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
                buckets.truncate(facet.size);
                facets.insert(facet.field.clone(), buckets);
            }
            Some(facets)
        };

        let sort = if request.sort.is_empty() {
            vec![SortSpec {
                field: "_score".to_string(),
                order: SortOrder::Desc,
            }]
        } else {
            request.sort.clone()
        };
        hits.sort_by(|a, b| compare_hits(&(a.0, &a.1.record), &(b.0, &b.1.record), &sort));

        let total = Total::exact(hits.len() as u64);
        let hits: Vec<EntityRecord> = hits
            .into_iter()
            .skip(request.offset)
            .take(request.limit)
            .map(|(_, indexed)| indexed.record.clone())
            .collect();

        tracing::debug!(
            trace = %trace,
            hits = hits.len(),
            total = total.value,
            "Memory search"
        );

        Ok(SearchResult {
            hits,
            total,
            facets,
        })
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
