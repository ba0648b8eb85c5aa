//! Backend-agnostic query construction.
//!
//! The builders in this module are pure: they turn an example entity or a
//! piece of search text into a [`Query`] without touching the backend. The
//! backends translate a [`Query`] into their own representation.

use serde::Serialize;

use crate::core::entity::{ExampleEntity, InvalidExample, PropertyAccess};
use crate::core::schema::{PropertyType, Schema};
use crate::core::types::SortOrder;
use crate::utils::validation::normalize_identifier;

/// Index field names shared by all backends
pub mod fields {
    pub const NAMES: &str = "names";
    pub const IDENTIFIERS: &str = "identifiers";
    pub const DATES: &str = "dates";
    pub const COUNTRIES: &str = "countries";
    pub const TOPICS: &str = "topics";
    pub const TEXT: &str = "text";
    pub const DATASETS: &str = "datasets";
    pub const SCHEMA: &str = "schema";
    pub const TARGET: &str = "target";
    /// Ids of all entities a record references
    pub const ENTITIES: &str = "entities";
    pub const REFERENTS: &str = "referents";
}

/// Ranking signal boosts
pub const NAME_BOOST: f64 = 3.0;
pub const IDENTIFIER_BOOST: f64 = 2.0;
pub const DATE_BOOST: f64 = 1.5;
pub const COUNTRY_BOOST: f64 = 1.0;
pub const TEXT_BOOST: f64 = 1.0;

/// Number of buckets requested per facet
pub const FACET_SIZE: usize = 1000;

/// How the tokens of a text signal combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    And,
    Or,
}

/// A scoring clause
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Signal {
    /// Full-text match against an analyzed field
    Text {
        field: &'static str,
        text: String,
        boost: f64,
        fuzzy: bool,
        operator: Operator,
    },
    /// Exact match against a keyword field
    Term {
        field: &'static str,
        value: String,
        boost: f64,
    },
}

impl Signal {
    #[must_use]
    pub fn boost(&self) -> f64 {
        match self {
            Self::Text { boost, .. } | Self::Term { boost, .. } => *boost,
        }
    }
}

/// A non-scoring restriction on the result set
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Filter {
    /// Field holds at least one of the values
    Terms {
        field: &'static str,
        values: Vec<String>,
    },
    /// Boolean field equals the value
    Flag { field: &'static str, value: bool },
    /// Record has this id or lists it among its referents
    IdOrReferent { id: String },
    /// Record id is one of these
    Ids { ids: Vec<String> },
}

/// A structured search query.
///
/// All `must` signals and all filters have to hold. When `should` is not
/// empty, at least one of its signals must match.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Query {
    /// Accepted schema names; empty accepts any
    pub schemata: Vec<&'static str>,
    /// Accepted dataset names; empty accepts any
    pub datasets: Vec<String>,
    pub must: Vec<Signal>,
    pub should: Vec<Signal>,
    pub filters: Vec<Filter>,
}

impl Query {
    /// Look up records by id, e.g. for entity fetch
    #[must_use]
    pub fn by_filter(filter: Filter) -> Self {
        Self {
            filters: vec![filter],
            ..Self::default()
        }
    }
}

/// A terms aggregation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Facet {
    pub field: String,
    pub size: usize,
}

/// One key of a sort specification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortSpec {
    pub field: String,
    pub order: SortOrder,
}

/// A query with paging, aggregations and sorting
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchRequest {
    pub query: Query,
    pub limit: usize,
    pub offset: usize,
    pub aggregations: Vec<Facet>,
    pub sort: Vec<SortSpec>,
}

impl SearchRequest {
    #[must_use]
    pub fn new(query: Query, limit: usize) -> Self {
        Self {
            query,
            limit,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    #[must_use]
    pub fn with_aggregations(mut self, aggregations: Vec<Facet>) -> Self {
        self.aggregations = aggregations;
        self
    }

    #[must_use]
    pub fn with_sort(mut self, sort: Vec<SortSpec>) -> Self {
        self.sort = sort;
        self
    }
}

/// Field filters for free-text search
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilters {
    pub countries: Vec<String>,
    pub topics: Vec<String>,
    pub datasets: Vec<String>,
    pub target: Option<bool>,
}

impl SearchFilters {
    /// Names of the filters that facets are reported for
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        let mut names = vec![fields::COUNTRIES, fields::TOPICS, fields::DATASETS];
        if self.target.is_some() {
            names.push(fields::TARGET);
        }
        names
    }

    fn to_filters(&self) -> Vec<Filter> {
        let mut filters = Vec::new();
        let terms = [
            (fields::COUNTRIES, &self.countries),
            (fields::TOPICS, &self.topics),
            (fields::DATASETS, &self.datasets),
        ];
        for (field, values) in terms {
            let values: Vec<String> = values
                .iter()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect();
            if !values.is_empty() {
                filters.push(Filter::Terms { field, values });
            }
        }
        if let Some(value) = self.target {
            filters.push(Filter::Flag {
                field: fields::TARGET,
                value,
            });
        }
        filters
    }
}

/// Build a match query from a validated example entity.
///
/// Every populated property becomes a ranking signal; at least one has to
/// match. Entity references are not used for ranking.
///
/// # Errors
///
/// Returns `InvalidExample::NotMatchable` if the example's schema cannot be
/// used for matching.
pub fn build_entity_query(
    scope: &[String],
    entity: &ExampleEntity,
) -> Result<Query, InvalidExample> {
    let schema = entity.schema;
    if !schema.matchable {
        return Err(InvalidExample::NotMatchable(schema.name.to_string()));
    }

    let mut should = Vec::new();
    let mut names = entity.names();
    if names.is_empty() {
        // Only partial names given: match the parts on their own
        names = entity
            .type_values(PropertyType::Name)
            .into_iter()
            .map(str::to_string)
            .collect();
    }
    for name in names {
        should.push(Signal::Text {
            field: fields::NAMES,
            text: name,
            boost: NAME_BOOST,
            fuzzy: true,
            operator: Operator::Or,
        });
    }

    for (property, values) in &entity.properties {
        let Some(prop) = schema.property(property) else {
            continue;
        };
        for value in values {
            let signal = match prop.ptype {
                PropertyType::Name | PropertyType::Entity => None,
                PropertyType::Identifier => Some(Signal::Term {
                    field: fields::IDENTIFIERS,
                    value: normalize_identifier(value),
                    boost: IDENTIFIER_BOOST,
                }),
                PropertyType::Date => Some(Signal::Term {
                    field: fields::DATES,
                    value: value.clone(),
                    boost: DATE_BOOST,
                }),
                PropertyType::Country => Some(Signal::Term {
                    field: fields::COUNTRIES,
                    value: value.clone(),
                    boost: COUNTRY_BOOST,
                }),
                PropertyType::Topic => Some(Signal::Term {
                    field: fields::TOPICS,
                    value: value.clone(),
                    boost: TEXT_BOOST,
                }),
                PropertyType::Text | PropertyType::Address | PropertyType::Url => {
                    Some(Signal::Text {
                        field: fields::TEXT,
                        text: value.clone(),
                        boost: TEXT_BOOST,
                        fuzzy: false,
                        operator: Operator::Or,
                    })
                }
            };
            if let Some(signal) = signal.filter(|s| !is_empty_signal(s)) {
                if !should.contains(&signal) {
                    should.push(signal);
                }
            }
        }
    }

    Ok(Query {
        schemata: schema.matchable_schemata(),
        datasets: scope.to_vec(),
        must: Vec::new(),
        should,
        filters: Vec::new(),
    })
}

fn is_empty_signal(signal: &Signal) -> bool {
    match signal {
        Signal::Text { text, .. } => text.trim().is_empty(),
        Signal::Term { value, .. } => value.is_empty(),
    }
}

/// Build a free-text search query.
///
/// Empty text browses the scope: only the filters apply.
#[must_use]
pub fn build_text_query(
    scope: &[String],
    schema: &Schema,
    text: &str,
    filters: &SearchFilters,
    fuzzy: bool,
) -> Query {
    let text = text.trim();
    let must = if text.is_empty() {
        Vec::new()
    } else {
        vec![Signal::Text {
            field: fields::TEXT,
            text: text.to_string(),
            boost: TEXT_BOOST,
            fuzzy,
            operator: Operator::And,
        }]
    };
    let should = if text.is_empty() {
        Vec::new()
    } else {
        // Rank name hits above hits in other text
        vec![Signal::Text {
            field: fields::NAMES,
            text: text.to_string(),
            boost: NAME_BOOST,
            fuzzy,
            operator: Operator::Or,
        }]
    };

    Query {
        schemata: schema.search_schemata(),
        datasets: scope.to_vec(),
        must,
        should,
        filters: filters.to_filters(),
    }
}

/// One terms aggregation per filter name
#[must_use]
pub fn facet_aggregations(names: &[&str]) -> Vec<Facet> {
    names
        .iter()
        .map(|name| Facet {
            field: (*name).to_string(),
            size: FACET_SIZE,
        })
        .collect()
}

/// Parse `field[:asc|desc]` sort tokens.
///
/// An unknown order falls back to ascending. Relevance (`_score`, descending)
/// is always appended as the final key.
///
/// # Examples
///
/// ```
/// use entity_matcher::search::query::parse_sorts;
///
/// let sorts = parse_sorts(&["last_seen:desc".to_string()]);
/// assert_eq!(sorts.len(), 2);
/// assert_eq!(sorts[1].field, "_score");
/// ```
#[must_use]
pub fn parse_sorts(tokens: &[String]) -> Vec<SortSpec> {
    let mut sorts = Vec::new();
    for token in tokens {
        let (field, order) = match token.rsplit_once(':') {
            Some((field, order)) => (field.trim(), order.trim().to_lowercase()),
            None => (token.trim(), String::new()),
        };
        if field.is_empty() {
            continue;
        }
        let order = if order == "desc" {
            SortOrder::Desc
        } else {
            SortOrder::Asc
        };
        sorts.push(SortSpec {
            field: field.to_string(),
            order,
        });
    }
    sorts.push(SortSpec {
        field: "_score".to_string(),
        order: SortOrder::Desc,
    });
    sorts
}
