use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::header;
use axum::{
    extract::{DefaultBodyLimit, Path, Query, Request, State},
    http::{HeaderName, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Redirect, Response},
    routing::{get, post},
    Extension, Router,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::limit::ConcurrencyLimitLayer;
use tower::ServiceBuilder;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::TimeoutLayer;

use crate::catalog::DatasetCatalog;
use crate::cli::ServeArgs;
use crate::config::Settings;
use crate::core::types::TraceToken;
use crate::matching::{AlgorithmRegistry, MatchOrchestrator, MatchParams, UnknownAlgorithm};
use crate::search::backend::SearchBackend;
use crate::search::executor::SearchExecutor;
use crate::search::fetch::{EntityResolver, FetchOutcome};
use crate::search::text::{search_entities, SearchParams};
use crate::utils::validation::is_valid_entity_id;
use crate::web::error::ApiError;

/// Largest accepted request body
pub const MAX_BODY_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Response header carrying the request's trace token
pub const TRACE_HEADER: &str = "x-trace-id";

/// Response header carrying the number of queries processed in a batch
pub const BATCH_SIZE_HEADER: &str = "x-batch-size";

/// Shared application state, built once at startup
pub struct AppState {
    pub settings: Arc<Settings>,
    pub catalog: DatasetCatalog,
    pub registry: Arc<AlgorithmRegistry>,
    pub orchestrator: MatchOrchestrator,
    pub executor: SearchExecutor,
    pub resolver: EntityResolver,
}

impl AppState {
    /// Wire the services around a search backend
    ///
    /// # Errors
    ///
    /// Returns `UnknownAlgorithm` if the configured default or best
    /// algorithm is not registered.
    pub fn new(
        settings: Settings,
        catalog: DatasetCatalog,
        backend: Arc<dyn SearchBackend>,
    ) -> Result<Self, UnknownAlgorithm> {
        let registry = Arc::new(
            AlgorithmRegistry::builtin()
                .with_aliases(&settings.default_algorithm, &settings.best_algorithm)?,
        );
        let settings = Arc::new(settings);
        let executor = SearchExecutor::new(backend, settings.request_timeout);
        let orchestrator =
            MatchOrchestrator::new(executor.clone(), Arc::clone(&registry), Arc::clone(&settings));
        let resolver = EntityResolver::new(executor.clone(), settings.max_page);
        Ok(Self {
            settings,
            catalog,
            registry,
            orchestrator,
            executor,
            resolver,
        })
    }

    fn cache_control(&self) -> String {
        format!("public, max-age={}", self.settings.cache_max_age)
    }
}

/// Query parameters of the match endpoint
#[derive(Debug, Default, Deserialize)]
pub struct MatchQuery {
    pub limit: Option<usize>,
    pub threshold: Option<f64>,
    pub cutoff: Option<f64>,
    pub algorithm: Option<String>,
}

/// Body of the match endpoint. Entries stay raw JSON so that a malformed
/// one is reported under its own name.
#[derive(Debug, Deserialize)]
pub struct MatchRequest {
    pub queries: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct EntityQuery {
    nested: Option<bool>,
}

/// Run the web server
///
/// # Errors
///
/// Returns an error if the tokio runtime cannot be created, the backend or
/// catalog cannot be loaded, or the server fails to start.
pub fn run(args: ServeArgs) -> anyhow::Result<()> {
    // Build tokio runtime
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move { run_server(args).await })
}

/// Create the application router with all routes and middleware configured.
///
/// Rate limiting is added by the server itself, since it needs the peer
/// address of each connection.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/match/{dataset}", post(match_handler))
        .route("/search/{dataset}", get(search_handler))
        .route("/entities/{id}", get(entity_handler))
        .route("/algorithms", get(algorithms_handler))
        .route("/catalog", get(catalog_handler))
        .route("/healthz", get(health_handler))
        .with_state(state)
        .layer(middleware::from_fn(trace_token))
        .layer(
            ServiceBuilder::new()
                // Security headers
                .layer(SetResponseHeaderLayer::if_not_present(
                    HeaderName::from_static("x-content-type-options"),
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    HeaderName::from_static("x-frame-options"),
                    HeaderValue::from_static("DENY"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    HeaderName::from_static("strict-transport-security"),
                    HeaderValue::from_static("max-age=31536000; includeSubDomains"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    HeaderName::from_static("referrer-policy"),
                    HeaderValue::from_static("strict-origin-when-cross-origin"),
                ))
                // Dropping a timed out request aborts its backend calls
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    Duration::from_secs(30),
                ))
                .layer(ConcurrencyLimitLayer::new(100))
                .layer(DefaultBodyLimit::max(MAX_BODY_SIZE)),
        )
}

async fn run_server(args: ServeArgs) -> anyhow::Result<()> {
    let settings = Settings::from(&args.service);
    let catalog = args.backend.load_catalog()?;
    let backend = args.backend.build(settings.request_timeout)?;
    tracing::info!(
        backend = backend.name(),
        datasets = catalog.len(),
        "Loaded search backend"
    );
    let state = Arc::new(AppState::new(settings, catalog, backend)?);

    // IP-based rate limiting
    let governor_conf = GovernorConfigBuilder::default()
        .per_second(10) // 10 requests per second per IP
        .burst_size(50)
        .finish()
        .ok_or_else(|| anyhow::anyhow!("Invalid rate limit configuration"))?;
    let app = create_router(state).layer(GovernorLayer {
        config: Arc::new(governor_conf),
    });

    let addr = format!("{}:{}", args.address, args.port);
    println!("Starting entity-matcher API at http://{addr}");

    if args.open {
        let _ = open::that(format!("http://{addr}/algorithms"));
    }

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Give every request a fresh trace token and echo it in the response
async fn trace_token(mut request: Request, next: Next) -> Response {
    let trace = TraceToken::generate();
    request.extensions_mut().insert(trace.clone());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(trace.as_str()) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(TRACE_HEADER), value);
    }
    response
}

/// Match a batch of example entities within a dataset
async fn match_handler(
    State(state): State<Arc<AppState>>,
    Extension(trace): Extension<TraceToken>,
    Path(dataset): Path<String>,
    query: Result<Query<MatchQuery>, QueryRejection>,
    body: Result<Json<MatchRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let Json(request) = body?;
    let dataset = state.catalog.resolve(&dataset)?;
    let scope = state.catalog.scope(dataset);

    let params = MatchParams {
        limit: query.limit,
        threshold: query.threshold,
        cutoff: query.cutoff,
        algorithm: query.algorithm,
    };
    let batch = state
        .orchestrator
        .match_json_batch(&scope, request.queries, &params, &trace)
        .await?;

    let batch_size = batch.batch_size().to_string();
    Ok((
        [(HeaderName::from_static(BATCH_SIZE_HEADER), batch_size)],
        Json(batch),
    )
        .into_response())
}

fn parse_number(key: &str, value: &str) -> Result<usize, ApiError> {
    value
        .trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid value for {key}: {value}")))
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ApiError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ApiError::BadRequest(format!(
            "Invalid value for {key}: {value}"
        ))),
    }
}

/// Collect search parameters; list filters may be repeated
fn parse_search_params(pairs: Vec<(String, String)>) -> Result<SearchParams, ApiError> {
    let mut params = SearchParams::default();
    for (key, value) in pairs {
        match key.as_str() {
            "q" => params.q = value,
            "schema" => params.schema = Some(value),
            "countries" => params.filters.countries.push(value),
            "topics" => params.filters.topics.push(value),
            "datasets" => params.filters.datasets.push(value),
            "target" => params.filters.target = Some(parse_flag(&key, &value)?),
            "limit" => params.limit = Some(parse_number(&key, &value)?),
            "offset" => params.offset = Some(parse_number(&key, &value)?),
            "fuzzy" => params.fuzzy = parse_flag(&key, &value)?,
            "sort" => params.sort.push(value),
            _ => {}
        }
    }
    Ok(params)
}

/// Free-text search within a dataset
async fn search_handler(
    State(state): State<Arc<AppState>>,
    Extension(trace): Extension<TraceToken>,
    Path(dataset): Path<String>,
    pairs: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(pairs) = pairs?;
    let params = parse_search_params(pairs)?;
    let dataset = state.catalog.resolve(&dataset)?;
    let response = search_entities(
        &state.executor,
        &state.catalog,
        &state.settings,
        dataset,
        &params,
        &trace,
    )
    .await?;

    Ok((
        [(header::CACHE_CONTROL, state.cache_control())],
        Json(response),
    )
        .into_response())
}

/// Whether an id can be placed in a URL path as-is
fn is_path_segment(id: &str) -> bool {
    is_valid_entity_id(id) && !id.contains(&['/', '?', '#', '%'][..])
}

/// Fetch an entity, redirecting merged ids to their canonical record
async fn entity_handler(
    State(state): State<Arc<AppState>>,
    Extension(trace): Extension<TraceToken>,
    Path(id): Path<String>,
    query: Result<Query<EntityQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    if !is_valid_entity_id(&id) {
        return Err(ApiError::BadRequest(format!("Invalid entity id: {id}")));
    }
    let nested = query.nested.unwrap_or(true);
    let outcome = state.resolver.fetch_entity(&id, nested, &trace).await?;

    tracing::info!(
        action = "fetch",
        trace = %trace,
        id = %id,
        nested,
        found = !matches!(outcome, FetchOutcome::NotFound),
        "Fetch"
    );

    match outcome {
        FetchOutcome::Found(entity) => Ok((
            [(header::CACHE_CONTROL, state.cache_control())],
            Json(entity),
        )
            .into_response()),
        FetchOutcome::Redirect(canonical) => {
            if !is_path_segment(&canonical) {
                return Err(ApiError::Internal(format!(
                    "Entity {id} redirects to an invalid id"
                )));
            }
            Ok(Redirect::temporary(&format!("/entities/{canonical}")).into_response())
        }
        FetchOutcome::NotFound => Err(ApiError::NotFound(format!("Entity not found: {id}"))),
    }
}

/// Available scoring algorithms with the default and best
async fn algorithms_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.registry.listing())
}

/// The dataset catalog
async fn catalog_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let datasets: Vec<serde_json::Value> = state
        .catalog
        .datasets
        .iter()
        .map(|d| {
            serde_json::json!({
                "name": d.name,
                "title": d.title,
                "summary": d.summary,
                "publisher": d.publisher,
                "children": d.children,
                "scope": state.catalog.scope(d),
            })
        })
        .collect();

    Json(serde_json::json!({
        "datasets": datasets,
        "count": state.catalog.len(),
    }))
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "backend": state.executor.backend_name(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_parse_repeated_filters() {
        let params = parse_search_params(pairs(&[
            ("q", "putin"),
            ("countries", "ru"),
            ("countries", "by"),
            ("sort", "first_seen:desc"),
            ("fuzzy", "true"),
            ("target", "false"),
            ("limit", "20"),
        ]))
        .unwrap();
        assert_eq!(params.q, "putin");
        assert_eq!(params.filters.countries, vec!["ru", "by"]);
        assert_eq!(params.sort, vec!["first_seen:desc"]);
        assert!(params.fuzzy);
        assert_eq!(params.filters.target, Some(false));
        assert_eq!(params.limit, Some(20));
    }

    #[test]
    fn test_path_segment() {
        assert!(is_path_segment("NK-1"));
        assert!(is_path_segment("Q7747"));
        assert!(!is_path_segment("a/b"));
        assert!(!is_path_segment("a?b=1"));
        assert!(!is_path_segment("50%"));
        assert!(!is_path_segment("a b"));
    }

    #[test]
    fn test_parse_invalid_number() {
        assert!(parse_search_params(pairs(&[("limit", "many")])).is_err());
        assert!(parse_search_params(pairs(&[("fuzzy", "maybe")])).is_err());
    }
}
