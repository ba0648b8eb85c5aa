use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::types::TraceToken;
use crate::search::backend::{BackendError, SearchBackend, SearchResult};
use crate::search::query::SearchRequest;

/// Runs search requests against a backend with a bounded timeout.
///
/// Each call either yields a [`SearchResult`] or a [`BackendError`]; a call
/// that exceeds the timeout is abandoned and reported as a 504. Calls are
/// never retried.
#[derive(Clone)]
pub struct SearchExecutor {
    backend: Arc<dyn SearchBackend>,
    timeout: Duration,
}

impl SearchExecutor {
    pub fn new(backend: Arc<dyn SearchBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Name of the underlying backend
    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Execute one request on behalf of the request identified by `trace`
    ///
    /// # Errors
    ///
    /// Returns the backend's error, or a 504 `BackendError` on timeout.
    pub async fn execute(
        &self,
        request: &SearchRequest,
        trace: &TraceToken,
    ) -> Result<SearchResult, BackendError> {
        let start = Instant::now();
        let outcome = tokio::time::timeout(self.timeout, self.backend.search(request, trace)).await;
        let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        match outcome {
            Ok(Ok(result)) => {
                tracing::debug!(
                    trace = %trace,
                    backend = self.backend.name(),
                    limit = request.limit,
                    offset = request.offset,
                    hits = result.hits.len(),
                    total = result.total.value,
                    elapsed_ms,
                    "Search executed"
                );
                Ok(result)
            }
            Ok(Err(err)) => {
                tracing::warn!(
                    trace = %trace,
                    backend = self.backend.name(),
                    status = err.status,
                    elapsed_ms,
                    "Search failed: {}",
                    err.message
                );
                Err(err)
            }
            Err(_) => {
                tracing::warn!(
                    trace = %trace,
                    backend = self.backend.name(),
                    timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                    "Search timed out"
                );
                Err(BackendError::timeout())
            }
        }
    }
}
