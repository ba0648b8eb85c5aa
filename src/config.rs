//! Service settings.
//!
//! Every knob can be set on the command line or through an
//! `ENTITY_MATCHER_*` environment variable. The resolved [`Settings`] are
//! built once at startup and shared read-only by every request.

use std::time::Duration;

/// Resolved service settings
#[derive(Debug, Clone)]
pub struct Settings {
    /// Default number of matches returned per query
    pub match_page: usize,
    /// Largest `limit` accepted by the match endpoint
    pub max_matches: usize,
    /// Largest number of queries in one batch
    pub max_batch: usize,
    /// Candidates fetched from the backend per requested match
    pub candidate_factor: usize,
    /// Score at or above which a candidate is flagged as a match
    pub score_threshold: f64,
    /// Score below which candidates are dropped
    pub score_cutoff: f64,
    /// Default page size for search
    pub default_page: usize,
    /// Largest page size for any backend request
    pub max_page: usize,
    pub max_offset: usize,
    /// Deepest result the backend will page to
    pub max_results: usize,
    pub default_algorithm: String,
    pub best_algorithm: String,
    /// Root of the schema taxonomy, used when a search names no schema
    pub base_schema: String,
    /// Timeout applied to each backend call
    pub request_timeout: Duration,
    /// `max-age` for cacheable responses, in seconds
    pub cache_max_age: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            match_page: 5,
            max_matches: 500,
            max_batch: 100,
            candidate_factor: 10,
            score_threshold: 0.70,
            score_cutoff: 0.50,
            default_page: 10,
            max_page: 500,
            max_offset: 9499,
            max_results: 9999,
            default_algorithm: "logic-v1".to_string(),
            best_algorithm: "logic-v1".to_string(),
            base_schema: "Thing".to_string(),
            request_timeout: Duration::from_secs(10),
            cache_max_age: 3600,
        }
    }
}

/// Service settings as command-line arguments
#[derive(clap::Args, Debug, Clone)]
pub struct ServiceArgs {
    /// Default number of matches per query
    #[arg(long, env = "ENTITY_MATCHER_MATCH_PAGE", default_value = "5")]
    pub match_page: usize,

    /// Maximum number of matches per query
    #[arg(long, env = "ENTITY_MATCHER_MAX_MATCHES", default_value = "500")]
    pub max_matches: usize,

    /// Maximum number of queries in a batch
    #[arg(long, env = "ENTITY_MATCHER_MAX_BATCH", default_value = "100")]
    pub max_batch: usize,

    /// Candidates fetched per requested match
    #[arg(long, env = "ENTITY_MATCHER_CANDIDATE_FACTOR", default_value = "10")]
    pub candidate_factor: usize,

    /// Default match threshold
    #[arg(long, env = "ENTITY_MATCHER_SCORE_THRESHOLD", default_value = "0.7")]
    pub score_threshold: f64,

    /// Default score cutoff
    #[arg(long, env = "ENTITY_MATCHER_SCORE_CUTOFF", default_value = "0.5")]
    pub score_cutoff: f64,

    /// Default scoring algorithm
    #[arg(long, env = "ENTITY_MATCHER_ALGORITHM", default_value = "logic-v1")]
    pub algorithm: String,

    /// Algorithm selected by the name `best`
    #[arg(long, env = "ENTITY_MATCHER_BEST_ALGORITHM", default_value = "logic-v1")]
    pub best_algorithm: String,

    /// Backend request timeout in seconds
    #[arg(long, env = "ENTITY_MATCHER_TIMEOUT", default_value = "10")]
    pub timeout: u64,

    /// Cache max-age for search and entity responses, in seconds
    #[arg(long, env = "ENTITY_MATCHER_CACHE_MAX_AGE", default_value = "3600")]
    pub cache_max_age: u64,
}

impl From<&ServiceArgs> for Settings {
    fn from(args: &ServiceArgs) -> Self {
        Self {
            match_page: args.match_page,
            max_matches: args.max_matches,
            max_batch: args.max_batch,
            candidate_factor: args.candidate_factor.max(1),
            score_threshold: args.score_threshold,
            score_cutoff: args.score_cutoff,
            default_algorithm: args.algorithm.clone(),
            best_algorithm: args.best_algorithm.clone(),
            request_timeout: Duration::from_secs(args.timeout),
            cache_max_age: args.cache_max_age,
            ..Settings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        service: ServiceArgs,
    }

    #[test]
    fn test_defaults_match_args() {
        let cli = TestCli::parse_from(["test"]);
        let settings = Settings::from(&cli.service);
        let defaults = Settings::default();
        assert_eq!(settings.max_batch, defaults.max_batch);
        assert_eq!(settings.match_page, defaults.match_page);
        assert!((settings.score_threshold - defaults.score_threshold).abs() < f64::EPSILON);
        assert_eq!(settings.request_timeout, defaults.request_timeout);
        assert_eq!(settings.best_algorithm, "logic-v1");
    }

    #[test]
    fn test_override() {
        let cli = TestCli::parse_from(["test", "--max-batch", "3", "--timeout", "1"]);
        let settings = Settings::from(&cli.service);
        assert_eq!(settings.max_batch, 3);
        assert_eq!(settings.request_timeout, Duration::from_secs(1));
    }
}
