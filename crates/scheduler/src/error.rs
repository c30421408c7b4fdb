use std::time::Duration;

use thiserror::Error;

/// Failures of a single outbound request (catalog fetch or task dispatch).
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{url} returned {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("malformed response body: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Failures while building or evaluating a task catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("task '{task}' has invalid cron expression '{expression}': {source}")]
    CronParse {
        task: String,
        expression: String,
        #[source]
        source: cron::error::Error,
    },

    #[error("unknown timezone '{0}'")]
    Timezone(String),
}

/// Errors raised while wiring up schedulers. Per-tick failures never surface
/// as this type; they are logged at the project boundary.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("signing key rejected: {0}")]
    Signing(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}
