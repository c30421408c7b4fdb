//! Signed HTTP exchange with a project endpoint.
//!
//! A project exposes one URL. `GET` returns its task catalog as JSON,
//! `POST` triggers the named tasks. Both carry a `SIGNATURE` query
//! parameter computed by [`Signer`].

use std::fmt;
use std::time::{Duration, Instant};

use beatle_core::ProjectConfig;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use tracing::{info, warn};
use url::Url;

use crate::error::{ClientError, SchedulerError};
use crate::signer::{Params, Signer, SIGNATURE_PARAM};

/// Parameter carrying the due task names on dispatch.
pub const TASKS_PARAM: &str = "TASKS";

/// Longest response excerpt written to the request log.
const RESPONSE_SUMMARY_CHARS: usize = 256;

/// HTTP methods used against a project endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// Fetch the task catalog.
    Get,
    /// Trigger due tasks.
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => f.write_str("GET"),
            Self::Post => f.write_str("POST"),
        }
    }
}

/// Catalog document served by a project on `GET`.
///
/// Every field is optional. Absent overrides keep the previous value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RemotePayload {
    /// Task name → cron expression.
    #[serde(rename = "TASKS", default)]
    pub tasks: Option<IndexMap<String, String>>,
    #[serde(rename = "TIME_ZONE", default)]
    pub time_zone: Option<String>,
    /// Request timeout in seconds.
    #[serde(rename = "TIMEOUT", default, deserialize_with = "seconds_override")]
    pub timeout: Option<f64>,
    /// Catalog refresh interval in seconds.
    #[serde(rename = "UPDATE_EVERY", default, deserialize_with = "seconds_override")]
    pub update_every: Option<f64>,
}

/// Accept any JSON number (or numeric string) as a seconds override. Other
/// values are ignored rather than failing the whole catalog.
fn seconds_override<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    let secs = match raw {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(secs.filter(|s| s.is_finite()))
}

/// HTTP client bound to one project's endpoint and secret.
pub struct ProjectClient {
    project: String,
    url: Url,
    signer: Signer,
    http: reqwest::Client,
}

impl ProjectClient {
    /// `http` is shared across projects for connection pooling.
    pub fn new(project: &ProjectConfig, http: reqwest::Client) -> Result<Self, SchedulerError> {
        Ok(Self {
            project: project.name.clone(),
            url: project.url.clone(),
            signer: Signer::new(&project.key, project.signature_scheme)?,
            http,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Fetch the project's task catalog.
    pub async fn fetch(&self, timeout: Duration) -> Result<RemotePayload, ClientError> {
        let body = self.request(HttpMethod::Get, &Params::new(), timeout).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Trigger `tasks` with a single signed POST.
    ///
    /// Returns the response body when it is JSON.
    pub async fn dispatch(
        &self,
        tasks: &[String],
        timeout: Duration,
    ) -> Result<Option<Value>, ClientError> {
        let mut params = Params::new();
        params.insert(TASKS_PARAM.to_string(), json!(tasks));

        let body = self.request(HttpMethod::Post, &params, timeout).await?;
        Ok(serde_json::from_str(&body).ok())
    }

    /// Send one signed request and return the body of a 200 response.
    ///
    /// Every attempt is logged with its URL, elapsed time, status and a
    /// response excerpt.
    async fn request(
        &self,
        method: HttpMethod,
        params: &Params,
        timeout: Duration,
    ) -> Result<String, ClientError> {
        let signature = self.signer.sign(params);
        let data = serde_json::to_string(params).unwrap_or_default();

        let builder = match method {
            HttpMethod::Get => self.http.get(self.url.clone()),
            HttpMethod::Post => self.http.post(self.url.clone()).json(params),
        };

        let start = Instant::now();
        let outcome = async {
            let response = builder
                .query(&[(SIGNATURE_PARAM, signature.as_str())])
                .timeout(timeout)
                .send()
                .await?;
            let status = response.status();
            let text = response.text().await?;
            Ok::<_, reqwest::Error>((status, text))
        }
        .await;
        let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        let (status, text) = match outcome {
            Ok(ok) => ok,
            Err(e) => {
                let err = self.classify(e, timeout);
                warn!(
                    project = %self.project,
                    url = %self.url,
                    %method,
                    %data,
                    elapsed_ms,
                    error = %err,
                    "request failed"
                );
                return Err(err);
            }
        };

        info!(
            project = %self.project,
            url = %self.url,
            %method,
            %data,
            elapsed_ms,
            status = status.as_u16(),
            response = %summarize(&text),
            "request completed"
        );

        if status != reqwest::StatusCode::OK {
            return Err(ClientError::Status {
                url: self.url.to_string(),
                status,
            });
        }
        Ok(text)
    }

    fn classify(&self, error: reqwest::Error, timeout: Duration) -> ClientError {
        if error.is_timeout() {
            ClientError::Timeout {
                url: self.url.to_string(),
                timeout,
            }
        } else {
            ClientError::Transport(error)
        }
    }
}

fn summarize(body: &str) -> String {
    let mut chars = body.chars();
    let mut summary: String = chars.by_ref().take(RESPONSE_SUMMARY_CHARS).collect();
    if chars.next().is_some() {
        summary.push_str("...");
    }
    summary
}
