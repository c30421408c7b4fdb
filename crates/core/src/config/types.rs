use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// Name of the table holding the tick interval and global project defaults.
pub const GLOBAL_SECTION: &str = "beatle";
/// Name of the reserved logging table.
pub const LOGGING_SECTION: &str = "logging";

pub const DEFAULT_LOOP_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_UPDATE_EVERY_SECS: u64 = 600;
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_TIME_ZONE: &str = "Europe/Moscow";

// ── Top-level config ────────────────────────────────────────────────

/// Fully resolved dispatcher configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct BeatleConfig {
    /// Interval between dispatch ticks.
    pub loop_timeout: Duration,
    pub logging: LoggingConfig,
    /// Projects in declaration order.
    pub projects: Vec<ProjectConfig>,
}

/// How outbound request parameters are turned into the signed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignatureScheme {
    /// Sorted parameter values, concatenated. Keys are not signed.
    #[default]
    Values,
    /// Sorted `key=value` pairs joined with `&`.
    KeyValue,
}

impl fmt::Display for SignatureScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Values => f.write_str("values"),
            Self::KeyValue => f.write_str("key-value"),
        }
    }
}

// ── Project ─────────────────────────────────────────────────────────

/// One registered project. Immutable after load.
#[derive(Clone)]
pub struct ProjectConfig {
    /// Section name; unique across the file.
    pub name: String,
    /// Shared HMAC secret.
    pub key: String,
    /// Endpoint serving the task catalog (GET) and receiving triggers (POST).
    pub url: Url,
    /// Default IANA timezone; the remote catalog may override it.
    pub timezone: String,
    /// Default catalog refresh interval.
    pub update_every: Duration,
    /// Default per-request timeout.
    pub timeout: Duration,
    /// Dispatch tick interval inherited from `[beatle]`.
    pub loop_timeout: Duration,
    pub signature_scheme: SignatureScheme,
    /// Reject a whole catalog refresh when any cron expression fails to parse.
    pub strict_cron: bool,
}

impl fmt::Debug for ProjectConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectConfig")
            .field("name", &self.name)
            .field("key", &"<redacted>")
            .field("url", &self.url.as_str())
            .field("timezone", &self.timezone)
            .field("update_every", &self.update_every)
            .field("timeout", &self.timeout)
            .field("loop_timeout", &self.loop_timeout)
            .field("signature_scheme", &self.signature_scheme)
            .field("strict_cron", &self.strict_cron)
            .finish()
    }
}

// ── Logging ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// `[logging]` section. `RUST_LOG` takes precedence over `level`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(rename = "LEVEL", default = "default_log_level")]
    pub level: String,
    #[serde(rename = "FORMAT", default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

// ── Raw sections ────────────────────────────────────────────────────

/// `[beatle]` table as written in the file.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct GlobalSection {
    #[serde(rename = "LOOP_TIMEOUT")]
    pub loop_timeout: Option<u64>,
    #[serde(flatten)]
    pub defaults: ProjectOverrides,
}

/// Settings that a project table can override and `[beatle]` can default.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ProjectOverrides {
    #[serde(rename = "UPDATE_EVERY")]
    pub update_every: Option<u64>,
    #[serde(rename = "TIMEOUT")]
    pub timeout: Option<u64>,
    #[serde(rename = "TIME_ZONE")]
    pub time_zone: Option<String>,
    #[serde(rename = "SIGNATURE_SCHEME")]
    pub signature_scheme: Option<SignatureScheme>,
    #[serde(rename = "STRICT_CRON")]
    pub strict_cron: Option<bool>,
}

/// A project table as written in the file.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ProjectSection {
    #[serde(rename = "KEY")]
    pub key: Option<String>,
    #[serde(rename = "URL")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub overrides: ProjectOverrides,
}
