use std::env;
use std::path::Path;
use std::time::Duration;

use serde::de::DeserializeOwned;
use url::Url;

use crate::error::ConfigError;

use super::types::{
    BeatleConfig, GlobalSection, LoggingConfig, ProjectConfig, ProjectSection,
    DEFAULT_LOOP_TIMEOUT_SECS, DEFAULT_TIMEOUT_SECS, DEFAULT_TIME_ZONE,
    DEFAULT_UPDATE_EVERY_SECS, GLOBAL_SECTION, LOGGING_SECTION,
};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

impl BeatleConfig {
    /// Parse config from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let table: toml::Table = toml::from_str(toml_str)?;

        let mut global = GlobalSection::default();
        let mut logging = LoggingConfig::default();
        let mut project_sections = Vec::new();

        for (name, value) in table {
            match name.as_str() {
                GLOBAL_SECTION => global = parse_section(&name, value)?,
                LOGGING_SECTION => logging = parse_section(&name, value)?,
                _ => {
                    let section: ProjectSection = parse_section(&name, value)?;
                    project_sections.push((name, section));
                }
            }
        }

        global.apply_env_overrides();

        let loop_timeout =
            Duration::from_secs(global.loop_timeout.unwrap_or(DEFAULT_LOOP_TIMEOUT_SECS));

        let projects = project_sections
            .into_iter()
            .map(|(name, section)| resolve_project(name, section, &global, loop_timeout))
            .collect::<Result<Vec<_>, _>>()?;

        let config = Self {
            loop_timeout,
            logging,
            projects,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Look up a project by section name.
    pub fn project(&self, name: &str) -> Option<&ProjectConfig> {
        self.projects.iter().find(|p| p.name == name)
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!(
            loop_timeout_secs = self.loop_timeout.as_secs(),
            projects = self.projects.len(),
            "config loaded"
        );
        for project in &self.projects {
            tracing::info!(
                project = %project.name,
                url = %project.url,
                timezone = %project.timezone,
                update_every_secs = project.update_every.as_secs(),
                timeout_secs = project.timeout.as_secs(),
                signature = %project.signature_scheme,
                strict_cron = project.strict_cron,
                "  project"
            );
        }
    }
}

impl GlobalSection {
    /// Apply environment variable overrides.
    ///
    /// - `BEATLE_LOOP_TIMEOUT` -> `[beatle].LOOP_TIMEOUT`
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Some(v) = env_opt("BEATLE_LOOP_TIMEOUT") {
            match v.parse::<u64>() {
                Ok(secs) => self.loop_timeout = Some(secs),
                Err(_) => tracing::warn!(value = %v, "ignoring non-numeric BEATLE_LOOP_TIMEOUT"),
            }
        }
    }
}

fn parse_section<T: DeserializeOwned>(name: &str, value: toml::Value) -> Result<T, ConfigError> {
    value.try_into().map_err(|source| ConfigError::Section {
        section: name.to_string(),
        source,
    })
}

fn resolve_project(
    name: String,
    section: ProjectSection,
    global: &GlobalSection,
    loop_timeout: Duration,
) -> Result<ProjectConfig, ConfigError> {
    let key = section
        .key
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ConfigError::invalid(&name, "missing KEY"))?;

    let raw_url = section
        .url
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ConfigError::invalid(&name, "missing URL"))?;
    let url = Url::parse(&raw_url)
        .map_err(|e| ConfigError::invalid(&name, format!("invalid URL '{raw_url}': {e}")))?;

    let own = section.overrides;
    let defaults = &global.defaults;

    let update_every = own
        .update_every
        .or(defaults.update_every)
        .unwrap_or(DEFAULT_UPDATE_EVERY_SECS);
    let timeout = own
        .timeout
        .or(defaults.timeout)
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    let timezone = own
        .time_zone
        .or_else(|| defaults.time_zone.clone())
        .unwrap_or_else(|| DEFAULT_TIME_ZONE.to_string());

    Ok(ProjectConfig {
        name,
        key,
        url,
        timezone,
        update_every: Duration::from_secs(update_every),
        timeout: Duration::from_secs(timeout),
        loop_timeout,
        signature_scheme: own
            .signature_scheme
            .or(defaults.signature_scheme)
            .unwrap_or_default(),
        strict_cron: own.strict_cron.or(defaults.strict_cron).unwrap_or(false),
    })
}
