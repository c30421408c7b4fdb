use thiserror::Error;

/// Errors raised while loading the static dispatcher configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("section [{section}] is malformed: {source}")]
    Section {
        section: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("section [{section}]: {reason}")]
    Invalid { section: String, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(section: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            section: section.to_string(),
            reason: reason.into(),
        }
    }
}
