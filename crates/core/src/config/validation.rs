use super::types::{BeatleConfig, GLOBAL_SECTION};
use crate::error::ConfigError;

impl BeatleConfig {
    /// Validate the resolved config: tick interval, URL schemes, timeouts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_loop_timeout()?;
        self.validate_projects()?;
        Ok(())
    }

    fn validate_loop_timeout(&self) -> Result<(), ConfigError> {
        if self.loop_timeout.is_zero() {
            return Err(ConfigError::invalid(
                GLOBAL_SECTION,
                "LOOP_TIMEOUT must be greater than zero",
            ));
        }
        Ok(())
    }

    fn validate_projects(&self) -> Result<(), ConfigError> {
        for project in &self.projects {
            match project.url.scheme() {
                "http" | "https" => {}
                other => {
                    return Err(ConfigError::invalid(
                        &project.name,
                        format!("unsupported URL scheme '{other}', expected http or https"),
                    ));
                }
            }
            if project.timeout.is_zero() {
                return Err(ConfigError::invalid(
                    &project.name,
                    "TIMEOUT must be greater than zero",
                ));
            }
        }
        Ok(())
    }
}
