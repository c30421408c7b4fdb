//! Static dispatcher configuration.
//!
//! The configuration file is TOML with one table per section. The `[beatle]`
//! table holds the tick interval and the defaults shared by every project,
//! `[logging]` configures the log output, and every other table declares one
//! project:
//!
//! ```toml
//! [beatle]
//! LOOP_TIMEOUT = 10
//! TIME_ZONE = "Europe/Moscow"
//!
//! [billing]
//! KEY = "shared-secret"
//! URL = "https://billing.internal/cron"
//! TIMEOUT = 3
//! ```
//!
//! Project values fall back to `[beatle]`, then to the hardcoded defaults.

mod loading;
mod types;
mod validation;


pub use loading::load_dotenv;
pub use types::{
    BeatleConfig, LogFormat, LoggingConfig, ProjectConfig, SignatureScheme,
    DEFAULT_LOOP_TIMEOUT_SECS, DEFAULT_TIMEOUT_SECS, DEFAULT_TIME_ZONE,
    DEFAULT_UPDATE_EVERY_SECS, GLOBAL_SECTION, LOGGING_SECTION,
};
