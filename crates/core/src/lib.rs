pub mod config;
pub mod error;

pub use config::{BeatleConfig, LogFormat, LoggingConfig, ProjectConfig, SignatureScheme};
pub use error::*;
