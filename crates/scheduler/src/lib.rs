//! Leader-gated cron dispatcher.
//!
//! This crate provides:
//! - `Signer` for HMAC request signatures
//! - `ProjectClient` for the signed catalog fetch and task dispatch calls
//! - `TaskCatalog` with staleness control and due-task windowing
//! - `ProjectScheduler`, one project's refresh/evaluate/dispatch cycle
//! - `LeaderGate` implementations and the `DispatchLoop` that ties it together

pub mod catalog;
pub mod client;
pub mod dispatch_loop;
pub mod error;
pub mod leader;
pub mod project;
pub mod signer;

pub use catalog::{DueTask, TaskCatalog};
pub use client::{HttpMethod, ProjectClient, RemotePayload};
pub use dispatch_loop::{DispatchLoop, TickOutcome};
pub use error::{CatalogError, ClientError, SchedulerError};
pub use leader::{FileLeaderGate, LeaderGate, StandaloneGate, WatchLeaderGate};
pub use project::{CycleReport, ProjectScheduler, RefreshOutcome};
pub use signer::Signer;
