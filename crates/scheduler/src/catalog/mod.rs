//! Per-project task catalog with staleness control and due-task windowing.
//!
//! A [`TaskCatalog`] is an immutable snapshot: a refresh builds a new catalog
//! from the remote payload and the caller swaps it in. A payload that cannot
//! be turned into a catalog leaves the previous snapshot in place.

mod core;
pub(crate) mod cron;

#[cfg(test)]
mod tests;

pub use self::core::{DueTask, ScheduledTask, TaskCatalog};
pub use self::cron::{parse_cron, resolve_timezone, time_until_next};
