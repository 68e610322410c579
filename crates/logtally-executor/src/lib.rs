//! Query orchestration for per-minute log counts
//!
//! Composes range resolution, paginated upstream fetching, merging and
//! extraction into a single `execute` call.

pub mod config;
pub mod fetch;
pub mod health;
pub mod orchestrator;
pub mod source;

pub use config::OrchestratorConfig;
pub use fetch::{fetch_all, FetchOutcome};
pub use health::{HealthCheckResult, HealthStatus};
pub use orchestrator::QueryOrchestrator;
pub use source::{LogPage, LogSource, MemoryLogSource};
