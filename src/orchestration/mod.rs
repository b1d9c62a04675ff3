//! High-level orchestration for harvest setup and execution.

pub mod builder;
pub mod config;
pub mod persistence;
pub mod report;
pub mod shutdown;

pub use builder::{build_harvest, Harvest};
pub use config::{build_harvest_config, ConfigError, HarvestConfig, RunInput, TransportSettings};
pub use persistence::open_ledger;
pub use report::{run_reset_command, run_summary_command, ResetTarget};
pub use shutdown::LifecycleGuard;
