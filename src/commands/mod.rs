//! Command handlers module.
//!
//! - `run.rs`: pipeline run over a batch file
//! - `status.rs`: history database status
//! - `config.rs`: configuration display

mod config;
mod run;
mod status;

pub use config::cmd_config;
pub use run::{RunArgs, cmd_run};
pub use status::cmd_status;
