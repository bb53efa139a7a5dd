// src/lib.rs
pub mod config;
pub mod utils;
pub mod pipelines;
pub mod cli;
pub use cli::Arguments;
pub use config::defs::{PipelineError, RunConfig};
pub use pipelines::hsp_runner::{HspRunner, RunForm, RunOutcome, RunReport};
pub use utils::command::StageSelection;
