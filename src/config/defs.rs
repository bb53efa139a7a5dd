use std::env;
use std::path::PathBuf;
use std::time::Duration;
use chrono::format::{Item, StrftimeItems};
use thiserror::Error;

// External software
pub const HSPIPELINE_TAG: &str = "hspipeline";

// Stage codes, in the order the pipeline expects them
pub const ALIGN_CODE: char = 'A';
pub const TRIM_CODE: char = 'x';
pub const FIND_CODE: char = 'F';
pub const COMPARE_CODE: char = 'C';
pub const PLOT_CODE: char = 'P';

// Static Filenames
pub const OUTLOG_SUFFIX: &str = "-outlog.txt";
pub const OUTLOG_FINAL_SUFFIX: &str = "-outlog-final.txt";
pub const OUTPUT_DIR_NAME: &str = "output";

// Static Parameters
pub const DEFAULT_DATA_ROOT: &str = "/srv/hspipeline/seq_data";
pub const DEFAULT_INSTALL_ROOT: &str = "/var/www/hspipeline";
pub const DEFAULT_THREADS: usize = 8;
pub const DEFAULT_END_TYPE: &str = "p";
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M";

// Environment overrides
pub const ENV_DATA_ROOT: &str = "HSP_DATA_ROOT";
pub const ENV_OUTPUT_DIR: &str = "HSP_OUTPUT_DIR";
pub const ENV_INSTALL_ROOT: &str = "HSP_INSTALL_ROOT";
pub const ENV_BIN_DIR: &str = "HSP_BIN_DIR";
pub const ENV_COMMAND: &str = "HSP_COMMAND";
pub const ENV_THREADS: &str = "HSP_THREADS";
pub const ENV_END_TYPE: &str = "HSP_END_TYPE";
pub const ENV_SETTLE_DELAY_MS: &str = "HSP_SETTLE_DELAY_MS";
pub const ENV_TIMESTAMP_FORMAT: &str = "HSP_TIMESTAMP_FORMAT";


#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to create output directory {path:?}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Log file error at {path:?}: {source}")]
    Log {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to move log {from:?} to {to:?}: {source}")]
    LogRename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}


/// Deployment settings shared by the path resolver and the runner.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub data_root: PathBuf,
    pub output_dir: PathBuf,
    pub install_root: PathBuf,
    /// Appended to the child's PATH only; the parent environment is untouched.
    pub bin_dir: Option<PathBuf>,
    pub command_name: String,
    pub threads: usize,
    pub end_type: String,
    /// Pause after creating the output dir and before launching the child. Zero disables it.
    pub settle_delay: Duration,
    pub timestamp_format: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        let data_root = PathBuf::from(DEFAULT_DATA_ROOT);
        Self {
            output_dir: data_root.join(OUTPUT_DIR_NAME),
            data_root,
            install_root: PathBuf::from(DEFAULT_INSTALL_ROOT),
            bin_dir: None,
            command_name: HSPIPELINE_TAG.to_string(),
            threads: DEFAULT_THREADS,
            end_type: DEFAULT_END_TYPE.to_string(),
            settle_delay: Duration::ZERO,
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
        }
    }
}

impl RunConfig {
    /// Builds a config rooted at `data_root`, with the output dir underneath it.
    pub fn with_data_root(data_root: impl Into<PathBuf>) -> Self {
        let data_root = data_root.into();
        Self {
            output_dir: data_root.join(OUTPUT_DIR_NAME),
            data_root,
            ..Self::default()
        }
    }

    /// Reads `HSP_*` environment variables over the defaults.
    /// An unset `HSP_OUTPUT_DIR` follows the data root.
    pub fn from_env() -> Result<Self, PipelineError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, PipelineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(ENV_DATA_ROOT) {
            Some(root) => Self::with_data_root(root),
            None => Self::default(),
        };

        if let Some(out) = lookup(ENV_OUTPUT_DIR) {
            config.output_dir = PathBuf::from(out);
        }
        if let Some(root) = lookup(ENV_INSTALL_ROOT) {
            config.install_root = PathBuf::from(root);
        }
        if let Some(bins) = lookup(ENV_BIN_DIR) {
            config.bin_dir = Some(PathBuf::from(bins));
        }
        if let Some(cmd) = lookup(ENV_COMMAND) {
            config.command_name = cmd;
        }
        if let Some(threads) = lookup(ENV_THREADS) {
            config.threads = threads.parse().map_err(|_| {
                PipelineError::InvalidConfig(format!("{} must be an integer, got {:?}", ENV_THREADS, threads))
            })?;
        }
        if let Some(end_type) = lookup(ENV_END_TYPE) {
            config.end_type = end_type;
        }
        if let Some(ms) = lookup(ENV_SETTLE_DELAY_MS) {
            let ms: u64 = ms.parse().map_err(|_| {
                PipelineError::InvalidConfig(format!("{} must be milliseconds, got {:?}", ENV_SETTLE_DELAY_MS, ms))
            })?;
            config.settle_delay = Duration::from_millis(ms);
        }
        if let Some(fmt) = lookup(ENV_TIMESTAMP_FORMAT) {
            config.timestamp_format = fmt;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.command_name.trim().is_empty() {
            return Err(PipelineError::InvalidConfig("command name is empty".to_string()));
        }
        if self.threads == 0 {
            return Err(PipelineError::InvalidConfig("threads must be at least 1".to_string()));
        }
        if self.timestamp_format.is_empty() || self.timestamp_format.contains(std::path::MAIN_SEPARATOR) {
            return Err(PipelineError::InvalidConfig(format!("unusable timestamp format {:?}", self.timestamp_format)));
        }
        if StrftimeItems::new(&self.timestamp_format).any(|item| matches!(item, Item::Error)) {
            return Err(PipelineError::InvalidConfig(format!("invalid timestamp format {:?}", self.timestamp_format)));
        }
        Ok(())
    }

    pub fn thread_flag(&self) -> String {
        format!("-t{}", self.threads)
    }
}
