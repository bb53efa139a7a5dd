use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use lazy_static::lazy_static;
use log::{debug, info, warn};
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::time::sleep;

use crate::config::defs::{PipelineError, RunConfig};
use crate::utils::command::{arg_generator, child_search_path, command_line, StageSelection};
use crate::utils::file::{create_log, move_file, write_log_line};
use crate::utils::paths::{timestamp, LogPaths, PathSet};


lazy_static! {
    // Log stems only have minute resolution, so runs in this process take turns.
    static ref RUN_LOCK: Mutex<()> = Mutex::new(());
}


/// Fields submitted on the run form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunForm {
    pub stages: StageSelection,
    pub project_path: String,
    pub anc_path: String,
    pub ref_path: String,
}


#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    CompletedOk,
    /// The child ran but exited non-zero. `code` is None when it was killed by a signal.
    CompletedWithError { code: Option<i32> },
    /// The child could not be launched or waited on.
    FailedToStart { code: Option<i32>, message: String },
}

impl RunOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, RunOutcome::CompletedOk)
    }
}


#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub command: String,
    pub final_log: PathBuf,
}


/// One hspipeline invocation and its log.
#[derive(Debug)]
pub struct HspRunner {
    config: RunConfig,
    paths: PathSet,
    args: Vec<String>,
}

impl HspRunner {
    /// Resolves paths, creates the output dir if needed and builds the argument vector.
    ///
    /// # Arguments
    ///
    /// * `config` - Deployment settings.
    /// * `form` - Stage selection and the project, ancestor and reference names.
    ///
    /// # Returns
    /// A runner ready for `run`, or `PipelineError::OutputDir` when the output dir can't be made.
    pub async fn new(config: RunConfig, form: &RunForm) -> Result<Self, PipelineError> {
        config.validate()?;

        let stamp = timestamp(&config.timestamp_format);
        let (paths, created) = PathSet::prepare(&config, &form.project_path, &form.anc_path, &form.ref_path, &stamp)?;
        if created {
            info!("Created output directory {:?}", paths.output_dir);
            settle(config.settle_delay).await;
        }

        if form.stages.is_empty() {
            debug!("No stages selected; hspipeline gets an empty stage token");
        }
        let args = arg_generator(&config, &paths, &form.stages);
        debug!("hspipeline args: {:?}", args);

        Ok(Self {
            config,
            paths,
            args,
        })
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn command_line(&self) -> String {
        command_line(&self.args)
    }

    pub fn paths(&self) -> &PathSet {
        &self.paths
    }

    /// Runs the child with stdout and stderr captured in the log, then moves the log to its final name.
    ///
    /// A child that fails to launch, or exits non-zero, is recorded in the log and in the
    /// returned outcome. Only log file problems are returned as errors.
    pub async fn run(&mut self) -> Result<RunReport, PipelineError> {
        let _guard = RUN_LOCK.lock().await;

        let log = LogPaths::next_free(&self.paths.output_dir, &self.paths.log.stem);
        if log != self.paths.log {
            warn!("Log stem {} already used, writing to {} instead", self.paths.log.stem, log.stem);
            self.paths.log = log;
        }
        let outlog = self.paths.log.outlog.clone();
        let outlog_final = self.paths.log.outlog_final.clone();

        let command = self.command_line();
        let mut outfile = create_log(&outlog).map_err(|source| PipelineError::Log {
            path: outlog.clone(),
            source,
        })?;
        write_log_line(&mut outfile, &command).map_err(|source| PipelineError::Log {
            path: outlog.clone(),
            source,
        })?;

        settle(self.config.settle_delay).await;

        info!("Running: {}", command);
        let outcome = self.execute(&mut outfile).await;
        drop(outfile);

        move_file(&outlog, &outlog_final).map_err(|source| PipelineError::LogRename {
            from: outlog.clone(),
            to: outlog_final.clone(),
            source,
        })?;
        info!("Run finished ({:?}); log at {:?}", outcome, outlog_final);

        Ok(RunReport {
            outcome,
            command,
            final_log: outlog_final,
        })
    }

    async fn execute(&self, outfile: &mut File) -> RunOutcome {
        match self.spawn_and_wait(outfile).await {
            Ok(status) if status.success() => RunOutcome::CompletedOk,
            Ok(status) => {
                let line = format!("{} exited with {}", self.config.command_name, status);
                warn!("{}", line);
                if let Err(e) = write_log_line(outfile, &line) {
                    warn!("Could not record exit status in log: {}", e);
                }
                RunOutcome::CompletedWithError { code: status.code() }
            }
            Err(e) => {
                let code = e.raw_os_error();
                let description = describe_io_error(&e);
                let err = format!(
                    "HspRunner::run() failed with error code {}: {}",
                    code.map(|c| c.to_string()).unwrap_or_else(|| "unknown".to_string()),
                    description
                );
                if let Err(write_err) = write_log_line(outfile, &err) {
                    warn!("Could not record failure in log: {}", write_err);
                }
                eprintln!("{}", err);
                RunOutcome::FailedToStart {
                    code,
                    message: description,
                }
            }
        }
    }

    async fn spawn_and_wait(&self, outfile: &File) -> io::Result<ExitStatus> {
        // Both handles share the log's file offset, so output lands after the header in arrival order.
        let stdout = outfile.try_clone()?;
        let stderr = outfile.try_clone()?;

        let mut cmd = Command::new(&self.args[0]);
        cmd.args(&self.args[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr));

        if let Some(search_path) = child_search_path(self.config.bin_dir.as_deref()) {
            cmd.env("PATH", search_path);
        }

        cmd.status().await
    }
}


/// OS description of `e` without the trailing "(os error N)" that `Display` adds.
fn describe_io_error(e: &io::Error) -> String {
    let text = e.to_string();
    match e.raw_os_error() {
        Some(code) => text
            .strip_suffix(&format!(" (os error {})", code))
            .map(str::to_string)
            .unwrap_or(text),
        None => text,
    }
}


async fn settle(delay: Duration) {
    if !delay.is_zero() {
        debug!("Settling for {} ms", delay.as_millis());
        sleep(delay).await;
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn os_errors_are_described_once() {
        let e = io::Error::from_raw_os_error(2);
        let description = describe_io_error(&e);
        assert!(!description.contains("os error"), "got {:?}", description);
        assert!(!description.is_empty());

        let custom = io::Error::new(io::ErrorKind::Other, "pipe closed");
        assert_eq!(describe_io_error(&custom), "pipe closed");
    }
}
