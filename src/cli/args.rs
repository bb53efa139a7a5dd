use std::path::PathBuf;
use std::time::Duration;
use clap::Parser;

use crate::config::defs::{PipelineError, RunConfig, OUTPUT_DIR_NAME};
use crate::pipelines::hsp_runner::RunForm;
use crate::utils::command::StageSelection;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "hsp-runner", version, about = "Runs hspipeline and keeps a timestamped log of the run")]
pub struct Arguments {

    #[arg(short = 'v', long = "verbose", action)]
    pub verbose: bool,

    #[arg(long, help = "Project name, resolved under the data root")]
    pub project: String,

    #[arg(long = "anc", help = "Ancestor reference name, resolved under the data root")]
    pub anc: String,

    #[arg(long = "ref", help = "Reference name, resolved under the data root")]
    pub reference: String,

    #[arg(long, action)]
    pub align: bool,

    #[arg(long, action)]
    pub trim: bool,

    #[arg(long, action)]
    pub find: bool,

    #[arg(long, action)]
    pub compare: bool,

    #[arg(long, action)]
    pub plot: bool,

    #[arg(long, help = "Data root; overrides HSP_DATA_ROOT. Unless an output dir is set, logs go to <data-root>/output")]
    pub data_root: Option<PathBuf>,

    #[arg(long, help = "Log directory; overrides HSP_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    #[arg(long)]
    pub install_root: Option<PathBuf>,

    #[arg(long, help = "Directory appended to the child's PATH")]
    pub bin_dir: Option<PathBuf>,

    #[arg(long = "command")]
    pub command_name: Option<String>,

    #[arg(long)]
    pub threads: Option<usize>,

    #[arg(long)]
    pub end_type: Option<String>,

    #[clap(long, help = "Pause before launching hspipeline, in milliseconds. 0 disables it")]
    pub settle_delay_ms: Option<u64>,

    #[arg(long)]
    pub timestamp_format: Option<String>,
}

impl Arguments {
    pub fn stages(&self) -> StageSelection {
        StageSelection {
            align: self.align,
            trim: self.trim,
            find: self.find,
            compare: self.compare,
            plot: self.plot,
        }
    }

    pub fn form(&self) -> RunForm {
        RunForm {
            stages: self.stages(),
            project_path: self.project.clone(),
            anc_path: self.anc.clone(),
            ref_path: self.reference.clone(),
        }
    }

    /// Layers command-line overrides on top of `base`.
    pub fn apply_overrides(&self, mut base: RunConfig) -> Result<RunConfig, PipelineError> {
        if let Some(root) = &self.data_root {
            // An output dir set elsewhere stays put; one derived from the old root moves with it.
            if self.output_dir.is_none() && base.output_dir == base.data_root.join(OUTPUT_DIR_NAME) {
                base.output_dir = root.join(OUTPUT_DIR_NAME);
            }
            base.data_root = root.clone();
        }
        if let Some(out) = &self.output_dir {
            base.output_dir = out.clone();
        }
        if let Some(root) = &self.install_root {
            base.install_root = root.clone();
        }
        if let Some(bins) = &self.bin_dir {
            base.bin_dir = Some(bins.clone());
        }
        if let Some(cmd) = &self.command_name {
            base.command_name = cmd.clone();
        }
        if let Some(threads) = self.threads {
            base.threads = threads;
        }
        if let Some(end_type) = &self.end_type {
            base.end_type = end_type.clone();
        }
        if let Some(ms) = self.settle_delay_ms {
            base.settle_delay = Duration::from_millis(ms);
        }
        if let Some(fmt) = &self.timestamp_format {
            base.timestamp_format = fmt.clone();
        }
        base.validate()?;
        Ok(base)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_form_fields() {
        let args = Arguments::try_parse_from([
            "hsp-runner", "--project", "proj1", "--anc", "anc1", "--ref", "ref1", "--align", "--plot",
        ])
        .unwrap();

        let form = args.form();
        assert_eq!(form.project_path, "proj1");
        assert_eq!(form.anc_path, "anc1");
        assert_eq!(form.ref_path, "ref1");
        assert_eq!(form.stages.flag_token(), "-AP");
    }

    #[test]
    fn form_fields_are_required() {
        assert!(Arguments::try_parse_from(["hsp-runner", "--project", "proj1"]).is_err());
    }

    #[test]
    fn overrides_win_over_base() {
        let args = Arguments::try_parse_from([
            "hsp-runner", "--project", "p", "--anc", "a", "--ref", "r",
            "--data-root", "/data", "--threads", "4", "--settle-delay-ms", "500", "--command", "hsp-dev",
        ])
        .unwrap();

        let config = args.apply_overrides(RunConfig::default()).unwrap();
        assert_eq!(config.data_root, PathBuf::from("/data"));
        assert_eq!(config.output_dir, PathBuf::from("/data/output"));
        assert_eq!(config.thread_flag(), "-t4");
        assert_eq!(config.settle_delay, Duration::from_millis(500));
        assert_eq!(config.command_name, "hsp-dev");
    }

    #[test]
    fn data_root_keeps_explicit_output_dir() {
        let args = Arguments::try_parse_from([
            "hsp-runner", "--project", "p", "--anc", "a", "--ref", "r", "--data-root", "/data",
        ])
        .unwrap();

        let mut base = RunConfig::default();
        base.output_dir = PathBuf::from("/logs");
        let config = args.apply_overrides(base).unwrap();
        assert_eq!(config.data_root, PathBuf::from("/data"));
        assert_eq!(config.output_dir, PathBuf::from("/logs"));
    }

    #[test]
    fn invalid_override_is_rejected() {
        let args = Arguments::try_parse_from([
            "hsp-runner", "--project", "p", "--anc", "a", "--ref", "r", "--threads", "0",
        ])
        .unwrap();
        assert!(args.apply_overrides(RunConfig::default()).is_err());
    }
}
