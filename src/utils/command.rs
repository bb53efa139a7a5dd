// Functions and structs for building the hspipeline command line

use std::env;
use std::ffi::OsString;
use std::path::Path;

use crate::config::defs::{RunConfig, ALIGN_CODE, TRIM_CODE, FIND_CODE, COMPARE_CODE, PLOT_CODE};
use crate::utils::paths::PathSet;


/// Optional pipeline steps picked on the run form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageSelection {
    pub align: bool,
    pub trim: bool,
    pub find: bool,
    pub compare: bool,
    pub plot: bool,
}

impl StageSelection {
    pub fn all() -> Self {
        Self { align: true, trim: true, find: true, compare: true, plot: true }
    }

    pub fn is_empty(&self) -> bool {
        !(self.align || self.trim || self.find || self.compare || self.plot)
    }

    pub fn flag_token(&self) -> String {
        make_command_string(self.align, self.trim, self.find, self.compare, self.plot)
    }
}


/// Concatenates the stage codes in pipeline order.
///
/// # Returns
/// `-` followed by the codes, or an empty string when nothing is selected.
pub fn make_command_string(align: bool, trim: bool, find: bool, compare: bool, plot: bool) -> String {
    let codes: String = [
        (align, ALIGN_CODE),
        (trim, TRIM_CODE),
        (find, FIND_CODE),
        (compare, COMPARE_CODE),
        (plot, PLOT_CODE),
    ]
        .iter()
        .filter(|(on, _)| *on)
        .map(|(_, code)| *code)
        .collect();

    if codes.is_empty() {
        codes
    } else {
        format!("-{}", codes)
    }
}


/// Builds the full argument vector, command name first.
/// The order is positional for hspipeline and must not change; an empty stage token is still passed.
///
/// # Arguments
///
/// * `config` - RunConfig for command name, threads and end type.
/// * `paths` - Resolved paths for this run.
/// * `stages` - Stage selection from the form.
///
/// # Returns
/// Vec<String> of [cmd, stages, threads, end type, project, reference, ancestor, install root]
pub fn arg_generator(config: &RunConfig, paths: &PathSet, stages: &StageSelection) -> Vec<String> {
    let mut args_vec: Vec<String> = Vec::new();
    args_vec.push(config.command_name.clone());
    args_vec.push(stages.flag_token());
    args_vec.push(config.thread_flag());
    args_vec.push(config.end_type.clone());
    args_vec.push(paths.project.to_string_lossy().to_string());
    args_vec.push(paths.reference.to_string_lossy().to_string());
    args_vec.push(paths.ancestor.to_string_lossy().to_string());
    args_vec.push(paths.install_root.to_string_lossy().to_string());
    args_vec
}


/// Space-joined form of the argument vector, used as the log header.
pub fn command_line(args: &[String]) -> String {
    args.join(" ")
}


/// PATH for the child process: the current PATH with `bin_dir` appended.
///
/// # Returns
/// None when no bin dir is configured, so the child inherits PATH unchanged.
pub fn child_search_path(bin_dir: Option<&Path>) -> Option<OsString> {
    let bin_dir = bin_dir?;
    let mut dirs: Vec<_> = env::var_os("PATH")
        .map(|path| env::split_paths(&path).collect())
        .unwrap_or_default();
    dirs.push(bin_dir.to_path_buf());
    env::join_paths(dirs).ok()
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn every_stage_combination() {
        for mask in 0u8..32 {
            let (align, trim, find, compare, plot) =
                (mask & 1 != 0, mask & 2 != 0, mask & 4 != 0, mask & 8 != 0, mask & 16 != 0);

            let mut expected = String::new();
            if align { expected.push('A'); }
            if trim { expected.push('x'); }
            if find { expected.push('F'); }
            if compare { expected.push('C'); }
            if plot { expected.push('P'); }
            if !expected.is_empty() {
                expected.insert(0, '-');
            }

            assert_eq!(make_command_string(align, trim, find, compare, plot), expected, "mask {:05b}", mask);
        }
    }

    #[test]
    fn known_tokens() {
        assert_eq!(make_command_string(true, false, true, false, true), "-AFP");
        assert_eq!(make_command_string(false, false, false, false, false), "");
        assert_eq!(StageSelection::all().flag_token(), "-AxFCP");
        assert_eq!(StageSelection { trim: true, ..Default::default() }.flag_token(), "-x");
        assert!(StageSelection::default().is_empty());
    }

    #[test]
    fn argument_order() {
        let config = RunConfig::with_data_root("/data");
        let paths = PathSet {
            project: PathBuf::from("/data/proj1"),
            ancestor: PathBuf::from("/data/anc1"),
            reference: PathBuf::from("/data/ref1"),
            output_dir: PathBuf::from("/data/output"),
            install_root: PathBuf::from("/var/www/hspipeline"),
            log: Default::default(),
        };
        let stages = StageSelection { align: true, plot: true, ..Default::default() };

        let args = arg_generator(&config, &paths, &stages);
        assert_eq!(
            args,
            vec!["hspipeline", "-AP", "-t8", "p", "/data/proj1", "/data/ref1", "/data/anc1", "/var/www/hspipeline"]
        );
        assert_eq!(command_line(&args), "hspipeline -AP -t8 p /data/proj1 /data/ref1 /data/anc1 /var/www/hspipeline");

        let bare = arg_generator(&config, &paths, &StageSelection::default());
        assert_eq!(bare.len(), 8);
        assert_eq!(bare[1], "");
    }

    #[test]
    fn search_path_appends_bin_dir() {
        assert!(child_search_path(None).is_none());

        let bins = PathBuf::from("/opt/hsp/bin");
        let path = child_search_path(Some(bins.as_path())).unwrap();
        let dirs: Vec<PathBuf> = env::split_paths(&path).collect();
        assert_eq!(dirs.last(), Some(&bins));
    }
}
