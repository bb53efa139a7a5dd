// src/utils/paths.rs: Path resolution for a single run

use std::path::{Path, PathBuf};

use chrono::Local;
use log::debug;

use crate::config::defs::{PipelineError, RunConfig, OUTLOG_SUFFIX, OUTLOG_FINAL_SUFFIX};
use crate::utils::file::ensure_dir;


/// In-progress and final log locations. Both share one stem.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogPaths {
    pub stem: String,
    pub outlog: PathBuf,
    pub outlog_final: PathBuf,
}

impl LogPaths {
    pub fn for_stem(output_dir: &Path, stem: &str) -> Self {
        Self {
            stem: stem.to_string(),
            outlog: output_dir.join(format!("{}{}", stem, OUTLOG_SUFFIX)),
            outlog_final: output_dir.join(format!("{}{}", stem, OUTLOG_FINAL_SUFFIX)),
        }
    }

    pub fn exists(&self) -> bool {
        self.outlog.exists() || self.outlog_final.exists()
    }

    /// First stem at or after `base` whose logs are both absent: `base`, then `base_1`, `base_2`, ...
    /// Only meaningful while the caller holds the run lock.
    pub fn next_free(output_dir: &Path, base: &str) -> Self {
        let first = Self::for_stem(output_dir, base);
        if !first.exists() {
            return first;
        }
        (1u32..)
            .map(|n| Self::for_stem(output_dir, &format!("{}_{}", base, n)))
            .find(|candidate| !candidate.exists())
            .unwrap_or(first)
    }
}


/// Resolved locations for one run request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSet {
    pub project: PathBuf,
    pub ancestor: PathBuf,
    pub reference: PathBuf,
    pub output_dir: PathBuf,
    pub install_root: PathBuf,
    pub log: LogPaths,
}

impl PathSet {
    /// Joins the three identifiers onto the data root. Nothing is checked for
    /// existence, and absolute identifiers replace the root as `Path::join` does.
    pub fn resolve(config: &RunConfig, project: &str, ancestor: &str, reference: &str, stamp: &str) -> Self {
        let paths = Self {
            project: config.data_root.join(project),
            ancestor: config.data_root.join(ancestor),
            reference: config.data_root.join(reference),
            output_dir: config.output_dir.clone(),
            install_root: config.install_root.clone(),
            log: LogPaths::for_stem(&config.output_dir, stamp),
        };
        debug!("Resolved paths: {:?}", paths);
        paths
    }

    /// Resolves the paths and makes sure the output dir exists.
    ///
    /// # Returns
    /// The path set and whether the output dir had to be created.
    pub fn prepare(config: &RunConfig, project: &str, ancestor: &str, reference: &str, stamp: &str) -> Result<(Self, bool), PipelineError> {
        let paths = Self::resolve(config, project, ancestor, reference, stamp);
        let created = ensure_dir(&paths.output_dir).map_err(|source| PipelineError::OutputDir {
            path: paths.output_dir.clone(),
            source,
        })?;
        Ok((paths, created))
    }
}


/// Current local time rendered with `format`, e.g. `%Y%m%d%H%M`.
pub fn timestamp(format: &str) -> String {
    Local::now().format(format).to_string()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_under_data_root() {
        let config = RunConfig::with_data_root("/data");
        let paths = PathSet::resolve(&config, "proj1", "anc1", "ref1", "202401021304");

        assert_eq!(paths.project, PathBuf::from("/data/proj1"));
        assert_eq!(paths.ancestor, PathBuf::from("/data/anc1"));
        assert_eq!(paths.reference, PathBuf::from("/data/ref1"));
        assert_eq!(paths.output_dir, PathBuf::from("/data/output"));
        assert_eq!(paths.log.outlog, PathBuf::from("/data/output/202401021304-outlog.txt"));
        assert_eq!(paths.log.outlog_final, PathBuf::from("/data/output/202401021304-outlog-final.txt"));
    }

    #[test]
    fn no_sandboxing() {
        let config = RunConfig::with_data_root("/data");
        let paths = PathSet::resolve(&config, "../etc", "/abs/anc", "", "x");
        assert_eq!(paths.project, PathBuf::from("/data/../etc"));
        assert_eq!(paths.ancestor, PathBuf::from("/abs/anc"));
        assert_eq!(paths.reference, PathBuf::from("/data/"));
    }

    #[test]
    fn timestamp_default_shape() {
        let stamp = timestamp("%Y%m%d%H%M");
        assert_eq!(stamp.len(), 12);
        assert!(stamp.chars().all(|c| c.is_ascii_digit()));
    }
}
