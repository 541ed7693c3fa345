//! Output files written under temporary names and published together

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// A set of output files that only appear at their final paths once every
/// one of them has been written
///
/// Files are written to `.<name>.partial` next to their final path. Dropping
/// the set without calling [`OutputSet::commit`] removes the staged files.
#[derive(Debug, Default)]
pub struct OutputSet {
    staged: Vec<(PathBuf, PathBuf)>,
}

fn partial_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.partial", name))
}

impl OutputSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `path` and return the temporary path to write it to
    pub fn stage<P: AsRef<Path>>(&mut self, path: P) -> PathBuf {
        let target = path.as_ref().to_path_buf();
        let partial = partial_path(&target);
        self.staged.push((partial.clone(), target));
        partial
    }

    /// Move every staged file to its final path, returning the final paths
    pub fn commit(mut self) -> Result<Vec<PathBuf>> {
        let staged = std::mem::take(&mut self.staged);
        let mut published = Vec::with_capacity(staged.len());
        for (i, (partial, target)) in staged.iter().enumerate() {
            if let Err(e) = fs::rename(partial, target) {
                for (leftover, _) in &staged[i..] {
                    let _ = fs::remove_file(leftover);
                }
                return Err(e.into());
            }
            published.push(target.clone());
        }
        log::debug!("Published {} output files", published.len());
        Ok(published)
    }
}

impl Drop for OutputSet {
    fn drop(&mut self) {
        for (partial, _) in &self.staged {
            let _ = fs::remove_file(partial);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{write_diff_results, write_json};

    fn write_outputs(all: &Path, summary: &Path) -> Result<Vec<PathBuf>> {
        let mut outputs = OutputSet::new();
        write_diff_results(outputs.stage(all), &[])?;
        write_json(outputs.stage(summary), &serde_json::json!({ "significant": 0 }))?;
        outputs.commit()
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("out/run.all.csv")),
            PathBuf::from("out/.run.all.csv.partial")
        );
    }

    #[test]
    fn test_commit_publishes_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let all = dir.path().join("run.all.csv");
        let summary = dir.path().join("run.summary.json");

        let published = write_outputs(&all, &summary).unwrap();
        assert_eq!(published, vec![all.clone(), summary.clone()]);
        assert!(all.exists());
        assert!(summary.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_failed_write_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let all = dir.path().join("run.all.csv");
        // Parent directory does not exist, so the second write fails
        let summary = dir.path().join("missing").join("run.summary.json");

        assert!(write_outputs(&all, &summary).is_err());
        assert!(!all.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
