//! Output path mapping.

use std::path::{Path, PathBuf};

use crate::processor::Job;
use crate::resolver::DiscoveredFile;

/// Default canonical output extension
pub const DEFAULT_EXTENSION: &str = "png";

/// Computes where each discovered file is written
#[derive(Debug, Clone)]
pub struct OutputMapper {
    extension: String,
}

impl Default for OutputMapper {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSION)
    }
}

impl OutputMapper {
    /// `extension` may be given with or without the leading dot
    pub fn new(extension: &str) -> Self {
        Self {
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    /// Output path for a discovered file
    ///
    /// # Arguments
    /// * `discovered` - matched input and its relative suffix
    /// * `destination` - output root; `None` writes next to the input
    ///
    /// # Returns
    /// `destination/relative` (or the input path) with its extension replaced
    ///
    /// # Examples
    /// ```
    /// use dds2png::output::OutputMapper;
    /// use dds2png::resolver::DiscoveredFile;
    /// use std::path::{Path, PathBuf};
    ///
    /// let found = DiscoveredFile {
    ///     input: PathBuf::from("/in/sub/y.DDS"),
    ///     relative: PathBuf::from("sub/y.DDS"),
    /// };
    /// let mapper = OutputMapper::default();
    /// assert_eq!(mapper.map(&found, Some(Path::new("out"))), PathBuf::from("out/sub/y.png"));
    /// ```
    pub fn map(&self, discovered: &DiscoveredFile, destination: Option<&Path>) -> PathBuf {
        let target = match destination {
            Some(root) => root.join(&discovered.relative),
            None => discovered.input.clone(),
        };
        target.with_extension(&self.extension)
    }

    /// Job converting `discovered` into its mapped output
    pub fn job(
        &self,
        discovered: DiscoveredFile,
        destination: Option<&Path>,
        skip_existing: bool,
    ) -> Job {
        let output = self.map(&discovered, destination);
        Job::new(discovered.input, output, skip_existing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn found(input: &str, relative: &str) -> DiscoveredFile {
        DiscoveredFile {
            input: PathBuf::from(input),
            relative: PathBuf::from(relative),
        }
    }

    #[test]
    fn test_mirrors_relative_suffix() {
        let mapper = OutputMapper::default();
        let output = mapper.map(&found("/data/a/sub/y.dds", "sub/y.dds"), Some(Path::new("out")));
        assert_eq!(output, PathBuf::from("out/sub/y.png"));
    }

    #[test]
    fn test_in_place_without_destination() {
        let mapper = OutputMapper::default();
        let output = mapper.map(&found("/data/a/sub/y.dds", "sub/y.dds"), None);
        assert_eq!(output, PathBuf::from("/data/a/sub/y.png"));
    }

    #[test]
    fn test_extension_normalized_regardless_of_case() {
        let mapper = OutputMapper::default();
        assert_eq!(
            mapper.map(&found("/x/ICON.DDS", "ICON.DDS"), Some(Path::new("o"))),
            PathBuf::from("o/ICON.png")
        );
        assert_eq!(
            mapper.map(&found("/x/noext", "noext"), Some(Path::new("o"))),
            PathBuf::from("o/noext.png")
        );
        assert_eq!(
            mapper.map(&found("/x/pack.tex.dds", "pack.tex.dds"), None),
            PathBuf::from("/x/pack.tex.png")
        );
    }

    #[test]
    fn test_job_carries_skip_flag() {
        let mapper = OutputMapper::default();
        let job = mapper.job(found("/in/a/b.dds", "a/b.dds"), Some(Path::new("/out")), true);
        assert_eq!(job.input, PathBuf::from("/in/a/b.dds"));
        assert_eq!(job.output, PathBuf::from("/out/a/b.png"));
        assert!(job.skip_existing);
    }

    #[test]
    fn test_custom_extension_with_dot() {
        let mapper = OutputMapper::new(".tga");
        assert_eq!(
            mapper.map(&found("/x/a.dds", "a.dds"), None),
            PathBuf::from("/x/a.tga")
        );
    }
}
