//! Single-file conversion.
//!
//! Takes one [`Job`] through the output checks, decode and encode steps and
//! reports how it ended.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::codec::{ImageCodec, PngCodec};
use crate::error::ConvertError;

/// One input file to one output file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Absolute path of the file to convert
    pub input: PathBuf,
    /// Final output path, extension already normalized
    pub output: PathBuf,
    /// Leave an existing output untouched instead of regenerating it
    pub skip_existing: bool,
}

impl Job {
    /// Create a job
    pub fn new(input: PathBuf, output: PathBuf, skip_existing: bool) -> Self {
        Self {
            input,
            output,
            skip_existing,
        }
    }
}

/// Successful terminal states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertStatus {
    /// Output written; sizes of the input and the new PNG
    Converted { bytes_read: u64, bytes_written: u64 },
    /// Output already existed and the job was told to skip it
    Skipped,
}

/// Terminal state of one job
pub type JobResult = std::result::Result<ConvertStatus, ConvertError>;

/// Work the scheduler dispatches for every job
pub trait JobRunner: Sync {
    /// Carry out one job and report how it ended
    fn run(&self, job: &Job) -> JobResult;
}

impl<F> JobRunner for F
where
    F: Fn(&Job) -> JobResult + Sync,
{
    fn run(&self, job: &Job) -> JobResult {
        self(job)
    }
}

/// Converts jobs with an [`ImageCodec`]
#[derive(Debug, Default, Clone)]
pub struct ConversionWorker<C = PngCodec> {
    /// Decoder and encoder used for every job
    codec: C,
}

impl<C: ImageCodec> ConversionWorker<C> {
    /// Worker converting with `codec`
    pub fn new(codec: C) -> Self {
        Self { codec }
    }

    /// Convert a single job
    ///
    /// # Returns
    /// `Skipped` when the output exists and the job skips existing files,
    /// `Converted` with byte counts on success, or the failing step
    pub fn convert(&self, job: &Job) -> JobResult {
        ensure_parent_dir(&job.output)?;

        if job.output.exists() {
            if job.skip_existing {
                debug!("skipping existing {}", job.output.display());
                return Ok(ConvertStatus::Skipped);
            }
            if same_file(&job.input, &job.output) {
                return Err(ConvertError::SameFile {
                    path: job.output.clone(),
                });
            }
            fs::remove_file(&job.output).map_err(|e| ConvertError::OutputWrite {
                path: job.output.clone(),
                reason: format!("cannot remove existing file: {e}"),
            })?;
        }

        let bytes_read = fs::metadata(&job.input).map(|m| m.len()).unwrap_or(0);
        let image = self
            .codec
            .decode(&job.input)
            .map_err(|source| ConvertError::Decode {
                file: job.input.clone(),
                source,
            })?;

        self.codec
            .encode(&image, &job.output)
            .map_err(|source| ConvertError::Encode {
                file: job.output.clone(),
                source,
            })?;

        let bytes_written = fs::metadata(&job.output).map(|m| m.len()).unwrap_or(0);
        Ok(ConvertStatus::Converted {
            bytes_read,
            bytes_written,
        })
    }
}

impl<C: ImageCodec> JobRunner for ConversionWorker<C> {
    fn run(&self, job: &Job) -> JobResult {
        self.convert(job)
    }
}

/// Create the output's parent directory if it is missing
fn ensure_parent_dir(output: &Path) -> Result<(), ConvertError> {
    match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.is_dir() => {
            fs::create_dir_all(parent).map_err(|e| ConvertError::OutputWrite {
                path: parent.to_path_buf(),
                reason: format!("cannot create directory: {e}"),
            })
        }
        _ => Ok(()),
    }
}

/// Whether both paths name the same existing file
fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
