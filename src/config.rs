//! Run configuration.
//!
//! Built from the command line, validated once, then shared read-only by the
//! pattern resolution and scheduling stages.

use serde::Serialize;
use std::path::PathBuf;

use crate::cli::Args;
use crate::error::{Dds2PngError, Result};

/// One input pattern and the directory its outputs are mirrored into
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatternPair {
    /// Raw pattern text as given with `-i`
    pub pattern: String,
    /// `None` converts in place, next to each input
    pub destination: Option<PathBuf>,
}

/// Settings for one invocation
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Input patterns with their output directories, in command-line order
    pub pairs: Vec<PatternPair>,
    /// Maximum number of conversions executing at once
    pub concurrency: usize,
    /// Leave existing outputs untouched
    pub skip_existing: bool,
    /// List the jobs without converting anything
    pub dry_run: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pairs: Vec::new(),
            concurrency: default_concurrency(),
            skip_existing: false,
            dry_run: false,
        }
    }
}

impl Config {
    /// Build from parsed arguments. Outputs pair with inputs by position;
    /// inputs past the last output convert in place.
    pub fn from_args(args: &Args) -> Self {
        let pairs = args
            .inputs
            .iter()
            .enumerate()
            .map(|(i, pattern)| PatternPair {
                pattern: pattern.clone(),
                destination: args.outputs.get(i).cloned(),
            })
            .collect();

        Self {
            pairs,
            concurrency: args.jobs.unwrap_or_else(default_concurrency),
            skip_existing: args.skip_existing,
            dry_run: args.dry_run,
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Dds2PngError::InvalidConfig {
                reason: "number of jobs must be greater than 0".to_string(),
            });
        }

        if self.pairs.is_empty() {
            return Err(Dds2PngError::InvalidConfig {
                reason: "at least one input pattern is required".to_string(),
            });
        }

        for pair in &self.pairs {
            if let Some(ref destination) = pair.destination {
                if destination.exists() && !destination.is_dir() {
                    return Err(Dds2PngError::InvalidConfig {
                        reason: format!("output is not a directory: {}", destination.display()),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Available CPU parallelism, or 1 if it cannot be determined
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
