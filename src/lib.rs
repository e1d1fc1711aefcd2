//! dds2png - DDS TO PNG BATCH CONVERTER
//!
//! Converts image files matched by path patterns to PNG, mirroring the input
//! directory layout into an output directory and converting several files at
//! once under a fixed concurrency limit.
//!
//! # Pipeline
//!
//! - [`pattern`]: parses `samples/**/*.dds` style patterns
//! - [`resolver`]: lazily walks the filesystem for matches
//! - [`output`]: maps each match to its output path
//! - [`scheduler`]: admits jobs through a counting gate and runs them on a
//!   bounded pool, isolating failures per job
//! - [`processor`]: skip/overwrite checks, decode, encode for one file
//! - [`codec`]: the `image`-backed decoder and PNG encoder
//!
//! # Example
//!
//! ```bash
//! dds2png -i '../../samples/**/*.dds' -o ../../output -j 8
//! ```

pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod output;
pub mod pattern;
pub mod processor;
pub mod resolver;
pub mod scheduler;
pub mod stats;

// Re-exports for convenient access
pub use cli::Args;
pub use codec::{ImageCodec, PixelFormat, PngCodec, RawImage};
pub use config::{Config, PatternPair};
pub use error::{ConvertError, Dds2PngError, PatternError, ResolveError, Result};
pub use output::OutputMapper;
pub use pattern::PathPattern;
pub use processor::{ConversionWorker, ConvertStatus, Job, JobResult, JobRunner};
pub use resolver::{DiscoveredFile, PathMatcher};
pub use scheduler::JobScheduler;
pub use stats::{format_bytes, JobFailure, RunOutcome, Statistics};
