//! Command-line argument parsing.

use clap::Parser;
use std::path::PathBuf;

/// dds2png CLI arguments
#[derive(Parser, Debug)]
#[command(
    name = "dds2png",
    author = "Creeper Lv.",
    version,
    about = "DDS TO PNG BATCH CONVERTER - convert DDS textures to PNG in parallel",
    long_about = r#"
DDS TO PNG BATCH CONVERTER
==========================

Converts every file matched by an input pattern to PNG. A `**` segment
descends into all subdirectories; the directory layout below it is mirrored
into the paired output directory.

Each -i is paired with the -o at the same position. Inputs without an
output are converted in place, next to the original file.

Examples:
  dds2png -i '../../samples/**/*.dds' -o ../../output
  dds2png -i 'textures/*.dds' -i 'ui/**/*.dds' -o out/tex -o out/ui -j 8
  dds2png -i 'mods/*/textures/*.dds' --skip-existing
"#
)]
pub struct Args {
    /// Input pattern, e.g. "samples/**/*.dds" (repeatable)
    #[arg(short, long = "input", value_name = "PATTERN", required = true)]
    pub inputs: Vec<String>,

    /// Output directory for the input at the same position (repeatable)
    #[arg(short, long = "output", value_name = "DIR")]
    pub outputs: Vec<PathBuf>,

    /// Leave existing output files untouched
    #[arg(short, long)]
    pub skip_existing: bool,

    /// Maximum number of files converted at once (default: CPU cores)
    #[arg(short = 'j', long)]
    pub jobs: Option<usize>,

    /// Print nothing but errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print every converted file and debug logs
    #[arg(short, long)]
    pub verbose: bool,

    /// List the conversions that would run without converting
    #[arg(long)]
    pub dry_run: bool,

    /// Write failed conversions to this file
    #[arg(long, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Write a JSON report of the run to this file
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_inputs_and_outputs() {
        let args = Args::parse_from([
            "dds2png", "-i", "a/*.dds", "--input", "b/**/*.dds", "-o", "out", "-s", "-j", "3",
        ]);
        assert_eq!(args.inputs, vec!["a/*.dds", "b/**/*.dds"]);
        assert_eq!(args.outputs, vec![PathBuf::from("out")]);
        assert!(args.skip_existing);
        assert_eq!(args.jobs, Some(3));
    }

    #[test]
    fn test_input_required() {
        assert!(Args::try_parse_from(["dds2png", "-o", "out"]).is_err());
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Args::try_parse_from(["dds2png", "-i", "x.dds", "-q", "-v"]).is_err());
    }
}
