//! dds2png - DDS TO PNG BATCH CONVERTER
//!
//! Main entry point

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::cell::RefCell;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use dds2png::{
    cli::Args,
    codec::PngCodec,
    config::{Config, PatternPair},
    output::OutputMapper,
    pattern::PathPattern,
    processor::{ConversionWorker, ConvertStatus, Job, JobResult},
    resolver::PathMatcher,
    scheduler::JobScheduler,
    stats::{JobFailure, RunOutcome},
};

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_tracing(&args);

    let config = Config::from_args(&args);
    config.validate()?;

    if !args.quiet {
        print_header(&config);
    }

    // Rejected patterns are reported and skipped; the rest still run
    let (patterns, rejected) = parse_patterns(&config.pairs);

    // Subtrees that could not be enumerated; reported but not fatal
    let unreadable = RefCell::new(Vec::new());

    if config.dry_run {
        print_dry_run(&config, &patterns, &unreadable);
        print_unreadable(&unreadable.borrow());
        return Ok(exit_code(rejected.is_empty()));
    }

    let outcome = run_conversion(&args, &config, &patterns, &unreadable)?;
    let unreadable = unreadable.into_inner();

    print_unreadable(&unreadable);
    print_errors(&outcome.failures);

    if let Some(ref log_path) = args.log {
        write_error_log(log_path, &outcome.failures, &rejected, &unreadable)?;
    }
    if let Some(ref report_path) = args.report {
        let report = Report {
            config: &config,
            rejected_patterns: &rejected,
            unreadable_paths: &unreadable,
            outcome: &outcome,
        };
        write_report(report_path, &report)?;
    }

    if !args.quiet {
        outcome.print_summary();
    }

    Ok(exit_code(outcome.is_success() && rejected.is_empty()))
}

/// Logging: `RUST_LOG` wins, otherwise the verbosity flags decide
fn init_tracing(args: &Args) {
    let default_level = if args.verbose {
        "debug"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("dds2png={default_level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Print the header
fn print_header(config: &Config) {
    println!("\n{}", "═".repeat(50).bright_blue());
    println!(
        "{}",
        format!(" 🖼️  DDS TO PNG BATCH CONVERTER v{}", env!("CARGO_PKG_VERSION"))
            .bright_white()
            .bold()
    );
    println!("{}", " Licensed under The MIT License.".dimmed());
    println!("{}", "═".repeat(50).bright_blue());

    for pair in &config.pairs {
        let destination = pair
            .destination
            .as_ref()
            .map(|d| d.display().to_string())
            .unwrap_or_else(|| "(in place)".to_string());
        println!(
            "  {} {} {} {}",
            "📂".bright_cyan(),
            pair.pattern,
            "→".bright_white(),
            destination.bright_green()
        );
    }
    println!("  {} Jobs: {}", "⚙️".bright_yellow(), config.concurrency);

    if config.skip_existing {
        println!("  {} {}", "⏭️".bright_yellow(), "Skipping existing outputs".yellow());
    }
    if config.dry_run {
        println!("  {} {}", "⚠️".bright_yellow(), "Dry run (nothing is converted)".yellow());
    }

    println!("{}", "═".repeat(50).bright_blue());
}

/// Parse every pattern, reporting the ones that are rejected
fn parse_patterns(
    pairs: &[PatternPair],
) -> (Vec<(PathPattern, Option<PathBuf>)>, Vec<String>) {
    let mut patterns = Vec::new();
    let mut rejected = Vec::new();

    for pair in pairs {
        match PathPattern::parse(&pair.pattern) {
            Ok(pattern) => patterns.push((pattern, pair.destination.clone())),
            Err(e) => {
                eprintln!("{} {}", "✗".red(), e.to_string().red());
                rejected.push(format!("{}: {}", pair.pattern, e));
            }
        }
    }

    (patterns, rejected)
}

/// Lazily yield the jobs of every pattern in order; enumeration problems are
/// collected into `unreadable` and skipped
fn discover_jobs<'a>(
    patterns: &'a [(PathPattern, Option<PathBuf>)],
    skip_existing: bool,
    unreadable: &'a RefCell<Vec<String>>,
) -> impl Iterator<Item = Job> + 'a {
    let matcher = PathMatcher::new();
    let mapper = OutputMapper::default();

    patterns.iter().flat_map(move |(pattern, destination)| {
        debug!("resolving {}", pattern);
        let mapper = mapper.clone();
        matcher.resolve(pattern).filter_map(move |found| match found {
            Ok(found) => Some(mapper.job(found, destination.as_deref(), skip_existing)),
            Err(e) => {
                warn!("{}", e);
                unreadable.borrow_mut().push(e.to_string());
                None
            }
        })
    })
}

/// Dry run listing
fn print_dry_run(
    config: &Config,
    patterns: &[(PathPattern, Option<PathBuf>)],
    unreadable: &RefCell<Vec<String>>,
) {
    println!("\n{}", "📋 Planned conversions:".bright_cyan());
    let mut count = 0;
    for job in discover_jobs(patterns, config.skip_existing, unreadable) {
        count += 1;
        println!(
            "  {}. {} {} {}",
            count,
            job.input.display(),
            "→".bright_white(),
            job.output.display()
        );
    }
    println!(
        "\n{} {} file(s) would be converted.",
        "ℹ️".bright_blue(),
        count.to_string().bright_green()
    );
}

/// Conversion mode
fn run_conversion(
    args: &Args,
    config: &Config,
    patterns: &[(PathPattern, Option<PathBuf>)],
    unreadable: &RefCell<Vec<String>>,
) -> Result<RunOutcome> {
    let scheduler = JobScheduler::new(config.concurrency).context("failed to start worker pool")?;
    debug!("running up to {} conversions at once", scheduler.limit());
    let worker = ConversionWorker::new(PngCodec);

    let pb = create_progress_bar(args.quiet);
    if !args.quiet {
        println!("\n{}", "⚡ Converting...".bright_cyan());
    }

    let jobs = discover_jobs(patterns, config.skip_existing, unreadable)
        .inspect(|_| pb.inc_length(1));
    let outcome = scheduler.run_all(jobs, &worker, |job, result| {
        report_job(&pb, args.verbose, job, result);
        pb.inc(1);
    });

    pb.finish_with_message("done!");
    Ok(outcome)
}

/// Per-job console line. Goes through the progress bar so lines from
/// concurrent jobs never interleave.
fn report_job(pb: &ProgressBar, verbose: bool, job: &Job, result: &JobResult) {
    match result {
        Ok(ConvertStatus::Converted { .. }) if verbose => pb.println(format!(
            "  {} {} -> {}",
            "✓".green(),
            job.input.display(),
            job.output.display()
        )),
        Ok(ConvertStatus::Skipped) if verbose => pb.println(format!(
            "  {} {} {}",
            "↷".yellow(),
            job.output.display(),
            "skipped".yellow()
        )),
        Ok(_) => {}
        Err(e) => pb.println(format!("  {} {}", "✗".red(), e.to_string().red())),
    }
}

/// Create the progress bar; its length grows as jobs are discovered
fn create_progress_bar(hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓▒░");
    pb.set_style(style);
    pb
}

/// Print the directories that could not be enumerated
fn print_unreadable(unreadable: &[String]) {
    if unreadable.is_empty() {
        return;
    }

    eprintln!("\n{}", "⚠️  Skipped unreadable paths:".bright_yellow());
    for reason in unreadable {
        eprintln!("  {} {}", "•".yellow(), reason.dimmed());
    }
}

/// Print the failed files
fn print_errors(failures: &[JobFailure]) {
    if failures.is_empty() {
        return;
    }

    eprintln!("\n{}", "❌ Failed files:".bright_red());
    for failure in failures {
        eprintln!("  {} {}", "•".red(), failure.input.display());
        eprintln!("    {}", failure.reason.dimmed());
    }
}

/// Write the error log file
fn write_error_log(
    log_path: &Path,
    failures: &[JobFailure],
    rejected: &[String],
    unreadable: &[String],
) -> Result<()> {
    let mut log_file = BufWriter::new(
        File::create(log_path).with_context(|| format!("cannot create {}", log_path.display()))?,
    );

    writeln!(log_file, "dds2png error log")?;
    writeln!(log_file, "Created: {}", unix_now())?;
    writeln!(log_file, "Rejected patterns: {}", rejected.len())?;
    writeln!(log_file, "Unreadable paths: {}", unreadable.len())?;
    writeln!(log_file, "Failed files: {}", failures.len())?;
    writeln!(log_file, "{}", "=".repeat(50))?;

    for pattern in rejected {
        writeln!(log_file, "\nPattern: {}", pattern)?;
    }
    for reason in unreadable {
        writeln!(log_file, "\nUnreadable: {}", reason)?;
    }
    for failure in failures {
        writeln!(log_file, "\nInput: {}", failure.input.display())?;
        writeln!(log_file, "Output: {}", failure.output.display())?;
        writeln!(log_file, "Error: {}", failure.reason)?;
    }
    log_file.flush()?;

    println!("\n{} Error log written: {}", "📝".bright_cyan(), log_path.display());
    Ok(())
}

/// Contents of the `--report` file
#[derive(Serialize)]
struct Report<'a> {
    config: &'a Config,
    rejected_patterns: &'a [String],
    unreadable_paths: &'a [String],
    outcome: &'a RunOutcome,
}

/// Write the JSON report
fn write_report(path: &Path, report: &Report<'_>) -> Result<()> {
    let file = File::create(path).with_context(|| format!("cannot create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, report)?;
    writer.flush()?;
    Ok(())
}

/// Current time as a unix timestamp string
fn unix_now() -> String {
    use std::time::SystemTime;
    let duration = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default();
    format!("Unix timestamp: {}", duration.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn pair(pattern: String, destination: Option<PathBuf>) -> PatternPair {
        PatternPair {
            pattern,
            destination,
        }
    }

    #[test]
    fn test_parse_patterns_keeps_valid_ones() {
        let pairs = vec![
            pair("a/**/b/**/*.dds".to_string(), None),
            pair("a/**/*.dds".to_string(), Some(PathBuf::from("out"))),
            pair(String::new(), None),
        ];

        let (patterns, rejected) = parse_patterns(&pairs);

        assert_eq!(patterns.len(), 1);
        assert_eq!(rejected.len(), 2);
        assert_eq!(patterns[0].1, Some(PathBuf::from("out")));
    }

    #[test]
    fn test_discover_jobs_chains_patterns() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("a/sub")).unwrap();
        fs::write(temp_dir.path().join("a/x.dds"), b"x").unwrap();
        fs::write(temp_dir.path().join("a/sub/y.dds"), b"y").unwrap();
        fs::write(temp_dir.path().join("z.dds"), b"z").unwrap();

        let root = temp_dir.path().display();
        let out = temp_dir.path().join("out");
        let (patterns, rejected) = parse_patterns(&[
            pair(format!("{root}/a/**/*.dds"), Some(out.clone())),
            pair(format!("{root}/*.dds"), None),
        ]);
        assert!(rejected.is_empty());

        let unreadable = RefCell::new(Vec::new());
        let jobs: Vec<Job> = discover_jobs(&patterns, true, &unreadable).collect();

        assert_eq!(jobs.len(), 3);
        assert_eq!(jobs[0].output, out.join("sub/y.png"));
        assert_eq!(jobs[1].output, out.join("x.png"));
        assert_eq!(jobs[2].output, temp_dir.path().join("z.png"));
        assert!(jobs.iter().all(|j| j.skip_existing));
        assert!(unreadable.into_inner().is_empty());
    }

    #[test]
    fn test_write_error_log() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("errors.log");
        let failures = vec![JobFailure {
            input: PathBuf::from("in/broken.dds"),
            output: PathBuf::from("out/broken.png"),
            reason: "corrupt image data".to_string(),
        }];

        write_error_log(
            &log_path,
            &failures,
            &["x: empty input pattern".to_string()],
            &["cannot read directory locked".to_string()],
        )
        .unwrap();

        let content = fs::read_to_string(&log_path).unwrap();
        assert!(content.contains("Failed files: 1"));
        assert!(content.contains("in/broken.dds"));
        assert!(content.contains("corrupt image data"));
        assert!(content.contains("x: empty input pattern"));
        assert!(content.contains("Unreadable: cannot read directory locked"));
    }
}
