//! Run statistics and formatting helpers.
//!
//! Counters are updated concurrently by finished jobs and frozen into a
//! [`RunOutcome`] once the scheduler returns.

use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Live counters shared by all jobs of one run
#[derive(Debug)]
pub struct Statistics {
    /// Jobs admitted so far
    pub submitted: AtomicUsize,
    /// Jobs that wrote a new output
    pub converted: AtomicUsize,
    /// Jobs left alone because their output already existed
    pub skipped: AtomicUsize,
    /// Jobs that ended in an error
    pub failed: AtomicUsize,
    /// Input bytes of converted jobs
    pub total_bytes_read: AtomicU64,
    /// Output bytes of converted jobs
    pub total_bytes_written: AtomicU64,
    /// When the run started
    start_time: Instant,
}

impl Default for Statistics {
    fn default() -> Self {
        Self::new()
    }
}

impl Statistics {
    /// Zeroed counters, clock started now
    pub fn new() -> Self {
        Self {
            submitted: AtomicUsize::new(0),
            converted: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            total_bytes_read: AtomicU64::new(0),
            total_bytes_written: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Count an admitted job
    pub fn increment_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful conversion
    pub fn record_converted(&self, bytes_read: u64, bytes_written: u64) {
        self.converted.fetch_add(1, Ordering::Relaxed);
        self.total_bytes_read.fetch_add(bytes_read, Ordering::Relaxed);
        self.total_bytes_written
            .fetch_add(bytes_written, Ordering::Relaxed);
    }

    /// Count a skipped job
    pub fn increment_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a failed job
    pub fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Jobs admitted so far
    pub fn get_submitted(&self) -> usize {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Time since the run started
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Freeze the counters
    pub fn finish(&self, failures: Vec<JobFailure>) -> RunOutcome {
        RunOutcome {
            total: self.get_submitted(),
            converted: self.converted.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            bytes_read: self.total_bytes_read.load(Ordering::Relaxed),
            bytes_written: self.total_bytes_written.load(Ordering::Relaxed),
            elapsed_secs: self.elapsed().as_secs_f64(),
            failures,
        }
    }
}

/// One failed job
#[derive(Debug, Clone, Serialize)]
pub struct JobFailure {
    /// Input file of the job
    pub input: PathBuf,
    /// Output the job was meant to write
    pub output: PathBuf,
    /// Error message
    pub reason: String,
}

/// Aggregate result of a run
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    /// Jobs submitted
    pub total: usize,
    /// Jobs that wrote an output
    pub converted: usize,
    /// Jobs whose output already existed
    pub skipped: usize,
    /// Jobs that failed
    pub failed: usize,
    /// Total input bytes converted
    pub bytes_read: u64,
    /// Total PNG bytes written
    pub bytes_written: u64,
    /// Wall-clock run time in seconds
    pub elapsed_secs: f64,
    /// One entry per failed job
    pub failures: Vec<JobFailure>,
}

impl RunOutcome {
    /// No job failed
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Print the run summary
    pub fn print_summary(&self) {
        println!("\n{}", "═".repeat(50).bright_blue());
        println!("{}", " 📊 Conversion summary".bright_white().bold());
        println!("{}", "═".repeat(50).bright_blue());

        println!("  {} Files:        {}", "📁".bright_cyan(), self.total);
        println!(
            "  {} Converted:    {}",
            "✅".bright_green(),
            self.converted.to_string().green()
        );
        println!(
            "  {} Skipped:      {}",
            "⏭️".bright_yellow(),
            self.skipped.to_string().yellow()
        );

        if self.failed > 0 {
            println!(
                "  {} Failed:       {}",
                "❌".bright_red(),
                self.failed.to_string().red()
            );
        } else {
            println!("  {} Failed:       {}", "✅".bright_green(), "0".green());
        }

        println!(
            "  {} Read:         {}",
            "📥".bright_yellow(),
            format_bytes(self.bytes_read)
        );
        println!(
            "  {} Written:      {}",
            "📤".bright_magenta(),
            format_bytes(self.bytes_written)
        );
        println!(
            "  {} Elapsed:      {}",
            "⏱️".bright_cyan(),
            format_duration(Duration::from_secs_f64(self.elapsed_secs))
        );

        println!("{}", "═".repeat(50).bright_blue());
    }
}

/// Human-readable byte count
///
/// # Examples
/// ```
/// use dds2png::stats::format_bytes;
///
/// assert_eq!(format_bytes(500), "500 B");
/// assert_eq!(format_bytes(1024), "1.00 KB");
/// assert_eq!(format_bytes(1048576), "1.00 MB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Human-readable duration
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if secs >= 3600 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{}.{:03}s", secs, millis)
    } else {
        format!("{}ms", millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1073741824), "1.00 GB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::from_secs(5)), "5.000s");
        assert_eq!(format_duration(Duration::from_secs(65)), "1m 5s");
        assert_eq!(format_duration(Duration::from_secs(3665)), "1h 1m");
    }

    #[test]
    fn test_statistics_finish() {
        let stats = Statistics::new();
        for _ in 0..4 {
            stats.increment_submitted();
        }
        stats.record_converted(1024, 256);
        stats.record_converted(1024, 256);
        stats.increment_skipped();
        stats.increment_failed();

        assert_eq!(stats.get_submitted(), 4);

        let outcome = stats.finish(vec![JobFailure {
            input: PathBuf::from("a.dds"),
            output: PathBuf::from("a.png"),
            reason: "corrupt".to_string(),
        }]);
        assert_eq!(outcome.total, 4);
        assert_eq!(outcome.converted, 2);
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.bytes_read, 2048);
        assert_eq!(outcome.bytes_written, 512);
        assert!(!outcome.is_success());
    }

    #[test]
    fn test_outcome_serializes() {
        let outcome = Statistics::new().finish(Vec::new());
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["failed"], 0);
        assert!(json["failures"].as_array().unwrap().is_empty());
    }
}
