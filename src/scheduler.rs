//! Bounded-concurrency job execution.
//!
//! [`JobScheduler::run_all`] pulls jobs from an iterator on the calling
//! thread, admits each through an [`AdmissionGate`], and dispatches it to a
//! dedicated rayon pool. With a limit of one, jobs run inline in submission
//! order. Every job's result, including a panic, is captured at the job
//! boundary and folded into the returned [`RunOutcome`].

use crossbeam_channel::{Receiver, Sender};
use std::any::Any;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

use crate::error::{ConvertError, Dds2PngError, Result};
use crate::processor::{ConvertStatus, Job, JobResult, JobRunner};
use crate::stats::{JobFailure, RunOutcome, Statistics};

/// Token pool bounding the number of executing jobs.
///
/// A bounded channel holds one token per free slot. Acquiring takes a token,
/// blocking while the pool is empty; dropping the [`Permit`] puts it back.
#[derive(Debug)]
pub struct AdmissionGate {
    limit: usize,
    give: Sender<()>,
    take: Receiver<()>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl AdmissionGate {
    pub fn new(limit: NonZeroUsize) -> Self {
        let limit = limit.get();
        let (give, take) = crossbeam_channel::bounded(limit);
        for _ in 0..limit {
            // Capacity equals the token count, so this never blocks
            let _ = give.send(());
        }

        Self {
            limit,
            give,
            take,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Block until a slot is free, then take it. The slot is released when
    /// the returned permit is dropped.
    pub fn acquire(&self) -> Permit<'_> {
        // Both channel ends live in the gate, so recv only fails once it is gone
        let _ = self.take.recv();
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        Permit { gate: self }
    }

    fn release(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let _ = self.give.send(());
    }

    /// Concurrency budget
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Jobs admitted but not yet finished
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest in-flight count observed
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// One admitted slot; returns its token on drop
#[derive(Debug)]
pub struct Permit<'a> {
    gate: &'a AdmissionGate,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.gate.release();
    }
}

/// Runs jobs under a shared concurrency budget
pub struct JobScheduler {
    gate: AdmissionGate,
    pool: Option<rayon::ThreadPool>,
}

impl JobScheduler {
    /// Create a scheduler allowing `limit` jobs to execute at once
    ///
    /// # Arguments
    /// * `limit` - concurrency budget; 1 runs everything on the caller thread
    ///
    /// # Returns
    /// The scheduler, or an error for a zero limit or a pool that cannot start
    pub fn new(limit: usize) -> Result<Self> {
        let limit = NonZeroUsize::new(limit).ok_or_else(|| Dds2PngError::InvalidConfig {
            reason: "concurrency limit must be at least 1".to_string(),
        })?;

        let pool = if limit.get() > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(limit.get())
                .thread_name(|i| format!("dds2png-worker-{i}"))
                .build()
                .map_err(|e| Dds2PngError::ThreadPoolError {
                    reason: e.to_string(),
                })?;
            Some(pool)
        } else {
            None
        };

        Ok(Self {
            gate: AdmissionGate::new(limit),
            pool,
        })
    }

    pub fn limit(&self) -> usize {
        self.gate.limit()
    }

    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    /// Run every job and block until all of them have finished
    ///
    /// # Arguments
    /// * `jobs` - consumed lazily; the iterator runs on the calling thread
    /// * `runner` - work performed for each job
    /// * `observer` - called once per finished job, possibly from a worker thread
    ///
    /// # Returns
    /// Tallies and failures of the run. Job failures never abort the run.
    pub fn run_all<I, R, O>(&self, jobs: I, runner: &R, observer: O) -> RunOutcome
    where
        I: IntoIterator<Item = Job>,
        R: JobRunner + ?Sized,
        O: Fn(&Job, &JobResult) + Sync,
    {
        let stats = Statistics::new();
        let failures: Mutex<Vec<JobFailure>> = Mutex::new(Vec::new());
        let finish = |job: Job| {
            let result = execute(runner, &job);
            record(&stats, &failures, &job, &result);
            observer(&job, &result);
        };

        match &self.pool {
            None => {
                for job in jobs {
                    let _permit = self.gate.acquire();
                    stats.increment_submitted();
                    finish(job);
                }
            }
            Some(pool) => {
                let finish = &finish;
                pool.in_place_scope(|scope| {
                    for job in jobs {
                        let permit = self.gate.acquire();
                        stats.increment_submitted();
                        debug!("dispatching {}", job.input.display());
                        scope.spawn(move |_| {
                            let _permit = permit;
                            finish(job);
                        });
                    }
                });
            }
        }

        let failures = failures.into_inner().unwrap_or_else(PoisonError::into_inner);
        stats.finish(failures)
    }
}

/// Run one job, turning a panic into a failure
fn execute<R: JobRunner + ?Sized>(runner: &R, job: &Job) -> JobResult {
    panic::catch_unwind(AssertUnwindSafe(|| runner.run(job))).unwrap_or_else(|payload| {
        Err(ConvertError::Panicked {
            file: job.input.clone(),
            reason: panic_message(payload.as_ref()),
        })
    })
}

fn record(stats: &Statistics, failures: &Mutex<Vec<JobFailure>>, job: &Job, result: &JobResult) {
    match result {
        Ok(ConvertStatus::Converted {
            bytes_read,
            bytes_written,
        }) => stats.record_converted(*bytes_read, *bytes_written),
        Ok(ConvertStatus::Skipped) => stats.increment_skipped(),
        Err(e) => {
            stats.increment_failed();
            failures
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(JobFailure {
                    input: job.input.clone(),
                    output: job.output.clone(),
                    reason: e.to_string(),
                });
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn jobs(count: usize) -> Vec<Job> {
        (0..count)
            .map(|i| {
                Job::new(
                    PathBuf::from(format!("in/{i}.dds")),
                    PathBuf::from(format!("out/{i}.png")),
                    false,
                )
            })
            .collect()
    }

    fn index_of(job: &Job) -> usize {
        job.input
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.parse().ok())
            .unwrap()
    }

    /// Counts jobs executing at the same time
    #[derive(Default)]
    struct Probe {
        current: AtomicUsize,
        max: AtomicUsize,
    }

    impl JobRunner for Probe {
        fn run(&self, _job: &Job) -> JobResult {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.max.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(5));
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(ConvertStatus::Converted {
                bytes_read: 1,
                bytes_written: 1,
            })
        }
    }

    #[test]
    fn test_zero_limit_rejected() {
        assert!(matches!(
            JobScheduler::new(0),
            Err(Dds2PngError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_concurrency_never_exceeds_limit() {
        for limit in [1, 2, 3, 8] {
            let scheduler = JobScheduler::new(limit).unwrap();
            let probe = Probe::default();

            let outcome = scheduler.run_all(jobs(24), &probe, |_, _| {});

            assert_eq!(outcome.converted, 24);
            assert!(probe.max.load(Ordering::SeqCst) <= limit);
            assert!(scheduler.gate().peak() <= limit);
            assert_eq!(scheduler.gate().in_flight(), 0);
        }
    }

    #[test]
    fn test_parallel_limit_is_used() {
        let scheduler = JobScheduler::new(4).unwrap();
        let probe = Probe::default();

        scheduler.run_all(jobs(32), &probe, |_, _| {});

        assert!(probe.max.load(Ordering::SeqCst) > 1);
    }

    #[test]
    fn test_sequential_completion_order() {
        let scheduler = JobScheduler::new(1).unwrap();
        let order = Mutex::new(Vec::new());
        let caller = thread::current().id();
        let runner = |_: &Job| -> JobResult {
            assert_eq!(thread::current().id(), caller);
            Ok(ConvertStatus::Skipped)
        };

        let outcome = scheduler.run_all(jobs(10), &runner, |job, _| {
            order.lock().unwrap().push(index_of(job));
        });

        assert_eq!(outcome.skipped, 10);
        assert_eq!(order.into_inner().unwrap(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_failure_isolation() {
        for limit in [1, 4] {
            let scheduler = JobScheduler::new(limit).unwrap();
            let runner = |job: &Job| -> JobResult {
                if index_of(job) == 3 {
                    Err(ConvertError::Decode {
                        file: job.input.clone(),
                        source: crate::error::DecodeError::CorruptData {
                            reason: "bad header".to_string(),
                        },
                    })
                } else {
                    Ok(ConvertStatus::Converted {
                        bytes_read: 10,
                        bytes_written: 5,
                    })
                }
            };

            let outcome = scheduler.run_all(jobs(8), &runner, |_, _| {});

            assert_eq!(outcome.total, 8);
            assert_eq!(outcome.converted, 7);
            assert_eq!(outcome.failed, 1);
            assert_eq!(outcome.failures[0].input, PathBuf::from("in/3.dds"));
            assert!(outcome.failures[0].reason.contains("bad header"));
            assert_eq!(scheduler.gate().in_flight(), 0);
        }
    }

    #[test]
    fn test_panic_is_contained() {
        let scheduler = JobScheduler::new(3).unwrap();
        let runner = |job: &Job| -> JobResult {
            if index_of(job) % 2 == 0 {
                panic!("decoder exploded");
            }
            Ok(ConvertStatus::Skipped)
        };

        let outcome = scheduler.run_all(jobs(6), &runner, |_, _| {});

        assert_eq!(outcome.skipped, 3);
        assert_eq!(outcome.failed, 3);
        assert!(outcome
            .failures
            .iter()
            .all(|f| f.reason.contains("decoder exploded")));
        assert_eq!(scheduler.gate().in_flight(), 0);
    }

    #[test]
    fn test_observer_sees_every_job() {
        let scheduler = JobScheduler::new(4).unwrap();
        let seen = AtomicUsize::new(0);
        let runner = |_: &Job| -> JobResult { Ok(ConvertStatus::Skipped) };

        let outcome = scheduler.run_all(jobs(50), &runner, |_, result| {
            assert!(result.is_ok());
            seen.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(seen.load(Ordering::SeqCst), 50);
        assert_eq!(outcome.total, 50);
    }

    #[test]
    fn test_empty_job_list() {
        let scheduler = JobScheduler::new(2).unwrap();
        let probe = Probe::default();
        let outcome = scheduler.run_all(Vec::new(), &probe, |_, _| {});
        assert_eq!(outcome.total, 0);
        assert!(outcome.is_success());
    }

    #[test]
    fn test_gate_blocks_until_release() {
        let gate = Arc::new(AdmissionGate::new(NonZeroUsize::new(2).unwrap()));
        let first = gate.acquire();
        let _second = gate.acquire();
        assert_eq!(gate.in_flight(), 2);

        let waiter = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || {
                let _third = gate.acquire();
                gate.in_flight()
            })
        };

        thread::sleep(Duration::from_millis(20));
        assert!(!waiter.is_finished());

        drop(first);
        assert_eq!(waiter.join().unwrap(), 2);
        assert_eq!(gate.peak(), 2);
    }

    #[test]
    fn test_gate_tokens_recycled() {
        let gate = AdmissionGate::new(NonZeroUsize::new(1).unwrap());
        for _ in 0..100 {
            let permit = gate.acquire();
            assert_eq!(gate.in_flight(), 1);
            drop(permit);
        }
        assert_eq!(gate.in_flight(), 0);
        assert_eq!(gate.peak(), 1);
        assert_eq!(gate.limit(), 1);
    }
}
