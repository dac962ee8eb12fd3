//! Worker Pool (§4.5): a bounded-concurrency executor for download jobs.
//!
//! Grounded on the original's `wr_thread_queue.py::Queue` for its contract
//! (pause/resume with a timeout, an inactivity guard, rolling average and ETA
//! accounting) and, per the Design Notes, rebuilt around "N long-lived
//! consumer tasks reading from a bounded channel plus a small supervisor
//! task" rather than a hand-rolled queue or a work-stealing pool. The queue
//! itself is `crossbeam-channel`, in the idiom `commands::restore::restore_contents`
//! uses for its download fan-out. The pool takes its queues as explicit
//! constructor parameters; there are no module-level globals (Design Notes:
//! "Global singleton queues").

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

/// Tuning knobs for a [`WorkerPool`] (§4.5, §5).
#[derive(Debug, Clone, Copy)]
pub struct WorkerPoolConfig {
    /// Maximum number of jobs executing concurrently.
    pub max_parallel: usize,
    /// How long both queues may sit empty before `run` exits cleanly.
    pub idle_timeout: Duration,
    /// How long `pause()` may hold the pool before it self-stops.
    pub pause_timeout: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            max_parallel: 10,
            idle_timeout: Duration::from_secs(60),
            pause_timeout: Duration::from_secs(3600),
        }
    }
}

/// One job's completion record, handed to whoever drains `completed()`.
///
/// The Reaper (`crate::reaper`) is the expected consumer.
#[derive(Debug)]
pub struct CompletedJob<T> {
    pub job: T,
    pub started_at: Instant,
    pub finished_at: Instant,
    pub elapsed: Duration,
    /// `Err` if the worker function returned an error or panicked; per §4.5
    /// the job is still considered *complete* either way, it is up to the
    /// Reaper to decide success vs failure from the downloaded artifact.
    pub worker_result: Result<(), String>,
}

#[derive(Debug, Default)]
struct TimingStats {
    completed: u64,
    total_elapsed: Duration,
}

impl TimingStats {
    fn record(&mut self, elapsed: Duration) {
        self.completed += 1;
        self.total_elapsed += elapsed;
    }

    fn average(&self) -> Option<Duration> {
        if self.completed == 0 {
            None
        } else {
            Some(self.total_elapsed / u32::try_from(self.completed).unwrap_or(u32::MAX))
        }
    }
}

/// A point-in-time read of the pool's rolling timing accounting.
#[derive(Debug, Clone, Copy)]
pub struct TimingSnapshot {
    pub completed: u64,
    pub average_job_time: Option<Duration>,
    pub estimated_time_remaining: Option<Duration>,
}

/// A bounded-concurrency executor for jobs of type `T` (§4.5).
pub struct WorkerPool<T: Send + 'static> {
    config: WorkerPoolConfig,
    job_tx: Sender<T>,
    job_rx: Receiver<T>,
    completed_tx: Sender<CompletedJob<T>>,
    completed_rx: Receiver<CompletedJob<T>>,
    paused: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
    active_count: Arc<AtomicUsize>,
    submitted_count: Arc<AtomicUsize>,
    timing: Arc<Mutex<TimingStats>>,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Builds a new, unstarted pool. `submit` may be called before or after `run`.
    #[must_use]
    pub fn new(config: WorkerPoolConfig) -> Self {
        let (job_tx, job_rx) = crossbeam_channel::unbounded();
        let (completed_tx, completed_rx) = crossbeam_channel::unbounded();
        Self {
            config,
            job_tx,
            job_rx,
            completed_tx,
            completed_rx,
            paused: Arc::new(AtomicBool::new(false)),
            stopped: Arc::new(AtomicBool::new(false)),
            active_count: Arc::new(AtomicUsize::new(0)),
            submitted_count: Arc::new(AtomicUsize::new(0)),
            timing: Arc::new(Mutex::new(TimingStats::default())),
        }
    }

    /// Appends a job to the waiting queue.
    pub fn submit(&self, job: T) {
        self.submitted_count.fetch_add(1, Ordering::SeqCst);
        // The receiver is held by this same pool for as long as it exists,
        // so the channel is never disconnected while `self` is alive.
        let _ = self.job_tx.send(job);
    }

    /// Number of jobs submitted so far (waiting, active, or completed).
    #[must_use]
    pub fn submitted(&self) -> usize {
        self.submitted_count.load(Ordering::SeqCst)
    }

    /// Number of jobs currently executing.
    #[must_use]
    pub fn active(&self) -> usize {
        self.active_count.load(Ordering::SeqCst)
    }

    /// Toggles the pause flag. Workers check it between job starts; while
    /// paused, no new job is pulled off the waiting queue. If the pool stays
    /// paused past `pause_timeout`, the pool self-stops (§4.5, §7).
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    /// Clears the pause flag.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Forbids new job starts and causes `run` to drain active work and exit.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// A cloneable handle to the stream of completed jobs, for the Reaper.
    #[must_use]
    pub fn completed(&self) -> Receiver<CompletedJob<T>> {
        self.completed_rx.clone()
    }

    /// A snapshot of the rolling average job time and a naive ETA, computed
    /// from the average times the number of jobs still waiting or active.
    #[must_use]
    pub fn timing_snapshot(&self) -> TimingSnapshot {
        let timing = self.timing.lock().unwrap();
        let remaining = self.job_rx.len() + self.active();
        let average_job_time = timing.average();
        let estimated_time_remaining = average_job_time.map(|avg| avg * u32::try_from(remaining).unwrap_or(u32::MAX));
        TimingSnapshot {
            completed: timing.completed,
            average_job_time,
            estimated_time_remaining,
        }
    }

    /// Runs the pool to completion: spawns `max_parallel` worker threads
    /// consuming `worker`, supervises pause timeout and the idle guard, and
    /// blocks until the pool stops.
    ///
    /// `worker` should catch its own panics if it wants them reflected as
    /// `Err` in [`CompletedJob::worker_result`]; an actual unwind here is
    /// converted to an `Err` via `std::panic::catch_unwind`.
    pub fn run<F>(&self, worker: F)
    where
        F: Fn(&T) -> Result<(), String> + Send + Sync + 'static,
        T: std::panic::RefUnwindSafe,
    {
        let worker = Arc::new(worker);
        let mut handles: Vec<JoinHandle<()>> = Vec::with_capacity(self.config.max_parallel);

        for _ in 0..self.config.max_parallel {
            let job_rx = self.job_rx.clone();
            let completed_tx = self.completed_tx.clone();
            let paused = Arc::clone(&self.paused);
            let stopped = Arc::clone(&self.stopped);
            let active_count = Arc::clone(&self.active_count);
            let timing = Arc::clone(&self.timing);
            let worker = Arc::clone(&worker);

            handles.push(std::thread::spawn(move || {
                loop {
                    if stopped.load(Ordering::SeqCst) {
                        break;
                    }
                    if paused.load(Ordering::SeqCst) {
                        std::thread::sleep(Duration::from_millis(100));
                        continue;
                    }
                    match job_rx.recv_timeout(Duration::from_millis(200)) {
                        Ok(job) => {
                            active_count.fetch_add(1, Ordering::SeqCst);
                            let started_at = Instant::now();
                            let worker_result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| worker(&job)))
                                .unwrap_or_else(|_| Err("worker panicked".to_string()));
                            let finished_at = Instant::now();
                            let elapsed = finished_at.duration_since(started_at);
                            timing.lock().unwrap().record(elapsed);
                            active_count.fetch_sub(1, Ordering::SeqCst);
                            let _ = completed_tx.send(CompletedJob {
                                job,
                                started_at,
                                finished_at,
                                elapsed,
                                worker_result,
                            });
                        }
                        Err(RecvTimeoutError::Timeout) => continue,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            }));
        }

        self.supervise();

        self.stop();
        for handle in handles {
            let _ = handle.join();
        }
    }

    /// Supervises pause-timeout and idle-timeout while workers run.
    fn supervise(&self) {
        let mut paused_since: Option<Instant> = None;
        let mut idle_since: Option<Instant> = None;

        loop {
            if self.stopped.load(Ordering::SeqCst) {
                return;
            }

            if self.is_paused() {
                let since = *paused_since.get_or_insert_with(Instant::now);
                if since.elapsed() >= self.config.pause_timeout {
                    log::warn!("worker pool pause timeout exceeded; self-stopping");
                    return;
                }
            } else {
                paused_since = None;
            }

            let queue_empty = self.job_rx.is_empty();
            let nothing_active = self.active() == 0;
            if queue_empty && nothing_active && !self.is_paused() {
                let since = *idle_since.get_or_insert_with(Instant::now);
                if since.elapsed() >= self.config.idle_timeout {
                    log::info!("worker pool idle for {:?}; stopping", self.config.idle_timeout);
                    return;
                }
            } else {
                idle_since = None;
            }

            std::thread::sleep(Duration::from_millis(100));
        }
    }
}
