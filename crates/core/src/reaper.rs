//! Progress Reaper (§4.7): watches completed download jobs and turns them
//! into manifest updates and audit log lines.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};

use crate::manifest::DownloadState;
use crate::pool::CompletedJob;

/// A fully-resolved download job, as enqueued by the orchestrator after the
/// Blob Downloader's target path (including any GUID rewrite) has been
/// computed.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub archive_key: String,
    pub expected_size_bytes: u64,
    pub container: String,
    pub download_root: String,
    /// The on-disk path the Blob Downloader wrote (or attempted to write) to.
    pub target_path: PathBuf,
}

/// A manifest mutation the Reaper wants applied, handed to the manifest
/// writer's single-consumer queue (§4.3, §5).
#[derive(Debug, Clone)]
pub struct ManifestUpdate {
    pub peer_id: String,
    pub file_name: String,
    pub state: DownloadState,
    pub downloaded_mb: f64,
}

/// The default sweep interval (§4.7: "Periodically (every 10 s)").
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(10);

/// Watches a [`crate::pool::WorkerPool`]'s completed-job stream, updates the
/// manifest, and writes audit log lines. A single task; the manifest and log
/// queues it writes to are themselves single-consumer (§4.7).
pub struct ProgressReaper {
    peer_id: String,
    completed_rx: Receiver<CompletedJob<DownloadJob>>,
    manifest_tx: Sender<ManifestUpdate>,
    log_tx: Sender<String>,
    scanned: u64,
}

impl ProgressReaper {
    #[must_use]
    pub fn new(
        peer_id: impl Into<String>,
        completed_rx: Receiver<CompletedJob<DownloadJob>>,
        manifest_tx: Sender<ManifestUpdate>,
        log_tx: Sender<String>,
    ) -> Self {
        Self {
            peer_id: peer_id.into(),
            completed_rx,
            manifest_tx,
            log_tx,
            scanned: 0,
        }
    }

    /// Number of completed jobs processed so far.
    #[must_use]
    pub fn scanned(&self) -> u64 {
        self.scanned
    }

    /// Drains every completed job currently available and processes it.
    /// Returns the number of jobs processed in this sweep.
    pub fn sweep(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(completed) = self.completed_rx.try_recv() {
            self.process_one(completed);
            processed += 1;
        }
        processed
    }

    fn process_one(&mut self, completed: CompletedJob<DownloadJob>) {
        let job = &completed.job;
        let metadata = std::fs::metadata(&job.target_path);
        let (state, downloaded_mb) = match (&completed.worker_result, metadata) {
            (Err(err), _) => {
                let _ = self.log_tx.send(format!(
                    "FAILED {} ({}): worker error: {err}",
                    job.archive_key, self.peer_id
                ));
                (DownloadState::Failed, 0.0)
            }
            (Ok(()), Ok(meta)) => {
                let actual = meta.len();
                let actual_mb = actual as f64 / (1024.0 * 1024.0);
                if actual == job.expected_size_bytes {
                    let _ = self.log_tx.send(format!(
                        "SUCCESS {} ({}): {actual} bytes in {:?}",
                        job.archive_key, self.peer_id, completed.elapsed
                    ));
                    (DownloadState::Success, actual_mb)
                } else {
                    let _ = self.log_tx.send(format!(
                        "FAILED {} ({}): expected {} bytes, got {actual}",
                        job.archive_key, self.peer_id, job.expected_size_bytes
                    ));
                    (DownloadState::Failed, actual_mb)
                }
            }
            (Ok(()), Err(err)) => {
                let _ = self.log_tx.send(format!(
                    "FAILED {} ({}): could not stat target: {err}",
                    job.archive_key, self.peer_id
                ));
                (DownloadState::Failed, 0.0)
            }
        };

        let _ = self.manifest_tx.send(ManifestUpdate {
            peer_id: self.peer_id.clone(),
            file_name: job.archive_key.clone(),
            state,
            downloaded_mb,
        });
        self.scanned += 1;
    }

    /// Runs the periodic sweep loop until `stop` is set, sleeping
    /// `SWEEP_INTERVAL` between sweeps.
    pub fn run(&mut self, stop: &Arc<AtomicBool>) {
        loop {
            self.sweep();
            if stop.load(Ordering::SeqCst) {
                self.sweep();
                return;
            }
            std::thread::sleep(SWEEP_INTERVAL);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{CompletedJob, WorkerPool, WorkerPoolConfig};
    use std::time::{Duration, Instant};

    #[test]
    fn success_row_marks_manifest_success() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("foo.dat");
        std::fs::write(&target, b"12345").unwrap();

        let (completed_tx, completed_rx) = crossbeam_channel::unbounded();
        let (manifest_tx, manifest_rx) = crossbeam_channel::unbounded();
        let (log_tx, _log_rx) = crossbeam_channel::unbounded();

        completed_tx
            .send(CompletedJob {
                job: DownloadJob {
                    archive_key: "a/db_1_2_3/foo.dat".to_string(),
                    expected_size_bytes: 5,
                    container: "c1".to_string(),
                    download_root: dir.path().to_string_lossy().to_string(),
                    target_path: target.clone(),
                },
                started_at: Instant::now(),
                finished_at: Instant::now(),
                elapsed: Duration::from_millis(5),
                worker_result: Ok(()),
            })
            .unwrap();

        let mut reaper = ProgressReaper::new("P0", completed_rx, manifest_tx, log_tx);
        let processed = reaper.sweep();
        assert_eq!(processed, 1);
        let update = manifest_rx.try_recv().unwrap();
        assert_eq!(update.state, DownloadState::Success);
    }

    #[test]
    fn size_mismatch_marks_failed() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("foo.dat");
        std::fs::write(&target, b"1").unwrap();

        let (completed_tx, completed_rx) = crossbeam_channel::unbounded();
        let (manifest_tx, manifest_rx) = crossbeam_channel::unbounded();
        let (log_tx, _log_rx) = crossbeam_channel::unbounded();

        completed_tx
            .send(CompletedJob {
                job: DownloadJob {
                    archive_key: "a/db_1_2_3/foo.dat".to_string(),
                    expected_size_bytes: 5,
                    container: "c1".to_string(),
                    download_root: dir.path().to_string_lossy().to_string(),
                    target_path: target.clone(),
                },
                started_at: Instant::now(),
                finished_at: Instant::now(),
                elapsed: Duration::from_millis(5),
                worker_result: Ok(()),
            })
            .unwrap();

        let mut reaper = ProgressReaper::new("P0", completed_rx, manifest_tx, log_tx);
        reaper.sweep();
        let update = manifest_rx.try_recv().unwrap();
        assert_eq!(update.state, DownloadState::Failed);
    }

    #[test]
    fn worker_pool_feeds_reaper_end_to_end() {
        let pool = WorkerPool::new(WorkerPoolConfig {
            max_parallel: 1,
            idle_timeout: Duration::from_millis(150),
            pause_timeout: Duration::from_secs(5),
        });
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("bar.dat");
        std::fs::write(&target, b"hello").unwrap();

        pool.submit(DownloadJob {
            archive_key: "a/db_1_2_3/bar.dat".to_string(),
            expected_size_bytes: 5,
            container: "c1".to_string(),
            download_root: dir.path().to_string_lossy().to_string(),
            target_path: target,
        });
        let completed_rx = pool.completed();
        pool.run(|_job| Ok(()));

        let (manifest_tx, manifest_rx) = crossbeam_channel::unbounded();
        let (log_tx, _log_rx) = crossbeam_channel::unbounded();
        let mut reaper = ProgressReaper::new("P0", completed_rx, manifest_tx, log_tx);
        assert_eq!(reaper.sweep(), 1);
        assert_eq!(manifest_rx.try_recv().unwrap().state, DownloadState::Success);
    }
}
