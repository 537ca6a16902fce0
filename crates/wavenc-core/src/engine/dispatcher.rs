//! Worker pool that encodes every queued file exactly once.
//!
//! The file list is pushed into a bounded channel before any worker starts and
//! the sender is dropped, so receiving a path is the claim: each path is handed
//! to exactly one worker and the channel reports disconnection once drained.
//! Cancellation is a single atomic flag polled at the top of the claim loop;
//! a file that has already been received always runs to completion.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use crossbeam_channel::Receiver;

use super::status::StatusLog;
use crate::error::{EncoderError, Result};

/// Lifecycle of one scan and encode cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunState {
    #[default]
    Idle,
    Scanning,
    Ready,
    Running,
    Completed,
    Cancelled,
}

/// Aggregate outcome of a run that was not aborted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Files handed to a worker
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// True if cancellation left files unclaimed
    pub cancelled: bool,
}

impl RunSummary {
    /// `Err(Cancelled)` if cancellation left files unclaimed.
    pub fn into_result(self) -> Result<Self> {
        if self.cancelled {
            Err(EncoderError::Cancelled)
        } else {
            Ok(self)
        }
    }
}

/// Cloneable handle that cancels a run from any thread.
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// Request cancellation. Returns immediately; claimed files still finish.
    pub fn cancel(&self) -> RunState {
        self.0.store(true, Ordering::SeqCst);
        RunState::Cancelled
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct Tally {
    attempted: AtomicUsize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
}

/// Owns the worker count, cancellation flag, run state and status log.
#[derive(Debug)]
pub struct Dispatcher {
    threads: usize,
    cancelled: Arc<AtomicBool>,
    state: Mutex<RunState>,
    status: StatusLog,
}

impl Dispatcher {
    /// `echo_status` prints status events to stdout as they are recorded.
    pub fn new(threads: usize, echo_status: bool) -> Self {
        Self {
            threads: threads.max(1),
            cancelled: Arc::new(AtomicBool::new(false)),
            state: Mutex::new(RunState::Idle),
            status: StatusLog::new(echo_status),
        }
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn state(&self) -> RunState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_state(&self, state: RunState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    pub fn status(&self) -> &StatusLog {
        &self.status
    }

    pub fn cancel(&self) -> RunState {
        self.cancel_handle().cancel()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(Arc::clone(&self.cancelled))
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Run `process` once for every file across the worker pool.
    ///
    /// `process` receives the file, the 1-based worker id and the status log.
    /// Its errors are counted as per-file failures and never abort the run.
    /// Blocks until every worker has exited.
    pub fn run<F>(&self, files: &[PathBuf], process: F) -> Result<RunSummary>
    where
        F: Fn(&Path, u32, &StatusLog) -> Result<()> + Sync,
    {
        if files.is_empty() {
            return Err(EncoderError::NotFound("no input files to encode".into()));
        }

        self.cancelled.store(false, Ordering::SeqCst);
        self.set_state(RunState::Running);
        log::debug!(
            "Dispatching {} files across {} workers",
            files.len(),
            self.threads
        );

        let (tx, rx) = crossbeam_channel::bounded(files.len());
        for path in files {
            // Capacity equals the file count and `rx` is alive, so this never fails.
            let _ = tx.send(path.as_path());
        }
        drop(tx);

        let tally = Tally::default();
        let outcome = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(self.threads);
            let mut spawn_error = None;

            for index in 0..self.threads {
                let thread_id = index as u32 + 1;
                let rx = rx.clone();
                let process = &process;
                let tally = &tally;
                let spawned = thread::Builder::new()
                    .name(format!("wavenc-worker-{thread_id}"))
                    .spawn_scoped(scope, move || {
                        self.worker_loop(thread_id, &rx, process, tally)
                    });
                match spawned {
                    Ok(handle) => handles.push((thread_id, handle)),
                    Err(e) => {
                        log::error!("Failed to spawn worker {thread_id}: {e}");
                        self.cancelled.store(true, Ordering::SeqCst);
                        spawn_error = Some(e);
                        break;
                    }
                }
            }

            let mut join_error = None;
            for (thread_id, handle) in handles {
                if handle.join().is_err() {
                    log::error!("Worker {thread_id} panicked");
                    join_error.get_or_insert(thread_id);
                }
            }

            match (spawn_error, join_error) {
                (Some(e), _) => Err(EncoderError::ThreadCreate(e)),
                (None, Some(thread_id)) => Err(EncoderError::ThreadJoin(thread_id)),
                (None, None) => Ok(()),
            }
        });

        if let Err(e) = outcome {
            self.set_state(RunState::Cancelled);
            return Err(e);
        }

        let attempted = tally.attempted.load(Ordering::SeqCst);
        let summary = RunSummary {
            attempted,
            succeeded: tally.succeeded.load(Ordering::SeqCst),
            failed: tally.failed.load(Ordering::SeqCst),
            cancelled: attempted < files.len(),
        };
        self.set_state(if summary.cancelled {
            RunState::Cancelled
        } else {
            RunState::Completed
        });
        Ok(summary)
    }

    fn worker_loop<F>(&self, thread_id: u32, rx: &Receiver<&Path>, process: &F, tally: &Tally)
    where
        F: Fn(&Path, u32, &StatusLog) -> Result<()>,
    {
        loop {
            if self.is_cancelled() {
                log::debug!("Worker {thread_id} observed cancellation");
                break;
            }
            let Ok(path) = rx.recv() else {
                break;
            };

            tally.attempted.fetch_add(1, Ordering::SeqCst);
            match process(path, thread_id, &self.status) {
                Ok(()) => {
                    tally.succeeded.fetch_add(1, Ordering::SeqCst);
                }
                Err(e) => {
                    tally.failed.fetch_add(1, Ordering::SeqCst);
                    log::warn!("Worker {thread_id} failed on {}: {e}", path.display());
                }
            }
        }
    }
}
