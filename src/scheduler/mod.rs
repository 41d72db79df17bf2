//! Isolation scheduler
//!
//! Drains a [`TaskQueue`], running every task in its own worker process and
//! recording exactly one [`WorkerOutcome`] per dispatched task. A failing or
//! crashing worker only affects its own record; the run always continues
//! with the next task.
//!
//! With `concurrency == 1` tasks run strictly one after another. Higher
//! limits allow that many workers in flight, never two on the same path.

mod launcher;
mod report;

pub use launcher::{default_worker_program, ProcessLauncher, WorkerLauncher, WORKER_BINARY};
pub use report::{RunReport, TaskRecord, WorkerOutcome};

use crate::error::Error;
use crate::task::{Task, TaskQueue};
use crate::transform::Action;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::process::Child;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Scheduler lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Ready to dispatch
    Idle,
    /// Starting a worker
    Dispatching,
    /// Blocked on a worker's exit
    AwaitingWorker,
    /// Storing a worker's outcome
    Recording,
    /// Queue empty and every dispatched task recorded
    Drained,
}

/// Runs tasks in isolated worker processes
pub struct Scheduler<L: WorkerLauncher> {
    launcher: Arc<L>,
    concurrency: usize,
    state: SchedulerState,
}

impl<L: WorkerLauncher> Scheduler<L> {
    /// Create a scheduler allowing `concurrency` workers in flight (minimum 1)
    pub fn new(launcher: L, concurrency: usize) -> Self {
        Scheduler {
            launcher: Arc::new(launcher),
            concurrency: concurrency.max(1),
            state: SchedulerState::Idle,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Drain `queue` to completion
    pub async fn run(&mut self, queue: TaskQueue) -> RunReport {
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        self.run_with_shutdown(queue, shutdown_rx).await
    }

    /// Drain `queue`, stopping early once `shutdown` becomes true
    ///
    /// On shutdown no further tasks are dispatched, in-flight workers are
    /// killed and recorded as [`WorkerOutcome::Cancelled`], and the tasks
    /// left in the queue are counted in [`RunReport::skipped`].
    pub async fn run_with_shutdown(
        &mut self,
        mut queue: TaskQueue,
        shutdown: watch::Receiver<bool>,
    ) -> RunReport {
        let mut report = RunReport::default();
        let mut in_flight: JoinSet<TaskRecord> = JoinSet::new();
        let mut busy: HashMap<PathBuf, Action> = HashMap::new();
        // Task whose path is already being worked on; dispatched once that worker exits.
        let mut held: Option<Task> = None;
        let total = queue.len();
        let mut dispatched = 0usize;

        self.state = SchedulerState::Idle;
        info!(
            "Dispatching {} task(s) with up to {} worker(s)",
            total, self.concurrency
        );

        loop {
            while in_flight.len() < self.concurrency && !*shutdown.borrow() {
                let task = match held.take().or_else(|| queue.pop()) {
                    Some(task) => task,
                    None => break,
                };

                if busy.contains_key(task.path()) {
                    debug!("{:?} already in flight, holding", task.path());
                    held = Some(task);
                    break;
                }

                self.state = SchedulerState::Dispatching;
                dispatched += 1;
                debug!(
                    "[{}/{}] {} {:?}",
                    dispatched,
                    total,
                    task.action(),
                    task.path()
                );

                match self.launcher.command(&task).spawn() {
                    Ok(child) => {
                        busy.insert(task.path().to_path_buf(), task.action());
                        in_flight.spawn(supervise(task, child, shutdown.clone()));
                    }
                    Err(source) => {
                        self.state = SchedulerState::Recording;
                        let err = Error::Spawn {
                            path: task.path().to_path_buf(),
                            source,
                        };
                        error!("{}", err);
                        report.record(TaskRecord {
                            action: task.action(),
                            path: task.into_path(),
                            outcome: WorkerOutcome::SpawnFailed {
                                reason: err.to_string(),
                            },
                            elapsed: Default::default(),
                        });
                    }
                }
                self.state = SchedulerState::Idle;
            }

            if in_flight.is_empty() {
                break;
            }

            self.state = SchedulerState::AwaitingWorker;
            match in_flight.join_next().await {
                Some(Ok(record)) => {
                    self.state = SchedulerState::Recording;
                    busy.remove(&record.path);
                    log_record(&record);
                    report.record(record);
                }
                Some(Err(e)) => {
                    error!("Worker supervisor failed: {}", e);
                }
                None => break,
            }
            self.state = SchedulerState::Idle;
        }

        // A supervisor that died leaves its path behind; it still gets a record.
        for (path, action) in busy {
            report.record(TaskRecord {
                path,
                action,
                outcome: WorkerOutcome::Lost {
                    reason: "supervisor task failed".to_string(),
                },
                elapsed: Default::default(),
            });
        }

        report.skipped = queue.len() + usize::from(held.is_some());
        if report.skipped > 0 {
            warn!("Interrupted: {} task(s) not started", report.skipped);
        }

        self.state = SchedulerState::Drained;
        info!(
            "Drained: {} succeeded, {} failed",
            report.succeeded(),
            report.failed()
        );
        report
    }
}

/// Wait for one worker, killing it if shutdown is requested first
async fn supervise(task: Task, mut child: Child, mut shutdown: watch::Receiver<bool>) -> TaskRecord {
    let started = Instant::now();

    let outcome = tokio::select! {
        status = child.wait() => match status {
            Ok(status) => WorkerOutcome::from_status(status),
            Err(e) => WorkerOutcome::Lost { reason: e.to_string() },
        },
        _ = shutdown_requested(&mut shutdown) => {
            if let Err(e) = child.kill().await {
                warn!("Failed to kill worker for {:?}: {}", task.path(), e);
            }
            WorkerOutcome::Cancelled
        }
    };
    let outcome = settle(outcome, *shutdown.borrow());

    TaskRecord {
        action: task.action(),
        path: task.into_path(),
        outcome,
        elapsed: started.elapsed(),
    }
}

/// A worker killed by a signal once shutdown has begun counts as cancelled,
/// whoever sent the signal
fn settle(outcome: WorkerOutcome, shutting_down: bool) -> WorkerOutcome {
    match outcome {
        WorkerOutcome::Killed { .. } if shutting_down => WorkerOutcome::Cancelled,
        other => other,
    }
}

/// Resolves once the flag is true; never resolves if the sender is gone
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

fn log_record(record: &TaskRecord) {
    if record.outcome.is_success() {
        info!(
            "{} {:?} ({:.1?})",
            match record.action {
                Action::Encrypt => "Encrypted",
                Action::Decrypt => "Decrypted",
            },
            record.path,
            record.elapsed
        );
    } else {
        warn!("Failed {:?}: {}", record.path, record.outcome);
    }
}
