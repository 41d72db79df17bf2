//! Per-task outcomes and the end-of-run summary

use crate::error::exit_code;
use crate::task::EnumerationWarning;
use crate::transform::Action;
use std::fmt;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

/// How a single worker ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// Worker exited with status 0
    Succeeded,

    /// Worker exited with a non-zero status
    Failed { code: i32 },

    /// Worker was terminated by a signal
    Killed { signal: Option<i32> },

    /// Worker was stopped because the run was interrupted
    Cancelled,

    /// Worker process could not be started
    SpawnFailed { reason: String },

    /// Worker status could not be collected
    Lost { reason: String },
}

impl WorkerOutcome {
    /// Classify an exit status
    pub fn from_status(status: ExitStatus) -> Self {
        if status.success() {
            return WorkerOutcome::Succeeded;
        }
        match status.code() {
            Some(code) => WorkerOutcome::Failed { code },
            None => WorkerOutcome::Killed {
                signal: signal_of(&status),
            },
        }
    }

    /// Whether the file was fully transformed
    pub fn is_success(&self) -> bool {
        matches!(self, WorkerOutcome::Succeeded)
    }

    /// Process exit code, if the worker exited normally
    pub fn code(&self) -> Option<i32> {
        match self {
            WorkerOutcome::Succeeded => Some(exit_code::SUCCESS),
            WorkerOutcome::Failed { code } => Some(*code),
            _ => None,
        }
    }

    /// Whether the worker may have rewritten part of the file before stopping
    pub fn may_be_partial(&self) -> bool {
        match self {
            WorkerOutcome::Succeeded | WorkerOutcome::SpawnFailed { .. } => false,
            WorkerOutcome::Failed { code } => {
                *code != exit_code::OPEN_FAILED && *code != exit_code::USAGE
            }
            WorkerOutcome::Killed { .. } | WorkerOutcome::Cancelled | WorkerOutcome::Lost { .. } => {
                true
            }
        }
    }
}

#[cfg(unix)]
fn signal_of(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn signal_of(_status: &ExitStatus) -> Option<i32> {
    None
}

impl fmt::Display for WorkerOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerOutcome::Succeeded => write!(f, "ok"),
            WorkerOutcome::Failed { code } => match *code {
                exit_code::OPEN_FAILED => write!(f, "could not open file (exit {})", code),
                exit_code::IO_FAILED => write!(f, "I/O error during transform (exit {})", code),
                exit_code::USAGE => write!(f, "worker rejected its arguments (exit {})", code),
                _ => write!(f, "exit {}", code),
            },
            WorkerOutcome::Killed { signal: Some(sig) } => write!(f, "killed by signal {}", sig),
            WorkerOutcome::Killed { signal: None } => write!(f, "terminated abnormally"),
            WorkerOutcome::Cancelled => write!(f, "cancelled"),
            WorkerOutcome::SpawnFailed { reason } => write!(f, "spawn failed: {}", reason),
            WorkerOutcome::Lost { reason } => write!(f, "status lost: {}", reason),
        }
    }
}

/// Recorded result of one dispatched task
#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub path: PathBuf,
    pub action: Action,
    pub outcome: WorkerOutcome,
    pub elapsed: Duration,
}

/// Aggregate result of a scheduler run
#[derive(Debug, Default)]
pub struct RunReport {
    /// One record per dispatched task, in completion order
    pub records: Vec<TaskRecord>,

    /// Tasks never dispatched because the run was interrupted
    pub skipped: usize,

    /// Subtrees the walk could not read
    pub warnings: Vec<EnumerationWarning>,
}

impl RunReport {
    pub(crate) fn record(&mut self, record: TaskRecord) {
        self.records.push(record);
    }

    /// Tasks dispatched
    pub fn total(&self) -> usize {
        self.records.len()
    }

    /// Tasks whose worker succeeded
    pub fn succeeded(&self) -> usize {
        self.records.iter().filter(|r| r.outcome.is_success()).count()
    }

    /// Tasks whose worker did not succeed, cancelled ones included
    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }

    /// Tasks stopped by an interrupt
    pub fn cancelled(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.outcome == WorkerOutcome::Cancelled)
            .count()
    }

    /// Failed records sorted by path
    pub fn failures(&self) -> Vec<&TaskRecord> {
        let mut failures: Vec<&TaskRecord> = self
            .records
            .iter()
            .filter(|r| !r.outcome.is_success())
            .collect();
        failures.sort_by(|a, b| a.path.cmp(&b.path));
        failures
    }

    /// Whether every dispatched task succeeded and none were skipped
    pub fn is_clean(&self) -> bool {
        self.failed() == 0 && self.skipped == 0
    }

    /// Exit code for the scheduler process
    pub fn exit_code(&self) -> i32 {
        if self.cancelled() > 0 || self.skipped > 0 {
            exit_code::CANCELLED
        } else if self.failed() > 0 {
            exit_code::FILES_FAILED
        } else {
            exit_code::SUCCESS
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Files processed: {}", self.total())?;
        writeln!(f, "  succeeded:     {}", self.succeeded())?;
        writeln!(f, "  failed:        {}", self.failed())?;
        if self.skipped > 0 {
            writeln!(f, "  not started:   {}", self.skipped)?;
        }

        let failures = self.failures();
        if !failures.is_empty() {
            writeln!(f, "Failed files:")?;
            for record in &failures {
                writeln!(f, "  {} ({})", record.path.display(), record.outcome)?;
            }
        }

        let partial = failures.iter().filter(|r| r.outcome.may_be_partial()).count();
        if partial > 0 {
            writeln!(
                f,
                "WARNING: {} file(s) were rewritten in place and may be partially transformed.",
                partial
            )?;
        }

        if !self.warnings.is_empty() {
            writeln!(f, "Skipped during enumeration:")?;
            for warning in &self.warnings {
                match &warning.path {
                    Some(path) => writeln!(f, "  {} ({})", path.display(), warning.message)?,
                    None => writeln!(f, "  {}", warning.message)?,
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(path: &str, outcome: WorkerOutcome) -> TaskRecord {
        TaskRecord {
            path: PathBuf::from(path),
            action: Action::Encrypt,
            outcome,
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn test_counts_and_exit_code() {
        let mut report = RunReport::default();
        assert_eq!(report.exit_code(), exit_code::SUCCESS);

        report.record(record("/b", WorkerOutcome::Succeeded));
        report.record(record("/a", WorkerOutcome::Failed { code: 74 }));
        report.record(record("/c", WorkerOutcome::Succeeded));

        assert_eq!(report.total(), 3);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
        assert!(!report.is_clean());
        assert_eq!(report.exit_code(), exit_code::FILES_FAILED);
    }

    #[test]
    fn test_cancellation_dominates_exit_code() {
        let mut report = RunReport::default();
        report.record(record("/a", WorkerOutcome::Failed { code: 74 }));
        report.record(record("/b", WorkerOutcome::Cancelled));
        assert_eq!(report.exit_code(), exit_code::CANCELLED);

        let mut report = RunReport::default();
        report.skipped = 3;
        assert_eq!(report.exit_code(), exit_code::CANCELLED);
    }

    #[test]
    fn test_partial_transform_classification() {
        assert!(!WorkerOutcome::Failed { code: exit_code::OPEN_FAILED }.may_be_partial());
        assert!(WorkerOutcome::Failed { code: exit_code::IO_FAILED }.may_be_partial());
        assert!(WorkerOutcome::Killed { signal: Some(9) }.may_be_partial());
        assert!(!WorkerOutcome::SpawnFailed { reason: "x".into() }.may_be_partial());
    }

    #[test]
    fn test_summary_lists_failures_sorted() {
        let mut report = RunReport::default();
        report.record(record("/z.txt", WorkerOutcome::Failed { code: 66 }));
        report.record(record("/a.txt", WorkerOutcome::Killed { signal: Some(11) }));
        report.record(record("/m.txt", WorkerOutcome::Succeeded));

        let summary = report.to_string();
        let a = summary.find("/a.txt").unwrap();
        let z = summary.find("/z.txt").unwrap();
        assert!(a < z);
        assert!(!summary.contains("/m.txt"));
        assert!(summary.contains("partially transformed"));
    }

    #[cfg(unix)]
    #[test]
    fn test_from_status() {
        use std::os::unix::process::ExitStatusExt;

        assert_eq!(
            WorkerOutcome::from_status(ExitStatus::from_raw(0)),
            WorkerOutcome::Succeeded
        );
        assert_eq!(
            WorkerOutcome::from_status(ExitStatus::from_raw(66 << 8)),
            WorkerOutcome::Failed { code: 66 }
        );
        assert_eq!(
            WorkerOutcome::from_status(ExitStatus::from_raw(9)),
            WorkerOutcome::Killed { signal: Some(9) }
        );
    }
}
