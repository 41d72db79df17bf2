//! Worker process construction

use crate::error::{Error, Result};
use crate::task::Task;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

/// File name of the worker executable
pub const WORKER_BINARY: &str = "treecrypt-worker";

/// Builds the command that runs one task in its own process
pub trait WorkerLauncher: Send + Sync {
    /// Command for `task`; the scheduler spawns and supervises it
    fn command(&self, task: &Task) -> Command;
}

/// Launches the `treecrypt-worker` program
///
/// Invocation: `treecrypt-worker --key=<KEY> -- <PATH> <ACTION>`. On unix each
/// worker gets its own process group, so a terminal Ctrl-C reaches only the
/// scheduler, which then stops the workers itself.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
    key: i64,
}

impl ProcessLauncher {
    pub fn new(program: impl Into<PathBuf>, key: i64) -> Self {
        ProcessLauncher {
            program: program.into(),
            key,
        }
    }
}

impl WorkerLauncher for ProcessLauncher {
    fn command(&self, task: &Task) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg(format!("--key={}", self.key))
            .arg("--")
            .arg(task.path())
            .arg(task.action().as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);
        command
    }
}

/// Locate the worker executable installed beside the running binary
pub fn default_worker_program() -> Result<PathBuf> {
    let exe = std::env::current_exe()
        .map_err(|e| Error::Config(format!("Cannot locate running executable: {}", e)))?;
    let dir = exe
        .parent()
        .ok_or_else(|| Error::Config(format!("Executable {:?} has no parent", exe)))?;
    Ok(dir.join(format!("{}{}", WORKER_BINARY, std::env::consts::EXE_SUFFIX)))
}
