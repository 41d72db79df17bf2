//! Worker entry point
//!
//! Runs inside its own process, one per task. Any failure is collapsed into
//! the process exit code; the scheduler never sees more than that.

use crate::error::{exit_code, Error, Result};
use crate::stream::ScopedFileStream;
use crate::transform::{transform, Action};
use std::io;
use std::path::Path;
use tracing::{debug, error};

/// Transform `path` in place
///
/// # Returns
/// Number of bytes rewritten
pub fn process_file(path: &Path, key: i64, action: Action) -> Result<u64> {
    let mut stream = ScopedFileStream::open(path)?;
    let expected = stream.len()?;

    let rewritten = transform(&mut stream, key, action).map_err(|source| Error::Transform {
        path: path.to_path_buf(),
        source,
    })?;

    // Another writer resized the file underneath us
    if rewritten != expected {
        return Err(Error::Transform {
            path: path.to_path_buf(),
            source: io::Error::new(
                io::ErrorKind::Other,
                format!("expected {} bytes, rewrote {}", expected, rewritten),
            ),
        });
    }

    stream.close()?;
    Ok(rewritten)
}

/// Validate the action token, process the file, and return the exit code
///
/// The token is checked here even though the scheduler only ever passes
/// valid ones, since the worker can be invoked directly.
pub fn run(path: &Path, key: i64, action_token: &str) -> i32 {
    let action: Action = match action_token.parse() {
        Ok(action) => action,
        Err(e) => {
            error!("{}", e);
            return e.exit_code();
        }
    };

    match process_file(path, key, action) {
        Ok(rewritten) => {
            debug!("{} {:?}: {} bytes", action, path, rewritten);
            exit_code::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            e.exit_code()
        }
    }
}
