//! treecrypt - Recursive in-place file transform
//!
//! Walks a directory tree and rewrites every regular file with a reversible
//! byte shift. Each file is handled by a separate worker process so that a
//! crash on one file cannot disturb the scheduler or any other file.

pub mod config;
pub mod error;
pub mod logging;
pub mod scheduler;
pub mod stream;
pub mod task;
pub mod transform;
pub mod worker;

pub use config::Config;
pub use error::{Error, Result};

