//! treecrypt-worker - transforms a single file in place
//!
//! Usage:
//!   treecrypt-worker --key=<KEY> <PATH> <ACTION>
//!
//! Exit codes: 0 success, 64 bad arguments, 66 open failure, 74 I/O failure.

use clap::Parser;
use std::path::PathBuf;
use treecrypt::error::exit_code;
use treecrypt::{logging, worker};

#[derive(Parser)]
#[command(name = "treecrypt-worker")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Apply the byte shift to one file (spawned by treecrypt)")]
struct Cli {
    /// Shift key
    #[arg(long, allow_hyphen_values = true)]
    key: i64,

    /// File to transform in place
    path: PathBuf,

    /// encrypt or decrypt
    action: String,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            let code = if e.use_stderr() {
                exit_code::USAGE
            } else {
                exit_code::SUCCESS
            };
            std::process::exit(code);
        }
    };

    logging::init("warn");

    std::process::exit(worker::run(&cli.path, cli.key, &cli.action));
}
