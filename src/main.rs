//! treecrypt - Recursive in-place file transform with per-file isolation
//!
//! Usage:
//!   treecrypt run [encrypt|decrypt] [DIR]  - Transform every file under DIR
//!   treecrypt init --key <N>               - Write a config file holding the key
//!   treecrypt list [DIR]                   - Show the files a run would touch

use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use treecrypt::{
    config::{Config, SchedulerConfig},
    error::exit_code,
    logging,
    scheduler::{default_worker_program, ProcessLauncher, Scheduler},
    task::{enumerate, resolve_root, EnumerateOptions, Enumeration},
    transform::Action,
    Error, Result,
};
use tracing::{error, info, warn};

/// Config file used when `--config` is not given
const DEFAULT_CONFIG_PATH: &str = "~/.config/treecrypt/config.json";

#[derive(Parser)]
#[command(name = "treecrypt")]
#[command(author = "treecrypt Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Recursively shift-encrypt files, one isolated process per file")]
struct Cli {
    /// Configuration file path (JSON, YAML, or a file holding just the key)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt or decrypt every regular file under a directory
    Run {
        /// encrypt or decrypt (prompted if omitted)
        action: Option<String>,

        /// Root directory (prompted if omitted)
        dir: Option<PathBuf>,

        /// Maximum number of workers in flight
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,

        /// Follow symbolic links while walking
        #[arg(long)]
        follow_symlinks: bool,

        /// Worker executable to spawn per file
        #[arg(long)]
        worker: Option<PathBuf>,
    },

    /// Write a configuration file holding the key
    Init {
        /// Shift key
        #[arg(long, allow_hyphen_values = true)]
        key: i64,

        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// List the files a run would process, in dispatch order
    List {
        /// Root directory (prompted if omitted)
        dir: Option<PathBuf>,

        /// Follow symbolic links while walking
        #[arg(long)]
        follow_symlinks: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    logging::init(if cli.verbose { "debug" } else { "info" });

    let explicit_config = cli.config.is_some();
    let config_path = expand_tilde(
        &cli.config
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
    );

    let code = match run_command(cli.command, &config_path, explicit_config) {
        Ok(code) => code,
        Err(e) => {
            error!("Error: {}", e);
            exit_code::FATAL
        }
    };

    std::process::exit(code);
}

fn run_command(command: Commands, config_path: &Path, explicit_config: bool) -> Result<i32> {
    match command {
        Commands::Run {
            action,
            dir,
            concurrency,
            follow_symlinks,
            worker,
        } => {
            let mut config = load_config(config_path, explicit_config)?;
            if let Some(n) = concurrency {
                config.scheduler.concurrency = n;
            }
            if follow_symlinks {
                config.scheduler.follow_symlinks = true;
            }
            if worker.is_some() {
                config.scheduler.worker_program = worker;
            }
            config.validate()?;
            cmd_run(&config, action, dir)
        }

        Commands::Init { key, force } => cmd_init(config_path, key, force).map(|_| exit_code::SUCCESS),

        Commands::List {
            dir,
            follow_symlinks,
        } => {
            let mut scheduler = load_walk_config(config_path)?;
            if follow_symlinks {
                scheduler.follow_symlinks = true;
            }
            cmd_list(dir, &scheduler).map(|_| exit_code::SUCCESS)
        }
    }
}

/// Load the key before anything else; without one nothing may be touched
fn load_config(config_path: &Path, explicit: bool) -> Result<Config> {
    if explicit || config_path.exists() {
        Config::load(config_path)
    } else {
        Config::from_env()
    }
}

/// Listing needs no key, only the walk settings; a missing file means defaults
fn load_walk_config(config_path: &Path) -> Result<SchedulerConfig> {
    if config_path.exists() {
        return Ok(Config::load(config_path)?.scheduler);
    }
    let mut config = Config::default();
    config.apply_env_overrides()?;
    Ok(config.scheduler)
}

fn cmd_run(config: &Config, action: Option<String>, dir: Option<PathBuf>) -> Result<i32> {
    let action: Action = match action {
        Some(token) => token.parse()?,
        None => prompt("Action (encrypt/decrypt): ")?.parse()?,
    };
    let dir = match dir {
        Some(dir) => dir,
        None => PathBuf::from(prompt("Directory to process: ")?),
    };
    let root = resolve_root(&expand_tilde(&dir))?;

    let worker = match &config.scheduler.worker_program {
        Some(program) => program.clone(),
        None => default_worker_program()?,
    };
    if !worker.is_file() {
        return Err(Error::Config(format!(
            "Worker program {:?} not found",
            worker
        )));
    }

    if config.key.rem_euclid(256) == 0 {
        warn!("Key {} is a multiple of 256; files will not change", config.key);
    }

    let options = EnumerateOptions {
        follow_symlinks: config.scheduler.follow_symlinks,
    };
    let Enumeration { queue, warnings } = enumerate(&root, action, options)?;
    info!(
        "{} {} file(s) under {:?}",
        match action {
            Action::Encrypt => "Encrypting",
            Action::Decrypt => "Decrypting",
        },
        queue.len(),
        root
    );

    let runtime = tokio::runtime::Runtime::new().map_err(|e| Error::Internal(e.to_string()))?;

    let mut report = runtime.block_on(async {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                warn!("Received interrupt, stopping workers");
                let _ = shutdown_tx.send(true);
            }
        });

        let launcher = ProcessLauncher::new(worker, config.key);
        let mut scheduler = Scheduler::new(launcher, config.scheduler.concurrency);
        scheduler
            .run_with_shutdown(queue, shutdown_rx)
            .await
    });
    report.warnings = warnings;

    println!("{}", report);

    Ok(report.exit_code())
}

fn cmd_init(config_path: &Path, key: i64, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "{:?} already exists (use --force to overwrite)",
            config_path
        )));
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let config = Config {
        key,
        ..Config::default()
    };
    config.save(config_path)?;

    info!("Configuration saved to {:?}", config_path);
    Ok(())
}

fn cmd_list(dir: Option<PathBuf>, scheduler: &SchedulerConfig) -> Result<()> {
    let dir = match dir {
        Some(dir) => dir,
        None => PathBuf::from(prompt("Directory to list: ")?),
    };

    let enumeration = enumerate(
        &expand_tilde(&dir),
        Action::Encrypt,
        EnumerateOptions {
            follow_symlinks: scheduler.follow_symlinks,
        },
    )?;

    for task in enumeration.queue.iter() {
        println!("{}", task.path().display());
    }
    for warning in &enumeration.warnings {
        warn!("Skipped {:?}: {}", warning.path, warning.message);
    }
    info!("{} file(s)", enumeration.queue.len());

    Ok(())
}

/// Read one trimmed line from stdin
fn prompt(message: &str) -> Result<String> {
    print!("{}", message);
    std::io::stdout().flush()?;

    let mut line = String::new();
    if std::io::stdin().read_line(&mut line)? == 0 {
        return Err(Error::Internal("No input on stdin".to_string()));
    }
    Ok(line.trim().to_string())
}

fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}
