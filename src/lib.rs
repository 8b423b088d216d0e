pub mod config;
pub mod generator;
pub mod pipeline;
pub mod rules;
pub mod scanner;
pub mod watch;

use crate::config::{Config, ConfigError};
use crate::pipeline::{BuildError, BuildSettings};
use crate::watch::{WatchError, WatchOptions};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Scan {
        inputs: Vec<String>,
        config: Option<String>,
    },
    Build {
        inputs: Vec<String>,
        out: Option<String>,
        config: Option<String>,
    },
    Watch {
        inputs: Vec<String>,
        out: Option<String>,
        config: Option<String>,
        poll: bool,
        poll_interval_ms: Option<u64>,
    },
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CliError {
    pub message: String,
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self {
            message: err.message,
        }
    }
}

impl From<BuildError> for CliError {
    fn from(err: BuildError) -> Self {
        Self {
            message: err.to_string(),
        }
    }
}

impl From<WatchError> for CliError {
    fn from(err: WatchError) -> Self {
        Self {
            message: err.to_string(),
        }
    }
}

pub fn run(command: Command) -> Result<(), CliError> {
    match command {
        Command::Scan { inputs, config } => run_scan(inputs, config),
        Command::Build {
            inputs,
            out,
            config,
        } => run_build(inputs, out, config),
        Command::Watch {
            inputs,
            out,
            config,
            poll,
            poll_interval_ms,
        } => run_watch(inputs, out, config, poll, poll_interval_ms),
        Command::Help => {
            print_help();
            Ok(())
        }
    }
}

pub fn run_from_env() -> Result<(), CliError> {
    let command = parse_args(env::args().skip(1))?;
    run(command)
}

/// Parses command-line arguments (without the program name). No arguments
/// means watching with the configured defaults.
pub fn parse_args<I>(args: I) -> Result<Command, CliError>
where
    I: IntoIterator<Item = String>,
{
    let mut iter = args.into_iter();
    let Some(cmd) = iter.next() else {
        return Ok(Command::Watch {
            inputs: Vec::new(),
            out: None,
            config: None,
            poll: false,
            poll_interval_ms: None,
        });
    };

    match cmd.as_str() {
        "scan" => parse_scan_args(iter.collect()),
        "build" => parse_build_args(iter.collect()),
        "watch" => parse_watch_args(iter.collect()),
        "-h" | "--help" | "help" => Ok(Command::Help),
        _ => Err(CliError {
            message: format!("unknown command: {}", cmd),
        }),
    }
}

fn parse_scan_args(args: Vec<String>) -> Result<Command, CliError> {
    let mut inputs = Vec::new();
    let mut config = None;
    let mut idx = 0;

    while idx < args.len() {
        match args[idx].as_str() {
            "--config" | "-c" => {
                config = Some(flag_value(&args, &mut idx, "scan", "--config")?);
            }
            value if value.starts_with('-') => return Err(unknown_flag("scan", value)),
            value => inputs.push(value.to_string()),
        }
        idx += 1;
    }

    Ok(Command::Scan { inputs, config })
}

fn parse_build_args(args: Vec<String>) -> Result<Command, CliError> {
    let mut inputs = Vec::new();
    let mut out = None;
    let mut config = None;
    let mut idx = 0;

    while idx < args.len() {
        match args[idx].as_str() {
            "--out" | "--output" | "-o" => {
                out = Some(flag_value(&args, &mut idx, "build", "--output")?);
            }
            "--config" | "-c" => {
                config = Some(flag_value(&args, &mut idx, "build", "--config")?);
            }
            value if value.starts_with('-') => return Err(unknown_flag("build", value)),
            value => inputs.push(value.to_string()),
        }
        idx += 1;
    }

    Ok(Command::Build {
        inputs,
        out,
        config,
    })
}

fn parse_watch_args(args: Vec<String>) -> Result<Command, CliError> {
    let mut inputs = Vec::new();
    let mut out = None;
    let mut config = None;
    let mut poll = false;
    let mut poll_interval_ms = None;
    let mut idx = 0;

    while idx < args.len() {
        match args[idx].as_str() {
            "--out" | "--output" | "-o" => {
                out = Some(flag_value(&args, &mut idx, "watch", "--output")?);
            }
            "--config" | "-c" => {
                config = Some(flag_value(&args, &mut idx, "watch", "--config")?);
            }
            "--poll" => {
                poll = true;
            }
            "--poll-interval" => {
                let value = flag_value(&args, &mut idx, "watch", "--poll-interval")?;
                poll = true;
                poll_interval_ms = Some(parse_u64_arg(&value, "--poll-interval")?);
            }
            value if value.starts_with('-') => return Err(unknown_flag("watch", value)),
            value => inputs.push(value.to_string()),
        }
        idx += 1;
    }

    Ok(Command::Watch {
        inputs,
        out,
        config,
        poll,
        poll_interval_ms,
    })
}

fn flag_value(
    args: &[String],
    idx: &mut usize,
    command: &str,
    flag: &str,
) -> Result<String, CliError> {
    *idx += 1;
    args.get(*idx).cloned().ok_or_else(|| CliError {
        message: format!("{} requires a value for {}", command, flag),
    })
}

fn unknown_flag(command: &str, flag: &str) -> CliError {
    CliError {
        message: format!("{} does not accept {}", command, flag),
    }
}

fn parse_u64_arg(value: &str, flag: &str) -> Result<u64, CliError> {
    match value.parse::<u64>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(CliError {
            message: format!("{} requires a positive integer, got '{}'", flag, value),
        }),
    }
}

/// Combines the config file with command-line overrides. Globs given on the
/// command line replace `content`; `--output` replaces `output`.
fn resolve_settings(
    inputs: Vec<String>,
    out: Option<String>,
    config_path: Option<&str>,
    base_dir: &Path,
) -> Result<(BuildSettings, Config), CliError> {
    let config = config::load_or_default(config_path.map(Path::new), base_dir)?;
    let content = if inputs.is_empty() {
        config.content_globs()
    } else {
        inputs
    };
    let output = out
        .map(PathBuf::from)
        .unwrap_or_else(|| config.output_path());
    let settings = BuildSettings::new(output, content).with_base_dir(base_dir);
    Ok((settings, config))
}

fn runtime() -> Result<tokio::runtime::Runtime, CliError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| CliError {
            message: format!("failed to start runtime: {}", err),
        })
}

fn run_scan(inputs: Vec<String>, config: Option<String>) -> Result<(), CliError> {
    let (settings, _) = resolve_settings(inputs, None, config.as_deref(), Path::new("."))?;
    let collected = runtime()?.block_on(pipeline::collect_tokens(&settings))?;

    let mut classes = collected.tokens;
    classes.sort();
    classes.dedup();

    for class in &classes {
        println!("{}", class);
    }

    log::info!(
        "scanned {} files, found {} classes",
        collected.files_matched,
        classes.len()
    );

    Ok(())
}

fn run_build(
    inputs: Vec<String>,
    out: Option<String>,
    config: Option<String>,
) -> Result<(), CliError> {
    let (settings, _) = resolve_settings(inputs, out, config.as_deref(), Path::new("."))?;
    runtime()?.block_on(pipeline::build_once(&settings))?;
    Ok(())
}

fn run_watch(
    inputs: Vec<String>,
    out: Option<String>,
    config: Option<String>,
    poll: bool,
    poll_interval_ms: Option<u64>,
) -> Result<(), CliError> {
    let (settings, config) = resolve_settings(inputs, out, config.as_deref(), Path::new("."))?;
    let mut options = WatchOptions::from(&config.watch);
    if poll {
        let interval_ms = poll_interval_ms.unwrap_or(config.watch.poll_interval_ms);
        options.poll = Some(Duration::from_millis(interval_ms.max(1)));
    }

    log::info!("starting watch...");
    runtime()?.block_on(watch::run_watch_until(settings, options, interrupted()))?;
    Ok(())
}

async fn interrupted() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => log::info!("interrupt received"),
        Err(err) => {
            log::warn!("cannot listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    }
}

fn print_help() {
    println!("minijit");
    println!();
    println!("USAGE:");
    println!("  minijit                      watch using minijit.toml or defaults");
    println!("  minijit scan [--config <path>] [<glob...>]");
    println!("  minijit build [--output <path>] [--config <path>] [<glob...>]");
    println!(
        "  minijit watch [--output <path>] [--config <path>] [--poll] [--poll-interval <ms>] [<glob...>]"
    );
    println!();
    println!("EXAMPLES:");
    println!("  minijit scan \"src/**/*.{{html,tsx}}\"");
    println!("  minijit build --output dist/app.css \"src/**/*.{{html,tsx}}\"");
    println!("  minijit watch -c minijit.toml");
    println!("  minijit watch --poll --poll-interval 250 \"src/**/*.{{html,tsx}}\"");
}
