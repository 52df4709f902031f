//! CLI entry point for rundog.
//!
//! Runs a command and restarts it whenever files under the watched
//! directories change.
//!
//! # Usage
//!
//! ```bash
//! rundog [OPTIONS] <COMMAND>...
//!
//! # Restart a dev server when Python sources change
//! rundog -p src -o '*.py' python -m app.server --port 8000
//!
//! # Keep watching after the command exits, log output to files
//! rundog -r --stdout out.log --stderr err.log ./build.sh
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

use std::io::Write;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{ArgAction, Parser};
use rd_core::config::seconds_to_millis;
use rd_core::{Config, ConfigError, FilterConfig, ProcessConfig, resolve_watch_paths};
use rd_runner::{Session, ShutdownReason};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// CLI ARGUMENT TYPES
// =============================================================================

/// Run a command and restart it when files change.
///
/// Changes are debounced: a burst of events restarts the command once, after
/// the filesystem has been quiet for `--wait` seconds.
#[derive(Parser, Debug)]
#[command(name = "rundog", version = rd_core::VERSION, about, long_about = None)]
struct Cli {
    /// Directory to watch (repeatable).
    ///
    /// Defaults to the directory containing the command.
    #[arg(short = 'p', long = "path", value_name = "DIR")]
    paths: Vec<String>,

    /// Keep running after the command exits and restart it on the next change.
    #[arg(short = 'r', long)]
    persist: bool,

    /// Ignore paths matching this glob (repeatable).
    #[arg(short, long, value_name = "GLOB")]
    exclude: Vec<String>,

    /// Ignore events on directories.
    #[arg(short = 'd', long)]
    exclude_dir: bool,

    /// Only react to paths matching this glob (repeatable).
    #[arg(short, long, value_name = "GLOB")]
    only: Vec<String>,

    /// Seconds without changes before restarting.
    #[arg(short, long, value_name = "SECONDS", default_value_t = 0.5, env = "RUNDOG_WAIT")]
    wait: f64,

    /// Redirect the command's stdout to this file.
    #[arg(long, value_name = "FILE")]
    stdout: Option<Utf8PathBuf>,

    /// Redirect the command's stderr to this file.
    #[arg(long, value_name = "FILE")]
    stderr: Option<Utf8PathBuf>,

    /// Increase logging verbosity (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Seconds to wait after SIGTERM before killing the command. 0 waits forever.
    #[arg(long, value_name = "SECONDS", default_value_t = 5.0, env = "RUNDOG_KILL_TIMEOUT")]
    kill_timeout: f64,

    /// Match globs case-sensitively.
    #[arg(long)]
    case_sensitive: bool,

    /// Disable colored output.
    #[arg(long)]
    no_color: bool,

    /// Command to run, followed by its arguments.
    #[arg(
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true,
        value_name = "COMMAND"
    )]
    command: Vec<String>,
}

// =============================================================================
// INITIALIZATION FUNCTIONS
// =============================================================================

/// Default filter directives for a `-v` count.
fn default_directives(verbose: u8) -> String {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    format!("{level},notify=warn,mio=warn")
}

/// Initializes the tracing subscriber for logging.
///
/// `RUST_LOG` wins if set. Logs go to stderr so they never mix with the
/// command's stdout.
fn init_tracing(verbose: u8, no_color: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)));

    // Check if colors should be disabled (flag or NO_COLOR env var)
    let use_ansi = !no_color && std::env::var("NO_COLOR").is_err();

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(use_ansi)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

/// Builds a validated [`Config`] from CLI arguments.
///
/// Resolves the watch paths, so every path must already exist as a
/// directory.
fn build_config(cli: &Cli) -> Result<Config, ConfigError> {
    let program = cli.command.first().ok_or(ConfigError::MissingCommand)?;

    let kill_timeout_ms = match seconds_to_millis("kill-timeout", cli.kill_timeout)? {
        0 => None,
        ms => Some(ms),
    };

    let mut config = Config::default();
    config.watch.paths = resolve_watch_paths(&cli.paths, program)?;
    config.filter = FilterConfig {
        only: cli.only.clone(),
        exclude: cli.exclude.clone(),
        exclude_dirs: cli.exclude_dir,
        case_sensitive: cli.case_sensitive,
        ..FilterConfig::default()
    };
    config.process = ProcessConfig {
        command: cli.command.clone(),
        stdout: cli.stdout.clone(),
        stderr: cli.stderr.clone(),
        kill_timeout_ms,
    };
    config.debounce.wait_ms = seconds_to_millis("wait", cli.wait)?;
    config.driver.persist = cli.persist;

    config.validate()?;
    Ok(config)
}

/// Cancels `token` on Ctrl-C or, on Unix, SIGTERM.
fn listen_for_shutdown(token: CancellationToken) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::spawn(async move {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    if let Err(error) = result {
                        tracing::warn!(%error, "Failed to listen for Ctrl-C");
                        return;
                    }
                    info!("Received interrupt, shutting down");
                }
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down");
                }
            }
            token.cancel();
        });
    }

    #[cfg(not(unix))]
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received interrupt, shutting down");
                token.cancel();
            }
            Err(error) => tracing::warn!(%error, "Failed to listen for Ctrl-C"),
        }
    });

    Ok(())
}

// =============================================================================
// COMMAND IMPLEMENTATION
// =============================================================================

/// Runs one session to completion.
async fn run(cli: &Cli) -> color_eyre::Result<ShutdownReason> {
    let config = build_config(cli)?;

    let shutdown = CancellationToken::new();
    listen_for_shutdown(shutdown.clone())?;

    let session = Session::start(&config).await?;
    Ok(session.run(shutdown).await?)
}

/// Writes a one-line diagnostic to stderr.
fn report(error: &dyn std::fmt::Display) -> ExitCode {
    let stderr = std::io::stderr();
    let mut handle = stderr.lock();
    let _ = writeln!(handle, "rundog: {error}");
    ExitCode::FAILURE
}

// =============================================================================
// MAIN ENTRY POINT
// =============================================================================

/// Application entry point.
#[tokio::main]
async fn main() -> ExitCode {
    // 1. Install color-eyre FIRST (before any potential panics)
    if let Err(error) = color_eyre::install() {
        return report(&error);
    }

    // 2. Parse CLI arguments
    let cli = Cli::parse();

    // 3. Initialize tracing (handles --no-color for log output)
    init_tracing(cli.verbose, cli.no_color);

    // 4. Run until the command exits or we are interrupted
    match run(&cli).await {
        Ok(reason) => {
            tracing::debug!(?reason, "Exiting");
            ExitCode::SUCCESS
        }
        Err(error) => report(&error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::time::Duration;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("arguments parse")
    }

    fn temp_dir_str(dir: &tempfile::TempDir) -> String {
        dir.path().to_str().expect("UTF-8 temp path").to_owned()
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_full_command_line() {
        let cli = parse(&[
            "rundog", "-p", "src", "-p", "lib", "-r", "-e", "*.log", "-d", "-o", "*.py", "-w",
            "0.2", "--stdout", "out.log", "-vv", "python", "app.py", "--port", "80",
        ]);

        assert_eq!(cli.paths, ["src", "lib"]);
        assert!(cli.persist);
        assert_eq!(cli.exclude, ["*.log"]);
        assert!(cli.exclude_dir);
        assert_eq!(cli.only, ["*.py"]);
        assert!((cli.wait - 0.2).abs() < f64::EPSILON);
        assert_eq!(cli.stdout, Some(Utf8PathBuf::from("out.log")));
        assert_eq!(cli.stderr, None);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.command, ["python", "app.py", "--port", "80"]);
    }

    #[test]
    fn test_command_flags_are_not_parsed() {
        let cli = parse(&["rundog", "ls", "-r", "-v"]);
        assert!(!cli.persist);
        assert_eq!(cli.verbose, 0);
        assert_eq!(cli.command, ["ls", "-r", "-v"]);
    }

    #[test]
    fn test_command_is_required() {
        assert!(Cli::try_parse_from(["rundog", "-r"]).is_err());
    }

    #[test]
    fn test_default_directives() {
        assert_eq!(default_directives(0), "info,notify=warn,mio=warn");
        assert_eq!(default_directives(1), "debug,notify=warn,mio=warn");
        assert_eq!(default_directives(5), "trace,notify=warn,mio=warn");
    }

    #[test]
    fn test_build_config() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let path = temp_dir_str(&dir);
        let cli = parse(&[
            "rundog", "-p", &path, "-p", &path, "-w", "1.5", "--kill-timeout", "2", "-o",
            "*.py", "--case-sensitive", "sh", "-c", "true",
        ]);

        let config = build_config(&cli).expect("valid config");

        assert_eq!(config.watch.paths.len(), 1);
        assert_eq!(config.filter.only, ["*.py"]);
        assert!(config.filter.case_sensitive);
        assert_eq!(config.process.command, ["sh", "-c", "true"]);
        assert_eq!(config.process.kill_timeout(), Some(Duration::from_secs(2)));
        assert_eq!(config.debounce.wait(), Duration::from_millis(1_500));
        assert!(!config.driver.persist);
    }

    #[test]
    fn test_zero_kill_timeout_waits_forever() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let path = temp_dir_str(&dir);
        let cli = parse(&["rundog", "-p", &path, "--kill-timeout", "0", "true"]);

        let config = build_config(&cli).expect("valid config");
        assert_eq!(config.process.kill_timeout(), None);
    }

    #[test]
    fn test_negative_wait_rejected() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let path = temp_dir_str(&dir);
        let cli = parse(&["rundog", "-p", &path, "--wait=-1", "true"]);

        let err = build_config(&cli).expect_err("negative wait");
        assert!(matches!(err, ConfigError::InvalidOption { .. }));
    }

    #[test]
    fn test_path_must_be_directory() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let file = dir.path().join("app.py");
        std::fs::write(&file, "").expect("write file");
        let file = file.to_str().expect("UTF-8 temp path").to_owned();
        let cli = parse(&["rundog", "-p", &file, "python", "app.py"]);

        let err = build_config(&cli).expect_err("file is not a directory");
        assert!(matches!(err, ConfigError::NotADirectory(_)));
        assert_eq!(err.to_string(), format!("{file} is not a directory."));
    }
}
