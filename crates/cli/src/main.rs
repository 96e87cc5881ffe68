//! hmr CLI - push local edits into a running process

use clap::{Args, Parser, Subcommand};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod cmd;
mod config;

use config::Overrides;

/// hmr - Live source replacement over the remote debugging protocol
#[derive(Parser)]
#[command(name = "hmr")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// More logging (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch a directory and push every saved change into the remote process
    Watch {
        /// Debug endpoint: host[:port], a bare port, or a ws:// url (default: 127.0.0.1:9222)
        endpoint: Option<String>,

        #[command(flatten)]
        source: SourceArgs,

        /// Quiet interval that closes a batch, in milliseconds (default: 1000)
        #[arg(long, value_name = "MS")]
        window: Option<u64>,

        /// Push a batch at the latest this long after its first event
        #[arg(long, value_name = "MS")]
        max_wait: Option<u64>,

        /// Timeout for each remote update, in milliseconds (default: 5000)
        #[arg(long, value_name = "MS")]
        timeout: Option<u64>,

        /// Push every change of a file within a batch, not just the last
        #[arg(long)]
        no_dedupe: bool,

        /// Directory the remote process loads sources from
        ///
        /// Scripts a local `node --inspect` loads are reported by absolute
        /// path, so pass the project's absolute directory here or no file
        /// will match.
        #[arg(long, value_name = "PATH")]
        remote_root: Option<String>,
    },
    /// List the scripts loaded in the remote process
    Scripts {
        /// Debug endpoint (default: 127.0.0.1:9222)
        endpoint: Option<String>,

        #[command(flatten)]
        source: SourceArgs,

        /// Directory the remote process loads sources from
        ///
        /// Scripts a local `node --inspect` loads are reported by absolute
        /// path, so pass the project's absolute directory here or no file
        /// will match.
        #[arg(long, value_name = "PATH")]
        remote_root: Option<String>,
    },
    /// Show the effective configuration
    Config {
        #[command(flatten)]
        source: SourceArgs,

        /// Print an annotated example config file instead
        #[arg(long)]
        example: bool,
    },
}

/// Where the configuration comes from
#[derive(Args)]
struct SourceArgs {
    /// Directory to watch (default: current directory)
    #[arg(long, value_name = "DIR")]
    watch: Option<PathBuf>,

    /// Config file (default: <watch dir>/.hmr.toml when present)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "info,hmr=debug",
        _ => "debug,hmr=trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Watch {
            endpoint,
            source,
            window,
            max_wait,
            timeout,
            no_dedupe,
            remote_root,
        } => {
            let overrides = Overrides {
                endpoint,
                watch: source.watch,
                quiet_window_ms: window,
                max_wait_ms: max_wait,
                update_timeout_ms: timeout,
                no_dedupe,
                remote_root,
            };
            match cmd::load_config(source.config.as_deref(), overrides) {
                Ok((config, _)) => cmd::watch::run(config).await,
                Err(e) => Err(e),
            }
        }
        Commands::Scripts {
            endpoint,
            source,
            remote_root,
        } => {
            let overrides = Overrides {
                endpoint,
                watch: source.watch,
                remote_root,
                ..Default::default()
            };
            match cmd::load_config(source.config.as_deref(), overrides) {
                Ok((config, _)) => cmd::scripts::run(config).await,
                Err(e) => Err(e),
            }
        }
        Commands::Config { source, example } => {
            if example {
                cmd::config::run_example()
            } else {
                let overrides = Overrides {
                    watch: source.watch,
                    ..Default::default()
                };
                cmd::load_config(source.config.as_deref(), overrides)
                    .and_then(|(config, file)| cmd::config::run_show(&config, file.as_deref()))
            }
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
