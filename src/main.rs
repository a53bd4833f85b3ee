mod cli;
mod engine;
mod error;
mod model;
mod orchestrator;
mod report;
mod storage;
mod text_summary;
mod track;
#[cfg(feature = "tui")]
mod tui;

use anyhow::Result;
use clap::Parser;

/// Logs go to stderr so `--json` output on stdout stays machine-readable.
/// The TUI owns the terminal, so it only logs when RUST_LOG asks for it.
fn init_logging(args: &cli::Cli) {
    let is_tui = !(args.silent || args.json || args.text);
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env();
    if is_tui && env_filter.is_err() {
        return;
    }
    let default_level = if args.silent {
        "stellar_evolve=error"
    } else {
        "stellar_evolve=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            env_filter.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let is_silent = args.silent;
    let is_non_tui = args.silent || args.json || args.text;
    init_logging(&args);

    match cli::run(args).await {
        Ok(ok) => {
            // Error reports still print normally but exit non-zero for scripts.
            if !ok {
                std::process::exit(1);
            }
            if is_non_tui {
                std::process::exit(0);
            }
            Ok(())
        }
        Err(e) => {
            if is_silent {
                println!("{}", e);
                std::process::exit(1);
            } else {
                Err(e)
            }
        }
    }
}
