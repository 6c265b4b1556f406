use clap::Parser;

use dirwatch::Settings;
use dirwatch::cli::commands::{init, watch};
use dirwatch::cli::{Cli, Commands};
use dirwatch::logging;

fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
    .unwrap_or_else(|e| {
        eprintln!("Configuration error: {e}");
        Settings::default()
    });

    logging::init_with_config(&config.logging);

    match cli.command {
        Commands::Init { force } => init::run_init(force),

        Commands::Config => init::run_config(&config),

        Commands::Watch {
            dirs,
            timeout_ms,
            interval_ms,
            ticks,
            recursive,
        } => {
            let options = watch::WatchOptions::from_args(
                dirs,
                timeout_ms,
                interval_ms,
                ticks,
                recursive,
                &config,
            );
            if let Err(e) = watch::run_watch(options, &config) {
                eprintln!("Error: {e:#}");
                std::process::exit(1);
            }
        }
    }
}
