// src/main.rs
use std::path::Path;
use std::process::exit;
use anyhow::Result;
use clap::Parser;
use tracing::{info, error, Level};

use mangascrape::cli::{print_report, App, Args, Commands, RunOptions};
use mangascrape::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .init();

    if args.verbose {
        info!("Verbose mode enabled");
    }

    match args.command {
        Some(Commands::Init { force }) => {
            let path = args.config.clone().unwrap_or_else(Config::default_path);
            if let Err(e) = Config::init(&path, force) {
                error!("Failed to initialize configuration: {}", e);
                exit(1);
            }
            println!("Configuration initialized at {}", path.display());
        }
        Some(Commands::Sources) => {
            let app = load_app(args.config.as_deref());
            let orchestrator = app.orchestrator()?;
            for source in orchestrator.sources() {
                println!("{:<12} {}", source.name(), source.description());
            }
        }
        None => {
            let app = load_app(args.config.as_deref());
            let options = RunOptions {
                sites: args.sites,
                workers: args.workers,
                out: args.out,
                strict: args.strict,
            };

            let report = match app.run(&options).await {
                Ok(report) => report,
                Err(e) => {
                    error!("Run failed: {}", e);
                    exit(1);
                }
            };

            print_report(&report);

            let code = app.exit_code(&report, options.strict);
            if code != 0 {
                exit(code);
            }
        }
    }

    Ok(())
}

/// Load configuration or exit with status 1
fn load_app(config_path: Option<&Path>) -> App {
    match Config::load(config_path) {
        Ok(config) => App::new(config),
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            exit(1);
        }
    }
}
