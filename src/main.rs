//! Mictape CLI entry point

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use mictape::cli::{
    app::{load_merged_config, run_record, EXIT_ERROR, EXIT_USAGE_ERROR},
    args::{parse_duration, Cli, Commands, RecordOptions},
    config_cmd::handle_config_command,
    presenter::Presenter,
};
use mictape::domain::config::AppConfig;
use mictape::domain::recording::SessionConstraints;
use mictape::infrastructure::XdgConfigStore;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let presenter = Presenter::new();

    // Handle subcommands
    if let Some(Commands::Config { action }) = cli.command {
        let store = XdgConfigStore::new();
        if let Err(e) = handle_config_command(action, &store, &presenter).await {
            presenter.error(&e.to_string());
            return ExitCode::from(EXIT_ERROR);
        }
        return ExitCode::SUCCESS;
    }

    // Build CLI config from args
    let cli_config = AppConfig {
        sample_rate: cli.sample_rate,
        bit_rate: cli.bit_rate,
        duration: cli.duration.clone(),
        output: cli.output.clone(),
    };

    // Merge config
    let config = load_merged_config(cli_config).await;

    let duration = match config.duration.as_deref() {
        Some(s) => match parse_duration(s) {
            Ok(d) => d,
            Err(e) => {
                presenter.error(&e);
                return ExitCode::from(EXIT_USAGE_ERROR);
            }
        },
        None => std::time::Duration::from_secs(10),
    };

    let constraints = match SessionConstraints::new(
        config.sample_rate_or_default(),
        config.bit_rate_or_default(),
    ) {
        Ok(c) => c,
        Err(e) => {
            presenter.error(&e.to_string());
            return ExitCode::from(EXIT_USAGE_ERROR);
        }
    };

    let options = RecordOptions {
        duration,
        constraints,
        output: PathBuf::from(config.output.as_deref().unwrap_or("recording.ogg")),
        pause_demo: cli.pause_demo,
        synth: cli.synth,
    };

    run_record(options).await
}
