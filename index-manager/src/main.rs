use std::process::ExitCode;

use anyhow::{bail, Result};
use chrono::SecondsFormat;
use clap::Parser;
use tracing::{error, info, warn};

use index_manager::telemetry::init_tracing;
use index_manager::{AppConfig, Cli, Dependencies};
use index_manager_lifecycle::{ActionStatus, RunReport};

/// Failed record keys printed per action before truncating.
const MAX_LISTED_FAILURES: usize = 20;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let mut config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    init_tracing(config.log_format);
    cli.apply_overrides(&mut config);

    match run(&cli, &config).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = %e, "Index manager failed");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli, config: &AppConfig) -> Result<bool> {
    if !cli.has_actions() {
        bail!("nothing to do; pass at least one of --delete, --create or --populate");
    }

    let request = cli.run_request(&config.index_name);
    let dependencies = Dependencies::new(config, cli.orchestrator_config()).await?;

    let cancel = dependencies.orchestrator.cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received shutdown signal, cancelling run");
            cancel.cancel();
        }
    });

    info!(index = %request.index, "Running index manager");
    let report = dependencies.orchestrator.run(&request).await?;
    print_report(&report);

    Ok(report.is_success())
}

fn print_report(report: &RunReport) {
    println!(
        "Run {} on index '{}' started {} ({} ms)",
        report.run_id,
        report.index,
        report.started_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        report.elapsed_ms()
    );

    for action in &report.actions {
        println!("  {:<9} {}", action.action, action.status);

        if let ActionStatus::Loaded(result) = &action.status {
            let failed = result.failed_keys();
            for key in failed.iter().take(MAX_LISTED_FAILURES) {
                println!("            failed record {}", key);
            }
            if failed.len() > MAX_LISTED_FAILURES {
                println!(
                    "            ... and {} more",
                    failed.len() - MAX_LISTED_FAILURES
                );
            }
        }
    }

    let outcome = if report.is_success() { "succeeded" } else { "did not succeed" };
    println!("Run {}", outcome);
}
