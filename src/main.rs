mod cli;
mod config;
mod error;
mod runner;
mod shell;
mod simulate;
mod state_machine;
mod ui;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};
use config::SimConfig;
use runner::StageRunner;
use ui::TerminalObserver;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = SimConfig::load()?.with_overrides(
        cli.variant.map(Into::into),
        cli.seed,
        cli.time_scale,
    )?;
    let runner = StageRunner::from_config(&config);

    match cli.command {
        Command::Run {
            data,
            predict,
            until,
            json,
        } => {
            runner.set_raw_data(data).await?;
            runner.set_prediction_input(predict).await;

            let report = if json {
                runner.run_until(until.map(Into::into), &mut ()).await
            } else {
                println!("Running the {} pipeline...", config.variant);
                runner
                    .run_until(until.map(Into::into), &mut TerminalObserver::new())
                    .await
            };

            let snapshot = runner.snapshot().await;
            if json {
                println!("{}", ui::snapshot_json(&snapshot)?);
            } else {
                ui::print_report(&report, &snapshot);
            }
            if report.stopped_early() {
                std::process::exit(1);
            }
        }
        Command::Shell => {
            shell::run_shell(&runner).await?;
        }
        Command::Stages => {
            println!(
                "Stages of the {} pipeline (validation marker: {}):",
                config.variant,
                runner.snapshot().await.marker()
            );
            for row in ui::stage_table(config.variant, runner.delays()) {
                println!("{row}");
            }
        }
    }

    Ok(())
}
