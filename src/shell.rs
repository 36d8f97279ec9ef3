//! Line-oriented control surface: one command per line, one stage per command.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::error::SimError;
use crate::runner::StageRunner;
use crate::state_machine::Stage;
use crate::ui::{self, TerminalObserver};

const HELP: &str = "\
commands:
  data <text>      set raw data to ingest (\\n starts a new line)
  input <text>     set the prediction input
  ingest | validate | transform | version-data | train
  evaluate | version-model | deploy | predict
  status           show every stage
  versions         list registered data and model versions
  reset            clear the pipeline, including version lists
  help             show this text
  quit             leave the shell";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Data(String),
    Input(String),
    Run(Stage),
    Status,
    Versions,
    Reset,
    Help,
    Quit,
    Empty,
}

pub fn parse_line(line: &str) -> Result<ShellCommand, SimError> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_lowercase().as_str() {
        "" => ShellCommand::Empty,
        "data" => ShellCommand::Data(rest.replace("\\n", "\n")),
        "input" => ShellCommand::Input(rest.to_string()),
        "status" => ShellCommand::Status,
        "versions" => ShellCommand::Versions,
        "reset" => ShellCommand::Reset,
        "help" | "?" => ShellCommand::Help,
        "quit" | "exit" => ShellCommand::Quit,
        other => ShellCommand::Run(other.parse()?),
    };
    Ok(command)
}

/// Reads commands from stdin until `quit` or end of input.
pub async fn run_shell(runner: &StageRunner) -> Result<(), SimError> {
    println!("{HELP}");
    run_script(runner, BufReader::new(tokio::io::stdin())).await
}

pub async fn run_script(
    runner: &StageRunner,
    reader: impl AsyncBufRead + Unpin,
) -> Result<(), SimError> {
    let mut lines = reader.lines();
    let mut observer = TerminalObserver::new();

    while let Some(line) = lines.next_line().await? {
        let command = match parse_line(&line) {
            Ok(command) => command,
            Err(err) => {
                println!("{err} (type `help` for commands)");
                continue;
            }
        };
        debug!(?command, "shell command");

        match command {
            ShellCommand::Empty => {}
            ShellCommand::Data(data) => {
                if let Err(err) = runner.set_raw_data(data).await {
                    println!("{err}");
                }
            }
            ShellCommand::Input(input) => runner.set_prediction_input(input).await,
            ShellCommand::Run(stage) => {
                // Errors are already shown by the observer.
                let _ = runner.run_stage(stage, &mut observer).await;
            }
            ShellCommand::Status => ui::print_status(&runner.snapshot().await),
            ShellCommand::Versions => ui::print_versions(&runner.snapshot().await),
            ShellCommand::Reset => {
                runner.reset().await;
                println!("Pipeline reset. Ready for a new run.");
            }
            ShellCommand::Help => println!("{HELP}"),
            ShellCommand::Quit => break,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StageDelays;
    use crate::state_machine::{DEFAULT_MARKER, Pipeline, State, Variant};

    #[test]
    fn parses_stage_words() {
        assert_eq!(parse_line("ingest").unwrap(), ShellCommand::Run(Stage::Ingest));
        assert_eq!(
            parse_line("  Version-Model ").unwrap(),
            ShellCommand::Run(Stage::VersionModel)
        );
        assert!(matches!(parse_line("launch"), Err(SimError::UnknownStage(_))));
    }

    #[test]
    fn parses_data_with_escaped_newlines() {
        assert_eq!(
            parse_line("data customer_id,name\\n1,Alice").unwrap(),
            ShellCommand::Data("customer_id,name\n1,Alice".into())
        );
        assert_eq!(
            parse_line("input very good").unwrap(),
            ShellCommand::Input("very good".into())
        );
    }

    #[test]
    fn parses_control_words() {
        assert_eq!(parse_line("").unwrap(), ShellCommand::Empty);
        assert_eq!(parse_line("status").unwrap(), ShellCommand::Status);
        assert_eq!(parse_line("exit").unwrap(), ShellCommand::Quit);
        assert_eq!(parse_line("?").unwrap(), ShellCommand::Help);
    }

    #[tokio::test]
    async fn script_drives_the_pipeline() {
        let runner = StageRunner::new(
            Pipeline::new(Variant::Full, DEFAULT_MARKER),
            StageDelays::zero(),
            Some(1),
        );
        let script = "\
data customer_id,name\\n1,Alice
ingest
validate
transform
bogus
version-data
status
quit
train
";
        run_script(&runner, script.as_bytes()).await.unwrap();

        let snapshot = runner.snapshot().await;
        assert_eq!(snapshot.state(), State::Versioned);
        assert_eq!(snapshot.data_versions().len(), 1);
        // `train` came after `quit` and never ran.
        assert!(snapshot.model_id().is_none());
    }

    #[tokio::test]
    async fn script_reset_clears_versions() {
        let runner = StageRunner::new(
            Pipeline::new(Variant::Ingestion, DEFAULT_MARKER),
            StageDelays::zero(),
            None,
        );
        let script = "data a\ningest\nversion-data\ndata b\ningest\nversion-data\n";
        run_script(&runner, script.as_bytes()).await.unwrap();
        assert_eq!(runner.snapshot().await.data_versions().len(), 2);

        run_script(&runner, "reset\n".as_bytes()).await.unwrap();
        assert!(runner.snapshot().await.data_versions().is_empty());
    }
}
