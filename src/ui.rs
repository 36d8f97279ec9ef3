//! Interface de terminal do simulador: spinners e saída colorida.
//!
//! Usa as crates `indicatif` para spinners de progresso e `console` para
//! estilização com cores. O [`TerminalObserver`] acompanha visualmente
//! a execução de cada estágio no terminal.

use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::StageDelays;
use crate::error::{PipelineError, SimError};
use crate::runner::{RunReport, StageObserver};
use crate::state_machine::{
    Pipeline, PredictionClass, Stage, StatusKind, StatusMessage, Transition, Variant,
};

/// Indicador visual de progresso para a execução dos estágios no terminal.
///
/// Exibe um spinner animado enquanto o atraso simulado corre e mensagens
/// coloridas para sucesso (verde), falha (vermelho) e ciclo (amarelo).
pub struct TerminalObserver {
    // Spinner do estágio em andamento, se houver.
    pb: Option<ProgressBar>,
    // Estilo verde para mensagens de sucesso.
    green: Style,
    // Estilo vermelho para mensagens de falha.
    red: Style,
    // Estilo amarelo para ciclos e cancelamentos.
    yellow: Style,
}

impl Default for TerminalObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalObserver {
    pub fn new() -> Self {
        Self {
            pb: None,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    fn spinner(message: String) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }
}

impl StageObserver for TerminalObserver {
    fn started(&mut self, stage: Stage, pipeline: &Pipeline, _delay: Duration) {
        let text = pipeline
            .status(stage)
            .map(|s| s.text.clone())
            .unwrap_or_default();
        self.pb = Some(Self::spinner(format!("{}: {text}", stage.title())));
    }

    fn finished(
        &mut self,
        stage: Stage,
        result: &Result<Transition, PipelineError>,
        pipeline: &Pipeline,
    ) {
        if let Some(pb) = self.pb.take() {
            pb.finish_and_clear();
        }
        match result {
            Ok(Transition::Advanced { .. }) => {
                let text = status_text(pipeline.status(stage));
                println!("  {} {}: {text}", self.green.apply_to("✓"), stage.title());
            }
            Ok(Transition::Cycled { .. }) => {
                let text = status_text(pipeline.status(stage));
                println!("  {} {}: {text}", self.green.apply_to("✓"), stage.title());
                println!(
                    "  {} Cycle complete, stages cleared for the next run",
                    self.yellow.apply_to("↻")
                );
            }
            Ok(Transition::Stalled { reason, .. }) => {
                println!("  {} {}: {reason}", self.red.apply_to("✗"), stage.title());
            }
            Err(PipelineError::Cancelled { .. }) => {
                println!("  {} {}: cancelled", self.yellow.apply_to("↻"), stage.title());
            }
            Err(err) => {
                println!("  {} {}: {err}", self.red.apply_to("✗"), stage.title());
            }
        }
    }
}

fn status_text(status: Option<&StatusMessage>) -> &str {
    status.map(|s| s.text.as_str()).unwrap_or_default()
}

/// Imprime o estado atual de cada estágio com cor conforme o tipo de status.
pub fn print_status(pipeline: &Pipeline) {
    let bold = Style::new().bold();
    println!(
        "{} {} ({} pipeline, run {}, epoch {})",
        bold.apply_to("State:"),
        pipeline.state(),
        pipeline.variant(),
        pipeline.run_id(),
        pipeline.epoch()
    );
    if let Some(stage) = pipeline.in_flight() {
        println!("  {} {}", Style::new().cyan().apply_to("running:"), stage.title());
    }
    for &stage in pipeline.variant().stages() {
        let mark = if pipeline.is_complete(stage) { "●" } else { "○" };
        let line = match pipeline.status(stage) {
            Some(status) => styled(status),
            None => String::new(),
        };
        println!("  {mark} {:<15} {line}", stage.command());
    }

    let dim = Style::new().dim();
    if !pipeline.raw_data().is_empty() {
        println!("  {} {}", dim.apply_to("raw data:"), preview(pipeline.raw_data()));
    }
    if !pipeline.transformed().is_empty() {
        println!("  {} {}", dim.apply_to("transformed:"), preview(pipeline.transformed()));
    }
    if let Some(reference) = pipeline.data_reference() {
        println!("  {} {reference}", dim.apply_to("data reference:"));
    }
    if let Some(model_id) = pipeline.model_id() {
        println!("  {} {model_id}", dim.apply_to("model:"));
    }
    if let Some(metrics) = pipeline.metrics() {
        println!(
            "  {} accuracy={} precision={} recall={} f1={} roc_auc={}",
            dim.apply_to("metrics:"),
            metrics.accuracy,
            metrics.precision,
            metrics.recall,
            metrics.f1_score,
            metrics.roc_auc
        );
    }
    if let Some(model) = pipeline.current_model() {
        println!("  {} {} ({})", dim.apply_to("current model:"), model.version, model.artifact_uri);
    }
    if let Some(endpoint) = pipeline.endpoint() {
        println!("  {} {endpoint}", dim.apply_to("endpoint:"));
    }
    if !pipeline.prediction_input().is_empty() {
        println!("  {} {}", dim.apply_to("prediction input:"), pipeline.prediction_input());
    }
    if let Some(prediction) = pipeline.prediction() {
        let style = match prediction.class {
            PredictionClass::Positive => Style::new().green(),
            PredictionClass::Negative => Style::new().red(),
        };
        println!("  {}", style.apply_to(prediction));
    }
}

/// First line of a payload, cut to 60 characters.
fn preview(text: &str) -> String {
    let mut lines = text.lines();
    let first = lines.next().unwrap_or_default();
    let mut out: String = first.chars().take(60).collect();
    let cut = first.chars().count() > 60;
    let more_lines = lines.any(|line| !line.trim().is_empty());
    if cut || more_lines {
        out.push('…');
    }
    out
}

fn styled(status: &StatusMessage) -> String {
    let style = match status.kind {
        StatusKind::Success => Style::new().green(),
        StatusKind::Error => Style::new().red(),
        StatusKind::Info => Style::new().cyan(),
    };
    style.apply_to(&status.text).to_string()
}

/// Lista as versões de dados e de modelos registradas.
pub fn print_versions(pipeline: &Pipeline) {
    let header = Style::new().bold();
    println!("{}", header.apply_to("─── Data Versions ───"));
    if pipeline.data_versions().is_empty() {
        println!("  No data versions registered yet.");
    }
    for v in pipeline.data_versions() {
        println!("  {}  {}", v.id, v.timestamp.format("%Y-%m-%d %H:%M:%S"));
        println!("      reference: {}", v.reference);
        println!("      {}", v.description);
    }

    if !pipeline.variant().contains(Stage::VersionModel) {
        return;
    }
    println!("{}", header.apply_to("─── Model Versions ───"));
    if pipeline.model_versions().is_empty() {
        println!("  No model versions registered yet.");
    }
    for m in pipeline.model_versions() {
        println!(
            "  {} {}  {}",
            m.version,
            m.model_id,
            m.timestamp.format("%Y-%m-%d %H:%M:%S")
        );
        println!("      artifact: {}", m.artifact_uri);
        println!("      trained on: {}", m.trained_on_data_version);
        println!(
            "      accuracy={} f1={} roc_auc={}",
            m.metrics.accuracy, m.metrics.f1_score, m.metrics.roc_auc
        );
    }
}

/// Tabela dos estágios da variante, com pré-condição e atraso.
pub fn stage_table(variant: Variant, delays: &StageDelays) -> Vec<String> {
    variant
        .stages()
        .iter()
        .enumerate()
        .map(|(idx, &stage)| {
            let requires = variant
                .predecessor(stage)
                .map(|prev| format!("{} complete", prev.command()))
                .unwrap_or_else(|| "raw data entered".to_string());
            format!(
                "{:>2}. {:<15} {:<22} requires {:<24} {:>6}ms",
                idx + 1,
                stage.command(),
                stage.title(),
                requires,
                delays.millis(stage)
            )
        })
        .collect()
}

/// Resumo final de uma execução `run`.
pub fn print_report(report: &RunReport, pipeline: &Pipeline) {
    println!();
    let style = if report.stopped_early() {
        Style::new().red().bold()
    } else {
        Style::new().green().bold()
    };
    println!("{}", style.apply_to("─── Pipeline Summary ───"));
    println!("  run:    {}", pipeline.run_id());
    println!("  stages: {} completed", report.transitions.len());
    if let Some(err) = &report.halted {
        println!("  halted at '{}': {err}", err.stage());
    }
    print_status(pipeline);
}

/// Serializa o snapshot do pipeline em JSON formatado.
pub fn snapshot_json(pipeline: &Pipeline) -> Result<String, SimError> {
    Ok(serde_json::to_string_pretty(pipeline)?)
}
