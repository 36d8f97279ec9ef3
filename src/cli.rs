//! Interface de linha de comando do simulador baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (run, shell, stages)
//! e flags globais (--variant, --seed, --time-scale, --verbose).

use clap::{Parser, Subcommand, ValueEnum};

use crate::state_machine::{Stage, Variant};

/// Dados de exemplo usados quando `--data` não é informado.
pub const SAMPLE_DATA: &str =
    "customer_id,name,email,amount\n1,Alice,alice@example.com,100.50\n2,Bob,bob@example.com,75.00";

/// Entrada de exemplo usada quando `--predict` não é informado.
pub const SAMPLE_PREDICTION_INPUT: &str = "The checkout experience was good";

/// mlops-sim: simulador de pipeline MLOps, da ingestão à predição.
#[derive(Debug, Parser)]
#[command(name = "mlops-sim", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Variante do pipeline a simular.
    #[arg(long, global = true)]
    pub variant: Option<VariantArg>,

    /// Semente do gerador aleatório, para execuções reprodutíveis.
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Multiplicador dos atrasos simulados (0 executa sem esperar).
    #[arg(long, global = true)]
    pub time_scale: Option<f64>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Argumento de variante aceito pela CLI, mapeado para [`Variant`] internamente.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum VariantArg {
    /// Ingestão e versionamento.
    Ingestion,
    /// Ingestão, validação, transformação e versionamento.
    DataPrep,
    /// Preparação de dados seguida de treino, avaliação e registro do modelo.
    ModelRegistry,
    /// Pipeline completo até implantação e predição.
    Full,
}

impl From<VariantArg> for Variant {
    fn from(arg: VariantArg) -> Self {
        match arg {
            VariantArg::Ingestion => Variant::Ingestion,
            VariantArg::DataPrep => Variant::DataPrep,
            VariantArg::ModelRegistry => Variant::ModelRegistry,
            VariantArg::Full => Variant::Full,
        }
    }
}

/// Estágio aceito pela CLI, mapeado para [`Stage`] internamente.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StageArg {
    Ingest,
    Validate,
    Transform,
    VersionData,
    Train,
    Evaluate,
    VersionModel,
    Deploy,
    Predict,
}

impl From<StageArg> for Stage {
    fn from(arg: StageArg) -> Self {
        match arg {
            StageArg::Ingest => Stage::Ingest,
            StageArg::Validate => Stage::Validate,
            StageArg::Transform => Stage::Transform,
            StageArg::VersionData => Stage::VersionData,
            StageArg::Train => Stage::Train,
            StageArg::Evaluate => Stage::Evaluate,
            StageArg::VersionModel => Stage::VersionModel,
            StageArg::Deploy => Stage::Deploy,
            StageArg::Predict => Stage::Predict,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Executa os estágios da variante em ordem.
    Run {
        /// Dados brutos a ingerir.
        #[arg(long, default_value = SAMPLE_DATA)]
        data: String,

        /// Entrada enviada ao endpoint simulado no estágio de predição.
        #[arg(long, default_value = SAMPLE_PREDICTION_INPUT)]
        predict: String,

        /// Para após este estágio.
        #[arg(long)]
        until: Option<StageArg>,

        /// Imprime o snapshot final em JSON em vez do resumo.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Abre um shell interativo para acionar estágios um a um.
    Shell,

    /// Lista os estágios da variante com pré-condições e atrasos.
    Stages,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_run_subcommand() {
        let cli = Cli::parse_from([
            "mlops-sim",
            "run",
            "--data",
            "customer_id,name",
            "--until",
            "version-data",
        ]);
        match cli.command {
            Command::Run {
                data,
                predict,
                until,
                json,
            } => {
                assert_eq!(data, "customer_id,name");
                assert_eq!(predict, SAMPLE_PREDICTION_INPUT);
                assert!(matches!(until, Some(StageArg::VersionData)));
                assert!(!json);
            }
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn cli_run_defaults_to_sample_data() {
        let cli = Cli::parse_from(["mlops-sim", "run"]);
        match cli.command {
            Command::Run { data, .. } => assert!(data.starts_with("customer_id,")),
            _ => panic!("expected Run command"),
        }
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from([
            "mlops-sim",
            "--variant",
            "data-prep",
            "--seed",
            "42",
            "--time-scale",
            "0",
            "--verbose",
            "stages",
        ]);
        assert!(cli.verbose);
        assert!(matches!(cli.variant, Some(VariantArg::DataPrep)));
        assert_eq!(cli.seed, Some(42));
        assert_eq!(cli.time_scale, Some(0.0));
        assert!(matches!(cli.command, Command::Stages));
    }

    #[test]
    fn stage_arg_maps_to_stage() {
        assert_eq!(Stage::from(StageArg::VersionModel), Stage::VersionModel);
        assert_eq!(Variant::from(VariantArg::ModelRegistry), Variant::ModelRegistry);
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}
