//! Configuração do simulador carregada a partir de `mlops-sim.toml`.
//!
//! A struct [`SimConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! A variável de ambiente `MLOPS_SIM_TIME_SCALE` tem precedência sobre o arquivo,
//! e as flags da CLI têm precedência sobre ambos.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::SimError;
use crate::state_machine::{DEFAULT_MARKER, Stage, Variant};

/// Nome do arquivo de configuração procurado no diretório atual.
pub const CONFIG_FILE: &str = "mlops-sim.toml";

/// Variável de ambiente que sobrescreve `time_scale`.
pub const TIME_SCALE_ENV: &str = "MLOPS_SIM_TIME_SCALE";

/// Configuração de nível superior carregada de `mlops-sim.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct SimConfig {
    /// Variante do pipeline a executar.
    #[serde(default)]
    pub variant: Variant,

    /// Token exigido pela validação por marcador.
    #[serde(default = "default_marker_token")]
    pub marker_token: String,

    /// Multiplicador aplicado a todos os atrasos simulados (0 desativa a espera).
    #[serde(default = "default_time_scale")]
    pub time_scale: f64,

    /// Semente do gerador aleatório; ausente significa semente a partir da entropia do sistema.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Atrasos por estágio que substituem os padrões da variante, em milissegundos.
    #[serde(default)]
    pub delays: DelayOverrides,
}

// Valor padrão para o token de validação: "customer_id".
fn default_marker_token() -> String {
    DEFAULT_MARKER.to_string()
}

// Valor padrão para a escala de tempo: 1.0 (atrasos originais).
fn default_time_scale() -> f64 {
    1.0
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            variant: Variant::default(),
            marker_token: default_marker_token(),
            time_scale: default_time_scale(),
            seed: None,
            delays: DelayOverrides::default(),
        }
    }
}

impl SimConfig {
    /// Carrega a configuração de `mlops-sim.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self, SimError> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Carrega a configuração de um caminho explícito.
    pub fn load_from(path: &Path) -> Result<Self, SimError> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<SimConfig>(&contents)?
        } else {
            Self::default()
        };

        config.apply_time_scale_env(std::env::var(TIME_SCALE_ENV).ok())?;
        config.check()?;
        Ok(config)
    }

    /// Aplica as flags globais da CLI, que têm a maior precedência.
    pub fn with_overrides(
        mut self,
        variant: Option<Variant>,
        seed: Option<u64>,
        time_scale: Option<f64>,
    ) -> Result<Self, SimError> {
        if let Some(variant) = variant {
            self.variant = variant;
        }
        if seed.is_some() {
            self.seed = seed;
        }
        if let Some(scale) = time_scale {
            self.time_scale = scale;
        }
        self.check()?;
        Ok(self)
    }

    /// Atrasos efetivos: padrões da variante, sobrescritas do arquivo e
    /// multiplicação por `time_scale`.
    pub fn effective_delays(&self) -> StageDelays {
        if self.time_scale == 0.0 {
            return StageDelays::zero();
        }
        StageDelays::for_variant(self.variant)
            .with_overrides(&self.delays)
            .scaled(self.time_scale)
    }

    // Variável de ambiente tem precedência sobre o arquivo de configuração.
    fn apply_time_scale_env(&mut self, raw: Option<String>) -> Result<(), SimError> {
        if let Some(raw) = raw
            && !raw.trim().is_empty()
        {
            self.time_scale = raw.trim().parse().map_err(|_| {
                SimError::Config(format!("{TIME_SCALE_ENV} must be a number, got '{raw}'"))
            })?;
        }
        Ok(())
    }

    fn check(&self) -> Result<(), SimError> {
        if !self.time_scale.is_finite() || self.time_scale < 0.0 {
            return Err(SimError::Config(format!(
                "time_scale must be a non-negative number, got {}",
                self.time_scale
            )));
        }
        if self.marker_token.trim().is_empty() {
            return Err(SimError::Config("marker_token must not be empty".into()));
        }
        Ok(())
    }
}

/// Entradas opcionais da tabela `[delays]`; ausentes usam o padrão da variante.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DelayOverrides {
    pub ingest: Option<u64>,
    pub validate: Option<u64>,
    pub transform: Option<u64>,
    pub version_data: Option<u64>,
    pub train: Option<u64>,
    pub evaluate: Option<u64>,
    pub version_model: Option<u64>,
    pub deploy: Option<u64>,
    pub predict: Option<u64>,
}

/// Atraso simulado por estágio, em milissegundos.
///
/// `Default` é a tabela da variante completa.
#[derive(Debug, Clone, PartialEq)]
pub struct StageDelays {
    pub ingest: u64,
    pub validate: u64,
    pub transform: u64,
    pub version_data: u64,
    pub train: u64,
    pub evaluate: u64,
    pub version_model: u64,
    pub deploy: u64,
    pub predict: u64,
}

impl Default for StageDelays {
    fn default() -> Self {
        Self {
            ingest: 1000,
            validate: 1500,
            transform: 1800,
            version_data: 2000,
            train: 3000,
            evaluate: 2500,
            version_model: 2000,
            deploy: 3000,
            predict: 1500,
        }
    }
}

impl StageDelays {
    /// Todos os estágios sem espera.
    pub fn zero() -> Self {
        Self {
            ingest: 0,
            validate: 0,
            transform: 0,
            version_data: 0,
            train: 0,
            evaluate: 0,
            version_model: 0,
            deploy: 0,
            predict: 0,
        }
    }

    /// Tabela padrão de cada variante. As variantes curtas esperam mais na
    /// ingestão e na preparação dos dados.
    pub fn for_variant(variant: Variant) -> Self {
        match variant {
            Variant::Ingestion => Self {
                ingest: 1500,
                ..Self::default()
            },
            Variant::DataPrep => Self {
                ingest: 1500,
                validate: 2000,
                transform: 2500,
                ..Self::default()
            },
            Variant::ModelRegistry | Variant::Full => Self::default(),
        }
    }

    /// Aplica as entradas presentes em `overrides`.
    pub fn with_overrides(mut self, overrides: &DelayOverrides) -> Self {
        let pairs = [
            (&mut self.ingest, overrides.ingest),
            (&mut self.validate, overrides.validate),
            (&mut self.transform, overrides.transform),
            (&mut self.version_data, overrides.version_data),
            (&mut self.train, overrides.train),
            (&mut self.evaluate, overrides.evaluate),
            (&mut self.version_model, overrides.version_model),
            (&mut self.deploy, overrides.deploy),
            (&mut self.predict, overrides.predict),
        ];
        for (slot, value) in pairs {
            if let Some(ms) = value {
                *slot = ms;
            }
        }
        self
    }

    pub fn millis(&self, stage: Stage) -> u64 {
        match stage {
            Stage::Ingest => self.ingest,
            Stage::Validate => self.validate,
            Stage::Transform => self.transform,
            Stage::VersionData => self.version_data,
            Stage::Train => self.train,
            Stage::Evaluate => self.evaluate,
            Stage::VersionModel => self.version_model,
            Stage::Deploy => self.deploy,
            Stage::Predict => self.predict,
        }
    }

    pub fn for_stage(&self, stage: Stage) -> Duration {
        Duration::from_millis(self.millis(stage))
    }

    /// Retorna uma cópia com cada atraso multiplicado por `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        let scale = |ms: u64| (ms as f64 * factor).round() as u64;
        Self {
            ingest: scale(self.ingest),
            validate: scale(self.validate),
            transform: scale(self.transform),
            version_data: scale(self.version_data),
            train: scale(self.train),
            evaluate: scale(self.evaluate),
            version_model: scale(self.version_model),
            deploy: scale(self.deploy),
            predict: scale(self.predict),
        }
    }
}
