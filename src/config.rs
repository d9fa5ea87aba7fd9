use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Connection settings for the OpenAI-compatible text generation endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// OpenAI API endpoint
    #[serde(default = "default_api_endpoint")]
    pub api_endpoint: String,
    /// Environment variable name containing the API key
    #[serde(default = "default_env_var_api_key")]
    pub env_var_api_key: String,
    /// Model used for judging and for the prompt builder agents
    #[serde(default = "default_model")]
    pub model: String,
    /// Model used to pull a numeric score out of judging reasoning
    #[serde(default)]
    pub scorer_model: Option<String>,
    /// Temperature for judging and builder calls (0.0 to 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Rate limit for API requests per second
    #[serde(default = "default_rate_limit")]
    pub rate_limit_rps: f64,
}

impl LlmConfig {
    pub fn scorer_model(&self) -> &str {
        self.scorer_model.as_deref().unwrap_or(&self.model)
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_endpoint: default_api_endpoint(),
            env_var_api_key: default_env_var_api_key(),
            model: default_model(),
            scorer_model: None,
            temperature: default_temperature(),
            rate_limit_rps: default_rate_limit(),
        }
    }
}

/// Settings for one validation run
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ValidationConfig {
    /// JSON file holding the pool of test outputs to sample from
    pub test_outputs_path: PathBuf,
    /// Number of test outputs drawn for the run
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
    /// Divisor mapping an AI score gap onto the human -1..1 axis
    #[serde(default = "default_normalization_divisor")]
    pub normalization_divisor: f64,
    /// Inline judging rubric
    #[serde(default)]
    pub rubric: Option<String>,
    /// File holding the judging rubric
    #[serde(default)]
    pub rubric_path: Option<PathBuf>,
    /// Quality dimension shown to the human judge (e.g. "witty")
    #[serde(default = "default_criteria")]
    pub criteria: String,
    /// Close the human session as soon as AI scoring finishes
    #[serde(default)]
    pub close_judge_on_scoring_complete: bool,
    /// Optional local path to store the report as JSON
    #[serde(default)]
    pub storage_path: Option<String>,
}

impl ValidationConfig {
    /// Resolve the rubric from the inline value or the rubric file
    pub fn load_rubric(&self) -> Result<String> {
        if let Some(rubric) = &self.rubric {
            return Ok(rubric.clone());
        }
        match &self.rubric_path {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read rubric file: {}", path.display())),
            None => anyhow::bail!("No rubric configured: set `rubric` or `rubric_path`, or use --build"),
        }
    }
}

/// Settings for the interactive prompt builder
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BuilderConfig {
    /// Critic/questioner rounds before prompt generation
    #[serde(default = "default_max_loops")]
    pub max_loops: usize,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            max_loops: default_max_loops(),
        }
    }
}

fn default_api_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_env_var_api_key() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_rate_limit() -> f64 {
    10.0
}

fn default_sample_size() -> usize {
    15
}

fn default_normalization_divisor() -> f64 {
    7.0
}

fn default_criteria() -> String {
    "witty".to_string()
}

fn default_max_loops() -> usize {
    2
}

/// Root configuration of a run file
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    pub validation: ValidationConfig,
    #[serde(default)]
    pub builder: BuilderConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the run cannot work with
    fn validate(&self) -> Result<()> {
        let divisor = self.validation.normalization_divisor;
        if !divisor.is_finite() || divisor <= 0.0 {
            anyhow::bail!("normalization_divisor must be a positive number, got {}", divisor);
        }
        if !self.llm.rate_limit_rps.is_finite() {
            anyhow::bail!("rate_limit_rps must be finite");
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            anyhow::bail!("temperature must be within 0.0..=2.0, got {}", self.llm.temperature);
        }
        Ok(())
    }
}
