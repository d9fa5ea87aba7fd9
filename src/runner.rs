use crate::batch_scorer::{BatchEvent, BatchScorer};
use crate::builder::PromptBuilder;
use crate::config::Config;
use crate::console::{self, ConsoleJudge};
use crate::llm::{Collaborator, OpenAiCollaborator};
use crate::models::{Rubric, ValidationReport};
use crate::normalizer::ScoreNormalizer;
use crate::orchestrator::{JudgmentSource, ValidationOrchestrator};
use crate::sampler;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

/// Main runner that wires configuration, the collaborator and the terminal together
pub struct Runner {
    config: Config,
    collaborator: Arc<dyn Collaborator>,
    verbose: bool,
}

impl Runner {
    /// Create a runner talking to the configured OpenAI-compatible endpoint
    pub fn new(config: Config, verbose: bool) -> Result<Self> {
        let collaborator = OpenAiCollaborator::from_config(&config.llm)?;
        Ok(Self::with_collaborator(config, Arc::new(collaborator), verbose))
    }

    pub fn with_collaborator(config: Config, collaborator: Arc<dyn Collaborator>, verbose: bool) -> Self {
        Self {
            config,
            collaborator,
            verbose,
        }
    }

    /// Validate a rubric with the user judging on the terminal.
    ///
    /// With `build` the prompt builder runs first and its selection becomes the rubric.
    pub async fn run_interactive(&self, build: bool) -> Result<ValidationReport> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let rubric = if build {
            self.build_rubric(&mut lines).await?
        } else {
            self.configured_rubric()?
        };

        let mut judge = ConsoleJudge::from_lines(lines);
        self.run(&rubric, &mut judge).await
    }

    /// Rubric and criteria from the run file
    pub fn configured_rubric(&self) -> Result<Rubric> {
        let validation = &self.config.validation;
        Ok(Rubric::new(validation.load_rubric()?, validation.criteria.as_str()))
    }

    /// Run the builder dialogue; the selected prompt and its criteria replace the configured ones
    pub async fn build_rubric<R: AsyncBufRead + Unpin>(&self, lines: &mut Lines<R>) -> Result<Rubric> {
        let mut builder = PromptBuilder::new(Arc::clone(&self.collaborator), self.config.builder.max_loops);
        let selected = console::run_builder(&mut builder, lines).await?;
        if self.verbose {
            println!("Using '{}' ({}) as the rubric", selected.title, selected.approach);
        }
        Ok(selected.into())
    }

    /// Sample the test outputs, run the validation and store the report if configured
    pub async fn run<S>(&self, rubric: &Rubric, judge: &mut S) -> Result<ValidationReport>
    where
        S: JudgmentSource + ?Sized,
    {
        let validation = &self.config.validation;
        let pool = sampler::load_test_outputs(&validation.test_outputs_path)?;
        let sample = sampler::sample(&pool, validation.sample_size, &mut rand::thread_rng());
        tracing::info!(pool = pool.len(), sample = sample.len(), "Test outputs sampled");

        let orchestrator = ValidationOrchestrator::new(BatchScorer::new(Arc::clone(&self.collaborator)), rubric.clone())
            .with_normalizer(ScoreNormalizer::new(validation.normalization_divisor))
            .close_judge_on_scoring_complete(validation.close_judge_on_scoring_complete);

        let verbose = self.verbose;
        let report = orchestrator
            .run(sample, judge, |event: &BatchEvent| {
                if verbose || event.is_terminal() {
                    console::print_progress(event);
                }
            })
            .await
            .context("AI scoring failed")?;

        self.store_results_if_configured(&report)?;
        Ok(report)
    }

    /// Store the report if a storage path is configured
    fn store_results_if_configured(&self, report: &ValidationReport) -> Result<()> {
        if let Some(storage_path) = &self.config.validation.storage_path {
            if self.verbose {
                println!("Storing results to {}", storage_path);
            }
            self.store_results(report, storage_path)?;
        }
        Ok(())
    }

    /// Store results to a JSON file
    fn store_results(&self, report: &ValidationReport, path: &str) -> Result<()> {
        let json_content = self.serialize_results(report)?;
        self.ensure_directory_exists(path)?;
        self.write_results_file(path, &json_content)?;
        self.log_storage_success(path);

        Ok(())
    }

    fn serialize_results(&self, report: &ValidationReport) -> Result<String> {
        serde_json::to_string_pretty(report).context("Failed to serialize results to JSON")
    }

    /// Ensure the directory for the results file exists
    fn ensure_directory_exists(&self, path: &str) -> Result<()> {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        Ok(())
    }

    fn write_results_file(&self, path: &str, content: &str) -> Result<()> {
        std::fs::write(path, content).with_context(|| format!("Failed to write results to: {}", path))
    }

    fn log_storage_success(&self, path: &str) {
        tracing::info!(path, "Results stored");
        eprintln!("Results stored to: {}", path);
    }
}
