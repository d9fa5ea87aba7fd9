use crate::analysis::{CorrelationAnalyzer, best_fit_line, round_for_display};
use crate::batch_scorer::{self, BatchEvent, BatchScorer, ScoringError};
use crate::models::{
    BatchScoreRecord, PairwiseJudgment, RelativeScore, Rubric, TestItem, ValidationReport,
};
use crate::normalizer::ScoreNormalizer;
use crate::pairwise::{PairPresentation, PairwiseJudgeProtocol, ProtocolState};
use async_trait::async_trait;

/// What the human did with the pair on screen
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    /// Commit a judgment and move to the next pair
    Record(RelativeScore),
    /// Move the slider; the same pair is presented again
    Slide(RelativeScore),
    Abandon,
}

/// The human side of a validation run
#[async_trait]
pub trait JudgmentSource: Send {
    async fn judge(&mut self, pair: &PairPresentation<'_>, criteria: &str) -> Decision;
}

/// Runs AI scoring and human judging over the same sample and joins the results
pub struct ValidationOrchestrator {
    scorer: BatchScorer,
    normalizer: ScoreNormalizer,
    rubric: Rubric,
    close_judge_on_scoring_complete: bool,
}

impl ValidationOrchestrator {
    pub fn new(scorer: BatchScorer, rubric: Rubric) -> Self {
        Self {
            scorer,
            normalizer: ScoreNormalizer::default(),
            rubric,
            close_judge_on_scoring_complete: false,
        }
    }

    pub fn with_normalizer(mut self, normalizer: ScoreNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// End the human session as soon as scoring completes instead of waiting for it
    pub fn close_judge_on_scoring_complete(mut self, close: bool) -> Self {
        self.close_judge_on_scoring_complete = close;
        self
    }

    /// Validate the rubric against `sample`.
    ///
    /// Scoring and judging proceed independently. The report is produced once
    /// scoring has completed and the human has either judged every pair or
    /// abandoned the session. A scoring failure is returned immediately,
    /// without waiting for the human.
    pub async fn run<S, F>(
        &self,
        sample: Vec<TestItem>,
        source: &mut S,
        observe: F,
    ) -> Result<ValidationReport, ScoringError>
    where
        S: JudgmentSource + ?Sized,
        F: FnMut(&BatchEvent),
    {
        tracing::info!(sample = sample.len(), criteria = %self.rubric.criteria, "Validation run started");

        let events = self.scorer.run(&self.rubric.content, sample.clone());
        let mut protocol = PairwiseJudgeProtocol::new(sample.clone());
        protocol.start();

        let batch_scores = {
            let scoring = batch_scorer::observe_until_complete(events, observe);
            let judging = drive_judging(&mut protocol, source, &self.rubric.criteria);
            tokio::pin!(scoring);
            tokio::pin!(judging);

            let mut scores: Option<Vec<BatchScoreRecord>> = None;
            let mut judging_done = false;
            loop {
                tokio::select! {
                    result = &mut scoring, if scores.is_none() => {
                        let records = result?;
                        if judging_done || self.close_judge_on_scoring_complete {
                            break records;
                        }
                        scores = Some(records);
                    }
                    () = &mut judging, if !judging_done => {
                        judging_done = true;
                        if let Some(records) = scores.take() {
                            break records;
                        }
                    }
                }
            }
        };

        let judge_completed = protocol.state() == ProtocolState::Complete;
        let judgments = protocol.close();
        Ok(self.build_report(sample, batch_scores, judgments, judge_completed))
    }

    /// Normalize every judgment against the scores and summarise the survivors
    pub fn build_report(
        &self,
        sample: Vec<TestItem>,
        batch_scores: Vec<BatchScoreRecord>,
        judgments: Vec<PairwiseJudgment>,
        judge_completed: bool,
    ) -> ValidationReport {
        let comparisons = self.normalizer.normalize_all(&judgments, &batch_scores);
        let statistics = CorrelationAnalyzer.analyze(&comparisons);
        let best_fit_line = statistics.as_ref().map(best_fit_line).unwrap_or_default();

        tracing::info!(
            judgments = judgments.len(),
            comparisons = comparisons.len(),
            judge_completed,
            "Validation results ready"
        );

        ValidationReport {
            rubric: self.rubric.content.clone(),
            criteria: self.rubric.criteria.clone(),
            prompt: self.rubric.prompt.clone(),
            sample,
            batch_scores,
            judgments,
            comparisons,
            rounded_statistics: statistics.as_ref().map(round_for_display),
            statistics,
            best_fit_line,
            judge_completed,
        }
    }
}

/// Present pairs until the protocol completes or the source gives up
async fn drive_judging<S>(protocol: &mut PairwiseJudgeProtocol, source: &mut S, criteria: &str)
where
    S: JudgmentSource + ?Sized,
{
    loop {
        let decision = match protocol.current_pair() {
            Some(pair) => source.judge(&pair, criteria).await,
            None => return,
        };

        let outcome = match decision {
            Decision::Record(value) => protocol.record_judgment(value).map(|_| ()),
            Decision::Slide(value) => protocol.set_pending(value),
            Decision::Abandon => {
                protocol.close();
                return;
            }
        };
        if let Err(error) = outcome {
            tracing::warn!(%error, "Judgment rejected");
            return;
        }
    }
}
