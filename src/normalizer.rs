use crate::models::{BatchScoreRecord, NormalizedComparison, PairwiseJudgment};

/// Divisor used when none is configured
pub const DEFAULT_DIVISOR: f64 = 7.0;

/// Maps the AI's absolute scores for a pair onto the human relative scale.
///
/// `ai_judgement = (score_b - score_a) / divisor`. The divisor is a tunable
/// stretch factor, not derived from the score bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreNormalizer {
    divisor: f64,
}

impl Default for ScoreNormalizer {
    fn default() -> Self {
        Self {
            divisor: DEFAULT_DIVISOR,
        }
    }
}

impl ScoreNormalizer {
    /// `divisor` must be positive and finite; config loading checks this
    pub fn new(divisor: f64) -> Self {
        debug_assert!(divisor.is_finite() && divisor > 0.0);
        Self { divisor }
    }

    pub fn divisor(&self) -> f64 {
        self.divisor
    }

    /// Merge one judgment with the AI scores of both endpoints.
    ///
    /// Returns `None` when either endpoint has no score.
    pub fn normalize(
        &self,
        judgment: &PairwiseJudgment,
        scores: &[BatchScoreRecord],
    ) -> Option<NormalizedComparison> {
        let score_of = |id: u64| scores.iter().find(|record| record.item_id == id).map(|r| r.score);
        let score_a = score_of(judgment.item_a_id)?;
        let score_b = score_of(judgment.item_b_id)?;

        Some(NormalizedComparison {
            item_a_id: judgment.item_a_id,
            item_b_id: judgment.item_b_id,
            human_judgement: judgment.relative_score.value(),
            ai_judgement: (f64::from(score_b) - f64::from(score_a)) / self.divisor,
        })
    }

    /// Normalize every judgment, dropping (and logging) those with a missing score
    pub fn normalize_all(
        &self,
        judgments: &[PairwiseJudgment],
        scores: &[BatchScoreRecord],
    ) -> Vec<NormalizedComparison> {
        judgments
            .iter()
            .filter_map(|judgment| {
                let normalized = self.normalize(judgment, scores);
                if normalized.is_none() {
                    tracing::warn!(
                        item_a_id = judgment.item_a_id,
                        item_b_id = judgment.item_b_id,
                        "Missing batch score for comparison, dropping it"
                    );
                }
                normalized
            })
            .collect()
    }
}
