use serde::{Deserialize, Serialize};
use std::fmt;

/// A single test output that gets judged by both the AI and the human
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestItem {
    /// Identifier, unique within a run
    pub id: u64,
    /// The output text being judged
    pub text: String,
}

/// Absolute AI score for one sampled item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchScoreRecord {
    /// Id of the scored [`TestItem`]
    pub item_id: u64,
    /// Score in `1..=10`
    pub score: u8,
}

/// One of the five discrete levels a human can pick for a pair.
///
/// Negative values favour item A, positive values favour item B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "f64", try_from = "f64")]
pub enum RelativeScore {
    MuchBetterA,
    BetterA,
    #[default]
    Parity,
    BetterB,
    MuchBetterB,
}

impl RelativeScore {
    pub const ALL: [RelativeScore; 5] = [
        RelativeScore::MuchBetterA,
        RelativeScore::BetterA,
        RelativeScore::Parity,
        RelativeScore::BetterB,
        RelativeScore::MuchBetterB,
    ];

    /// Numeric value on the -1..1 scale
    pub fn value(self) -> f64 {
        match self {
            RelativeScore::MuchBetterA => -1.0,
            RelativeScore::BetterA => -0.5,
            RelativeScore::Parity => 0.0,
            RelativeScore::BetterB => 0.5,
            RelativeScore::MuchBetterB => 1.0,
        }
    }

    /// Exact conversion; anything other than the five levels is rejected
    pub fn from_value(value: f64) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.value() == value)
    }

    /// Snap a continuous slider position in `[-1, 1]` to the nearest level.
    ///
    /// Out-of-range and NaN inputs are clamped, NaN counting as parity.
    pub fn quantize(value: f64) -> Self {
        if value.is_nan() {
            return RelativeScore::Parity;
        }
        let snapped = (value.clamp(-1.0, 1.0) * 2.0).round() / 2.0;
        Self::from_value(snapped).unwrap_or(RelativeScore::Parity)
    }

    /// Human readable description of the level for a given quality dimension
    pub fn label(self, criteria: &str) -> String {
        match self {
            RelativeScore::MuchBetterA => format!("Response A significantly more {}", criteria),
            RelativeScore::BetterA => format!("Response A moderately more {}", criteria),
            RelativeScore::Parity => "Approximately equivalent".to_string(),
            RelativeScore::BetterB => format!("Response B moderately more {}", criteria),
            RelativeScore::MuchBetterB => format!("Response B significantly more {}", criteria),
        }
    }
}

impl From<RelativeScore> for f64 {
    fn from(score: RelativeScore) -> Self {
        score.value()
    }
}

impl TryFrom<f64> for RelativeScore {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::from_value(value)
            .ok_or_else(|| format!("{} is not one of -1, -0.5, 0, 0.5, 1", value))
    }
}

/// A human's relative judgment of one unordered pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairwiseJudgment {
    pub item_a_id: u64,
    pub item_b_id: u64,
    pub relative_score: RelativeScore,
}

/// A human judgment merged with the AI's implied judgment for the same pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedComparison {
    pub item_a_id: u64,
    pub item_b_id: u64,
    /// Human relative score in `[-1, 1]`
    pub human_judgement: f64,
    /// AI score difference scaled onto the human axis
    pub ai_judgement: f64,
}

/// Pearson correlation, or a sentinel when either series is constant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Correlation {
    Value(f64),
    Undefined,
}

impl Correlation {
    pub fn value(self) -> Option<f64> {
        match self {
            Correlation::Value(r) => Some(r),
            Correlation::Undefined => None,
        }
    }
}

impl fmt::Display for Correlation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Correlation::Value(r) => write!(f, "{:.3}", r),
            Correlation::Undefined => write!(f, "N/A"),
        }
    }
}

/// Descriptive statistics over the merged comparisons
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryStatistics {
    pub count: usize,
    pub mean_absolute_difference: f64,
    pub human_mean: f64,
    pub ai_mean: f64,
    pub correlation: Correlation,
    /// Slope of the ai-on-human least squares line
    pub regression_slope: f64,
    pub regression_intercept: f64,
}

/// Endpoint of the best-fit line drawn across the human axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitPoint {
    pub human_judgement: f64,
    pub ai_judgement: f64,
}

/// Speaker of a conversation turn sent to the text-generation collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One conversation turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Title and approach of a generated evaluation prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptSummary {
    pub title: String,
    pub approach: String,
}

/// Judging rubric together with the quality dimension it targets
#[derive(Debug, Clone, PartialEq)]
pub struct Rubric {
    pub content: String,
    /// Quality dimension shown to the human judge
    pub criteria: String,
    /// Set when the rubric came out of the prompt builder
    pub prompt: Option<PromptSummary>,
}

impl Rubric {
    pub fn new(content: impl Into<String>, criteria: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            criteria: criteria.into(),
            prompt: None,
        }
    }
}

/// Everything produced by one validation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Rubric the AI judged with
    pub rubric: String,
    /// Quality dimension shown to the human
    pub criteria: String,
    /// Builder prompt the rubric was taken from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<PromptSummary>,
    /// The sample both streams judged
    pub sample: Vec<TestItem>,
    pub batch_scores: Vec<BatchScoreRecord>,
    pub judgments: Vec<PairwiseJudgment>,
    pub comparisons: Vec<NormalizedComparison>,
    /// `None` when no comparison survived normalization
    pub statistics: Option<SummaryStatistics>,
    /// `statistics` rounded to three decimals, as displayed
    #[serde(default)]
    pub rounded_statistics: Option<SummaryStatistics>,
    pub best_fit_line: Vec<FitPoint>,
    /// Whether the human went through every pair
    pub judge_completed: bool,
}
