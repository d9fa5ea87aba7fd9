use crate::llm::Collaborator;
use crate::models::{BatchScoreRecord, ChatMessage, TestItem};
use crate::prompts;
use std::sync::Arc;
use tokio::sync::mpsc;

pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 10;

/// Capacity of the event channel between the scoring task and its observer
const EVENT_BUFFER: usize = 32;

/// Why a scoring run stopped before completing
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoringError {
    #[error("scoring item {item_id} failed: {message}")]
    Provider { item_id: u64, message: String },
    #[error("scorer returned {score} for item {item_id}, expected 1..=10")]
    OutOfRange { item_id: u64, score: u8 },
    #[error("scoring stopped without a terminal event")]
    Interrupted,
}

/// Events emitted while a batch is being scored, in order
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    /// Emitted before item `current` (1-based) of `total` is scored
    Progress {
        current: usize,
        total: usize,
        current_item_id: u64,
    },
    Result(BatchScoreRecord),
    /// Terminal: every item was scored
    Complete { results: Vec<BatchScoreRecord> },
    /// Terminal: the run halted, no `Complete` follows
    Error(ScoringError),
}

impl BatchEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchEvent::Complete { .. } | BatchEvent::Error(_))
    }
}

/// Scores test items one at a time with a judging rubric
#[derive(Clone)]
pub struct BatchScorer {
    collaborator: Arc<dyn Collaborator>,
}

impl BatchScorer {
    pub fn new(collaborator: Arc<dyn Collaborator>) -> Self {
        Self { collaborator }
    }

    /// Start scoring in a background task and return its live event feed.
    ///
    /// Items are scored strictly in input order. Dropping the receiver stops
    /// the task before its next call to the collaborator.
    pub fn run(&self, rubric: &str, items: Vec<TestItem>) -> mpsc::Receiver<BatchEvent> {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let collaborator = Arc::clone(&self.collaborator);
        let system = prompts::judgment_prompt(rubric);

        tokio::spawn(async move {
            score_items(collaborator.as_ref(), &system, &items, &tx).await;
        });

        rx
    }

    /// Score every item and return only the final aggregate
    pub async fn score_all(
        &self,
        rubric: &str,
        items: Vec<TestItem>,
    ) -> Result<Vec<BatchScoreRecord>, ScoringError> {
        wait_for_completion(self.run(rubric, items)).await
    }
}

/// Drain an event feed until its terminal event
pub async fn wait_for_completion(
    events: mpsc::Receiver<BatchEvent>,
) -> Result<Vec<BatchScoreRecord>, ScoringError> {
    observe_until_complete(events, |_| {}).await
}

/// Like [`wait_for_completion`], handing every event to `observe` first
pub async fn observe_until_complete<F>(
    mut events: mpsc::Receiver<BatchEvent>,
    mut observe: F,
) -> Result<Vec<BatchScoreRecord>, ScoringError>
where
    F: FnMut(&BatchEvent),
{
    while let Some(event) = events.recv().await {
        observe(&event);
        match event {
            BatchEvent::Complete { results } => return Ok(results),
            BatchEvent::Error(error) => return Err(error),
            BatchEvent::Progress { .. } | BatchEvent::Result(_) => {}
        }
    }
    Err(ScoringError::Interrupted)
}

async fn score_items(
    collaborator: &dyn Collaborator,
    system: &str,
    items: &[TestItem],
    tx: &mpsc::Sender<BatchEvent>,
) {
    let total = items.len();
    let mut results = Vec::with_capacity(total);
    tracing::info!(total, "Batch scoring started");

    for (index, item) in items.iter().enumerate() {
        let progress = BatchEvent::Progress {
            current: index + 1,
            total,
            current_item_id: item.id,
        };
        if tx.send(progress).await.is_err() {
            tracing::debug!(scored = index, total, "Batch scoring abandoned by observer");
            return;
        }

        match score_item(collaborator, system, item).await {
            Ok(record) => {
                tracing::debug!(item_id = item.id, score = record.score, current = index + 1, total, "Item scored");
                results.push(record);
                if tx.send(BatchEvent::Result(record)).await.is_err() {
                    return;
                }
            }
            Err(error) => {
                tracing::error!(%error, "Batch scoring failed");
                let _ = tx.send(BatchEvent::Error(error)).await;
                return;
            }
        }
    }

    tracing::info!(total, "Batch scoring complete");
    let _ = tx.send(BatchEvent::Complete { results }).await;
}

async fn score_item(
    collaborator: &dyn Collaborator,
    system: &str,
    item: &TestItem,
) -> Result<BatchScoreRecord, ScoringError> {
    let reasoning = collaborator
        .generate_text(system, &[ChatMessage::user(prompts::format_test_item(item))])
        .await
        .map_err(|e| ScoringError::Provider {
            item_id: item.id,
            message: format!("{:#}", e),
        })?;

    let score = collaborator.extract_score(&reasoning).await;
    if !(MIN_SCORE..=MAX_SCORE).contains(&score) {
        return Err(ScoringError::OutOfRange {
            item_id: item.id,
            score,
        });
    }

    Ok(BatchScoreRecord {
        item_id: item.id,
        score,
    })
}
