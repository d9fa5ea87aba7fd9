//! In-memory collaborator and judge for exercising the pipeline without a provider or a human.

use crate::llm::Collaborator;
use crate::models::{ChatMessage, RelativeScore};
use crate::orchestrator::{Decision, JudgmentSource};
use crate::pairwise::PairPresentation;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Scores items from a fixed table and answers other calls by echoing the system prompt.
///
/// Judging replies look like `... SCORE=<n>`, which `extract_score` reads back.
pub struct FakeCollaborator {
    scores: HashMap<u64, u8>,
    fail_when: Option<String>,
    delay: Duration,
    calls: Mutex<Vec<String>>,
}

impl FakeCollaborator {
    pub fn with_scores(scores: &[(u64, u8)]) -> Self {
        Self {
            scores: scores.iter().copied().collect(),
            fail_when: None,
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Fail any call whose system prompt or last message contains `needle`
    pub fn failing_when(mut self, needle: &str) -> Self {
        self.fail_when = Some(needle.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// System prompts of every `generate_text` call so far
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

fn item_id(message: &str) -> Option<u64> {
    let rest = message.strip_prefix("Test Case ID: ")?;
    rest.lines().next()?.trim().parse().ok()
}

#[async_trait]
impl Collaborator for FakeCollaborator {
    async fn generate_text(&self, system: &str, messages: &[ChatMessage]) -> anyhow::Result<String> {
        self.calls.lock().unwrap().push(system.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let last = messages.last().map(|m| m.content.as_str()).unwrap_or_default();
        if let Some(needle) = &self.fail_when {
            if system.contains(needle.as_str()) || last.contains(needle.as_str()) {
                anyhow::bail!("provider unavailable");
            }
        }

        match item_id(last) {
            Some(id) => {
                let score = self.scores.get(&id).copied().unwrap_or(5);
                Ok(format!("Reasoning about item {}. SCORE={}", id, score))
            }
            None => Ok(format!("response to: {}", system)),
        }
    }

    async fn extract_score(&self, reasoning: &str) -> u8 {
        reasoning
            .rsplit("SCORE=")
            .next()
            .and_then(|tail| tail.trim().parse().ok())
            .unwrap_or(5)
    }
}

/// Answers every pair with a fixed rule over the two item ids
pub struct ScriptedJudge {
    answer: fn(u64, u64) -> RelativeScore,
    abandon_after: Option<usize>,
    delay: Duration,
    sliding: bool,
    asked: usize,
    criteria_seen: Vec<String>,
}

impl ScriptedJudge {
    pub fn new(answer: fn(u64, u64) -> RelativeScore) -> Self {
        Self {
            answer,
            abandon_after: None,
            delay: Duration::ZERO,
            sliding: false,
            asked: 0,
            criteria_seen: Vec::new(),
        }
    }

    /// Give up once `count` pairs have been judged
    pub fn abandon_after(mut self, count: usize) -> Self {
        self.abandon_after = Some(count);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Move the slider to the answer first, then commit whatever is pending
    pub fn sliding(mut self) -> Self {
        self.sliding = true;
        self
    }

    /// Number of pairs judged so far
    pub fn asked(&self) -> usize {
        self.asked
    }

    /// Criteria passed along with each judged pair
    pub fn criteria_seen(&self) -> &[String] {
        &self.criteria_seen
    }
}

#[async_trait]
impl JudgmentSource for ScriptedJudge {
    async fn judge(&mut self, pair: &PairPresentation<'_>, criteria: &str) -> Decision {
        if self.abandon_after.is_some_and(|limit| self.asked >= limit) {
            return Decision::Abandon;
        }
        let answer = (self.answer)(pair.item_a.id, pair.item_b.id);
        if self.sliding && pair.pending != answer {
            return Decision::Slide(answer);
        }
        self.asked += 1;
        self.criteria_seen.push(criteria.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.sliding {
            Decision::Record(pair.pending)
        } else {
            Decision::Record(answer)
        }
    }
}
