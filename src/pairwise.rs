use crate::models::{PairwiseJudgment, RelativeScore, TestItem};
use rand::Rng;
use rand::seq::SliceRandom;

/// Where a human judging session currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolState {
    /// Not started yet
    Idle,
    /// Pair `index` is on screen, `pending` is the not-yet-recorded slider value
    Presenting { index: usize, pending: RelativeScore },
    /// Every pair has been judged
    Complete,
    /// The human stopped before judging every pair
    Closed,
}

impl ProtocolState {
    fn name(self) -> &'static str {
        match self {
            ProtocolState::Idle => "idle",
            ProtocolState::Presenting { .. } => "presenting",
            ProtocolState::Complete => "complete",
            ProtocolState::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProtocolError {
    #[error("no pair is presented while the protocol is {0}")]
    NotPresenting(&'static str),
}

/// What recording a judgment led to
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// The next pair is now presented
    Advanced,
    /// That was the last pair; carries every judgment of the run
    Completed(Vec<PairwiseJudgment>),
}

/// The pair currently shown to the human, with progress information
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairPresentation<'a> {
    /// Zero-based step index
    pub step: usize,
    pub total: usize,
    pub item_a: &'a TestItem,
    pub item_b: &'a TestItem,
    pub pending: RelativeScore,
}

impl PairPresentation<'_> {
    pub fn progress_percent(&self) -> f64 {
        (self.step + 1) as f64 / self.total as f64 * 100.0
    }
}

/// Walks a human through every unordered pair of a sample exactly once.
///
/// The pair order is shuffled when the protocol starts and stays fixed until
/// it is started again. Judgments can only be recorded for the current pair.
#[derive(Debug, Clone)]
pub struct PairwiseJudgeProtocol {
    items: Vec<TestItem>,
    /// Index pairs into `items`, `a < b` before shuffling
    pairs: Vec<(usize, usize)>,
    judgments: Vec<PairwiseJudgment>,
    state: ProtocolState,
}

impl PairwiseJudgeProtocol {
    pub fn new(items: Vec<TestItem>) -> Self {
        Self {
            items,
            pairs: Vec::new(),
            judgments: Vec::new(),
            state: ProtocolState::Idle,
        }
    }

    /// Start (or restart) with a freshly shuffled pair order
    pub fn start(&mut self) {
        self.start_with_rng(&mut rand::thread_rng());
    }

    /// Start (or restart), discarding any earlier judgments
    pub fn start_with_rng<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let n = self.items.len();
        self.pairs = (0..n)
            .flat_map(|a| (a + 1..n).map(move |b| (a, b)))
            .collect();
        self.pairs.shuffle(rng);
        self.judgments = Vec::with_capacity(self.pairs.len());

        self.state = if self.pairs.is_empty() {
            ProtocolState::Complete
        } else {
            ProtocolState::Presenting {
                index: 0,
                pending: RelativeScore::Parity,
            }
        };
        tracing::info!(items = n, pairs = self.pairs.len(), "Pairwise judging started");
    }

    pub fn state(&self) -> ProtocolState {
        self.state
    }

    pub fn judgments(&self) -> &[PairwiseJudgment] {
        &self.judgments
    }

    pub fn current_pair(&self) -> Option<PairPresentation<'_>> {
        match self.state {
            ProtocolState::Presenting { index, pending } => {
                let (a, b) = self.pairs[index];
                Some(PairPresentation {
                    step: index,
                    total: self.pairs.len(),
                    item_a: &self.items[a],
                    item_b: &self.items[b],
                    pending,
                })
            }
            _ => None,
        }
    }

    /// Move the slider for the current pair without recording anything
    pub fn set_pending(&mut self, value: RelativeScore) -> Result<(), ProtocolError> {
        match &mut self.state {
            ProtocolState::Presenting { pending, .. } => {
                *pending = value;
                Ok(())
            }
            other => Err(ProtocolError::NotPresenting(other.name())),
        }
    }

    /// Record the judgment for the current pair and move on
    pub fn record_judgment(&mut self, value: RelativeScore) -> Result<Step, ProtocolError> {
        let index = match self.state {
            ProtocolState::Presenting { index, .. } => index,
            other => return Err(ProtocolError::NotPresenting(other.name())),
        };

        let (a, b) = self.pairs[index];
        self.judgments.push(PairwiseJudgment {
            item_a_id: self.items[a].id,
            item_b_id: self.items[b].id,
            relative_score: value,
        });

        if index + 1 == self.pairs.len() {
            self.state = ProtocolState::Complete;
            tracing::info!(judgments = self.judgments.len(), "Pairwise judging complete");
            Ok(Step::Completed(self.judgments.clone()))
        } else {
            self.state = ProtocolState::Presenting {
                index: index + 1,
                pending: RelativeScore::Parity,
            };
            Ok(Step::Advanced)
        }
    }

    /// Stop the session and hand back everything recorded so far.
    ///
    /// A completed session stays complete; closing is otherwise final until restart.
    pub fn close(&mut self) -> Vec<PairwiseJudgment> {
        if self.state != ProtocolState::Complete {
            if self.state != ProtocolState::Closed {
                tracing::info!(
                    recorded = self.judgments.len(),
                    total = self.pairs.len(),
                    "Pairwise judging closed early"
                );
            }
            self.state = ProtocolState::Closed;
        }
        self.judgments.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    fn items(n: u64) -> Vec<TestItem> {
        (1..=n)
            .map(|id| TestItem {
                id,
                text: format!("output {}", id),
            })
            .collect()
    }

    fn started(n: u64, seed: u64) -> PairwiseJudgeProtocol {
        let mut protocol = PairwiseJudgeProtocol::new(items(n));
        protocol.start_with_rng(&mut StdRng::seed_from_u64(seed));
        protocol
    }

    fn judge_all(protocol: &mut PairwiseJudgeProtocol) -> Vec<PairwiseJudgment> {
        loop {
            match protocol.record_judgment(RelativeScore::BetterB).unwrap() {
                Step::Advanced => continue,
                Step::Completed(all) => return all,
            }
        }
    }

    #[test]
    fn test_every_unordered_pair_exactly_once() {
        for n in 2..=7u64 {
            let mut protocol = started(n, n);
            let expected = (n * (n - 1) / 2) as usize;
            assert_eq!(protocol.current_pair().unwrap().total, expected);

            let judgments = judge_all(&mut protocol);
            assert_eq!(judgments.len(), expected);

            let pairs: HashSet<(u64, u64)> = judgments
                .iter()
                .map(|j| {
                    assert_ne!(j.item_a_id, j.item_b_id);
                    (j.item_a_id.min(j.item_b_id), j.item_a_id.max(j.item_b_id))
                })
                .collect();
            assert_eq!(pairs.len(), expected);
            assert_eq!(protocol.state(), ProtocolState::Complete);
        }
    }

    #[test]
    fn test_tiny_samples_complete_immediately() {
        for n in 0..=1 {
            let protocol = started(n, 1);
            assert_eq!(protocol.state(), ProtocolState::Complete);
            assert!(protocol.judgments().is_empty());
            assert!(protocol.current_pair().is_none());
        }
    }

    #[test]
    fn test_same_seed_same_order() {
        let first = judge_all(&mut started(5, 42));
        let second = judge_all(&mut started(5, 42));
        assert_eq!(first, second);
    }

    #[test]
    fn test_presentation_matches_recorded_pair() {
        let mut protocol = started(4, 9);
        let (a, b, step, total) = {
            let pair = protocol.current_pair().unwrap();
            (pair.item_a.id, pair.item_b.id, pair.step, pair.total)
        };
        assert_eq!((step, total), (0, 6));

        assert_eq!(protocol.record_judgment(RelativeScore::BetterA), Ok(Step::Advanced));
        let judgment = protocol.judgments()[0];
        assert_eq!((judgment.item_a_id, judgment.item_b_id), (a, b));
        assert_eq!(judgment.relative_score, RelativeScore::BetterA);

        let next = protocol.current_pair().unwrap();
        assert_eq!(next.step, 1);
        assert_eq!(next.pending, RelativeScore::Parity);
    }

    #[test]
    fn test_set_pending_moves_slider_until_recorded() {
        let mut protocol = started(3, 4);
        protocol.set_pending(RelativeScore::MuchBetterA).unwrap();

        let pair = protocol.current_pair().unwrap();
        assert_eq!(pair.step, 0);
        assert_eq!(pair.pending, RelativeScore::MuchBetterA);
        assert!(protocol.judgments().is_empty());

        let pending = pair.pending;
        protocol.record_judgment(pending).unwrap();
        assert_eq!(protocol.judgments()[0].relative_score, RelativeScore::MuchBetterA);
        assert_eq!(protocol.current_pair().unwrap().pending, RelativeScore::Parity);
    }

    #[test]
    fn test_set_pending_outside_presenting() {
        let mut idle = PairwiseJudgeProtocol::new(items(3));
        assert_eq!(
            idle.set_pending(RelativeScore::BetterB),
            Err(ProtocolError::NotPresenting("idle"))
        );

        let mut protocol = started(3, 4);
        protocol.close();
        assert_eq!(
            protocol.set_pending(RelativeScore::BetterB),
            Err(ProtocolError::NotPresenting("closed"))
        );
    }

    #[test]
    fn test_progress_percent() {
        let protocol = started(2, 0);
        assert_eq!(protocol.current_pair().unwrap().progress_percent(), 100.0);
    }

    #[test]
    fn test_rejects_recording_outside_presenting() {
        let mut idle = PairwiseJudgeProtocol::new(items(3));
        assert_eq!(
            idle.record_judgment(RelativeScore::Parity),
            Err(ProtocolError::NotPresenting("idle"))
        );

        let mut protocol = started(2, 0);
        assert!(matches!(
            protocol.record_judgment(RelativeScore::MuchBetterB),
            Ok(Step::Completed(_))
        ));
        assert_eq!(
            protocol.record_judgment(RelativeScore::MuchBetterB),
            Err(ProtocolError::NotPresenting("complete"))
        );
        assert_eq!(protocol.judgments().len(), 1);
    }

    #[test]
    fn test_close_keeps_partial_judgments() {
        let mut protocol = started(4, 5);
        protocol.record_judgment(RelativeScore::MuchBetterB).unwrap();
        protocol.record_judgment(RelativeScore::Parity).unwrap();

        let partial = protocol.close();
        assert_eq!(partial.len(), 2);
        assert_eq!(protocol.state(), ProtocolState::Closed);
        assert!(protocol.current_pair().is_none());
        assert!(protocol.record_judgment(RelativeScore::Parity).is_err());
    }

    #[test]
    fn test_close_after_complete_stays_complete() {
        let mut protocol = started(2, 0);
        protocol.record_judgment(RelativeScore::Parity).unwrap();
        assert_eq!(protocol.close().len(), 1);
        assert_eq!(protocol.state(), ProtocolState::Complete);
    }

    #[test]
    fn test_restart_discards_judgments() {
        let mut protocol = started(3, 1);
        protocol.record_judgment(RelativeScore::BetterA).unwrap();
        protocol.close();

        protocol.start_with_rng(&mut StdRng::seed_from_u64(2));
        assert!(protocol.judgments().is_empty());
        assert_eq!(protocol.current_pair().unwrap().step, 0);
        assert_eq!(judge_all(&mut protocol).len(), 3);
    }
}
