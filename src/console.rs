//! Terminal front end: pair judging, scoring progress and the prompt builder dialogue.

use crate::batch_scorer::BatchEvent;
use crate::builder::{BuilderPhase, EvaluationCriteria, PromptBuilder, SelectedPrompt};
use crate::models::RelativeScore;
use crate::orchestrator::{Decision, JudgmentSource};
use crate::pairwise::PairPresentation;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

/// A line typed while a pair is on screen
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Answer {
    Judge(RelativeScore),
    /// Decimal slider position, snapped to a level but not yet committed
    Slide(RelativeScore),
    /// Empty line: commit the pending slider value
    KeepPending,
    Quit,
}

/// Parse `-2..2`, the `a+ a = b b+` shorthands, `q`, or an empty line.
///
/// A decimal such as `0.3` moves the slider to a position in `[-1, 1]`, snapped to the nearest level.
pub fn parse_answer(input: &str) -> Option<Answer> {
    let input = input.trim().to_lowercase();
    let score = match input.as_str() {
        "" => return Some(Answer::KeepPending),
        "q" | "quit" => return Some(Answer::Quit),
        "-2" | "a+" => RelativeScore::MuchBetterA,
        "-1" | "a" => RelativeScore::BetterA,
        "0" | "=" => RelativeScore::Parity,
        "1" | "+1" | "b" => RelativeScore::BetterB,
        "2" | "+2" | "b+" => RelativeScore::MuchBetterB,
        slider if slider.contains('.') => {
            let position: f64 = slider.parse().ok()?;
            if !(-1.0..=1.0).contains(&position) {
                return None;
            }
            return Some(Answer::Slide(RelativeScore::quantize(position)));
        }
        _ => return None,
    };
    Some(Answer::Judge(score))
}

fn shorthand(score: RelativeScore) -> &'static str {
    match score {
        RelativeScore::MuchBetterA => "a+",
        RelativeScore::BetterA => "a",
        RelativeScore::Parity => "=",
        RelativeScore::BetterB => "b",
        RelativeScore::MuchBetterB => "b+",
    }
}

/// Judges pairs from lines of text, usually stdin.
///
/// End of input counts as abandoning the session.
pub struct ConsoleJudge<R> {
    lines: Lines<R>,
    /// Step and item ids of the pair last printed in full
    shown: Option<(usize, u64, u64)>,
}

impl<R: AsyncBufRead + Unpin> ConsoleJudge<R> {
    /// Lines may already have been consumed by the prompt builder
    pub fn from_lines(lines: Lines<R>) -> Self {
        Self { lines, shown: None }
    }

    fn present(&mut self, pair: &PairPresentation<'_>, criteria: &str) {
        let key = (pair.step, pair.item_a.id, pair.item_b.id);
        if self.shown == Some(key) {
            println!(
                "Slider at '{}' ({}). Enter to confirm:",
                shorthand(pair.pending),
                pair.pending.label(criteria)
            );
            return;
        }
        self.shown = Some(key);

        println!();
        println!(
            "Pair {} of {} ({:.0}%)",
            pair.step + 1,
            pair.total,
            pair.progress_percent()
        );
        println!("{}", "-".repeat(40));
        println!("Response A:\n{}\n", pair.item_a.text);
        println!("Response B:\n{}\n", pair.item_b.text);
        for score in RelativeScore::ALL {
            println!("  {:<3} {:>2}  {}", shorthand(score), score.value() * 2.0, score.label(criteria));
        }
        println!(
            "Enter a judgment, or a slider position like 0.3 (empty confirms '{}', q quits):",
            shorthand(pair.pending)
        );
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> JudgmentSource for ConsoleJudge<R> {
    async fn judge(&mut self, pair: &PairPresentation<'_>, criteria: &str) -> Decision {
        self.present(pair, criteria);
        loop {
            let line = match self.lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return Decision::Abandon,
                Err(error) => {
                    tracing::warn!(%error, "Failed to read judgment, closing session");
                    return Decision::Abandon;
                }
            };

            match parse_answer(&line) {
                Some(Answer::Judge(score)) => return Decision::Record(score),
                Some(Answer::Slide(score)) => return Decision::Slide(score),
                Some(Answer::KeepPending) => return Decision::Record(pair.pending),
                Some(Answer::Quit) => return Decision::Abandon,
                None => println!("Unrecognised judgment '{}', try again:", line.trim()),
            }
        }
    }
}

/// Render one scoring event as a status line, `None` for events with nothing to show
pub fn progress_line(event: &BatchEvent) -> Option<String> {
    match event {
        BatchEvent::Progress {
            current,
            total,
            current_item_id,
        } => Some(format!(
            "AI scoring {}/{} (item {})",
            current, total, current_item_id
        )),
        BatchEvent::Result(_) => None,
        BatchEvent::Complete { results } => Some(format!("AI scoring complete: {} items scored", results.len())),
        BatchEvent::Error(error) => Some(format!("AI scoring failed: {}", error)),
    }
}

/// Print scoring progress on stderr so it does not interleave with the report
pub fn print_progress(event: &BatchEvent) {
    if let Some(line) = progress_line(event) {
        eprintln!("{}", line);
    }
}

async fn read_line<R: AsyncBufRead + Unpin>(lines: &mut Lines<R>) -> Result<String> {
    lines
        .next_line()
        .await
        .context("Failed to read from input")?
        .context("Input closed before the prompt builder finished")
}

/// Walk the user through the prompt builder until a prompt is selected
pub async fn run_builder<R: AsyncBufRead + Unpin>(
    builder: &mut PromptBuilder,
    lines: &mut Lines<R>,
) -> Result<SelectedPrompt> {
    loop {
        match builder.phase().clone() {
            BuilderPhase::Selection => {
                println!("Which quality should the rubric judge? (witty, intelligent, kind)");
                let line = read_line(lines).await?;
                match line.parse::<EvaluationCriteria>() {
                    Ok(criteria) => builder.select_criteria(criteria)?,
                    Err(message) => println!("{}", message),
                }
            }
            BuilderPhase::Conversation { .. } => {
                if let Some(question) = builder.current_question() {
                    println!("\n{}\n", question);
                }
                let answer = read_line(lines).await?;
                if let Err(error) = builder.respond(&answer).await {
                    println!("Request failed ({}), please answer again.", error);
                }
            }
            BuilderPhase::Generation => {
                if builder.generated().is_empty() {
                    println!("Generating candidate prompts...");
                    builder.generate().await?;
                }
                for (index, prompt) in builder.generated().iter().enumerate() {
                    println!("\n[{}] {} ({})\n{}", index + 1, prompt.title, prompt.approach, prompt.content);
                }
                println!("\nPick a prompt by number, 'r' to regenerate or 'restart':");
                let line = read_line(lines).await?;
                match line.trim() {
                    "r" => {
                        builder.generate().await?;
                    }
                    "restart" => builder.reset(),
                    choice => match choice.parse::<usize>() {
                        Ok(number) if number >= 1 => {
                            if let Err(error) = builder.select_prompt(number - 1) {
                                println!("{}", error);
                            }
                        }
                        _ => println!("Unrecognised choice '{}'", choice),
                    },
                }
            }
            BuilderPhase::Evaluation { selected } => {
                println!("\nUse '{}' as the rubric? [Y/n]", selected.title);
                let line = read_line(lines).await?;
                if line.trim().eq_ignore_ascii_case("n") {
                    builder.back_to_generation()?;
                } else {
                    return Ok(selected);
                }
            }
        }
    }
}
