use crate::llm::Collaborator;
use crate::models::{ChatMessage, PromptSummary, Role, Rubric};
use crate::prompts;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Quality dimension a rubric is being built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationCriteria {
    Witty,
    Intelligent,
    Kind,
}

impl EvaluationCriteria {
    pub const ALL: [EvaluationCriteria; 3] = [
        EvaluationCriteria::Witty,
        EvaluationCriteria::Intelligent,
        EvaluationCriteria::Kind,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EvaluationCriteria::Witty => "witty",
            EvaluationCriteria::Intelligent => "intelligent",
            EvaluationCriteria::Kind => "kind",
        }
    }
}

impl fmt::Display for EvaluationCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvaluationCriteria {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| format!("unknown criteria '{}', expected witty, intelligent or kind", s.trim()))
    }
}

/// One candidate evaluation prompt from a generator persona
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalPrompt {
    pub title: String,
    pub approach: String,
    pub content: String,
}

/// The candidate the user settled on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedPrompt {
    pub title: String,
    pub approach: String,
    pub content: String,
    pub criteria: EvaluationCriteria,
}

impl From<SelectedPrompt> for Rubric {
    fn from(selected: SelectedPrompt) -> Self {
        Rubric {
            content: selected.content,
            criteria: selected.criteria.as_str().to_string(),
            prompt: Some(PromptSummary {
                title: selected.title,
                approach: selected.approach,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BuilderPhase {
    /// Waiting for a quality dimension
    Selection,
    /// Refining the definition; `round` critic/questioner rounds done so far
    Conversation { round: usize },
    /// Transcript finished, candidates may be generated
    Generation,
    Evaluation { selected: SelectedPrompt },
}

impl BuilderPhase {
    fn name(&self) -> &'static str {
        match self {
            BuilderPhase::Selection => "selecting criteria",
            BuilderPhase::Conversation { .. } => "in conversation",
            BuilderPhase::Generation => "generating",
            BuilderPhase::Evaluation { .. } => "evaluating",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BuilderError {
    #[error("cannot {action} while {phase}")]
    InvalidTransition {
        action: &'static str,
        phase: &'static str,
    },
    #[error("no generated prompt at index {0}")]
    NoSuchPrompt(usize),
    #[error(transparent)]
    Agent(#[from] anyhow::Error),
}

/// Interactive wizard that turns a conversation about one quality into a rubric.
///
/// Every transition is checked against the current phase. Agent failures leave
/// the phase and transcript untouched so the same input can be retried.
pub struct PromptBuilder {
    collaborator: Arc<dyn Collaborator>,
    max_loops: usize,
    phase: BuilderPhase,
    criteria: Option<EvaluationCriteria>,
    messages: Vec<ChatMessage>,
    critiques: Vec<String>,
    generated: Vec<EvalPrompt>,
}

impl PromptBuilder {
    pub fn new(collaborator: Arc<dyn Collaborator>, max_loops: usize) -> Self {
        Self {
            collaborator,
            max_loops,
            phase: BuilderPhase::Selection,
            criteria: None,
            messages: Vec::new(),
            critiques: Vec::new(),
            generated: Vec::new(),
        }
    }

    pub fn phase(&self) -> &BuilderPhase {
        &self.phase
    }

    pub fn criteria(&self) -> Option<EvaluationCriteria> {
        self.criteria
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn critiques(&self) -> &[String] {
        &self.critiques
    }

    pub fn generated(&self) -> &[EvalPrompt] {
        &self.generated
    }

    /// The question awaiting the user's answer
    pub fn current_question(&self) -> Option<&str> {
        match self.phase {
            BuilderPhase::Conversation { .. } => self
                .messages
                .last()
                .filter(|m| m.role == Role::Assistant)
                .map(|m| m.content.as_str()),
            _ => None,
        }
    }

    fn invalid(&self, action: &'static str) -> BuilderError {
        BuilderError::InvalidTransition {
            action,
            phase: self.phase.name(),
        }
    }

    pub fn select_criteria(&mut self, criteria: EvaluationCriteria) -> Result<(), BuilderError> {
        if self.phase != BuilderPhase::Selection {
            return Err(self.invalid("select criteria"));
        }

        self.criteria = Some(criteria);
        self.messages = vec![ChatMessage::assistant(prompts::default_question(criteria.as_str()))];
        self.phase = BuilderPhase::Conversation { round: 0 };
        tracing::info!(%criteria, "Prompt builder started");
        Ok(())
    }

    /// Record the user's answer and either ask a follow-up or finish the conversation
    pub async fn respond(&mut self, answer: &str) -> Result<(), BuilderError> {
        let BuilderPhase::Conversation { round } = self.phase else {
            return Err(self.invalid("respond"));
        };

        let mut transcript = self.messages.clone();
        transcript.push(ChatMessage::user(answer));

        if round >= self.max_loops {
            self.messages = transcript;
            self.phase = BuilderPhase::Generation;
            tracing::debug!(rounds = round, "Conversation finished");
            return Ok(());
        }

        let conversation = prompts::format_conversation(&transcript);
        let critique = self
            .collaborator
            .generate_text(
                prompts::CRITIC_SYSTEM_PROMPT,
                &[ChatMessage::user(prompts::critic_prompt(&conversation))],
            )
            .await?;
        let question = self
            .collaborator
            .generate_text(
                prompts::QUESTIONER_SYSTEM_PROMPT,
                &[ChatMessage::user(prompts::questioner_prompt(&conversation, &critique))],
            )
            .await?;

        transcript.push(ChatMessage::assistant(question));
        self.messages = transcript;
        self.critiques.push(critique);
        self.phase = BuilderPhase::Conversation { round: round + 1 };
        Ok(())
    }

    /// Ask all three generator personas for a candidate prompt at once
    pub async fn generate(&mut self) -> Result<&[EvalPrompt], BuilderError> {
        let (BuilderPhase::Generation, Some(criteria)) = (&self.phase, self.criteria) else {
            return Err(self.invalid("generate prompts"));
        };

        let request = [ChatMessage::user(prompts::generator_prompt(
            criteria.as_str(),
            &prompts::format_conversation(&self.messages),
        ))];
        let [academic, minimalist, generalist] = prompts::GENERATOR_PERSONAS;

        let (first, second, third) = tokio::try_join!(
            self.collaborator.generate_text(academic.2, &request),
            self.collaborator.generate_text(minimalist.2, &request),
            self.collaborator.generate_text(generalist.2, &request),
        )?;

        self.generated = [(academic, first), (minimalist, second), (generalist, third)]
            .into_iter()
            .map(|((title, approach, _), content)| EvalPrompt {
                title: title.to_string(),
                approach: approach.to_string(),
                content,
            })
            .collect();
        tracing::info!(count = self.generated.len(), "Candidate prompts generated");
        Ok(&self.generated)
    }

    pub fn select_prompt(&mut self, index: usize) -> Result<SelectedPrompt, BuilderError> {
        let (BuilderPhase::Generation, Some(criteria)) = (&self.phase, self.criteria) else {
            return Err(self.invalid("select a prompt"));
        };
        if self.generated.is_empty() {
            return Err(self.invalid("select a prompt"));
        }
        let prompt = self.generated.get(index).ok_or(BuilderError::NoSuchPrompt(index))?;

        let selected = SelectedPrompt {
            title: prompt.title.clone(),
            approach: prompt.approach.clone(),
            content: prompt.content.clone(),
            criteria,
        };
        tracing::info!(title = %selected.title, "Prompt selected");
        self.phase = BuilderPhase::Evaluation {
            selected: selected.clone(),
        };
        Ok(selected)
    }

    pub fn back_to_generation(&mut self) -> Result<(), BuilderError> {
        if !matches!(self.phase, BuilderPhase::Evaluation { .. }) {
            return Err(self.invalid("go back to generation"));
        }
        self.phase = BuilderPhase::Generation;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.phase = BuilderPhase::Selection;
        self.criteria = None;
        self.messages.clear();
        self.critiques.clear();
        self.generated.clear();
    }
}
