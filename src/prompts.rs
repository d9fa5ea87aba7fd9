//! Prompt templates for the judging calls and the prompt builder agents.

use crate::models::{ChatMessage, Role, TestItem};

/// System prompt for turning free-form judging reasoning into a number
pub const SCORER_SYSTEM_PROMPT: &str = "You are a scoring assistant. Based on the reasoning provided, return a score between 1 and 10 (inclusive).
The reasoning will contain an analysis and justification for a score. Your job is to extract or determine the most appropriate score from that reasoning.
Respond with JSON only, in the form {\"score\": <integer 1-10>}.";

/// Wrap a user-supplied rubric into the judging system instruction
pub fn judgment_prompt(rubric: &str) -> String {
    format!(
        "You are an expert evaluator. Use the following judging criteria to evaluate the test case:

{rubric}

Provide detailed reasoning for your evaluation and conclude with a score between 1 and 10, where:
- 1-3: Poor/Fails to meet criteria
- 4-6: Average/Partially meets criteria
- 7-8: Good/Meets most criteria
- 9-10: Excellent/Exceeds criteria

Be thorough in your analysis and clearly justify your score."
    )
}

/// Format a test item as the user turn of a judging call
pub fn format_test_item(item: &TestItem) -> String {
    format!(
        "Test Case ID: {}\nContent to evaluate: {}\n\nPlease evaluate this content according to the judging criteria and provide your reasoning and score.",
        item.id, item.text
    )
}

pub const CRITIC_SYSTEM_PROMPT: &str = "You are a critical reviewer helping a user define how an AI output should be judged for a single quality. \
Read the conversation so far and point out what is still vague, contradictory or missing: edge cases, what separates a mediocre \
example from an excellent one, and anything a grader would have to guess. Be concise and concrete. Do not address the user directly.";

pub const QUESTIONER_SYSTEM_PROMPT: &str = "You are an interviewer refining an evaluation rubric with a user. \
Using the conversation and the reviewer's critique, ask the user one or two short, specific follow-up questions that would resolve \
the most important gaps. Speak directly to the user. Do not write the rubric yourself.";

/// Generator personas as `(title, approach, system prompt)`
pub const GENERATOR_PERSONAS: [(&str, &str, &str); 3] = [
    (
        "Academic Structure",
        "highly structured, research-grade evaluation",
        "You write evaluation prompts for LLM judges in the style of a research methodology section. \
Produce a rigorous prompt with explicit definitions, weighted criteria, a scoring band for every level from 1 to 10 \
and instructions to reason step by step before giving a score.",
    ),
    (
        "Minimalist Practitioner",
        "streamlined, action-oriented evaluation",
        "You write evaluation prompts for LLM judges that practitioners can use immediately. \
Produce a short, direct prompt with a handful of concrete checks and a clear 1 to 10 scale. Avoid jargon and padding.",
    ),
    (
        "Balanced Generalist",
        "well-rounded, flexible evaluation",
        "You write evaluation prompts for LLM judges that balance rigour with readability. \
Produce a prompt that defines the quality, lists the main criteria with short examples and explains the 1 to 10 scale.",
    ),
];

/// Opening question for a quality dimension
pub fn default_question(criteria: &str) -> String {
    format!(
        "Let's define what \"{criteria}\" means for the outputs you want to evaluate. \
Can you describe an example you would consider highly {criteria}, and what makes it so?"
    )
}

/// Render a transcript as plain text for the helper agents
pub fn format_conversation(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|message| {
            let speaker = match message.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            format!("{}: {}", speaker, message.content)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn critic_prompt(conversation: &str) -> String {
    format!("Conversation so far:\n\n{conversation}\n\nWhat is still unclear about how this quality should be judged?")
}

pub fn questioner_prompt(conversation: &str, critique: &str) -> String {
    format!("Conversation so far:\n\n{conversation}\n\nReviewer critique:\n\n{critique}\n\nAsk the user your follow-up questions.")
}

pub fn generator_prompt(criteria: &str, conversation: &str) -> String {
    format!(
        "Write an evaluation prompt that instructs an LLM judge to score a single output on how {criteria} it is, \
on a scale from 1 to 10. Base it on this conversation with the user:\n\n{conversation}\n\nReturn only the evaluation prompt."
    )
}
