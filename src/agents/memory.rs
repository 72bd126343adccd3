//! Conversation memory: the ordered question/answer history an agent replays
//! as context on every query.

use chrono::{DateTime, Utc};

use crate::types::LLMMessage;

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
    pub answered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct ConversationMemory {
    turns: Vec<ConversationTurn>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.turns.push(ConversationTurn {
            question: question.into(),
            answer: answer.into(),
            answered_at: Utc::now(),
        });
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// History as alternating user/assistant messages, oldest first.
    pub fn to_messages(&self) -> Vec<LLMMessage> {
        self.turns
            .iter()
            .flat_map(|t| {
                [
                    LLMMessage::user(t.question.clone()),
                    LLMMessage::assistant(t.answer.clone()),
                ]
            })
            .collect()
    }
}
