//! Session memory: the ordered (question, answer) turns for the current
//! conversation. Append-only while active; reset replaces the whole
//! instance. The window is capped so long sessions do not grow the prompt
//! without bound; the oldest turn is dropped once the cap is reached.

use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationMemory {
    turns: VecDeque<Turn>,
    max_turns: usize,
}

impl ConversationMemory {
    #[inline]
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: VecDeque::with_capacity(max_turns.min(64)),
            max_turns,
        }
    }

    #[inline]
    pub fn push(&mut self, question: &str, answer: &str) {
        if self.turns.len() == self.max_turns {
            self.turns.pop_front();
        }
        self.turns.push_back(Turn {
            question: question.to_string(),
            answer: answer.to_string(),
        });
    }

    /// Turns in conversation order, oldest first.
    #[inline]
    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
