//! In-memory conversation state for one invocation.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

/// Ordered transcript, opaque session token, round counter, and credit total.
///
/// Credits only accumulate; rounds only move forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    turns: Vec<Turn>,
    session: Option<String>,
    rounds: u32,
    credits: u64,
}

impl Conversation {
    pub fn new(request: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn {
                role: Role::User,
                content: request.into(),
            }],
            session: None,
            rounds: 0,
            credits: 0,
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }

    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    pub fn credits(&self) -> u64 {
        self.credits
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.turns.push(Turn {
            role: Role::User,
            content: content.into(),
        });
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.turns.push(Turn {
            role: Role::Assistant,
            content: content.into(),
        });
    }

    /// Account for one completed remote round.
    ///
    /// A missing session token keeps the previous one.
    pub fn record_round(&mut self, credits: u64, session: Option<String>) {
        self.rounds += 1;
        self.credits = self.credits.saturating_add(credits);
        if let Some(token) = session.filter(|t| !t.is_empty()) {
            self.session = Some(token);
        }
    }
}
