//! Request-level selectors forwarded to the remote agent.

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Named quality/cost setting selecting the remote model variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Fast,
    #[default]
    Smart,
    Deep,
}

impl ModelTier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Smart => "smart",
            Self::Deep => "deep",
        }
    }
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conversation mode. Selects the wire protocol and the remote's persona.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Full transcript each round, generic file/command actions.
    Ask,
    /// Full transcript each round, research actions enabled.
    Research,
    /// Session token plus newest message or tool results each round.
    Code,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ask => "ask",
            Self::Research => "research",
            Self::Code => "code",
        }
    }

    /// Whether rounds carry an opaque continuation token instead of the transcript.
    pub fn uses_session(self) -> bool {
        matches!(self, Self::Code)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
