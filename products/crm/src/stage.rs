use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pipeline stage a deal occupies. Declaration order is board order.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Lead,
    Qualified,
    Proposal,
    Negotiation,
    Closed,
}

#[derive(Debug, Error, Clone, Eq, PartialEq)]
#[error("unknown stage {0:?}")]
pub struct InvalidStage(pub String);

/// Result of asking to move a deal from one stage to another.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Transition {
    Unchanged,
    Move { from: Stage, to: Stage },
}

impl Transition {
    pub fn is_move(self) -> bool {
        matches!(self, Transition::Move { .. })
    }
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Lead,
        Stage::Qualified,
        Stage::Proposal,
        Stage::Negotiation,
        Stage::Closed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Lead => "lead",
            Stage::Qualified => "qualified",
            Stage::Proposal => "proposal",
            Stage::Negotiation => "negotiation",
            Stage::Closed => "closed",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::Lead => "Lead",
            Stage::Qualified => "Qualified",
            Stage::Proposal => "Proposal",
            Stage::Negotiation => "Negotiation",
            Stage::Closed => "Closed Won",
        }
    }

    /// Position on the board, starting at zero.
    pub fn position(self) -> usize {
        self as usize
    }

    /// Every pair of distinct stages is a legal move; only a self-transition
    /// is classified as unchanged.
    pub fn transition_to(self, to: Stage) -> Transition {
        if self == to {
            Transition::Unchanged
        } else {
            Transition::Move { from: self, to }
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = InvalidStage;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "lead" => Ok(Stage::Lead),
            "qualified" => Ok(Stage::Qualified),
            "proposal" => Ok(Stage::Proposal),
            "negotiation" => Ok(Stage::Negotiation),
            "closed" => Ok(Stage::Closed),
            _ => Err(InvalidStage(value.to_string())),
        }
    }
}
