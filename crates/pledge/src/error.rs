//! Rejection reasons carried by the rejection channel

use serde::Serialize;
use thiserror::Error;

use crate::promise::PromiseId;

/// Why a promise was rejected
///
/// Serializes untagged, so a plain reason appears as its string.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Rejection {
    /// Reason supplied by user code (a rejected executor, a failing handler)
    #[error("{0}")]
    Reason(String),

    /// A promise was resolved with itself
    #[error("Chaining cycle detected for {0}")]
    ChainingCycle(PromiseId),

    /// Every input of `any` rejected; reasons are in input order
    #[error("All promises were rejected ({count} reasons)", count = .reasons.len())]
    Aggregate { reasons: Vec<Rejection> },
}

impl Rejection {
    /// Build a plain reason from anything printable
    pub fn reason(reason: impl std::fmt::Display) -> Self {
        Rejection::Reason(reason.to_string())
    }

    /// Returns true if this is a chaining cycle violation
    pub fn is_cycle(&self) -> bool {
        matches!(self, Rejection::ChainingCycle(_))
    }

    /// Individual reasons of an aggregate rejection
    pub fn aggregate_reasons(&self) -> Option<&[Rejection]> {
        match self {
            Rejection::Aggregate { reasons } => Some(reasons),
            _ => None,
        }
    }
}

impl From<&str> for Rejection {
    fn from(reason: &str) -> Self {
        Rejection::Reason(reason.to_string())
    }
}

impl From<String> for Rejection {
    fn from(reason: String) -> Self {
        Rejection::Reason(reason)
    }
}
