//! Input validation errors for hedge calculations

use std::fmt;

/// Reasons a hedge request is rejected before any computation runs
#[derive(Debug, Clone, PartialEq)]
pub enum HedgeError {
    InvalidBudget(f64),
    InvalidFee(f64),
    InvalidExitThreshold(f64),
    InvalidSimulation(String),
    UnknownGroup(String),
    UnknownTicker(String),
}

impl HedgeError {
    /// True when the caller referenced something that does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, HedgeError::UnknownGroup(_))
    }
}

impl fmt::Display for HedgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HedgeError::InvalidBudget(b) => write!(f, "Budget must be a positive number (got {})", b),
            HedgeError::InvalidFee(fee) => {
                write!(f, "Fee per contract must be a non-negative number (got {})", fee)
            }
            HedgeError::InvalidExitThreshold(t) => {
                write!(f, "exitThreshold must be between 0 and 1 (got {})", t)
            }
            HedgeError::InvalidSimulation(msg) => write!(f, "Invalid simulation parameters: {}", msg),
            HedgeError::UnknownGroup(id) => write!(f, "Group {} not found", id),
            HedgeError::UnknownTicker(t) => write!(f, "Ticker {} is not part of this group", t),
        }
    }
}

impl std::error::Error for HedgeError {}
