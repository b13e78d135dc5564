//! Player-facing command rejections.
//!
//! Every variant is recoverable and scoped to a single command: it is
//! reported back to the originating player only and never interrupts the
//! round loop or affects other players.

use crate::game::Phase;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Error)]
pub enum EngineError {
    #[error("bet amount must be greater than zero")]
    InvalidAmount,
    #[error("insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: u64, available: u64 },
    #[error("player already has an active bet this round")]
    DuplicateActiveBet,
    #[error("no matching active bet")]
    BetNotFound,
    #[error("bet is already settled")]
    AlreadySettled,
    #[error("{action} is not allowed while the round is {}", .phase.as_str())]
    WrongPhase { action: &'static str, phase: Phase },
}

impl EngineError {
    /// Stable machine-readable code for the wire error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::InvalidAmount => "INVALID_AMOUNT",
            EngineError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            EngineError::DuplicateActiveBet => "DUPLICATE_ACTIVE_BET",
            EngineError::BetNotFound => "BET_NOT_FOUND",
            EngineError::AlreadySettled => "ALREADY_SETTLED",
            EngineError::WrongPhase { .. } => "WRONG_PHASE",
        }
    }
}
