//! Error types surfaced by the adventure core.
//!
//! Most failures never reach the player: collaborators degrade to fallbacks
//! and clamped mutations are not errors. What remains is listed here.
use thiserror::Error;

use crate::director::BattleTicket;

/// Failure reported by an external collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("collaborator returned a malformed payload: {0}")]
    Malformed(String),

    #[error("collaborator returned an empty result")]
    Empty,
}

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("failed to parse content asset `{asset}`")]
    Parse {
        asset: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read content asset {}", path.display())]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unknown boss profile `{0}`")]
    UnknownBoss(String),
}

#[derive(Debug, Error)]
pub enum DirectorError {
    #[error(transparent)]
    Content(#[from] ContentError),

    #[error("no boss decision is pending")]
    NoBossDecisionPending,

    #[error("deferred adventure task failed")]
    TaskJoin(#[source] tokio::task::JoinError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MerchantError {
    #[error("no offer `{0}` in this stock")]
    UnknownOffer(String),

    #[error("offer `{0}` is already sold")]
    SoldOut(String),

    #[error("offer costs {price} spirit stones but only {available} are held")]
    InsufficientFunds { price: i64, available: i64 },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BattleResultError {
    #[error("no interactive battle is awaiting a result")]
    NotAwaiting,

    #[error("battle result for ticket {received} does not match awaited ticket {expected}")]
    TicketMismatch {
        expected: BattleTicket,
        received: BattleTicket,
    },
}
