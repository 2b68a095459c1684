use thiserror::Error;

pub type Result<T> = std::result::Result<T, LadderError>;

/// Every way an engine operation can be rejected.
///
/// Every variant except `Storage` is returned before any write happens, so
/// persisted state is unchanged whenever one of those comes back.
#[derive(Debug, Error)]
pub enum LadderError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("a player is already registered for account {0}")]
    DuplicateAccount(String),

    #[error("invalid tier: {0}")]
    InvalidTier(String),

    #[error("unknown character: {0}")]
    UnknownCharacter(String),

    #[error("unknown player: {0}")]
    UnknownPlayer(String),

    #[error("tiers {0} and {1} are not adjacent")]
    TierMismatch(String, String),

    #[error("winner {0} is not one of the contenders")]
    InvalidWinner(String),

    #[error("invalid result: {0}")]
    InvalidResult(String),

    #[error("both contenders resolve to player {0}")]
    DuplicateContender(u32),

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("timed out waiting for the {0} lock")]
    LockTimeout(&'static str),

    #[error("{0} kept changing underneath this operation")]
    Conflict(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl LadderError {
    /// Builds an `InvariantViolation` and reports it, since reaching one is a defect.
    pub fn invariant(message: impl Into<String>) -> Self {
        let message = message.into();
        log::error!("Invariant violation: {}", message);
        LadderError::InvariantViolation(message)
    }
}
