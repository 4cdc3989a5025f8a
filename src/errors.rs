use thiserror::Error;

/// Unified error types for the battle engine
#[derive(Error, Debug)]
pub enum BattleError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid state for {entity} {id}: {detail}")]
    InvalidState {
        entity: &'static str,
        id: String,
        detail: String,
    },

    #[error("{entity} {id} has expired")]
    Expired { entity: &'static str, id: String },

    #[error("Action rejected: cooldown of {cooldown_ms}ms has not elapsed")]
    RateLimited { cooldown_ms: i64 },

    #[error("Round {round_number} already recorded for battle {battle_id}")]
    ConcurrencyConflict {
        battle_id: uuid::Uuid,
        round_number: u32,
    },

    #[error("Daily battle limit of {limit} reached for user {user_id}")]
    DailyLimitExceeded { user_id: uuid::Uuid, limit: u32 },

    #[error("Actor mailbox error: {0}")]
    Mailbox(#[from] actix::MailboxError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Result type alias for battle engine operations
pub type BattleResult<T> = Result<T, BattleError>;

impl BattleError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid_state(
        entity: &'static str,
        id: impl ToString,
        detail: impl Into<String>,
    ) -> Self {
        Self::InvalidState {
            entity,
            id: id.to_string(),
            detail: detail.into(),
        }
    }

    pub fn expired(entity: &'static str, id: impl ToString) -> Self {
        Self::Expired {
            entity,
            id: id.to_string(),
        }
    }
}
