use chrono::{DateTime, Utc};
use mongodb::bson;
use serde::{Deserialize, Serialize};

/// The active recovery code embedded in an account document. At most one
/// exists per account; issuing a new code replaces it wholesale.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ResetOtp {
    pub code: String, // 6-digit, zero-padded, compared as a string

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub expires_at: DateTime<Utc>,

    pub consumed: bool,
    pub verified: bool,
    pub attempts: i32,
    pub max_attempts: i32,
}

/// Effective state of a recovery code, derived from the stored fields and
/// the current time. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeState {
    Active,
    Expired,
    Exhausted,
    Consumed,
}

impl ResetOtp {
    /// Consumed wins over expired, expired over exhausted. `now` equal to
    /// `expires_at` already counts as expired, so a submission racing the
    /// boundary cannot slip through.
    pub fn state(&self, now: DateTime<Utc>) -> CodeState {
        if self.consumed {
            CodeState::Consumed
        } else if now >= self.expires_at {
            CodeState::Expired
        } else if self.attempts >= self.max_attempts {
            CodeState::Exhausted
        } else {
            CodeState::Active
        }
    }

    pub fn attempts_remaining(&self) -> i32 {
        (self.max_attempts - self.attempts).max(0)
    }
}
