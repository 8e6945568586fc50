use chrono::{DateTime, Utc};
use mongodb::bson;
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::models::otp::ResetOtp;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,
    pub email: String,
    pub password_hash: String,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_otp: Option<ResetOtp>,

    // Stamp of the last code-generation request. Lives outside the record
    // so a rolled-back delivery still counts against the rate limit.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reset_requested_at: Option<bson::DateTime>,
}

impl Account {
    pub fn new(email: String, password_hash: String, now: DateTime<Utc>) -> Self {
        Account {
            _id: None,
            email,
            password_hash,
            created_at: now,
            updated_at: now,
            reset_otp: None,
            reset_requested_at: None,
        }
    }

    pub fn last_code_requested_at(&self) -> Option<DateTime<Utc>> {
        self.reset_requested_at.map(|d| d.to_chrono())
    }
}

/// Account identifiers are emails; trim and lowercase so lookups and
/// rate-limit keys agree no matter how the client spells it.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_trims_and_lowercases() {
        assert_eq!(normalize_email("  A@Example.COM "), "a@example.com");
        assert_eq!(normalize_email("a@example.com"), "a@example.com");
    }
}
