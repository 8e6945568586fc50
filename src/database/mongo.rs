use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::{self, doc};
use mongodb::options::{IndexOptions, ReturnDocument};
use mongodb::{Collection, Database, IndexModel};

use crate::database::AccountStore;
use crate::errors::{AppError, Result};
use crate::models::account::Account;
use crate::models::otp::ResetOtp;

const ACCOUNTS: &str = "accounts";

/// Mongo-backed store. The recovery code lives inside the account document,
/// so every guard below is enforced by a single atomic document update.
#[derive(Clone)]
pub struct MongoAccountStore {
    db: Database,
}

impl MongoAccountStore {
    pub fn new(db: Database) -> Self {
        MongoAccountStore { db }
    }

    fn accounts(&self) -> Collection<Account> {
        self.db.collection(ACCOUNTS)
    }
}

/// Unique index on email; lookups and the one-active-code-per-account rule
/// both key on it.
pub async fn ensure_indexes(db: &Database) -> Result<()> {
    let index = IndexModel::builder()
        .keys(doc! { "email": 1 })
        .options(IndexOptions::builder().unique(true).build())
        .build();

    db.collection::<Account>(ACCOUNTS).create_index(index).await?;
    Ok(())
}

#[async_trait]
impl AccountStore for MongoAccountStore {
    async fn find_account(&self, email: &str) -> Result<Option<Account>> {
        Ok(self.accounts().find_one(doc! { "email": email }).await?)
    }

    async fn insert_account(&self, account: &Account) -> Result<()> {
        match self.accounts().insert_one(account).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(AppError::DuplicateAccount),
            Err(e) => Err(e.into()),
        }
    }

    async fn put_reset_otp(&self, email: &str, otp: &ResetOtp) -> Result<bool> {
        let otp_bson = bson::to_bson(otp)
            .map_err(|e| AppError::Internal(format!("BSON conversion failed: {}", e)))?;
        let stamp = bson::DateTime::from_chrono(otp.created_at);

        let result = self
            .accounts()
            .update_one(
                doc! { "email": email },
                doc! {
                    "$set": {
                        "reset_otp": otp_bson,
                        "reset_requested_at": stamp,
                        "updated_at": stamp,
                    }
                },
            )
            .await?;

        Ok(result.matched_count > 0)
    }

    async fn clear_reset_otp(&self, email: &str, code: &str) -> Result<()> {
        self.accounts()
            .update_one(
                doc! {
                    "email": email,
                    "reset_otp.code": code,
                    "reset_otp.consumed": false,
                },
                doc! { "$unset": { "reset_otp": "" } },
            )
            .await?;
        Ok(())
    }

    async fn record_attempt(
        &self,
        email: &str,
        code: &str,
        mark_verified: bool,
    ) -> Result<Option<ResetOtp>> {
        let mut update = doc! { "$inc": { "reset_otp.attempts": 1 } };
        if mark_verified {
            update.insert("$set", doc! { "reset_otp.verified": true });
        }

        let updated = self
            .accounts()
            .find_one_and_update(
                doc! {
                    "email": email,
                    "reset_otp.code": code,
                    "reset_otp.consumed": false,
                    // $expr lets the filter compare two fields of the same
                    // document, which is what keeps attempts from ever
                    // passing max_attempts under concurrent submissions.
                    "$expr": { "$lt": ["$reset_otp.attempts", "$reset_otp.max_attempts"] },
                },
                update,
            )
            .return_document(ReturnDocument::After)
            .await?;

        Ok(updated.and_then(|account| account.reset_otp))
    }

    async fn complete_reset(
        &self,
        email: &str,
        code: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let now_bson = bson::DateTime::from_chrono(now);

        let result = self
            .accounts()
            .update_one(
                doc! {
                    "email": email,
                    "reset_otp.code": code,
                    "reset_otp.consumed": false,
                    "reset_otp.expires_at": { "$gt": now_bson },
                },
                doc! {
                    "$set": {
                        "password_hash": new_password_hash,
                        "reset_otp.consumed": true,
                        "updated_at": now_bson,
                    }
                },
            )
            .await?;

        Ok(result.matched_count > 0)
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(we)) if we.code == 11000
    )
}
