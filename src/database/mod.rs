use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::Result;
use crate::models::account::Account;
use crate::models::otp::ResetOtp;

pub mod connection;
pub mod memory;
pub mod mongo;

/// Persistence contract the recovery flow depends on. Accounts embed their
/// active recovery code, so every mutation below is a single-record
/// operation and the guards ride inside the store's own atomic update.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Point lookup by normalized email.
    async fn find_account(&self, email: &str) -> Result<Option<Account>>;

    /// Insert a new account; `DuplicateAccount` if the email is taken.
    async fn insert_account(&self, account: &Account) -> Result<()>;

    /// Store a freshly issued code, replacing any prior one, and stamp
    /// `reset_requested_at` with the code's creation time. Returns false if
    /// the account no longer exists.
    async fn put_reset_otp(&self, email: &str, otp: &ResetOtp) -> Result<bool>;

    /// Compensating delete after a failed delivery. Guarded by `code` so a
    /// concurrently issued replacement is never clobbered; the request
    /// stamp is left in place.
    async fn clear_reset_otp(&self, email: &str, code: &str) -> Result<()>;

    /// Atomically increment the attempt counter, guarded by
    /// `code` / unconsumed / `attempts < max_attempts`, optionally marking
    /// the record verified in the same write. Returns the post-increment
    /// record, or `None` when the guard missed (consumed, exhausted or
    /// superseded in the meantime).
    async fn record_attempt(
        &self,
        email: &str,
        code: &str,
        mark_verified: bool,
    ) -> Result<Option<ResetOtp>>;

    /// Atomically swap the credential and mark the code consumed in one
    /// record update, guarded by `code` / unconsumed / unexpired. Returns
    /// false when the guard missed.
    async fn complete_reset(
        &self,
        email: &str,
        code: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool>;
}
