use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson;
use mongodb::bson::oid::ObjectId;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::database::AccountStore;
use crate::errors::{AppError, Result};
use crate::models::account::Account;
use crate::models::otp::ResetOtp;

/// In-memory store with the same guard semantics as the Mongo
/// implementation. Backs the test suites and local experimentation; the
/// single mutex stands in for Mongo's per-document atomicity.
#[derive(Default)]
pub struct InMemoryAccountStore {
    accounts: Mutex<HashMap<String, Account>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Account>> {
        self.accounts.lock().expect("account map lock poisoned")
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn find_account(&self, email: &str) -> Result<Option<Account>> {
        Ok(self.lock().get(email).cloned())
    }

    async fn insert_account(&self, account: &Account) -> Result<()> {
        let mut accounts = self.lock();
        if accounts.contains_key(&account.email) {
            return Err(AppError::DuplicateAccount);
        }

        let mut account = account.clone();
        account._id = Some(ObjectId::new());
        accounts.insert(account.email.clone(), account);
        Ok(())
    }

    async fn put_reset_otp(&self, email: &str, otp: &ResetOtp) -> Result<bool> {
        let mut accounts = self.lock();
        let Some(account) = accounts.get_mut(email) else {
            return Ok(false);
        };

        account.reset_otp = Some(otp.clone());
        account.reset_requested_at = Some(bson::DateTime::from_chrono(otp.created_at));
        account.updated_at = otp.created_at;
        Ok(true)
    }

    async fn clear_reset_otp(&self, email: &str, code: &str) -> Result<()> {
        let mut accounts = self.lock();
        if let Some(account) = accounts.get_mut(email) {
            let matches = account
                .reset_otp
                .as_ref()
                .is_some_and(|otp| otp.code == code && !otp.consumed);
            if matches {
                account.reset_otp = None;
            }
        }
        Ok(())
    }

    async fn record_attempt(
        &self,
        email: &str,
        code: &str,
        mark_verified: bool,
    ) -> Result<Option<ResetOtp>> {
        let mut accounts = self.lock();
        let Some(account) = accounts.get_mut(email) else {
            return Ok(None);
        };
        let Some(otp) = account.reset_otp.as_mut() else {
            return Ok(None);
        };

        if otp.code != code || otp.consumed || otp.attempts >= otp.max_attempts {
            return Ok(None);
        }

        otp.attempts += 1;
        if mark_verified {
            otp.verified = true;
        }
        Ok(Some(otp.clone()))
    }

    async fn complete_reset(
        &self,
        email: &str,
        code: &str,
        new_password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut accounts = self.lock();
        let Some(account) = accounts.get_mut(email) else {
            return Ok(false);
        };
        let Some(otp) = account.reset_otp.as_mut() else {
            return Ok(false);
        };

        if otp.code != code || otp.consumed || otp.expires_at <= now {
            return Ok(false);
        }

        otp.consumed = true;
        account.password_hash = new_password_hash.to_string();
        account.updated_at = now;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn otp(code: &str) -> ResetOtp {
        ResetOtp {
            code: code.to_string(),
            created_at: t0(),
            expires_at: t0() + Duration::minutes(10),
            consumed: false,
            verified: false,
            attempts: 0,
            max_attempts: 3,
        }
    }

    async fn store_with_account() -> InMemoryAccountStore {
        let store = InMemoryAccountStore::new();
        store
            .insert_account(&Account::new(
                "a@example.com".into(),
                "hash".into(),
                t0(),
            ))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let store = store_with_account().await;
        let err = store
            .insert_account(&Account::new("a@example.com".into(), "other".into(), t0()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateAccount));
    }

    #[tokio::test]
    async fn attempts_never_pass_the_cap() {
        let store = store_with_account().await;
        store.put_reset_otp("a@example.com", &otp("123456")).await.unwrap();

        for expected in 1..=3 {
            let updated = store
                .record_attempt("a@example.com", "123456", false)
                .await
                .unwrap()
                .expect("guard should pass");
            assert_eq!(updated.attempts, expected);
        }

        // Fourth increment is refused outright.
        let refused = store
            .record_attempt("a@example.com", "123456", false)
            .await
            .unwrap();
        assert!(refused.is_none());

        let account = store.find_account("a@example.com").await.unwrap().unwrap();
        assert_eq!(account.reset_otp.unwrap().attempts, 3);
    }

    #[tokio::test]
    async fn complete_reset_consumes_exactly_once() {
        let store = store_with_account().await;
        store.put_reset_otp("a@example.com", &otp("123456")).await.unwrap();

        let first = store
            .complete_reset("a@example.com", "123456", "new-hash", t0())
            .await
            .unwrap();
        assert!(first);

        let second = store
            .complete_reset("a@example.com", "123456", "other-hash", t0())
            .await
            .unwrap();
        assert!(!second);

        let account = store.find_account("a@example.com").await.unwrap().unwrap();
        assert_eq!(account.password_hash, "new-hash");
        assert!(account.reset_otp.unwrap().consumed);
    }

    #[tokio::test]
    async fn complete_reset_refuses_expired_codes() {
        let store = store_with_account().await;
        store.put_reset_otp("a@example.com", &otp("123456")).await.unwrap();

        let at_boundary = store
            .complete_reset(
                "a@example.com",
                "123456",
                "new-hash",
                t0() + Duration::minutes(10),
            )
            .await
            .unwrap();
        assert!(!at_boundary);
    }

    #[tokio::test]
    async fn new_code_supersedes_the_old_one() {
        let store = store_with_account().await;
        store.put_reset_otp("a@example.com", &otp("111111")).await.unwrap();
        store.put_reset_otp("a@example.com", &otp("222222")).await.unwrap();

        // Guards keyed on the old code no longer match anything.
        let stale = store
            .record_attempt("a@example.com", "111111", false)
            .await
            .unwrap();
        assert!(stale.is_none());

        let account = store.find_account("a@example.com").await.unwrap().unwrap();
        assert_eq!(account.reset_otp.unwrap().code, "222222");
    }

    #[tokio::test]
    async fn clear_is_guarded_by_code() {
        let store = store_with_account().await;
        store.put_reset_otp("a@example.com", &otp("111111")).await.unwrap();

        // A stale rollback for a superseded code must not clobber the
        // replacement.
        store.put_reset_otp("a@example.com", &otp("222222")).await.unwrap();
        store.clear_reset_otp("a@example.com", "111111").await.unwrap();

        let account = store.find_account("a@example.com").await.unwrap().unwrap();
        assert!(account.reset_otp.is_some());
        assert!(account.reset_requested_at.is_some());

        store.clear_reset_otp("a@example.com", "222222").await.unwrap();
        let account = store.find_account("a@example.com").await.unwrap().unwrap();
        assert!(account.reset_otp.is_none());
        // The request stamp survives the rollback.
        assert!(account.reset_requested_at.is_some());
    }
}
