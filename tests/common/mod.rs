use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use recovery_api::database::memory::InMemoryAccountStore;
use recovery_api::services::clock::ManualClock;
use recovery_api::services::mail_service::{MailError, MailSender};
use recovery_api::services::otp_generator::{CodeSource, OtpGenerator};
use recovery_api::services::otp_service::OtpService;
use recovery_api::services::password_service::PasswordService;
use recovery_api::services::rate_limiter::RateLimiter;

pub const EMAIL: &str = "a@example.com";
pub const ORIGINAL_PASSWORD: &str = "original-password";

/// Every test starts at the same instant and moves time explicitly.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

/// Deterministic code source: hands out the scripted codes in order.
pub struct ScriptedCodes {
    codes: Mutex<VecDeque<String>>,
}

impl ScriptedCodes {
    pub fn new(codes: &[&str]) -> Self {
        ScriptedCodes {
            codes: Mutex::new(codes.iter().map(|c| c.to_string()).collect()),
        }
    }
}

impl CodeSource for ScriptedCodes {
    fn next_code(&self) -> String {
        self.codes
            .lock()
            .unwrap()
            .pop_front()
            .expect("test script ran out of codes")
    }
}

/// Mailer that records what it was asked to send and can be told to fail.
#[derive(Default)]
pub struct StubMailer {
    pub sent: Mutex<Vec<(String, String)>>,
    failing: Mutex<bool>,
}

impl StubMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    pub fn sent_codes(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailSender for StubMailer {
    async fn send_reset_code(
        &self,
        to: &str,
        code: &str,
        _expires_at: DateTime<Utc>,
    ) -> Result<(), MailError> {
        if *self.failing.lock().unwrap() {
            return Err(MailError("mail provider unavailable".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), code.to_string()));
        Ok(())
    }
}

/// The assembled service plus handles on its collaborators so tests can
/// move the clock, inspect deliveries and read stored state.
pub struct Harness {
    pub service: OtpService,
    pub store: Arc<InMemoryAccountStore>,
    pub clock: Arc<ManualClock>,
    pub mailer: Arc<StubMailer>,
}

impl Harness {
    /// Stored state of the account's active code, if any.
    pub async fn stored_otp(&self) -> Option<recovery_api::models::otp::ResetOtp> {
        use recovery_api::database::AccountStore;
        self.store
            .find_account(EMAIL)
            .await
            .unwrap()
            .and_then(|account| account.reset_otp)
    }

    pub async fn stored_password_hash(&self) -> String {
        use recovery_api::database::AccountStore;
        self.store
            .find_account(EMAIL)
            .await
            .unwrap()
            .expect("account should exist")
            .password_hash
    }
}

/// Build the service around the in-memory store with a pinned clock and
/// the given code script, and register the test account.
pub async fn harness(codes: &[&str]) -> Harness {
    let store = Arc::new(InMemoryAccountStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let mailer = Arc::new(StubMailer::new());
    let generator = OtpGenerator::new(Arc::new(ScriptedCodes::new(codes)));

    let service = OtpService::new(
        store.clone(),
        mailer.clone(),
        generator,
        RateLimiter::new(),
        PasswordService::with_cost(4),
        clock.clone(),
    );

    service
        .register(EMAIL, ORIGINAL_PASSWORD)
        .await
        .expect("test account registration failed");

    Harness {
        service,
        store,
        clock,
        mailer,
    }
}
