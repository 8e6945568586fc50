use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::database::AccountStore;
use crate::errors::{AppError, Result};
use crate::models::account::{normalize_email, Account};
use crate::models::otp::{CodeState, ResetOtp};
use crate::services::clock::Clock;
use crate::services::mail_service::MailSender;
use crate::services::otp_generator::OtpGenerator;
use crate::services::password_service::PasswordService;
use crate::services::rate_limiter::RateLimiter;

/// The recovery-code lifecycle: issue, deliver, verify, consume. All state
/// lives in the store; this service owns the ordering of the checks and the
/// compensations, and the store's guarded updates make them safe under
/// concurrent submissions.
pub struct OtpService {
    store: Arc<dyn AccountStore>,
    mailer: Arc<dyn MailSender>,
    generator: OtpGenerator,
    rate_limiter: RateLimiter,
    passwords: PasswordService,
    clock: Arc<dyn Clock>,
}

impl OtpService {
    pub fn new(
        store: Arc<dyn AccountStore>,
        mailer: Arc<dyn MailSender>,
        generator: OtpGenerator,
        rate_limiter: RateLimiter,
        passwords: PasswordService,
        clock: Arc<dyn Clock>,
    ) -> Self {
        OtpService {
            store,
            mailer,
            generator,
            rate_limiter,
            passwords,
            clock,
        }
    }

    /// Minimal account provisioning so the recovery flow has something to
    /// recover. No session or token is issued.
    pub async fn register(&self, email: &str, password: &str) -> Result<()> {
        let email = normalize_email(email);
        self.passwords.validate_strength(password)?;
        let password_hash = self.passwords.hash(password)?;

        let account = Account::new(email.clone(), password_hash, self.clock.now());
        self.store.insert_account(&account).await?;

        tracing::info!("Account created for {}", email);
        Ok(())
    }

    /// Issue and deliver a fresh code. A new code replaces whatever was
    /// active before, even if that code was unexpired and unused. If
    /// delivery fails the stored code is rolled back so nobody is left
    /// believing an email is on its way. The rate-limit stamp stays, so
    /// failed deliveries cannot be used to hammer the mail provider.
    pub async fn request_code(&self, email: &str) -> Result<DateTime<Utc>> {
        let email = normalize_email(email);
        let account = self
            .store
            .find_account(&email)
            .await?
            .ok_or(AppError::NotFound)?;

        let now = self.clock.now();
        self.rate_limiter
            .check(account.last_code_requested_at(), now)?;

        let otp = self.generator.issue(now);
        if !self.store.put_reset_otp(&email, &otp).await? {
            return Err(AppError::NotFound);
        }

        if let Err(err) = self
            .mailer
            .send_reset_code(&email, &otp.code, otp.expires_at)
            .await
        {
            tracing::warn!("Code delivery to {} failed, rolling back: {}", email, err);
            self.store.clear_reset_otp(&email, &otp.code).await?;
            return Err(AppError::DeliveryFailed(err.to_string()));
        }

        tracing::info!("Recovery code issued for {}", email);
        Ok(otp.expires_at)
    }

    /// Check a submitted code. Every submission that reaches the comparison
    /// is counted against the attempt budget, including the one that
    /// matches. The exhaustion check runs before the comparison, so a
    /// correct guess after three wrong ones is still rejected.
    pub async fn verify_code(&self, email: &str, submitted: &str) -> Result<()> {
        let email = normalize_email(email);
        let otp = self.load_active_code(&email).await?;

        let now = self.clock.now();
        match otp.state(now) {
            CodeState::Consumed => return Err(AppError::AlreadyUsed),
            CodeState::Expired => return Err(AppError::Expired),
            CodeState::Exhausted => return Err(AppError::AttemptsExhausted),
            CodeState::Active => {}
        }

        let matched = constant_time_eq(submitted, &otp.code);
        match self.store.record_attempt(&email, &otp.code, matched).await? {
            Some(_) if matched => {
                tracing::info!("Recovery code verified for {}", email);
                Ok(())
            }
            Some(updated) => Err(AppError::InvalidCode {
                attempts_remaining: updated.attempts_remaining(),
            }),
            // The guard missed: the record was consumed, exhausted or
            // replaced between the snapshot and the increment.
            None => Err(self.classify_stale(&email, now).await?),
        }
    }

    /// Exchange a code for a new credential. Validity is re-checked from a
    /// fresh snapshot (a verify-then-wait replay gains nothing), and the
    /// credential swap and consumption land in one atomic store update. A
    /// reset without a prior verify runs the same attempt accounting as
    /// `verify_code`; a record verified on its final allowed attempt skips
    /// it, since that budget was already spent legitimately.
    pub async fn reset_password(
        &self,
        email: &str,
        submitted: &str,
        new_password: &str,
    ) -> Result<()> {
        let email = normalize_email(email);

        // Pure input check; rejecting a weak password must not burn an
        // attempt or touch the record.
        self.passwords.validate_strength(new_password)?;

        let otp = self.load_active_code(&email).await?;
        let now = self.clock.now();

        match otp.state(now) {
            CodeState::Consumed => return Err(AppError::AlreadyUsed),
            CodeState::Expired => return Err(AppError::Expired),
            CodeState::Exhausted | CodeState::Active => {}
        }

        let matched = constant_time_eq(submitted, &otp.code);
        let previously_verified = otp.verified && matched;

        if !previously_verified {
            if otp.state(now) == CodeState::Exhausted {
                return Err(AppError::AttemptsExhausted);
            }

            match self.store.record_attempt(&email, &otp.code, matched).await? {
                Some(_) if matched => {}
                Some(updated) => {
                    return Err(AppError::InvalidCode {
                        attempts_remaining: updated.attempts_remaining(),
                    })
                }
                None => return Err(self.classify_stale(&email, now).await?),
            }
        }

        let password_hash = self.passwords.hash(new_password)?;
        let done = self
            .store
            .complete_reset(&email, &otp.code, &password_hash, now)
            .await?;
        if !done {
            return Err(self.classify_stale(&email, now).await?);
        }

        tracing::info!("Password reset completed for {}", email);
        Ok(())
    }

    async fn load_active_code(&self, email: &str) -> Result<ResetOtp> {
        self.store
            .find_account(email)
            .await?
            .and_then(|account| account.reset_otp)
            .ok_or(AppError::NotFound)
    }

    /// A guarded update missed its filter: re-read and name the reason.
    async fn classify_stale(&self, email: &str, now: DateTime<Utc>) -> Result<AppError> {
        let Some(otp) = self
            .store
            .find_account(email)
            .await?
            .and_then(|account| account.reset_otp)
        else {
            return Ok(AppError::NotFound);
        };

        Ok(match otp.state(now) {
            CodeState::Consumed => AppError::AlreadyUsed,
            CodeState::Expired => AppError::Expired,
            CodeState::Exhausted => AppError::AttemptsExhausted,
            // Still active but our guard missed: the code was superseded
            // mid-flight, so the one we were checking no longer exists.
            CodeState::Active => AppError::NotFound,
        })
    }
}

/// Compare codes without leaking the position of the first mismatch
/// through timing.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}
