use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use std::sync::Arc;

use crate::models::otp::ResetOtp;

/// Codes stay valid for ten minutes.
pub const CODE_TTL_MINUTES: i64 = 10;

/// Three guesses per code, then a fresh one must be requested.
pub const MAX_ATTEMPTS: i32 = 3;

const CODE_DIGITS: usize = 6;

/// Source of recovery codes. Production draws from the OS-seeded CSPRNG;
/// tests substitute a scripted sequence.
pub trait CodeSource: Send + Sync {
    fn next_code(&self) -> String;
}

/// `thread_rng` is a ChaCha-based CSPRNG reseeded from the OS. It aborts if
/// the entropy source is unavailable rather than degrading to something
/// guessable.
pub struct RandomCodeSource;

impl CodeSource for RandomCodeSource {
    fn next_code(&self) -> String {
        let mut rng = rand::thread_rng();
        format!("{:0width$}", rng.gen_range(0..1_000_000u32), width = CODE_DIGITS)
    }
}

/// Builds fresh recovery codes. Pure with respect to storage; the caller
/// decides when and whether the record is persisted.
pub struct OtpGenerator {
    source: Arc<dyn CodeSource>,
    ttl: Duration,
}

impl OtpGenerator {
    pub fn new(source: Arc<dyn CodeSource>) -> Self {
        OtpGenerator {
            source,
            ttl: Duration::minutes(CODE_TTL_MINUTES),
        }
    }

    pub fn issue(&self, now: DateTime<Utc>) -> ResetOtp {
        ResetOtp {
            code: self.source.next_code(),
            created_at: now,
            expires_at: now + self.ttl,
            consumed: false,
            verified: false,
            attempts: 0,
            max_attempts: MAX_ATTEMPTS,
        }
    }
}
