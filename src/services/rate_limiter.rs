use chrono::{DateTime, Duration, Utc};

use crate::errors::{AppError, Result};

/// Minimum spacing between code-generation requests for one account.
pub const REQUEST_COOLDOWN_MINUTES: i64 = 2;

/// Gate on code generation. Works off the account's last-request stamp, so
/// the window applies whether or not the previous code is still active, and
/// a denied request leaves everything untouched.
pub struct RateLimiter {
    cooldown: Duration,
}

impl RateLimiter {
    pub fn new() -> Self {
        RateLimiter {
            cooldown: Duration::minutes(REQUEST_COOLDOWN_MINUTES),
        }
    }

    pub fn check(&self, last_requested: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Result<()> {
        let Some(last) = last_requested else {
            return Ok(());
        };

        let elapsed = now - last;
        if elapsed >= self.cooldown {
            return Ok(());
        }

        let remaining = self.cooldown - elapsed;
        Err(AppError::RateLimited {
            retry_after_seconds: seconds_rounded_up(remaining),
        })
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

// A 200ms remainder reported as "retry in 0s" would invite a retry that is
// denied again, so partial seconds round up.
fn seconds_rounded_up(d: Duration) -> i64 {
    let millis = d.num_milliseconds().max(0);
    (millis + 999) / 1000
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn first_request_is_allowed() {
        assert!(RateLimiter::new().check(None, t0()).is_ok());
    }

    #[test]
    fn request_inside_the_window_is_denied_with_wait_time() {
        let limiter = RateLimiter::new();
        let err = limiter
            .check(Some(t0()), t0() + Duration::seconds(30))
            .unwrap_err();

        match err {
            AppError::RateLimited {
                retry_after_seconds,
            } => assert_eq!(retry_after_seconds, 90),
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[test]
    fn partial_seconds_round_up() {
        let limiter = RateLimiter::new();
        let err = limiter
            .check(
                Some(t0()),
                t0() + Duration::seconds(119) + Duration::milliseconds(500),
            )
            .unwrap_err();

        match err {
            AppError::RateLimited {
                retry_after_seconds,
            } => assert_eq!(retry_after_seconds, 1),
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[test]
    fn request_at_the_window_boundary_is_allowed() {
        let limiter = RateLimiter::new();
        assert!(limiter.check(Some(t0()), t0() + Duration::minutes(2)).is_ok());
        assert!(limiter
            .check(Some(t0()), t0() + Duration::minutes(2) - Duration::seconds(1))
            .is_err());
    }
}
