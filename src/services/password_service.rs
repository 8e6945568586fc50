use bcrypt::DEFAULT_COST;

use crate::errors::{AppError, Result};

const MIN_PASSWORD_LEN: usize = 8;

/// Credential policy and hashing for the reset flow. Policy rejection is a
/// `WeakCredential` and happens before any state is touched.
#[derive(Clone)]
pub struct PasswordService {
    cost: u32,
}

impl PasswordService {
    pub fn new() -> Self {
        PasswordService { cost: DEFAULT_COST }
    }

    /// Lower-cost variant for tests; DEFAULT_COST hashing dominates test
    /// runtime otherwise.
    pub fn with_cost(cost: u32) -> Self {
        PasswordService { cost }
    }

    pub fn validate_strength(&self, password: &str) -> Result<()> {
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::WeakCredential(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        Ok(())
    }

    pub fn hash(&self, password: &str) -> Result<String> {
        Ok(bcrypt::hash(password, self.cost)?)
    }

    pub fn verify(&self, password: &str, hash: &str) -> Result<bool> {
        Ok(bcrypt::verify(password, hash)?)
    }
}

impl Default for PasswordService {
    fn default() -> Self {
        Self::new()
    }
}
