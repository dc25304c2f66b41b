/// Password Hashing and Verification
///
/// bcrypt hashes are self-describing (`$2b$<cost>$<salt><digest>`) and salted,
/// so hashing the same password twice yields two different strings.

use bcrypt::{hash, verify};

use crate::error::{AppError, ValidationError};

/// bcrypt only reads the first 72 bytes; longer inputs are refused rather than truncated
const MAX_PASSWORD_BYTES: usize = 72;

#[derive(Clone)]
pub struct HashEncoder {
    cost: u32,
    /// Verified against when the stored hash is malformed, so that path costs
    /// the same as a wrong password
    dummy_hash: String,
}

impl HashEncoder {
    /// # Errors
    /// Returns error if `cost` is outside bcrypt's accepted range (4..=31)
    pub fn new(cost: u32) -> Result<Self, AppError> {
        let dummy_hash = hash("dummy-password", cost)
            .map_err(|e| AppError::Internal(format!("Invalid bcrypt cost {}: {}", cost, e)))?;
        Ok(Self { cost, dummy_hash })
    }

    /// Hash a password
    ///
    /// # Errors
    /// Returns error if the password is empty or too long, or if bcrypt fails
    pub fn encode(&self, raw_password: &str) -> Result<String, AppError> {
        validate_password(raw_password)?;

        hash(raw_password, self.cost)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
    }

    /// Check `raw_password` against a stored hash. A malformed hash never
    /// errors, it simply does not match.
    pub fn matches(&self, raw_password: &str, hashed: &str) -> bool {
        match verify(raw_password, hashed) {
            Ok(is_valid) => is_valid,
            Err(e) => {
                tracing::warn!("Stored password hash is malformed: {}", e);
                self.burn(raw_password);
                false
            }
        }
    }

    /// Spend one verification's worth of time without checking anything.
    /// Login calls this for unknown accounts.
    pub fn burn(&self, raw_password: &str) {
        let _ = verify(raw_password, &self.dummy_hash);
    }
}

/// Input checks shared by registration and login
pub fn validate_password(password: &str) -> Result<(), AppError> {
    if password.is_empty() {
        return Err(ValidationError::EmptyField("password".to_string()).into());
    }

    if password.len() > MAX_PASSWORD_BYTES {
        return Err(
            ValidationError::TooLong("password".to_string(), MAX_PASSWORD_BYTES).into(),
        );
    }

    Ok(())
}
