//! Credential Policy
//!
//! Pure rules applied to registration input, plus the one-way password
//! digest stored in place of the raw secret.
//!
//! - Names start with a letter, contain only ASCII letters and digits, and
//!   are at least 4 characters long.
//! - Emails follow the usual `local@domain` shape with dot-separated labels.
//! - Passwords need at least 8 counted characters, a digit and an uppercase
//!   letter. Only digits, letters and spaces are allowed.
//!
//! # Usage
//!
//! ```ignore
//! use postern::policy::{validate_name, validate_password, PasswordDigest};
//!
//! validate_name("Ann1")?;
//! validate_password("Passw0rd")?;
//!
//! let digest = PasswordDigest::compute("Passw0rd");
//! assert!(digest.matches("Passw0rd"));
//! ```

use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;
use subtle::ConstantTimeEq;

/// Minimum account name length
pub const MIN_NAME_LENGTH: usize = 4;

/// Minimum counted password length
pub const MIN_PASSWORD_LENGTH: usize = 8;

// ============================================================================
// Errors
// ============================================================================

/// Reason a credential was rejected.
///
/// The display text is caller-facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("User name should start with a letter and only have letters and numbers in them")]
    NamePattern,
    #[error("User name should have at least 4 characters in them")]
    NameTooShort,
    #[error("Invalid email provided")]
    InvalidEmail,
    #[error(
        "Password should be at least 8 characters with at least one number, one lowercase letter and one uppercase letter"
    )]
    WeakPassword,
}

// ============================================================================
// Name and Email
// ============================================================================

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z][A-Za-z0-9]+$").unwrap_or_else(|e| panic!("name pattern: {e}"))
    })
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
        )
        .unwrap_or_else(|e| panic!("email pattern: {e}"))
    })
}

/// Validate an account name.
///
/// The pattern is checked before the length, so `"1A"` reports the pattern
/// failure.
pub fn validate_name(name: &str) -> Result<(), PolicyError> {
    if !name_pattern().is_match(name) {
        return Err(PolicyError::NamePattern);
    }
    if name.len() < MIN_NAME_LENGTH {
        return Err(PolicyError::NameTooShort);
    }
    Ok(())
}

/// Validate an email address (format only, not deliverability).
pub fn validate_email(email: &str) -> Result<(), PolicyError> {
    if email_pattern().is_match(email) {
        Ok(())
    } else {
        Err(PolicyError::InvalidEmail)
    }
}

// ============================================================================
// Password Strength
// ============================================================================

/// Result of scanning a password
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PasswordStrength {
    /// At least [`MIN_PASSWORD_LENGTH`] digits, letters or spaces
    pub long_enough: bool,
    /// Contains a digit
    pub has_digit: bool,
    /// Contains an uppercase letter
    pub has_upper: bool,
}

impl PasswordStrength {
    /// All three flags are set
    pub fn is_acceptable(&self) -> bool {
        self.long_enough && self.has_digit && self.has_upper
    }
}

/// Scan a password.
///
/// Any character that is not a digit, a letter or a space makes every flag
/// false.
pub fn password_strength(password: &str) -> PasswordStrength {
    let mut counted = 0usize;
    let mut has_digit = false;
    let mut has_upper = false;

    for c in password.chars() {
        if c.is_numeric() {
            has_digit = true;
            counted += 1;
        } else if c.is_uppercase() {
            has_upper = true;
            counted += 1;
        } else if c.is_alphabetic() || c == ' ' {
            counted += 1;
        } else {
            return PasswordStrength::default();
        }
    }

    PasswordStrength {
        long_enough: counted >= MIN_PASSWORD_LENGTH,
        has_digit,
        has_upper,
    }
}

/// Validate a password against the strength rules.
pub fn validate_password(password: &str) -> Result<(), PolicyError> {
    if password_strength(password).is_acceptable() {
        Ok(())
    } else {
        Err(PolicyError::WeakPassword)
    }
}

// ============================================================================
// Password Digest
// ============================================================================

/// SHA-256 digest of a password, as 64 lowercase hex characters.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordDigest(String);

impl PasswordDigest {
    /// Digest a raw password
    pub fn compute(password: &str) -> Self {
        Self(hex::encode(Sha256::digest(password.as_bytes())))
    }

    /// Wrap a digest loaded from storage
    pub fn from_stored(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }

    /// Digest that no password produces, for comparing against when the
    /// account is unknown
    pub fn placeholder() -> Self {
        Self("0".repeat(64))
    }

    /// Check a candidate password in constant time
    pub fn matches(&self, password: &str) -> bool {
        let candidate = Self::compute(password);
        self.0.as_bytes().ct_eq(candidate.0.as_bytes()).into()
    }

    /// Hex form, for persistence
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for PasswordDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PasswordDigest([REDACTED])")
    }
}
