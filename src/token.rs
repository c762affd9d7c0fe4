//! Token Issuer and Verifier
//!
//! Session tokens are JWTs signed with RS512. The issuer holds the private
//! key; verification needs only the public key, so any service holding the
//! public half can check tokens without calling back.
//!
//! # Usage
//!
//! ```ignore
//! use postern::token::{SigningKeys, TokenConfig, TokenIssuer};
//!
//! let keys = SigningKeys::from_files("keys/private.pem", "keys/public.pem")?;
//! let issuer = TokenIssuer::new(keys, TokenConfig::default());
//!
//! let issued = issuer.issue(&account, account.is_admin)?;
//! let claims = issuer.verifier().verify(&issued.token)?;
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::account::Account;
use crate::claims::{Claims, INTERNAL_AUDIENCE, PUBLIC_AUDIENCE};
use crate::observability::SecurityEvent;

/// Default issuer claim
pub const DEFAULT_ISSUER: &str = "users-service";

/// Default token lifetime (8 hours)
pub const DEFAULT_LIFETIME: Duration = Duration::from_secs(8 * 60 * 60);

const ALGORITHM: Algorithm = Algorithm::RS512;

// ============================================================================
// Errors
// ============================================================================

/// Failure to load the signing keypair
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("failed to read key file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid RSA key: {0}")]
    InvalidKey(String),
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

/// Failure to issue or verify a token
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token has expired")]
    Expired,
    #[error("token is not valid yet")]
    NotYetValid,
    #[error("token is malformed")]
    Malformed,
    #[error("token issuer, audience or algorithm is not trusted")]
    Untrusted,
    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            JwtErrorKind::InvalidSignature => Self::InvalidSignature,
            JwtErrorKind::ExpiredSignature => Self::Expired,
            JwtErrorKind::ImmatureSignature => Self::NotYetValid,
            JwtErrorKind::InvalidAudience
            | JwtErrorKind::InvalidIssuer
            | JwtErrorKind::InvalidAlgorithm
            | JwtErrorKind::MissingRequiredClaim(_) => Self::Untrusted,
            _ => Self::Malformed,
        }
    }
}

// ============================================================================
// Keys and Configuration
// ============================================================================

/// RSA keypair used to sign and verify tokens
#[derive(Clone)]
pub struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKeys {
    /// Parse PEM-encoded keys (PKCS#1 or PKCS#8 private key, SPKI or PKCS#1
    /// public key)
    pub fn from_pem(private_pem: &str, public_pem: &str) -> Result<Self, KeyError> {
        let encoding = EncodingKey::from_rsa_pem(private_pem.as_bytes())
            .map_err(|e| KeyError::InvalidKey(format!("private key: {}", e)))?;
        let decoding = DecodingKey::from_rsa_pem(public_pem.as_bytes())
            .map_err(|e| KeyError::InvalidKey(format!("public key: {}", e)))?;
        Ok(Self { encoding, decoding })
    }

    /// Read and parse PEM files
    pub fn from_files(
        private_path: impl AsRef<Path>,
        public_path: impl AsRef<Path>,
    ) -> Result<Self, KeyError> {
        let private_pem = read_pem(private_path.as_ref())?;
        let public_pem = read_pem(public_path.as_ref())?;
        Self::from_pem(&private_pem, &public_pem)
    }
}

impl fmt::Debug for SigningKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeys")
            .field("algorithm", &ALGORITHM)
            .finish_non_exhaustive()
    }
}

fn read_pem(path: &Path) -> Result<String, KeyError> {
    std::fs::read_to_string(path).map_err(|source| KeyError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Issuer name and token lifetime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenConfig {
    /// `iss` claim written and expected
    pub issuer: String,
    /// Validity window from issuance
    pub lifetime: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            issuer: DEFAULT_ISSUER.to_string(),
            lifetime: DEFAULT_LIFETIME,
        }
    }
}

// ============================================================================
// Issuer
// ============================================================================

/// Signed token with its expiry
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Compact JWT
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub claims: Claims,
}

/// Signs session tokens with the private key
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    keys: Arc<SigningKeys>,
    config: TokenConfig,
}

impl TokenIssuer {
    pub fn new(keys: SigningKeys, config: TokenConfig) -> Self {
        Self {
            keys: Arc::new(keys),
            config,
        }
    }

    /// Issuer configuration
    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    /// Issue an end-user token for `account`.
    ///
    /// `is_admin` is passed separately so the caller can supply a value read
    /// fresh from the store.
    pub fn issue(&self, account: &Account, is_admin: bool) -> Result<IssuedToken, TokenError> {
        self.issue_for(
            account.id.clone(),
            account.name.clone(),
            account.email.clone(),
            is_admin,
            PUBLIC_AUDIENCE,
        )
    }

    /// Issue a non-admin token with the internal audience
    pub fn issue_service_token(&self, service_name: &str) -> Result<IssuedToken, TokenError> {
        self.issue_for(
            service_name.to_string(),
            service_name.to_string(),
            String::new(),
            false,
            INTERNAL_AUDIENCE,
        )
    }

    fn issue_for(
        &self,
        sub: String,
        name: String,
        email: String,
        is_admin: bool,
        audience: &str,
    ) -> Result<IssuedToken, TokenError> {
        let lifetime = chrono::Duration::from_std(self.config.lifetime)
            .map_err(|e| TokenError::Signing(format!("lifetime out of range: {}", e)))?;
        let now = Utc::now();
        let expires_at = now + lifetime;

        let claims = Claims {
            sub,
            name,
            email,
            is_admin,
            aud: audience.to_string(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
            iss: self.config.issuer.clone(),
        };

        let token = self.sign(&claims)?;

        crate::security_event!(
            SecurityEvent::TokenIssued,
            subject = %claims.sub,
            audience = %claims.aud,
            jti = %claims.jti,
            is_admin = claims.is_admin,
            "Token issued"
        );

        Ok(IssuedToken {
            token,
            expires_at,
            claims,
        })
    }

    /// Sign arbitrary claims
    pub(crate) fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(ALGORITHM), claims, &self.keys.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verifier using this issuer's public key and issuer name
    pub fn verifier(&self) -> TokenVerifier {
        TokenVerifier::new(self.keys.decoding.clone(), &self.config.issuer)
    }
}

// ============================================================================
// Verifier
// ============================================================================

/// Checks token signatures with the public key
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    /// Verifier for tokens from `issuer`
    pub fn new(key: DecodingKey, issuer: &str) -> Self {
        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.set_audience(&[PUBLIC_AUDIENCE, INTERNAL_AUDIENCE]);
        validation.set_issuer(&[issuer]);
        validation.set_required_spec_claims(&["exp", "nbf", "aud", "iss", "sub"]);

        Self { key, validation }
    }

    /// Verifier from a PEM public key
    pub fn from_public_pem(public_pem: &str, issuer: &str) -> Result<Self, KeyError> {
        let key = DecodingKey::from_rsa_pem(public_pem.as_bytes())
            .map_err(|e| KeyError::InvalidKey(format!("public key: {}", e)))?;
        Ok(Self::new(key, issuer))
    }

    /// Verify signature, validity window, issuer and audience
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(TokenError::from)
    }
}

impl fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("issuer", &self.validation.iss)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PasswordDigest;
    use crate::testing::{test_issuer, FOREIGN_PUBLIC_PEM};

    fn account() -> Account {
        let mut account = Account::new("bobby", "b@x.com", PasswordDigest::compute("Passw0rd"));
        account.id = "42".to_string();
        account
    }

    fn corrupt_signature(token: &str) -> String {
        let (head, signature) = token.rsplit_once('.').unwrap();
        let mut chars: Vec<char> = signature.chars().collect();
        let mid = chars.len() / 2;
        chars[mid] = if chars[mid] == 'A' { 'B' } else { 'A' };
        format!("{}.{}", head, chars.into_iter().collect::<String>())
    }

    #[test]
    fn test_round_trip() {
        let issuer = test_issuer();
        let issued = issuer.issue(&account(), true).unwrap();

        let claims = issuer.verifier().verify(&issued.token).unwrap();
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.name, "bobby");
        assert_eq!(claims.email, "b@x.com");
        assert!(claims.is_admin);
        assert_eq!(claims.aud, PUBLIC_AUDIENCE);
        assert_eq!(claims.iss, DEFAULT_ISSUER);
        assert_eq!(claims.exp - claims.iat, 8 * 60 * 60);
        assert_eq!(claims.nbf, claims.iat);
        assert_eq!(issued.expires_at.timestamp(), claims.exp);
    }

    #[test]
    fn test_jti_unique() {
        let issuer = test_issuer();
        let a = issuer.issue(&account(), false).unwrap();
        let b = issuer.issue(&account(), false).unwrap();
        assert_ne!(a.claims.jti, b.claims.jti);
    }

    #[test]
    fn test_corrupted_signature() {
        let issuer = test_issuer();
        let issued = issuer.issue(&account(), false).unwrap();
        let result = issuer.verifier().verify(&corrupt_signature(&issued.token));
        assert_eq!(result, Err(TokenError::InvalidSignature));
    }

    #[test]
    fn test_expired() {
        let issuer = test_issuer();
        let mut claims = issuer.issue(&account(), false).unwrap().claims;
        let now = Utc::now().timestamp();
        claims.iat = now - 120;
        claims.nbf = now - 120;
        claims.exp = now - 60;

        let token = issuer.sign(&claims).unwrap();
        assert_eq!(issuer.verifier().verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_not_yet_valid() {
        let issuer = test_issuer();
        let mut claims = issuer.issue(&account(), false).unwrap().claims;
        claims.nbf = Utc::now().timestamp() + 600;

        let token = issuer.sign(&claims).unwrap();
        assert_eq!(issuer.verifier().verify(&token), Err(TokenError::NotYetValid));
    }

    #[test]
    fn test_untrusted_issuer_and_audience() {
        let issuer = test_issuer();
        let mut claims = issuer.issue(&account(), false).unwrap().claims;
        claims.iss = "someone-else".to_string();
        let token = issuer.sign(&claims).unwrap();
        assert_eq!(issuer.verifier().verify(&token), Err(TokenError::Untrusted));

        let mut claims = issuer.issue(&account(), false).unwrap().claims;
        claims.aud = "web".to_string();
        let token = issuer.sign(&claims).unwrap();
        assert_eq!(issuer.verifier().verify(&token), Err(TokenError::Untrusted));
    }

    #[test]
    fn test_foreign_key_rejected() {
        let issuer = test_issuer();
        let issued = issuer.issue(&account(), false).unwrap();
        let verifier = TokenVerifier::from_public_pem(FOREIGN_PUBLIC_PEM, DEFAULT_ISSUER).unwrap();
        assert_eq!(verifier.verify(&issued.token), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn test_malformed() {
        let verifier = test_issuer().verifier();
        assert_eq!(verifier.verify("not-a-token"), Err(TokenError::Malformed));
        assert_eq!(verifier.verify(""), Err(TokenError::Malformed));
    }

    #[test]
    fn test_service_token() {
        let issuer = test_issuer();
        let issued = issuer.issue_service_token("leaderboard").unwrap();
        let claims = issuer.verifier().verify(&issued.token).unwrap();
        assert_eq!(claims.aud, INTERNAL_AUDIENCE);
        assert_eq!(claims.sub, "leaderboard");
        assert!(!claims.is_admin);
        assert!(claims.is_internal());
    }

    #[test]
    fn test_custom_lifetime() {
        let issuer = TokenIssuer::new(
            crate::testing::signing_keys(),
            TokenConfig {
                issuer: "arena".to_string(),
                lifetime: Duration::from_secs(60),
            },
        );
        let issued = issuer.issue(&account(), false).unwrap();
        let claims = issuer.verifier().verify(&issued.token).unwrap();
        assert_eq!(claims.exp - claims.iat, 60);
        assert_eq!(claims.iss, "arena");

        let other = test_issuer().verifier();
        assert_eq!(other.verify(&issued.token), Err(TokenError::Untrusted));
    }

    #[test]
    fn test_invalid_pem() {
        assert!(matches!(
            SigningKeys::from_pem("garbage", "garbage"),
            Err(KeyError::InvalidKey(_))
        ));
        assert!(matches!(
            SigningKeys::from_files("/nonexistent/private.pem", "/nonexistent/public.pem"),
            Err(KeyError::Io { .. })
        ));
    }
}
