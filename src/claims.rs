//! Session token claims.
//!
//! The verifier at the transport boundary produces [`Claims`]; they are the
//! only identity input the authorization guard trusts. Claims are never
//! persisted and never change after signing.

use serde::{Deserialize, Serialize};

/// Audience tag of end-user tokens
pub const PUBLIC_AUDIENCE: &str = "game";

/// Audience tag of service-to-service tokens
pub const INTERNAL_AUDIENCE: &str = "svc";

/// Claims carried by a signed session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Account id (or service name for internal tokens)
    pub sub: String,
    pub name: String,
    pub email: String,
    /// Admin flag as read at login time
    pub is_admin: bool,
    /// Audience tag
    pub aud: String,
    /// Expiry (unix seconds)
    pub exp: i64,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Not before (unix seconds)
    pub nbf: i64,
    /// Unique token id
    pub jti: String,
    /// Issuer
    pub iss: String,
}

impl Claims {
    /// Token minted for an internal service
    pub fn is_internal(&self) -> bool {
        self.aud == INTERNAL_AUDIENCE
    }

    /// Whether `target` names the caller's own account by id, name or email.
    ///
    /// Internal tokens belong to a service, not an account, so they never
    /// refer to one.
    pub fn refers_to_self(&self, target: &str) -> bool {
        if self.is_internal() {
            return false;
        }
        target == self.sub || target == self.name || target == self.email
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(aud: &str) -> Claims {
        Claims {
            sub: "42".to_string(),
            name: "bobby".to_string(),
            email: "b@x.com".to_string(),
            is_admin: false,
            aud: aud.to_string(),
            exp: 0,
            iat: 0,
            nbf: 0,
            jti: "jti".to_string(),
            iss: "users-service".to_string(),
        }
    }

    #[test]
    fn test_refers_to_self() {
        let c = claims(PUBLIC_AUDIENCE);
        assert!(c.refers_to_self("42"));
        assert!(c.refers_to_self("bobby"));
        assert!(c.refers_to_self("b@x.com"));
        assert!(!c.refers_to_self("43"));
        assert!(!c.refers_to_self("Bobby"));
    }

    #[test]
    fn test_internal_claims_own_no_account() {
        let c = claims(INTERNAL_AUDIENCE);
        assert!(!c.refers_to_self("42"));
        assert!(!c.refers_to_self("bobby"));
        assert!(!c.refers_to_self("b@x.com"));
    }

    #[test]
    fn test_is_internal() {
        assert!(claims(INTERNAL_AUDIENCE).is_internal());
        assert!(!claims(PUBLIC_AUDIENCE).is_internal());
    }

    #[test]
    fn test_serde_field_names() {
        let json = serde_json::to_value(claims(PUBLIC_AUDIENCE)).unwrap();
        for key in ["sub", "name", "email", "is_admin", "aud", "exp", "iat", "nbf", "jti", "iss"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
    }
}
