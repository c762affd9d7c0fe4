//! Authorization Guard
//!
//! Pure decisions over verified [`Claims`]. The `authorize_*` wrappers make
//! the same decision and write an audit record for it.
//!
//! ```ignore
//! use postern::guard;
//!
//! if !guard::authorize_self(&claims, "42") {
//!     return Err(AppError::unauthorized("Not authorized for another user"));
//! }
//! ```

use crate::claims::Claims;
use crate::observability::SecurityEvent;

/// Admin, or `target` is the caller's id, name or email
pub fn can_access_self(claims: &Claims, target: &str) -> bool {
    claims.is_admin || claims.refers_to_self(target)
}

/// Admin, or `target` is exactly the caller's id on an end-user token
pub fn can_delete(claims: &Claims, target: &str) -> bool {
    claims.is_admin || (!claims.is_internal() && claims.sub == target)
}

/// Admin, or an internal-service token
pub fn can_access_global_list(claims: &Claims) -> bool {
    claims.is_admin || claims.is_internal()
}

/// [`can_access_self`] with an audit record
pub fn authorize_self(claims: &Claims, target: &str) -> bool {
    let allowed = can_access_self(claims, target);
    log_access_decision(claims, "account", target, allowed);
    allowed
}

/// [`can_delete`] with an audit record
pub fn authorize_delete(claims: &Claims, target: &str) -> bool {
    let allowed = can_delete(claims, target);
    log_access_decision(claims, "account_delete", target, allowed);
    allowed
}

/// [`can_access_global_list`] with an audit record
pub fn authorize_global_list(claims: &Claims) -> bool {
    let allowed = can_access_global_list(claims);
    log_access_decision(claims, "account_list", "*", allowed);
    allowed
}

/// Log an access control decision
pub fn log_access_decision(claims: &Claims, resource: &str, target: &str, allowed: bool) {
    let event = if allowed {
        SecurityEvent::AccessGranted
    } else {
        SecurityEvent::AccessDenied
    };

    crate::security_event!(
        event,
        subject = %claims.sub,
        resource = %resource,
        target = %target,
        is_admin = claims.is_admin,
        audience = %claims.aud,
        "Access decision made"
    );
}
