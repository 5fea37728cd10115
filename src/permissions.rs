//! Permission strings and the checks every handler runs against them.
//!
//! Permissions are dotted strings (`tickets.manage`). A role may also hold a
//! wildcard: `*` grants everything, `tickets.*` grants every permission under
//! the `tickets.` prefix.

use crate::error::{AppError, AppResult};

pub const WILDCARD: &str = "*";

pub const ADMIN_ACCESS: &str = "admin.access";
pub const USERS_VIEW: &str = "users.view";
pub const USERS_MANAGE: &str = "users.manage";
pub const ROLES_MANAGE: &str = "roles.manage";
pub const TICKETS_VIEW: &str = "tickets.view";
pub const TICKETS_MANAGE: &str = "tickets.manage";
pub const SERVERS_MANAGE: &str = "servers.manage";
pub const MAPVOTES_MANAGE: &str = "mapvotes.manage";
pub const STORE_MANAGE: &str = "store.manage";
pub const SITE_MANAGE: &str = "site.manage";
pub const UPLOADS_CREATE: &str = "uploads.create";

/// has_permission
///
/// True when any granted string covers `required`: an exact match, the global
/// wildcard, or a `prefix.*` wildcard whose prefix is a dotted ancestor of
/// `required`.
pub fn has_permission<S: AsRef<str>>(granted: &[S], required: &str) -> bool {
    granted.iter().any(|g| covers(g.as_ref(), required))
}

fn covers(granted: &str, required: &str) -> bool {
    if granted == WILDCARD || granted == required {
        return true;
    }
    match granted.strip_suffix(".*") {
        Some(prefix) => required
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('.')),
        None => false,
    }
}

/// Returns `Forbidden` unless `granted` covers `required`.
pub fn require<S: AsRef<str>>(granted: &[S], required: &str) -> AppResult<()> {
    if has_permission(granted, required) {
        Ok(())
    } else {
        Err(AppError::forbidden(required))
    }
}

/// can_grant
///
/// An actor may only hand out (or take away) a role whose every permission they
/// hold themselves, so role management can never escalate privileges.
pub fn can_grant<A: AsRef<str>, R: AsRef<str>>(actor: &[A], role_permissions: &[R]) -> bool {
    role_permissions
        .iter()
        .all(|p| has_permission(actor, p.as_ref()))
}

/// Shape check for a permission string stored on a role. Catalogue membership
/// is checked separately against the `permissions` table.
pub fn is_well_formed(permission: &str) -> bool {
    if permission == WILDCARD {
        return true;
    }
    let body = permission.strip_suffix(".*").unwrap_or(permission);
    !body.is_empty()
        && body.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        })
}

/// Validates a role's permission list against the catalogue. Wildcards are
/// accepted when they cover at least one catalogued permission.
pub fn validate_role_permissions<S: AsRef<str>>(
    requested: &[String],
    catalogue: &[S],
) -> AppResult<()> {
    for permission in requested {
        if !is_well_formed(permission) {
            return Err(AppError::bad_request(format!(
                "Malformed permission '{permission}'"
            )));
        }
        let known = catalogue.iter().any(|c| covers(permission, c.as_ref()));
        if !known {
            return Err(AppError::bad_request(format!(
                "Unknown permission '{permission}'"
            )));
        }
    }
    Ok(())
}

/// Deduplicated union of several roles' permission lists, in first-seen order.
pub fn effective_permissions<'a, I>(role_permissions: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a Vec<String>>,
{
    let mut out: Vec<String> = Vec::new();
    for list in role_permissions {
        for p in list {
            if !out.contains(p) {
                out.push(p.clone());
            }
        }
    }
    out
}
