/// Router Module Index
///
/// Routes are split by access level so the guard for each group is applied once,
/// as a layer, rather than remembered per handler.

/// Anonymous access: marketing content, server list, map votes, storefront, registration.
pub mod public;

/// Requires a resolved `AuthUser` (bearer token, or `x-user-id` locally).
pub mod authenticated;

/// Nested under `/admin` and gated on `admin.access`; each handler then checks
/// its own finer permission.
pub mod admin;
