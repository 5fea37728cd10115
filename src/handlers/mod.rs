//! HTTP handlers, grouped by feature area. Every handler returns
//! `Result<_, AppError>`; authorization is checked against the caller's
//! resolved permissions before the repository is touched.

pub mod admin;
pub mod map_votes;
pub mod servers;
pub mod site;
pub mod store;
pub mod tickets;
pub mod uploads;
pub mod users;
