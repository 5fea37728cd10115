use axum::{Json, extract::State};

use crate::{
    AppState, auth::AuthUser, error::AppResult, models::AdminDashboardStats, permissions,
};

/// get_admin_stats
///
/// [Admin Route] Headline counters for the dashboard landing page.
#[utoipa::path(
    get,
    path = "/admin/stats",
    responses(
        (status = 200, description = "Stats", body = AdminDashboardStats),
        (status = 403, description = "Missing admin.access")
    )
)]
pub async fn get_admin_stats(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<AdminDashboardStats>> {
    auth.require(permissions::ADMIN_ACCESS)?;
    Ok(Json(state.repo.get_stats().await?))
}
