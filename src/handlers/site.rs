use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, AppResult},
    models::{
        CreateNavigationItemRequest, NavigationItem, PageMetadata, SiteSettings,
        UpdateNavigationItemRequest, UpdateSiteSettingsRequest, UpsertPageMetadataRequest,
    },
    permissions,
};

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct PagePath {
    /// Route path of the page, e.g. `/about`.
    pub path: String,
}

/// get_page_metadata
///
/// [Public Route] SEO metadata the frontend renders into `<head>` for a route.
#[utoipa::path(
    get,
    path = "/site/pages",
    params(PagePath),
    responses(
        (status = 200, description = "Metadata", body = PageMetadata),
        (status = 404, description = "No metadata for this path")
    )
)]
pub async fn get_page_metadata(
    State(state): State<AppState>,
    Query(query): Query<PagePath>,
) -> AppResult<Json<PageMetadata>> {
    state
        .repo
        .get_page_metadata(&query.path)
        .await?
        .map(Json)
        .ok_or(AppError::not_found("Page metadata"))
}

/// Visible navigation entries: top level first, then children, each by position.
#[utoipa::path(
    get,
    path = "/site/navigation",
    responses((status = 200, description = "Navigation", body = [NavigationItem]))
)]
pub async fn get_navigation(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<NavigationItem>>> {
    Ok(Json(state.repo.list_navigation(false).await?))
}

#[utoipa::path(
    get,
    path = "/site/settings",
    responses((status = 200, description = "Settings", body = SiteSettings))
)]
pub async fn get_settings(State(state): State<AppState>) -> AppResult<Json<SiteSettings>> {
    Ok(Json(state.repo.get_site_settings().await?))
}

#[utoipa::path(
    get,
    path = "/admin/pages",
    responses((status = 200, description = "All page metadata", body = [PageMetadata]))
)]
pub async fn list_pages(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<PageMetadata>>> {
    auth.require(permissions::SITE_MANAGE)?;
    Ok(Json(state.repo.list_page_metadata().await?))
}

#[utoipa::path(
    put,
    path = "/admin/pages",
    request_body = UpsertPageMetadataRequest,
    responses(
        (status = 200, description = "Saved", body = PageMetadata),
        (status = 400, description = "Invalid path or title")
    )
)]
pub async fn upsert_page(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpsertPageMetadataRequest>,
) -> AppResult<Json<PageMetadata>> {
    auth.require(permissions::SITE_MANAGE)?;
    payload.validate()?;
    let page = state.repo.upsert_page_metadata(payload).await?;
    tracing::info!(path = %page.path, actor = %auth.id, "page metadata saved");
    Ok(Json(page))
}

#[utoipa::path(
    delete,
    path = "/admin/pages",
    params(PagePath),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_page(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PagePath>,
) -> AppResult<StatusCode> {
    auth.require(permissions::SITE_MANAGE)?;
    if !state.repo.delete_page_metadata(&query.path).await? {
        return Err(AppError::not_found("Page metadata"));
    }
    tracing::info!(path = %query.path, actor = %auth.id, "page metadata deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/admin/navigation",
    responses((status = 200, description = "All navigation items", body = [NavigationItem]))
)]
pub async fn list_all_navigation(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<NavigationItem>>> {
    auth.require(permissions::SITE_MANAGE)?;
    Ok(Json(state.repo.list_navigation(true).await?))
}

#[utoipa::path(
    post,
    path = "/admin/navigation",
    request_body = CreateNavigationItemRequest,
    responses(
        (status = 201, description = "Created", body = NavigationItem),
        (status = 400, description = "Invalid input or unknown parent")
    )
)]
pub async fn create_navigation_item(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateNavigationItemRequest>,
) -> AppResult<(StatusCode, Json<NavigationItem>)> {
    auth.require(permissions::SITE_MANAGE)?;
    payload.validate()?;
    let item = state.repo.create_navigation_item(payload).await?;
    tracing::info!(item_id = %item.id, label = %item.label, actor = %auth.id, "navigation item created");
    Ok((StatusCode::CREATED, Json(item)))
}

#[utoipa::path(
    put,
    path = "/admin/navigation/{id}",
    params(("id" = Uuid, Path, description = "Navigation item ID")),
    request_body = UpdateNavigationItemRequest,
    responses(
        (status = 200, description = "Updated", body = NavigationItem),
        (status = 400, description = "Unknown parent, or the new parent would create a cycle"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_navigation_item(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateNavigationItemRequest>,
) -> AppResult<Json<NavigationItem>> {
    auth.require(permissions::SITE_MANAGE)?;
    if payload.parent_id == Some(Some(id)) {
        return Err(AppError::bad_request("An item cannot be its own parent"));
    }
    if matches!(&payload.label, Some(l) if l.trim().is_empty())
        || matches!(&payload.href, Some(h) if h.trim().is_empty())
    {
        return Err(AppError::bad_request("Label and href cannot be empty"));
    }
    let item = state
        .repo
        .update_navigation_item(id, payload)
        .await?
        .ok_or(AppError::not_found("Navigation item"))?;
    tracing::info!(item_id = %id, actor = %auth.id, "navigation item updated");
    Ok(Json(item))
}

/// Deleting a parent also removes all of its descendants.
#[utoipa::path(
    delete,
    path = "/admin/navigation/{id}",
    params(("id" = Uuid, Path, description = "Navigation item ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_navigation_item(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    auth.require(permissions::SITE_MANAGE)?;
    if !state.repo.delete_navigation_item(id).await? {
        return Err(AppError::not_found("Navigation item"));
    }
    tracing::info!(item_id = %id, actor = %auth.id, "navigation item deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    put,
    path = "/admin/settings",
    request_body = UpdateSiteSettingsRequest,
    responses(
        (status = 200, description = "Updated", body = SiteSettings),
        (status = 400, description = "Invalid input")
    )
)]
pub async fn update_settings(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateSiteSettingsRequest>,
) -> AppResult<Json<SiteSettings>> {
    auth.require(permissions::SITE_MANAGE)?;
    payload.validate()?;
    let settings = state.repo.update_site_settings(payload).await?;
    tracing::info!(actor = %auth.id, maintenance_mode = settings.maintenance_mode, "site settings updated");
    Ok(Json(settings))
}
