use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, AppResult},
    models::{CreateServerRequest, GameServer, UpdateServerRequest},
    permissions,
};

/// get_servers
///
/// [Public Route] Active game servers in display order.
#[utoipa::path(
    get,
    path = "/servers",
    responses((status = 200, description = "Active servers", body = [GameServer]))
)]
pub async fn get_servers(State(state): State<AppState>) -> AppResult<Json<Vec<GameServer>>> {
    Ok(Json(state.repo.list_servers(false).await?))
}

/// Inactive servers are hidden from the public and reported as 404.
#[utoipa::path(
    get,
    path = "/servers/{id}",
    params(("id" = Uuid, Path, description = "Server ID")),
    responses(
        (status = 200, description = "Server", body = GameServer),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_server(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<GameServer>> {
    state
        .repo
        .get_server(id)
        .await?
        .filter(|s| s.is_active)
        .map(Json)
        .ok_or(AppError::not_found("Server"))
}

#[utoipa::path(
    get,
    path = "/admin/servers",
    responses((status = 200, description = "All servers", body = [GameServer]))
)]
pub async fn list_all_servers(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<GameServer>>> {
    auth.require(permissions::SERVERS_MANAGE)?;
    Ok(Json(state.repo.list_servers(true).await?))
}

#[utoipa::path(
    post,
    path = "/admin/servers",
    request_body = CreateServerRequest,
    responses(
        (status = 201, description = "Created", body = GameServer),
        (status = 400, description = "Invalid input")
    )
)]
pub async fn create_server(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateServerRequest>,
) -> AppResult<(StatusCode, Json<GameServer>)> {
    auth.require(permissions::SERVERS_MANAGE)?;
    payload.validate()?;
    let server = state.repo.create_server(payload).await?;
    tracing::info!(server_id = %server.id, name = %server.name, actor = %auth.id, "server created");
    Ok((StatusCode::CREATED, Json(server)))
}

#[utoipa::path(
    put,
    path = "/admin/servers/{id}",
    params(("id" = Uuid, Path, description = "Server ID")),
    request_body = UpdateServerRequest,
    responses(
        (status = 200, description = "Updated", body = GameServer),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_server(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateServerRequest>,
) -> AppResult<Json<GameServer>> {
    auth.require(permissions::SERVERS_MANAGE)?;
    payload.validate()?;
    let server = state
        .repo
        .update_server(id, payload)
        .await?
        .ok_or(AppError::not_found("Server"))?;
    tracing::info!(server_id = %id, actor = %auth.id, "server updated");
    Ok(Json(server))
}

#[utoipa::path(
    delete,
    path = "/admin/servers/{id}",
    params(("id" = Uuid, Path, description = "Server ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_server(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    auth.require(permissions::SERVERS_MANAGE)?;
    if !state.repo.delete_server(id).await? {
        return Err(AppError::not_found("Server"));
    }
    tracing::info!(server_id = %id, actor = %auth.id, "server deleted");
    Ok(StatusCode::NO_CONTENT)
}
