use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, AppResult},
    models::{
        CastVoteRequest, CreateMapVoteRequest, MapVote, MapVoteSummary, UpdateMapVoteRequest,
        VoteStatus,
    },
    permissions, voting,
};

#[derive(Debug, Deserialize, Default, utoipa::IntoParams)]
pub struct MapVoteFilter {
    /// Restrict to `upcoming`, `active` or `completed` votes.
    pub status: Option<VoteStatus>,
}

/// Builds summaries for `votes`, including `viewer`'s ballots when known.
async fn summaries_for(
    state: &AppState,
    votes: &[MapVote],
    viewer: Option<Uuid>,
    status: Option<VoteStatus>,
) -> AppResult<Vec<MapVoteSummary>> {
    let ids: Vec<Uuid> = votes.iter().map(|v| v.id).collect();
    let tallies = state.repo.get_option_tallies(&ids).await?;
    let choices: Vec<(Uuid, Uuid)> = match viewer {
        Some(user_id) => state
            .repo
            .get_user_choices(user_id, &ids)
            .await?
            .into_iter()
            .map(|v| (v.map_vote_id, v.option_id))
            .collect(),
        None => Vec::new(),
    };
    Ok(voting::summarize_all(votes, &tallies, &choices, status, Utc::now()))
}

async fn summary_for(
    state: &AppState,
    id: Uuid,
    viewer: Option<Uuid>,
) -> AppResult<MapVoteSummary> {
    let vote = state
        .repo
        .get_map_vote(id)
        .await?
        .ok_or(AppError::not_found("Map vote"))?;
    summaries_for(state, std::slice::from_ref(&vote), viewer, None)
        .await?
        .pop()
        .ok_or(AppError::not_found("Map vote"))
}

/// get_map_votes
///
/// [Public Route] Map votes with live tallies, newest window first. Signed-in
/// callers also see which option they picked.
#[utoipa::path(
    get,
    path = "/map-votes",
    params(MapVoteFilter),
    responses((status = 200, description = "Map votes", body = [MapVoteSummary]))
)]
pub async fn get_map_votes(
    viewer: Option<AuthUser>,
    State(state): State<AppState>,
    Query(filter): Query<MapVoteFilter>,
) -> AppResult<Json<Vec<MapVoteSummary>>> {
    let votes = state.repo.list_map_votes().await?;
    let summaries = summaries_for(&state, &votes, viewer.map(|u| u.id), filter.status).await?;
    Ok(Json(summaries))
}

#[utoipa::path(
    get,
    path = "/map-votes/{id}",
    params(("id" = Uuid, Path, description = "Map vote ID")),
    responses(
        (status = 200, description = "Map vote", body = MapVoteSummary),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_map_vote(
    viewer: Option<AuthUser>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MapVoteSummary>> {
    Ok(Json(summary_for(&state, id, viewer.map(|u| u.id)).await?))
}

/// cast_vote
///
/// [Authenticated Route] Records the caller's ballot. The vote must be inside
/// its `[start, end)` window and the option must belong to it. Ballots are
/// final: a second attempt is a 409.
#[utoipa::path(
    post,
    path = "/map-votes/{id}/vote",
    params(("id" = Uuid, Path, description = "Map vote ID")),
    request_body = CastVoteRequest,
    responses(
        (status = 201, description = "Voted", body = MapVoteSummary),
        (status = 400, description = "Vote not active or option not part of it"),
        (status = 404, description = "Not Found"),
        (status = 409, description = "Already voted")
    )
)]
pub async fn cast_vote(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CastVoteRequest>,
) -> AppResult<(StatusCode, Json<MapVoteSummary>)> {
    let vote = state
        .repo
        .get_map_vote(id)
        .await?
        .ok_or(AppError::not_found("Map vote"))?;

    match vote.status_at(Utc::now()) {
        VoteStatus::Active => {}
        VoteStatus::Upcoming => return Err(AppError::bad_request("Voting has not opened yet")),
        VoteStatus::Completed => return Err(AppError::bad_request("Voting has closed")),
    }

    let options = state.repo.get_option_tallies(&[id]).await?;
    if !options.iter().any(|o| o.option_id == payload.option_id) {
        return Err(AppError::bad_request("Option does not belong to this map vote"));
    }

    if !state.repo.cast_vote(auth.id, id, payload.option_id).await? {
        return Err(AppError::conflict("You have already voted in this map vote"));
    }
    tracing::info!(map_vote_id = %id, option_id = %payload.option_id, user_id = %auth.id, "vote cast");

    let summary = summary_for(&state, id, Some(auth.id)).await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

#[utoipa::path(
    get,
    path = "/admin/map-votes",
    params(MapVoteFilter),
    responses((status = 200, description = "Map votes", body = [MapVoteSummary]))
)]
pub async fn list_admin_map_votes(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<MapVoteFilter>,
) -> AppResult<Json<Vec<MapVoteSummary>>> {
    auth.require(permissions::MAPVOTES_MANAGE)?;
    let votes = state.repo.list_map_votes().await?;
    Ok(Json(summaries_for(&state, &votes, None, filter.status).await?))
}

/// create_map_vote
///
/// [Admin Route] Creates a vote with at least two options, positioned in the
/// order given. `server_id`, when present, must reference an existing server.
#[utoipa::path(
    post,
    path = "/admin/map-votes",
    request_body = CreateMapVoteRequest,
    responses(
        (status = 201, description = "Created", body = MapVoteSummary),
        (status = 400, description = "Invalid window, options or server")
    )
)]
pub async fn create_map_vote(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateMapVoteRequest>,
) -> AppResult<(StatusCode, Json<MapVoteSummary>)> {
    auth.require(permissions::MAPVOTES_MANAGE)?;
    payload.validate()?;
    if let Some(server_id) = payload.server_id {
        if state.repo.get_server(server_id).await?.is_none() {
            return Err(AppError::bad_request("Server does not exist"));
        }
    }

    let vote = state.repo.create_map_vote(payload, auth.id).await?;
    tracing::info!(map_vote_id = %vote.id, title = %vote.title, actor = %auth.id, "map vote created");
    let summary = summary_for(&state, vote.id, None).await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

#[utoipa::path(
    put,
    path = "/admin/map-votes/{id}",
    params(("id" = Uuid, Path, description = "Map vote ID")),
    request_body = UpdateMapVoteRequest,
    responses(
        (status = 200, description = "Updated", body = MapVoteSummary),
        (status = 400, description = "Invalid window"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_map_vote(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateMapVoteRequest>,
) -> AppResult<Json<MapVoteSummary>> {
    auth.require(permissions::MAPVOTES_MANAGE)?;
    let current = state
        .repo
        .get_map_vote(id)
        .await?
        .ok_or(AppError::not_found("Map vote"))?;
    payload.validate_against(&current)?;

    state
        .repo
        .update_map_vote(id, payload)
        .await?
        .ok_or(AppError::not_found("Map vote"))?;
    tracing::info!(map_vote_id = %id, actor = %auth.id, "map vote updated");
    Ok(Json(summary_for(&state, id, None).await?))
}

#[utoipa::path(
    delete,
    path = "/admin/map-votes/{id}",
    params(("id" = Uuid, Path, description = "Map vote ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_map_vote(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    auth.require(permissions::MAPVOTES_MANAGE)?;
    if !state.repo.delete_map_vote(id).await? {
        return Err(AppError::not_found("Map vote"));
    }
    tracing::info!(map_vote_id = %id, actor = %auth.id, "map vote deleted");
    Ok(StatusCode::NO_CONTENT)
}
