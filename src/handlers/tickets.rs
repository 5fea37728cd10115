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
        AssignTicketRequest, CreateTicketRequest, Ticket, TicketDetail, TicketMessage,
        TicketReplyRequest, TicketStatus,
    },
    permissions,
};

#[derive(Debug, Deserialize, Default, utoipa::IntoParams)]
pub struct TicketFilter {
    pub status: Option<TicketStatus>,
}

async fn load_ticket(state: &AppState, id: Uuid) -> AppResult<Ticket> {
    state
        .repo
        .get_ticket(id)
        .await?
        .ok_or(AppError::not_found("Ticket"))
}

/// create_ticket
///
/// [Authenticated Route] Opens a support ticket. The first message is stored in
/// the same transaction as the ticket.
#[utoipa::path(
    post,
    path = "/tickets",
    request_body = CreateTicketRequest,
    responses(
        (status = 201, description = "Created", body = Ticket),
        (status = 400, description = "Invalid input")
    )
)]
pub async fn create_ticket(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateTicketRequest>,
) -> AppResult<(StatusCode, Json<Ticket>)> {
    payload.validate()?;
    let ticket = state.repo.create_ticket(auth.id, payload).await?;
    tracing::info!(ticket_id = %ticket.id, user_id = %auth.id, "ticket opened");
    Ok((StatusCode::CREATED, Json(ticket)))
}

#[utoipa::path(
    get,
    path = "/tickets",
    responses((status = 200, description = "The caller's tickets", body = [Ticket]))
)]
pub async fn list_my_tickets(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Ticket>>> {
    Ok(Json(state.repo.list_user_tickets(auth.id).await?))
}

/// get_ticket
///
/// [Authenticated Route] A ticket and its full thread. Visible to the owner and
/// to holders of `tickets.view`.
#[utoipa::path(
    get,
    path = "/tickets/{id}",
    params(("id" = Uuid, Path, description = "Ticket ID")),
    responses(
        (status = 200, description = "Ticket", body = TicketDetail),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_ticket(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<TicketDetail>> {
    let ticket = load_ticket(&state, id).await?;
    auth.require_owner_or(ticket.user_id, permissions::TICKETS_VIEW)?;
    let messages = state.repo.get_ticket_messages(id).await?;
    Ok(Json(TicketDetail { ticket, messages }))
}

/// reply_to_ticket
///
/// [Authenticated Route] Adds a message to an open ticket. Owners reply as
/// members; anyone else needs `tickets.manage` and is recorded as staff.
#[utoipa::path(
    post,
    path = "/tickets/{id}/messages",
    params(("id" = Uuid, Path, description = "Ticket ID")),
    request_body = TicketReplyRequest,
    responses(
        (status = 201, description = "Posted", body = TicketMessage),
        (status = 400, description = "Ticket is closed"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn reply_to_ticket(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<TicketReplyRequest>,
) -> AppResult<(StatusCode, Json<TicketMessage>)> {
    payload.validate()?;
    let ticket = load_ticket(&state, id).await?;
    auth.require_owner_or(ticket.user_id, permissions::TICKETS_MANAGE)?;
    if ticket.status == TicketStatus::Closed {
        return Err(AppError::bad_request("Ticket is closed"));
    }

    let is_staff = auth.id != ticket.user_id;
    let message = state
        .repo
        .add_ticket_message(id, auth.id, payload.body, is_staff)
        .await?;
    tracing::info!(ticket_id = %id, author = %auth.id, is_staff, "ticket reply posted");
    Ok((StatusCode::CREATED, Json(message)))
}

#[utoipa::path(
    post,
    path = "/tickets/{id}/close",
    params(("id" = Uuid, Path, description = "Ticket ID")),
    responses(
        (status = 200, description = "Closed", body = Ticket),
        (status = 400, description = "Already closed"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn close_ticket(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Ticket>> {
    let ticket = load_ticket(&state, id).await?;
    auth.require_owner_or(ticket.user_id, permissions::TICKETS_MANAGE)?;
    if !ticket.status.can_transition_to(TicketStatus::Closed) {
        return Err(AppError::bad_request("Ticket is already closed"));
    }

    // None here means someone else closed it between the two reads.
    let closed = state
        .repo
        .close_ticket(id)
        .await?
        .ok_or_else(|| AppError::bad_request("Ticket is already closed"))?;
    tracing::info!(ticket_id = %id, actor = %auth.id, "ticket closed");
    Ok(Json(closed))
}

#[utoipa::path(
    get,
    path = "/admin/tickets",
    params(TicketFilter),
    responses((status = 200, description = "All tickets, open first", body = [Ticket]))
)]
pub async fn list_all_tickets(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<TicketFilter>,
) -> AppResult<Json<Vec<Ticket>>> {
    auth.require(permissions::TICKETS_VIEW)?;
    Ok(Json(state.repo.list_tickets(filter.status).await?))
}

/// assign_ticket
///
/// [Admin Route] Hands a ticket to a staff member, or unassigns it with
/// `assignee: null`. The assignee must exist and hold `tickets.manage`.
#[utoipa::path(
    put,
    path = "/admin/tickets/{id}/assign",
    params(("id" = Uuid, Path, description = "Ticket ID")),
    request_body = AssignTicketRequest,
    responses(
        (status = 200, description = "Assigned", body = Ticket),
        (status = 400, description = "Assignee is not staff"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn assign_ticket(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignTicketRequest>,
) -> AppResult<Json<Ticket>> {
    auth.require(permissions::TICKETS_MANAGE)?;

    if let Some(assignee) = payload.assignee {
        let staff = state
            .repo
            .get_user_profile(assignee)
            .await?
            .ok_or_else(|| AppError::bad_request("Assignee does not exist"))?;
        if !permissions::has_permission(&staff.permissions, permissions::TICKETS_MANAGE) {
            return Err(AppError::bad_request(
                "Assignee lacks the tickets.manage permission",
            ));
        }
    }

    let ticket = state
        .repo
        .assign_ticket(id, payload.assignee)
        .await?
        .ok_or(AppError::not_found("Ticket"))?;
    tracing::info!(ticket_id = %id, assignee = ?payload.assignee, actor = %auth.id, "ticket assigned");
    Ok(Json(ticket))
}
