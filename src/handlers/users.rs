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
    config::Env,
    error::{AppError, AppResult},
    models::{
        CreateRoleRequest, NewUser, Permission, RegisterUserRequest, Role, UpdateRoleRequest,
        UserProfile,
    },
    permissions,
};

/// Query parameters for `GET /admin/users`.
#[derive(Debug, Deserialize, Default, utoipa::IntoParams)]
pub struct UserFilter {
    /// Case-insensitive match on username or email.
    pub search: Option<String>,
}

/// Minimal signup response from the identity provider; only the new subject id is used.
#[derive(Deserialize)]
struct ProviderSignupResponse {
    id: Uuid,
}

/// register_user
///
/// [Public Route] Signs the user up with the external identity provider, then
/// mirrors the account into `users` under the provider's id and grants every
/// default role.
///
/// Without a configured provider, `Env::Local` creates a local-only account so
/// development works offline; production reports the misconfiguration as 502.
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "Registered", body = UserProfile),
        (status = 400, description = "Invalid input or rejected by the identity provider"),
        (status = 409, description = "Username or email taken"),
        (status = 502, description = "Identity provider unavailable")
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterUserRequest>,
) -> AppResult<(StatusCode, Json<UserProfile>)> {
    payload.validate()?;

    let id = match (&state.config.auth_provider_url, &state.config.auth_provider_key) {
        (Some(url), Some(key)) => signup_with_provider(url, key, &payload).await?,
        _ if state.config.env == Env::Local => Uuid::new_v4(),
        _ => {
            return Err(AppError::Upstream(
                "AUTH_PROVIDER_URL / AUTH_PROVIDER_KEY not configured".to_string(),
            ));
        }
    };

    let profile = state
        .repo
        .create_user(NewUser {
            id,
            username: payload.username.trim().to_string(),
            email: payload.email.trim().to_lowercase(),
        })
        .await?;

    tracing::info!(user_id = %profile.id, username = %profile.username, "user registered");
    Ok((StatusCode::CREATED, Json(profile)))
}

async fn signup_with_provider(url: &str, key: &str, payload: &RegisterUserRequest) -> AppResult<Uuid> {
    let response = reqwest::Client::new()
        .post(format!("{}/auth/v1/signup", url.trim_end_matches('/')))
        .header("apikey", key)
        .json(&serde_json::json!({
            "email": payload.email,
            "password": payload.password,
            "data": { "username": payload.username },
        }))
        .send()
        .await
        .map_err(|e| AppError::Upstream(e.to_string()))?;

    if !response.status().is_success() {
        tracing::info!(status = %response.status(), "identity provider rejected signup");
        return Err(AppError::bad_request(
            "Registration was rejected by the identity provider",
        ));
    }

    let body = response
        .json::<ProviderSignupResponse>()
        .await
        .map_err(|e| AppError::Upstream(e.to_string()))?;
    Ok(body.id)
}

/// get_me
///
/// [Authenticated Route] The caller's profile, roles and effective permissions.
#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Profile", body = UserProfile),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn get_me(auth: AuthUser, State(state): State<AppState>) -> AppResult<Json<UserProfile>> {
    state
        .repo
        .get_user_profile(auth.id)
        .await?
        .map(Json)
        .ok_or(AppError::Unauthorized)
}

#[utoipa::path(
    get,
    path = "/admin/users",
    params(UserFilter),
    responses((status = 200, description = "Users with their roles", body = [UserProfile]))
)]
pub async fn list_users(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<UserFilter>,
) -> AppResult<Json<Vec<UserProfile>>> {
    auth.require(permissions::USERS_VIEW)?;
    let search = filter.search.filter(|s| !s.trim().is_empty());
    Ok(Json(state.repo.list_users(search).await?))
}

#[utoipa::path(
    get,
    path = "/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User", body = UserProfile),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_user(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<UserProfile>> {
    auth.require(permissions::USERS_VIEW)?;
    state
        .repo
        .get_user_profile(id)
        .await?
        .map(Json)
        .ok_or(AppError::not_found("User"))
}

/// The first permission of `role` the actor does not hold, as a `Forbidden` error.
fn ensure_can_grant(auth: &AuthUser, role_permissions: &[String]) -> AppResult<()> {
    if permissions::can_grant(&auth.permissions, role_permissions) {
        return Ok(());
    }
    let missing = role_permissions
        .iter()
        .find(|p| !auth.has_permission(p))
        .cloned()
        .unwrap_or_default();
    Err(AppError::forbidden(missing))
}

/// assign_role
///
/// [Admin Route] Grants a role to a user. Requires `users.manage` and every
/// permission the role carries, so nobody can hand out more than they hold.
/// Idempotent: 201 on a new grant, 200 if the user already had the role.
#[utoipa::path(
    post,
    path = "/admin/users/{id}/roles/{role_id}",
    params(
        ("id" = Uuid, Path, description = "User ID"),
        ("role_id" = Uuid, Path, description = "Role ID")
    ),
    responses(
        (status = 201, description = "Granted", body = UserProfile),
        (status = 200, description = "Already held", body = UserProfile),
        (status = 403, description = "Missing permission"),
        (status = 404, description = "User or role not found")
    )
)]
pub async fn assign_role(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((user_id, role_id)): Path<(Uuid, Uuid)>,
) -> AppResult<(StatusCode, Json<UserProfile>)> {
    auth.require(permissions::USERS_MANAGE)?;
    let role = state
        .repo
        .get_role(role_id)
        .await?
        .ok_or(AppError::not_found("Role"))?;
    ensure_can_grant(&auth, &role.permissions)?;
    if state.repo.get_user_profile(user_id).await?.is_none() {
        return Err(AppError::not_found("User"));
    }

    let created = state.repo.assign_role(user_id, role_id).await?;
    let profile = state
        .repo
        .get_user_profile(user_id)
        .await?
        .ok_or(AppError::not_found("User"))?;

    if created {
        tracing::info!(actor = %auth.id, user_id = %user_id, role = %role.name, "role granted");
        Ok((StatusCode::CREATED, Json(profile)))
    } else {
        Ok((StatusCode::OK, Json(profile)))
    }
}

#[utoipa::path(
    delete,
    path = "/admin/users/{id}/roles/{role_id}",
    params(
        ("id" = Uuid, Path, description = "User ID"),
        ("role_id" = Uuid, Path, description = "Role ID")
    ),
    responses(
        (status = 204, description = "Removed"),
        (status = 403, description = "Missing permission"),
        (status = 404, description = "User does not hold the role")
    )
)]
pub async fn remove_role(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((user_id, role_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    auth.require(permissions::USERS_MANAGE)?;
    let role = state
        .repo
        .get_role(role_id)
        .await?
        .ok_or(AppError::not_found("Role"))?;
    ensure_can_grant(&auth, &role.permissions)?;

    if !state.repo.remove_role(user_id, role_id).await? {
        return Err(AppError::not_found("Role assignment"));
    }
    tracing::info!(actor = %auth.id, user_id = %user_id, role = %role.name, "role removed");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/admin/roles",
    responses((status = 200, description = "Roles", body = [Role]))
)]
pub async fn list_roles(auth: AuthUser, State(state): State<AppState>) -> AppResult<Json<Vec<Role>>> {
    auth.require(permissions::USERS_VIEW)
        .or_else(|_| auth.require(permissions::ROLES_MANAGE))?;
    Ok(Json(state.repo.list_roles().await?))
}

async fn check_role_permissions(
    state: &AppState,
    auth: &AuthUser,
    requested: &[String],
) -> AppResult<()> {
    let catalogue: Vec<String> = state
        .repo
        .list_permissions()
        .await?
        .into_iter()
        .map(|p| p.name)
        .collect();
    permissions::validate_role_permissions(requested, &catalogue)?;
    ensure_can_grant(auth, requested)
}

/// create_role
///
/// [Admin Route] Requires `roles.manage`. Every permission must be catalogued
/// (or a wildcard covering catalogued permissions) and held by the caller.
#[utoipa::path(
    post,
    path = "/admin/roles",
    request_body = CreateRoleRequest,
    responses(
        (status = 201, description = "Created", body = Role),
        (status = 400, description = "Invalid name or unknown permission"),
        (status = 409, description = "Name taken")
    )
)]
pub async fn create_role(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateRoleRequest>,
) -> AppResult<(StatusCode, Json<Role>)> {
    auth.require(permissions::ROLES_MANAGE)?;
    payload.validate()?;
    check_role_permissions(&state, &auth, &payload.permissions).await?;

    let role = state.repo.create_role(payload).await?;
    tracing::info!(actor = %auth.id, role_id = %role.id, role = %role.name, "role created");
    Ok((StatusCode::CREATED, Json(role)))
}

#[utoipa::path(
    put,
    path = "/admin/roles/{id}",
    params(("id" = Uuid, Path, description = "Role ID")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Updated", body = Role),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_role(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRoleRequest>,
) -> AppResult<Json<Role>> {
    auth.require(permissions::ROLES_MANAGE)?;
    payload.validate()?;
    let current = state
        .repo
        .get_role(id)
        .await?
        .ok_or(AppError::not_found("Role"))?;
    // Editing a role counts as granting both what it had and what it will have.
    ensure_can_grant(&auth, &current.permissions)?;
    if let Some(requested) = &payload.permissions {
        check_role_permissions(&state, &auth, requested).await?;
    }

    let role = state
        .repo
        .update_role(id, payload)
        .await?
        .ok_or(AppError::not_found("Role"))?;
    tracing::info!(actor = %auth.id, role_id = %role.id, "role updated");
    Ok(Json(role))
}

#[utoipa::path(
    delete,
    path = "/admin/roles/{id}",
    params(("id" = Uuid, Path, description = "Role ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 400, description = "Default roles cannot be deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_role(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    auth.require(permissions::ROLES_MANAGE)?;
    let role = state
        .repo
        .get_role(id)
        .await?
        .ok_or(AppError::not_found("Role"))?;
    if role.is_default {
        return Err(AppError::bad_request(
            "Default roles cannot be deleted; unset is_default first",
        ));
    }
    ensure_can_grant(&auth, &role.permissions)?;

    if !state.repo.delete_role(id).await? {
        return Err(AppError::not_found("Role"));
    }
    tracing::info!(actor = %auth.id, role = %role.name, "role deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/admin/permissions",
    responses((status = 200, description = "Permission catalogue", body = [Permission]))
)]
pub async fn list_permissions(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Permission>>> {
    auth.require(permissions::ROLES_MANAGE)?;
    Ok(Json(state.repo.list_permissions().await?))
}
