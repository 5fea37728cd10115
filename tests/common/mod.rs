#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response},
};
use chrono::{DateTime, Duration, Utc};
use clan_portal::{
    AppConfig, AppState, MemoryRepository, MockStorageService, create_router,
    auth::AuthUser,
    models::{CreateMapVoteRequest, MapOptionInput, UserProfile},
    repository::RepositoryState,
    storage::StorageState,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// In-memory application state. The repository handle is returned separately so
/// tests can seed users and inspect data behind the handlers' backs.
pub fn test_state() -> (Arc<MemoryRepository>, AppState) {
    state_with_storage(MockStorageService::new())
}

pub fn state_with_storage(storage: MockStorageService) -> (Arc<MemoryRepository>, AppState) {
    let repo = Arc::new(MemoryRepository::new());
    let state = AppState {
        repo: repo.clone() as RepositoryState,
        storage: Arc::new(storage) as StorageState,
        config: AppConfig::default(),
    };
    (repo, state)
}

pub fn test_app() -> (Arc<MemoryRepository>, Router) {
    let (repo, state) = test_state();
    (repo, create_router(state))
}

/// The identity the extractor would resolve for `profile`.
pub fn as_auth(profile: &UserProfile) -> AuthUser {
    AuthUser {
        id: profile.id,
        username: profile.username.clone(),
        roles: profile.roles.clone(),
        permissions: profile.permissions.clone(),
    }
}

pub fn member(repo: &MemoryRepository, name: &str) -> AuthUser {
    as_auth(&repo.seed_user(name, &[]))
}

pub fn admin(repo: &MemoryRepository, name: &str) -> AuthUser {
    as_auth(&repo.seed_user(name, &["admin"]))
}

/// A map vote request with options `de_dust2`, `de_inferno`, `de_mirage`.
pub fn map_vote_request(start: DateTime<Utc>, end: DateTime<Utc>) -> CreateMapVoteRequest {
    CreateMapVoteRequest {
        server_id: None,
        title: "Friday night map".to_string(),
        description: None,
        start_time: start,
        end_time: end,
        options: ["de_dust2", "de_inferno", "de_mirage"]
            .iter()
            .map(|name| MapOptionInput {
                map_name: name.to_string(),
                image_key: None,
            })
            .collect(),
    }
}

/// A window that opened an hour ago and closes in an hour.
pub fn open_window() -> (DateTime<Utc>, DateTime<Utc>) {
    let now = Utc::now();
    (now - Duration::hours(1), now + Duration::hours(1))
}

pub fn request(method: &str, uri: &str, user: Option<&AuthUser>, body: Option<String>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user.id.to_string());
    }
    match body {
        Some(json) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(json))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn read_json<T: DeserializeOwned>(response: Response<Body>) -> T {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
