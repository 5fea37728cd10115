mod common;

use axum::http::StatusCode;
use clan_portal::{
    MockStorageService, create_router,
    models::{CreateRoleRequest, PresignedUrlRequest, PresignedUrlResponse},
    permissions,
    repository::Repository,
};
use common::{admin, as_auth, member, read_json, request, state_with_storage};
use serde_json::Value;
use tower::ServiceExt;

fn upload_body(filename: &str, file_type: &str) -> Option<String> {
    Some(
        serde_json::to_string(&PresignedUrlRequest {
            filename: filename.to_string(),
            file_type: file_type.to_string(),
        })
        .unwrap(),
    )
}

#[tokio::test]
async fn test_presigned_url_for_admin() {
    let (repo, state) = state_with_storage(MockStorageService::new());
    let boss = admin(&repo, "boss");
    let app = create_router(state);

    let response = app
        .oneshot(request(
            "POST",
            "/upload/presigned",
            Some(&boss),
            upload_body("Banner.PNG", "image/png"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: PresignedUrlResponse = read_json(response).await;
    assert!(body.resource_key.starts_with("uploads/"));
    assert!(body.resource_key.ends_with(".png"));
    assert!(body.upload_url.contains(&body.resource_key));
}

#[tokio::test]
async fn test_presigned_url_with_upload_role() {
    let (repo, state) = state_with_storage(MockStorageService::new());
    repo.create_role(CreateRoleRequest {
        name: "mapper".to_string(),
        permissions: vec![permissions::UPLOADS_CREATE.to_string()],
        ..Default::default()
    })
    .await
    .unwrap();
    let mapper = as_auth(&repo.seed_user("mapper1", &["mapper"]));
    let app = create_router(state);

    let response = app
        .oneshot(request(
            "POST",
            "/upload/presigned",
            Some(&mapper),
            upload_body("de_nuke.jpg", "image/jpeg"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_presigned_url_forbidden_for_members() {
    let (repo, state) = state_with_storage(MockStorageService::new());
    let pleb = member(&repo, "pleb");
    let app = create_router(state);

    let response = app
        .oneshot(request(
            "POST",
            "/upload/presigned",
            Some(&pleb),
            upload_body("cat.png", "image/png"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_presigned_url_rejects_non_images() {
    let (repo, state) = state_with_storage(MockStorageService::new());
    let boss = admin(&repo, "boss");
    let app = create_router(state);

    let response = app
        .oneshot(request(
            "POST",
            "/upload/presigned",
            Some(&boss),
            upload_body("payload.exe", "application/octet-stream"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_presigned_url_storage_failure_is_500() {
    let (repo, state) = state_with_storage(MockStorageService::new_failing());
    let boss = admin(&repo, "boss");
    let app = create_router(state);

    let response = app
        .oneshot(request(
            "POST",
            "/upload/presigned",
            Some(&boss),
            upload_body("banner.png", "image/png"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = read_json(response).await;
    // Storage details stay in the logs.
    assert_eq!(body["error"], "Internal server error");
}
