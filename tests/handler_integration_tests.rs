mod common;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{Duration, Utc};
use clan_portal::{
    error::AppError,
    handlers::{
        admin, map_votes,
        map_votes::MapVoteFilter,
        servers, site,
        site::PagePath,
        store::{self, OrderFilter, ProductFilter},
        tickets::{self, TicketFilter},
        users::{self, UserFilter},
    },
    models::{
        AssignTicketRequest, CastVoteRequest, CreateNavigationItemRequest, CreateOrderRequest,
        CreateProductRequest, CreateRoleRequest, CreateServerRequest, CreateTicketRequest,
        OrderLineRequest, OrderStatus, RegisterUserRequest, TicketPriority, TicketReplyRequest,
        TicketStatus, UpdateMapVoteRequest, UpdateOrderStatusRequest, UpdateProductRequest,
        NavigationItem, UpdateNavigationItemRequest, UpdateRoleRequest, UpdateServerRequest,
        UpdateSiteSettingsRequest, UpsertPageMetadataRequest, VoteStatus,
    },
    AppState,
    auth::AuthUser,
    permissions,
    repository::{ADMIN_ROLE_ID, MEMBER_ROLE_ID, Repository},
};
use common::{admin as admin_user, map_vote_request, member, open_window, test_state};
use uuid::Uuid;

// --- Registration & roles ---

#[tokio::test]
async fn test_register_without_provider_creates_local_member() {
    let (_repo, state) = test_state();
    let payload = RegisterUserRequest {
        username: "NewRecruit".to_string(),
        email: "Recruit@Example.com".to_string(),
        password: "hunter2hunter2".to_string(),
    };

    let (status, Json(profile)) = users::register_user(State(state), Json(payload))
        .await
        .unwrap();

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(profile.username, "NewRecruit");
    assert_eq!(profile.email, "recruit@example.com");
    assert_eq!(profile.roles, vec!["member".to_string()]);
}

#[tokio::test]
async fn test_register_rejects_invalid_input_and_duplicates() {
    let (repo, state) = test_state();
    repo.seed_user("taken", &[]);

    let short_password = RegisterUserRequest {
        username: "fresh".to_string(),
        email: "fresh@example.com".to_string(),
        password: "short".to_string(),
    };
    let err = users::register_user(State(state.clone()), Json(short_password))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest { .. }));

    let duplicate = RegisterUserRequest {
        username: "taken".to_string(),
        email: "other@example.com".to_string(),
        password: "longenough".to_string(),
    };
    let err = users::register_user(State(state), Json(duplicate))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict { .. }));
}

#[tokio::test]
async fn test_get_me_returns_effective_permissions() {
    let (repo, state) = test_state();
    let boss = admin_user(&repo, "boss");

    let Json(profile) = users::get_me(boss.clone(), State(state)).await.unwrap();
    assert_eq!(profile.id, boss.id);
    assert!(profile.permissions.contains(&permissions::WILDCARD.to_string()));
}

#[tokio::test]
async fn test_assign_role_is_idempotent() {
    let (repo, state) = test_state();
    let boss = admin_user(&repo, "boss");
    let target = member(&repo, "target");
    let moderators = repo
        .create_role(CreateRoleRequest {
            name: "moderator".to_string(),
            permissions: vec![permissions::TICKETS_MANAGE.to_string()],
            ..Default::default()
        })
        .await
        .unwrap();

    let (status, Json(profile)) = users::assign_role(
        boss.clone(),
        State(state.clone()),
        Path((target.id, moderators.id)),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert!(profile.roles.contains(&"moderator".to_string()));
    assert!(profile.permissions.contains(&permissions::TICKETS_MANAGE.to_string()));

    let (status, _) = users::assign_role(boss, State(state), Path((target.id, moderators.id)))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_cannot_grant_more_than_you_hold() {
    let (repo, state) = test_state();
    let staff_role = repo
        .create_role(CreateRoleRequest {
            name: "recruiter".to_string(),
            permissions: vec![
                permissions::ADMIN_ACCESS.to_string(),
                permissions::USERS_MANAGE.to_string(),
            ],
            ..Default::default()
        })
        .await
        .unwrap();
    let recruiter = common::as_auth(&repo.seed_user("recruiter1", &["recruiter"]));
    let target = member(&repo, "target");

    // Admin holds `*`, which the recruiter does not.
    let err = users::assign_role(
        recruiter.clone(),
        State(state.clone()),
        Path((target.id, ADMIN_ROLE_ID)),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden { .. }));

    // Their own role is fine.
    let (status, _) = users::assign_role(recruiter, State(state), Path((target.id, staff_role.id)))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_member_cannot_manage_roles() {
    let (repo, state) = test_state();
    let pleb = member(&repo, "pleb");

    let err = users::assign_role(pleb.clone(), State(state.clone()), Path((pleb.id, ADMIN_ROLE_ID)))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden { .. }));

    let err = users::list_users(pleb, State(state), Query(UserFilter::default()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden { .. }));
}

#[tokio::test]
async fn test_remove_role_absent_is_not_found() {
    let (repo, state) = test_state();
    let boss = admin_user(&repo, "boss");
    let target = member(&repo, "target");

    let err = users::remove_role(boss.clone(), State(state.clone()), Path((target.id, ADMIN_ROLE_ID)))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound { .. }));

    let status = users::remove_role(boss, State(state), Path((target.id, MEMBER_ROLE_ID)))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);
    let profile = repo.get_user_profile(target.id).await.unwrap().unwrap();
    assert!(profile.roles.is_empty());
}

#[tokio::test]
async fn test_role_crud_validates_permissions() {
    let (repo, state) = test_state();
    let boss = admin_user(&repo, "boss");

    let unknown = CreateRoleRequest {
        name: "weird".to_string(),
        permissions: vec!["rockets.launch".to_string()],
        ..Default::default()
    };
    let err = users::create_role(boss.clone(), State(state.clone()), Json(unknown))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest { .. }));

    let (status, Json(role)) = users::create_role(
        boss.clone(),
        State(state.clone()),
        Json(CreateRoleRequest {
            name: "store staff".to_string(),
            color: Some("#2ecc71".to_string()),
            permissions: vec!["store.*".to_string()],
            ..Default::default()
        }),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::CREATED);

    let duplicate = CreateRoleRequest {
        name: "store staff".to_string(),
        ..Default::default()
    };
    let err = users::create_role(boss.clone(), State(state.clone()), Json(duplicate))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict { .. }));

    let Json(updated) = users::update_role(
        boss.clone(),
        State(state.clone()),
        Path(role.id),
        Json(UpdateRoleRequest {
            description: Some(Some("Runs the shop".to_string())),
            ..Default::default()
        }),
    )
    .await
    .unwrap();
    assert_eq!(updated.description.as_deref(), Some("Runs the shop"));
    assert_eq!(updated.permissions, vec!["store.*".to_string()]);

    let Json(cleared) = users::update_role(
        boss.clone(),
        State(state.clone()),
        Path(role.id),
        Json(UpdateRoleRequest {
            color: Some(None),
            ..Default::default()
        }),
    )
    .await
    .unwrap();
    assert_eq!(cleared.color, None);
    assert_eq!(cleared.description.as_deref(), Some("Runs the shop"));

    let status = users::delete_role(boss, State(state), Path(role.id)).await.unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_default_role_cannot_be_deleted() {
    let (repo, state) = test_state();
    let boss = admin_user(&repo, "boss");

    let err = users::delete_role(boss, State(state), Path(MEMBER_ROLE_ID))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest { .. }));
}

#[tokio::test]
async fn test_list_users_search() {
    let (repo, state) = test_state();
    let boss = admin_user(&repo, "boss");
    member(&repo, "sniper_sam");
    member(&repo, "medic_max");

    let Json(found) = users::list_users(
        boss,
        State(state),
        Query(UserFilter {
            search: Some("SNIPER".to_string()),
        }),
    )
    .await
    .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].username, "sniper_sam");
}

// --- Tickets ---

fn ticket_request(subject: &str) -> CreateTicketRequest {
    CreateTicketRequest {
        subject: subject.to_string(),
        category: "billing".to_string(),
        priority: TicketPriority::High,
        message: "My VIP rank did not arrive".to_string(),
    }
}

#[tokio::test]
async fn test_ticket_lifecycle() {
    let (repo, state) = test_state();
    let owner = member(&repo, "owner");
    let staff = admin_user(&repo, "staff");

    let (status, Json(ticket)) =
        tickets::create_ticket(owner.clone(), State(state.clone()), Json(ticket_request("Missing rank")))
            .await
            .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(ticket.status, TicketStatus::Open);

    let (_, Json(reply)) = tickets::reply_to_ticket(
        staff.clone(),
        State(state.clone()),
        Path(ticket.id),
        Json(TicketReplyRequest {
            body: "Looking into it".to_string(),
        }),
    )
    .await
    .unwrap();
    assert!(reply.is_staff);
    assert_eq!(reply.author_name, "staff");

    let Json(detail) = tickets::get_ticket(owner.clone(), State(state.clone()), Path(ticket.id))
        .await
        .unwrap();
    assert_eq!(detail.messages.len(), 2);
    assert!(!detail.messages[0].is_staff);

    let Json(closed) = tickets::close_ticket(owner.clone(), State(state.clone()), Path(ticket.id))
        .await
        .unwrap();
    assert_eq!(closed.status, TicketStatus::Closed);
    assert!(closed.closed_at.is_some());

    // Closed tickets accept neither replies nor a second close.
    let err = tickets::reply_to_ticket(
        owner.clone(),
        State(state.clone()),
        Path(ticket.id),
        Json(TicketReplyRequest {
            body: "Hello?".to_string(),
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest { .. }));

    let err = tickets::close_ticket(owner.clone(), State(state), Path(ticket.id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest { .. }));

    // A reply racing the close is rejected by the store itself.
    let err = repo
        .add_ticket_message(ticket.id, owner.id, "Late reply".to_string(), false)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest { .. }));
    assert_eq!(repo.get_ticket_messages(ticket.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_other_members_cannot_see_tickets() {
    let (repo, state) = test_state();
    let owner = member(&repo, "owner");
    let nosy = member(&repo, "nosy");

    let (_, Json(ticket)) =
        tickets::create_ticket(owner, State(state.clone()), Json(ticket_request("Private")))
            .await
            .unwrap();

    let err = tickets::get_ticket(nosy.clone(), State(state.clone()), Path(ticket.id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden { .. }));

    let err = tickets::close_ticket(nosy, State(state), Path(ticket.id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden { .. }));
}

#[tokio::test]
async fn test_staff_ticket_queue_and_assignment() {
    let (repo, state) = test_state();
    let owner = member(&repo, "owner");
    let staff = admin_user(&repo, "staff");

    let (_, Json(ticket)) =
        tickets::create_ticket(owner.clone(), State(state.clone()), Json(ticket_request("Help")))
            .await
            .unwrap();

    // Members cannot be assignees.
    let err = tickets::assign_ticket(
        staff.clone(),
        State(state.clone()),
        Path(ticket.id),
        Json(AssignTicketRequest {
            assignee: Some(owner.id),
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest { .. }));

    let Json(assigned) = tickets::assign_ticket(
        staff.clone(),
        State(state.clone()),
        Path(ticket.id),
        Json(AssignTicketRequest {
            assignee: Some(staff.id),
        }),
    )
    .await
    .unwrap();
    assert_eq!(assigned.assigned_to, Some(staff.id));

    let Json(open) = tickets::list_all_tickets(
        staff,
        State(state.clone()),
        Query(TicketFilter {
            status: Some(TicketStatus::Open),
        }),
    )
    .await
    .unwrap();
    assert_eq!(open.len(), 1);

    let err = tickets::list_all_tickets(owner, State(state), Query(TicketFilter::default()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden { .. }));
}

// --- Servers ---

#[tokio::test]
async fn test_server_management_and_visibility() {
    let (repo, state) = test_state();
    let boss = admin_user(&repo, "boss");

    let (_, Json(server)) = servers::create_server(
        boss.clone(),
        State(state.clone()),
        Json(CreateServerRequest {
            name: "EU Retake".to_string(),
            game: "cs2".to_string(),
            address: "retake.example.com".to_string(),
            port: 27015,
            is_active: true,
            ..Default::default()
        }),
    )
    .await
    .unwrap();

    let bad_port = CreateServerRequest {
        name: "Broken".to_string(),
        game: "cs2".to_string(),
        address: "x".to_string(),
        port: 70000,
        ..Default::default()
    };
    let err = servers::create_server(boss.clone(), State(state.clone()), Json(bad_port))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest { .. }));

    let Json(public) = servers::get_servers(State(state.clone())).await.unwrap();
    assert_eq!(public.len(), 1);

    servers::update_server(
        boss.clone(),
        State(state.clone()),
        Path(server.id),
        Json(UpdateServerRequest {
            is_active: Some(false),
            ..Default::default()
        }),
    )
    .await
    .unwrap();

    let Json(public) = servers::get_servers(State(state.clone())).await.unwrap();
    assert!(public.is_empty());
    let err = servers::get_server(State(state.clone()), Path(server.id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound { .. }));

    let Json(all) = servers::list_all_servers(boss.clone(), State(state.clone()))
        .await
        .unwrap();
    assert_eq!(all.len(), 1);

    let status = servers::delete_server(boss, State(state), Path(server.id))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);
}

// --- Map votes ---

#[tokio::test]
async fn test_cast_vote_once_and_see_choice() {
    let (repo, state) = test_state();
    let boss = admin_user(&repo, "boss");
    let voter = member(&repo, "voter");
    let (start, end) = open_window();

    let (status, Json(created)) =
        map_votes::create_map_vote(boss, State(state.clone()), Json(map_vote_request(start, end)))
            .await
            .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created.status, VoteStatus::Active);
    assert_eq!(created.options.len(), 3);
    assert_eq!(created.options[0].position, 0);

    let inferno = created.options[1].option_id;
    let (status, Json(after)) = map_votes::cast_vote(
        voter.clone(),
        State(state.clone()),
        Path(created.id),
        Json(CastVoteRequest { option_id: inferno }),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(after.total_votes, 1);
    assert_eq!(after.user_choice, Some(inferno));
    // Active votes never report a winner.
    assert_eq!(after.winning_option_id, None);

    let err = map_votes::cast_vote(
        voter.clone(),
        State(state.clone()),
        Path(created.id),
        Json(CastVoteRequest {
            option_id: created.options[0].option_id,
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict { .. }));

    let Json(anonymous) = map_votes::get_map_vote(None, State(state.clone()), Path(created.id))
        .await
        .unwrap();
    assert_eq!(anonymous.user_choice, None);

    let Json(personal) = map_votes::get_map_vote(Some(voter), State(state), Path(created.id))
        .await
        .unwrap();
    assert_eq!(personal.user_choice, Some(inferno));
}

#[tokio::test]
async fn test_cast_vote_outside_window_or_foreign_option() {
    let (repo, state) = test_state();
    let boss = admin_user(&repo, "boss");
    let voter = member(&repo, "voter");
    let now = Utc::now();

    let (_, Json(upcoming)) = map_votes::create_map_vote(
        boss.clone(),
        State(state.clone()),
        Json(map_vote_request(now + Duration::hours(1), now + Duration::hours(2))),
    )
    .await
    .unwrap();
    let err = map_votes::cast_vote(
        voter.clone(),
        State(state.clone()),
        Path(upcoming.id),
        Json(CastVoteRequest {
            option_id: upcoming.options[0].option_id,
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest { .. }));

    let (start, end) = open_window();
    let (_, Json(active)) =
        map_votes::create_map_vote(boss, State(state.clone()), Json(map_vote_request(start, end)))
            .await
            .unwrap();
    let err = map_votes::cast_vote(
        voter,
        State(state),
        Path(active.id),
        Json(CastVoteRequest {
            option_id: upcoming.options[0].option_id,
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest { .. }));
}

#[tokio::test]
async fn test_completed_vote_reports_winner() {
    let (repo, state) = test_state();
    let boss = admin_user(&repo, "boss");
    let now = Utc::now();

    let vote = repo
        .create_map_vote(
            map_vote_request(now - Duration::hours(3), now - Duration::hours(1)),
            boss.id,
        )
        .await
        .unwrap();
    let options = repo.get_option_tallies(&[vote.id]).await.unwrap();
    let mirage = options[2].option_id;
    for name in ["a1", "a2"] {
        let voter = member(&repo, name);
        repo.cast_vote(voter.id, vote.id, mirage).await.unwrap();
    }
    let voter = member(&repo, "a3");
    repo.cast_vote(voter.id, vote.id, options[0].option_id).await.unwrap();

    let Json(summary) = map_votes::get_map_vote(None, State(state.clone()), Path(vote.id))
        .await
        .unwrap();
    assert_eq!(summary.status, VoteStatus::Completed);
    assert_eq!(summary.total_votes, 3);
    assert_eq!(summary.winning_option_id, Some(mirage));

    let Json(completed) = map_votes::get_map_votes(
        None,
        State(state.clone()),
        Query(MapVoteFilter {
            status: Some(VoteStatus::Completed),
        }),
    )
    .await
    .unwrap();
    assert_eq!(completed.len(), 1);

    let Json(active) = map_votes::get_map_votes(
        None,
        State(state),
        Query(MapVoteFilter {
            status: Some(VoteStatus::Active),
        }),
    )
    .await
    .unwrap();
    assert!(active.is_empty());
}

#[tokio::test]
async fn test_map_vote_validation() {
    let (repo, state) = test_state();
    let boss = admin_user(&repo, "boss");
    let now = Utc::now();

    let mut backwards = map_vote_request(now, now - Duration::minutes(5));
    let err = map_votes::create_map_vote(boss.clone(), State(state.clone()), Json(backwards.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest { .. }));

    backwards.end_time = now + Duration::hours(1);
    backwards.options.truncate(1);
    let err = map_votes::create_map_vote(boss.clone(), State(state.clone()), Json(backwards))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest { .. }));

    let mut unknown_server = map_vote_request(now, now + Duration::hours(1));
    unknown_server.server_id = Some(Uuid::new_v4());
    let err = map_votes::create_map_vote(boss.clone(), State(state.clone()), Json(unknown_server))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest { .. }));

    let (_, Json(vote)) = map_votes::create_map_vote(
        boss.clone(),
        State(state.clone()),
        Json(map_vote_request(now, now + Duration::hours(1))),
    )
    .await
    .unwrap();
    // Moving the end before the existing start is rejected.
    let err = map_votes::update_map_vote(
        boss.clone(),
        State(state.clone()),
        Path(vote.id),
        Json(UpdateMapVoteRequest {
            end_time: Some(now - Duration::hours(1)),
            ..Default::default()
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest { .. }));

    let status = map_votes::delete_map_vote(boss, State(state), Path(vote.id))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);
}

// --- Storefront ---

fn product_request(name: &str, price_cents: i64, stock: Option<i32>) -> CreateProductRequest {
    CreateProductRequest {
        name: name.to_string(),
        description: format!("{name} for the season"),
        price_cents,
        category: "ranks".to_string(),
        image_key: None,
        stock,
        is_active: true,
    }
}

#[tokio::test]
async fn test_checkout_reserves_and_cancel_restores_stock() {
    let (repo, state) = test_state();
    let boss = admin_user(&repo, "boss");
    let buyer = member(&repo, "buyer");

    let (_, Json(vip)) = store::create_product(
        boss.clone(),
        State(state.clone()),
        Json(product_request("VIP", 999, Some(5))),
    )
    .await
    .unwrap();
    let (_, Json(tag)) = store::create_product(
        boss.clone(),
        State(state.clone()),
        Json(product_request("Custom tag", 250, None)),
    )
    .await
    .unwrap();

    let (status, Json(order)) = store::create_order(
        buyer.clone(),
        State(state.clone()),
        Json(CreateOrderRequest {
            items: vec![
                OrderLineRequest {
                    product_id: vip.id,
                    quantity: 2,
                },
                OrderLineRequest {
                    product_id: tag.id,
                    quantity: 1,
                },
            ],
        }),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.total_cents, 2 * 999 + 250);
    assert_eq!(order.items.len(), 2);

    let Json(after) = store::get_product(State(state.clone()), Path(vip.id)).await.unwrap();
    assert_eq!(after.stock, Some(3));

    let Json(cancelled) = store::update_order_status(
        boss.clone(),
        State(state.clone()),
        Path(order.id),
        Json(UpdateOrderStatusRequest {
            status: OrderStatus::Cancelled,
        }),
    )
    .await
    .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);

    let Json(restored) = store::get_product(State(state.clone()), Path(vip.id)).await.unwrap();
    assert_eq!(restored.stock, Some(5));

    // Settled orders are final.
    let err = store::update_order_status(
        boss,
        State(state.clone()),
        Path(order.id),
        Json(UpdateOrderStatusRequest {
            status: OrderStatus::Completed,
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest { .. }));

    let Json(mine) = store::list_my_orders(buyer, State(state)).await.unwrap();
    assert_eq!(mine.len(), 1);
}

#[tokio::test]
async fn test_checkout_rejections() {
    let (repo, state) = test_state();
    let boss = admin_user(&repo, "boss");
    let buyer = member(&repo, "buyer");

    let (_, Json(scarce)) = store::create_product(
        boss.clone(),
        State(state.clone()),
        Json(product_request("Founder badge", 5000, Some(1))),
    )
    .await
    .unwrap();

    let order = |product_id, quantity| {
        Json(CreateOrderRequest {
            items: vec![OrderLineRequest {
                product_id,
                quantity,
            }],
        })
    };

    let err = store::create_order(buyer.clone(), State(state.clone()), order(scarce.id, 2))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict { .. }));

    let err = store::create_order(buyer.clone(), State(state.clone()), order(Uuid::new_v4(), 1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound { .. }));

    let err = store::create_order(
        buyer.clone(),
        State(state.clone()),
        Json(CreateOrderRequest { items: vec![] }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest { .. }));

    store::update_product(
        boss,
        State(state.clone()),
        Path(scarce.id),
        Json(UpdateProductRequest {
            is_active: Some(false),
            ..Default::default()
        }),
    )
    .await
    .unwrap();
    let err = store::create_order(buyer, State(state.clone()), order(scarce.id, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest { .. }));

    // Failed checkouts leave stock untouched.
    let product = repo.get_product(scarce.id).await.unwrap().unwrap();
    assert_eq!(product.stock, Some(1));
}

#[tokio::test]
async fn test_product_listing_filters_and_order_privacy() {
    let (repo, state) = test_state();
    let boss = admin_user(&repo, "boss");
    let buyer = member(&repo, "buyer");
    let other = member(&repo, "other");

    let (_, Json(vip)) = store::create_product(
        boss.clone(),
        State(state.clone()),
        Json(product_request("VIP", 999, None)),
    )
    .await
    .unwrap();
    let mut hidden = product_request("Retired skin", 100, None);
    hidden.category = "cosmetics".to_string();
    hidden.is_active = false;
    store::create_product(boss.clone(), State(state.clone()), Json(hidden))
        .await
        .unwrap();

    let Json(public) = store::get_products(State(state.clone()), Query(ProductFilter::default()))
        .await
        .unwrap();
    assert_eq!(public.len(), 1);

    let Json(searched) = store::get_products(
        State(state.clone()),
        Query(ProductFilter {
            category: Some("ranks".to_string()),
            search: Some("vip".to_string()),
        }),
    )
    .await
    .unwrap();
    assert_eq!(searched.len(), 1);

    let Json(all) = store::list_all_products(boss.clone(), State(state.clone()), Query(ProductFilter::default()))
        .await
        .unwrap();
    assert_eq!(all.len(), 2);

    let (_, Json(order)) = store::create_order(
        buyer.clone(),
        State(state.clone()),
        Json(CreateOrderRequest {
            items: vec![OrderLineRequest {
                product_id: vip.id,
                quantity: 1,
            }],
        }),
    )
    .await
    .unwrap();

    let err = store::get_order(other, State(state.clone()), Path(order.id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden { .. }));
    store::get_order(boss.clone(), State(state.clone()), Path(order.id))
        .await
        .unwrap();

    let Json(pending) = store::list_all_orders(
        boss.clone(),
        State(state.clone()),
        Query(OrderFilter {
            status: Some(OrderStatus::Pending),
        }),
    )
    .await
    .unwrap();
    assert_eq!(pending.len(), 1);

    // Ordered products cannot be deleted.
    let err = store::delete_product(boss, State(state), Path(vip.id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest { .. }));
}

// --- Site content ---

#[tokio::test]
async fn test_page_metadata_upsert_and_lookup() {
    let (repo, state) = test_state();
    let boss = admin_user(&repo, "boss");

    let page = |title: &str| UpsertPageMetadataRequest {
        path: "/about".to_string(),
        title: title.to_string(),
        description: Some("Who we are".to_string()),
        keywords: None,
        og_image: None,
    };

    site::upsert_page(boss.clone(), State(state.clone()), Json(page("About")))
        .await
        .unwrap();
    site::upsert_page(boss.clone(), State(state.clone()), Json(page("About us")))
        .await
        .unwrap();

    let Json(found) = site::get_page_metadata(
        State(state.clone()),
        Query(PagePath {
            path: "/about".to_string(),
        }),
    )
    .await
    .unwrap();
    assert_eq!(found.title, "About us");

    let Json(all) = site::list_pages(boss.clone(), State(state.clone())).await.unwrap();
    assert_eq!(all.len(), 1);

    let mut relative = page("Bad");
    relative.path = "about".to_string();
    let err = site::upsert_page(boss.clone(), State(state.clone()), Json(relative))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest { .. }));

    site::delete_page(
        boss,
        State(state.clone()),
        Query(PagePath {
            path: "/about".to_string(),
        }),
    )
    .await
    .unwrap();
    let err = site::get_page_metadata(
        State(state),
        Query(PagePath {
            path: "/about".to_string(),
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound { .. }));
}

fn nav_item(label: &str, parent_id: Option<Uuid>, is_visible: bool) -> CreateNavigationItemRequest {
    CreateNavigationItemRequest {
        label: label.to_string(),
        href: format!("/{}", label.to_lowercase()),
        parent_id,
        is_visible,
        ..Default::default()
    }
}

async fn add_nav(state: &AppState, boss: &AuthUser, item: CreateNavigationItemRequest) -> NavigationItem {
    let (_, Json(created)) = site::create_navigation_item(boss.clone(), State(state.clone()), Json(item))
        .await
        .unwrap();
    created
}

async fn reparent(
    state: &AppState,
    boss: &AuthUser,
    id: Uuid,
    parent_id: Option<Uuid>,
) -> Result<NavigationItem, AppError> {
    site::update_navigation_item(
        boss.clone(),
        State(state.clone()),
        Path(id),
        Json(UpdateNavigationItemRequest {
            parent_id: Some(parent_id),
            ..Default::default()
        }),
    )
    .await
    .map(|Json(item)| item)
}

#[tokio::test]
async fn test_navigation_visibility_and_cascade() {
    let (repo, state) = test_state();
    let boss = admin_user(&repo, "boss");

    let community = add_nav(&state, &boss, nav_item("Community", None, true)).await;
    let discord = add_nav(&state, &boss, nav_item("Discord", Some(community.id), true)).await;
    let voice = add_nav(&state, &boss, nav_item("Voice", Some(discord.id), true)).await;
    add_nav(&state, &boss, nav_item("Drafts", None, false)).await;

    let Json(public) = site::get_navigation(State(state.clone())).await.unwrap();
    assert_eq!(public.len(), 3);
    assert_eq!(public[0].label, "Community");

    let Json(all) = site::list_all_navigation(boss.clone(), State(state.clone()))
        .await
        .unwrap();
    assert_eq!(all.len(), 4);

    // Three levels deep: everything under Community goes with it.
    site::delete_navigation_item(boss.clone(), State(state.clone()), Path(community.id))
        .await
        .unwrap();
    let Json(remaining) = site::list_all_navigation(boss, State(state)).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].label, "Drafts");
    assert!(remaining.iter().all(|n| n.id != voice.id && n.id != discord.id));
}

#[tokio::test]
async fn test_navigation_reparenting_rules() {
    let (repo, state) = test_state();
    let boss = admin_user(&repo, "boss");

    let community = add_nav(&state, &boss, nav_item("Community", None, true)).await;
    let discord = add_nav(&state, &boss, nav_item("Discord", Some(community.id), true)).await;
    let voice = add_nav(&state, &boss, nav_item("Voice", Some(discord.id), true)).await;

    let err = reparent(&state, &boss, community.id, Some(community.id)).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest { .. }));

    // Community -> Discord -> Voice -> Community would loop.
    let err = reparent(&state, &boss, community.id, Some(voice.id)).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest { .. }));

    let err = reparent(&state, &boss, discord.id, Some(Uuid::new_v4())).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest { .. }));
    let discord_now = repo.list_navigation(true).await.unwrap();
    assert_eq!(
        discord_now.iter().find(|n| n.id == discord.id).unwrap().parent_id,
        Some(community.id)
    );

    // Sending null moves the item back to the top level.
    let moved = reparent(&state, &boss, voice.id, None).await.unwrap();
    assert_eq!(moved.parent_id, None);

    // Omitting parent_id leaves it untouched.
    let Json(renamed) = site::update_navigation_item(
        boss.clone(),
        State(state.clone()),
        Path(discord.id),
        Json(UpdateNavigationItemRequest {
            label: Some("Discord Server".to_string()),
            ..Default::default()
        }),
    )
    .await
    .unwrap();
    assert_eq!(renamed.parent_id, Some(community.id));

    site::delete_navigation_item(boss.clone(), State(state.clone()), Path(community.id))
        .await
        .unwrap();
    let remaining = repo.list_navigation(true).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, voice.id);
}

#[tokio::test]
async fn test_settings_update() {
    let (repo, state) = test_state();
    let boss = admin_user(&repo, "boss");
    let pleb = member(&repo, "pleb");

    let Json(settings) = site::get_settings(State(state.clone())).await.unwrap();
    assert_eq!(settings.site_name, "Clan Portal");

    let Json(updated) = site::update_settings(
        boss.clone(),
        State(state.clone()),
        Json(UpdateSiteSettingsRequest {
            tagline: Some(Some("Frag responsibly".to_string())),
            discord_url: Some(Some("https://discord.gg/example".to_string())),
            currency: Some("EUR".to_string()),
            ..Default::default()
        }),
    )
    .await
    .unwrap();
    assert_eq!(updated.currency, "EUR");
    assert_eq!(updated.site_name, "Clan Portal");
    assert_eq!(updated.tagline.as_deref(), Some("Frag responsibly"));

    let Json(cleared) = site::update_settings(
        boss.clone(),
        State(state.clone()),
        Json(UpdateSiteSettingsRequest {
            tagline: Some(None),
            ..Default::default()
        }),
    )
    .await
    .unwrap();
    assert_eq!(cleared.tagline, None);
    assert_eq!(cleared.discord_url.as_deref(), Some("https://discord.gg/example"));

    let err = site::update_settings(
        boss,
        State(state.clone()),
        Json(UpdateSiteSettingsRequest {
            currency: Some("euro".to_string()),
            ..Default::default()
        }),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest { .. }));

    let err = site::update_settings(pleb, State(state), Json(UpdateSiteSettingsRequest::default()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden { .. }));
}

// --- Dashboard ---

#[tokio::test]
async fn test_admin_stats_counts() {
    let (repo, state) = test_state();
    let boss = admin_user(&repo, "boss");
    let owner = member(&repo, "owner");

    tickets::create_ticket(owner.clone(), State(state.clone()), Json(ticket_request("One")))
        .await
        .unwrap();
    let (start, end) = open_window();
    repo.create_map_vote(map_vote_request(start, end), boss.id)
        .await
        .unwrap();

    let Json(stats) = admin::get_admin_stats(boss, State(state.clone())).await.unwrap();
    assert_eq!(stats.total_users, 2);
    assert_eq!(stats.open_tickets, 1);
    assert_eq!(stats.active_map_votes, 1);
    assert_eq!(stats.pending_orders, 0);

    let err = admin::get_admin_stats(owner, State(state)).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden { .. }));
}
