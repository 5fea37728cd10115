use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::rust::double_option;
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

// --- Users & Access Control ---

/// User
///
/// A community member's canonical record in the `users` table. The id mirrors the
/// identity provider's subject so bearer tokens map directly onto rows.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub avatar_url: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// UserProfile
///
/// A user together with the names of the roles they hold and the union of those
/// roles' permission strings. This is what authentication resolves and what
/// `GET /me` and the admin user list return.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub avatar_url: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

/// Role
///
/// A named bundle of permission strings. Roles flagged `is_default` are granted
/// to every user at registration.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Display colour for the role badge, e.g. `#e74c3c`.
    pub color: Option<String>,
    pub is_default: bool,
    pub permissions: Vec<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Permission
///
/// Catalogue entry describing one grantable permission string.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Permission {
    pub name: String,
    pub description: String,
}

/// Input for `POST /register`. The password is forwarded to the identity provider
/// and never stored or logged here.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl RegisterUserRequest {
    pub fn validate(&self) -> AppResult<()> {
        let username = self.username.trim();
        if username.len() < 3 || username.len() > 32 {
            return Err(AppError::bad_request(
                "Username must be between 3 and 32 characters",
            ));
        }
        if !username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(AppError::bad_request(
                "Username may only contain letters, digits, '_' and '-'",
            ));
        }
        if !self.email.contains('@') {
            return Err(AppError::bad_request("Email address is invalid"));
        }
        if self.password.len() < 8 {
            return Err(AppError::bad_request(
                "Password must be at least 8 characters",
            ));
        }
        Ok(())
    }
}

/// Internal payload used to create the local mirror of a registered user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateRoleRequest {
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl CreateRoleRequest {
    pub fn validate(&self) -> AppResult<()> {
        validate_role_name(&self.name)
    }
}

/// Partial role update. Omitted fields keep their current value.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateRoleRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// None = no change, Some(None) = clear, Some(text) = set
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[ts(type = "string | null")]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[ts(type = "string | null")]
    pub color: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_default: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,
}

impl UpdateRoleRequest {
    pub fn validate(&self) -> AppResult<()> {
        match &self.name {
            Some(name) => validate_role_name(name),
            None => Ok(()),
        }
    }
}

fn validate_role_name(name: &str) -> AppResult<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.len() > 32 {
        return Err(AppError::bad_request(
            "Role name must be between 1 and 32 characters",
        ));
    }
    Ok(())
}

// --- Support Tickets ---

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default,
)]
#[sqlx(type_name = "ticket_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum TicketStatus {
    #[default]
    Open,
    Closed,
}

impl TicketStatus {
    /// Tickets only ever move from open to closed.
    pub fn can_transition_to(self, next: TicketStatus) -> bool {
        matches!((self, next), (TicketStatus::Open, TicketStatus::Closed))
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default,
)]
#[sqlx(type_name = "ticket_priority", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum TicketPriority {
    Low,
    #[default]
    Normal,
    High,
}

/// Ticket
///
/// A support request opened by a member. The conversation lives in `TicketMessage`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Ticket {
    pub id: Uuid,
    // Owner (the member who opened the ticket).
    pub user_id: Uuid,
    pub subject: String,
    pub category: String,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    // Staff member currently handling the ticket.
    pub assigned_to: Option<Uuid>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
    #[ts(type = "string | null")]
    pub closed_at: Option<DateTime<Utc>>,
}

/// TicketMessage
///
/// One entry in a ticket thread, joined with the author's username.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct TicketMessage {
    pub id: i64,
    pub ticket_id: Uuid,
    pub author_id: Uuid,
    #[sqlx(default)]
    pub author_name: String,
    pub body: String,
    /// True when posted by someone acting with `tickets.manage`.
    pub is_staff: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct TicketDetail {
    pub ticket: Ticket,
    pub messages: Vec<TicketMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateTicketRequest {
    pub subject: String,
    pub category: String,
    #[serde(default)]
    pub priority: TicketPriority,
    /// Body of the first message in the thread.
    pub message: String,
}

impl CreateTicketRequest {
    pub fn validate(&self) -> AppResult<()> {
        if self.subject.trim().is_empty() || self.subject.len() > 200 {
            return Err(AppError::bad_request(
                "Subject must be between 1 and 200 characters",
            ));
        }
        if self.category.trim().is_empty() {
            return Err(AppError::bad_request("Category is required"));
        }
        validate_message_body(&self.message)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct TicketReplyRequest {
    pub body: String,
}

impl TicketReplyRequest {
    pub fn validate(&self) -> AppResult<()> {
        validate_message_body(&self.body)
    }
}

fn validate_message_body(body: &str) -> AppResult<()> {
    if body.trim().is_empty() || body.len() > 10_000 {
        return Err(AppError::bad_request(
            "Message must be between 1 and 10000 characters",
        ));
    }
    Ok(())
}

/// Assigns (or with `null`, unassigns) a ticket.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AssignTicketRequest {
    pub assignee: Option<Uuid>,
}

// --- Game Servers ---

/// GameServer
///
/// A clan-hosted game server listed on the public site.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct GameServer {
    pub id: Uuid,
    pub name: String,
    pub game: String,
    pub address: String,
    pub port: i32,
    pub description: Option<String>,
    // S3 key of the banner image.
    pub image_key: Option<String>,
    pub is_active: bool,
    pub display_order: i32,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateServerRequest {
    pub name: String,
    pub game: String,
    pub address: String,
    pub port: i32,
    pub description: Option<String>,
    pub image_key: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub display_order: i32,
}

impl CreateServerRequest {
    pub fn validate(&self) -> AppResult<()> {
        if self.name.trim().is_empty() || self.game.trim().is_empty() {
            return Err(AppError::bad_request("Name and game are required"));
        }
        if self.address.trim().is_empty() {
            return Err(AppError::bad_request("Address is required"));
        }
        validate_port(self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateServerRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,
    /// None = no change, Some(None) = clear, Some(text) = set
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[ts(type = "string | null")]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[ts(type = "string | null")]
    pub image_key: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_order: Option<i32>,
}

impl UpdateServerRequest {
    pub fn validate(&self) -> AppResult<()> {
        match self.port {
            Some(port) => validate_port(port),
            None => Ok(()),
        }
    }
}

fn validate_port(port: i32) -> AppResult<()> {
    if !(1..=65535).contains(&port) {
        return Err(AppError::bad_request("Port must be between 1 and 65535"));
    }
    Ok(())
}

fn default_true() -> bool {
    true
}

// --- Map Votes ---

/// Where a map vote sits relative to its time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum VoteStatus {
    Upcoming,
    Active,
    Completed,
}

/// MapVote
///
/// A time-boxed poll choosing the next map for a server.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct MapVote {
    pub id: Uuid,
    pub server_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    #[ts(type = "string")]
    pub start_time: DateTime<Utc>,
    #[ts(type = "string")]
    pub end_time: DateTime<Utc>,
    pub created_by: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct MapVoteOption {
    pub id: Uuid,
    pub map_vote_id: Uuid,
    pub map_name: String,
    pub image_key: Option<String>,
    pub position: i32,
}

/// OptionTally
///
/// An option together with the number of ballots cast for it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct OptionTally {
    pub option_id: Uuid,
    pub map_vote_id: Uuid,
    pub map_name: String,
    pub image_key: Option<String>,
    pub position: i32,
    #[ts(type = "number")]
    pub votes: i64,
}

/// A single ballot; at most one per user per map vote.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct UserVote {
    pub user_id: Uuid,
    pub map_vote_id: Uuid,
    pub option_id: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// MapVoteSummary
///
/// UI-ready view of a map vote: its window status, per-option counts, the winner
/// once the vote has completed, and the caller's own ballot if any.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MapVoteSummary {
    pub id: Uuid,
    pub server_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    #[ts(type = "string")]
    pub start_time: DateTime<Utc>,
    #[ts(type = "string")]
    pub end_time: DateTime<Utc>,
    pub status: VoteStatus,
    pub options: Vec<OptionTally>,
    #[ts(type = "number")]
    pub total_votes: i64,
    pub winning_option_id: Option<Uuid>,
    pub user_choice: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct MapOptionInput {
    pub map_name: String,
    pub image_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateMapVoteRequest {
    pub server_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    #[ts(type = "string")]
    pub start_time: DateTime<Utc>,
    #[ts(type = "string")]
    pub end_time: DateTime<Utc>,
    /// Listed in display order; positions are assigned from 0.
    pub options: Vec<MapOptionInput>,
}

impl CreateMapVoteRequest {
    pub fn validate(&self) -> AppResult<()> {
        if self.title.trim().is_empty() {
            return Err(AppError::bad_request("Title is required"));
        }
        validate_window(self.start_time, self.end_time)?;
        if self.options.len() < 2 {
            return Err(AppError::bad_request(
                "A map vote needs at least two options",
            ));
        }
        if self.options.iter().any(|o| o.map_name.trim().is_empty()) {
            return Err(AppError::bad_request("Map names cannot be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateMapVoteRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// None = no change, Some(None) = clear, Some(text) = set
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[ts(type = "string | null")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(type = "string | null")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(type = "string | null")]
    pub end_time: Option<DateTime<Utc>>,
}

impl UpdateMapVoteRequest {
    /// Validates the window that results from applying this update to `current`.
    pub fn validate_against(&self, current: &MapVote) -> AppResult<()> {
        if matches!(&self.title, Some(t) if t.trim().is_empty()) {
            return Err(AppError::bad_request("Title is required"));
        }
        validate_window(
            self.start_time.unwrap_or(current.start_time),
            self.end_time.unwrap_or(current.end_time),
        )
    }
}

fn validate_window(start: DateTime<Utc>, end: DateTime<Utc>) -> AppResult<()> {
    if end <= start {
        return Err(AppError::bad_request("end_time must be after start_time"));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CastVoteRequest {
    pub option_id: Uuid,
}

// --- Storefront ---

/// Product
///
/// A store item. Prices are integer cents in the site currency; `stock = None`
/// means unlimited.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    #[ts(type = "number")]
    pub price_cents: i64,
    pub category: String,
    pub image_key: Option<String>,
    pub stock: Option<i32>,
    pub is_active: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[ts(type = "number")]
    pub price_cents: i64,
    pub category: String,
    pub image_key: Option<String>,
    pub stock: Option<i32>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl CreateProductRequest {
    pub fn validate(&self) -> AppResult<()> {
        if self.name.trim().is_empty() || self.category.trim().is_empty() {
            return Err(AppError::bad_request("Name and category are required"));
        }
        validate_price_and_stock(Some(self.price_cents), self.stock)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateProductRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(type = "number | null")]
    pub price_cents: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[ts(type = "string | null")]
    pub image_key: Option<Option<String>>,
    /// None = no change, Some(None) = unlimited, Some(n) = set
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[ts(type = "number | null")]
    pub stock: Option<Option<i32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl UpdateProductRequest {
    pub fn validate(&self) -> AppResult<()> {
        validate_price_and_stock(self.price_cents, self.stock.flatten())
    }
}

fn validate_price_and_stock(price_cents: Option<i64>, stock: Option<i32>) -> AppResult<()> {
    if matches!(price_cents, Some(p) if p < 0) {
        return Err(AppError::bad_request("Price cannot be negative"));
    }
    if matches!(stock, Some(s) if s < 0) {
        return Err(AppError::bad_request("Stock cannot be negative"));
    }
    Ok(())
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default,
)]
#[sqlx(type_name = "order_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum OrderStatus {
    #[default]
    Pending,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// Only pending orders can be settled, either way.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Completed)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
        )
    }
}

/// Order
///
/// A checkout recorded against a user. Line items are loaded separately and
/// attached before the order leaves the repository.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: OrderStatus,
    #[ts(type = "number")]
    pub total_cents: i64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub items: Vec<OrderItem>,
}

/// A priced order line. Name and price are captured at checkout time.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct OrderItem {
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    #[ts(type = "number")]
    pub unit_price_cents: i64,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct OrderLineRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderLineRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

// --- Site Content ---

/// SEO metadata for one page route of the marketing site.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct PageMetadata {
    /// Route path, e.g. `/about`.
    pub path: String,
    pub title: String,
    pub description: Option<String>,
    pub keywords: Option<String>,
    pub og_image: Option<String>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpsertPageMetadataRequest {
    pub path: String,
    pub title: String,
    pub description: Option<String>,
    pub keywords: Option<String>,
    pub og_image: Option<String>,
}

impl UpsertPageMetadataRequest {
    pub fn validate(&self) -> AppResult<()> {
        if !self.path.starts_with('/') {
            return Err(AppError::bad_request("Path must start with '/'"));
        }
        if self.title.trim().is_empty() {
            return Err(AppError::bad_request("Title is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct NavigationItem {
    pub id: Uuid,
    pub label: String,
    pub href: String,
    // Set for entries nested in a dropdown.
    pub parent_id: Option<Uuid>,
    pub position: i32,
    pub is_external: bool,
    pub is_visible: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateNavigationItemRequest {
    pub label: String,
    pub href: String,
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub position: i32,
    #[serde(default)]
    pub is_external: bool,
    #[serde(default = "default_true")]
    pub is_visible: bool,
}

impl CreateNavigationItemRequest {
    pub fn validate(&self) -> AppResult<()> {
        if self.label.trim().is_empty() || self.href.trim().is_empty() {
            return Err(AppError::bad_request("Label and href are required"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateNavigationItemRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    /// None = no change, Some(None) = move to top level, Some(id) = nest
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[ts(type = "string | null")]
    pub parent_id: Option<Option<Uuid>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_external: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_visible: Option<bool>,
}

/// Site-wide settings; there is exactly one row.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct SiteSettings {
    pub site_name: String,
    pub tagline: Option<String>,
    pub discord_url: Option<String>,
    /// ISO 4217 code used to display product prices.
    pub currency: String,
    pub maintenance_mode: bool,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateSiteSettingsRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_name: Option<String>,
    /// None = no change, Some(None) = clear, Some(text) = set
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[ts(type = "string | null")]
    pub tagline: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[ts(type = "string | null")]
    pub discord_url: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintenance_mode: Option<bool>,
}

impl UpdateSiteSettingsRequest {
    pub fn validate(&self) -> AppResult<()> {
        if let Some(currency) = &self.currency {
            if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
                return Err(AppError::bad_request(
                    "Currency must be a three-letter ISO code",
                ));
            }
        }
        if matches!(&self.site_name, Some(n) if n.trim().is_empty()) {
            return Err(AppError::bad_request("Site name cannot be empty"));
        }
        Ok(())
    }
}

// --- Dashboard & Uploads ---

/// Counters shown on the admin dashboard (GET /admin/stats).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct AdminDashboardStats {
    #[ts(type = "number")]
    pub total_users: i64,
    #[ts(type = "number")]
    pub open_tickets: i64,
    #[ts(type = "number")]
    pub active_servers: i64,
    #[ts(type = "number")]
    pub active_map_votes: i64,
    #[ts(type = "number")]
    pub active_products: i64,
    #[ts(type = "number")]
    pub pending_orders: i64,
}

/// Input for `POST /upload/presigned`.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlRequest {
    /// Original filename; only its extension is kept.
    #[schema(example = "de_dust2.png")]
    pub filename: String,
    /// MIME type the upload is constrained to.
    #[schema(example = "image/png")]
    pub file_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlResponse {
    /// Time-limited URL for the PUT request.
    pub upload_url: String,
    /// Object key to store on the server, map option or product.
    pub resource_key: String,
}
