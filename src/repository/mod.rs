use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        AdminDashboardStats, CreateMapVoteRequest, CreateNavigationItemRequest,
        CreateProductRequest, CreateRoleRequest, CreateServerRequest, CreateTicketRequest,
        GameServer, MapVote, NavigationItem, NewUser, OptionTally, Order, OrderLineRequest,
        OrderStatus, PageMetadata, Permission, Product, Role, SiteSettings, Ticket,
        TicketMessage, TicketStatus, UpdateMapVoteRequest, UpdateNavigationItemRequest,
        UpdateProductRequest, UpdateRoleRequest, UpdateServerRequest, UpdateSiteSettingsRequest,
        UpsertPageMetadataRequest, UserProfile, UserVote,
    },
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PostgresRepository;

/// Seeded by the initial migration (and by `MemoryRepository::new`).
pub const ADMIN_ROLE_ID: Uuid = Uuid::from_u128(0x00000000_0000_4000_8000_000000000001);
pub const MEMBER_ROLE_ID: Uuid = Uuid::from_u128(0x00000000_0000_4000_8000_000000000002);

/// Repository Trait
///
/// The persistence contract every handler works against. Authorization is the
/// handler's job; methods here only enforce data invariants (uniqueness, one
/// ballot per user, stock, status transitions).
///
/// Lookups return `Ok(None)` for a missing row; deletes and idempotent inserts
/// return whether a row was affected.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users & Roles ---
    async fn get_user_profile(&self, id: Uuid) -> AppResult<Option<UserProfile>>;
    /// Creates the local user record and grants every default role.
    async fn create_user(&self, user: NewUser) -> AppResult<UserProfile>;
    async fn list_users(&self, search: Option<String>) -> AppResult<Vec<UserProfile>>;
    async fn list_roles(&self) -> AppResult<Vec<Role>>;
    async fn get_role(&self, id: Uuid) -> AppResult<Option<Role>>;
    async fn create_role(&self, req: CreateRoleRequest) -> AppResult<Role>;
    async fn update_role(&self, id: Uuid, req: UpdateRoleRequest) -> AppResult<Option<Role>>;
    async fn delete_role(&self, id: Uuid) -> AppResult<bool>;
    async fn list_permissions(&self) -> AppResult<Vec<Permission>>;
    /// Idempotent: true if the grant is new, false if the user already held the role.
    async fn assign_role(&self, user_id: Uuid, role_id: Uuid) -> AppResult<bool>;
    async fn remove_role(&self, user_id: Uuid, role_id: Uuid) -> AppResult<bool>;

    // --- Support Tickets ---
    /// Opens a ticket and posts its first message atomically.
    async fn create_ticket(&self, user_id: Uuid, req: CreateTicketRequest) -> AppResult<Ticket>;
    async fn list_user_tickets(&self, user_id: Uuid) -> AppResult<Vec<Ticket>>;
    async fn list_tickets(&self, status: Option<TicketStatus>) -> AppResult<Vec<Ticket>>;
    async fn get_ticket(&self, id: Uuid) -> AppResult<Option<Ticket>>;
    async fn get_ticket_messages(&self, ticket_id: Uuid) -> AppResult<Vec<TicketMessage>>;
    async fn add_ticket_message(
        &self,
        ticket_id: Uuid,
        author_id: Uuid,
        body: String,
        is_staff: bool,
    ) -> AppResult<TicketMessage>;
    /// Closes an open ticket. `None` when the ticket is missing or already closed.
    async fn close_ticket(&self, id: Uuid) -> AppResult<Option<Ticket>>;
    async fn assign_ticket(&self, id: Uuid, assignee: Option<Uuid>) -> AppResult<Option<Ticket>>;

    // --- Game Servers ---
    async fn list_servers(&self, include_inactive: bool) -> AppResult<Vec<GameServer>>;
    async fn get_server(&self, id: Uuid) -> AppResult<Option<GameServer>>;
    async fn create_server(&self, req: CreateServerRequest) -> AppResult<GameServer>;
    async fn update_server(
        &self,
        id: Uuid,
        req: UpdateServerRequest,
    ) -> AppResult<Option<GameServer>>;
    async fn delete_server(&self, id: Uuid) -> AppResult<bool>;

    // --- Map Votes ---
    async fn list_map_votes(&self) -> AppResult<Vec<MapVote>>;
    async fn get_map_vote(&self, id: Uuid) -> AppResult<Option<MapVote>>;
    /// Every option of the given votes with its ballot count.
    async fn get_option_tallies(&self, map_vote_ids: &[Uuid]) -> AppResult<Vec<OptionTally>>;
    async fn get_user_choices(
        &self,
        user_id: Uuid,
        map_vote_ids: &[Uuid],
    ) -> AppResult<Vec<UserVote>>;
    async fn create_map_vote(
        &self,
        req: CreateMapVoteRequest,
        created_by: Uuid,
    ) -> AppResult<MapVote>;
    async fn update_map_vote(
        &self,
        id: Uuid,
        req: UpdateMapVoteRequest,
    ) -> AppResult<Option<MapVote>>;
    async fn delete_map_vote(&self, id: Uuid) -> AppResult<bool>;
    /// Records a ballot. False if the user already voted in this map vote.
    async fn cast_vote(&self, user_id: Uuid, map_vote_id: Uuid, option_id: Uuid)
    -> AppResult<bool>;

    // --- Storefront ---
    async fn list_products(
        &self,
        category: Option<String>,
        search: Option<String>,
        include_inactive: bool,
    ) -> AppResult<Vec<Product>>;
    async fn get_product(&self, id: Uuid) -> AppResult<Option<Product>>;
    async fn create_product(&self, req: CreateProductRequest) -> AppResult<Product>;
    async fn update_product(
        &self,
        id: Uuid,
        req: UpdateProductRequest,
    ) -> AppResult<Option<Product>>;
    async fn delete_product(&self, id: Uuid) -> AppResult<bool>;
    /// Prices the lines, reserves limited stock and records a pending order atomically.
    async fn create_order(&self, user_id: Uuid, lines: Vec<OrderLineRequest>) -> AppResult<Order>;
    async fn list_user_orders(&self, user_id: Uuid) -> AppResult<Vec<Order>>;
    async fn list_orders(&self, status: Option<OrderStatus>) -> AppResult<Vec<Order>>;
    async fn get_order(&self, id: Uuid) -> AppResult<Option<Order>>;
    /// Applies a status transition; cancelling returns reserved stock.
    /// Invalid transitions are rejected with `BadRequest`.
    async fn set_order_status(&self, id: Uuid, status: OrderStatus) -> AppResult<Option<Order>>;

    // --- Site Content ---
    async fn get_page_metadata(&self, path: &str) -> AppResult<Option<PageMetadata>>;
    async fn list_page_metadata(&self) -> AppResult<Vec<PageMetadata>>;
    async fn upsert_page_metadata(&self, req: UpsertPageMetadataRequest)
    -> AppResult<PageMetadata>;
    async fn delete_page_metadata(&self, path: &str) -> AppResult<bool>;
    async fn list_navigation(&self, include_hidden: bool) -> AppResult<Vec<NavigationItem>>;
    async fn create_navigation_item(
        &self,
        req: CreateNavigationItemRequest,
    ) -> AppResult<NavigationItem>;
    async fn update_navigation_item(
        &self,
        id: Uuid,
        req: UpdateNavigationItemRequest,
    ) -> AppResult<Option<NavigationItem>>;
    async fn delete_navigation_item(&self, id: Uuid) -> AppResult<bool>;
    async fn get_site_settings(&self) -> AppResult<SiteSettings>;
    async fn update_site_settings(&self, req: UpdateSiteSettingsRequest)
    -> AppResult<SiteSettings>;

    // --- Dashboard ---
    async fn get_stats(&self) -> AppResult<AdminDashboardStats>;
}

/// RepositoryState
///
/// Shared, type-erased handle to the persistence layer held in `AppState`.
pub type RepositoryState = Arc<dyn Repository>;
