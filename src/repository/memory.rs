use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{ADMIN_ROLE_ID, MEMBER_ROLE_ID, Repository};
use crate::{
    checkout,
    error::{AppError, AppResult},
    models::{
        AdminDashboardStats, CreateMapVoteRequest, CreateNavigationItemRequest,
        CreateProductRequest, CreateRoleRequest, CreateServerRequest, CreateTicketRequest,
        GameServer, MapVote, MapVoteOption, NavigationItem, NewUser, OptionTally, Order,
        OrderItem, OrderLineRequest, OrderStatus, PageMetadata, Permission, Product, Role,
        SiteSettings, Ticket, TicketMessage, TicketStatus, UpdateMapVoteRequest,
        UpdateNavigationItemRequest, UpdateProductRequest, UpdateRoleRequest,
        UpdateServerRequest, UpdateSiteSettingsRequest, UpsertPageMetadataRequest, User,
        UserProfile, UserVote,
    },
    permissions,
};

#[derive(Default)]
struct MemoryState {
    users: Vec<User>,
    roles: Vec<Role>,
    permissions: Vec<Permission>,
    user_roles: Vec<(Uuid, Uuid)>,
    tickets: Vec<Ticket>,
    ticket_messages: Vec<TicketMessage>,
    next_message_id: i64,
    servers: Vec<GameServer>,
    map_votes: Vec<MapVote>,
    map_vote_options: Vec<MapVoteOption>,
    user_votes: Vec<UserVote>,
    products: Vec<Product>,
    orders: Vec<Order>,
    pages: Vec<PageMetadata>,
    navigation: Vec<NavigationItem>,
    settings: SiteSettings,
}

impl MemoryState {
    fn profile(&self, user: &User) -> UserProfile {
        let held: Vec<&Role> = self
            .user_roles
            .iter()
            .filter(|(u, _)| *u == user.id)
            .filter_map(|(_, r)| self.roles.iter().find(|role| role.id == *r))
            .collect();
        let mut roles: Vec<String> = held.iter().map(|r| r.name.clone()).collect();
        roles.sort();
        UserProfile {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            avatar_url: user.avatar_url.clone(),
            created_at: user.created_at,
            roles,
            permissions: permissions::effective_permissions(held.iter().map(|r| &r.permissions)),
        }
    }

    fn username(&self, id: Uuid) -> String {
        self.users
            .iter()
            .find(|u| u.id == id)
            .map(|u| u.username.clone())
            .unwrap_or_default()
    }
}

/// Whether `candidate` sits on the parent chain starting at `start` (inclusive).
fn is_nav_ancestor(items: &[NavigationItem], candidate: Uuid, start: Uuid) -> bool {
    let mut seen = HashSet::new();
    let mut cursor = Some(start);
    while let Some(current) = cursor {
        if current == candidate {
            return true;
        }
        if !seen.insert(current) {
            return false;
        }
        cursor = items
            .iter()
            .find(|n| n.id == current)
            .and_then(|n| n.parent_id);
    }
    false
}

/// MemoryRepository
///
/// In-process `Repository` used by handler and router tests. Seeded with the same
/// permission catalogue, roles and settings row as the initial migration.
pub struct MemoryRepository {
    state: Mutex<MemoryState>,
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRepository {
    pub fn new() -> Self {
        let now = Utc::now();
        let catalogue = [
            (permissions::ADMIN_ACCESS, "Open the admin dashboard"),
            (permissions::USERS_VIEW, "List users and their roles"),
            (permissions::USERS_MANAGE, "Assign and remove roles"),
            (permissions::ROLES_MANAGE, "Create, edit and delete roles"),
            (permissions::TICKETS_VIEW, "View every support ticket"),
            (permissions::TICKETS_MANAGE, "Reply to, assign and close any ticket"),
            (permissions::SERVERS_MANAGE, "Manage game servers"),
            (permissions::MAPVOTES_MANAGE, "Manage map votes"),
            (permissions::STORE_MANAGE, "Manage products and orders"),
            (permissions::SITE_MANAGE, "Manage pages, navigation and settings"),
            (permissions::UPLOADS_CREATE, "Upload media to storage"),
        ];
        let state = MemoryState {
            permissions: catalogue
                .iter()
                .map(|(name, description)| Permission {
                    name: name.to_string(),
                    description: description.to_string(),
                })
                .collect(),
            roles: vec![
                Role {
                    id: ADMIN_ROLE_ID,
                    name: "admin".to_string(),
                    description: Some("Full access".to_string()),
                    color: Some("#e74c3c".to_string()),
                    is_default: false,
                    permissions: vec![permissions::WILDCARD.to_string()],
                    created_at: now,
                },
                Role {
                    id: MEMBER_ROLE_ID,
                    name: "member".to_string(),
                    description: Some("Default community member".to_string()),
                    color: None,
                    is_default: true,
                    permissions: vec![],
                    created_at: now,
                },
            ],
            settings: SiteSettings {
                site_name: "Clan Portal".to_string(),
                currency: "USD".to_string(),
                updated_at: now,
                ..SiteSettings::default()
            },
            next_message_id: 1,
            ..MemoryState::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Inserts a user holding the default roles plus the named extra roles.
    /// Unknown role names are ignored.
    pub fn seed_user(&self, username: &str, extra_roles: &[&str]) -> UserProfile {
        let mut state = self.state();
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: format!("{username}@example.com"),
            avatar_url: None,
            created_at: Utc::now(),
        };
        let role_ids: Vec<Uuid> = state
            .roles
            .iter()
            .filter(|r| r.is_default || extra_roles.contains(&r.name.as_str()))
            .map(|r| r.id)
            .collect();
        for role_id in role_ids {
            state.user_roles.push((user.id, role_id));
        }
        state.users.push(user.clone());
        state.profile(&user)
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    // --- USERS & ROLES ---

    async fn get_user_profile(&self, id: Uuid) -> AppResult<Option<UserProfile>> {
        let state = self.state();
        Ok(state
            .users
            .iter()
            .find(|u| u.id == id)
            .map(|u| state.profile(u)))
    }

    async fn create_user(&self, user: NewUser) -> AppResult<UserProfile> {
        let mut state = self.state();
        if state
            .users
            .iter()
            .any(|u| u.id == user.id || u.username == user.username || u.email == user.email)
        {
            return Err(AppError::conflict("Resource already exists"));
        }
        let user = User {
            id: user.id,
            username: user.username,
            email: user.email,
            avatar_url: None,
            created_at: Utc::now(),
        };
        let defaults: Vec<Uuid> = state
            .roles
            .iter()
            .filter(|r| r.is_default)
            .map(|r| r.id)
            .collect();
        for role_id in defaults {
            state.user_roles.push((user.id, role_id));
        }
        state.users.push(user.clone());
        Ok(state.profile(&user))
    }

    async fn list_users(&self, search: Option<String>) -> AppResult<Vec<UserProfile>> {
        let state = self.state();
        let needle = search.map(|s| s.to_lowercase());
        let mut users: Vec<UserProfile> = state
            .users
            .iter()
            .filter(|u| match &needle {
                Some(n) => {
                    u.username.to_lowercase().contains(n) || u.email.to_lowercase().contains(n)
                }
                None => true,
            })
            .map(|u| state.profile(u))
            .collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn list_roles(&self) -> AppResult<Vec<Role>> {
        let mut roles = self.state().roles.clone();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn get_role(&self, id: Uuid) -> AppResult<Option<Role>> {
        Ok(self.state().roles.iter().find(|r| r.id == id).cloned())
    }

    async fn create_role(&self, req: CreateRoleRequest) -> AppResult<Role> {
        let mut state = self.state();
        let name = req.name.trim().to_string();
        if state.roles.iter().any(|r| r.name == name) {
            return Err(AppError::conflict("Resource already exists"));
        }
        let role = Role {
            id: Uuid::new_v4(),
            name,
            description: req.description,
            color: req.color,
            is_default: req.is_default,
            permissions: req.permissions,
            created_at: Utc::now(),
        };
        state.roles.push(role.clone());
        Ok(role)
    }

    async fn update_role(&self, id: Uuid, req: UpdateRoleRequest) -> AppResult<Option<Role>> {
        let mut state = self.state();
        if let Some(name) = &req.name {
            let name = name.trim();
            if state.roles.iter().any(|r| r.id != id && r.name == name) {
                return Err(AppError::conflict("Resource already exists"));
            }
        }
        let Some(role) = state.roles.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        if let Some(name) = req.name {
            role.name = name.trim().to_string();
        }
        if let Some(v) = req.description {
            role.description = v;
        }
        if let Some(v) = req.color {
            role.color = v;
        }
        if let Some(is_default) = req.is_default {
            role.is_default = is_default;
        }
        if let Some(perms) = req.permissions {
            role.permissions = perms;
        }
        Ok(Some(role.clone()))
    }

    async fn delete_role(&self, id: Uuid) -> AppResult<bool> {
        let mut state = self.state();
        let before = state.roles.len();
        state.roles.retain(|r| r.id != id);
        state.user_roles.retain(|(_, r)| *r != id);
        Ok(state.roles.len() < before)
    }

    async fn list_permissions(&self) -> AppResult<Vec<Permission>> {
        let mut perms = self.state().permissions.clone();
        perms.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(perms)
    }

    async fn assign_role(&self, user_id: Uuid, role_id: Uuid) -> AppResult<bool> {
        let mut state = self.state();
        if !state.users.iter().any(|u| u.id == user_id)
            || !state.roles.iter().any(|r| r.id == role_id)
        {
            return Err(AppError::bad_request("Invalid reference to related resource"));
        }
        if state.user_roles.contains(&(user_id, role_id)) {
            return Ok(false);
        }
        state.user_roles.push((user_id, role_id));
        Ok(true)
    }

    async fn remove_role(&self, user_id: Uuid, role_id: Uuid) -> AppResult<bool> {
        let mut state = self.state();
        let before = state.user_roles.len();
        state.user_roles.retain(|pair| *pair != (user_id, role_id));
        Ok(state.user_roles.len() < before)
    }

    // --- SUPPORT TICKETS ---

    async fn create_ticket(&self, user_id: Uuid, req: CreateTicketRequest) -> AppResult<Ticket> {
        let mut state = self.state();
        let now = Utc::now();
        let ticket = Ticket {
            id: Uuid::new_v4(),
            user_id,
            subject: req.subject.trim().to_string(),
            category: req.category.trim().to_string(),
            status: TicketStatus::Open,
            priority: req.priority,
            assigned_to: None,
            created_at: now,
            updated_at: now,
            closed_at: None,
        };
        let message = TicketMessage {
            id: state.next_message_id,
            ticket_id: ticket.id,
            author_id: user_id,
            author_name: state.username(user_id),
            body: req.message,
            is_staff: false,
            created_at: now,
        };
        state.next_message_id += 1;
        state.tickets.push(ticket.clone());
        state.ticket_messages.push(message);
        Ok(ticket)
    }

    async fn list_user_tickets(&self, user_id: Uuid) -> AppResult<Vec<Ticket>> {
        let mut tickets: Vec<Ticket> = self
            .state()
            .tickets
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        tickets.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(tickets)
    }

    async fn list_tickets(&self, status: Option<TicketStatus>) -> AppResult<Vec<Ticket>> {
        let mut tickets: Vec<Ticket> = self
            .state()
            .tickets
            .iter()
            .filter(|t| status.is_none_or(|s| t.status == s))
            .cloned()
            .collect();
        tickets.sort_by(|a, b| {
            (a.status == TicketStatus::Closed)
                .cmp(&(b.status == TicketStatus::Closed))
                .then(b.updated_at.cmp(&a.updated_at))
        });
        Ok(tickets)
    }

    async fn get_ticket(&self, id: Uuid) -> AppResult<Option<Ticket>> {
        Ok(self.state().tickets.iter().find(|t| t.id == id).cloned())
    }

    async fn get_ticket_messages(&self, ticket_id: Uuid) -> AppResult<Vec<TicketMessage>> {
        Ok(self
            .state()
            .ticket_messages
            .iter()
            .filter(|m| m.ticket_id == ticket_id)
            .cloned()
            .collect())
    }

    async fn add_ticket_message(
        &self,
        ticket_id: Uuid,
        author_id: Uuid,
        body: String,
        is_staff: bool,
    ) -> AppResult<TicketMessage> {
        let mut state = self.state();
        let now = Utc::now();
        let Some(ticket) = state.tickets.iter_mut().find(|t| t.id == ticket_id) else {
            return Err(AppError::bad_request("Invalid reference to related resource"));
        };
        if ticket.status != TicketStatus::Open {
            return Err(AppError::bad_request("Ticket is closed"));
        }
        ticket.updated_at = now;
        let message = TicketMessage {
            id: state.next_message_id,
            ticket_id,
            author_id,
            author_name: state.username(author_id),
            body,
            is_staff,
            created_at: now,
        };
        state.next_message_id += 1;
        state.ticket_messages.push(message.clone());
        Ok(message)
    }

    async fn close_ticket(&self, id: Uuid) -> AppResult<Option<Ticket>> {
        let mut state = self.state();
        let now = Utc::now();
        Ok(state
            .tickets
            .iter_mut()
            .find(|t| t.id == id && t.status == TicketStatus::Open)
            .map(|t| {
                t.status = TicketStatus::Closed;
                t.closed_at = Some(now);
                t.updated_at = now;
                t.clone()
            }))
    }

    async fn assign_ticket(&self, id: Uuid, assignee: Option<Uuid>) -> AppResult<Option<Ticket>> {
        let mut state = self.state();
        Ok(state.tickets.iter_mut().find(|t| t.id == id).map(|t| {
            t.assigned_to = assignee;
            t.updated_at = Utc::now();
            t.clone()
        }))
    }

    // --- GAME SERVERS ---

    async fn list_servers(&self, include_inactive: bool) -> AppResult<Vec<GameServer>> {
        let mut servers: Vec<GameServer> = self
            .state()
            .servers
            .iter()
            .filter(|s| include_inactive || s.is_active)
            .cloned()
            .collect();
        servers.sort_by(|a, b| {
            a.display_order
                .cmp(&b.display_order)
                .then(a.name.cmp(&b.name))
        });
        Ok(servers)
    }

    async fn get_server(&self, id: Uuid) -> AppResult<Option<GameServer>> {
        Ok(self.state().servers.iter().find(|s| s.id == id).cloned())
    }

    async fn create_server(&self, req: CreateServerRequest) -> AppResult<GameServer> {
        let now = Utc::now();
        let server = GameServer {
            id: Uuid::new_v4(),
            name: req.name,
            game: req.game,
            address: req.address,
            port: req.port,
            description: req.description,
            image_key: req.image_key,
            is_active: req.is_active,
            display_order: req.display_order,
            created_at: now,
            updated_at: now,
        };
        self.state().servers.push(server.clone());
        Ok(server)
    }

    async fn update_server(
        &self,
        id: Uuid,
        req: UpdateServerRequest,
    ) -> AppResult<Option<GameServer>> {
        let mut state = self.state();
        Ok(state.servers.iter_mut().find(|s| s.id == id).map(|s| {
            if let Some(v) = req.name {
                s.name = v;
            }
            if let Some(v) = req.game {
                s.game = v;
            }
            if let Some(v) = req.address {
                s.address = v;
            }
            if let Some(v) = req.port {
                s.port = v;
            }
            if let Some(v) = req.description {
                s.description = v;
            }
            if let Some(v) = req.image_key {
                s.image_key = v;
            }
            if let Some(v) = req.is_active {
                s.is_active = v;
            }
            if let Some(v) = req.display_order {
                s.display_order = v;
            }
            s.updated_at = Utc::now();
            s.clone()
        }))
    }

    async fn delete_server(&self, id: Uuid) -> AppResult<bool> {
        let mut state = self.state();
        let before = state.servers.len();
        state.servers.retain(|s| s.id != id);
        for vote in state.map_votes.iter_mut().filter(|v| v.server_id == Some(id)) {
            vote.server_id = None;
        }
        Ok(state.servers.len() < before)
    }

    // --- MAP VOTES ---

    async fn list_map_votes(&self) -> AppResult<Vec<MapVote>> {
        let mut votes = self.state().map_votes.clone();
        votes.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(votes)
    }

    async fn get_map_vote(&self, id: Uuid) -> AppResult<Option<MapVote>> {
        Ok(self.state().map_votes.iter().find(|v| v.id == id).cloned())
    }

    async fn get_option_tallies(&self, map_vote_ids: &[Uuid]) -> AppResult<Vec<OptionTally>> {
        let state = self.state();
        let mut tallies: Vec<OptionTally> = state
            .map_vote_options
            .iter()
            .filter(|o| map_vote_ids.contains(&o.map_vote_id))
            .map(|o| OptionTally {
                option_id: o.id,
                map_vote_id: o.map_vote_id,
                map_name: o.map_name.clone(),
                image_key: o.image_key.clone(),
                position: o.position,
                votes: state
                    .user_votes
                    .iter()
                    .filter(|v| v.option_id == o.id)
                    .count() as i64,
            })
            .collect();
        tallies.sort_by(|a, b| {
            a.map_vote_id
                .cmp(&b.map_vote_id)
                .then(a.position.cmp(&b.position))
        });
        Ok(tallies)
    }

    async fn get_user_choices(
        &self,
        user_id: Uuid,
        map_vote_ids: &[Uuid],
    ) -> AppResult<Vec<UserVote>> {
        Ok(self
            .state()
            .user_votes
            .iter()
            .filter(|v| v.user_id == user_id && map_vote_ids.contains(&v.map_vote_id))
            .cloned()
            .collect())
    }

    async fn create_map_vote(
        &self,
        req: CreateMapVoteRequest,
        created_by: Uuid,
    ) -> AppResult<MapVote> {
        let mut state = self.state();
        let vote = MapVote {
            id: Uuid::new_v4(),
            server_id: req.server_id,
            title: req.title.trim().to_string(),
            description: req.description,
            start_time: req.start_time,
            end_time: req.end_time,
            created_by,
            created_at: Utc::now(),
        };
        for (position, option) in req.options.into_iter().enumerate() {
            state.map_vote_options.push(MapVoteOption {
                id: Uuid::new_v4(),
                map_vote_id: vote.id,
                map_name: option.map_name.trim().to_string(),
                image_key: option.image_key,
                position: position as i32,
            });
        }
        state.map_votes.push(vote.clone());
        Ok(vote)
    }

    async fn update_map_vote(
        &self,
        id: Uuid,
        req: UpdateMapVoteRequest,
    ) -> AppResult<Option<MapVote>> {
        let mut state = self.state();
        Ok(state.map_votes.iter_mut().find(|v| v.id == id).map(|v| {
            if let Some(title) = req.title {
                v.title = title;
            }
            if let Some(description) = req.description {
                v.description = description;
            }
            if let Some(start) = req.start_time {
                v.start_time = start;
            }
            if let Some(end) = req.end_time {
                v.end_time = end;
            }
            v.clone()
        }))
    }

    async fn delete_map_vote(&self, id: Uuid) -> AppResult<bool> {
        let mut state = self.state();
        let before = state.map_votes.len();
        state.map_votes.retain(|v| v.id != id);
        state.map_vote_options.retain(|o| o.map_vote_id != id);
        state.user_votes.retain(|v| v.map_vote_id != id);
        Ok(state.map_votes.len() < before)
    }

    async fn cast_vote(
        &self,
        user_id: Uuid,
        map_vote_id: Uuid,
        option_id: Uuid,
    ) -> AppResult<bool> {
        let mut state = self.state();
        if state
            .user_votes
            .iter()
            .any(|v| v.user_id == user_id && v.map_vote_id == map_vote_id)
        {
            return Ok(false);
        }
        state.user_votes.push(UserVote {
            user_id,
            map_vote_id,
            option_id,
            created_at: Utc::now(),
        });
        Ok(true)
    }

    // --- STOREFRONT ---

    async fn list_products(
        &self,
        category: Option<String>,
        search: Option<String>,
        include_inactive: bool,
    ) -> AppResult<Vec<Product>> {
        let needle = search.map(|s| s.to_lowercase());
        let mut products: Vec<Product> = self
            .state()
            .products
            .iter()
            .filter(|p| include_inactive || p.is_active)
            .filter(|p| category.as_ref().is_none_or(|c| &p.category == c))
            .filter(|p| {
                needle.as_ref().is_none_or(|n| {
                    p.name.to_lowercase().contains(n) || p.description.to_lowercase().contains(n)
                })
            })
            .cloned()
            .collect();
        products.sort_by(|a, b| a.category.cmp(&b.category).then(a.name.cmp(&b.name)));
        Ok(products)
    }

    async fn get_product(&self, id: Uuid) -> AppResult<Option<Product>> {
        Ok(self.state().products.iter().find(|p| p.id == id).cloned())
    }

    async fn create_product(&self, req: CreateProductRequest) -> AppResult<Product> {
        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4(),
            name: req.name,
            description: req.description,
            price_cents: req.price_cents,
            category: req.category,
            image_key: req.image_key,
            stock: req.stock,
            is_active: req.is_active,
            created_at: now,
            updated_at: now,
        };
        self.state().products.push(product.clone());
        Ok(product)
    }

    async fn update_product(
        &self,
        id: Uuid,
        req: UpdateProductRequest,
    ) -> AppResult<Option<Product>> {
        let mut state = self.state();
        Ok(state.products.iter_mut().find(|p| p.id == id).map(|p| {
            if let Some(v) = req.name {
                p.name = v;
            }
            if let Some(v) = req.description {
                p.description = v;
            }
            if let Some(v) = req.price_cents {
                p.price_cents = v;
            }
            if let Some(v) = req.category {
                p.category = v;
            }
            if let Some(v) = req.image_key {
                p.image_key = v;
            }
            if let Some(v) = req.stock {
                p.stock = v;
            }
            if let Some(v) = req.is_active {
                p.is_active = v;
            }
            p.updated_at = Utc::now();
            p.clone()
        }))
    }

    async fn delete_product(&self, id: Uuid) -> AppResult<bool> {
        let mut state = self.state();
        let referenced = state
            .orders
            .iter()
            .any(|o| o.items.iter().any(|i| i.product_id == id));
        if referenced {
            return Err(AppError::bad_request("Invalid reference to related resource"));
        }
        let before = state.products.len();
        state.products.retain(|p| p.id != id);
        Ok(state.products.len() < before)
    }

    async fn create_order(&self, user_id: Uuid, lines: Vec<OrderLineRequest>) -> AppResult<Order> {
        let mut state = self.state();
        let priced = checkout::price_order(&lines, &state.products)?;
        let now = Utc::now();
        let order_id = Uuid::new_v4();

        for line in &priced.lines {
            if let Some(product) = state.products.iter_mut().find(|p| p.id == line.product_id) {
                if let Some(stock) = product.stock.as_mut() {
                    *stock -= line.quantity;
                }
                product.updated_at = now;
            }
        }

        let order = Order {
            id: order_id,
            user_id,
            status: OrderStatus::Pending,
            total_cents: priced.total_cents,
            created_at: now,
            updated_at: now,
            items: priced
                .lines
                .into_iter()
                .map(|l| OrderItem {
                    order_id,
                    product_id: l.product_id,
                    product_name: l.product_name,
                    unit_price_cents: l.unit_price_cents,
                    quantity: l.quantity,
                })
                .collect(),
        };
        state.orders.push(order.clone());
        Ok(order)
    }

    async fn list_user_orders(&self, user_id: Uuid) -> AppResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .state()
            .orders
            .iter()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn list_orders(&self, status: Option<OrderStatus>) -> AppResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .state()
            .orders
            .iter()
            .filter(|o| status.is_none_or(|s| o.status == s))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn get_order(&self, id: Uuid) -> AppResult<Option<Order>> {
        Ok(self.state().orders.iter().find(|o| o.id == id).cloned())
    }

    async fn set_order_status(&self, id: Uuid, status: OrderStatus) -> AppResult<Option<Order>> {
        let mut state = self.state();
        let Some(index) = state.orders.iter().position(|o| o.id == id) else {
            return Ok(None);
        };
        let current = state.orders[index].status;
        if !current.can_transition_to(status) {
            return Err(AppError::bad_request(format!(
                "Cannot move an order from {current:?} to {status:?}"
            )));
        }
        if status == OrderStatus::Cancelled {
            let items = state.orders[index].items.clone();
            for item in items {
                if let Some(product) = state.products.iter_mut().find(|p| p.id == item.product_id) {
                    if let Some(stock) = product.stock.as_mut() {
                        *stock += item.quantity;
                    }
                }
            }
        }
        let order = &mut state.orders[index];
        order.status = status;
        order.updated_at = Utc::now();
        Ok(Some(order.clone()))
    }

    // --- SITE CONTENT ---

    async fn get_page_metadata(&self, path: &str) -> AppResult<Option<PageMetadata>> {
        Ok(self.state().pages.iter().find(|p| p.path == path).cloned())
    }

    async fn list_page_metadata(&self) -> AppResult<Vec<PageMetadata>> {
        let mut pages = self.state().pages.clone();
        pages.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(pages)
    }

    async fn upsert_page_metadata(
        &self,
        req: UpsertPageMetadataRequest,
    ) -> AppResult<PageMetadata> {
        let mut state = self.state();
        let page = PageMetadata {
            path: req.path,
            title: req.title,
            description: req.description,
            keywords: req.keywords,
            og_image: req.og_image,
            updated_at: Utc::now(),
        };
        match state.pages.iter_mut().find(|p| p.path == page.path) {
            Some(existing) => *existing = page.clone(),
            None => state.pages.push(page.clone()),
        }
        Ok(page)
    }

    async fn delete_page_metadata(&self, path: &str) -> AppResult<bool> {
        let mut state = self.state();
        let before = state.pages.len();
        state.pages.retain(|p| p.path != path);
        Ok(state.pages.len() < before)
    }

    async fn list_navigation(&self, include_hidden: bool) -> AppResult<Vec<NavigationItem>> {
        let mut items: Vec<NavigationItem> = self
            .state()
            .navigation
            .iter()
            .filter(|n| include_hidden || n.is_visible)
            .cloned()
            .collect();
        items.sort_by(|a, b| {
            a.parent_id
                .is_some()
                .cmp(&b.parent_id.is_some())
                .then(a.position.cmp(&b.position))
                .then(a.label.cmp(&b.label))
        });
        Ok(items)
    }

    async fn create_navigation_item(
        &self,
        req: CreateNavigationItemRequest,
    ) -> AppResult<NavigationItem> {
        let mut state = self.state();
        if let Some(parent) = req.parent_id {
            if !state.navigation.iter().any(|n| n.id == parent) {
                return Err(AppError::bad_request("Invalid reference to related resource"));
            }
        }
        let item = NavigationItem {
            id: Uuid::new_v4(),
            label: req.label,
            href: req.href,
            parent_id: req.parent_id,
            position: req.position,
            is_external: req.is_external,
            is_visible: req.is_visible,
        };
        state.navigation.push(item.clone());
        Ok(item)
    }

    async fn update_navigation_item(
        &self,
        id: Uuid,
        req: UpdateNavigationItemRequest,
    ) -> AppResult<Option<NavigationItem>> {
        let mut state = self.state();
        if let Some(Some(parent)) = req.parent_id {
            if !state.navigation.iter().any(|n| n.id == parent) {
                return Err(AppError::bad_request("Invalid reference to related resource"));
            }
            if is_nav_ancestor(&state.navigation, id, parent) {
                return Err(AppError::bad_request("Navigation items cannot form a cycle"));
            }
        }
        Ok(state.navigation.iter_mut().find(|n| n.id == id).map(|n| {
            if let Some(v) = req.label {
                n.label = v;
            }
            if let Some(v) = req.href {
                n.href = v;
            }
            if let Some(v) = req.parent_id {
                n.parent_id = v;
            }
            if let Some(v) = req.position {
                n.position = v;
            }
            if let Some(v) = req.is_external {
                n.is_external = v;
            }
            if let Some(v) = req.is_visible {
                n.is_visible = v;
            }
            n.clone()
        }))
    }

    /// Removes the item and every descendant, like the `ON DELETE CASCADE` chain.
    async fn delete_navigation_item(&self, id: Uuid) -> AppResult<bool> {
        let mut state = self.state();
        if !state.navigation.iter().any(|n| n.id == id) {
            return Ok(false);
        }
        let mut doomed = HashSet::from([id]);
        loop {
            let found: Vec<Uuid> = state
                .navigation
                .iter()
                .filter(|n| !doomed.contains(&n.id))
                .filter(|n| n.parent_id.is_some_and(|p| doomed.contains(&p)))
                .map(|n| n.id)
                .collect();
            if found.is_empty() {
                break;
            }
            doomed.extend(found);
        }
        state.navigation.retain(|n| !doomed.contains(&n.id));
        Ok(true)
    }

    async fn get_site_settings(&self) -> AppResult<SiteSettings> {
        Ok(self.state().settings.clone())
    }

    async fn update_site_settings(
        &self,
        req: UpdateSiteSettingsRequest,
    ) -> AppResult<SiteSettings> {
        let mut state = self.state();
        let s = &mut state.settings;
        if let Some(v) = req.site_name {
            s.site_name = v;
        }
        if let Some(v) = req.tagline {
            s.tagline = v;
        }
        if let Some(v) = req.discord_url {
            s.discord_url = v;
        }
        if let Some(v) = req.currency {
            s.currency = v;
        }
        if let Some(v) = req.maintenance_mode {
            s.maintenance_mode = v;
        }
        s.updated_at = Utc::now();
        Ok(s.clone())
    }

    // --- DASHBOARD ---

    async fn get_stats(&self) -> AppResult<AdminDashboardStats> {
        let state = self.state();
        let now = Utc::now();
        Ok(AdminDashboardStats {
            total_users: state.users.len() as i64,
            open_tickets: state
                .tickets
                .iter()
                .filter(|t| t.status == TicketStatus::Open)
                .count() as i64,
            active_servers: state.servers.iter().filter(|s| s.is_active).count() as i64,
            active_map_votes: state
                .map_votes
                .iter()
                .filter(|v| v.is_active_at(now))
                .count() as i64,
            active_products: state.products.iter().filter(|p| p.is_active).count() as i64,
            pending_orders: state
                .orders
                .iter()
                .filter(|o| o.status == OrderStatus::Pending)
                .count() as i64,
        })
    }
}
