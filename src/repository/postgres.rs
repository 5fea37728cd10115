use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use super::Repository;
use crate::{
    checkout,
    error::{AppError, AppResult},
    models::{
        AdminDashboardStats, CreateMapVoteRequest, CreateNavigationItemRequest,
        CreateProductRequest, CreateRoleRequest, CreateServerRequest, CreateTicketRequest,
        GameServer, MapVote, NavigationItem, NewUser, OptionTally, Order, OrderItem,
        OrderLineRequest, OrderStatus, PageMetadata, Permission, Product, Role, SiteSettings,
        Ticket, TicketMessage, TicketStatus, UpdateMapVoteRequest, UpdateNavigationItemRequest,
        UpdateProductRequest, UpdateRoleRequest, UpdateServerRequest, UpdateSiteSettingsRequest,
        UpsertPageMetadataRequest, UserProfile, UserVote,
    },
};

/// Selects a `UserProfile`: the user row, the names of their roles and the
/// deduplicated union of those roles' permission arrays. Callers append an
/// optional WHERE clause followed by `USER_PROFILE_GROUP`.
const USER_PROFILE_SELECT: &str = r#"
    SELECT
        u.id, u.username, u.email, u.avatar_url, u.created_at,
        COALESCE(array_agg(r.name ORDER BY r.name) FILTER (WHERE r.id IS NOT NULL), '{}') AS roles,
        COALESCE((
            SELECT array_agg(DISTINCT p)
            FROM user_roles ur2
            JOIN roles r2 ON r2.id = ur2.role_id
            CROSS JOIN LATERAL unnest(r2.permissions) AS p
            WHERE ur2.user_id = u.id
        ), '{}') AS permissions
    FROM users u
    LEFT JOIN user_roles ur ON ur.user_id = u.id
    LEFT JOIN roles r ON r.id = ur.role_id
"#;

const USER_PROFILE_GROUP: &str = " GROUP BY u.id";

const TICKET_MESSAGE_SELECT: &str = r#"
    SELECT m.id, m.ticket_id, m.author_id, u.username AS author_name, m.body, m.is_staff, m.created_at
    FROM ticket_messages m
    JOIN users u ON u.id = m.author_id
"#;

/// Wraps user input for a substring `ILIKE`, escaping the wildcard characters
/// so `%` and `_` match literally. Backslash is the default `LIKE` escape.
fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// PostgresRepository
///
/// `Repository` backed by a `PgPool`. Multi-statement writes run in a transaction.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Loads line items for `orders` in one round trip and attaches them.
    async fn attach_items(&self, mut orders: Vec<Order>) -> AppResult<Vec<Order>> {
        if orders.is_empty() {
            return Ok(orders);
        }
        let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let items = sqlx::query_as::<_, OrderItem>(
            "SELECT * FROM order_items WHERE order_id = ANY($1) ORDER BY product_name",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        for order in &mut orders {
            order.items = items
                .iter()
                .filter(|i| i.order_id == order.id)
                .cloned()
                .collect();
        }
        Ok(orders)
    }

    async fn grant_default_roles(tx: &mut Transaction<'_, Postgres>, user_id: Uuid) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO user_roles (user_id, role_id) SELECT $1, id FROM roles WHERE is_default ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- USERS & ROLES ---

    async fn get_user_profile(&self, id: Uuid) -> AppResult<Option<UserProfile>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(USER_PROFILE_SELECT);
        builder.push(" WHERE u.id = ");
        builder.push_bind(id);
        builder.push(USER_PROFILE_GROUP);
        Ok(builder
            .build_query_as::<UserProfile>()
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_user(&self, user: NewUser) -> AppResult<UserProfile> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO users (id, username, email) VALUES ($1, $2, $3)")
            .bind(user.id)
            .bind(&user.username)
            .bind(&user.email)
            .execute(&mut *tx)
            .await?;
        Self::grant_default_roles(&mut tx, user.id).await?;
        tx.commit().await?;

        self.get_user_profile(user.id)
            .await?
            .ok_or(AppError::not_found("User"))
    }

    /// Case-insensitive search across username and email.
    async fn list_users(&self, search: Option<String>) -> AppResult<Vec<UserProfile>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(USER_PROFILE_SELECT);
        if let Some(s) = search {
            let pattern = contains_pattern(&s);
            builder.push(" WHERE (u.username ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR u.email ILIKE ");
            builder.push_bind(pattern);
            builder.push(")");
        }
        builder.push(USER_PROFILE_GROUP);
        builder.push(" ORDER BY u.username");
        Ok(builder
            .build_query_as::<UserProfile>()
            .fetch_all(&self.pool)
            .await?)
    }

    async fn list_roles(&self) -> AppResult<Vec<Role>> {
        Ok(sqlx::query_as::<_, Role>("SELECT * FROM roles ORDER BY name")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_role(&self, id: Uuid) -> AppResult<Option<Role>> {
        Ok(sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_role(&self, req: CreateRoleRequest) -> AppResult<Role> {
        Ok(sqlx::query_as::<_, Role>(
            r#"
            INSERT INTO roles (id, name, description, color, is_default, permissions, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(req.name.trim())
        .bind(req.description)
        .bind(req.color)
        .bind(req.is_default)
        .bind(req.permissions)
        .fetch_one(&self.pool)
        .await?)
    }

    /// Partial update: `COALESCE` for required columns, `CASE WHEN` for the
    /// clearable ones so an explicit `null` can reset them.
    async fn update_role(&self, id: Uuid, req: UpdateRoleRequest) -> AppResult<Option<Role>> {
        Ok(sqlx::query_as::<_, Role>(
            r#"
            UPDATE roles
            SET name = COALESCE($2, name),
                description = CASE WHEN $3 THEN $4 ELSE description END,
                color = CASE WHEN $5 THEN $6 ELSE color END,
                is_default = COALESCE($7, is_default),
                permissions = COALESCE($8, permissions)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(req.name.as_deref().map(str::trim))
        .bind(req.description.is_some())
        .bind(req.description.flatten())
        .bind(req.color.is_some())
        .bind(req.color.flatten())
        .bind(req.is_default)
        .bind(req.permissions)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_role(&self, id: Uuid) -> AppResult<bool> {
        let res = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn list_permissions(&self) -> AppResult<Vec<Permission>> {
        Ok(
            sqlx::query_as::<_, Permission>("SELECT * FROM permissions ORDER BY name")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    /// `ON CONFLICT DO NOTHING` keeps the grant idempotent.
    async fn assign_role(&self, user_id: Uuid, role_id: Uuid) -> AppResult<bool> {
        let res = sqlx::query(
            "INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(role_id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn remove_role(&self, user_id: Uuid, role_id: Uuid) -> AppResult<bool> {
        let res = sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role_id = $2")
            .bind(user_id)
            .bind(role_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    // --- SUPPORT TICKETS ---

    async fn create_ticket(&self, user_id: Uuid, req: CreateTicketRequest) -> AppResult<Ticket> {
        let mut tx = self.pool.begin().await?;
        let ticket = sqlx::query_as::<_, Ticket>(
            r#"
            INSERT INTO tickets (id, user_id, subject, category, status, priority, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 'open', $5, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(req.subject.trim())
        .bind(req.category.trim())
        .bind(req.priority)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO ticket_messages (ticket_id, author_id, body, is_staff) VALUES ($1, $2, $3, false)",
        )
        .bind(ticket.id)
        .bind(user_id)
        .bind(req.message)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(ticket)
    }

    async fn list_user_tickets(&self, user_id: Uuid) -> AppResult<Vec<Ticket>> {
        Ok(sqlx::query_as::<_, Ticket>(
            "SELECT * FROM tickets WHERE user_id = $1 ORDER BY updated_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Open tickets sort first, then most recently active.
    async fn list_tickets(&self, status: Option<TicketStatus>) -> AppResult<Vec<Ticket>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM tickets");
        if let Some(s) = status {
            builder.push(" WHERE status = ");
            builder.push_bind(s);
        }
        builder.push(" ORDER BY status ASC, updated_at DESC");
        Ok(builder
            .build_query_as::<Ticket>()
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_ticket(&self, id: Uuid) -> AppResult<Option<Ticket>> {
        Ok(sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn get_ticket_messages(&self, ticket_id: Uuid) -> AppResult<Vec<TicketMessage>> {
        let sql = format!("{TICKET_MESSAGE_SELECT} WHERE m.ticket_id = $1 ORDER BY m.created_at, m.id");
        Ok(sqlx::query_as::<_, TicketMessage>(&sql)
            .bind(ticket_id)
            .fetch_all(&self.pool)
            .await?)
    }

    /// Locks the ticket row so a concurrent close cannot slip in, inserts the
    /// message joined with the author's username, then bumps `updated_at`.
    async fn add_ticket_message(
        &self,
        ticket_id: Uuid,
        author_id: Uuid,
        body: String,
        is_staff: bool,
    ) -> AppResult<TicketMessage> {
        let mut tx = self.pool.begin().await?;
        let status = sqlx::query_scalar::<_, TicketStatus>(
            "SELECT status FROM tickets WHERE id = $1 FOR UPDATE",
        )
        .bind(ticket_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::bad_request("Invalid reference to related resource"))?;
        if status != TicketStatus::Open {
            return Err(AppError::bad_request("Ticket is closed"));
        }

        let message = sqlx::query_as::<_, TicketMessage>(
            r#"
            WITH inserted AS (
                INSERT INTO ticket_messages (ticket_id, author_id, body, is_staff)
                VALUES ($1, $2, $3, $4)
                RETURNING id, ticket_id, author_id, body, is_staff, created_at
            )
            SELECT i.id, i.ticket_id, i.author_id, u.username AS author_name, i.body, i.is_staff, i.created_at
            FROM inserted i JOIN users u ON u.id = i.author_id
            "#,
        )
        .bind(ticket_id)
        .bind(author_id)
        .bind(body)
        .bind(is_staff)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE tickets SET updated_at = NOW() WHERE id = $1")
            .bind(ticket_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(message)
    }

    async fn close_ticket(&self, id: Uuid) -> AppResult<Option<Ticket>> {
        Ok(sqlx::query_as::<_, Ticket>(
            r#"
            UPDATE tickets
            SET status = 'closed', closed_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'open'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn assign_ticket(&self, id: Uuid, assignee: Option<Uuid>) -> AppResult<Option<Ticket>> {
        Ok(sqlx::query_as::<_, Ticket>(
            "UPDATE tickets SET assigned_to = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(assignee)
        .fetch_optional(&self.pool)
        .await?)
    }

    // --- GAME SERVERS ---

    async fn list_servers(&self, include_inactive: bool) -> AppResult<Vec<GameServer>> {
        Ok(sqlx::query_as::<_, GameServer>(
            "SELECT * FROM servers WHERE ($1 OR is_active) ORDER BY display_order, name",
        )
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_server(&self, id: Uuid) -> AppResult<Option<GameServer>> {
        Ok(sqlx::query_as::<_, GameServer>("SELECT * FROM servers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_server(&self, req: CreateServerRequest) -> AppResult<GameServer> {
        Ok(sqlx::query_as::<_, GameServer>(
            r#"
            INSERT INTO servers (id, name, game, address, port, description, image_key, is_active, display_order, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(req.name)
        .bind(req.game)
        .bind(req.address)
        .bind(req.port)
        .bind(req.description)
        .bind(req.image_key)
        .bind(req.is_active)
        .bind(req.display_order)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn update_server(
        &self,
        id: Uuid,
        req: UpdateServerRequest,
    ) -> AppResult<Option<GameServer>> {
        Ok(sqlx::query_as::<_, GameServer>(
            r#"
            UPDATE servers
            SET name = COALESCE($2, name),
                game = COALESCE($3, game),
                address = COALESCE($4, address),
                port = COALESCE($5, port),
                description = CASE WHEN $6 THEN $7 ELSE description END,
                image_key = CASE WHEN $8 THEN $9 ELSE image_key END,
                is_active = COALESCE($10, is_active),
                display_order = COALESCE($11, display_order),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(req.name)
        .bind(req.game)
        .bind(req.address)
        .bind(req.port)
        .bind(req.description.is_some())
        .bind(req.description.flatten())
        .bind(req.image_key.is_some())
        .bind(req.image_key.flatten())
        .bind(req.is_active)
        .bind(req.display_order)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_server(&self, id: Uuid) -> AppResult<bool> {
        let res = sqlx::query("DELETE FROM servers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    // --- MAP VOTES ---

    async fn list_map_votes(&self) -> AppResult<Vec<MapVote>> {
        Ok(
            sqlx::query_as::<_, MapVote>("SELECT * FROM map_votes ORDER BY start_time DESC")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn get_map_vote(&self, id: Uuid) -> AppResult<Option<MapVote>> {
        Ok(sqlx::query_as::<_, MapVote>("SELECT * FROM map_votes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// `LEFT JOIN` so options without ballots still report zero.
    async fn get_option_tallies(&self, map_vote_ids: &[Uuid]) -> AppResult<Vec<OptionTally>> {
        Ok(sqlx::query_as::<_, OptionTally>(
            r#"
            SELECT o.id AS option_id, o.map_vote_id, o.map_name, o.image_key, o.position,
                   COUNT(v.user_id) AS votes
            FROM map_vote_options o
            LEFT JOIN user_votes v ON v.option_id = o.id
            WHERE o.map_vote_id = ANY($1)
            GROUP BY o.id
            ORDER BY o.map_vote_id, o.position
            "#,
        )
        .bind(map_vote_ids)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_user_choices(
        &self,
        user_id: Uuid,
        map_vote_ids: &[Uuid],
    ) -> AppResult<Vec<UserVote>> {
        Ok(sqlx::query_as::<_, UserVote>(
            "SELECT * FROM user_votes WHERE user_id = $1 AND map_vote_id = ANY($2)",
        )
        .bind(user_id)
        .bind(map_vote_ids)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn create_map_vote(
        &self,
        req: CreateMapVoteRequest,
        created_by: Uuid,
    ) -> AppResult<MapVote> {
        let mut tx = self.pool.begin().await?;
        let vote = sqlx::query_as::<_, MapVote>(
            r#"
            INSERT INTO map_votes (id, server_id, title, description, start_time, end_time, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(req.server_id)
        .bind(req.title.trim())
        .bind(req.description)
        .bind(req.start_time)
        .bind(req.end_time)
        .bind(created_by)
        .fetch_one(&mut *tx)
        .await?;

        for (position, option) in req.options.into_iter().enumerate() {
            sqlx::query(
                "INSERT INTO map_vote_options (id, map_vote_id, map_name, image_key, position) VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(Uuid::new_v4())
            .bind(vote.id)
            .bind(option.map_name.trim())
            .bind(option.image_key)
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(vote)
    }

    async fn update_map_vote(
        &self,
        id: Uuid,
        req: UpdateMapVoteRequest,
    ) -> AppResult<Option<MapVote>> {
        Ok(sqlx::query_as::<_, MapVote>(
            r#"
            UPDATE map_votes
            SET title = COALESCE($2, title),
                description = CASE WHEN $3 THEN $4 ELSE description END,
                start_time = COALESCE($5, start_time),
                end_time = COALESCE($6, end_time)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(req.title)
        .bind(req.description.is_some())
        .bind(req.description.flatten())
        .bind(req.start_time)
        .bind(req.end_time)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_map_vote(&self, id: Uuid) -> AppResult<bool> {
        let res = sqlx::query("DELETE FROM map_votes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    /// The `(user_id, map_vote_id)` primary key enforces one ballot per user;
    /// a repeat insert is silently skipped and reported as `false`.
    async fn cast_vote(
        &self,
        user_id: Uuid,
        map_vote_id: Uuid,
        option_id: Uuid,
    ) -> AppResult<bool> {
        let res = sqlx::query(
            "INSERT INTO user_votes (user_id, map_vote_id, option_id) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(map_vote_id)
        .bind(option_id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    // --- STOREFRONT ---

    async fn list_products(
        &self,
        category: Option<String>,
        search: Option<String>,
        include_inactive: bool,
    ) -> AppResult<Vec<Product>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT * FROM products WHERE 1 = 1");
        if !include_inactive {
            builder.push(" AND is_active = true");
        }
        if let Some(c) = category {
            builder.push(" AND category = ");
            builder.push_bind(c);
        }
        if let Some(s) = search {
            let pattern = contains_pattern(&s);
            builder.push(" AND (name ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR description ILIKE ");
            builder.push_bind(pattern);
            builder.push(")");
        }
        builder.push(" ORDER BY category, name");
        Ok(builder
            .build_query_as::<Product>()
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_product(&self, id: Uuid) -> AppResult<Option<Product>> {
        Ok(sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_product(&self, req: CreateProductRequest) -> AppResult<Product> {
        Ok(sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (id, name, description, price_cents, category, image_key, stock, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(req.name)
        .bind(req.description)
        .bind(req.price_cents)
        .bind(req.category)
        .bind(req.image_key)
        .bind(req.stock)
        .bind(req.is_active)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn update_product(
        &self,
        id: Uuid,
        req: UpdateProductRequest,
    ) -> AppResult<Option<Product>> {
        Ok(sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                price_cents = COALESCE($4, price_cents),
                category = COALESCE($5, category),
                image_key = CASE WHEN $6 THEN $7 ELSE image_key END,
                stock = CASE WHEN $8 THEN $9 ELSE stock END,
                is_active = COALESCE($10, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(req.name)
        .bind(req.description)
        .bind(req.price_cents)
        .bind(req.category)
        .bind(req.image_key.is_some())
        .bind(req.image_key.flatten())
        .bind(req.stock.is_some())
        .bind(req.stock.flatten())
        .bind(req.is_active)
        .fetch_optional(&self.pool)
        .await?)
    }

    /// Products referenced by past orders cannot be deleted (foreign key); the
    /// resulting violation surfaces as a 400 and they should be deactivated instead.
    async fn delete_product(&self, id: Uuid) -> AppResult<bool> {
        let res = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    /// Locks the requested product rows (`FOR UPDATE`) so concurrent checkouts
    /// cannot oversell limited stock.
    async fn create_order(&self, user_id: Uuid, lines: Vec<OrderLineRequest>) -> AppResult<Order> {
        let product_ids: Vec<Uuid> = checkout::merge_lines(&lines)?
            .into_iter()
            .map(|(id, _)| id)
            .collect();

        let mut tx = self.pool.begin().await?;
        let products = sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE id = ANY($1) FOR UPDATE",
        )
        .bind(&product_ids)
        .fetch_all(&mut *tx)
        .await?;

        let priced = checkout::price_order(&lines, &products)?;

        let mut order = sqlx::query_as::<_, Order>(
            r#"
            INSERT INTO orders (id, user_id, status, total_cents, created_at, updated_at)
            VALUES ($1, $2, 'pending', $3, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(priced.total_cents)
        .fetch_one(&mut *tx)
        .await?;

        for line in priced.lines {
            sqlx::query(
                "INSERT INTO order_items (order_id, product_id, product_name, unit_price_cents, quantity) VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(order.id)
            .bind(line.product_id)
            .bind(&line.product_name)
            .bind(line.unit_price_cents)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "UPDATE products SET stock = stock - $2, updated_at = NOW() WHERE id = $1 AND stock IS NOT NULL",
            )
            .bind(line.product_id)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;

            order.items.push(OrderItem {
                order_id: order.id,
                product_id: line.product_id,
                product_name: line.product_name,
                unit_price_cents: line.unit_price_cents,
                quantity: line.quantity,
            });
        }

        tx.commit().await?;
        Ok(order)
    }

    async fn list_user_orders(&self, user_id: Uuid) -> AppResult<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            "SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        self.attach_items(orders).await
    }

    async fn list_orders(&self, status: Option<OrderStatus>) -> AppResult<Vec<Order>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM orders");
        if let Some(s) = status {
            builder.push(" WHERE status = ");
            builder.push_bind(s);
        }
        builder.push(" ORDER BY created_at DESC");
        let orders = builder
            .build_query_as::<Order>()
            .fetch_all(&self.pool)
            .await?;
        self.attach_items(orders).await
    }

    async fn get_order(&self, id: Uuid) -> AppResult<Option<Order>> {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match order {
            Some(o) => Ok(self.attach_items(vec![o]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn set_order_status(&self, id: Uuid, status: OrderStatus) -> AppResult<Option<Order>> {
        let mut tx = self.pool.begin().await?;
        let current = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(current) = current else {
            return Ok(None);
        };
        if !current.status.can_transition_to(status) {
            return Err(AppError::bad_request(format!(
                "Cannot move an order from {:?} to {:?}",
                current.status, status
            )));
        }

        if status == OrderStatus::Cancelled {
            sqlx::query(
                r#"
                UPDATE products p
                SET stock = p.stock + oi.quantity, updated_at = NOW()
                FROM order_items oi
                WHERE oi.order_id = $1 AND oi.product_id = p.id AND p.stock IS NOT NULL
                "#,
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        let updated = sqlx::query_as::<_, Order>(
            "UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(status)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(self.attach_items(vec![updated]).await?.pop())
    }

    // --- SITE CONTENT ---

    async fn get_page_metadata(&self, path: &str) -> AppResult<Option<PageMetadata>> {
        Ok(
            sqlx::query_as::<_, PageMetadata>("SELECT * FROM page_metadata WHERE path = $1")
                .bind(path)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn list_page_metadata(&self) -> AppResult<Vec<PageMetadata>> {
        Ok(
            sqlx::query_as::<_, PageMetadata>("SELECT * FROM page_metadata ORDER BY path")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn upsert_page_metadata(
        &self,
        req: UpsertPageMetadataRequest,
    ) -> AppResult<PageMetadata> {
        Ok(sqlx::query_as::<_, PageMetadata>(
            r#"
            INSERT INTO page_metadata (path, title, description, keywords, og_image, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (path) DO UPDATE
            SET title = EXCLUDED.title,
                description = EXCLUDED.description,
                keywords = EXCLUDED.keywords,
                og_image = EXCLUDED.og_image,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(req.path)
        .bind(req.title)
        .bind(req.description)
        .bind(req.keywords)
        .bind(req.og_image)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn delete_page_metadata(&self, path: &str) -> AppResult<bool> {
        let res = sqlx::query("DELETE FROM page_metadata WHERE path = $1")
            .bind(path)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn list_navigation(&self, include_hidden: bool) -> AppResult<Vec<NavigationItem>> {
        Ok(sqlx::query_as::<_, NavigationItem>(
            "SELECT * FROM navigation_items WHERE ($1 OR is_visible) ORDER BY parent_id NULLS FIRST, position, label",
        )
        .bind(include_hidden)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn create_navigation_item(
        &self,
        req: CreateNavigationItemRequest,
    ) -> AppResult<NavigationItem> {
        Ok(sqlx::query_as::<_, NavigationItem>(
            r#"
            INSERT INTO navigation_items (id, label, href, parent_id, position, is_external, is_visible)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(req.label)
        .bind(req.href)
        .bind(req.parent_id)
        .bind(req.position)
        .bind(req.is_external)
        .bind(req.is_visible)
        .fetch_one(&self.pool)
        .await?)
    }

    /// Re-parenting is checked inside the transaction: the new parent's
    /// ancestor chain must not contain the item itself.
    async fn update_navigation_item(
        &self,
        id: Uuid,
        req: UpdateNavigationItemRequest,
    ) -> AppResult<Option<NavigationItem>> {
        let mut tx = self.pool.begin().await?;
        if let Some(Some(parent)) = req.parent_id {
            let cycle = sqlx::query_scalar::<_, bool>(
                r#"
                WITH RECURSIVE chain AS (
                    SELECT id, parent_id FROM navigation_items WHERE id = $1
                    UNION
                    SELECT n.id, n.parent_id
                    FROM navigation_items n JOIN chain c ON n.id = c.parent_id
                )
                SELECT EXISTS (SELECT 1 FROM chain WHERE id = $2)
                "#,
            )
            .bind(parent)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
            if cycle {
                return Err(AppError::bad_request("Navigation items cannot form a cycle"));
            }
        }

        let item = sqlx::query_as::<_, NavigationItem>(
            r#"
            UPDATE navigation_items
            SET label = COALESCE($2, label),
                href = COALESCE($3, href),
                parent_id = CASE WHEN $4 THEN $5 ELSE parent_id END,
                position = COALESCE($6, position),
                is_external = COALESCE($7, is_external),
                is_visible = COALESCE($8, is_visible)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(req.label)
        .bind(req.href)
        .bind(req.parent_id.is_some())
        .bind(req.parent_id.flatten())
        .bind(req.position)
        .bind(req.is_external)
        .bind(req.is_visible)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(item)
    }

    async fn delete_navigation_item(&self, id: Uuid) -> AppResult<bool> {
        let res = sqlx::query("DELETE FROM navigation_items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn get_site_settings(&self) -> AppResult<SiteSettings> {
        Ok(
            sqlx::query_as::<_, SiteSettings>("SELECT * FROM site_settings WHERE id = 1")
                .fetch_one(&self.pool)
                .await?,
        )
    }

    async fn update_site_settings(
        &self,
        req: UpdateSiteSettingsRequest,
    ) -> AppResult<SiteSettings> {
        Ok(sqlx::query_as::<_, SiteSettings>(
            r#"
            UPDATE site_settings
            SET site_name = COALESCE($1, site_name),
                tagline = CASE WHEN $2 THEN $3 ELSE tagline END,
                discord_url = CASE WHEN $4 THEN $5 ELSE discord_url END,
                currency = COALESCE($6, currency),
                maintenance_mode = COALESCE($7, maintenance_mode),
                updated_at = NOW()
            WHERE id = 1
            RETURNING *
            "#,
        )
        .bind(req.site_name)
        .bind(req.tagline.is_some())
        .bind(req.tagline.flatten())
        .bind(req.discord_url.is_some())
        .bind(req.discord_url.flatten())
        .bind(req.currency)
        .bind(req.maintenance_mode)
        .fetch_one(&self.pool)
        .await?)
    }

    // --- DASHBOARD ---

    /// All dashboard counters in a single round trip.
    async fn get_stats(&self) -> AppResult<AdminDashboardStats> {
        Ok(sqlx::query_as::<_, AdminDashboardStats>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users) AS total_users,
                (SELECT COUNT(*) FROM tickets WHERE status = 'open') AS open_tickets,
                (SELECT COUNT(*) FROM servers WHERE is_active) AS active_servers,
                (SELECT COUNT(*) FROM map_votes WHERE start_time <= NOW() AND end_time > NOW()) AS active_map_votes,
                (SELECT COUNT(*) FROM products WHERE is_active) AS active_products,
                (SELECT COUNT(*) FROM orders WHERE status = 'pending') AS pending_orders
            "#,
        )
        .fetch_one(&self.pool)
        .await?)
    }
}
