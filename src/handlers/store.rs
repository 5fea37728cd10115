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
        CreateOrderRequest, CreateProductRequest, Order, OrderStatus, Product,
        UpdateOrderStatusRequest, UpdateProductRequest,
    },
    permissions,
};

/// ProductFilter
///
/// Query parameters for the product listings.
#[derive(Debug, Deserialize, Default, utoipa::IntoParams)]
pub struct ProductFilter {
    /// Exact category match, e.g. `ranks`.
    pub category: Option<String>,
    /// Case-insensitive match on name or description.
    pub search: Option<String>,
}

impl ProductFilter {
    fn into_parts(self) -> (Option<String>, Option<String>) {
        let non_blank = |s: Option<String>| s.filter(|v| !v.trim().is_empty());
        (non_blank(self.category), non_blank(self.search))
    }
}

#[derive(Debug, Deserialize, Default, utoipa::IntoParams)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
}

/// get_products
///
/// [Public Route] Active products, grouped by category.
#[utoipa::path(
    get,
    path = "/products",
    params(ProductFilter),
    responses((status = 200, description = "Products", body = [Product]))
)]
pub async fn get_products(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> AppResult<Json<Vec<Product>>> {
    let (category, search) = filter.into_parts();
    Ok(Json(state.repo.list_products(category, search, false).await?))
}

#[utoipa::path(
    get,
    path = "/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product", body = Product),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Product>> {
    state
        .repo
        .get_product(id)
        .await?
        .filter(|p| p.is_active)
        .map(Json)
        .ok_or(AppError::not_found("Product"))
}

/// create_order
///
/// [Authenticated Route] Checks out a cart. Prices are taken from the catalogue
/// at this moment, limited stock is reserved, and the order is recorded as
/// `pending`; payment happens outside this service.
#[utoipa::path(
    post,
    path = "/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order placed", body = Order),
        (status = 400, description = "Empty cart, bad quantity or unavailable product"),
        (status = 404, description = "Unknown product"),
        (status = 409, description = "Insufficient stock")
    )
)]
pub async fn create_order(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateOrderRequest>,
) -> AppResult<(StatusCode, Json<Order>)> {
    let order = state.repo.create_order(auth.id, payload.items).await?;
    tracing::info!(
        order_id = %order.id,
        user_id = %auth.id,
        total_cents = order.total_cents,
        "order placed"
    );
    Ok((StatusCode::CREATED, Json(order)))
}

#[utoipa::path(
    get,
    path = "/orders",
    responses((status = 200, description = "The caller's orders", body = [Order]))
)]
pub async fn list_my_orders(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Order>>> {
    Ok(Json(state.repo.list_user_orders(auth.id).await?))
}

#[utoipa::path(
    get,
    path = "/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order", body = Order),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_order(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Order>> {
    let order = state
        .repo
        .get_order(id)
        .await?
        .ok_or(AppError::not_found("Order"))?;
    auth.require_owner_or(order.user_id, permissions::STORE_MANAGE)?;
    Ok(Json(order))
}

#[utoipa::path(
    get,
    path = "/admin/products",
    params(ProductFilter),
    responses((status = 200, description = "All products", body = [Product]))
)]
pub async fn list_all_products(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> AppResult<Json<Vec<Product>>> {
    auth.require(permissions::STORE_MANAGE)?;
    let (category, search) = filter.into_parts();
    Ok(Json(state.repo.list_products(category, search, true).await?))
}

#[utoipa::path(
    post,
    path = "/admin/products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Created", body = Product),
        (status = 400, description = "Invalid input")
    )
)]
pub async fn create_product(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateProductRequest>,
) -> AppResult<(StatusCode, Json<Product>)> {
    auth.require(permissions::STORE_MANAGE)?;
    payload.validate()?;
    let product = state.repo.create_product(payload).await?;
    tracing::info!(product_id = %product.id, name = %product.name, actor = %auth.id, "product created");
    Ok((StatusCode::CREATED, Json(product)))
}

#[utoipa::path(
    put,
    path = "/admin/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Updated", body = Product),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_product(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> AppResult<Json<Product>> {
    auth.require(permissions::STORE_MANAGE)?;
    payload.validate()?;
    let product = state
        .repo
        .update_product(id, payload)
        .await?
        .ok_or(AppError::not_found("Product"))?;
    tracing::info!(product_id = %id, actor = %auth.id, "product updated");
    Ok(Json(product))
}

/// Products already referenced by orders cannot be deleted (400); deactivate them instead.
#[utoipa::path(
    delete,
    path = "/admin/products/{id}",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 400, description = "Product has orders"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_product(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    auth.require(permissions::STORE_MANAGE)?;
    if !state.repo.delete_product(id).await? {
        return Err(AppError::not_found("Product"));
    }
    tracing::info!(product_id = %id, actor = %auth.id, "product deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/admin/orders",
    params(OrderFilter),
    responses((status = 200, description = "Orders", body = [Order]))
)]
pub async fn list_all_orders(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(filter): Query<OrderFilter>,
) -> AppResult<Json<Vec<Order>>> {
    auth.require(permissions::STORE_MANAGE)?;
    Ok(Json(state.repo.list_orders(filter.status).await?))
}

/// update_order_status
///
/// [Admin Route] Settles a pending order as `completed` or `cancelled`.
/// Cancelling returns the reserved stock.
#[utoipa::path(
    put,
    path = "/admin/orders/{id}/status",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Updated", body = Order),
        (status = 400, description = "Invalid transition"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_order_status(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> AppResult<Json<Order>> {
    auth.require(permissions::STORE_MANAGE)?;
    let order = state
        .repo
        .set_order_status(id, payload.status)
        .await?
        .ok_or(AppError::not_found("Order"))?;
    tracing::info!(order_id = %id, status = ?order.status, actor = %auth.id, "order status changed");
    Ok(Json(order))
}
