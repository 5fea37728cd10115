//! Order pricing and stock validation shared by the repository implementations.

use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{OrderLineRequest, Product},
};

/// Upper bound on the quantity of a single product in one order.
pub const MAX_LINE_QUANTITY: i32 = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct PricedLine {
    pub product_id: Uuid,
    pub product_name: String,
    pub unit_price_cents: i64,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PricedOrder {
    pub lines: Vec<PricedLine>,
    pub total_cents: i64,
}

/// Collapses repeated product ids into one line each, preserving first-seen order.
pub fn merge_lines(requested: &[OrderLineRequest]) -> AppResult<Vec<(Uuid, i32)>> {
    if requested.is_empty() {
        return Err(AppError::bad_request("An order needs at least one item"));
    }
    let mut merged: Vec<(Uuid, i32)> = Vec::with_capacity(requested.len());
    for line in requested {
        if line.quantity <= 0 {
            return Err(AppError::bad_request("Quantities must be positive"));
        }
        match merged.iter_mut().find(|(id, _)| *id == line.product_id) {
            Some((_, qty)) => {
                *qty = qty
                    .checked_add(line.quantity)
                    .ok_or_else(|| AppError::bad_request("Quantity too large"))?;
            }
            None => merged.push((line.product_id, line.quantity)),
        }
    }
    if merged.iter().any(|(_, qty)| *qty > MAX_LINE_QUANTITY) {
        return Err(AppError::bad_request(format!(
            "At most {MAX_LINE_QUANTITY} of any product per order"
        )));
    }
    Ok(merged)
}

/// price_order
///
/// Prices `requested` against the current `products` rows. Every requested
/// product must exist and be active, and limited stock must cover the quantity.
pub fn price_order(requested: &[OrderLineRequest], products: &[Product]) -> AppResult<PricedOrder> {
    let merged = merge_lines(requested)?;
    let mut lines = Vec::with_capacity(merged.len());
    let mut total_cents: i64 = 0;

    for (product_id, quantity) in merged {
        let product = products
            .iter()
            .find(|p| p.id == product_id)
            .ok_or_else(|| AppError::not_found("Product"))?;
        if !product.is_active {
            return Err(AppError::bad_request(format!(
                "'{}' is no longer available",
                product.name
            )));
        }
        if let Some(stock) = product.stock {
            if stock < quantity {
                return Err(AppError::conflict(format!(
                    "Only {stock} of '{}' left in stock",
                    product.name
                )));
            }
        }
        let line_total = product
            .price_cents
            .checked_mul(i64::from(quantity))
            .ok_or_else(|| AppError::bad_request("Order total too large"))?;
        total_cents = total_cents
            .checked_add(line_total)
            .ok_or_else(|| AppError::bad_request("Order total too large"))?;
        lines.push(PricedLine {
            product_id,
            product_name: product.name.clone(),
            unit_price_cents: product.price_cents,
            quantity,
        });
    }

    Ok(PricedOrder { lines, total_cents })
}
