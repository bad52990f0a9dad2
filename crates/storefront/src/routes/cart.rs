//! Cart route handlers.
//!
//! The cart lives in the session as a list of `(product id, quantity)` lines.
//! Names and prices always come from the catalog, so a price change is
//! picked up the next time the cart is read and products that left the
//! catalog drop out of it.

use axum::{Json, extract::State};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use nudge_core::{format_money, round_to_cents, sum_prices};

use crate::catalog::Catalog;
use crate::error::{ApiJson, AppError, Result};
use crate::models::{CartLine, session_keys};
use crate::state::AppState;

/// Per-line quantity ceiling.
pub const MAX_LINE_QUANTITY: u32 = 99;

// =============================================================================
// Views
// =============================================================================

/// A cart line priced from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemView {
    pub product_id: String,
    pub name: String,
    pub image: Option<String>,
    pub quantity: u32,
    pub price: Decimal,
    pub line_total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub item_count: u32,
    pub subtotal: Decimal,
    /// `subtotal` formatted for display, e.g. `$44.80`.
    pub formatted_subtotal: String,
}

impl CartView {
    /// Price `lines` against the catalog, skipping unknown products.
    #[must_use]
    pub fn build(lines: &[CartLine], catalog: &Catalog) -> Self {
        let items: Vec<CartItemView> = lines
            .iter()
            .filter_map(|line| {
                let product = catalog.get(&line.product_id)?;
                Some(CartItemView {
                    product_id: product.id.clone(),
                    name: product.name.clone(),
                    image: product.image.clone(),
                    quantity: line.quantity,
                    price: product.price,
                    line_total: round_to_cents(product.price * Decimal::from(line.quantity)),
                })
            })
            .collect();

        let subtotal = sum_prices(items.iter().map(|item| item.line_total));
        Self {
            item_count: items.iter().map(|item| item.quantity).sum(),
            formatted_subtotal: format_money(subtotal),
            subtotal,
            items,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartCount {
    pub item_count: u32,
}

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub product_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

const fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCartRequest {
    pub product_id: String,
    /// `0` removes the line.
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveFromCartRequest {
    pub product_id: String,
}

// =============================================================================
// Session Helpers
// =============================================================================

/// Read the cart lines, pruning products that are no longer in the catalog.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn load_cart(session: &Session, catalog: &Catalog) -> Result<Vec<CartLine>> {
    let lines: Vec<CartLine> = session
        .get(session_keys::CART)
        .await?
        .unwrap_or_default();

    let known: Vec<CartLine> = lines
        .iter()
        .filter(|line| catalog.get(&line.product_id).is_some())
        .cloned()
        .collect();

    if known.len() != lines.len() {
        tracing::debug!(dropped = lines.len() - known.len(), "Pruned vanished cart lines");
        save_cart(session, &known).await?;
    }
    Ok(known)
}

async fn save_cart(session: &Session, lines: &[CartLine]) -> Result<()> {
    session.insert(session_keys::CART, lines).await?;
    Ok(())
}

/// Empty the cart.
///
/// # Errors
///
/// Returns an error if the session store fails.
pub async fn clear_cart(session: &Session) -> Result<()> {
    session.remove::<Vec<CartLine>>(session_keys::CART).await?;
    Ok(())
}

/// Add `quantity` of a product, merging into an existing line.
fn add_line(lines: &mut Vec<CartLine>, product_id: &str, quantity: u32) {
    if let Some(line) = lines.iter_mut().find(|l| l.product_id == product_id) {
        line.quantity = line.quantity.saturating_add(quantity).min(MAX_LINE_QUANTITY);
    } else {
        lines.push(CartLine {
            product_id: product_id.to_owned(),
            quantity: quantity.min(MAX_LINE_QUANTITY),
        });
    }
}

/// Set a line's quantity. Returns `false` when the product is not in the cart.
fn set_quantity(lines: &mut Vec<CartLine>, product_id: &str, quantity: u32) -> bool {
    let Some(index) = lines.iter().position(|l| l.product_id == product_id) else {
        return false;
    };
    if quantity == 0 {
        lines.remove(index);
    } else if let Some(line) = lines.get_mut(index) {
        line.quantity = quantity.min(MAX_LINE_QUANTITY);
    }
    true
}

// =============================================================================
// Handlers
// =============================================================================

pub async fn show(State(state): State<AppState>, session: Session) -> Result<Json<CartView>> {
    let lines = load_cart(&session, state.catalog()).await?;
    Ok(Json(CartView::build(&lines, state.catalog())))
}

#[instrument(skip(state, session, body), fields(product_id = %body.product_id))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    ApiJson(body): ApiJson<AddToCartRequest>,
) -> Result<Json<CartView>> {
    if body.quantity == 0 {
        return Err(AppError::BadRequest("Quantity must be at least 1".to_string()));
    }
    if state.catalog().get(&body.product_id).is_none() {
        return Err(AppError::NotFound(format!("product {}", body.product_id)));
    }

    let mut lines = load_cart(&session, state.catalog()).await?;
    add_line(&mut lines, &body.product_id, body.quantity);
    save_cart(&session, &lines).await?;

    Ok(Json(CartView::build(&lines, state.catalog())))
}

#[instrument(skip(state, session, body), fields(product_id = %body.product_id))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    ApiJson(body): ApiJson<UpdateCartRequest>,
) -> Result<Json<CartView>> {
    let mut lines = load_cart(&session, state.catalog()).await?;
    if !set_quantity(&mut lines, &body.product_id, body.quantity) {
        return Err(AppError::NotFound(format!("cart line {}", body.product_id)));
    }
    save_cart(&session, &lines).await?;

    Ok(Json(CartView::build(&lines, state.catalog())))
}

pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    ApiJson(body): ApiJson<RemoveFromCartRequest>,
) -> Result<Json<CartView>> {
    let mut lines = load_cart(&session, state.catalog()).await?;
    set_quantity(&mut lines, &body.product_id, 0);
    save_cart(&session, &lines).await?;

    Ok(Json(CartView::build(&lines, state.catalog())))
}

pub async fn clear(State(state): State<AppState>, session: Session) -> Result<Json<CartView>> {
    clear_cart(&session).await?;
    Ok(Json(CartView::build(&[], state.catalog())))
}

pub async fn count(State(state): State<AppState>, session: Session) -> Result<Json<CartCount>> {
    let lines = load_cart(&session, state.catalog()).await?;
    Ok(Json(CartCount {
        item_count: CartView::build(&lines, state.catalog()).item_count,
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::str::FromStr;

    use crate::catalog::Product;

    use super::*;

    fn catalog() -> Catalog {
        Catalog::from_products(vec![
            Product {
                id: "classic".to_string(),
                name: "Classic".to_string(),
                description: String::new(),
                price: Decimal::from_str("29.90").unwrap(),
                image: None,
                category: None,
            },
            Product {
                id: "mini".to_string(),
                name: "Mini".to_string(),
                description: String::new(),
                price: Decimal::from_str("14.95").unwrap(),
                image: None,
                category: None,
            },
        ])
        .unwrap()
    }

    fn line(id: &str, quantity: u32) -> CartLine {
        CartLine {
            product_id: id.to_string(),
            quantity,
        }
    }

    #[test]
    fn test_view_prices_from_catalog() {
        let view = CartView::build(&[line("classic", 2), line("mini", 1)], &catalog());
        assert_eq!(view.item_count, 3);
        assert_eq!(view.subtotal, Decimal::from_str("74.75").unwrap());
        assert_eq!(view.items[0].line_total, Decimal::from_str("59.80").unwrap());
        assert_eq!(view.formatted_subtotal, "$74.75");
    }

    #[test]
    fn test_view_skips_unknown_products() {
        let view = CartView::build(&[line("gone", 4), line("mini", 1)], &catalog());
        assert_eq!(view.items.len(), 1);
        assert_eq!(view.item_count, 1);
    }

    #[test]
    fn test_add_line_merges() {
        let mut lines = vec![line("classic", 1)];
        add_line(&mut lines, "classic", 2);
        add_line(&mut lines, "mini", 1);
        assert_eq!(lines, vec![line("classic", 3), line("mini", 1)]);
    }

    #[test]
    fn test_add_line_caps_quantity() {
        let mut lines = vec![line("classic", MAX_LINE_QUANTITY)];
        add_line(&mut lines, "classic", 5);
        assert_eq!(lines[0].quantity, MAX_LINE_QUANTITY);
    }

    #[test]
    fn test_set_quantity_zero_removes() {
        let mut lines = vec![line("classic", 2), line("mini", 1)];
        assert!(set_quantity(&mut lines, "classic", 0));
        assert_eq!(lines, vec![line("mini", 1)]);
        assert!(!set_quantity(&mut lines, "classic", 3));
    }

    #[test]
    fn test_add_request_defaults_quantity() {
        let body: AddToCartRequest = serde_json::from_str(r#"{"productId":"mini"}"#).unwrap();
        assert_eq!(body.quantity, 1);
    }
}
