//! Order route handlers.
//!
//! Two entry points create orders: the hosted payment widget reports a
//! captured payment through `create-order` (optionally anonymous, already
//! confirmed), and logged-in shoppers place manual-payment orders through
//! `POST /api/orders` (pending until an admin confirms them).

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_sessions::Session;
use tracing::instrument;

use nudge_core::{OrderId, OrderStatus, sum_prices};

use crate::db::OrderRepository;
use crate::error::{ApiJson, AppError, Result, add_breadcrumb};
use crate::middleware::{OptionalUser, RequireAdmin, RequireUser};
use crate::models::user::non_empty;
use crate::models::{
    NewOrder, NewOrderItem, Order, OrderWithItems, ShippingInfo, session_keys,
};
use crate::routes::cart::clear_cart;
use crate::state::AppState;

const MISSING_FIELDS: &str = "Missing required fields";
const WIDGET_PAYMENT_METHOD: &str = "paypal";

// =============================================================================
// Widget Checkout
// =============================================================================

/// Payment captured by the hosted widget.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub product_id: Option<String>,
    pub product_name: Option<String>,
    pub price: Option<Decimal>,
    pub paypal_order_id: Option<String>,
    pub payer_email: Option<String>,
    pub payer_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub success: bool,
    pub order_id: OrderId,
}

/// Record a widget payment as a confirmed single-item order.
#[instrument(skip(state, user, session, body))]
pub async fn create_from_widget(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    session: Session,
    ApiJson(body): ApiJson<CreateOrderRequest>,
) -> Result<Json<CreateOrderResponse>> {
    let product_id = non_empty(body.product_id).ok_or_else(missing_fields)?;
    let product_name = non_empty(body.product_name).ok_or_else(missing_fields)?;
    let reference = non_empty(body.paypal_order_id).ok_or_else(missing_fields)?;
    let price = body
        .price
        .filter(|p| *p > Decimal::ZERO)
        .ok_or_else(missing_fields)?;

    if let Some(product) = state.catalog().get(&product_id)
        && product.price != price
    {
        tracing::warn!(%product_id, %price, list_price = %product.price, "Widget price differs from catalog");
    }

    let customer_email =
        non_empty(body.payer_email).or_else(|| user.as_ref().map(|u| u.email.clone()));

    let new = NewOrder {
        user_id: user.as_ref().map(|u| u.id),
        customer_email,
        customer_name: non_empty(body.payer_name),
        status: OrderStatus::Confirmed,
        payment_method: Some(WIDGET_PAYMENT_METHOD.to_string()),
        payment_reference: Some(reference),
        items: vec![NewOrderItem {
            name: product_name,
            price,
        }],
        ..NewOrder::default()
    };

    let created = OrderRepository::new(state.pool()).create(&new).await?;
    let order_id = created.order.id;
    remember_widget_order(&session, order_id).await?;

    let id = order_id.to_string();
    let crumb = [("order_id", id.as_str())];
    add_breadcrumb("order", "Widget order created", Some(crumb.as_slice()));
    tracing::info!(%order_id, "Widget order created");

    Ok(Json(CreateOrderResponse {
        success: true,
        order_id,
    }))
}

/// `orderId` as the browser sends it: a number or a numeric string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum OrderIdInput {
    Number(i32),
    Text(String),
}

impl OrderIdInput {
    fn parse(&self) -> Option<OrderId> {
        match self {
            Self::Number(id) => Some(OrderId::new(*id)),
            Self::Text(raw) => raw.trim().parse().ok().map(OrderId::new),
        }
    }
}

/// Shipping details collected after a widget payment.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteOrderRequest {
    pub order_id: Option<OrderIdInput>,
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub department: Option<String>,
    pub whatsapp_number: Option<String>,
    /// Provider order id, accepted as proof of ownership from another session.
    pub paypal_order_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Attach shipping details and move the order to `shipped`.
///
/// Only the session that created the order, the account it belongs to, or a
/// caller quoting its provider order id may do this.
#[instrument(skip(state, user, session, body))]
pub async fn complete(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    session: Session,
    ApiJson(body): ApiJson<CompleteOrderRequest>,
) -> Result<Json<SuccessResponse>> {
    let order_id = body
        .order_id
        .as_ref()
        .and_then(OrderIdInput::parse)
        .ok_or_else(missing_fields)?;
    let name = non_empty(body.name).ok_or_else(missing_fields)?;
    let shipping = ShippingInfo {
        address: non_empty(body.address).ok_or_else(missing_fields)?,
        city: non_empty(body.city).ok_or_else(missing_fields)?,
        department: non_empty(body.department).ok_or_else(missing_fields)?,
        whatsapp_number: non_empty(body.whatsapp_number).ok_or_else(missing_fields)?,
    };

    let repo = OrderRepository::new(state.pool());
    let reference = non_empty(body.paypal_order_id);
    if !widget_orders(&session).await?.contains(&order_id) {
        if reference.is_none() && user.is_none() {
            return Err(not_your_order());
        }
        let order = repo
            .get(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {order_id}")))?;
        let quoted = reference.is_some() && order.payment_reference == reference;
        let owned = user.is_some_and(|u| order.user_id == Some(u.id));
        if !quoted && !owned {
            tracing::warn!(%order_id, "Rejected shipping details for a foreign order");
            return Err(not_your_order());
        }
    }

    repo.complete(order_id, &name, &shipping).await?;

    tracing::info!(%order_id, "Order shipping details recorded");
    Ok(Json(SuccessResponse { success: true }))
}

fn not_your_order() -> AppError {
    AppError::Forbidden("Order does not belong to this session".to_string())
}

async fn widget_orders(session: &Session) -> Result<Vec<OrderId>> {
    Ok(session
        .get(session_keys::WIDGET_ORDERS)
        .await?
        .unwrap_or_default())
}

async fn remember_widget_order(session: &Session, id: OrderId) -> Result<()> {
    let mut ids = widget_orders(session).await?;
    if !ids.contains(&id) {
        ids.push(id);
        session.insert(session_keys::WIDGET_ORDERS, ids).await?;
    }
    Ok(())
}

// =============================================================================
// Account Orders
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ItemInput {
    pub name: String,
    pub price: Decimal,
}

/// Manual-payment order placed by a logged-in shopper.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub items: Vec<ItemInput>,
    /// When present, must equal the item sum.
    pub total: Option<Decimal>,
    pub payment_method: Option<String>,
    #[serde(alias = "paypalOrderId")]
    pub payment_reference: Option<String>,
    pub payment_proof: Option<String>,
    pub additional_info: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct AddItemsRequest {
    pub items: Vec<ItemInput>,
}

/// Place an order from the caller's items and empty their cart.
#[instrument(skip(state, session, user, body), fields(user_id = %user.id))]
pub async fn place(
    State(state): State<AppState>,
    session: Session,
    RequireUser(user): RequireUser,
    ApiJson(body): ApiJson<PlaceOrderRequest>,
) -> Result<impl IntoResponse> {
    let items = validate_items(body.items)?;
    let total = sum_prices(items.iter().map(|item| item.price));
    if let Some(claimed) = body.total
        && claimed != total
    {
        return Err(AppError::BadRequest(format!(
            "Total {claimed} does not match item sum {total}"
        )));
    }

    let new = NewOrder {
        user_id: Some(user.id),
        customer_email: Some(user.email.clone()),
        status: OrderStatus::Pending,
        payment_method: non_empty(body.payment_method),
        payment_reference: non_empty(body.payment_reference),
        payment_proof: non_empty(body.payment_proof),
        additional_info: body.additional_info,
        items,
        ..NewOrder::default()
    };

    let created = OrderRepository::new(state.pool()).create(&new).await?;
    clear_cart(&session).await?;

    tracing::info!(order_id = %created.order.id, %total, "Order placed");
    Ok((StatusCode::CREATED, Json(created)))
}

/// Append items to one of the caller's orders.
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn add_items(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<i32>,
    ApiJson(body): ApiJson<AddItemsRequest>,
) -> Result<Json<OrderWithItems>> {
    let order_id = OrderId::new(id);
    let items = validate_items(body.items)?;

    let repo = OrderRepository::new(state.pool());
    let order = repo
        .get(order_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {order_id}")))?;
    if order.user_id != Some(user.id) {
        return Err(AppError::Forbidden("Not your order".to_string()));
    }

    let updated = repo.add_items(order_id, &items).await?;
    Ok(Json(updated))
}

/// The caller's orders, newest first.
pub async fn list_mine(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<OrderWithItems>>> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;
    Ok(Json(orders))
}

// =============================================================================
// Admin
// =============================================================================

/// Every order, with its owner's contact details.
pub async fn list_all(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<OrderWithItems>>> {
    let orders = OrderRepository::new(state.pool()).list_all().await?;
    Ok(Json(orders))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

/// Move an order forward in its lifecycle.
#[instrument(skip(state, admin, body), fields(admin_id = %admin.id))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<i32>,
    ApiJson(body): ApiJson<UpdateStatusRequest>,
) -> Result<Json<Order>> {
    let order = OrderRepository::new(state.pool())
        .update_status(OrderId::new(id), body.status)
        .await?;
    tracing::info!(order_id = %order.id, status = %order.status, "Order status updated");
    Ok(Json(order))
}

// =============================================================================
// Helpers
// =============================================================================

fn missing_fields() -> AppError {
    AppError::BadRequest(MISSING_FIELDS.to_string())
}

/// At least one item, each with a name and a positive price.
fn validate_items(items: Vec<ItemInput>) -> Result<Vec<NewOrderItem>> {
    if items.is_empty() {
        return Err(AppError::BadRequest("At least one item is required".to_string()));
    }
    items
        .into_iter()
        .map(|item| {
            let name = non_empty(Some(item.name))
                .ok_or_else(|| AppError::BadRequest("Item name is required".to_string()))?;
            if item.price <= Decimal::ZERO {
                return Err(AppError::BadRequest(format!(
                    "Item {name} must have a positive price"
                )));
            }
            Ok(NewOrderItem {
                name,
                price: item.price,
            })
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn item(name: &str, price: &str) -> ItemInput {
        ItemInput {
            name: name.to_string(),
            price: Decimal::from_str(price).unwrap(),
        }
    }

    #[test]
    fn test_validate_items_trims_names() {
        let items = validate_items(vec![item("  Classic ", "29.90")]).unwrap();
        assert_eq!(items[0].name, "Classic");
    }

    #[test]
    fn test_validate_items_rejects_bad_input() {
        assert!(matches!(validate_items(vec![]), Err(AppError::BadRequest(_))));
        assert!(matches!(
            validate_items(vec![item("   ", "1.00")]),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            validate_items(vec![item("Free", "0")]),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_order_id_input_accepts_number_or_string() {
        let body: CompleteOrderRequest =
            serde_json::from_str(r#"{"orderId":"42","name":"Ana"}"#).unwrap();
        assert_eq!(body.order_id.unwrap().parse(), Some(OrderId::new(42)));

        let body: CompleteOrderRequest = serde_json::from_str(r#"{"orderId":7}"#).unwrap();
        assert_eq!(body.order_id.unwrap().parse(), Some(OrderId::new(7)));

        let body: CompleteOrderRequest = serde_json::from_str(r#"{"orderId":"abc"}"#).unwrap();
        assert_eq!(body.order_id.unwrap().parse(), None);
    }

    #[test]
    fn test_widget_request_tolerates_missing_fields() {
        let body: CreateOrderRequest =
            serde_json::from_str(r#"{"productId":"classic","price":"29.90"}"#).unwrap();
        assert_eq!(body.product_name, None);
        assert_eq!(body.price, Some(Decimal::from_str("29.90").unwrap()));
    }
}
