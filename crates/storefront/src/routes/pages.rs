//! Protected page data.
//!
//! The browser app renders these pages; the server only decides who may see
//! them and hands over the data. A visitor without a valid `authToken` is
//! redirected to `/login?redirect=<path>`, and a non-admin opening `/admin`
//! is sent home.

use axum::{Json, extract::State};
use rust_decimal::Decimal;
use serde::Serialize;
use tower_sessions::Session;

use nudge_core::behavior::TrainingProgress;

use crate::db::orders::StatusTotals;
use crate::db::{BehaviorRepository, OrderRepository};
use crate::error::Result;
use crate::middleware::{RequireAdmin, RequireUser};
use crate::models::{OrderWithItems, User};
use crate::routes::cart::{CartView, load_cart};
use crate::services::{AggregateSnapshot, AuthService};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutPage {
    pub cart: CartView,
    /// Client id for the hosted payment widget, when configured.
    pub paypal_client_id: Option<String>,
}

pub async fn checkout(
    State(state): State<AppState>,
    RequireUser(_user): RequireUser,
    session: Session,
) -> Result<Json<CheckoutPage>> {
    let lines = load_cart(&session, state.catalog()).await?;
    Ok(Json(CheckoutPage {
        cart: CartView::build(&lines, state.catalog()),
        paypal_client_id: state.config().paypal_client_id.clone(),
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardPage {
    pub user: User,
    pub orders: Vec<OrderWithItems>,
}

pub async fn dashboard(
    State(state): State<AppState>,
    RequireUser(current): RequireUser,
) -> Result<Json<DashboardPage>> {
    let user = AuthService::new(state.pool()).get_user(current.id).await?;
    let orders = OrderRepository::new(state.pool())
        .list_for_user(current.id)
        .await?;
    Ok(Json(DashboardPage { user, orders }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelStatus {
    pub ready: bool,
    pub training: bool,
    pub progress: TrainingProgress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_loss: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminPage {
    pub orders: Vec<StatusTotals>,
    pub order_count: i64,
    pub revenue: Decimal,
    pub stored_samples: i64,
    pub behavior: AggregateSnapshot,
    pub model: ModelStatus,
    pub live_viewers: usize,
}

pub async fn admin(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<AdminPage>> {
    let orders = OrderRepository::new(state.pool()).totals_by_status().await?;
    let stored_samples = BehaviorRepository::new(state.pool()).count().await?;

    let intent = state.intent();
    let current = intent.current();

    Ok(Json(AdminPage {
        order_count: orders.iter().map(|t| t.count).sum(),
        revenue: orders.iter().map(|t| t.revenue).sum(),
        orders,
        stored_samples,
        behavior: state.aggregator().snapshot(),
        model: ModelStatus {
            ready: current.is_some(),
            training: intent.is_training(),
            progress: intent.progress(),
            final_loss: current.map(|m| m.final_loss),
        },
        live_viewers: state.realtime().subscriber_count(),
    }))
}
