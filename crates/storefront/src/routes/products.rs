//! Product route handlers.

use axum::{
    Json,
    extract::{Path, State},
};

use crate::catalog::Product;
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Every product, in catalog order.
pub async fn index(State(state): State<AppState>) -> Json<Vec<Product>> {
    Json(state.catalog().products().to_vec())
}

pub async fn show(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Product>> {
    state
        .catalog()
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))
}
