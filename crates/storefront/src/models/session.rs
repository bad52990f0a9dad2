//! Session-related types.
//!
//! The session holds the cart and the ids of widget orders it created;
//! identity travels in the `authToken` cookie.

use serde::{Deserialize, Serialize};

/// A cart line as stored in the session.
///
/// Only the product id and quantity are trusted from the session; names and
/// prices are re-read from the catalog whenever the cart is shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: String,
    pub quantity: u32,
}

/// Session keys.
pub mod keys {
    /// Key for the list of [`CartLine`](super::CartLine)s.
    pub const CART: &str = "cart";
    /// Key for the ids of orders this session created through the widget.
    pub const WIDGET_ORDERS: &str = "widget_orders";
}
