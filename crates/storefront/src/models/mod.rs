//! Domain models for storefront.

pub mod order;
pub mod session;
pub mod user;

pub use order::{NewOrder, NewOrderItem, Order, OrderItem, OrderOwner, OrderWithItems, ShippingInfo};
pub use session::{CartLine, keys as session_keys};
pub use user::{User, UserProfile};
