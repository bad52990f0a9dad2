//! Order domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use nudge_core::{OrderId, OrderItemId, OrderStatus, UserId, sum_prices};

/// A stored order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: Option<UserId>,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub total: Decimal,
    pub status: OrderStatus,
    pub payment_method: Option<String>,
    /// Order id assigned by the payment provider.
    pub payment_reference: Option<String>,
    /// URL of an uploaded payment receipt.
    pub payment_proof: Option<String>,
    pub additional_info: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line on an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub name: String,
    pub price: Decimal,
}

/// Contact details of the account that owns an order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderOwner {
    pub id: UserId,
    pub email: String,
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub department: Option<String>,
    pub whatsapp_number: Option<String>,
}

/// An order together with its items and, for admin views, its owner.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<OrderOwner>,
}

/// An item to insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub name: String,
    pub price: Decimal,
}

/// An order to insert. The total is always derived from `items`.
#[derive(Debug, Clone, Default)]
pub struct NewOrder {
    pub user_id: Option<UserId>,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub status: OrderStatus,
    pub payment_method: Option<String>,
    pub payment_reference: Option<String>,
    pub payment_proof: Option<String>,
    pub additional_info: Option<serde_json::Value>,
    pub items: Vec<NewOrderItem>,
}

impl NewOrder {
    #[must_use]
    pub fn total(&self) -> Decimal {
        sum_prices(self.items.iter().map(|item| item.price))
    }
}

/// Shipping details collected after payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingInfo {
    pub address: String,
    pub city: String,
    pub department: String,
    pub whatsapp_number: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_new_order_total_is_item_sum() {
        let order = NewOrder {
            items: vec![
                NewOrderItem {
                    name: "Classic".to_string(),
                    price: Decimal::from_str("29.90").unwrap(),
                },
                NewOrderItem {
                    name: "Mini".to_string(),
                    price: Decimal::from_str("14.90").unwrap(),
                },
            ],
            ..NewOrder::default()
        };
        assert_eq!(order.total(), Decimal::from_str("44.80").unwrap());
    }

    #[test]
    fn test_shipping_info_camel_case() {
        let info = ShippingInfo {
            address: "Calle 1".to_string(),
            city: "Bogota".to_string(),
            department: "Cundinamarca".to_string(),
            whatsapp_number: "+57 300".to_string(),
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["whatsappNumber"], "+57 300");
    }
}
