//! Order repository.
//!
//! Every write that touches items also rewrites the order total inside the
//! same transaction, so `order.total` always equals the sum of its items.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};

use nudge_core::{OrderId, OrderItemId, OrderStatus, UserId};

use super::RepositoryError;
use crate::models::{
    NewOrder, NewOrderItem, Order, OrderItem, OrderOwner, OrderWithItems, ShippingInfo,
};

const ORDER_COLUMNS: &str = "o.id, o.user_id, o.customer_email, o.customer_name, o.total, \
                             o.status, o.payment_method, o.payment_reference, o.payment_proof, \
                             o.additional_info, o.created_at, o.updated_at";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i32,
    user_id: Option<i32>,
    customer_email: Option<String>,
    customer_name: Option<String>,
    total: Decimal,
    status: OrderStatus,
    payment_method: Option<String>,
    payment_reference: Option<String>,
    payment_proof: Option<String>,
    additional_info: Option<Json<serde_json::Value>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderWithOwnerRow {
    #[sqlx(flatten)]
    order: OrderRow,
    owner_id: Option<i32>,
    owner_email: Option<String>,
    owner_name: Option<String>,
    owner_address: Option<String>,
    owner_city: Option<String>,
    owner_department: Option<String>,
    owner_whatsapp_number: Option<String>,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: i32,
    order_id: i32,
    name: String,
    price: Decimal,
}

/// Order count and revenue for one status.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusTotals {
    pub status: OrderStatus,
    pub count: i64,
    pub revenue: Decimal,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: OrderId::new(row.id),
            user_id: row.user_id.map(UserId::new),
            customer_email: row.customer_email,
            customer_name: row.customer_name,
            total: row.total,
            status: row.status,
            payment_method: row.payment_method,
            payment_reference: row.payment_reference,
            payment_proof: row.payment_proof,
            additional_info: row.additional_info.map(|Json(v)| v),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: OrderItemId::new(row.id),
            order_id: OrderId::new(row.order_id),
            name: row.name,
            price: row.price,
        }
    }
}

impl OrderWithOwnerRow {
    fn owner(&self) -> Option<OrderOwner> {
        let (Some(id), Some(email)) = (self.owner_id, self.owner_email.clone()) else {
            return None;
        };
        Some(OrderOwner {
            id: UserId::new(id),
            email,
            name: self.owner_name.clone(),
            address: self.owner_address.clone(),
            city: self.owner_city.clone(),
            department: self.owner_department.clone(),
            whatsapp_number: self.owner_whatsapp_number.clone(),
        })
    }
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert an order and its items in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails; nothing is
    /// written in that case.
    pub async fn create(&self, new: &NewOrder) -> Result<OrderWithItems, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "INSERT INTO storefront.order AS o \
                 (user_id, customer_email, customer_name, total, status, payment_method, \
                  payment_reference, payment_proof, additional_info) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {ORDER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(new.user_id.map(|id| id.as_i32()))
            .bind(new.customer_email.as_deref())
            .bind(new.customer_name.as_deref())
            .bind(new.total())
            .bind(new.status)
            .bind(new.payment_method.as_deref())
            .bind(new.payment_reference.as_deref())
            .bind(new.payment_proof.as_deref())
            .bind(new.additional_info.clone().map(Json))
            .fetch_one(&mut *tx)
            .await?;

        let order = Order::from(row);
        let items = insert_items(&mut tx, order.id, &new.items).await?;
        tx.commit().await?;

        Ok(OrderWithItems {
            order,
            items,
            user: None,
        })
    }

    /// Get an order by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM storefront.order o WHERE o.id = $1");
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id.as_i32())
            .fetch_optional(self.pool)
            .await?;
        Ok(row.map(Order::from))
    }

    /// Orders placed by one user, newest first, with items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<OrderWithItems>, RepositoryError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.order o \
             WHERE o.user_id = $1 ORDER BY o.created_at DESC, o.id DESC"
        );
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(user_id.as_i32())
            .fetch_all(self.pool)
            .await?;

        let orders: Vec<Order> = rows.into_iter().map(Order::from).collect();
        let mut items = self.items_for(&orders).await?;

        Ok(orders
            .into_iter()
            .map(|order| OrderWithItems {
                items: items.remove(&order.id).unwrap_or_default(),
                order,
                user: None,
            })
            .collect())
    }

    /// Every order, newest first, with items and the owning account.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_all(&self) -> Result<Vec<OrderWithItems>, RepositoryError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS}, \
                    u.id AS owner_id, u.email AS owner_email, u.name AS owner_name, \
                    u.address AS owner_address, u.city AS owner_city, \
                    u.department AS owner_department, \
                    u.whatsapp_number AS owner_whatsapp_number \
             FROM storefront.order o \
             LEFT JOIN storefront.user u ON u.id = o.user_id \
             ORDER BY o.created_at DESC, o.id DESC"
        );
        let rows = sqlx::query_as::<_, OrderWithOwnerRow>(&sql)
            .fetch_all(self.pool)
            .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let owner = row.owner();
            orders.push((Order::from(row.order), owner));
        }

        let plain: Vec<&Order> = orders.iter().map(|(o, _)| o).collect();
        let mut items = self.items_for_refs(&plain).await?;

        Ok(orders
            .into_iter()
            .map(|(order, user)| OrderWithItems {
                items: items.remove(&order.id).unwrap_or_default(),
                order,
                user,
            })
            .collect())
    }

    /// Append items to an order and recompute its total.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn add_items(
        &self,
        id: OrderId,
        items: &[NewOrderItem],
    ) -> Result<OrderWithItems, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        lock_status(&mut tx, id).await?;
        insert_items(&mut tx, id, items).await?;

        let sql = format!(
            "UPDATE storefront.order AS o \
             SET total = (SELECT COALESCE(SUM(price), 0) FROM storefront.order_item \
                          WHERE order_id = $1), \
                 updated_at = NOW() \
             WHERE o.id = $1 \
             RETURNING {ORDER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id.as_i32())
            .fetch_one(&mut *tx)
            .await?;

        let all_items = sqlx::query_as::<_, OrderItemRow>(
            "SELECT id, order_id, name, price FROM storefront.order_item \
             WHERE order_id = $1 ORDER BY id",
        )
        .bind(id.as_i32())
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(OrderWithItems {
            order: Order::from(row),
            items: all_items.into_iter().map(OrderItem::from).collect(),
            user: None,
        })
    }

    /// Store the customer's name and shipping details and move the order to
    /// `shipped`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist and
    /// `RepositoryError::Conflict` if `shipped` is not a forward move.
    pub async fn complete(
        &self,
        id: OrderId,
        customer_name: &str,
        shipping: &ShippingInfo,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let current = lock_status(&mut tx, id).await?;
        check_transition(current, OrderStatus::Shipped)?;

        let info = serde_json::to_value(shipping)
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;
        let sql = format!(
            "UPDATE storefront.order AS o \
             SET customer_name = $2, additional_info = $3, status = $4, updated_at = NOW() \
             WHERE o.id = $1 \
             RETURNING {ORDER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id.as_i32())
            .bind(customer_name)
            .bind(Json(info))
            .bind(OrderStatus::Shipped)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Order::from(row))
    }

    /// Move an order to `next`, which must be later in the lifecycle.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` or `RepositoryError::Conflict`.
    pub async fn update_status(
        &self,
        id: OrderId,
        next: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let current = lock_status(&mut tx, id).await?;
        check_transition(current, next)?;

        let sql = format!(
            "UPDATE storefront.order AS o SET status = $2, updated_at = NOW() \
             WHERE o.id = $1 RETURNING {ORDER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id.as_i32())
            .bind(next)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Order::from(row))
    }

    /// Order count and revenue grouped by status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn totals_by_status(&self) -> Result<Vec<StatusTotals>, RepositoryError> {
        let rows = sqlx::query_as::<_, StatusTotals>(
            "SELECT status, COUNT(*) AS count, COALESCE(SUM(total), 0) AS revenue \
             FROM storefront.order GROUP BY status ORDER BY status",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    async fn items_for(
        &self,
        orders: &[Order],
    ) -> Result<HashMap<OrderId, Vec<OrderItem>>, RepositoryError> {
        let refs: Vec<&Order> = orders.iter().collect();
        self.items_for_refs(&refs).await
    }

    async fn items_for_refs(
        &self,
        orders: &[&Order],
    ) -> Result<HashMap<OrderId, Vec<OrderItem>>, RepositoryError> {
        let mut grouped: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        if orders.is_empty() {
            return Ok(grouped);
        }

        let ids: Vec<i32> = orders.iter().map(|o| o.id.as_i32()).collect();
        let rows = sqlx::query_as::<_, OrderItemRow>(
            "SELECT id, order_id, name, price FROM storefront.order_item \
             WHERE order_id = ANY($1) ORDER BY id",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        for row in rows {
            let item = OrderItem::from(row);
            grouped.entry(item.order_id).or_default().push(item);
        }
        Ok(grouped)
    }
}

async fn insert_items(
    tx: &mut Transaction<'_, Postgres>,
    order_id: OrderId,
    items: &[NewOrderItem],
) -> Result<Vec<OrderItem>, RepositoryError> {
    let mut inserted = Vec::with_capacity(items.len());
    for item in items {
        let row = sqlx::query_as::<_, OrderItemRow>(
            "INSERT INTO storefront.order_item (order_id, name, price) \
             VALUES ($1, $2, $3) RETURNING id, order_id, name, price",
        )
        .bind(order_id.as_i32())
        .bind(&item.name)
        .bind(item.price)
        .fetch_one(&mut **tx)
        .await?;
        inserted.push(OrderItem::from(row));
    }
    Ok(inserted)
}

/// Lock the order row for the rest of the transaction and return its status.
async fn lock_status(
    tx: &mut Transaction<'_, Postgres>,
    id: OrderId,
) -> Result<OrderStatus, RepositoryError> {
    let status: Option<OrderStatus> =
        sqlx::query_scalar("SELECT status FROM storefront.order WHERE id = $1 FOR UPDATE")
            .bind(id.as_i32())
            .fetch_optional(&mut **tx)
            .await?;
    status.ok_or(RepositoryError::NotFound)
}

fn check_transition(current: OrderStatus, next: OrderStatus) -> Result<(), RepositoryError> {
    if current.can_transition_to(next) {
        Ok(())
    } else {
        Err(RepositoryError::Conflict(format!(
            "cannot move order from {current} to {next}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_transition() {
        assert!(check_transition(OrderStatus::Confirmed, OrderStatus::Shipped).is_ok());
        assert!(matches!(
            check_transition(OrderStatus::Shipped, OrderStatus::Shipped),
            Err(RepositoryError::Conflict(_))
        ));
        assert!(matches!(
            check_transition(OrderStatus::Completed, OrderStatus::Shipped),
            Err(RepositoryError::Conflict(_))
        ));
    }
}
