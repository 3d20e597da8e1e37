use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    Cart, CartId, CartItem, Money, Order, OrderId, OrderItem, OrderStatus, PaymentStatus, Product,
    ProductId, UserId,
};
use sqlx::{
    PgPool, Postgres, Row,
    postgres::{PgPoolOptions, PgRow},
};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    store::{Store, Transaction},
};

const ORDER_COLUMNS: &str =
    "id, user_id, created_at, status, payment_status, total_cents, payment_ref, failure_reason";

/// PostgreSQL-backed store implementation.
///
/// Stock changes are single conditional `UPDATE` statements, so concurrent
/// debits of one product serialize on its row. Carts and orders are locked
/// one row at a time with `SELECT ... FOR UPDATE`.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a new pool to `url`.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!("database migrations applied");
        Ok(())
    }
}

#[async_trait]
impl Store for PostgresStore {
    type Tx = PgTransaction;

    async fn begin(&self) -> Result<Self::Tx> {
        let tx = self.pool.begin().await?;
        Ok(PgTransaction { tx })
    }
}

/// Transaction over a [`PostgresStore`]. Rolled back on drop unless committed.
pub struct PgTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

impl PgTransaction {
    async fn load_cart(&mut self, user_id: UserId, lock: bool) -> Result<Option<Cart>> {
        let sql = if lock {
            "SELECT id, user_id, created_at FROM carts WHERE user_id = $1 FOR UPDATE"
        } else {
            "SELECT id, user_id, created_at FROM carts WHERE user_id = $1"
        };

        let row: Option<PgRow> = sqlx::query(sql)
            .bind(user_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut cart = Cart {
            id: CartId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            items: Vec::new(),
        };

        let rows = sqlx::query(
            r#"
            SELECT cart_id, product_id, quantity
            FROM cart_items
            WHERE cart_id = $1
            ORDER BY line_no ASC
            "#,
        )
        .bind(cart.id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;

        cart.items = rows
            .into_iter()
            .map(row_to_cart_item)
            .collect::<Result<_>>()?;

        Ok(Some(cart))
    }

    async fn load_order_items(&mut self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        let rows = sqlx::query(
            r#"
            SELECT order_id, product_id, quantity, unit_price_cents
            FROM order_items
            WHERE order_id = $1
            ORDER BY line_no ASC
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(row_to_order_item).collect()
    }

    async fn hydrate_order(&mut self, row: PgRow) -> Result<Order> {
        let id = OrderId::from_uuid(row.try_get::<Uuid, _>("id")?);
        let items = self.load_order_items(id).await?;
        row_to_order(&row, items)
    }
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn product(&mut self, id: &ProductId) -> Result<Option<Product>> {
        let row: Option<PgRow> =
            sqlx::query("SELECT id, name, price_cents, stock FROM products WHERE id = $1")
                .bind(id.as_str())
                .fetch_optional(&mut *self.tx)
                .await?;

        row.map(row_to_product).transpose()
    }

    async fn upsert_product(&mut self, product: &Product) -> Result<()> {
        crate::store::check_product(product)?;
        sqlx::query(
            r#"
            INSERT INTO products (id, name, price_cents, stock)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                price_cents = EXCLUDED.price_cents,
                stock = EXCLUDED.stock
            "#,
        )
        .bind(product.id.as_str())
        .bind(&product.name)
        .bind(product.price.cents())
        .bind(i64::from(product.stock))
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn debit_stock(&mut self, id: &ProductId, quantity: u32) -> Result<Option<u32>> {
        let remaining: Option<i64> = sqlx::query_scalar(
            "UPDATE products SET stock = stock - $2 WHERE id = $1 AND stock >= $2 RETURNING stock",
        )
        .bind(id.as_str())
        .bind(i64::from(quantity))
        .fetch_optional(&mut *self.tx)
        .await?;

        remaining
            .map(|stock| to_u32(stock, "product", "stock"))
            .transpose()
    }

    async fn credit_stock(&mut self, id: &ProductId, quantity: u32) -> Result<Option<u32>> {
        let stock: Option<i64> = sqlx::query_scalar(
            "UPDATE products SET stock = stock + $2 WHERE id = $1 RETURNING stock",
        )
        .bind(id.as_str())
        .bind(i64::from(quantity))
        .fetch_optional(&mut *self.tx)
        .await?;

        stock
            .map(|stock| to_u32(stock, "product", "stock"))
            .transpose()
    }

    async fn cart_by_user(&mut self, user_id: UserId) -> Result<Option<Cart>> {
        self.load_cart(user_id, false).await
    }

    async fn lock_cart_by_user(&mut self, user_id: UserId) -> Result<Option<Cart>> {
        self.load_cart(user_id, true).await
    }

    async fn open_cart(&mut self, user_id: UserId, now: DateTime<Utc>) -> Result<Cart> {
        // A concurrent creator for the same user wins the unique constraint;
        // either way exactly one cart row exists afterwards.
        sqlx::query(
            r#"
            INSERT INTO carts (id, user_id, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(CartId::new().as_uuid())
        .bind(user_id.as_uuid())
        .bind(now)
        .execute(&mut *self.tx)
        .await?;

        self.load_cart(user_id, false)
            .await?
            .ok_or_else(|| StoreError::Corrupt {
                entity: "cart",
                reason: format!("cart for user {user_id} vanished after insert"),
            })
    }

    async fn add_cart_item(
        &mut self,
        cart_id: CartId,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<CartItem> {
        let row = sqlx::query(
            r#"
            INSERT INTO cart_items (cart_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (cart_id, product_id) DO UPDATE SET
                quantity = cart_items.quantity + EXCLUDED.quantity
            RETURNING cart_id, product_id, quantity
            "#,
        )
        .bind(cart_id.as_uuid())
        .bind(product_id.as_str())
        .bind(i64::from(quantity))
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            // The cart row was deleted by a checkout that held its lock.
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_foreign_key_violation()
            {
                return StoreError::Conflict {
                    entity: "cart",
                    reason: format!("cart {cart_id} no longer exists"),
                };
            }
            StoreError::Database(e)
        })?;

        row_to_cart_item(row)
    }

    async fn delete_cart(&mut self, cart_id: CartId, user_id: UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM carts WHERE id = $1 AND user_id = $2")
            .bind(cart_id.as_uuid())
            .bind(user_id.as_uuid())
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, created_at, status, payment_status, total_cents, payment_ref, failure_reason)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_uuid())
        .bind(order.created_at)
        .bind(order.status().as_str())
        .bind(order.payment_status().as_str())
        .bind(order.total().cents())
        .bind(order.payment_ref())
        .bind(order.failure_reason())
        .execute(&mut *self.tx)
        .await?;

        for (line_no, item) in order.items().iter().enumerate() {
            let line_no = i32::try_from(line_no).map_err(|e| StoreError::Corrupt {
                entity: "order_item",
                reason: e.to_string(),
            })?;

            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, line_no, product_id, quantity, unit_price_cents)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(order.id.as_uuid())
            .bind(line_no)
            .bind(item.product_id.as_str())
            .bind(i64::from(item.quantity))
            .bind(item.unit_price.cents())
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(())
    }

    async fn order(&mut self, id: OrderId) -> Result<Option<Order>> {
        let row: Option<PgRow> =
            sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
                .bind(id.as_uuid())
                .fetch_optional(&mut *self.tx)
                .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate_order(row).await?)),
            None => Ok(None),
        }
    }

    async fn orders_by_user(&mut self, user_id: UserId) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at ASC"
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(self.hydrate_order(row).await?);
        }
        Ok(orders)
    }

    async fn lock_order_by_payment_ref(&mut self, payment_ref: &str) -> Result<Option<Order>> {
        let row: Option<PgRow> = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE payment_ref = $1 FOR UPDATE"
        ))
        .bind(payment_ref)
        .fetch_optional(&mut *self.tx)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate_order(row).await?)),
            None => Ok(None),
        }
    }

    async fn update_order_status(&mut self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, payment_status = $3, failure_reason = $4
            WHERE id = $1
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.status().as_str())
        .bind(order.payment_status().as_str())
        .bind(order.failure_reason())
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

fn to_u32(value: i64, entity: &'static str, column: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt {
        entity,
        reason: format!("{column} out of range: {value}"),
    })
}

fn row_to_product(row: PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::new(row.try_get::<String, _>("id")?),
        name: row.try_get("name")?,
        price: Money::from_cents(row.try_get("price_cents")?),
        stock: to_u32(row.try_get("stock")?, "product", "stock")?,
    })
}

fn row_to_cart_item(row: PgRow) -> Result<CartItem> {
    Ok(CartItem {
        cart_id: CartId::from_uuid(row.try_get::<Uuid, _>("cart_id")?),
        product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
        quantity: to_u32(row.try_get("quantity")?, "cart_item", "quantity")?,
    })
}

fn row_to_order_item(row: PgRow) -> Result<OrderItem> {
    Ok(OrderItem {
        order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
        quantity: to_u32(row.try_get("quantity")?, "order_item", "quantity")?,
        unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
    })
}

fn row_to_order(row: &PgRow, items: Vec<OrderItem>) -> Result<Order> {
    let corrupt = |e: domain::ParseStatusError| StoreError::Corrupt {
        entity: "order",
        reason: e.to_string(),
    };

    let status: OrderStatus = row
        .try_get::<String, _>("status")?
        .parse()
        .map_err(corrupt)?;
    let payment_status: PaymentStatus = row
        .try_get::<String, _>("payment_status")?
        .parse()
        .map_err(corrupt)?;

    Ok(Order::restore(
        OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
        UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
        row.try_get::<DateTime<Utc>, _>("created_at")?,
        status,
        payment_status,
        Money::from_cents(row.try_get("total_cents")?),
        row.try_get("payment_ref")?,
        row.try_get("failure_reason")?,
        items,
    ))
}
