//! `PostgreSQL`-backed [`OrderStore`].

use order_ingest_core::{Delivery, Item, Order, OrderStore, Payment, StoreError};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Idempotent DDL for every table this crate reads or writes.
pub const SCHEMA: &str = include_str!("../schema.sql");

/// Order store over four relations: `orders`, `delivery`, `payment` and `items`.
///
/// # Write semantics
///
/// `upsert_order` runs in a single transaction:
/// - the root row is inserted or ignored, so the first `date_created` wins
/// - delivery and payment are replaced on conflict
/// - items are upserted on `(order_uid, rid)`
///
/// Any failure rolls back the whole transaction.
///
/// # Example
///
/// ```no_run
/// use order_ingest_postgres::PostgresOrderStore;
/// use order_ingest_core::OrderStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = PostgresOrderStore::connect("postgres://localhost/orders", 10).await?;
/// store.apply_schema().await?;
/// let recent = store.list_recent_orders(100).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Make one connection attempt: parse the URL, open a pool and ping it.
    ///
    /// A pool that fails the ping is closed before returning. Retrying is up to
    /// the caller.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the URL is malformed, the pool cannot be
    /// opened or the ping fails.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let options: PgConnectOptions = database_url
            .parse()
            .map_err(|e| StoreError::Database(format!("Invalid connection string: {e}")))?;

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to connect: {e}")))?;

        if let Err(e) = sqlx::query("SELECT 1").execute(&pool).await {
            pool.close().await;
            return Err(StoreError::Database(format!("Ping failed: {e}")));
        }

        Ok(Self { pool })
    }

    /// The underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create any missing tables and indexes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if a statement fails.
    pub async fn apply_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to apply schema: {e}")))?;
        Ok(())
    }

    /// Close every connection in the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn write_order(
        tx: &mut Transaction<'_, Postgres>,
        order: &Order,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r"
            INSERT INTO orders (
                order_uid, track_number, entry, locale, internal_signature, customer_id,
                delivery_service, shardkey, sm_id, date_created, oof_shard
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (order_uid) DO NOTHING
            ",
        )
        .bind(&order.order_uid)
        .bind(&order.track_number)
        .bind(&order.entry)
        .bind(&order.locale)
        .bind(&order.internal_signature)
        .bind(&order.customer_id)
        .bind(&order.delivery_service)
        .bind(&order.shard_key)
        .bind(order.sm_id)
        .bind(order.date_created)
        .bind(&order.oof_shard)
        .execute(&mut **tx)
        .await?;

        let delivery = &order.delivery;
        sqlx::query(
            r"
            INSERT INTO delivery (order_uid, name, phone, zip, city, address, region, email)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (order_uid) DO UPDATE
            SET name = EXCLUDED.name, phone = EXCLUDED.phone, zip = EXCLUDED.zip,
                city = EXCLUDED.city, address = EXCLUDED.address,
                region = EXCLUDED.region, email = EXCLUDED.email
            ",
        )
        .bind(&order.order_uid)
        .bind(&delivery.name)
        .bind(&delivery.phone)
        .bind(&delivery.zip)
        .bind(&delivery.city)
        .bind(&delivery.address)
        .bind(&delivery.region)
        .bind(&delivery.email)
        .execute(&mut **tx)
        .await?;

        let payment = &order.payment;
        sqlx::query(
            r"
            INSERT INTO payment (
                order_uid, transaction, request_id, currency, provider, amount,
                payment_dt, bank, delivery_cost, goods_total, custom_fee
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (order_uid) DO UPDATE
            SET transaction = EXCLUDED.transaction, request_id = EXCLUDED.request_id,
                currency = EXCLUDED.currency, provider = EXCLUDED.provider,
                amount = EXCLUDED.amount, payment_dt = EXCLUDED.payment_dt,
                bank = EXCLUDED.bank, delivery_cost = EXCLUDED.delivery_cost,
                goods_total = EXCLUDED.goods_total, custom_fee = EXCLUDED.custom_fee
            ",
        )
        .bind(&order.order_uid)
        .bind(&payment.transaction)
        .bind(&payment.request_id)
        .bind(&payment.currency)
        .bind(&payment.provider)
        .bind(payment.amount)
        .bind(payment.payment_dt)
        .bind(&payment.bank)
        .bind(payment.delivery_cost)
        .bind(payment.goods_total)
        .bind(payment.custom_fee)
        .execute(&mut **tx)
        .await?;

        for item in &order.items {
            sqlx::query(
                r"
                INSERT INTO items (
                    order_uid, chrt_id, track_number, price, rid, name, sale, size,
                    total_price, nm_id, brand, status
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                ON CONFLICT (order_uid, rid) DO UPDATE
                SET chrt_id = EXCLUDED.chrt_id, track_number = EXCLUDED.track_number,
                    price = EXCLUDED.price, name = EXCLUDED.name, sale = EXCLUDED.sale,
                    size = EXCLUDED.size, total_price = EXCLUDED.total_price,
                    nm_id = EXCLUDED.nm_id, brand = EXCLUDED.brand, status = EXCLUDED.status
                ",
            )
            .bind(&order.order_uid)
            .bind(item.chrt_id)
            .bind(&item.track_number)
            .bind(item.price)
            .bind(&item.rid)
            .bind(&item.name)
            .bind(item.sale)
            .bind(&item.size)
            .bind(item.total_price)
            .bind(item.nm_id)
            .bind(&item.brand)
            .bind(item.status)
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }

    fn row_to_order(row: &PgRow) -> Result<Order, sqlx::Error> {
        Ok(Order {
            order_uid: row.try_get("order_uid")?,
            track_number: row.try_get("track_number")?,
            entry: row.try_get("entry")?,
            delivery: Delivery {
                name: row.try_get("d_name")?,
                phone: row.try_get("phone")?,
                zip: row.try_get("zip")?,
                city: row.try_get("city")?,
                address: row.try_get("address")?,
                region: row.try_get("region")?,
                email: row.try_get("email")?,
            },
            payment: Payment {
                transaction: row.try_get("transaction")?,
                request_id: row.try_get("request_id")?,
                currency: row.try_get("currency")?,
                provider: row.try_get("provider")?,
                amount: row.try_get("amount")?,
                payment_dt: row.try_get("payment_dt")?,
                bank: row.try_get("bank")?,
                delivery_cost: row.try_get("delivery_cost")?,
                goods_total: row.try_get("goods_total")?,
                custom_fee: row.try_get("custom_fee")?,
            },
            items: Vec::new(),
            locale: row.try_get("locale")?,
            internal_signature: row.try_get("internal_signature")?,
            customer_id: row.try_get("customer_id")?,
            delivery_service: row.try_get("delivery_service")?,
            shard_key: row.try_get("shardkey")?,
            sm_id: row.try_get("sm_id")?,
            date_created: row.try_get("date_created")?,
            oof_shard: row.try_get("oof_shard")?,
        })
    }

    fn row_to_item(row: &PgRow) -> Result<Item, sqlx::Error> {
        Ok(Item {
            chrt_id: row.try_get("chrt_id")?,
            track_number: row.try_get("track_number")?,
            price: row.try_get("price")?,
            rid: row.try_get("rid")?,
            name: row.try_get("name")?,
            sale: row.try_get("sale")?,
            size: row.try_get("size")?,
            total_price: row.try_get("total_price")?,
            nm_id: row.try_get("nm_id")?,
            brand: row.try_get("brand")?,
            status: row.try_get("status")?,
        })
    }
}

impl OrderStore for PostgresOrderStore {
    fn upsert_order<'a>(
        &'a self,
        order: &'a Order,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| StoreError::Database(format!("Failed to start transaction: {e}")))?;

            // Dropping `tx` on error rolls the transaction back.
            Self::write_order(&mut tx, order).await.map_err(|e| {
                StoreError::Database(format!("Failed to upsert order {}: {e}", order.order_uid))
            })?;

            tx.commit()
                .await
                .map_err(|e| StoreError::Database(format!("Failed to commit transaction: {e}")))?;

            tracing::debug!(
                order_uid = %order.order_uid,
                items = order.items.len(),
                "Order upserted"
            );
            Ok(())
        })
    }

    fn get_order<'a>(
        &'a self,
        order_uid: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Order, StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let row = sqlx::query(
                r"
                SELECT
                    o.order_uid, o.track_number, o.entry, o.locale, o.internal_signature,
                    o.customer_id, o.delivery_service, o.shardkey, o.sm_id, o.date_created,
                    o.oof_shard,
                    d.name AS d_name, d.phone, d.zip, d.city, d.address, d.region, d.email,
                    p.transaction, p.request_id, p.currency, p.provider, p.amount,
                    p.payment_dt, p.bank, p.delivery_cost, p.goods_total, p.custom_fee
                FROM orders o
                JOIN delivery d ON o.order_uid = d.order_uid
                JOIN payment p ON o.order_uid = p.order_uid
                WHERE o.order_uid = $1
                ",
            )
            .bind(order_uid)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to load order: {e}")))?
            .ok_or_else(|| StoreError::NotFound(order_uid.to_string()))?;

            let mut order = Self::row_to_order(&row)
                .map_err(|e| StoreError::Database(format!("Failed to decode order: {e}")))?;

            let item_rows = sqlx::query(
                r"
                SELECT chrt_id, track_number, price, rid, name, sale, size,
                       total_price, nm_id, brand, status
                FROM items
                WHERE order_uid = $1
                ORDER BY id ASC
                ",
            )
            .bind(order_uid)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to load items: {e}")))?;

            order.items = item_rows
                .iter()
                .map(Self::row_to_item)
                .collect::<Result<_, _>>()
                .map_err(|e| StoreError::Database(format!("Failed to decode item: {e}")))?;

            Ok(order)
        })
    }

    fn list_recent_orders(
        &self,
        limit: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Order>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let order_uids: Vec<String> = sqlx::query_scalar(
                r"
                SELECT order_uid
                FROM orders
                ORDER BY date_created DESC
                LIMIT $1
                ",
            )
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to list recent orders: {e}")))?;

            let mut orders = Vec::with_capacity(order_uids.len());
            for order_uid in order_uids {
                match self.get_order(&order_uid).await {
                    Ok(order) => orders.push(order),
                    Err(StoreError::NotFound(_)) => {
                        tracing::warn!(order_uid = %order_uid, "Skipping incomplete order");
                    }
                    Err(e) => return Err(e),
                }
            }
            Ok(orders)
        })
    }
}
