use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::{StreamExt, TryStreamExt};
use serde_json::Value;
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    ConditionalOutcome, Item, Mutation, Precondition, Result, StoreError, store::KvStore,
};

/// Attempts for a conditional insert that races another insert of the same key.
const MAX_INSERT_ATTEMPTS: usize = 3;

/// PostgreSQL-backed key-value store.
///
/// Conditional updates lock the row with `SELECT ... FOR UPDATE` and write it
/// back inside the same transaction, so concurrent callers on one key are
/// serialized by the database rather than by the process.
#[derive(Clone)]
pub struct PostgresKvStore {
    pool: PgPool,
}

impl PostgresKvStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_item(row: PgRow) -> Result<Item> {
        Ok(Item {
            key: row.try_get("key")?,
            value: row.try_get("value")?,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        })
    }
}

#[async_trait]
impl KvStore for PostgresKvStore {
    async fn get(&self, key: &str) -> Result<Option<Item>> {
        let row = sqlx::query("SELECT key, value, updated_at FROM kv_items WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_item).transpose()
    }

    async fn put(&self, key: &str, value: Value) -> Result<Item> {
        let row = sqlx::query(
            r#"
            INSERT INTO kv_items (key, value, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (key) DO UPDATE SET
                value = EXCLUDED.value,
                updated_at = EXCLUDED.updated_at
            RETURNING key, value, updated_at
            "#,
        )
        .bind(key)
        .bind(&value)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_item(row)
    }

    #[tracing::instrument(skip(self, precondition, mutation))]
    async fn conditional_update(
        &self,
        key: &str,
        precondition: Precondition,
        mutation: Mutation,
    ) -> Result<ConditionalOutcome> {
        for attempt in 1..=MAX_INSERT_ATTEMPTS {
            let mut tx = self.pool.begin().await?;

            // Row lock: concurrent updates of this key queue here until commit.
            let current = sqlx::query(
                "SELECT key, value, updated_at FROM kv_items WHERE key = $1 FOR UPDATE",
            )
            .bind(key)
            .fetch_optional(&mut *tx)
            .await?
            .map(Self::row_to_item)
            .transpose()?;

            if !precondition.holds(current.as_ref().map(|item| &item.value)) {
                tx.rollback().await?;
                return Ok(ConditionalOutcome::PreconditionFailed { current });
            }

            let value = mutation.apply(key, current.as_ref().map(|item| &item.value))?;
            let now = Utc::now();

            let written = if current.is_some() {
                sqlx::query(
                    r#"
                    UPDATE kv_items SET value = $2, updated_at = $3
                    WHERE key = $1
                    RETURNING key, value, updated_at
                    "#,
                )
                .bind(key)
                .bind(&value)
                .bind(now)
                .fetch_optional(&mut *tx)
                .await?
            } else {
                // Nothing to lock for an absent key; the primary key arbitrates
                // between racing inserts.
                sqlx::query(
                    r#"
                    INSERT INTO kv_items (key, value, updated_at)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (key) DO NOTHING
                    RETURNING key, value, updated_at
                    "#,
                )
                .bind(key)
                .bind(&value)
                .bind(now)
                .fetch_optional(&mut *tx)
                .await?
            };

            match written {
                Some(row) => {
                    tx.commit().await?;
                    return Ok(ConditionalOutcome::Applied(Self::row_to_item(row)?));
                }
                None => {
                    tx.rollback().await?;
                    metrics::counter!("kv_conditional_insert_conflicts_total").increment(1);
                    tracing::debug!(key, attempt, "conditional insert lost race, retrying");
                }
            }
        }

        Err(StoreError::Unavailable(format!(
            "conditional update on '{key}' kept conflicting after {MAX_INSERT_ATTEMPTS} attempts"
        )))
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<Item>> {
        sqlx::query(
            r#"
            SELECT key, value, updated_at
            FROM kv_items
            WHERE starts_with(key, $1)
            ORDER BY key ASC
            "#,
        )
        .bind(prefix)
        .fetch(&self.pool)
        .map(|result| match result {
            Ok(row) => Self::row_to_item(row),
            Err(e) => Err(StoreError::Database(e)),
        })
        .try_collect()
        .await
    }
}
