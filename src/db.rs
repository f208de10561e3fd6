//! # Database Module
//!
//! Postgres persistence through sqlx: schema setup, catalogue seeding and the
//! queries behind [`PgStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use sqlx::postgres::PgPool;
use sqlx::Row;
use tracing::{debug, info};

use crate::dialogue::InteractionState;
use crate::errors::StoreError;
use crate::money::{Currency, Money};
use crate::store::{
    Category, CategoryTotal, LedgerStore, MessageContext, MessageContextStore, NewTransaction,
    StoreResult, Transaction, TransactionType, User, DEFAULT_CATALOG,
};

/// Initialize the database schema
pub async fn init_database_schema(pool: &PgPool) -> StoreResult<()> {
    info!("Initializing database schema...");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS app_user (
            id BIGINT PRIMARY KEY,
            locale TEXT NOT NULL DEFAULT 'en',
            currency TEXT NOT NULL,
            timezone TEXT NOT NULL,
            interaction_state TEXT NOT NULL DEFAULT '{\"state\":\"idle\"}',
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS transaction_type (
            id SERIAL PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            multiplier INTEGER NOT NULL,
            reply_text TEXT NOT NULL,
            display_order INTEGER NOT NULL DEFAULT 0
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS category (
            id SERIAL PRIMARY KEY,
            name TEXT NOT NULL,
            transaction_type_id INTEGER NOT NULL REFERENCES transaction_type(id),
            display_order INTEGER NOT NULL DEFAULT 0,
            UNIQUE (name, transaction_type_id)
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS transactions (
            id BIGSERIAL PRIMARY KEY,
            user_id BIGINT NOT NULL REFERENCES app_user(id),
            category_id INTEGER NOT NULL REFERENCES category(id),
            amount BIGINT NOT NULL,
            currency TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            datetime TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS transactions_user_datetime_idx
         ON transactions (user_id, datetime DESC)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS message_context (
            id SERIAL PRIMARY KEY,
            chat_id BIGINT NOT NULL,
            message_id INTEGER NOT NULL,
            message TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS message_context_created_at_idx
         ON message_context (created_at)",
    )
    .execute(pool)
    .await?;

    info!("Database schema initialized successfully");
    Ok(())
}

/// Insert the default transaction types and categories if they are missing
pub async fn seed_catalog(pool: &PgPool) -> StoreResult<()> {
    for (type_order, entry) in DEFAULT_CATALOG.iter().enumerate() {
        let type_id: i32 = sqlx::query_scalar(
            "INSERT INTO transaction_type (name, multiplier, reply_text, display_order)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
             RETURNING id",
        )
        .bind(entry.name)
        .bind(entry.multiplier)
        .bind(entry.reply_text)
        .bind(type_order as i32)
        .fetch_one(pool)
        .await?;

        for (order, name) in entry.categories.iter().enumerate() {
            sqlx::query(
                "INSERT INTO category (name, transaction_type_id, display_order)
                 VALUES ($1, $2, $3)
                 ON CONFLICT (name, transaction_type_id) DO NOTHING",
            )
            .bind(*name)
            .bind(type_id)
            .bind(order as i32)
            .execute(pool)
            .await?;
        }
    }
    info!("Category catalogue seeded");
    Ok(())
}

#[derive(sqlx::FromRow)]
struct MessageContextRow {
    id: i32,
    chat_id: i64,
    message_id: i32,
    message: String,
    created_at: DateTime<Utc>,
}

impl From<MessageContextRow> for MessageContext {
    fn from(row: MessageContextRow) -> Self {
        Self {
            id: row.id,
            chat_id: row.chat_id,
            message_id: row.message_id,
            raw_text: row.message,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    locale: String,
    currency: String,
    timezone: String,
    interaction_state: String,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let currency = row.currency.parse::<Currency>().map_err(StoreError::Corrupt)?;
        let timezone = row
            .timezone
            .parse::<Tz>()
            .map_err(|_| StoreError::Corrupt(format!("timezone {}", row.timezone)))?;
        let interaction_state = serde_json::from_str(&row.interaction_state)
            .map_err(|e| StoreError::Corrupt(format!("interaction state: {e}")))?;
        Ok(Self {
            id: row.id,
            locale: row.locale,
            currency,
            timezone,
            interaction_state,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TransactionTypeRow {
    id: i32,
    name: String,
    multiplier: i32,
    reply_text: String,
}

impl From<TransactionTypeRow> for TransactionType {
    fn from(row: TransactionTypeRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            multiplier: row.multiplier,
            reply_text: row.reply_text,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: i32,
    name: String,
    transaction_type_id: i32,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            transaction_type_id: row.transaction_type_id,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TransactionRow {
    id: i64,
    user_id: i64,
    category_id: i32,
    category_name: String,
    amount: i64,
    currency: String,
    description: String,
    datetime: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = StoreError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let currency = row.currency.parse::<Currency>().map_err(StoreError::Corrupt)?;
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            category_id: row.category_id,
            category_name: row.category_name,
            amount: Money::new(row.amount, currency),
            description: row.description,
            datetime: row.datetime,
        })
    }
}

const TRANSACTION_COLUMNS: &str = "t.id, t.user_id, t.category_id, c.name AS category_name, \
     t.amount, t.currency, t.description, t.datetime";

/// Store a message context and return its id
pub async fn create_message_context(
    pool: &PgPool,
    chat_id: i64,
    message_id: i32,
    raw_text: &str,
) -> StoreResult<i32> {
    let id: i32 = sqlx::query_scalar(
        "INSERT INTO message_context (chat_id, message_id, message)
         VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(chat_id)
    .bind(message_id)
    .bind(raw_text)
    .fetch_one(pool)
    .await?;

    debug!(message_context_id = id, chat_id, "Message context created");
    Ok(id)
}

pub async fn read_message_context(pool: &PgPool, id: i32) -> StoreResult<MessageContext> {
    sqlx::query_as::<_, MessageContextRow>(
        "SELECT id, chat_id, message_id, message, created_at
         FROM message_context WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .map(MessageContext::from)
    .ok_or_else(|| StoreError::not_found("message_context", id))
}

/// Delete a context and return it in one statement
pub async fn take_message_context(pool: &PgPool, id: i32) -> StoreResult<MessageContext> {
    sqlx::query_as::<_, MessageContextRow>(
        "DELETE FROM message_context WHERE id = $1
         RETURNING id, chat_id, message_id, message, created_at",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .map(MessageContext::from)
    .ok_or_else(|| StoreError::not_found("message_context", id))
}

pub async fn delete_message_context(pool: &PgPool, id: i32) -> StoreResult<bool> {
    let rows_affected = sqlx::query("DELETE FROM message_context WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?
        .rows_affected();

    if rows_affected > 0 {
        debug!(message_context_id = id, "Message context deleted");
        Ok(true)
    } else {
        debug!(message_context_id = id, "No message context to delete");
        Ok(false)
    }
}

pub async fn purge_message_contexts(pool: &PgPool, cutoff: DateTime<Utc>) -> StoreResult<u64> {
    let rows_affected = sqlx::query("DELETE FROM message_context WHERE created_at < $1")
        .bind(cutoff)
        .execute(pool)
        .await?
        .rows_affected();
    Ok(rows_affected)
}

pub async fn get_user(pool: &PgPool, user_id: i64) -> StoreResult<Option<User>> {
    sqlx::query_as::<_, UserRow>(
        "SELECT id, locale, currency, timezone, interaction_state FROM app_user WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .map(User::try_from)
    .transpose()
}

pub async fn create_user(pool: &PgPool, user: &User) -> StoreResult<()> {
    let state = serialize_state(&user.interaction_state)?;
    sqlx::query(
        "INSERT INTO app_user (id, locale, currency, timezone, interaction_state)
         VALUES ($1, $2, $3, $4, $5)
         ON CONFLICT (id) DO NOTHING",
    )
    .bind(user.id)
    .bind(&user.locale)
    .bind(user.currency.code())
    .bind(user.timezone.name())
    .bind(state)
    .execute(pool)
    .await?;

    info!(user_id = user.id, "User registered");
    Ok(())
}

pub async fn update_interaction_state(
    pool: &PgPool,
    user_id: i64,
    state: &InteractionState,
) -> StoreResult<()> {
    let rows_affected = sqlx::query("UPDATE app_user SET interaction_state = $1 WHERE id = $2")
        .bind(serialize_state(state)?)
        .bind(user_id)
        .execute(pool)
        .await?
        .rows_affected();

    if rows_affected == 0 {
        return Err(StoreError::not_found("user", user_id));
    }
    Ok(())
}

fn serialize_state(state: &InteractionState) -> StoreResult<String> {
    serde_json::to_string(state).map_err(|e| StoreError::Corrupt(e.to_string()))
}

pub async fn list_transaction_types(pool: &PgPool) -> StoreResult<Vec<TransactionType>> {
    let rows = sqlx::query_as::<_, TransactionTypeRow>(
        "SELECT id, name, multiplier, reply_text FROM transaction_type
         ORDER BY display_order, id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(TransactionType::from).collect())
}

pub async fn get_transaction_type(pool: &PgPool, id: i32) -> StoreResult<TransactionType> {
    sqlx::query_as::<_, TransactionTypeRow>(
        "SELECT id, name, multiplier, reply_text FROM transaction_type WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .map(TransactionType::from)
    .ok_or_else(|| StoreError::not_found("transaction_type", id))
}

pub async fn list_categories(
    pool: &PgPool,
    transaction_type_id: Option<i32>,
) -> StoreResult<Vec<Category>> {
    let rows = sqlx::query_as::<_, CategoryRow>(
        "SELECT c.id, c.name, c.transaction_type_id
         FROM category c JOIN transaction_type tt ON tt.id = c.transaction_type_id
         WHERE $1::INTEGER IS NULL OR c.transaction_type_id = $1
         ORDER BY tt.display_order, c.display_order, c.id",
    )
    .bind(transaction_type_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Category::from).collect())
}

pub async fn get_category(pool: &PgPool, id: i32) -> StoreResult<Category> {
    sqlx::query_as::<_, CategoryRow>(
        "SELECT id, name, transaction_type_id FROM category WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .map(Category::from)
    .ok_or_else(|| StoreError::not_found("category", id))
}

pub async fn create_transaction(pool: &PgPool, tx: &NewTransaction) -> StoreResult<i64> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO transactions (user_id, category_id, amount, currency, description, datetime)
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
    )
    .bind(tx.user_id)
    .bind(tx.category_id)
    .bind(tx.amount.minor)
    .bind(tx.amount.currency.code())
    .bind(&tx.description)
    .bind(tx.datetime)
    .fetch_one(pool)
    .await?;

    info!(user_id = tx.user_id, transaction_id = id, "Transaction created");
    Ok(id)
}

pub async fn get_transaction(pool: &PgPool, id: i64) -> StoreResult<Transaction> {
    let sql = format!(
        "SELECT {TRANSACTION_COLUMNS}
         FROM transactions t JOIN category c ON c.id = t.category_id
         WHERE t.id = $1"
    );
    sqlx::query_as::<_, TransactionRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| StoreError::not_found("transaction", id))?
        .try_into()
}

pub async fn get_latest_transaction(pool: &PgPool, user_id: i64) -> StoreResult<Option<Transaction>> {
    let sql = format!(
        "SELECT {TRANSACTION_COLUMNS}
         FROM transactions t JOIN category c ON c.id = t.category_id
         WHERE t.user_id = $1
         ORDER BY t.datetime DESC, t.id DESC
         LIMIT 1"
    );
    sqlx::query_as::<_, TransactionRow>(&sql)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .map(Transaction::try_from)
        .transpose()
}

pub async fn delete_transaction(pool: &PgPool, user_id: i64, id: i64) -> StoreResult<bool> {
    let rows_affected = sqlx::query("DELETE FROM transactions WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?
        .rows_affected();

    if rows_affected > 0 {
        info!(user_id, transaction_id = id, "Transaction deleted");
        Ok(true)
    } else {
        debug!(user_id, transaction_id = id, "Transaction already gone");
        Ok(false)
    }
}

pub async fn list_transactions(
    pool: &PgPool,
    user_id: i64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    offset: u32,
    limit: u32,
) -> StoreResult<(Vec<Transaction>, u32)> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM transactions
         WHERE user_id = $1 AND datetime >= $2 AND datetime < $3",
    )
    .bind(user_id)
    .bind(start)
    .bind(end)
    .fetch_one(pool)
    .await?;

    let sql = format!(
        "SELECT {TRANSACTION_COLUMNS}
         FROM transactions t JOIN category c ON c.id = t.category_id
         WHERE t.user_id = $1 AND t.datetime >= $2 AND t.datetime < $3
         ORDER BY t.datetime DESC, t.id DESC
         OFFSET $4 LIMIT $5"
    );
    let rows = sqlx::query_as::<_, TransactionRow>(&sql)
        .bind(user_id)
        .bind(start)
        .bind(end)
        .bind(i64::from(offset))
        .bind(i64::from(limit))
        .fetch_all(pool)
        .await?;

    let transactions = rows
        .into_iter()
        .map(Transaction::try_from)
        .collect::<StoreResult<Vec<_>>>()?;
    let total = u32::try_from(total).unwrap_or(u32::MAX);
    Ok((transactions, total))
}

pub async fn category_totals(
    pool: &PgPool,
    user_id: i64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> StoreResult<Vec<CategoryTotal>> {
    let rows = sqlx::query(
        "SELECT c.name AS category_name, SUM(t.amount)::BIGINT AS total
         FROM transactions t JOIN category c ON c.id = t.category_id
         WHERE t.user_id = $1 AND t.datetime >= $2 AND t.datetime < $3
         GROUP BY c.name
         ORDER BY total DESC, c.name",
    )
    .bind(user_id)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| -> StoreResult<CategoryTotal> {
            Ok(CategoryTotal {
                category_name: row.try_get("category_name")?,
                total_minor: row.try_get("total")?,
            })
        })
        .collect()
}

/// Postgres-backed implementation of both store traits
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl MessageContextStore for PgStore {
    async fn create(&self, chat_id: i64, message_id: i32, raw_text: &str) -> StoreResult<i32> {
        create_message_context(&self.pool, chat_id, message_id, raw_text).await
    }

    async fn get(&self, id: i32) -> StoreResult<MessageContext> {
        read_message_context(&self.pool, id).await
    }

    async fn take(&self, id: i32) -> StoreResult<MessageContext> {
        take_message_context(&self.pool, id).await
    }

    async fn delete(&self, id: i32) -> StoreResult<bool> {
        delete_message_context(&self.pool, id).await
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        purge_message_contexts(&self.pool, cutoff).await
    }
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn find_user(&self, user_id: i64) -> StoreResult<Option<User>> {
        get_user(&self.pool, user_id).await
    }

    async fn create_user(&self, user: &User) -> StoreResult<()> {
        create_user(&self.pool, user).await
    }

    async fn set_interaction_state(
        &self,
        user_id: i64,
        state: &InteractionState,
    ) -> StoreResult<()> {
        update_interaction_state(&self.pool, user_id, state).await
    }

    async fn transaction_types(&self) -> StoreResult<Vec<TransactionType>> {
        list_transaction_types(&self.pool).await
    }

    async fn transaction_type(&self, id: i32) -> StoreResult<TransactionType> {
        get_transaction_type(&self.pool, id).await
    }

    async fn categories(&self, transaction_type_id: Option<i32>) -> StoreResult<Vec<Category>> {
        list_categories(&self.pool, transaction_type_id).await
    }

    async fn category(&self, id: i32) -> StoreResult<Category> {
        get_category(&self.pool, id).await
    }

    async fn add_transaction(&self, tx: &NewTransaction) -> StoreResult<i64> {
        create_transaction(&self.pool, tx).await
    }

    async fn transaction(&self, id: i64) -> StoreResult<Transaction> {
        get_transaction(&self.pool, id).await
    }

    async fn latest_transaction(&self, user_id: i64) -> StoreResult<Option<Transaction>> {
        get_latest_transaction(&self.pool, user_id).await
    }

    async fn delete_transaction(&self, user_id: i64, id: i64) -> StoreResult<bool> {
        delete_transaction(&self.pool, user_id, id).await
    }

    async fn list_transactions(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        offset: u32,
        limit: u32,
    ) -> StoreResult<(Vec<Transaction>, u32)> {
        list_transactions(&self.pool, user_id, start, end, offset, limit).await
    }

    async fn totals_by_category(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<CategoryTotal>> {
        category_totals(&self.pool, user_id, start, end).await
    }
}
