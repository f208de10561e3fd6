//! # Store Module
//!
//! Entities and the storage traits the bot depends on. [`crate::db::PgStore`]
//! is the production implementation; [`crate::memory_store::InMemoryStore`]
//! backs tests and database-less runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::dialogue::InteractionState;
use crate::errors::StoreError;
use crate::money::{Currency, Money};

pub type StoreResult<T> = Result<T, StoreError>;

/// Raw text of a message, kept until a button press completes or cancels it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageContext {
    pub id: i32,
    pub chat_id: i64,
    pub message_id: i32,
    pub raw_text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub locale: String,
    pub currency: Currency,
    pub timezone: Tz,
    pub interaction_state: InteractionState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionType {
    pub id: i32,
    pub name: String,
    /// Direction of money flow: -1 for expenses, 1 for income
    pub multiplier: i32,
    /// Confirmation template with `{amount}` and `{category}` placeholders
    pub reply_text: String,
}

impl TransactionType {
    pub fn format_reply(&self, amount: &Money, category: &str) -> String {
        self.reply_text
            .replace("{amount}", &amount.to_string())
            .replace("{category}", category)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: i32,
    pub name: String,
    pub transaction_type_id: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub user_id: i64,
    pub category_id: i32,
    pub amount: Money,
    pub description: String,
    pub datetime: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    pub category_id: i32,
    pub category_name: String,
    pub amount: Money,
    pub description: String,
    pub datetime: DateTime<Utc>,
}

/// Sum of one category's amounts within a period
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTotal {
    pub category_name: String,
    pub total_minor: i64,
}

/// Seed data: transaction types and their categories
pub struct CatalogEntry {
    pub name: &'static str,
    pub multiplier: i32,
    pub reply_text: &'static str,
    pub categories: &'static [&'static str],
}

pub const DEFAULT_CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        name: "Expense",
        multiplier: -1,
        reply_text: "Spent {amount} on {category}",
        categories: &[
            "Food",
            "Transport",
            "Groceries",
            "Shopping",
            "Bills",
            "Entertainment",
            "Health",
            "Travel",
            "Others",
        ],
    },
    CatalogEntry {
        name: "Income",
        multiplier: 1,
        reply_text: "Received {amount} from {category}",
        categories: &["Salary", "Gift", "Investment", "Other income"],
    },
];

/// Short-lived message contexts referenced from callback data
#[async_trait]
pub trait MessageContextStore: Send + Sync {
    async fn create(&self, chat_id: i64, message_id: i32, raw_text: &str) -> StoreResult<i32>;

    /// Fails with `NotFound` once the context is consumed or purged
    async fn get(&self, id: i32) -> StoreResult<MessageContext>;

    /// Read and delete in one step; a concurrent second caller gets `NotFound`
    async fn take(&self, id: i32) -> StoreResult<MessageContext>;

    /// Idempotent. Returns `false` when nothing was deleted.
    async fn delete(&self, id: i32) -> StoreResult<bool>;

    /// Remove contexts created before `cutoff`, returning how many went
    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> StoreResult<u64>;
}

/// Users, the category catalogue and transactions
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn find_user(&self, user_id: i64) -> StoreResult<Option<User>>;

    async fn create_user(&self, user: &User) -> StoreResult<()>;

    async fn set_interaction_state(
        &self,
        user_id: i64,
        state: &InteractionState,
    ) -> StoreResult<()>;

    async fn transaction_types(&self) -> StoreResult<Vec<TransactionType>>;

    async fn transaction_type(&self, id: i32) -> StoreResult<TransactionType>;

    /// Categories in display order, optionally restricted to one transaction type
    async fn categories(&self, transaction_type_id: Option<i32>) -> StoreResult<Vec<Category>>;

    async fn category(&self, id: i32) -> StoreResult<Category>;

    async fn add_transaction(&self, tx: &NewTransaction) -> StoreResult<i64>;

    async fn transaction(&self, id: i64) -> StoreResult<Transaction>;

    async fn latest_transaction(&self, user_id: i64) -> StoreResult<Option<Transaction>>;

    /// Idempotent. Returns `false` when the transaction was already gone.
    async fn delete_transaction(&self, user_id: i64, id: i64) -> StoreResult<bool>;

    /// Newest-first page of transactions in `[start, end)` plus the total count
    async fn list_transactions(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        offset: u32,
        limit: u32,
    ) -> StoreResult<(Vec<Transaction>, u32)>;

    /// Per-category sums in `[start, end)`, largest first
    async fn totals_by_category(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<CategoryTotal>>;
}

/// Everything the dialogue manager needs from storage
pub trait Store: MessageContextStore + LedgerStore {}

impl<T: MessageContextStore + LedgerStore> Store for T {}
