//! In-process store used by tests and when no `DATABASE_URL` is configured.
//! Data lives only as long as the process.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::dialogue::InteractionState;
use crate::errors::StoreError;
use crate::store::{
    Category, CategoryTotal, LedgerStore, MessageContext, MessageContextStore, NewTransaction,
    StoreResult, Transaction, TransactionType, User, DEFAULT_CATALOG,
};

#[derive(Default)]
struct Inner {
    next_context_id: i32,
    contexts: HashMap<i32, MessageContext>,
    users: HashMap<i64, User>,
    transaction_types: Vec<TransactionType>,
    categories: Vec<Category>,
    next_transaction_id: i64,
    transactions: BTreeMap<i64, Transaction>,
}

impl Inner {
    fn category(&self, id: i32) -> StoreResult<Category> {
        self.categories
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("category", id))
    }

    /// User's transactions in `[start, end)`, newest first
    fn in_period(&self, user_id: i64, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<&Transaction> {
        let mut found: Vec<&Transaction> = self
            .transactions
            .values()
            .filter(|t| t.user_id == user_id && t.datetime >= start && t.datetime < end)
            .collect();
        found.sort_by(|a, b| b.datetime.cmp(&a.datetime).then(b.id.cmp(&a.id)));
        found
    }
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-loaded with the default transaction types and categories,
    /// numbered from 1 in catalogue order
    pub async fn with_default_catalog() -> Self {
        let store = Self::new();
        let mut category_id = 0;
        for (index, entry) in DEFAULT_CATALOG.iter().enumerate() {
            let type_id = index as i32 + 1;
            store
                .insert_transaction_type(TransactionType {
                    id: type_id,
                    name: entry.name.to_string(),
                    multiplier: entry.multiplier,
                    reply_text: entry.reply_text.to_string(),
                })
                .await;
            for name in entry.categories {
                category_id += 1;
                store
                    .insert_category(Category {
                        id: category_id,
                        name: name.to_string(),
                        transaction_type_id: type_id,
                    })
                    .await;
            }
        }
        store
    }

    pub async fn insert_transaction_type(&self, transaction_type: TransactionType) {
        let mut inner = self.inner.lock().await;
        inner.transaction_types.retain(|t| t.id != transaction_type.id);
        inner.transaction_types.push(transaction_type);
    }

    pub async fn insert_category(&self, category: Category) {
        let mut inner = self.inner.lock().await;
        inner.categories.retain(|c| c.id != category.id);
        inner.categories.push(category);
    }

    pub async fn context_count(&self) -> usize {
        self.inner.lock().await.contexts.len()
    }

    pub async fn transaction_count(&self) -> usize {
        self.inner.lock().await.transactions.len()
    }
}

#[async_trait]
impl MessageContextStore for InMemoryStore {
    async fn create(&self, chat_id: i64, message_id: i32, raw_text: &str) -> StoreResult<i32> {
        let mut inner = self.inner.lock().await;
        inner.next_context_id += 1;
        let id = inner.next_context_id;
        inner.contexts.insert(
            id,
            MessageContext {
                id,
                chat_id,
                message_id,
                raw_text: raw_text.to_string(),
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn get(&self, id: i32) -> StoreResult<MessageContext> {
        self.inner
            .lock()
            .await
            .contexts
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("message_context", id))
    }

    async fn take(&self, id: i32) -> StoreResult<MessageContext> {
        self.inner
            .lock()
            .await
            .contexts
            .remove(&id)
            .ok_or_else(|| StoreError::not_found("message_context", id))
    }

    async fn delete(&self, id: i32) -> StoreResult<bool> {
        Ok(self.inner.lock().await.contexts.remove(&id).is_some())
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let mut inner = self.inner.lock().await;
        let before = inner.contexts.len();
        inner.contexts.retain(|_, c| c.created_at >= cutoff);
        Ok((before - inner.contexts.len()) as u64)
    }
}

#[async_trait]
impl LedgerStore for InMemoryStore {
    async fn find_user(&self, user_id: i64) -> StoreResult<Option<User>> {
        Ok(self.inner.lock().await.users.get(&user_id).cloned())
    }

    async fn create_user(&self, user: &User) -> StoreResult<()> {
        self.inner
            .lock()
            .await
            .users
            .entry(user.id)
            .or_insert_with(|| user.clone());
        Ok(())
    }

    async fn set_interaction_state(
        &self,
        user_id: i64,
        state: &InteractionState,
    ) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        let user = inner
            .users
            .get_mut(&user_id)
            .ok_or_else(|| StoreError::not_found("user", user_id))?;
        user.interaction_state = state.clone();
        Ok(())
    }

    async fn transaction_types(&self) -> StoreResult<Vec<TransactionType>> {
        Ok(self.inner.lock().await.transaction_types.clone())
    }

    async fn transaction_type(&self, id: i32) -> StoreResult<TransactionType> {
        self.inner
            .lock()
            .await
            .transaction_types
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("transaction_type", id))
    }

    async fn categories(&self, transaction_type_id: Option<i32>) -> StoreResult<Vec<Category>> {
        Ok(self
            .inner
            .lock()
            .await
            .categories
            .iter()
            .filter(|c| transaction_type_id.is_none_or(|t| c.transaction_type_id == t))
            .cloned()
            .collect())
    }

    async fn category(&self, id: i32) -> StoreResult<Category> {
        self.inner.lock().await.category(id)
    }

    async fn add_transaction(&self, tx: &NewTransaction) -> StoreResult<i64> {
        let mut inner = self.inner.lock().await;
        let category = inner.category(tx.category_id)?;
        inner.next_transaction_id += 1;
        let id = inner.next_transaction_id;
        inner.transactions.insert(
            id,
            Transaction {
                id,
                user_id: tx.user_id,
                category_id: category.id,
                category_name: category.name,
                amount: tx.amount,
                description: tx.description.clone(),
                datetime: tx.datetime,
            },
        );
        Ok(id)
    }

    async fn transaction(&self, id: i64) -> StoreResult<Transaction> {
        self.inner
            .lock()
            .await
            .transactions
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("transaction", id))
    }

    async fn latest_transaction(&self, user_id: i64) -> StoreResult<Option<Transaction>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .transactions
            .values()
            .filter(|t| t.user_id == user_id)
            .max_by(|a, b| a.datetime.cmp(&b.datetime).then(a.id.cmp(&b.id)))
            .cloned())
    }

    async fn delete_transaction(&self, user_id: i64, id: i64) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        let owned = inner
            .transactions
            .get(&id)
            .is_some_and(|t| t.user_id == user_id);
        if owned {
            inner.transactions.remove(&id);
        }
        Ok(owned)
    }

    async fn list_transactions(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        offset: u32,
        limit: u32,
    ) -> StoreResult<(Vec<Transaction>, u32)> {
        let inner = self.inner.lock().await;
        let all = inner.in_period(user_id, start, end);
        let total = u32::try_from(all.len()).unwrap_or(u32::MAX);
        let page = all
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn totals_by_category(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<CategoryTotal>> {
        let inner = self.inner.lock().await;
        let mut totals: BTreeMap<String, i64> = BTreeMap::new();
        for t in inner.in_period(user_id, start, end) {
            let entry = totals.entry(t.category_name.clone()).or_insert(0);
            *entry = entry.saturating_add(t.amount.minor);
        }
        let mut result: Vec<CategoryTotal> = totals
            .into_iter()
            .map(|(category_name, total_minor)| CategoryTotal {
                category_name,
                total_minor,
            })
            .collect();
        result.sort_by(|a, b| b.total_minor.cmp(&a.total_minor));
        Ok(result)
    }
}
