//! Dialogue Manager module for handling dialogue state transitions
//!
//! [`DialogueManager`] turns one incoming text or button press into the
//! replies to send. It never talks to Telegram directly, which keeps every
//! flow testable against [`crate::memory_store::InMemoryStore`]. Errors are
//! converted to a reply here and never escape to the dispatcher.

use std::sync::Arc;

use chrono::Utc;
use teloxide::utils::html;
use tracing::{debug, error, info, warn};

use crate::amount_parser::parse_expense;
use crate::callback::{self, Callback};
use crate::commands::{parse_command, Command, Period};
use crate::config::BotConfig;
use crate::dialogue::{InteractionState, Trigger};
use crate::errors::{BotError, KeyboardError, ParseError};
use crate::export::{export_file_name, write_csv};
use crate::localization::{t_args_lang, t_lang};
use crate::store::{LedgerStore, MessageContextStore, NewTransaction, Store, Transaction, User};

use super::ui_builder::{
    build_pagination_rows, category_keyboard, format_breakdown, format_transaction_list,
    transaction_type_keyboard, undo_keyboard, KeyboardRows,
};

/// A text message as the dialogue manager sees it
#[derive(Debug, Clone)]
pub struct IncomingText {
    pub user_id: i64,
    pub chat_id: i64,
    pub message_id: i32,
    pub text: String,
    pub language_code: Option<String>,
}

/// A button press
#[derive(Debug, Clone)]
pub struct IncomingCallback {
    pub user_id: i64,
    pub chat_id: i64,
    pub data: String,
    pub language_code: Option<String>,
}

/// Something to send back to the chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Message {
        text: String,
        keyboard: Option<KeyboardRows>,
        html: bool,
    },
    Document {
        file_name: String,
        bytes: Vec<u8>,
        caption: String,
    },
}

impl Outbound {
    pub fn text(text: impl Into<String>) -> Self {
        Outbound::Message {
            text: text.into(),
            keyboard: None,
            html: false,
        }
    }

    pub fn html(text: impl Into<String>) -> Self {
        Outbound::Message {
            text: text.into(),
            keyboard: None,
            html: true,
        }
    }

    fn with_keyboard(self, rows: KeyboardRows) -> Self {
        match self {
            Outbound::Message { text, html, .. } => Outbound::Message {
                text,
                keyboard: (!rows.is_empty()).then_some(rows),
                html,
            },
            other => other,
        }
    }
}

type Replies = Result<Vec<Outbound>, BotError>;

pub struct DialogueManager {
    store: Arc<dyn Store>,
    config: BotConfig,
}

impl DialogueManager {
    pub fn new(store: Arc<dyn Store>, config: BotConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    /// Route a text message: slash commands by name, anything else as an expense
    pub async fn handle_text(&self, msg: &IncomingText) -> Vec<Outbound> {
        let lang = msg.language_code.as_deref();
        let result = match parse_command(&msg.text) {
            Some(command) => {
                debug!(user_id = msg.user_id, command = ?command, "Handling command");
                self.handle_command(msg, command).await
            }
            None => self.start_expense(msg).await,
        };
        self.finish(msg.user_id, result, lang)
    }

    /// Decode and dispatch a button press
    pub async fn handle_callback(&self, cb: &IncomingCallback) -> Vec<Outbound> {
        let lang = cb.language_code.as_deref();
        let result = self.dispatch_callback(cb).await;
        self.finish(cb.user_id, result, lang)
    }

    async fn dispatch_callback(&self, cb: &IncomingCallback) -> Replies {
        let callback = callback::decode(&cb.data)?;
        debug!(user_id = cb.user_id, callback = ?callback, "Handling callback");
        let user = self.require_user(cb.user_id).await?;

        match callback {
            Callback::Category {
                category_id,
                message_context_id,
            } => self.on_category(&user, category_id, message_context_id).await,
            Callback::TransactionType {
                transaction_type_id,
                message_context_id,
            } => {
                self.on_transaction_type(&user, transaction_type_id, message_context_id)
                    .await
            }
            Callback::Pagination {
                offset,
                limit,
                message_context_id,
                ..
            } => self.on_pagination(&user, offset, limit, message_context_id).await,
            Callback::Undo { transaction_id } => self.on_undo(&user, transaction_id).await,
            Callback::Cancel { message_context_id } => {
                self.on_cancel(&user, message_context_id).await
            }
        }
    }

    async fn handle_command(&self, msg: &IncomingText, command: Command) -> Replies {
        match command {
            Command::Start => self.on_start(msg).await,
            Command::Help => Ok(vec![Outbound::text(t_lang(
                "help-text",
                msg.language_code.as_deref(),
            ))]),
            Command::Stats(args) => self.on_stats(msg, &args).await,
            Command::List(args) => self.on_list(msg, &args).await,
            Command::Export(args) => self.on_export(msg, &args).await,
            Command::Undo => self.on_undo_command(msg).await,
        }
    }

    async fn on_start(&self, msg: &IncomingText) -> Replies {
        let lang = msg.language_code.as_deref();
        if self.store.find_user(msg.user_id).await?.is_some() {
            return Ok(vec![Outbound::text(t_lang("welcome-back", lang))]);
        }

        let user = User {
            id: msg.user_id,
            locale: lang.unwrap_or("en").to_string(),
            currency: self.config.default_currency,
            timezone: self.config.default_timezone,
            interaction_state: InteractionState::Idle,
        };
        self.store.create_user(&user).await?;
        info!(user_id = msg.user_id, currency = %user.currency, "New user registered");
        Ok(vec![Outbound::text(t_lang("welcome", lang))])
    }

    async fn start_expense(&self, msg: &IncomingText) -> Replies {
        let lang = msg.language_code.as_deref();
        let user = self.require_user(msg.user_id).await?;
        // Validate before anything is persisted
        let expense = parse_expense(&msg.text, user.currency, self.config.max_description_len)?;

        let message_context_id = self
            .store
            .create(msg.chat_id, msg.message_id, &msg.text)
            .await?;
        debug!(
            user_id = user.id,
            message_context_id,
            amount = %expense.amount,
            "Expense started"
        );

        let with_transaction_type = self.config.transaction_type_tier;
        let (text, rows) = if with_transaction_type {
            let types = self.store.transaction_types().await?;
            (
                t_lang("choose-transaction-type", lang),
                transaction_type_keyboard(
                    &types,
                    message_context_id,
                    self.config.category_columns,
                    lang,
                )?,
            )
        } else {
            let categories = self.store.categories(None).await?;
            (
                t_lang("choose-category", lang),
                category_keyboard(
                    &categories,
                    message_context_id,
                    self.config.category_columns,
                    lang,
                )?,
            )
        };

        self.transition(
            &user,
            Trigger::ExpenseStarted {
                message_context_id,
                with_transaction_type,
            },
        )
        .await?;
        Ok(vec![Outbound::text(text).with_keyboard(rows)])
    }

    async fn on_transaction_type(
        &self,
        user: &User,
        transaction_type_id: i32,
        message_context_id: i32,
    ) -> Replies {
        let lang = Some(user.locale.as_str());
        // Fails with NotFound if the expense was already completed or cancelled
        self.store.get(message_context_id).await?;
        let transaction_type = self.store.transaction_type(transaction_type_id).await?;
        let categories = self.store.categories(Some(transaction_type.id)).await?;
        let rows = category_keyboard(
            &categories,
            message_context_id,
            self.config.category_columns,
            lang,
        )?;

        self.transition(user, Trigger::TransactionTypeChosen { message_context_id })
            .await?;
        Ok(vec![
            Outbound::text(t_lang("choose-category", lang)).with_keyboard(rows)
        ])
    }

    async fn on_category(&self, user: &User, category_id: i32, message_context_id: i32) -> Replies {
        // Resolve everything the reply needs before anything is written
        let resolved = match self.store.category(category_id).await {
            Ok(category) => self
                .store
                .transaction_type(category.transaction_type_id)
                .await
                .map(|transaction_type| (category, transaction_type)),
            Err(e) => Err(e),
        };
        let (category, transaction_type) = match resolved {
            Ok(resolved) => resolved,
            Err(e) => {
                self.release_context(message_context_id).await;
                return Err(e.into());
            }
        };

        // Single-use: a second press on the same keyboard gets NotFound here
        let context = self.store.take(message_context_id).await?;
        let expense = parse_expense(
            &context.raw_text,
            user.currency,
            self.config.max_description_len,
        )?;

        let transaction_id = self
            .store
            .add_transaction(&NewTransaction {
                user_id: user.id,
                category_id: category.id,
                amount: expense.amount,
                description: expense.description.clone(),
                datetime: Utc::now(),
            })
            .await?;
        info!(
            user_id = user.id,
            transaction_id,
            category = %category.name,
            amount = %expense.amount,
            "Transaction recorded"
        );

        let mut text = html::escape(&transaction_type.format_reply(&expense.amount, &category.name));
        if !expense.description.is_empty() {
            text.push_str(&format!("\n<i>{}</i>", html::escape(&expense.description)));
        }

        if let Err(e) = self
            .transition(user, Trigger::CategoryChosen { message_context_id })
            .await
        {
            warn!(user_id = user.id, error = %e, "Failed to reset interaction state");
        }
        Ok(vec![Outbound::html(text)])
    }

    async fn on_stats(&self, msg: &IncomingText, args: &str) -> Replies {
        let lang = msg.language_code.as_deref();
        let user = self.require_user(msg.user_id).await?;
        let period = Period::parse(args, user.timezone, Utc::now())?;
        let (start, end) = period.bounds(user.timezone)?;

        let totals = self.store.totals_by_category(user.id, start, end).await?;
        if totals.is_empty() {
            return Ok(vec![Outbound::text(t_args_lang(
                "stats-empty",
                &[("period", &period.to_string())],
                lang,
            ))]);
        }
        Ok(vec![Outbound::html(format_breakdown(
            &totals,
            user.currency,
            &period,
            lang,
        ))])
    }

    async fn on_list(&self, msg: &IncomingText, args: &str) -> Replies {
        let lang = msg.language_code.as_deref();
        let user = self.require_user(msg.user_id).await?;
        let period = Period::parse(args, user.timezone, Utc::now())?;
        let (start, end) = period.bounds(user.timezone)?;
        let limit = self.config.list_page_size;

        let (transactions, total) = self
            .store
            .list_transactions(user.id, start, end, 0, limit)
            .await?;
        if total == 0 {
            return Ok(vec![Outbound::text(t_lang("list-empty", lang))]);
        }

        // The context remembers the resolved period for later page turns
        let message_context_id = self
            .store
            .create(msg.chat_id, msg.message_id, &period.to_args())
            .await?;
        self.render_list_page(&user, &period, &transactions, total, 0, limit, message_context_id)
    }

    async fn on_pagination(
        &self,
        user: &User,
        offset: u32,
        limit: u32,
        message_context_id: i32,
    ) -> Replies {
        if limit == 0 {
            return Err(KeyboardError::InvalidLimit.into());
        }
        let lang = Some(user.locale.as_str());
        let context = self.store.get(message_context_id).await?;
        let period = Period::parse(&context.raw_text, user.timezone, Utc::now())?;
        let (start, end) = period.bounds(user.timezone)?;

        let (mut transactions, total) = self
            .store
            .list_transactions(user.id, start, end, offset, limit)
            .await?;
        if total == 0 {
            return Ok(vec![Outbound::text(t_lang("list-empty", lang))]);
        }

        // Entries may have been deleted since the keyboard was sent
        let mut offset = offset;
        if offset >= total {
            offset = (total - 1) / limit * limit;
            transactions = self
                .store
                .list_transactions(user.id, start, end, offset, limit)
                .await?
                .0;
        }

        self.transition(user, Trigger::Paginated).await?;
        self.render_list_page(user, &period, &transactions, total, offset, limit, message_context_id)
    }

    #[allow(clippy::too_many_arguments)]
    fn render_list_page(
        &self,
        user: &User,
        period: &Period,
        transactions: &[Transaction],
        total: u32,
        offset: u32,
        limit: u32,
        message_context_id: i32,
    ) -> Replies {
        let lang = Some(user.locale.as_str());
        let rows = build_pagination_rows(
            total,
            offset,
            limit,
            message_context_id,
            self.config.pagination_columns,
            lang,
        )?;
        let text = format_transaction_list(transactions, period, user.timezone, total, offset, lang);
        Ok(vec![Outbound::html(text).with_keyboard(rows)])
    }

    async fn on_export(&self, msg: &IncomingText, args: &str) -> Replies {
        let lang = msg.language_code.as_deref();
        let user = self.require_user(msg.user_id).await?;
        let period = Period::parse(args, user.timezone, Utc::now())?;
        let (start, end) = period.bounds(user.timezone)?;
        let page_size = self.config.export_page_size;

        let mut all = Vec::new();
        let mut offset = 0u32;
        loop {
            let (page, total) = self
                .store
                .list_transactions(user.id, start, end, offset, page_size)
                .await?;
            let fetched = page.len();
            all.extend(page);
            offset = offset.saturating_add(page_size);
            if fetched == 0 || offset >= total {
                break;
            }
        }

        if all.is_empty() {
            return Ok(vec![Outbound::text(t_args_lang(
                "export-empty",
                &[("period", &period.to_string())],
                lang,
            ))]);
        }

        // Exported oldest first
        all.reverse();
        let bytes = write_csv(&all, user.timezone)?;
        info!(user_id = user.id, rows = all.len(), period = %period, "Export generated");
        Ok(vec![Outbound::Document {
            file_name: export_file_name(&period),
            bytes,
            caption: t_args_lang("export-caption", &[("period", &period.to_string())], lang),
        }])
    }

    async fn on_undo_command(&self, msg: &IncomingText) -> Replies {
        let lang = msg.language_code.as_deref();
        let user = self.require_user(msg.user_id).await?;
        let Some(latest) = self.store.latest_transaction(user.id).await? else {
            return Ok(vec![Outbound::text(t_lang("undo-nothing", lang))]);
        };

        let message_context_id = self
            .store
            .create(msg.chat_id, msg.message_id, &latest.id.to_string())
            .await?;
        let rows = undo_keyboard(latest.id, message_context_id, lang)?;
        self.transition(
            &user,
            Trigger::UndoRequested {
                message_context_id,
                transaction_id: latest.id,
            },
        )
        .await?;

        let text = t_args_lang(
            "undo-confirm",
            &[
                ("amount", &latest.amount.to_string()),
                ("description", &latest.description),
            ],
            lang,
        );
        Ok(vec![Outbound::text(text).with_keyboard(rows)])
    }

    async fn on_undo(&self, user: &User, transaction_id: i64) -> Replies {
        let lang = Some(user.locale.as_str());
        // Only the confirmation prompt that is still open may delete
        let pending = matches!(
            user.interaction_state,
            InteractionState::AwaitingUndoConfirmation { transaction_id: open_id, .. }
                if open_id == transaction_id
        );
        if !pending {
            debug!(user_id = user.id, transaction_id, "Undo pressed on a closed prompt");
            return Ok(vec![Outbound::text(t_lang("undo-expired", lang))]);
        }

        let existing = match self.store.transaction(transaction_id).await {
            Ok(tx) if tx.user_id == user.id => Some(tx),
            Ok(_) => None,
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e.into()),
        };
        let deleted = self.store.delete_transaction(user.id, transaction_id).await?;
        self.transition(user, Trigger::UndoConfirmed { transaction_id })
            .await?;

        let text = match existing {
            Some(tx) if deleted => t_args_lang(
                "undo-done",
                &[
                    ("amount", &tx.amount.to_string()),
                    ("description", &tx.description),
                ],
                lang,
            ),
            _ => {
                debug!(user_id = user.id, transaction_id, "Undo of a transaction already gone");
                t_lang("undo-already-done", lang)
            }
        };
        Ok(vec![Outbound::text(text)])
    }

    async fn on_cancel(&self, user: &User, message_context_id: i32) -> Replies {
        self.transition(user, Trigger::Cancelled { message_context_id })
            .await?;
        debug!(user_id = user.id, message_context_id, "Interaction cancelled");
        Ok(Vec::new())
    }

    async fn require_user(&self, user_id: i64) -> Result<User, BotError> {
        self.store
            .find_user(user_id)
            .await?
            .ok_or(BotError::UserNotRegistered(user_id))
    }

    /// Persist the next state (when it changed) and delete any released context
    async fn transition(&self, user: &User, trigger: Trigger) -> Result<(), BotError> {
        let transition = user.interaction_state.apply(trigger);
        if transition.next != user.interaction_state {
            self.store
                .set_interaction_state(user.id, &transition.next)
                .await?;
        }
        if let Some(released) = transition.release {
            self.store.delete(released).await?;
        }
        Ok(())
    }

    /// Best-effort cleanup; failures are only logged
    async fn release_context(&self, message_context_id: i32) {
        if let Err(e) = self.store.delete(message_context_id).await {
            warn!(message_context_id, error = %e, "Failed to delete message context");
        }
    }

    fn finish(&self, user_id: i64, result: Replies, lang: Option<&str>) -> Vec<Outbound> {
        match result {
            Ok(replies) => replies,
            Err(e) => {
                log_failure(user_id, &e);
                vec![Outbound::text(error_reply(&e, lang))]
            }
        }
    }
}

fn log_failure(user_id: i64, err: &BotError) {
    match err {
        BotError::Parse(_) | BotError::UserNotRegistered(_) => {
            debug!(user_id, kind = err.kind(), error = %err, "User input rejected")
        }
        BotError::Callback(_) | BotError::NotFound(_) => {
            warn!(user_id, kind = err.kind(), error = %err, "Update could not be handled")
        }
        BotError::Store(_) | BotError::Keyboard(_) | BotError::Export(_) => {
            error!(user_id, kind = err.kind(), error = %err, "Update handling failed")
        }
    }
}

/// User-facing text for a failure: guidance for correctable input, otherwise generic
pub fn error_reply(err: &BotError, lang: Option<&str>) -> String {
    match err {
        BotError::Parse(ParseError::NoAmountFound) => t_lang("amount-not-recognised", lang),
        BotError::Parse(ParseError::DescriptionTooLong { max, .. }) => {
            t_args_lang("description-too-long", &[("max", &max.to_string())], lang)
        }
        BotError::Parse(ParseError::AmountOutOfRange(_)) => t_lang("amount-out-of-range", lang),
        BotError::Parse(ParseError::InvalidPeriod(input)) => {
            t_args_lang("invalid-period", &[("input", input)], lang)
        }
        BotError::UserNotRegistered(_) => t_lang("not-registered", lang),
        _ => t_lang("generic-error", lang),
    }
}
