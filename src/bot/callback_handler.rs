//! Callback Handler module for processing inline keyboard callback queries

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::dialogue_manager::{DialogueManager, IncomingCallback};
use super::message_handler::deliver;

/// Handle callback queries from inline keyboards.
///
/// The keyboard message is removed once pressed and the query is always
/// answered, so Telegram clients stop showing the loading spinner.
pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    manager: Arc<DialogueManager>,
    workers: Arc<Semaphore>,
) -> Result<()> {
    debug!(user_id = %q.from.id, "Received callback query from user");

    let Some(message) = q.message.as_ref() else {
        answer(&bot, &q).await;
        return Ok(());
    };
    let chat_id = message.chat().id;

    if let Err(e) = bot.delete_message(chat_id, message.id()).await {
        warn!(chat_id = %chat_id, error = %e, "Failed to delete keyboard message");
    }

    let incoming = IncomingCallback {
        user_id: q.from.id.0 as i64,
        chat_id: chat_id.0,
        data: q.data.clone().unwrap_or_default(),
        language_code: q.from.language_code.clone(),
    };

    let replies = match workers.acquire_owned().await {
        Ok(_permit) => manager.handle_callback(&incoming).await,
        Err(e) => {
            warn!(error = %e, "Worker pool closed, dropping callback");
            Vec::new()
        }
    };
    deliver(&bot, chat_id, replies).await;
    answer(&bot, &q).await;
    Ok(())
}

async fn answer(bot: &Bot, q: &CallbackQuery) {
    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        warn!(user_id = %q.from.id, error = %e, "Failed to answer callback query");
    }
}
