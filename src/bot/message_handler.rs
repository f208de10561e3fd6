//! Message Handler module for processing incoming Telegram messages

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{ChatId, InputFile, ParseMode};
use tokio::sync::Semaphore;
use tracing::{debug, error};

use super::dialogue_manager::{DialogueManager, IncomingText, Outbound};
use super::ui_builder::to_inline_markup;

/// Handle text messages: commands and expense entries alike
pub async fn message_handler(
    bot: Bot,
    msg: Message,
    manager: Arc<DialogueManager>,
    workers: Arc<Semaphore>,
) -> Result<()> {
    let (Some(user), Some(text)) = (msg.from.as_ref(), msg.text()) else {
        debug!(chat_id = %msg.chat.id, "Ignoring message without sender or text");
        return Ok(());
    };

    let incoming = IncomingText {
        user_id: user.id.0 as i64,
        chat_id: msg.chat.id.0,
        message_id: msg.id.0,
        text: text.to_string(),
        language_code: user.language_code.clone(),
    };

    let _permit = workers.acquire_owned().await?;
    debug!(user_id = incoming.user_id, "Received text message");
    let replies = manager.handle_text(&incoming).await;
    deliver(&bot, msg.chat.id, replies).await;
    Ok(())
}

/// Send replies in order; a failed send is logged and the rest still go out
pub async fn deliver(bot: &Bot, chat_id: ChatId, replies: Vec<Outbound>) {
    for reply in replies {
        if let Err(e) = send_one(bot, chat_id, reply).await {
            error!(chat_id = %chat_id, error = %e, "Failed to send reply");
        }
    }
}

async fn send_one(bot: &Bot, chat_id: ChatId, reply: Outbound) -> Result<()> {
    match reply {
        Outbound::Message {
            text,
            keyboard,
            html,
        } => {
            let mut request = bot.send_message(chat_id, text);
            if html {
                request = request.parse_mode(ParseMode::Html);
            }
            if let Some(rows) = keyboard {
                request = request.reply_markup(to_inline_markup(&rows));
            }
            request.await?;
        }
        Outbound::Document {
            file_name,
            bytes,
            caption,
        } => {
            bot.send_document(chat_id, InputFile::memory(bytes).file_name(file_name))
                .caption(caption)
                .await?;
        }
    }
    Ok(())
}
