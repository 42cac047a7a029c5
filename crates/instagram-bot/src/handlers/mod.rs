//! Message handlers for Telegram updates
//!
//! Both front-ends (polling and webhook) feed the same handler tree; the
//! handlers only translate updates into [`FetchRequest`]s for the shared
//! [`DeliveryDispatcher`].

use std::sync::Arc;

use instagram_types::{ConversationId, FetchRequest, PostReference};
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, Message};
use tracing::{debug, info, warn};

use crate::dispatcher::DeliveryDispatcher;
use crate::health::AppState;

pub const USAGE_TEXT: &str = "🤖 Instagram Media Downloader Bot 🤖

Commands:
- Send an Instagram post link to receive its photos and videos
- /zip <post link> - Download all media as one ZIP file

Supported links:
- instagram.com/p/…, /reel/… and /tv/… posts";

pub const MISSING_URL_TEXT: &str = "Please provide an Instagram post URL";

/// A parsed `/command` with its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command<'a> {
    pub name: String,
    pub args: Vec<&'a str>,
}

/// Split `/name@bot arg…` into a lowercase name and its arguments.
pub fn parse_command(text: &str) -> Option<Command<'_>> {
    let mut parts = text.split_whitespace();
    let head = parts.next()?.strip_prefix('/')?;
    let name = head.split('@').next().unwrap_or_default().to_lowercase();
    if name.is_empty() {
        return None;
    }

    Some(Command {
        name,
        args: parts.collect(),
    })
}

/// Handle text messages: commands or a bare post link
pub async fn handle_text_message(
    bot: Bot,
    msg: Message,
    dispatcher: Arc<DeliveryDispatcher>,
    health: AppState,
) -> ResponseResult<()> {
    let text = msg.text().unwrap_or_default();
    let conversation = ConversationId::new(msg.chat.id.0);

    debug!("Received text message in chat {}: {}", conversation, text);

    if let Some(command) = parse_command(text) {
        return handle_command(bot, msg.chat.id, command, dispatcher, health).await;
    }

    let reference = PostReference::find_in_text(text).unwrap_or(text.trim());
    run(&dispatcher, &health, FetchRequest::inline(conversation, reference)).await;

    Ok(())
}

async fn handle_command(
    bot: Bot,
    chat_id: ChatId,
    command: Command<'_>,
    dispatcher: Arc<DeliveryDispatcher>,
    health: AppState,
) -> ResponseResult<()> {
    info!(
        "Received command: {} with {} args",
        command.name,
        command.args.len()
    );

    match command.name.as_str() {
        "zip" => match command.args.first() {
            Some(reference) => {
                let request = FetchRequest::archive(ConversationId::new(chat_id.0), *reference);
                run(&dispatcher, &health, request).await;
            }
            None => {
                bot.send_message(chat_id, MISSING_URL_TEXT).await?;
            }
        },
        "start" | "help" => {
            bot.send_message(chat_id, USAGE_TEXT).await?;
        }
        other => {
            debug!("Unknown command /{}", other);
            bot.send_message(chat_id, USAGE_TEXT).await?;
        }
    }

    Ok(())
}

/// Handle callback queries (archive button clicks)
pub async fn handle_callback_query(
    bot: Bot,
    query: CallbackQuery,
    dispatcher: Arc<DeliveryDispatcher>,
    health: AppState,
) -> ResponseResult<()> {
    debug!("Received callback query: {:?}", query.data);

    // Acknowledge first so the client stops its spinner.
    if let Err(e) = bot.answer_callback_query(query.id.clone()).await {
        warn!("Failed to answer callback query {}: {}", query.id, e);
    }

    let chat_id = query
        .message
        .as_ref()
        .map(|m| m.chat().id)
        .unwrap_or_else(|| ChatId::from(query.from.id));
    let conversation = ConversationId::new(chat_id.0);
    let data = query.data.as_deref().unwrap_or_default();

    health.increment_requests_received().await;
    let outcome = dispatcher.handle_callback(conversation, data).await;
    health.record_outcome(&outcome).await;
    health
        .set_active_conversations(dispatcher.active_conversations())
        .await;

    Ok(())
}

async fn run(dispatcher: &DeliveryDispatcher, health: &AppState, request: FetchRequest) {
    health.increment_requests_received().await;
    let outcome = dispatcher.handle(request).await;
    health.record_outcome(&outcome).await;
    health
        .set_active_conversations(dispatcher.active_conversations())
        .await;
}
