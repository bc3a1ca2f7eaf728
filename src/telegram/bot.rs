//! Bot instance, teloxide transport and dispatcher wiring
//!
//! This module contains:
//! - Bot instance creation
//! - The teloxide implementation of [`ChatTransport`]
//! - The dispatcher schema that hands every message to the gateway

use async_trait::async_trait;
use reqwest::ClientBuilder;
use std::path::Path;
use std::sync::Arc;
use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::{ChatAction, InputFile, Message, MessageId, ReplyParameters};

use crate::core::config;
use crate::core::error::AppResult;
use crate::telegram::gateway::{BotGateway, ChatTransport, InboundMessage};

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Creates a Bot instance for `token`
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(anyhow::Error)` - Failed to build the HTTP client
pub fn create_bot(token: &str) -> anyhow::Result<Bot> {
    let client = ClientBuilder::new()
        .timeout(config::network::bot_request_timeout())
        .build()?;
    Ok(Bot::with_client(token, client))
}

/// [`ChatTransport`] over the Bot API
#[derive(Clone)]
pub struct TeloxideTransport {
    bot: Bot,
}

impl TeloxideTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ChatTransport for TeloxideTransport {
    async fn send_text(&self, chat_id: i64, reply_to: i32, text: &str) -> AppResult<()> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .reply_parameters(ReplyParameters::new(MessageId(reply_to)))
            .await?;
        Ok(())
    }

    async fn send_video(&self, chat_id: i64, reply_to: i32, path: &Path) -> AppResult<()> {
        self.bot
            .send_video(ChatId(chat_id), InputFile::file(path.to_path_buf()))
            .supports_streaming(true)
            .reply_parameters(ReplyParameters::new(MessageId(reply_to)))
            .await?;
        Ok(())
    }

    async fn send_presence(&self, chat_id: i64) -> AppResult<()> {
        self.bot.send_chat_action(ChatId(chat_id), ChatAction::UploadVideo).await?;
        Ok(())
    }
}

/// Messages without a user sender (channel posts) are skipped.
pub fn inbound_from(msg: &Message) -> Option<InboundMessage> {
    let sender = msg.from.as_ref()?;
    Some(InboundMessage {
        chat_id: msg.chat.id.0,
        message_id: msg.id.0,
        sender_id: i64::try_from(sender.id.0).ok()?,
        text: msg.text().unwrap_or_default().to_string(),
    })
}

/// Creates the dispatcher schema.
///
/// The endpoint returns as soon as the message is handed off; see
/// [`BotGateway::spawn_handle`].
pub fn schema(gateway: Arc<BotGateway>) -> UpdateHandler<HandlerError> {
    Update::filter_message().endpoint(move |msg: Message| {
        let gateway = Arc::clone(&gateway);
        async move {
            if let Some(inbound) = inbound_from(&msg) {
                gateway.spawn_handle(inbound);
            }
            Ok::<(), HandlerError>(())
        }
    })
}

/// Run the long-polling dispatcher until Ctrl-C.
pub async fn run_bot(bot: Bot, gateway: Arc<BotGateway>) -> anyhow::Result<()> {
    let me = bot.get_me().await?;
    log::info!("Bot started: @{}", me.user.username.as_deref().unwrap_or("unknown"));
    match gateway.owners().current_owner().await {
        Some(id) => log::info!("Bot owner: {}", id),
        None => log::info!("Bot has no owner yet; the first sender will claim it"),
    }

    Dispatcher::builder(bot, schema(gateway))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    log::info!("Dispatcher shutdown gracefully");
    Ok(())
}
