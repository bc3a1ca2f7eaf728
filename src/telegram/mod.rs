//! Telegram bot integration

pub mod bot;
pub mod gateway;
pub mod owner;

// Re-exports for convenience
pub use bot::{create_bot, run_bot, schema, TeloxideTransport};
pub use gateway::{BotGateway, ChatTransport, InboundMessage, MessageOutcome};
pub use owner::{Authorization, EnvFileOwnerStore, OwnerRegistry, OwnerStore};
