//! Client logic: session operations, subscriptions and the receive loop, and the bot.

pub mod bot;
pub mod session;
pub mod subscription;

#[cfg(test)]
pub(crate) mod fake;

pub use bot::{Bot, BotSettings};
pub use session::ChatSession;
pub use subscription::{ListenerExit, ListenerHandle, SubscriptionSet, Subscriptions};
