//! beerbot-chat
//!
//! Command routing, result formatting and message delivery for the bot.

pub mod bot;
pub mod format;
pub mod router;
pub mod sink;

pub use bot::{BeerBot, Outcome};
pub use format::{format, DisplayMessage, ResultKind};
pub use sink::{ConsoleSink, MessageSink, SlackSink};
