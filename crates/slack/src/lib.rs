//! Slack interface for the permissions demo bot.
//!
//! - **Block Kit** (`blocks`, `menu`) - typed message builders and the per-user command menu
//! - **Commands** (`commands`) - slash command parsing, routing and handlers
//! - **Gate** (`gate`) - per-user rate limiting in front of every handler
//! - **Events** (`events`) - envelope model, payload parsing and the dispatcher
//! - **Transports** (`transport`, `socket`) - Slack Web API client and Socket Mode runner
//!
//! # Architecture
//!
//! ```text
//! Socket Mode / HTTP -> EventDispatcher -> RequestGate -> Handlers -> CommandRouter
//!                                                                       |
//!                                             ChatTransport <- Block Kit messages
//! ```

pub mod blocks;
pub mod commands;
pub mod events;
pub mod gate;
pub mod menu;
pub mod socket;
pub mod transport;

#[cfg(test)]
mod testing;
