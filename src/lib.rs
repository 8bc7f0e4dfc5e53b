//! Wird: scheduled Quran delivery over Telegram.
//!
//! The bot pushes two mushaf pages and a khatma reminder to each
//! registered chat at its configured times of day:
//! Scheduler → Trigger evaluation → Delivery → Telegram
//!
//! # Architecture
//!
//! The pipeline is built from small, separately testable layers:
//! - **Store**: per-chat cursors and trigger configuration, persisted as JSON
//! - **Trigger**: minute matching with idempotency markers
//! - **Delivery**: composes messages and advances cursors after a send
//! - **Scheduler**: the interval loop that drives every destination
//! - **Telegram**: Bot API client behind the [`telegram::Messenger`] trait
//! - **Commands**: admin surface for registration and configuration

pub mod commands;
pub mod config;
pub mod content;
pub mod delivery;
pub mod error;
pub mod progression;
pub mod scheduler;
pub mod store;
pub mod telegram;
pub mod trigger;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::BotConfig;
pub use error::{Result, WirdError};
pub use scheduler::{Scheduler, SchedulerHandle};
pub use store::StateStore;
