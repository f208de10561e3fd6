//! # Expense Tracker Telegram Bot
//!
//! A Telegram bot that records expenses typed as `12.34 lunch`, asks for a
//! category through an inline keyboard, and reports monthly totals, lists
//! and CSV exports.

pub mod amount_parser;
pub mod bot;
pub mod callback;
pub mod commands;
pub mod config;
pub mod db;
pub mod dialogue;
pub mod errors;
pub mod export;
pub mod localization;
pub mod memory_store;
pub mod money;
pub mod reaper;
pub mod store;
