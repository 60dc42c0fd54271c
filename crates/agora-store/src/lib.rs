//! # agora-store
//!
//! Durable storage for the Agora messaging core, backed by SQLite.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed operations for conversations
//! and messages. Every operation either fully commits or not at all; the
//! handle is the durability boundary of the system.

pub mod conversations;
pub mod database;
pub mod messages;
pub mod migrations;
pub mod models;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
