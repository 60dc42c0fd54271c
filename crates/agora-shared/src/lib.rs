//! # agora-shared
//!
//! Types shared across the Agora messaging core: id newtypes, the realtime
//! wire protocol (client commands and server events), and protocol-wide
//! constants.

pub mod constants;
pub mod protocol;
pub mod types;

pub use types::{ConversationId, DeliveryState, MessageId, UserId};
