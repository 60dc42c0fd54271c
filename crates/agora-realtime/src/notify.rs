//! Push-notification dispatch seam.
//!
//! The surrounding platform owns mobile alert delivery; the core only
//! invokes it best-effort when a message lands for an offline recipient.

use tracing::debug;

use agora_shared::protocol::MessagePayload;
use agora_shared::types::UserId;

/// Outbound mobile-alert dispatcher, provided by the surrounding system.
///
/// Implementations must never propagate failures: a broken push pipeline
/// cannot fail a send that is already durable.
pub trait PushNotifier: Send + Sync {
    /// A message was stored while the recipient had no live connection.
    fn message_stored(&self, recipient: UserId, message: &MessagePayload);
}

/// Default dispatcher: records the intent in the log and nothing else.
#[derive(Debug, Clone, Default)]
pub struct LogPushNotifier;

impl PushNotifier for LogPushNotifier {
    fn message_stored(&self, recipient: UserId, message: &MessagePayload) {
        debug!(
            recipient = %recipient.short(),
            message = %message.id,
            "offline recipient, push notification requested"
        );
    }
}
