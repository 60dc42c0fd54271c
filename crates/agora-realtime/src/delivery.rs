//! Delivery coordination.
//!
//! Bridges the durable message store and the live connections: persist
//! first, then attempt the live push, then record the delivery transition.
//! Push failures are never fatal; a message simply stays at `sent` and is
//! flushed when the recipient next connects.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use agora_shared::protocol::{MessagePayload, ServerEvent};
use agora_shared::types::{ConversationId, DeliveryState, MessageId, UserId};
use agora_store::{Database, Message, Result, StoreError};

use crate::connections::ConnectionRegistry;
use crate::notify::PushNotifier;
use crate::presence::PresenceRegistry;

#[derive(Clone)]
pub struct DeliveryCoordinator {
    store: Arc<Mutex<Database>>,
    presence: PresenceRegistry,
    connections: ConnectionRegistry,
    notifier: Arc<dyn PushNotifier>,
}

impl DeliveryCoordinator {
    pub fn new(
        store: Arc<Mutex<Database>>,
        presence: PresenceRegistry,
        connections: ConnectionRegistry,
        notifier: Arc<dyn PushNotifier>,
    ) -> Self {
        Self {
            store,
            presence,
            connections,
            notifier,
        }
    }

    /// Persist a message, then attempt immediate live delivery.
    ///
    /// The store write is the only fallible step surfaced to the caller;
    /// once it commits, this function cannot fail. A successful push
    /// advances the message to `delivered`; a failed push (recipient
    /// offline, or the connection raced to close) leaves it at `sent` with
    /// no partial state, and an offline recipient triggers a best-effort
    /// push notification instead.
    pub async fn send(
        &self,
        conversation_id: ConversationId,
        sender: UserId,
        body: &str,
    ) -> Result<Message> {
        let (mut message, recipient) = {
            let mut store = self.store.lock().await;
            let message = store.send_message(conversation_id, sender, body)?;
            let conversation = store.get_conversation_raw(conversation_id)?;
            let recipient = conversation
                .other_participant(sender)
                .ok_or(StoreError::NotAuthorized)?;
            (message, recipient)
        };

        let payload = MessagePayload::from(&message);
        let pushed = self
            .connections
            .send(
                recipient,
                ServerEvent::NewMessage {
                    message: payload.clone(),
                },
            )
            .await;

        if pushed {
            match self.store.lock().await.mark_delivered(message.id) {
                Ok(true) => {
                    message.state = DeliveryState::Delivered;
                    message.delivered_at = Some(Utc::now());
                }
                Ok(false) => {}
                // The message is durable and pushed; a failed transition is
                // retried on the recipient's next connect.
                Err(e) => warn!(message = %message.id, error = %e, "mark_delivered failed"),
            }
        } else if !self.presence.is_online(recipient).await {
            self.notifier.message_stored(recipient, &payload);
        }

        Ok(message)
    }

    /// Flush the recipient's `sent` backlog over their now-live connection.
    /// Called by the gateway on every (re)connect; returns how many
    /// messages were flushed.
    pub async fn flush_on_connect(&self, user: UserId) -> Result<usize> {
        let pending = self
            .store
            .lock()
            .await
            .mark_all_undelivered_delivered(user)?;

        let count = pending.len();
        for message in pending {
            let pushed = self
                .connections
                .send(
                    user,
                    ServerEvent::NewMessage {
                        message: MessagePayload::from(&message),
                    },
                )
                .await;
            if !pushed {
                // Connection raced to close mid-flush; the messages are
                // already at `delivered` and remain fetchable by paging.
                debug!(user = %user.short(), "connection closed during backlog flush");
                break;
            }
        }

        if count > 0 {
            debug!(user = %user.short(), count, "flushed undelivered backlog");
        }
        Ok(count)
    }

    /// Mark one message read and push a read receipt to its sender if they
    /// are online. The receipt is fire-and-forget: the read state itself is
    /// durable and discoverable by the sender on their next fetch.
    pub async fn mark_read(&self, message_id: MessageId, reader: UserId) -> Result<bool> {
        let (advanced, message) = {
            let store = self.store.lock().await;
            let advanced = store.mark_read(message_id, reader)?;
            let message = store.get_message(message_id)?;
            (advanced, message)
        };

        if advanced {
            let receipt = ServerEvent::ReadReceipt {
                conversation_id: message.conversation_id,
                reader,
                message_ids: vec![message_id],
                read_at: message.read_at.unwrap_or_else(Utc::now),
            };
            self.connections.send(message.sender_id, receipt).await;
        }

        Ok(advanced)
    }

    /// Bulk-read a conversation on behalf of `reader` and push a single
    /// receipt covering every affected message to the other participant.
    pub async fn mark_all_read(
        &self,
        conversation_id: ConversationId,
        reader: UserId,
    ) -> Result<usize> {
        let (ids, other) = {
            let mut store = self.store.lock().await;
            let ids = store.mark_all_read(conversation_id, reader)?;
            let conversation = store.get_conversation_raw(conversation_id)?;
            let other = conversation
                .other_participant(reader)
                .ok_or(StoreError::NotAuthorized)?;
            (ids, other)
        };

        let count = ids.len();
        if count > 0 {
            let receipt = ServerEvent::ReadReceipt {
                conversation_id,
                reader,
                message_ids: ids,
                read_at: Utc::now(),
            };
            self.connections.send(other, receipt).await;
        }

        Ok(count)
    }
}
