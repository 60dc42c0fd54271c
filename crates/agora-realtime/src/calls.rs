//! Call-signal relay.
//!
//! Stateless forwarder for voice-call setup/teardown signals between the
//! two declared parties. Signals are never stored and never queued: calls
//! are live-only, unlike messages. Authorization failures are logged and
//! the signal dropped; the relay never raises to the submitter.

use tracing::{debug, warn};

use agora_shared::protocol::{CallSignal, ServerEvent};
use agora_shared::types::UserId;

use crate::connections::ConnectionRegistry;

#[derive(Clone)]
pub struct CallRelay {
    connections: ConnectionRegistry,
}

impl CallRelay {
    pub fn new(connections: ConnectionRegistry) -> Self {
        Self { connections }
    }

    /// Forward `signal` verbatim to the counterpart of `sender`.
    ///
    /// Drops the signal when the sender is neither the declared caller nor
    /// receiver, or when the counterpart has no live connection.
    pub async fn relay(&self, signal: CallSignal, sender: UserId) {
        let Some(counterpart) = signal.counterpart_of(sender) else {
            warn!(
                sender = %sender.short(),
                conversation = %signal.conversation_id,
                event = ?signal.event,
                "call signal from non-party dropped"
            );
            return;
        };

        let event = signal.event;
        let delivered = self
            .connections
            .send(counterpart, ServerEvent::CallSignal { signal })
            .await;

        if !delivered {
            debug!(
                counterpart = %counterpart.short(),
                event = ?event,
                "counterpart not connected, call signal dropped"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_shared::protocol::CallEvent;
    use agora_shared::types::ConversationId;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    fn user() -> UserId {
        UserId(Uuid::new_v4())
    }

    fn signal(caller: UserId, receiver: UserId) -> CallSignal {
        CallSignal {
            event: CallEvent::Request,
            conversation_id: ConversationId::new(),
            caller_id: caller,
            receiver_id: receiver,
            payload: serde_json::json!({ "sdp": "v=0" }),
        }
    }

    #[tokio::test]
    async fn test_relay_reaches_counterpart() {
        let connections = ConnectionRegistry::new();
        let relay = CallRelay::new(connections.clone());
        let (caller, receiver) = (user(), user());

        let (tx, mut rx) = mpsc::unbounded_channel();
        connections.register(receiver, tx).await;

        relay.relay(signal(caller, receiver), caller).await;

        match rx.recv().await {
            Some(ServerEvent::CallSignal { signal }) => {
                assert_eq!(signal.caller_id, caller);
                assert_eq!(signal.event, CallEvent::Request);
            }
            other => panic!("expected call signal, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_relay_answers_back_to_caller() {
        let connections = ConnectionRegistry::new();
        let relay = CallRelay::new(connections.clone());
        let (caller, receiver) = (user(), user());

        let (tx, mut rx) = mpsc::unbounded_channel();
        connections.register(caller, tx).await;

        // Receiver accepting routes back to the caller.
        let mut accept = signal(caller, receiver);
        accept.event = CallEvent::Accept;
        relay.relay(accept, receiver).await;

        assert!(matches!(
            rx.recv().await,
            Some(ServerEvent::CallSignal { .. })
        ));
    }

    #[tokio::test]
    async fn test_relay_drops_unauthorized_sender() {
        let connections = ConnectionRegistry::new();
        let relay = CallRelay::new(connections.clone());
        let (caller, receiver, stranger) = (user(), user(), user());

        let (tx, mut rx) = mpsc::unbounded_channel();
        connections.register(receiver, tx).await;

        relay.relay(signal(caller, receiver), stranger).await;

        // Nothing forwarded.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_relay_with_offline_counterpart_is_silent() {
        let connections = ConnectionRegistry::new();
        let relay = CallRelay::new(connections);
        let (caller, receiver) = (user(), user());

        // No registered connections; must not panic or error.
        relay.relay(signal(caller, receiver), caller).await;
    }
}
