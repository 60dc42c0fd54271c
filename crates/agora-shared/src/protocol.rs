use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ConversationId, DeliveryState, MessageId, UserId};

/// Commands a connected client sends over the realtime channel.
///
/// Every command is also reachable through the HTTP fallback routes; both
/// paths converge on the same store operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Send a message into a conversation.
    Send {
        conversation_id: ConversationId,
        body: String,
    },

    /// Start or stop the typing indicator in a conversation.
    Typing {
        conversation_id: ConversationId,
        is_typing: bool,
    },

    /// Mark a single message as read.
    MarkRead { message_id: MessageId },

    /// Mark every unread message addressed to the caller in a conversation.
    MarkAllRead { conversation_id: ConversationId },

    /// Relay a call-setup/teardown signal to the other participant.
    CallSignal { signal: CallSignal },
}

/// Events pushed server -> client over the realtime channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Echo to the sender once their message is durably stored.
    MessageAccepted { message: MessagePayload },

    /// A new message addressed to the receiving client.
    NewMessage { message: MessagePayload },

    /// The other participant has read messages the client sent.
    ReadReceipt {
        conversation_id: ConversationId,
        reader: UserId,
        message_ids: Vec<MessageId>,
        read_at: DateTime<Utc>,
    },

    /// The other participant started or stopped typing.
    TypingStatus {
        conversation_id: ConversationId,
        user_id: UserId,
        is_typing: bool,
    },

    /// A conversation partner went online or offline.
    PresenceChanged {
        user_id: UserId,
        online: bool,
        last_seen: DateTime<Utc>,
    },

    /// A call signal forwarded from the other participant.
    CallSignal { signal: CallSignal },

    /// A command failed; the connection stays open.
    Error { message: String },
}

/// Message representation on the wire. Built from already-committed store
/// state; the gateway never derives delivery transitions while mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePayload {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub body: String,
    pub state: DeliveryState,
    pub created_at: DateTime<Utc>,
    pub edited: bool,
}

/// Transient call-coordination signal. Never persisted; relayed verbatim
/// between the two declared parties or dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSignal {
    pub event: CallEvent,
    pub conversation_id: ConversationId,
    pub caller_id: UserId,
    pub receiver_id: UserId,
    /// Opaque payload (SDP blob, ICE candidate, ...). The core never
    /// inspects it.
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CallEvent {
    /// Ring the receiver.
    Request,
    /// Receiver accepted the call.
    Accept,
    /// Receiver declined the call.
    Reject,
    /// ICE candidate exchange.
    Candidate,
    /// Either side ended the call.
    Hangup,
}

impl CallSignal {
    /// The party the signal should be forwarded to, given who submitted it.
    /// `None` if the submitter is neither declared party.
    pub fn counterpart_of(&self, sender: UserId) -> Option<UserId> {
        if sender == self.caller_id {
            Some(self.receiver_id)
        } else if sender == self.receiver_id {
            Some(self.caller_id)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_command_roundtrip() {
        let cmd = ClientCommand::Send {
            conversation_id: ConversationId::new(),
            body: "hello".to_string(),
        };

        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("\"type\":\"send\""));

        let restored: ClientCommand = serde_json::from_str(&json).unwrap();
        if let (
            ClientCommand::Send {
                conversation_id: a, ..
            },
            ClientCommand::Send {
                conversation_id: b, ..
            },
        ) = (&cmd, &restored)
        {
            assert_eq!(a, b);
        } else {
            panic!("Command type mismatch");
        }
    }

    #[test]
    fn test_call_signal_counterpart() {
        let caller = UserId(uuid::Uuid::new_v4());
        let receiver = UserId(uuid::Uuid::new_v4());
        let stranger = UserId(uuid::Uuid::new_v4());

        let signal = CallSignal {
            event: CallEvent::Request,
            conversation_id: ConversationId::new(),
            caller_id: caller,
            receiver_id: receiver,
            payload: serde_json::json!({ "sdp": "v=0" }),
        };

        assert_eq!(signal.counterpart_of(caller), Some(receiver));
        assert_eq!(signal.counterpart_of(receiver), Some(caller));
        assert_eq!(signal.counterpart_of(stranger), None);
    }
}
