//! # agora-realtime
//!
//! The live, ephemeral side of the Agora messaging core: presence tracking,
//! typing indicators, connection registry, delivery coordination, and
//! call-signal relay.
//!
//! Nothing in this crate is durable. Losing presence or typing state on a
//! process restart is acceptable (clients reconnect and re-announce);
//! message durability lives in `agora-store`. Running more than one process
//! instance requires externalizing these maps to a shared fast store, which
//! is out of scope for the single-instance design.

pub mod calls;
pub mod connections;
pub mod delivery;
pub mod notify;
pub mod presence;
pub mod typing;

pub use calls::CallRelay;
pub use connections::ConnectionRegistry;
pub use delivery::DeliveryCoordinator;
pub use notify::{LogPushNotifier, PushNotifier};
pub use presence::PresenceRegistry;
pub use typing::TypingTracker;
