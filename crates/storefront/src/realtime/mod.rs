//! Real-time notifications.
//!
//! ```text
//! backend socket ──▶ socket::run ──▶ NotificationHub ──▶ Subscription ──▶ SSE
//!                    (per room)      (feed + broadcast)   (per browser tab)
//! ```
//!
//! Browsers also poll the unread count, which refreshes the hub's feed from
//! REST, so a dead socket only delays notifications.

pub mod events;
pub mod hub;
pub mod packet;
pub mod socket;

pub use hub::{HubEvent, NotificationHub, Publisher, Room, Subscription};
pub use packet::{EnginePacket, Handshake, PacketError, SocketPacket};
pub use socket::{Backoff, SocketError, socket_endpoint};
