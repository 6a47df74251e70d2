//! Upstream Socket.IO connection for one room.
//!
//! The task connects over the websocket transport, authenticates with the
//! shopper's bearer token, joins the room and forwards the room's events to
//! the hub until told to stop. Dropped connections are retried with
//! exponential backoff.

use std::time::Duration;

use chrono::Utc;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use thiserror::Error;
use tokio::sync::watch;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, info, warn};
use url::Url;

use super::events::{self, JOIN_ADMIN, JOIN_CUSTOMER};
use super::hub::{Publisher, Room};
use super::packet::{EnginePacket, PacketError, SocketPacket};
use crate::models::BearerToken;

/// First reconnect delay.
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
/// Reconnect delay ceiling.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);
/// Time allowed for the websocket upgrade and the Engine.IO open packet.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that end one connection attempt.
#[derive(Debug, Error)]
pub enum SocketError {
    #[error("invalid socket URL: {0}")]
    Endpoint(String),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("bad packet: {0}")]
    Packet(#[from] PacketError),

    #[error("server refused the connection: {0}")]
    Rejected(String),

    #[error("connection closed by server")]
    Closed,

    #[error("no traffic for {0:?}")]
    Timeout(Duration),
}

/// Where and as whom to connect.
#[derive(Debug, Clone)]
pub struct SocketTarget {
    /// Backend origin (`http(s)://` or `ws(s)://`).
    pub base_url: Url,
    pub token: BearerToken,
    pub room: Room,
}

/// The websocket URL for a backend origin.
///
/// # Errors
///
/// Returns [`SocketError::Endpoint`] for URLs that cannot carry a websocket.
pub fn socket_endpoint(base: &Url) -> Result<Url, SocketError> {
    let scheme = match base.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => return Err(SocketError::Endpoint(format!("unsupported scheme {other}"))),
    };
    let mut url = base.clone();
    url.set_scheme(scheme)
        .map_err(|()| SocketError::Endpoint(base.to_string()))?;
    url.set_fragment(None);
    let path = format!("{}/socket.io/", url.path().trim_end_matches('/'));
    url.set_path(&path);
    url.set_query(Some("EIO=4&transport=websocket"));
    Ok(url)
}

/// Exponential reconnect delay.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    #[must_use]
    pub const fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// Delay before the next attempt; doubles up to the ceiling.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    /// Back to the initial delay after a successful join.
    pub const fn reset(&mut self) {
        self.current = self.initial;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(INITIAL_BACKOFF, MAX_BACKOFF)
    }
}

fn join_packet(room: &Room) -> SocketPacket {
    match room {
        Room::Customer(user_id) => SocketPacket::event(JOIN_CUSTOMER, vec![json!(user_id.as_str())]),
        Room::Admin => SocketPacket::event(JOIN_ADMIN, Vec::new()),
    }
}

/// Run the upstream connection until `shutdown` flips or the room is gone.
pub async fn run(target: SocketTarget, publisher: Publisher, mut shutdown: watch::Receiver<bool>) {
    let room = target.room.clone();
    let endpoint = match socket_endpoint(&target.base_url) {
        Ok(endpoint) => endpoint,
        Err(e) => {
            tracing::error!(%room, error = %e, "Cannot open notification socket");
            return;
        }
    };

    let mut backoff = Backoff::default();
    loop {
        if *shutdown.borrow() {
            break;
        }
        match listen(&endpoint, &target, &publisher, &mut shutdown, &mut backoff).await {
            Ok(()) => break,
            Err(e) => warn!(%room, error = %e, "Notification socket dropped"),
        }
        if !publisher.set_live(false) {
            break;
        }

        let delay = backoff.next_delay();
        debug!(%room, ?delay, "Reconnecting notification socket");
        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => break,
        }
    }

    publisher.set_live(false);
    debug!(%room, "Notification socket task stopped");
}

/// One connection. `Ok` means stop for good; `Err` means retry.
async fn listen(
    endpoint: &Url,
    target: &SocketTarget,
    publisher: &Publisher,
    shutdown: &mut watch::Receiver<bool>,
    backoff: &mut Backoff,
) -> Result<(), SocketError> {
    let (ws, _) = tokio::time::timeout(HANDSHAKE_TIMEOUT, connect_async(endpoint.as_str()))
        .await
        .map_err(|_| SocketError::Timeout(HANDSHAKE_TIMEOUT))??;
    let (mut sink, mut stream) = ws.split();

    // Until the open packet says otherwise.
    let mut idle_limit = HANDSHAKE_TIMEOUT;

    loop {
        let frame = tokio::select! {
            _ = shutdown.changed() => {
                let _ = sink.send(Message::Close(None)).await;
                return Ok(());
            }
            frame = tokio::time::timeout(idle_limit, stream.next()) => {
                frame.map_err(|_| SocketError::Timeout(idle_limit))?
            }
        };

        let text = match frame.ok_or(SocketError::Closed)?? {
            Message::Text(text) => text,
            Message::Close(_) => return Err(SocketError::Closed),
            _ => continue,
        };

        let packet = match EnginePacket::decode(text.as_str()) {
            Ok(packet) => packet,
            Err(e) => {
                warn!(room = %target.room, error = %e, "Skipping undecodable packet");
                continue;
            }
        };

        let reply = match packet {
            EnginePacket::Open(handshake) => {
                idle_limit = Duration::from_millis(handshake.ping_interval + handshake.ping_timeout);
                debug!(sid = %handshake.sid, ?idle_limit, "Engine.IO session opened");
                let auth = json!({ "token": target.token.expose() });
                Some(EnginePacket::Message(SocketPacket::connect(Some(auth))))
            }
            EnginePacket::Ping(payload) => Some(EnginePacket::Pong(payload)),
            EnginePacket::Message(SocketPacket::Connect { .. }) => {
                if !publisher.set_live(true) {
                    return Ok(());
                }
                backoff.reset();
                info!(room = %target.room, "Joined notification room");
                Some(EnginePacket::Message(join_packet(&target.room)))
            }
            EnginePacket::Message(SocketPacket::Event { name, args, .. }) => {
                if events::is_consumed(&target.room, &name) {
                    let notification = events::to_notification(&name, &args, Utc::now());
                    if !publisher.publish(notification) {
                        return Ok(());
                    }
                } else {
                    debug!(room = %target.room, event = %name, "Ignoring event");
                }
                None
            }
            EnginePacket::Message(SocketPacket::ConnectError { data, .. }) => {
                let reason = data
                    .as_ref()
                    .and_then(|d| d.get("message"))
                    .and_then(|m| m.as_str())
                    .unwrap_or("unknown reason")
                    .to_string();
                return Err(SocketError::Rejected(reason));
            }
            EnginePacket::Message(SocketPacket::Disconnect { .. }) | EnginePacket::Close => {
                return Err(SocketError::Closed);
            }
            EnginePacket::Pong(_) | EnginePacket::Noop => None,
        };

        if let Some(reply) = reply {
            sink.send(Message::text(reply.encode())).await?;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use shopfront_core::UserId;

    #[test]
    fn test_socket_endpoint() {
        let http = Url::parse("http://localhost:5000").unwrap();
        assert_eq!(
            socket_endpoint(&http).unwrap().as_str(),
            "ws://localhost:5000/socket.io/?EIO=4&transport=websocket"
        );

        let https = Url::parse("https://api.example.com/base/").unwrap();
        assert_eq!(
            socket_endpoint(&https).unwrap().as_str(),
            "wss://api.example.com/base/socket.io/?EIO=4&transport=websocket"
        );

        let ftp = Url::parse("ftp://example.com").unwrap();
        assert!(socket_endpoint(&ftp).is_err());
    }

    #[test]
    fn test_backoff_doubles_to_ceiling_and_resets() {
        let mut backoff = Backoff::default();
        let delays: Vec<u64> = (0..7).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 30, 30]);
        backoff.reset();
        assert_eq!(backoff.next_delay(), INITIAL_BACKOFF);
    }

    #[test]
    fn test_join_packets() {
        let customer = EnginePacket::Message(join_packet(&Room::Customer(UserId::new("u7"))));
        assert_eq!(customer.encode(), r#"42["joinCustomer","u7"]"#);
        let admin = EnginePacket::Message(join_packet(&Room::Admin));
        assert_eq!(admin.encode(), r#"42["joinAdmin"]"#);
    }
}
