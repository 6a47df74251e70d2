//! Scripted Socket.IO v4 endpoint.
//!
//! Speaks just enough of the protocol for the storefront's notification
//! socket: sends the Engine.IO open packet, acknowledges the namespace
//! connect, and otherwise relays frames. Everything a client sends is
//! reported to the test, and the test decides what gets pushed.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use crate::within;

const OPEN_PACKET: &str = r#"0{"sid":"fake-sid","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#;
const CONNECT_ACK: &str = r#"40{"sid":"fake-socket"}"#;

/// What the server observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// A client completed the websocket upgrade.
    Connected,
    /// A text frame from a client.
    Frame(String),
    /// A client connection ended.
    Closed,
}

#[derive(Debug, Clone)]
enum Command {
    Push(String),
    DropAll,
}

/// A running fake socket server.
pub struct FakeSocketServer {
    url: Url,
    commands: broadcast::Sender<Command>,
    events: Mutex<mpsc::UnboundedReceiver<ServerEvent>>,
}

impl FakeSocketServer {
    /// Start the server on an ephemeral port.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn spawn() -> Arc<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake socket server");
        let addr = listener.local_addr().expect("fake socket address");
        let (commands, _) = broadcast::channel(32);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let accept_commands = commands.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let commands = accept_commands.subscribe();
                let events = events_tx.clone();
                tokio::spawn(serve_connection(stream, commands, events));
            }
        });

        Arc::new(Self {
            url: Url::parse(&format!("http://{addr}")).expect("fake socket URL"),
            commands,
            events: Mutex::new(events_rx),
        })
    }

    /// Origin to configure as the backend socket URL.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Send a raw Socket.IO frame to every connected client.
    pub fn push(&self, frame: impl Into<String>) {
        let _ = self.commands.send(Command::Push(frame.into()));
    }

    /// Emit an event on the root namespace to every connected client.
    pub fn emit(&self, event: &str, payload: &serde_json::Value) {
        self.push(format!("42{}", serde_json::json!([event, payload])));
    }

    /// Close every open connection from the server side.
    pub fn drop_connections(&self) {
        let _ = self.commands.send(Command::DropAll);
    }

    /// Next thing the server observed.
    ///
    /// # Panics
    ///
    /// Panics if nothing happens within the test timeout.
    pub async fn next_event(&self) -> ServerEvent {
        within(async { self.events.lock().await.recv().await })
            .await
            .expect("fake socket server stopped")
    }

    /// Skip events until a text frame arrives and return it.
    ///
    /// # Panics
    ///
    /// Panics if no frame arrives within the test timeout.
    pub async fn next_frame(&self) -> String {
        loop {
            if let ServerEvent::Frame(frame) = self.next_event().await {
                return frame;
            }
        }
    }
}

async fn serve_connection(
    stream: tokio::net::TcpStream,
    mut commands: broadcast::Receiver<Command>,
    events: mpsc::UnboundedSender<ServerEvent>,
) {
    let Ok(ws) = accept_async(stream).await else {
        return;
    };
    let _ = events.send(ServerEvent::Connected);
    let (mut sink, mut source) = ws.split();

    if sink.send(Message::text(OPEN_PACKET)).await.is_err() {
        let _ = events.send(ServerEvent::Closed);
        return;
    }

    loop {
        tokio::select! {
            incoming = source.next() => {
                let text = match incoming {
                    Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
                    Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                    Some(Ok(_)) => continue,
                };
                if text.starts_with("40") && sink.send(Message::text(CONNECT_ACK)).await.is_err() {
                    break;
                }
                let _ = events.send(ServerEvent::Frame(text));
            }
            command = commands.recv() => {
                match command {
                    Ok(Command::Push(frame)) => {
                        if sink.send(Message::text(frame)).await.is_err() {
                            break;
                        }
                    }
                    Ok(Command::DropAll) | Err(_) => {
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
        }
    }

    let _ = events.send(ServerEvent::Closed);
}
