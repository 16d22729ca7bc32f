//! Session Gateway
//!
//! One WebSocket per session. A session is accepted unbound and stays inert
//! until a `join` frame binds it to an identity; from then on inbound
//! `typing` and `reaction` frames act on behalf of that identity.

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::AppState;
use crate::delivery::Hub;
use crate::error::{Error, Result};
use crate::models::{Identity, Target};
use crate::presence::{ConnectionId, ConnectionSink};
use crate::protocol::{ClientEvent, ServerEvent};

/// Server side of one client connection
pub struct Session {
    conn: ConnectionId,
    hub: Arc<Hub>,
    identity: Option<Identity>,
}

impl Session {
    /// Registers the connection with the presence registry (unbound).
    pub fn open(hub: Arc<Hub>, sink: ConnectionSink) -> Self {
        let conn = hub.registry().open(sink);
        Self {
            conn,
            hub,
            identity: None,
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.conn
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Handles one raw text frame. Failures are reported back on this connection.
    pub async fn handle_text(&mut self, text: &str) {
        let result = match serde_json::from_str::<ClientEvent>(text) {
            Ok(event) => self.handle(event).await,
            Err(e) => Err(Error::Validation(format!("unreadable frame: {}", e))),
        };
        if let Err(e) = result {
            debug!("[Gateway] connection {}: {}", self.conn, e);
            self.hub.registry().send_to_connection(
                self.conn,
                ServerEvent::Error {
                    message: e.to_string(),
                },
            );
        }
    }

    pub async fn handle(&mut self, event: ClientEvent) -> Result<()> {
        match event {
            ClientEvent::Join { identity } => {
                let identity = Identity::new(identity)?;
                self.hub.join(self.conn, &identity).await?;
                self.identity = Some(identity);
                Ok(())
            }
            ClientEvent::Typing {
                receiver,
                group_id,
                is_typing,
            } => {
                let sender = self.bound()?;
                let receiver = receiver.map(Identity::new).transpose()?;
                let target = Target::from_addressing(receiver, group_id)?;
                self.hub.typing(&sender, &target, is_typing).await?;
                Ok(())
            }
            ClientEvent::Reaction { message_id, symbol } => {
                let identity = self.bound()?;
                self.hub.react(&identity, &message_id, &symbol).await?;
                Ok(())
            }
        }
    }

    fn bound(&self) -> Result<Identity> {
        self.identity
            .clone()
            .ok_or_else(|| Error::Validation("join before sending events".to_string()))
    }

    /// Releases the connection; flips presence if it was the identity's last one.
    pub async fn close(self) {
        self.hub.disconnect(self.conn).await;
    }
}

/// GET /ws
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let buffer = state.config.outbound_buffer.max(1);
    ws.on_upgrade(move |socket| run_socket(socket, state.hub, buffer))
}

async fn run_socket(socket: WebSocket, hub: Arc<Hub>, buffer: usize) {
    let (mut outbound, mut inbound) = socket.split();
    let (tx, mut rx) = mpsc::channel::<ServerEvent>(buffer);
    let mut session = Session::open(hub, tx);
    let conn = session.connection_id();
    info!("[Gateway] connection {} opened", conn);

    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    warn!("[Gateway] Failed to encode {}: {}", event.name(), e);
                    continue;
                }
            };
            if outbound.send(WsMessage::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = inbound.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => session.handle_text(text.as_str()).await,
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("[Gateway] connection {} read error: {}", conn, e);
                break;
            }
        }
    }

    // dropping the registry's sink ends the writer
    session.close().await;
    if let Err(e) = writer.await {
        warn!("[Gateway] writer for connection {} failed: {}", conn, e);
    }
    info!("[Gateway] connection {} closed", conn);
}
