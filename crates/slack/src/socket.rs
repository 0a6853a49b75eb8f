use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::events::{
    parse_socket_frame, EventContext, EventDispatcher, SlackEnvelope, SocketFrame,
};
use crate::transport::{SlackWebClient, TransportError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

#[async_trait]
pub trait SocketTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    /// Next event envelope; `None` once the stream is closed for good.
    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError>;
    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

type SlackSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Socket Mode over a real websocket. Slack-initiated refreshes and dropped
/// streams are handled by reconnecting in place.
pub struct WebSocketTransport {
    client: SlackWebClient,
    socket: Mutex<Option<SlackSocket>>,
}

impl WebSocketTransport {
    pub fn new(client: SlackWebClient) -> Self {
        Self { client, socket: Mutex::new(None) }
    }

    async fn open(&self) -> Result<SlackSocket, TransportError> {
        let url = self.client.open_socket_url().await?;
        let (socket, _) = connect_async(url.as_str())
            .await
            .map_err(|error| TransportError::Connect(error.to_string()))?;
        Ok(socket)
    }
}

#[async_trait]
impl SocketTransport for WebSocketTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let socket = self.open().await?;
        *self.socket.lock().await = Some(socket);
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<SlackEnvelope>, TransportError> {
        let mut guard = self.socket.lock().await;
        loop {
            let Some(socket) = guard.as_mut() else {
                return Err(TransportError::Receive("socket is not connected".to_owned()));
            };

            let message = match socket.next().await {
                Some(Ok(message)) => message,
                Some(Err(error)) => return Err(TransportError::Receive(error.to_string())),
                None => {
                    info!(event_name = "ingress.slack.socket_closed", "socket stream ended; reconnecting");
                    *guard = Some(self.open().await?);
                    continue;
                }
            };

            match message {
                WsMessage::Text(text) => match parse_socket_frame(&text) {
                    Ok(SocketFrame::Envelope(envelope)) => return Ok(Some(envelope)),
                    Ok(SocketFrame::Hello) => debug!(event_name = "ingress.slack.hello", "socket mode hello"),
                    Ok(SocketFrame::Disconnect { reason }) => {
                        info!(event_name = "ingress.slack.refresh", reason = %reason, "slack requested reconnect");
                        *guard = Some(self.open().await?);
                    }
                    Err(error) => {
                        warn!(event_name = "ingress.slack.bad_frame", error = %error, "skipping socket frame");
                    }
                },
                WsMessage::Ping(payload) => {
                    socket
                        .send(WsMessage::Pong(payload))
                        .await
                        .map_err(|error| TransportError::Receive(error.to_string()))?;
                }
                WsMessage::Close(_) => {
                    info!(event_name = "ingress.slack.socket_closed", "socket closed by slack; reconnecting");
                    *guard = Some(self.open().await?);
                }
                _ => {}
            }
        }
    }

    async fn acknowledge(&self, envelope_id: &str) -> Result<(), TransportError> {
        let mut guard = self.socket.lock().await;
        let socket = guard
            .as_mut()
            .ok_or_else(|| TransportError::Acknowledge("socket is not connected".to_owned()))?;
        let ack = json!({ "envelope_id": envelope_id }).to_string();
        socket
            .send(WsMessage::Text(ack))
            .await
            .map_err(|error| TransportError::Acknowledge(error.to_string()))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        if let Some(mut socket) = self.socket.lock().await.take() {
            socket.close(None).await.map_err(|error| TransportError::Disconnect(error.to_string()))?;
        }
        Ok(())
    }
}

struct Session {
    delivered: usize,
    outcome: Result<(), TransportError>,
}

pub struct SocketModeRunner {
    transport: Arc<dyn SocketTransport>,
    dispatcher: Arc<EventDispatcher>,
    reconnect_policy: ReconnectPolicy,
}

impl SocketModeRunner {
    pub fn new(
        transport: Arc<dyn SocketTransport>,
        dispatcher: Arc<EventDispatcher>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher, reconnect_policy }
    }

    /// Runs sessions until the stream closes or one outage exhausts its retries.
    ///
    /// A session that delivered at least one envelope resets the retry count.
    pub async fn start(&self) -> Result<()> {
        let mut attempt = 0;
        loop {
            let session = self.connect_and_pump(attempt).await;
            let Err(transport_error) = session.outcome else {
                return Ok(());
            };

            if session.delivered > 0 {
                attempt = 0;
            }

            warn!(
                attempt,
                max_retries = self.reconnect_policy.max_retries,
                delivered = session.delivered,
                error = %transport_error,
                "socket mode transport failed"
            );

            if attempt >= self.reconnect_policy.max_retries {
                warn!(
                    max_retries = self.reconnect_policy.max_retries,
                    "socket mode retries exhausted; continuing process without crash"
                );
                return Ok(());
            }

            let delay = self.reconnect_policy.backoff(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempt += 1;
        }
    }

    async fn connect_and_pump(&self, attempt: u32) -> Session {
        info!(attempt, "opening socket mode transport connection");
        if let Err(error) = self.transport.connect().await {
            return Session { delivered: 0, outcome: Err(error) };
        }
        info!(attempt, "socket mode transport connected");

        let mut in_flight = JoinSet::new();
        let mut delivered = 0;
        let outcome = self.pump(&mut in_flight, &mut delivered).await;
        while in_flight.join_next().await.is_some() {}
        Session { delivered, outcome }
    }

    async fn pump(
        &self,
        in_flight: &mut JoinSet<()>,
        delivered: &mut usize,
    ) -> Result<(), TransportError> {
        loop {
            while in_flight.try_join_next().is_some() {}

            let Some(envelope) = self.transport.next_envelope().await? else {
                info!("socket mode transport stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };
            *delivered += 1;

            info!(
                event_name = "ingress.slack.envelope_received",
                envelope_id = %envelope.envelope_id,
                event_type = ?envelope.event.event_type(),
                correlation_id = %envelope.envelope_id,
                "received slack envelope"
            );

            // Slack redelivers anything not acked within three seconds.
            if let Err(error) = self.transport.acknowledge(&envelope.envelope_id).await {
                warn!(
                    event_name = "ingress.slack.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    error = %error,
                    "failed to acknowledge slack envelope"
                );
            } else {
                debug!(
                    event_name = "ingress.slack.ack_sent",
                    envelope_id = %envelope.envelope_id,
                    correlation_id = %envelope.envelope_id,
                    "acknowledged slack envelope"
                );
            }

            let dispatcher = self.dispatcher.clone();
            in_flight.spawn(async move {
                let context = EventContext::new(envelope.envelope_id.clone());
                if let Err(error) = dispatcher.dispatch(&envelope, &context).await {
                    warn!(
                        envelope_id = %envelope.envelope_id,
                        correlation_id = %envelope.envelope_id,
                        error = %error,
                        "event dispatch failed; continuing socket loop"
                    );
                }
            });
        }
    }
}
