use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::events::{ClientEvent, ServerEvent};
use super::token::RealtimeCredentials;

const REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";

/// What the event loop receives from the transport: either a decoded
/// provider event or notice that the connection is gone.
#[derive(Debug)]
pub enum TransportEvent {
    Event(ServerEvent),
    Closed { code: u16, reason: String },
}

/// Bidirectional event transport to the realtime provider.
///
/// The session event loop is written against this trait so tests can drive
/// it with a scripted transport instead of a live connection.
#[async_trait::async_trait]
pub trait EventTransport: Send {
    /// Send one outbound event. Fire-and-forget from the caller's view.
    async fn send(&mut self, event: ClientEvent) -> Result<()>;

    /// Receive the next inbound event; `None` once the stream is exhausted.
    async fn next_event(&mut self) -> Option<TransportEvent>;

    /// Close with a normal-closure code. Idempotent.
    async fn close(&mut self) -> Result<()>;
}

/// WebSocket connection to the realtime speech provider.
pub struct RealtimeConnection {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    closed: bool,
}

impl RealtimeConnection {
    /// Dial the provider and complete the WebSocket handshake.
    pub async fn connect(credentials: &RealtimeCredentials) -> Result<Self> {
        let url = format!("{}?model={}", REALTIME_URL, credentials.model);

        let mut request = url
            .as_str()
            .into_client_request()
            .context("invalid realtime endpoint URL")?;

        let auth = HeaderValue::from_str(&format!("Bearer {}", credentials.api_key))
            .context("API key is not a valid header value")?;
        request.headers_mut().insert("Authorization", auth);
        request
            .headers_mut()
            .insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));

        info!("Connecting to realtime provider (model={})", credentials.model);

        let (ws, _) = connect_async(request)
            .await
            .context("realtime WebSocket handshake failed")?;

        info!("Connected to realtime provider");

        Ok(Self { ws, closed: false })
    }
}

#[async_trait::async_trait]
impl EventTransport for RealtimeConnection {
    async fn send(&mut self, event: ClientEvent) -> Result<()> {
        let payload = serde_json::to_string(&event)?;
        self.ws
            .send(Message::Text(payload))
            .await
            .context("failed to send realtime event")?;
        Ok(())
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<ServerEvent>(&text) {
                    Ok(event) => return Some(TransportEvent::Event(event)),
                    Err(e) => {
                        warn!("Dropping malformed provider event: {}", e);
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    self.closed = true;
                    let (code, reason) = match frame {
                        Some(CloseFrame { code, reason }) => {
                            (u16::from(code), reason.to_string())
                        }
                        None => (1005, String::new()),
                    };
                    return Some(TransportEvent::Closed { code, reason });
                }
                Some(Ok(_)) => {
                    // Ping/pong and binary frames carry nothing for us.
                    continue;
                }
                Some(Err(e)) => {
                    self.closed = true;
                    return Some(TransportEvent::Closed {
                        code: 1006,
                        reason: format!("transport error: {}", e),
                    });
                }
                None => {
                    self.closed = true;
                    return None;
                }
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "Interview ended".into(),
        };

        // The peer may already be gone; a failed close is not an error.
        if let Err(e) = self.ws.close(Some(frame)).await {
            debug!("Close handshake skipped: {}", e);
        }

        Ok(())
    }
}
