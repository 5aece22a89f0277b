// Event transports feeding the realtime store.
//
// A transport turns a connection into an ordered stream of frames: lifecycle
// signals and raw text messages. The store never talks to the socket; it
// only sees frames, so tests can script them.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::collections::VecDeque;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::connection::TransportSignal;
use super::event::WireMessage;
use crate::config::RealtimeConfig;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("websocket protocol error: {0}")]
    Protocol(#[from] WsError),

    #[error("failed to send {what}: {reason}")]
    Send { what: String, reason: String },

    #[error("gave up reconnecting after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportFrame {
    Signal(TransportSignal),
    Text(String),
}

/// Source of frames for [`crate::realtime::RealtimeSync`].
#[async_trait]
pub trait EventTransport: Send {
    /// Next frame in arrival order. `None` once the transport has given up.
    async fn next_frame(&mut self) -> Option<TransportFrame>;

    /// Close the connection on teardown.
    async fn close(&mut self) {}
}

#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub url: String,
    pub token: Option<String>,
    /// Zero turns heartbeats off
    pub heartbeat_interval: Duration,
    pub max_reconnect_attempts: u32,
    pub reconnect_base_delay: Duration,
    pub reconnect_max_delay: Duration,
}

impl TransportSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: None,
            heartbeat_interval: Duration::from_secs(30),
            max_reconnect_attempts: 5,
            reconnect_base_delay: Duration::from_secs(1),
            reconnect_max_delay: Duration::from_secs(30),
        }
    }

    pub fn from_config(config: &RealtimeConfig, token: Option<String>) -> Self {
        Self {
            url: config.ws_url.clone(),
            token,
            heartbeat_interval: Duration::from_secs(config.heartbeat_interval_seconds),
            max_reconnect_attempts: config.max_reconnect_attempts,
            reconnect_base_delay: Duration::from_millis(config.reconnect_base_delay_ms),
            reconnect_max_delay: Duration::from_millis(config.reconnect_max_delay_ms),
        }
    }

    /// URL to dial, with the token appended as a query parameter.
    pub fn connect_url(&self) -> String {
        match &self.token {
            Some(token) => {
                let separator = if self.url.contains('?') { '&' } else { '?' };
                format!("{}{}token={}", self.url, separator, token)
            }
            None => self.url.clone(),
        }
    }
}

/// Delays between reconnect attempts: base, 2x base, 4x base ... capped at
/// the max delay, and only `max_reconnect_attempts` of them.
pub fn reconnect_delays(settings: &TransportSettings) -> impl Iterator<Item = Duration> + Send {
    // ExponentialBackoff yields 2^n * factor; halve the base so the first
    // delay equals it
    let factor = (settings.reconnect_base_delay.as_millis() as u64 / 2).max(1);
    ExponentialBackoff::from_millis(2)
        .factor(factor)
        .max_delay(settings.reconnect_max_delay)
        .take(settings.max_reconnect_attempts as usize)
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

enum Wake {
    Message(Option<Result<Message, WsError>>),
    Heartbeat,
}

/// WebSocket transport with heartbeat and bounded reconnects.
pub struct WebSocketTransport {
    settings: TransportSettings,
    stream: Option<WsStream>,
    heartbeat: Option<Interval>,
    backoff: Option<Box<dyn Iterator<Item = Duration> + Send>>,
    retrying: bool,
    finished: bool,
    pending: VecDeque<TransportFrame>,
}

impl WebSocketTransport {
    pub fn new(settings: TransportSettings) -> Self {
        Self {
            settings,
            stream: None,
            heartbeat: None,
            backoff: None,
            retrying: false,
            finished: false,
            pending: VecDeque::new(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn establish(&mut self) {
        if self.retrying {
            let settings = &self.settings;
            let delays = self.backoff.get_or_insert_with(|| {
                Box::new(reconnect_delays(settings).map(jitter))
                    as Box<dyn Iterator<Item = Duration> + Send>
            });
            match delays.next() {
                Some(delay) => {
                    debug!(delay_ms = delay.as_millis() as u64, "Waiting before reconnect");
                    tokio::time::sleep(delay).await;
                }
                None => {
                    let err = TransportError::ReconnectExhausted {
                        attempts: self.settings.max_reconnect_attempts,
                    };
                    warn!(error = %err, url = %self.settings.url, "Event feed unavailable");
                    self.finished = true;
                    return;
                }
            }
        }

        self.pending
            .push_back(TransportFrame::Signal(TransportSignal::Connecting));

        match connect_async(self.settings.connect_url()).await {
            Ok((stream, _response)) => {
                info!(url = %self.settings.url, "Event feed connected");
                let period = self.settings.heartbeat_interval;
                self.heartbeat = (!period.is_zero()).then(|| {
                    let mut heartbeat = interval_at(Instant::now() + period, period);
                    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    heartbeat
                });

                self.stream = Some(stream);
                self.retrying = false;
                self.backoff = None;
                self.pending
                    .push_back(TransportFrame::Signal(TransportSignal::Open));
            }
            Err(err) => {
                let err = TransportError::Connect {
                    url: self.settings.url.clone(),
                    reason: err.to_string(),
                };
                warn!(error = %err, "Event feed connection failed");
                self.retrying = true;
                self.pending
                    .push_back(TransportFrame::Signal(TransportSignal::Error));
            }
        }
    }

    fn drop_connection(&mut self, reconnect: bool) {
        self.stream = None;
        self.heartbeat = None;
        self.retrying = reconnect;
        if !reconnect {
            self.finished = true;
        }
    }

    async fn send_text(&mut self, message: &WireMessage) -> Result<(), TransportError> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(());
        };
        let text = serde_json::to_string(message).map_err(|e| TransportError::Send {
            what: message.message_type.clone(),
            reason: e.to_string(),
        })?;
        stream.send(Message::Text(text)).await?;
        Ok(())
    }

    /// Wait for the next socket message or heartbeat tick and turn it into
    /// a frame. `None` means nothing worth forwarding happened.
    async fn poll_connection(&mut self) -> Option<TransportFrame> {
        let wake = {
            let Some(stream) = self.stream.as_mut() else {
                return None;
            };
            tokio::select! {
                message = stream.next() => Wake::Message(message),
                _ = next_tick(self.heartbeat.as_mut()) => Wake::Heartbeat,
            }
        };

        match wake {
            Wake::Heartbeat => {
                if let Err(err) = self.send_text(&WireMessage::ping()).await {
                    warn!(error = %err, "Heartbeat failed");
                    self.drop_connection(true);
                    return Some(TransportFrame::Signal(TransportSignal::Error));
                }
                debug!("Heartbeat sent");
                None
            }
            Wake::Message(Some(Ok(Message::Text(text)))) => self.handle_text(text).await,
            Wake::Message(Some(Ok(Message::Close(frame)))) => {
                info!(frame = ?frame, "Event feed closed by server");
                self.drop_connection(false);
                Some(TransportFrame::Signal(TransportSignal::Close { clean: true }))
            }
            // binary and control frames are not part of the feed
            Wake::Message(Some(Ok(_))) => None,
            Wake::Message(None)
            | Wake::Message(Some(Err(WsError::Protocol(
                ProtocolError::ResetWithoutClosingHandshake,
            )))) => {
                warn!("Event feed dropped without a close frame");
                self.drop_connection(true);
                Some(TransportFrame::Signal(TransportSignal::Close { clean: false }))
            }
            Wake::Message(Some(Err(err))) => {
                let err = TransportError::from(err);
                warn!(error = %err, "Event feed errored");
                self.drop_connection(true);
                Some(TransportFrame::Signal(TransportSignal::Error))
            }
        }
    }

    async fn handle_text(&mut self, text: String) -> Option<TransportFrame> {
        let message_type = serde_json::from_str::<WireMessage>(&text)
            .map(|message| message.message_type)
            .unwrap_or_default();

        match message_type.as_str() {
            "pong" => {
                debug!("Heartbeat acknowledged");
                None
            }
            "ping" => {
                let pong = WireMessage::new("pong", serde_json::Value::Null);
                if let Err(err) = self.send_text(&pong).await {
                    warn!(error = %err, "Failed to answer server ping");
                }
                None
            }
            _ => Some(TransportFrame::Text(text)),
        }
    }
}

/// Next heartbeat tick, or never when heartbeats are off.
async fn next_tick(heartbeat: Option<&mut Interval>) {
    match heartbeat {
        Some(heartbeat) => {
            heartbeat.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[async_trait]
impl EventTransport for WebSocketTransport {
    async fn next_frame(&mut self) -> Option<TransportFrame> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Some(frame);
            }
            if self.finished {
                return None;
            }
            if self.stream.is_none() {
                self.establish().await;
                continue;
            }
            if let Some(frame) = self.poll_connection().await {
                return Some(frame);
            }
        }
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(err) = stream.close(None).await {
                debug!(error = %err, "Error while closing event feed");
            }
        }
        self.heartbeat = None;
        self.finished = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    const UPDATE: &str = r#"{"type":"bid_updated","payload":{"id":1,"status":"submitted"}}"#;

    async fn feed_listener() -> (TcpListener, TransportSettings) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/ws/notifications/", listener.local_addr().unwrap());
        (listener, TransportSettings::new(url))
    }

    async fn accept_feed(listener: &TcpListener) -> WebSocketStream<TcpStream> {
        let (socket, _) = listener.accept().await.unwrap();
        accept_async(socket).await.unwrap()
    }

    /// Read client messages until the next text frame.
    async fn next_text(ws: &mut WebSocketStream<TcpStream>) -> Option<WireMessage> {
        while let Some(Ok(message)) = ws.next().await {
            if let Message::Text(text) = message {
                return serde_json::from_str(&text).ok();
            }
        }
        None
    }

    async fn collect_frames(transport: &mut WebSocketTransport) -> Vec<TransportFrame> {
        tokio::time::timeout(Duration::from_secs(10), async {
            let mut frames = Vec::new();
            while let Some(frame) = transport.next_frame().await {
                frames.push(frame);
            }
            frames
        })
        .await
        .expect("transport never finished")
    }

    fn signal(signal: TransportSignal) -> TransportFrame {
        TransportFrame::Signal(signal)
    }

    #[test]
    fn test_reconnect_delays_double_and_stop() {
        let settings = TransportSettings::new("ws://localhost:8000/ws/notifications/");
        let delays: Vec<Duration> = reconnect_delays(&settings).collect();

        assert_eq!(delays.len(), 5);
        assert_eq!(delays[0], Duration::from_secs(1));
        assert_eq!(delays[1], Duration::from_secs(2));
        assert_eq!(delays[4], Duration::from_secs(16));
    }

    #[test]
    fn test_reconnect_delays_are_capped() {
        let mut settings = TransportSettings::new("ws://localhost/ws/");
        settings.max_reconnect_attempts = 8;
        settings.reconnect_max_delay = Duration::from_secs(10);

        let delays: Vec<Duration> = reconnect_delays(&settings).collect();
        assert_eq!(delays.len(), 8);
        assert!(delays.iter().all(|d| *d <= Duration::from_secs(10)));
    }

    #[test]
    fn test_connect_url_appends_token() {
        let mut settings = TransportSettings::new("ws://localhost/ws/notifications/");
        assert_eq!(settings.connect_url(), "ws://localhost/ws/notifications/");

        settings.token = Some("abc".to_string());
        assert_eq!(settings.connect_url(), "ws://localhost/ws/notifications/?token=abc");

        settings.url = "ws://localhost/ws/?v=2".to_string();
        assert_eq!(settings.connect_url(), "ws://localhost/ws/?v=2&token=abc");
    }

    #[tokio::test]
    async fn test_gives_up_when_feed_is_unreachable() {
        let mut settings = TransportSettings::new("ws://127.0.0.1:1/ws/");
        settings.max_reconnect_attempts = 1;
        settings.reconnect_base_delay = Duration::from_millis(2);
        let mut transport = WebSocketTransport::new(settings);

        let mut frames = Vec::new();
        while let Some(frame) = transport.next_frame().await {
            frames.push(frame);
        }

        assert_eq!(
            frames,
            vec![
                TransportFrame::Signal(TransportSignal::Connecting),
                TransportFrame::Signal(TransportSignal::Error),
                TransportFrame::Signal(TransportSignal::Connecting),
                TransportFrame::Signal(TransportSignal::Error),
            ]
        );
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn test_forwards_text_and_ends_on_server_close() {
        let (listener, settings) = feed_listener().await;
        let server = tokio::spawn(async move {
            let mut ws = accept_feed(&listener).await;
            ws.send(Message::Text(UPDATE.to_string())).await.unwrap();
            ws.send(Message::Text(r#"{"type":"pong"}"#.to_string()))
                .await
                .unwrap();
            ws.close(None).await.ok();
        });
        let mut transport = WebSocketTransport::new(settings);

        let frames = collect_frames(&mut transport).await;
        server.await.unwrap();

        assert_eq!(
            frames,
            vec![
                signal(TransportSignal::Connecting),
                signal(TransportSignal::Open),
                TransportFrame::Text(UPDATE.to_string()),
                signal(TransportSignal::Close { clean: true }),
            ]
        );
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn test_answers_server_ping_with_pong() {
        let (listener, settings) = feed_listener().await;
        let server = tokio::spawn(async move {
            let mut ws = accept_feed(&listener).await;
            ws.send(Message::Text(r#"{"type":"ping"}"#.to_string()))
                .await
                .unwrap();
            let reply = next_text(&mut ws).await;
            ws.close(None).await.ok();
            reply
        });
        let mut transport = WebSocketTransport::new(settings);

        let frames = collect_frames(&mut transport).await;
        let reply = server.await.unwrap().expect("client never replied");

        assert_eq!(reply.message_type, "pong");
        assert!(!frames.iter().any(|f| matches!(f, TransportFrame::Text(_))));
    }

    #[tokio::test]
    async fn test_sends_ping_on_heartbeat_tick() {
        let (listener, mut settings) = feed_listener().await;
        settings.heartbeat_interval = Duration::from_millis(50);
        let server = tokio::spawn(async move {
            let mut ws = accept_feed(&listener).await;
            let heartbeat = next_text(&mut ws).await;
            ws.close(None).await.ok();
            heartbeat
        });
        let mut transport = WebSocketTransport::new(settings);

        let frames = collect_frames(&mut transport).await;
        let heartbeat = server.await.unwrap().expect("no heartbeat arrived");

        assert_eq!(heartbeat, WireMessage::ping());
        assert_eq!(frames.last(), Some(&signal(TransportSignal::Close { clean: true })));
    }

    #[tokio::test]
    async fn test_zero_heartbeat_interval_disables_pings() {
        let (listener, mut settings) = feed_listener().await;
        settings.heartbeat_interval = Duration::ZERO;
        let server = tokio::spawn(async move {
            let mut ws = accept_feed(&listener).await;
            tokio::time::sleep(Duration::from_millis(100)).await;
            ws.send(Message::Text(UPDATE.to_string())).await.unwrap();
            ws.close(None).await.ok();
            let mut received = Vec::new();
            while let Some(Ok(message)) = ws.next().await {
                if let Message::Text(text) = message {
                    received.push(text);
                }
            }
            received
        });
        let mut transport = WebSocketTransport::new(settings);

        let frames = collect_frames(&mut transport).await;
        let received = server.await.unwrap();

        assert_eq!(
            frames,
            vec![
                signal(TransportSignal::Connecting),
                signal(TransportSignal::Open),
                TransportFrame::Text(UPDATE.to_string()),
                signal(TransportSignal::Close { clean: true }),
            ]
        );
        assert!(received.is_empty());
    }

    #[test]
    fn test_zero_heartbeat_from_config_is_kept_as_off() {
        let mut config = crate::config::BidflowConfig::default().realtime;
        config.heartbeat_interval_seconds = 0;
        let settings = TransportSettings::from_config(&config, None);
        assert!(settings.heartbeat_interval.is_zero());
    }

    #[tokio::test]
    async fn test_dropped_stream_reconnects_and_resets_attempts() {
        let (listener, mut settings) = feed_listener().await;
        // one attempt per outage: only a reset counter survives two drops
        settings.max_reconnect_attempts = 1;
        settings.reconnect_base_delay = Duration::from_millis(4);
        settings.reconnect_max_delay = Duration::from_millis(8);
        let server = tokio::spawn(async move {
            for _ in 0..2 {
                drop(accept_feed(&listener).await);
            }
            let mut ws = accept_feed(&listener).await;
            ws.send(Message::Text(UPDATE.to_string())).await.unwrap();
            ws.close(None).await.ok();
        });
        let mut transport = WebSocketTransport::new(settings);

        let frames = collect_frames(&mut transport).await;
        server.await.unwrap();

        let dropped = [
            signal(TransportSignal::Connecting),
            signal(TransportSignal::Open),
            signal(TransportSignal::Close { clean: false }),
        ];
        let mut expected = Vec::new();
        expected.extend(dropped.clone());
        expected.extend(dropped);
        expected.extend([
            signal(TransportSignal::Connecting),
            signal(TransportSignal::Open),
            TransportFrame::Text(UPDATE.to_string()),
            signal(TransportSignal::Close { clean: true }),
        ]);
        assert_eq!(frames, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_waits_on_the_paused_clock() {
        let mut settings = TransportSettings::new("ws://127.0.0.1:1/ws/");
        settings.max_reconnect_attempts = 3;
        settings.reconnect_base_delay = Duration::from_secs(10);
        settings.reconnect_max_delay = Duration::from_secs(20);
        let mut transport = WebSocketTransport::new(settings);
        let started = Instant::now();
        let wall = std::time::Instant::now();

        // no timeout wrapper: a pending timer would let the paused clock jump
        let mut frames = Vec::new();
        while let Some(frame) = transport.next_frame().await {
            frames.push(frame);
        }

        assert_eq!(frames.len(), 8);
        assert!(started.elapsed() <= Duration::from_secs(10 + 20 + 20));
        assert!(wall.elapsed() < Duration::from_secs(10));
    }
}
