use crate::{
    errors::{connection_error::ConnectionError, packet_error::PacketError},
    events::{ClientEvent, ServerEvent},
    message::Message,
    models::client::ClientId,
    socket::packet::{Handshake, Packet},
};
use axum::extract::ws::{self, Utf8Bytes, WebSocket};
use log::{error, info, trace, warn};
use serde_json::json;
use std::{
    collections::HashMap,
    future, mem,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::{
    sync::{mpsc, oneshot},
    time::{self, Instant, Interval},
};

/// Packets in a polling payload are joined by the record separator.
pub const PAYLOAD_SEPARATOR: &str = "\x1e";

/// Polling connections by Engine.IO `sid`.
pub type EngineSessions = Arc<Mutex<HashMap<String, mpsc::Sender<TransportEvent>>>>;

#[derive(Clone, Copy, Debug)]
pub struct SocketSettings {
    pub ping_interval_ms: u64,
    pub ping_timeout_ms: u64,
    pub max_payload: usize,
}

impl SocketSettings {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }

    /// How long a client may go without answering, or without reading what is sent to it.
    pub fn deadline(&self) -> Duration {
        self.ping_interval() + self.ping_timeout()
    }
}

/// HTTP requests handed to a polling connection.
pub enum TransportEvent {
    /// Body of a polling POST.
    Post(String),
    /// A polling GET, answered with the next payload.
    Poll(oneshot::Sender<String>),
    /// A WebSocket opened with this connection's `sid`.
    Upgrade(WebSocket),
}

enum Transport {
    Polling {
        queue: Vec<String>,
        pending: Option<oneshot::Sender<String>>,
    },
    WebSocket(WebSocket),
}

/// One game client's Engine.IO connection, from handshake to disconnect.
pub struct SocketConnection {
    coordinator_tx: mpsc::Sender<Message>,
    settings: SocketSettings,
    sid: String,
    client_id: Option<ClientId>,
    outbound_rx: Option<mpsc::UnboundedReceiver<ServerEvent>>,
    heartbeat: Interval,
    last_pong: Instant,
    transport: Transport,
    transport_rx: Option<mpsc::Receiver<TransportEvent>>,
    engine_sessions: Option<EngineSessions>,
}

impl SocketConnection {
    fn new(
        coordinator_tx: mpsc::Sender<Message>,
        settings: SocketSettings,
        transport: Transport,
    ) -> Self {
        SocketConnection {
            coordinator_tx,
            settings,
            sid: guid_create::GUID::rand().to_string().to_lowercase(),
            client_id: None,
            outbound_rx: None,
            heartbeat: time::interval_at(
                Instant::now() + settings.ping_interval(),
                settings.ping_interval(),
            ),
            last_pong: Instant::now(),
            transport,
            transport_rx: None,
            engine_sessions: None,
        }
    }

    pub fn websocket(
        coordinator_tx: mpsc::Sender<Message>,
        settings: SocketSettings,
        socket: WebSocket,
    ) -> Self {
        SocketConnection::new(coordinator_tx, settings, Transport::WebSocket(socket))
    }

    /// A connection opened over long-polling. It leaves `engine_sessions` when it ends.
    pub fn polling(
        coordinator_tx: mpsc::Sender<Message>,
        settings: SocketSettings,
        transport_rx: mpsc::Receiver<TransportEvent>,
        engine_sessions: EngineSessions,
    ) -> Self {
        let mut connection = SocketConnection::new(
            coordinator_tx,
            settings,
            Transport::Polling {
                queue: Vec::new(),
                pending: None,
            },
        );

        connection.transport_rx = Some(transport_rx);
        connection.engine_sessions = Some(engine_sessions);
        connection
    }

    pub fn sid(&self) -> &str {
        &self.sid
    }

    pub async fn run(mut self) {
        if let Err(error) = self.open().await {
            error!("Could not open socket {}: {error}", self.sid);
        } else {
            loop {
                if let Err(error) = self.listen().await {
                    match error {
                        ConnectionError::Closed => info!("Socket {} closed", self.sid),
                        error => error!("Closing socket {}: {error}", self.sid),
                    }

                    self.disconnect().await;
                    break;
                }
            }
        }

        if let Some(engine_sessions) = &self.engine_sessions {
            match engine_sessions.lock() {
                Ok(mut sessions) => {
                    sessions.remove(&self.sid);
                }
                Err(error) => error!("Could not forget socket {}: {error}", self.sid),
            }
        }
    }

    async fn open(&mut self) -> Result<(), ConnectionError> {
        let upgrades = match self.transport {
            Transport::Polling { .. } => vec!["websocket".to_string()],
            Transport::WebSocket(_) => vec![],
        };

        let handshake = Handshake {
            sid: self.sid.clone(),
            upgrades,
            ping_interval: self.settings.ping_interval_ms,
            ping_timeout: self.settings.ping_timeout_ms,
            max_payload: self.settings.max_payload,
        };

        self.send_packet(Packet::Open(handshake)).await
    }

    pub async fn listen(&mut self) -> Result<(), ConnectionError> {
        tokio::select! {
            received = next_frame(&mut self.transport) => {
                self.handle_frame(received).await?
            }

            event = recv(&mut self.transport_rx) => {
                match event.ok_or(ConnectionError::Closed)? {
                    TransportEvent::Post(body) => self.handle_post(&body).await?,
                    TransportEvent::Poll(reply) => self.poll(reply),
                    TransportEvent::Upgrade(socket) => self.upgrade(socket).await?,
                }
            }

            event = recv_unbounded(&mut self.outbound_rx) => {
                let event = event.ok_or(ConnectionError::CoordinatorGone)?;
                let packet = Packet::event(&event).map_err(ConnectionError::Encode)?;
                self.send_packet(packet).await?
            }

            _ = self.heartbeat.tick() => {
                self.ping().await?
            }
        }

        Ok(())
    }

    async fn ping(&mut self) -> Result<(), ConnectionError> {
        if self.last_pong.elapsed() > self.settings.deadline() {
            return Err(ConnectionError::PingTimeout);
        }

        self.send_packet(Packet::Ping).await
    }

    async fn handle_frame(
        &mut self,
        received: Option<Result<ws::Message, axum::Error>>,
    ) -> Result<(), ConnectionError> {
        let frame = match received {
            Some(Ok(frame)) => frame,
            Some(Err(error)) => return Err(ConnectionError::Receive(error)),
            None => return Err(ConnectionError::Closed),
        };

        let text = match frame {
            ws::Message::Text(text) => text,
            ws::Message::Close(_) => return Err(ConnectionError::Closed),
            ws::Message::Binary(_) => {
                warn!("Ignoring binary frame from socket {}", self.sid);
                return Ok(());
            }
            ws::Message::Ping(_) | ws::Message::Pong(_) => return Ok(()),
        };

        let text = text.as_str();
        if text.len() > self.settings.max_payload {
            return Err(ConnectionError::PayloadTooLarge(text.len()));
        }

        self.handle_text(text).await
    }

    async fn handle_post(&mut self, body: &str) -> Result<(), ConnectionError> {
        if let Transport::WebSocket(_) = self.transport {
            warn!("Socket {} posted after upgrading", self.sid);
            return Ok(());
        }

        if body.len() > self.settings.max_payload {
            return Err(ConnectionError::PayloadTooLarge(body.len()));
        }

        for text in body.split(PAYLOAD_SEPARATOR) {
            self.handle_text(text).await?;
        }

        Ok(())
    }

    async fn handle_text(&mut self, text: &str) -> Result<(), ConnectionError> {
        trace!("C {}: {text}", self.sid);
        match Packet::decode(text) {
            Ok(packet) => self.handle_packet(packet).await,
            Err(PacketError::UnsupportedNamespace(namespace)) => {
                warn!("Socket {} asked for namespace {namespace}", self.sid);
                self.send_packet(Packet::ConnectError(
                    json!({ "message": "Invalid namespace" }),
                ))
                .await
            }
            Err(error) => {
                warn!("Dropping malformed packet from socket {}: {error}", self.sid);
                Ok(())
            }
        }
    }

    async fn handle_packet(&mut self, packet: Packet) -> Result<(), ConnectionError> {
        match packet {
            Packet::Pong => self.last_pong = Instant::now(),
            Packet::Ping => self.send_packet(Packet::Pong).await?,
            Packet::Noop => (),
            Packet::Close | Packet::Disconnect => return Err(ConnectionError::Closed),
            Packet::Connect(_) => self.register().await?,
            Packet::Event { name, args, .. } => {
                let Some(client_id) = self.client_id.clone() else {
                    warn!("Dropping {name} from socket {}, not connected yet", self.sid);
                    return Ok(());
                };

                match ClientEvent::parse(&name, args) {
                    Ok(event) => {
                        self.coordinator_tx
                            .send(Message::from_client_event(client_id, event))
                            .await
                            .or(Err(ConnectionError::CoordinatorGone))?;
                    }
                    Err(error) => warn!("Dropping event from {client_id}: {error}"),
                }
            }
            Packet::Open(_) | Packet::ConnectError(_) => {
                warn!("Socket {} sent a server-only packet", self.sid);
            }
        }

        Ok(())
    }

    /// Parks a polling GET until there is something to send.
    fn poll(&mut self, reply: oneshot::Sender<String>) {
        let Transport::Polling { pending, .. } = &mut self.transport else {
            warn!("Socket {} polled after upgrading", self.sid);
            return;
        };

        if let Some(previous) = pending.replace(reply) {
            warn!("Socket {} overlapped a poll", self.sid);
            if previous.send(Packet::NOOP.to_string()).is_err() {
                trace!("Overlapped poll for socket {} already closed", self.sid);
            }
        }

        self.flush();
    }

    /// Answers the parked GET with every queued packet.
    fn flush(&mut self) {
        let Transport::Polling { queue, pending } = &mut self.transport else {
            return;
        };

        if queue.is_empty() {
            return;
        }

        let Some(reply) = pending.take() else {
            return;
        };

        let payload = queue.join(PAYLOAD_SEPARATOR);
        queue.clear();

        // The GET went away before it was answered, keep the payload for the next one
        if let Err(payload) = reply.send(payload) {
            queue.push(payload);
        }
    }

    /// Moves a polling connection onto `socket` once the client has probed it and asked to switch.
    async fn upgrade(&mut self, mut socket: WebSocket) -> Result<(), ConnectionError> {
        if let Transport::WebSocket(_) = self.transport {
            warn!("Socket {} is already on WebSocket", self.sid);
            return Ok(());
        }

        if !self.await_on_upgrade(&mut socket, "2probe").await? {
            warn!("Socket {} did not probe its upgrade", self.sid);
            return Ok(());
        }

        let answered = time::timeout(
            self.settings.ping_timeout(),
            socket.send(ws::Message::Text(Utf8Bytes::from_static("3probe"))),
        )
        .await;
        if !matches!(answered, Ok(Ok(()))) {
            warn!("Could not answer upgrade probe for socket {}", self.sid);
            return Ok(());
        }

        // The client only finishes switching once its current poll returns
        self.release_poll();

        if !self.await_on_upgrade(&mut socket, "5").await? {
            warn!("Socket {} abandoned its upgrade", self.sid);
            return Ok(());
        }

        self.release_poll();
        let queued = match mem::replace(&mut self.transport, Transport::WebSocket(socket)) {
            Transport::Polling { queue, .. } => queue,
            Transport::WebSocket(_) => Vec::new(),
        };

        info!("Socket {} upgraded to WebSocket", self.sid);
        for encoded in queued {
            self.send_text(encoded).await?;
        }

        Ok(())
    }

    /// Waits for `expected` on a socket being upgraded while still serving polling requests.
    async fn await_on_upgrade(
        &mut self,
        socket: &mut WebSocket,
        expected: &str,
    ) -> Result<bool, ConnectionError> {
        let deadline = Instant::now() + self.settings.ping_timeout();

        loop {
            tokio::select! {
                received = time::timeout_at(deadline, socket.recv()) => {
                    let matched = matches!(
                        received,
                        Ok(Some(Ok(ws::Message::Text(text)))) if text.as_str() == expected
                    );

                    if matched {
                        trace!("C {}: {expected}", self.sid);
                    }

                    return Ok(matched);
                }

                event = recv(&mut self.transport_rx) => {
                    match event.ok_or(ConnectionError::Closed)? {
                        TransportEvent::Post(body) => self.handle_post(&body).await?,
                        TransportEvent::Poll(reply) => self.poll(reply),
                        TransportEvent::Upgrade(_) => {
                            warn!("Socket {} is already upgrading", self.sid)
                        }
                    }
                }
            }
        }
    }

    fn release_poll(&mut self) {
        let Transport::Polling { pending, .. } = &mut self.transport else {
            return;
        };

        let Some(reply) = pending.take() else {
            return;
        };

        if reply.send(Packet::NOOP.to_string()).is_err() {
            trace!("Poll for socket {} already closed", self.sid);
        }
    }

    async fn register(&mut self) -> Result<(), ConnectionError> {
        if let Some(client_id) = &self.client_id {
            warn!("{client_id} is already connected");
            return Ok(());
        }

        let (client_tx, outbound_rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = oneshot::channel();

        self.coordinator_tx
            .send(Message::Connect {
                client_tx,
                reply: reply_tx,
            })
            .await
            .or(Err(ConnectionError::CoordinatorGone))?;

        let client_id = reply_rx.await.or(Err(ConnectionError::CoordinatorGone))?;
        let connected = Packet::Connect(Some(json!({ "sid": client_id })));

        self.client_id = Some(client_id);
        self.outbound_rx = Some(outbound_rx);
        self.send_packet(connected).await
    }

    async fn disconnect(&mut self) {
        let Some(client_id) = self.client_id.take() else {
            return;
        };

        if let Err(error) = self
            .coordinator_tx
            .send(Message::Disconnect(client_id.clone()))
            .await
        {
            error!("Could not remove {client_id} from session: {error}");
        }
    }

    async fn send_packet(&mut self, packet: Packet) -> Result<(), ConnectionError> {
        let encoded = packet.encode().map_err(ConnectionError::Encode)?;
        trace!("S {}: {encoded}", self.sid);
        self.send_text(encoded).await
    }

    /// A WebSocket send that cannot finish within the heartbeat deadline means the
    /// client stopped reading.
    async fn send_text(&mut self, encoded: String) -> Result<(), ConnectionError> {
        let deadline = self.settings.deadline();
        match &mut self.transport {
            Transport::WebSocket(socket) => {
                time::timeout(deadline, socket.send(ws::Message::Text(encoded.into())))
                    .await
                    .or(Err(ConnectionError::PingTimeout))?
                    .map_err(ConnectionError::Send)
            }
            Transport::Polling { queue, .. } => {
                queue.push(encoded);
                self.flush();
                Ok(())
            }
        }
    }
}

async fn next_frame(transport: &mut Transport) -> Option<Result<ws::Message, axum::Error>> {
    match transport {
        Transport::WebSocket(socket) => socket.recv().await,
        Transport::Polling { .. } => future::pending().await,
    }
}

async fn recv<T>(rx: &mut Option<mpsc::Receiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => future::pending().await,
    }
}

async fn recv_unbounded<T>(rx: &mut Option<mpsc::UnboundedReceiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => future::pending().await,
    }
}
