use axum::http::HeaderValue;
use futures_util::{SinkExt, StreamExt};
use neocities_server::{
    http::{self, AppState},
    models::resource::ResourceBundles,
    session::{coordinator::Coordinator, session::Session},
    socket::connection::{EngineSessions, SocketSettings},
};
use serde_json::{Value, json};
use std::{net::SocketAddr, time::Duration};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    time::{Instant, sleep, timeout},
};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

async fn start_server() -> SocketAddr {
    let settings = SocketSettings {
        ping_interval_ms: 25000,
        ping_timeout_ms: 20000,
        max_payload: 1_000_000,
    };

    start_server_with(settings, 500).await
}

async fn start_server_with(socket_settings: SocketSettings, chat_max_length: usize) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let coordinator_tx = Coordinator::spawn(
        Session::new(ResourceBundles::default(), chat_max_length),
        Duration::from_millis(50),
    );
    let app = http::router(
        AppState {
            coordinator_tx,
            socket_settings,
            engine_sessions: EngineSessions::default(),
        },
        HeaderValue::from_static("http://localhost:5173"),
    );

    tokio::spawn(http::listen(listener, app));
    addr
}

struct GameClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    id: String,
}

impl GameClient {
    async fn connect(addr: SocketAddr) -> Self {
        let url = format!("ws://{addr}/socket.io/?EIO=4&transport=websocket");
        let (mut ws, _) = connect_async(url).await.unwrap();

        let open = next_text(&mut ws).await;
        let handshake: Value = serde_json::from_str(open.strip_prefix('0').unwrap()).unwrap();
        assert_eq!(handshake["pingInterval"], 25000);
        assert_eq!(handshake["upgrades"], json!([]));

        ws.send(Message::text("40")).await.unwrap();
        let connected = next_text(&mut ws).await;
        let connected: Value = serde_json::from_str(connected.strip_prefix("40").unwrap()).unwrap();
        let id = connected["sid"].as_str().unwrap().to_string();

        GameClient { ws, id }
    }

    async fn emit(&mut self, name: &str, payload: Option<Value>) {
        let packet = match payload {
            Some(payload) => json!([name, payload]),
            None => json!([name]),
        };
        self.ws
            .send(Message::text(format!("42{packet}")))
            .await
            .unwrap();
    }

    /// Next server event, answering heartbeats on the way.
    async fn next_event(&mut self) -> (String, Value) {
        loop {
            let text = next_text(&mut self.ws).await;
            if text == "2" {
                self.ws.send(Message::text("3")).await.unwrap();
                continue;
            }

            let mut array: Vec<Value> =
                serde_json::from_str(text.strip_prefix("42").unwrap()).unwrap();
            let payload = array.pop().unwrap();
            let name = array.pop().unwrap().as_str().unwrap().to_string();
            return (name, payload);
        }
    }

    /// Skips roster and clock noise until `name` arrives.
    async fn expect(&mut self, name: &str) -> Value {
        loop {
            let (received, payload) = self.next_event().await;
            if received == name {
                return payload;
            }
            assert!(
                received == "currentPlayers" || received == "timerUpdate",
                "expected {name}, got {received}: {payload}"
            );
        }
    }
}

async fn next_text(ws: &mut WebSocketStream<MaybeTlsStream<TcpStream>>) -> String {
    loop {
        let frame = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("frame in time")
            .expect("socket open")
            .unwrap();
        if let Message::Text(text) = frame {
            return text.as_str().to_string();
        }
    }
}

async fn http_request(addr: SocketAddr, method: &str, path: &str, body: &str) -> String {
    let request = format!(
        "{method} {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\
         Content-Type: text/plain;charset=UTF-8\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    );

    let mut socket = TcpStream::connect(addr).await.unwrap();
    socket.write_all(request.as_bytes()).await.unwrap();

    let mut response = String::new();
    socket.read_to_string(&mut response).await.unwrap();
    response
}

async fn http_get(addr: SocketAddr, path: &str) -> String {
    http_request(addr, "GET", path, "").await
}

fn body_of(response: &str) -> &str {
    response.split_once("\r\n\r\n").unwrap().1
}

async fn wait_for_players(addr: SocketAddr, expected: u64) {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let stats: Value = serde_json::from_str(body_of(&http_get(addr, "/stats").await)).unwrap();
        if stats["players"] == expected {
            return;
        }

        assert!(Instant::now() < deadline, "expected {expected} players: {stats}");
        sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::test]
async fn roster_lists_every_connected_player() {
    let addr = start_server().await;
    let mut a = GameClient::connect(addr).await;
    let first = a.expect("currentPlayers").await;
    assert_eq!(first["id"], a.id.as_str());

    let b = GameClient::connect(addr).await;
    let roster = a.expect("currentPlayers").await;
    assert_eq!(roster["id"], a.id.as_str());
    assert_eq!(roster["players"][&b.id]["state"], "connected");
    assert_eq!(roster["players"][&b.id]["character"], Value::Null);
}

#[tokio::test]
async fn second_claim_for_police_is_refused() {
    let addr = start_server().await;
    let mut a = GameClient::connect(addr).await;
    let mut b = GameClient::connect(addr).await;

    a.emit("playerSelected", Some(json!("police"))).await;
    let resources = a.expect("resourcesAssigned").await;
    assert_eq!(resources[0], json!({ "name": "Police Car" }));

    b.emit("playerSelected", Some(json!("police"))).await;
    let refused = b.expect("roleUnavailable").await;
    assert_eq!(refused, json!({ "role": "police" }));
}

#[tokio::test]
async fn chat_is_relayed_to_everyone_once() {
    let addr = start_server().await;
    let mut a = GameClient::connect(addr).await;
    let mut b = GameClient::connect(addr).await;

    a.emit("playerSelected", Some(json!("fire"))).await;
    a.expect("resourcesAssigned").await;
    a.emit("chatMessage", Some(json!({ "message": "hello" }))).await;
    a.emit("chatMessage", Some(json!({ "message": "over" }))).await;

    let sender = a.id.clone();
    for client in [&mut a, &mut b] {
        let hello = client.expect("receiveMessage").await;
        assert_eq!(hello["message"], "hello");
        assert_eq!(hello["sender"]["character"], "fire");
        assert_eq!(hello["sender"]["id"], sender.as_str());

        let over = client.expect("receiveMessage").await;
        assert_eq!(over["message"], "over");
    }
}

#[tokio::test]
async fn disconnect_frees_role_for_next_player() {
    let addr = start_server().await;
    let mut a = GameClient::connect(addr).await;
    a.emit("playerSelected", Some(json!("fire"))).await;
    a.expect("resourcesAssigned").await;
    a.ws.close(None).await.unwrap();

    let mut c = GameClient::connect(addr).await;
    let mut attempts = 0;
    loop {
        c.emit("playerSelected", Some(json!("fire"))).await;
        let (name, _) = loop {
            let (name, payload) = c.next_event().await;
            if name == "resourcesAssigned" || name == "roleUnavailable" {
                break (name, payload);
            }
        };

        if name == "resourcesAssigned" {
            break;
        }

        attempts += 1;
        assert!(attempts < 20, "fire was never released");
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

#[tokio::test]
async fn ready_players_receive_the_clock() {
    let addr = start_server().await;
    let mut a = GameClient::connect(addr).await;
    a.emit("playerSelected", Some(json!("hazmat"))).await;
    a.expect("resourcesAssigned").await;
    a.emit("playerReady", None).await;

    let first = a.expect("timerUpdate").await.as_u64().unwrap();
    let second = a.expect("timerUpdate").await.as_u64().unwrap();
    assert!(second > first);
}

#[tokio::test]
async fn ready_before_role_is_rejected() {
    let addr = start_server().await;
    let mut a = GameClient::connect(addr).await;
    a.emit("playerReady", None).await;

    let rejected = a.expect("rejected").await;
    assert!(rejected["reason"].as_str().unwrap().contains("role"));
}

#[tokio::test]
async fn malformed_events_do_not_break_the_connection() {
    let addr = start_server().await;
    let mut a = GameClient::connect(addr).await;

    a.emit("playerSelected", Some(json!("paramedic"))).await;
    a.ws.send(Message::text("42not json")).await.unwrap();
    a.emit("chatMessage", Some(json!({ "message": "still alive" }))).await;

    let message = a.expect("receiveMessage").await;
    assert_eq!(message["message"], "still alive");
}

#[tokio::test]
async fn stats_report_claimed_roles() {
    let addr = start_server().await;
    let mut a = GameClient::connect(addr).await;
    a.emit("playerSelected", Some(json!("police"))).await;
    a.expect("resourcesAssigned").await;

    let response = http_get(addr, "/stats").await;
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response.contains(&format!(r#""police":"{}""#, a.id)), "{response}");
    assert!(response.contains(r#""players":1"#), "{response}");
}

#[tokio::test]
async fn unknown_transports_and_versions_are_refused() {
    let addr = start_server().await;

    let response = http_get(addr, "/socket.io/?EIO=4&transport=flashsocket").await;
    assert!(response.starts_with("HTTP/1.1 400"), "{response}");
    assert!(response.contains("Transport unknown"), "{response}");

    let response = http_get(addr, "/socket.io/?EIO=3&transport=websocket").await;
    assert!(response.starts_with("HTTP/1.1 400"), "{response}");
    assert!(response.contains("Unsupported protocol version"), "{response}");

    let response = http_get(addr, "/socket.io/?EIO=4&transport=polling&sid=gone").await;
    assert!(response.starts_with("HTTP/1.1 400"), "{response}");
    assert!(response.contains("Session ID unknown"), "{response}");
}

#[tokio::test]
async fn polling_client_joins_and_upgrades_to_websocket() {
    let addr = start_server().await;

    let open = http_get(addr, "/socket.io/?EIO=4&transport=polling").await;
    assert!(open.starts_with("HTTP/1.1 200"), "{open}");
    let handshake: Value = serde_json::from_str(body_of(&open).strip_prefix('0').unwrap()).unwrap();
    assert_eq!(handshake["upgrades"], json!(["websocket"]));
    let sid = handshake["sid"].as_str().unwrap().to_string();

    let path = format!("/socket.io/?EIO=4&transport=polling&sid={sid}");
    let chat = r#"42["chatMessage",{"message":"over polling"}]"#;
    for packet in ["40", chat] {
        let response = http_request(addr, "POST", &path, packet).await;
        assert_eq!(body_of(&response), "ok");
    }

    let mut id = None;
    let mut relayed = false;
    for _ in 0..10 {
        let response = http_get(addr, &path).await;
        for packet in body_of(&response).split('\x1e') {
            if let Some(connected) = packet.strip_prefix("40") {
                let connected: Value = serde_json::from_str(connected).unwrap();
                id = connected["sid"].as_str().map(str::to_string);
            }
            relayed |=
                packet.starts_with(r#"42["receiveMessage""#) && packet.contains("over polling");
        }

        if id.is_some() && relayed {
            break;
        }
    }
    let id = id.expect("connected over polling");
    assert!(relayed, "chat was not relayed over polling");

    let url = format!("ws://{addr}/socket.io/?EIO=4&transport=websocket&sid={sid}");
    let (mut ws, _) = connect_async(url).await.unwrap();
    ws.send(Message::text("2probe")).await.unwrap();
    assert_eq!(next_text(&mut ws).await, "3probe");
    ws.send(Message::text("5")).await.unwrap();

    let mut client = GameClient { ws, id };
    client.emit("playerSelected", Some(json!("police"))).await;
    client.expect("resourcesAssigned").await;

    let response = http_get(addr, "/stats").await;
    assert!(response.contains(&format!(r#""police":"{}""#, client.id)), "{response}");
}

#[tokio::test]
async fn client_that_stops_reading_is_dropped() {
    let settings = SocketSettings {
        ping_interval_ms: 1000,
        ping_timeout_ms: 1000,
        max_payload: 1_000_000,
    };
    let addr = start_server_with(settings, 300_000).await;

    let _stalled = GameClient::connect(addr).await;
    let mut talker = GameClient::connect(addr).await;

    let message = "x".repeat(200_000);
    for _ in 0..200 {
        talker.emit("chatMessage", Some(json!({ "message": message }))).await;
        talker.expect("receiveMessage").await;
    }

    wait_for_players(addr, 1).await;
}

#[tokio::test]
async fn oversized_frame_closes_the_connection() {
    let settings = SocketSettings {
        ping_interval_ms: 25000,
        ping_timeout_ms: 20000,
        max_payload: 64,
    };
    let addr = start_server_with(settings, 500).await;

    let mut a = GameClient::connect(addr).await;
    wait_for_players(addr, 1).await;

    a.emit("chatMessage", Some(json!({ "message": "x".repeat(100) }))).await;
    wait_for_players(addr, 0).await;
}
