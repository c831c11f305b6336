use crate::{
    http::AppState,
    socket::connection::{SocketConnection, TransportEvent},
};
use axum::{
    Json,
    extract::{Query, State, WebSocketUpgrade, ws::rejection::WebSocketUpgradeRejection},
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use log::{error, info, warn};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Deserialize)]
pub(crate) struct EngineQuery {
    #[serde(rename = "EIO")]
    eio: Option<String>,
    transport: Option<String>,
    sid: Option<String>,
}

fn engine_error(code: u8, message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "code": code, "message": message })),
    )
        .into_response()
}

fn unknown_sid() -> Response {
    engine_error(1, "Session ID unknown")
}

fn engine_session(state: &AppState, sid: &str) -> Option<mpsc::Sender<TransportEvent>> {
    match state.engine_sessions.lock() {
        Ok(sessions) => sessions.get(sid).cloned(),
        Err(error) => {
            error!("Could not look up socket {sid}: {error}");
            None
        }
    }
}

/// Engine.IO protocol 4 endpoint, over long-polling or WebSocket.
pub(crate) async fn socket_io(
    State(state): State<AppState>,
    Query(query): Query<EngineQuery>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if query.eio.as_deref() != Some("4") {
        warn!("Refusing Engine.IO version {:?}", query.eio);
        return engine_error(5, "Unsupported protocol version");
    }

    match (query.transport.as_deref(), query.sid) {
        (Some("polling"), None) => handshake(state).await,
        (Some("polling"), Some(sid)) => match engine_session(&state, &sid) {
            Some(transport_tx) => poll(&transport_tx).await,
            None => unknown_sid(),
        },
        (Some("websocket"), sid) => {
            let upgrade = match upgrade {
                Ok(upgrade) => upgrade,
                Err(rejection) => {
                    warn!("Refusing WebSocket upgrade: {rejection}");
                    return engine_error(3, "Bad request");
                }
            };

            match sid {
                Some(sid) => {
                    let Some(transport_tx) = engine_session(&state, &sid) else {
                        return unknown_sid();
                    };

                    info!("Upgrading socket {sid} to WebSocket");
                    upgrade.on_upgrade(move |socket| async move {
                        if transport_tx
                            .send(TransportEvent::Upgrade(socket))
                            .await
                            .is_err()
                        {
                            warn!("Socket {sid} closed before its upgrade");
                        }
                    })
                }
                None => {
                    info!("Opening Engine.IO connection over WebSocket");
                    let settings = state.socket_settings;
                    upgrade.on_upgrade(move |socket| {
                        SocketConnection::websocket(state.coordinator_tx, settings, socket).run()
                    })
                }
            }
        }
        (transport, _) => {
            warn!("Refusing Engine.IO transport {transport:?}");
            engine_error(0, "Transport unknown")
        }
    }
}

/// Packets posted by a polling client.
pub(crate) async fn post(
    State(state): State<AppState>,
    Query(query): Query<EngineQuery>,
    body: String,
) -> Response {
    if query.eio.as_deref() != Some("4") {
        return engine_error(5, "Unsupported protocol version");
    }

    if query.transport.as_deref() != Some("polling") {
        return engine_error(0, "Transport unknown");
    }

    let Some(transport_tx) = query
        .sid
        .and_then(|sid| engine_session(&state, &sid))
    else {
        return unknown_sid();
    };

    if transport_tx.send(TransportEvent::Post(body)).await.is_err() {
        return unknown_sid();
    }

    ([(CONTENT_TYPE, "text/html")], "ok").into_response()
}

async fn handshake(state: AppState) -> Response {
    let (transport_tx, transport_rx) = mpsc::channel(16);
    let connection = SocketConnection::polling(
        state.coordinator_tx,
        state.socket_settings,
        transport_rx,
        state.engine_sessions.clone(),
    );

    let sid = connection.sid().to_string();
    match state.engine_sessions.lock() {
        Ok(mut sessions) => {
            sessions.insert(sid.clone(), transport_tx.clone());
        }
        Err(error) => {
            error!("Could not register socket {sid}: {error}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    info!("Opening Engine.IO connection {sid} over polling");
    tokio::spawn(connection.run());
    poll(&transport_tx).await
}

async fn poll(transport_tx: &mpsc::Sender<TransportEvent>) -> Response {
    let (reply, reply_rx) = oneshot::channel();
    if transport_tx.send(TransportEvent::Poll(reply)).await.is_err() {
        return unknown_sid();
    }

    match reply_rx.await {
        Ok(payload) => ([(CONTENT_TYPE, "text/plain; charset=UTF-8")], payload).into_response(),
        Err(_) => engine_error(3, "Bad request"),
    }
}
