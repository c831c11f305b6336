use crate::{
    message::Message,
    socket::connection::{EngineSessions, SocketSettings},
};
use axum::{Router, http::HeaderValue, routing::get};
use hyper::{Request, body::Incoming};
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server,
};
use log::error;
use tokio::{net::TcpListener, sync::mpsc};
use tower_http::cors::CorsLayer;
use tower_service::Service;

mod socket_io;
mod stats;

#[derive(Clone)]
pub struct AppState {
    pub coordinator_tx: mpsc::Sender<Message>,
    pub socket_settings: SocketSettings,
    pub engine_sessions: EngineSessions,
}

pub fn router(state: AppState, frontend_origin: HeaderValue) -> Router {
    let cors = CorsLayer::new().allow_origin(frontend_origin);

    Router::new()
        .route("/socket.io/", get(socket_io::socket_io).post(socket_io::post))
        .route("/stats", get(stats::stats))
        .layer(cors)
        .with_state(state)
}

/// Serves the router with hyper so WebSocket upgrades reach the handlers
pub async fn listen(listener: TcpListener, app: Router) {
    loop {
        let (socket, remote_addr) = match listener.accept().await {
            Ok(l) => l,
            Err(error) => {
                error!("Could not get socket from accepted HTTP connection: {error}");
                continue;
            }
        };

        let tower_service = app.clone();
        tokio::spawn(async move {
            let socket = TokioIo::new(socket);
            let hyper_service = hyper::service::service_fn(move |request: Request<Incoming>| {
                tower_service.clone().call(request)
            });

            let builder = server::conn::auto::Builder::new(TokioExecutor::new());
            if let Err(err) = builder
                .serve_connection_with_upgrades(socket, hyper_service)
                .await
            {
                error!("Failed to serve connection from {remote_addr}: {err:#}");
            }
        });
    }
}
