use dotenvy::dotenv;
use env_logger::Env;
use log::{error, info};
use neocities_server::{
    config::Config,
    http::{self, AppState},
    session::{coordinator::Coordinator, session::Session},
    socket::connection::EngineSessions,
};
use std::process::ExitCode;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("trace")).init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(error) => {
            error!("Invalid configuration: {error}");
            return ExitCode::FAILURE;
        }
    };

    let listener = match TcpListener::bind(config.bind_address).await {
        Ok(listener) => listener,
        Err(error) => {
            error!("Could not bind session server to {}: {error}", config.bind_address);
            return ExitCode::FAILURE;
        }
    };

    info!("Session server listening on {}", config.bind_address);

    let session = Session::new(config.resource_bundles, config.chat_max_length);
    let coordinator_tx = Coordinator::spawn(session, config.tick_interval);

    let app = http::router(
        AppState {
            coordinator_tx,
            socket_settings: config.socket_settings,
            engine_sessions: EngineSessions::default(),
        },
        config.frontend_origin,
    );

    http::listen(listener, app).await;
    ExitCode::SUCCESS
}
