use crate::{http::AppState, message::Message};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use log::error;
use tokio::sync::oneshot;

pub(crate) async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    let (reply_tx, reply_rx) = oneshot::channel();
    if let Err(error) = state.coordinator_tx.send(Message::GetStats(reply_tx)).await {
        error!("Could not ask coordinator for stats: {error}");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    match reply_rx.await {
        Ok(stats) => Json(stats).into_response(),
        Err(error) => {
            error!("Coordinator dropped stats request: {error}");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}
