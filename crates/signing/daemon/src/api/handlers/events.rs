//! Event streaming and expiration handlers

use crate::api::state::AppState;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::{self, Stream};
use signing_engine::SweepReport;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

/// Stream committed audit events via SSE
pub async fn stream_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.manager.subscribe();

    let stream = stream::unfold(rx, |mut rx| async move {
        match rx.recv().await {
            Ok(event) => {
                let json = serde_json::to_string(&event).unwrap_or_default();
                let sse_event = Event::default().event(event.action.to_string()).data(json);
                Some((Ok(sse_event), rx))
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Event stream client lagged");
                Some((Ok(Event::default().comment("lagged")), rx))
            }
            Err(RecvError::Closed) => None,
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

/// Run an expiration sweep now
pub async fn run_sweep(State(state): State<AppState>) -> Json<SweepReport> {
    Json(state.scheduler.sweep_once().await)
}
