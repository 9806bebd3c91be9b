use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use std::convert::Infallible;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;

use crate::state::{AppState, Topic};

/// `update` event whose data names the changed topic, e.g. `{"topic":"tests"}`.
fn update_event(topic: Topic) -> Event {
    Event::default()
        .event("update")
        .data(serde_json::json!({ "topic": topic }).to_string())
}

/// GET /api/events: one `update` per mutation. A subscriber that fell behind
/// gets a single `all` update instead of the changes it missed.
pub async fn sse_events(State(app): State<AppState>) -> impl IntoResponse {
    let rx = app.event_tx.subscribe();
    let stream = BroadcastStream::new(rx).map(|msg| {
        let topic = match msg {
            Ok(topic) => topic,
            Err(BroadcastStreamRecvError::Lagged(missed)) => {
                tracing::debug!(missed, "event subscriber lagged");
                Topic::All
            }
        };
        Ok::<_, Infallible>(update_event(topic))
    });
    Sse::new(stream).keep_alive(KeepAlive::new().text("ping"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use agelum_core::settings::SettingsStore;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn mutation_topics_reach_subscribers() {
        let home = tempfile::TempDir::new().unwrap();
        let app = AppState::new(SettingsStore::new(home.path()), None);
        let response = sse_events(State(app.clone())).await.into_response();
        let mut body = response.into_body();

        app.notify(Topic::Tests);
        let frame = tokio::time::timeout(std::time::Duration::from_secs(5), body.frame())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let text = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();
        assert!(text.contains("event: update"), "{text}");
        assert!(text.contains(r#"data: {"topic":"tests"}"#), "{text}");
    }
}
