use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::models::route::Route;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct FeedFilter {
    #[serde(default)]
    pub driver_id: Option<String>,
}

impl FeedFilter {
    fn wants(&self, route: &Route) -> bool {
        match &self.driver_id {
            Some(driver_id) => route.driver_id.as_deref() == Some(driver_id.as_str()),
            None => true,
        }
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(filter): Query<FeedFilter>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| route_feed(socket, state, filter))
}

/// Streams persisted routes as JSON, optionally only those of one driver.
/// A slow client skips what it missed instead of being dropped.
async fn route_feed(socket: WebSocket, state: Arc<AppState>, filter: FeedFilter) {
    let (mut sender, mut receiver) = socket.split();
    let mut routes = state.route_events_tx.subscribe();
    let shutdown = state.shutdown.clone();

    info!(driver_id = ?filter.driver_id, "route feed client connected");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            event = routes.recv() => match event {
                Ok(route) if filter.wants(&route) => {
                    let json = match serde_json::to_string(&route) {
                        Ok(json) => json,
                        Err(err) => {
                            warn!(error = %err, route_id = %route.id, "failed to serialize route for feed");
                            continue;
                        }
                    };
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "route feed client lagged behind");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    info!(driver_id = ?filter.driver_id, "route feed client disconnected");
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::FeedFilter;
    use crate::models::route::Route;
    use crate::models::status::Status;

    fn route(driver_id: Option<&str>) -> Route {
        let now = Utc::now();
        Route {
            id: "r1".to_string(),
            driver_id: driver_id.map(str::to_string),
            status: Status::Scheduled,
            scheduled_start: now,
            scheduled_finish: now,
            stops: Vec::new(),
            calendar_event_id: "evt".to_string(),
            original_route_id: "r1".to_string(),
            driving_distance: None,
            notes: String::new(),
            timestamp_created: now,
            timestamp_updated: now,
        }
    }

    #[test]
    fn unfiltered_feed_sends_everything() {
        let filter = FeedFilter::default();
        assert!(filter.wants(&route(None)));
        assert!(filter.wants(&route(Some("d1"))));
    }

    #[test]
    fn driver_filter_only_matches_that_driver() {
        let filter = FeedFilter {
            driver_id: Some("d1".to_string()),
        };
        assert!(filter.wants(&route(Some("d1"))));
        assert!(!filter.wants(&route(Some("d2"))));
        assert!(!filter.wants(&route(None)));
    }
}
