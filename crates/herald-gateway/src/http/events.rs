//! GET /events: the subscriber stream.
//!
//! Each connection gets a [`Subscription`]; the stream below owns it, so when
//! axum drops the response body (client gone, server shutting down) the
//! subscriber is unregistered.

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::Stream;
use herald_broadcast::Subscription;
use herald_protocol::Frame;
use std::{convert::Infallible, sync::Arc, time::Duration};
use tokio::sync::watch;
use tracing::debug;

use crate::app::AppState;

pub async fn events_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.broadcaster.connect();
    let keep_alive = Duration::from_secs(state.config.broadcast.keep_alive_secs.max(1));

    Sse::new(frame_stream(subscription, state.shutdown.clone()))
        .keep_alive(KeepAlive::new().interval(keep_alive))
}

fn frame_stream(
    mut subscription: Subscription,
    mut shutdown: watch::Receiver<bool>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        loop {
            // queued frames are flushed before a shutdown is noticed
            let next = tokio::select! {
                biased;
                frame = subscription.recv() => frame,
                _ = shutdown.changed() => None,
            };
            match next {
                Some(frame) => {
                    yield Ok(to_sse(&frame));
                }
                // the registry dropped us (queue full) or the server is stopping
                None => break,
            }
        }
        debug!(subscriber_id = %subscription.id(), "subscriber stream ended");
    }
}

/// `id:` / `event:` / `data:` framing. Frame data is compact JSON and event
/// names are single-line, so neither needs escaping.
pub fn to_sse(frame: &Frame) -> Event {
    Event::default()
        .id(frame.id.to_string())
        .event(frame.event.as_str())
        .data(frame.data.as_str())
}
