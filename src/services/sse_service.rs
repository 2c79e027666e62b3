use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::info;
use uuid::Uuid;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::{
    dto::sse::{Handshake, ServerEvent},
    error::ServiceError,
    services::sse_events::{self, EVENT_GAME_UPDATED, EVENT_HANDSHAKE},
    state::SharedState,
};

/// A fresh subscription plus the events only this client should see first.
pub struct Subscription {
    pub receiver: broadcast::Receiver<ServerEvent>,
    pub initial: Vec<ServerEvent>,
}

/// Subscribe to the shared public SSE stream.
pub fn subscribe_public(state: &SharedState) -> Subscription {
    let receiver = state.public_sse().subscribe();
    let handshake = Handshake {
        stream: "public".into(),
        message: "public stream connected".into(),
        degraded: state.is_degraded(),
        token: None,
    };
    let view = sse_events::public_view(state, &state.game());
    Subscription {
        receiver,
        initial: [
            sse_events::named_event(EVENT_HANDSHAKE, &handshake),
            sse_events::named_event(EVENT_GAME_UPDATED, &view),
        ]
        .into_iter()
        .flatten()
        .collect(),
    }
}

/// Subscribe to the admin-only SSE stream, claiming the single admin token.
pub async fn subscribe_admin(state: &SharedState) -> Result<Subscription, ServiceError> {
    let token = claim_admin_token(state).await?;
    let receiver = state.admin_sse().subscribe();
    let handshake = Handshake {
        stream: "admin".into(),
        message: "admin stream connected".into(),
        degraded: state.is_degraded(),
        token: Some(token),
    };
    let view = sse_events::admin_view(state, &state.game());
    Ok(Subscription {
        receiver,
        initial: [
            sse_events::named_event(EVENT_HANDSHAKE, &handshake),
            sse_events::named_event(EVENT_GAME_UPDATED, &view),
        ]
        .into_iter()
        .flatten()
        .collect(),
    })
}

/// Identifies the target SSE stream so we can perform stream-specific
/// bookkeeping when the connection is torn down.
#[derive(Clone)]
pub enum StreamKind {
    Public,
    /// Teardown releases the admin token held by this stream.
    Admin(SharedState),
}

fn to_event(payload: ServerEvent) -> Event {
    let event = Event::default().data(payload.data);
    match payload.event {
        Some(name) => event.event(name),
        None => event,
    }
}

/// Convert a subscription into an SSE response, forwarding events and
/// cleaning up once the client disconnects.
pub fn to_sse_stream(
    subscription: Subscription,
    kind: StreamKind,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let Subscription {
        mut receiver,
        initial,
    } = subscription;
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        let mut open = true;
        for payload in initial {
            if tx.send(Ok(to_event(payload))).await.is_err() {
                open = false;
                break;
            }
        }

        while open {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        // every game.updated carries the full view, so skipping is safe
                        Err(RecvError::Lagged(_)) => continue,
                    }
                }
            }
        }

        match kind {
            StreamKind::Public => info!("public SSE stream disconnected"),
            StreamKind::Admin(state) => {
                reset_admin_token(state).await;
                info!("admin SSE stream disconnected")
            }
        }
    });

    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Reserve the admin token for a new stream, failing if another connection
/// already holds it.
async fn claim_admin_token(state: &SharedState) -> Result<String, ServiceError> {
    let mut guard = state.admin_token().lock().await;
    match &mut *guard {
        slot @ None => {
            let token = Uuid::new_v4().simple().to_string();
            slot.replace(token.clone());
            Ok(token)
        }
        Some(_) => Err(ServiceError::Unauthorized(
            "Another admin SSE stream is already active".into(),
        )),
    }
}

/// Clear the stored admin token so the next admin connection negotiates a
/// fresh credential.
async fn reset_admin_token(state: SharedState) {
    let mut guard = state.admin_token().lock().await;
    guard.take();
}
