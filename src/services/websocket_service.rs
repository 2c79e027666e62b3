use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, Stream, StreamExt};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        player::PlayerView,
        ws::{PlayerInboundMessage, PlayerOutboundMessage},
    },
    error::ServiceError,
    state::{
        AppState, PlayerConnection, SharedState,
        game::{GameRecord, PlayerId, VoteTransition},
    },
};

const IDENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors raised while serving a player socket.
#[derive(Debug, Error)]
enum PlayerSocketError {
    /// Writer channel closed - connection should be terminated immediately.
    #[error("connection closed")]
    ConnectionClosed,
    /// Error from the game engine.
    #[error("{0}")]
    Service(#[from] ServiceError),
}

/// Handle the full lifecycle of a player WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let player_id = match await_identification(&mut receiver, IDENT_TIMEOUT).await {
        IdentOutcome::Identified(player_id) => player_id,
        IdentOutcome::Closed => {
            finalize(writer_task, outbound_tx).await;
            return;
        }
        IdentOutcome::Rejected(reason) => {
            reject(&outbound_tx, reason);
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let mut game_rx = state.subscribe_game();
    game_rx.mark_unchanged();
    let Some((conn_id, mut last_view)) = open_session(&state, &player_id, &outbound_tx) else {
        finalize(writer_task, outbound_tx).await;
        return;
    };
    let mut open = true;

    while open {
        tokio::select! {
            message = receiver.next() => {
                let Some(message) = message else { break };
                match message {
                    Ok(Message::Text(text)) => {
                        if let Err(err) = handle_text(&state, &player_id, &outbound_tx, &text).await {
                            match err {
                                PlayerSocketError::ConnectionClosed => break,
                                PlayerSocketError::Service(err) => {
                                    warn!(player_id = %player_id, error = %err, "player request rejected");
                                    open = send_error(&outbound_tx, err.to_string()).is_ok();
                                }
                            }
                        }
                    }
                    Ok(Message::Ping(payload)) => {
                        let _ = outbound_tx.send(Message::Pong(payload));
                    }
                    Ok(Message::Close(frame)) => {
                        info!(player_id = %player_id, "player closed");
                        let _ = outbound_tx.send(Message::Close(frame));
                        break;
                    }
                    Ok(Message::Binary(_)) | Ok(Message::Pong(_)) => {}
                    Err(err) => {
                        warn!(player_id = %player_id, error = %err, "websocket error");
                        break;
                    }
                }
            }
            changed = game_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let update = view_update(&game_rx.borrow_and_update(), &player_id, &last_view);
                match update {
                    ViewUpdate::Changed(view) => {
                        let message = PlayerOutboundMessage::PlayerState { player: view.clone() };
                        open = send_message_to_websocket(&outbound_tx, &message).is_ok();
                        last_view = view;
                    }
                    ViewUpdate::Unchanged => {}
                    ViewUpdate::Removed => {
                        info!(player_id = %player_id, "player removed by a reset; closing socket");
                        reject(&outbound_tx, "game was reset; register again");
                        break;
                    }
                }
            }
        }
    }

    state
        .players()
        .remove_if(&player_id, |_, connection| connection.conn_id == conn_id);
    info!(player_id = %player_id, "player disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Result of waiting for the first frame of a socket.
#[derive(Debug, PartialEq)]
enum IdentOutcome {
    Identified(PlayerId),
    /// The client went away; nothing to answer.
    Closed,
    /// Answer with this error, then close.
    Rejected(&'static str),
}

/// Wait up to `deadline` for the identification frame.
async fn await_identification<S>(receiver: &mut S, deadline: Duration) -> IdentOutcome
where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    match tokio::time::timeout(deadline, receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => parse_identification(&text),
        Ok(Some(Ok(Message::Close(_)))) | Ok(None) => IdentOutcome::Closed,
        Ok(Some(Ok(_))) => IdentOutcome::Rejected("first message must be an identification"),
        Ok(Some(Err(err))) => {
            warn!(error = %err, "websocket receive error");
            IdentOutcome::Closed
        }
        Err(_) => {
            warn!("websocket identification timed out");
            IdentOutcome::Rejected("identification timed out")
        }
    }
}

fn parse_identification(text: &str) -> IdentOutcome {
    match PlayerInboundMessage::from_json_str(text) {
        Ok(PlayerInboundMessage::Identification { player_id }) => {
            IdentOutcome::Identified(PlayerId::from(player_id))
        }
        Ok(_) => {
            warn!("first message was not identification");
            IdentOutcome::Rejected("first message must be an identification")
        }
        Err(err) => {
            warn!(error = %err, "failed to parse player message");
            IdentOutcome::Rejected("malformed identification")
        }
    }
}

/// Bind an identified socket to its player: reject unknown ids, close an
/// older socket of the same player, then send `ack` and the first
/// `player_state`.
fn open_session(
    state: &AppState,
    player_id: &PlayerId,
    outbound_tx: &mpsc::UnboundedSender<Message>,
) -> Option<(Uuid, PlayerView)> {
    let Some(view) = PlayerView::from_record(&state.game(), player_id) else {
        info!(player_id = %player_id, "identification with unknown player id");
        reject(outbound_tx, "unknown player; register again");
        return None;
    };

    let conn_id = Uuid::new_v4();
    let previous = state.players().insert(
        player_id.clone(),
        PlayerConnection {
            conn_id,
            tx: outbound_tx.clone(),
        },
    );
    if let Some(previous) = previous {
        info!(player_id = %player_id, "closing older socket of the same player");
        reject(&previous.tx, "superseded by a newer connection");
    }
    info!(player_id = %player_id, "player connected");

    let greeting = [
        PlayerOutboundMessage::Ack {
            player_id: player_id.to_string(),
        },
        PlayerOutboundMessage::PlayerState {
            player: view.clone(),
        },
    ];
    let delivered = greeting
        .iter()
        .all(|message| send_message_to_websocket(outbound_tx, message).is_ok());
    if !delivered {
        state
            .players()
            .remove_if(player_id, |_, connection| connection.conn_id == conn_id);
        return None;
    }
    Some((conn_id, view))
}

/// What a commit means for a connected player's screen.
#[derive(Debug, PartialEq)]
enum ViewUpdate {
    Unchanged,
    Changed(PlayerView),
    /// The player is gone, the game was reset.
    Removed,
}

fn view_update(record: &GameRecord, player_id: &PlayerId, last: &PlayerView) -> ViewUpdate {
    match PlayerView::from_record(record, player_id) {
        Some(view) if view != *last => ViewUpdate::Changed(view),
        Some(_) => ViewUpdate::Unchanged,
        None => ViewUpdate::Removed,
    }
}

async fn handle_text(
    state: &SharedState,
    player_id: &PlayerId,
    outbound_tx: &mpsc::UnboundedSender<Message>,
    text: &str,
) -> Result<(), PlayerSocketError> {
    let message = match PlayerInboundMessage::from_json_str(text) {
        Ok(message) => message,
        Err(err) => {
            warn!(player_id = %player_id, error = %err, "failed to parse player message");
            return Err(ServiceError::InvalidInput("malformed message".into()).into());
        }
    };

    match message {
        PlayerInboundMessage::Contribute { amount } => {
            let receipt = state
                .submit_contribution(player_id.clone(), amount)
                .await?;
            let reply = PlayerOutboundMessage::ContributionAccepted {
                requested: receipt.requested,
                stored: receipt.stored,
                overwritten: matches!(receipt.transition, VoteTransition::Overwritten { .. }),
            };
            send_message_to_websocket(outbound_tx, &reply)
        }
        PlayerInboundMessage::Identification { .. } => {
            warn!(player_id = %player_id, "ignoring duplicate identification message");
            Ok(())
        }
        PlayerInboundMessage::Unknown => {
            Err(ServiceError::InvalidInput("unsupported message type".into()).into())
        }
    }
}

/// Serialize a payload and push it onto the provided WebSocket sender.
///
/// Serialization failures are logged and swallowed; a closed writer is
/// reported so the caller can end the session.
fn send_message_to_websocket<T>(
    tx: &mpsc::UnboundedSender<Message>,
    value: &T,
) -> Result<(), PlayerSocketError>
where
    T: ?Sized + serde::Serialize + std::fmt::Debug,
{
    let payload = match serde_json::to_string(value) {
        Ok(p) => p,
        Err(err) => {
            warn!(error = %err, "failed to serialize message `{value:?}`");
            return Ok(());
        }
    };

    tx.send(Message::Text(payload.into()))
        .map_err(|_| PlayerSocketError::ConnectionClosed)
}

fn send_error(
    tx: &mpsc::UnboundedSender<Message>,
    message: String,
) -> Result<(), PlayerSocketError> {
    send_message_to_websocket(tx, &PlayerOutboundMessage::Error { message })
}

/// Send an error frame followed by a close frame.
fn reject(tx: &mpsc::UnboundedSender<Message>, message: &str) {
    let _ = send_error(tx, message.to_string());
    let _ = tx.send(Message::Close(None));
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::stream;
    use serde_json::{Value, json};

    use super::*;
    use crate::{
        config::AppConfig,
        dao::game_store::memory::MemoryGameStore,
        state::state_machine::GameEvent,
    };

    fn text(frame: &str) -> Result<Message, axum::Error> {
        Ok(Message::Text(frame.to_owned().into()))
    }

    /// Frames queued for the writer; a close frame shows up as `{"type":"close"}`.
    fn drain(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(message) = rx.try_recv() {
            match message {
                Message::Text(text) => frames.push(serde_json::from_str(text.as_str()).unwrap()),
                Message::Close(_) => frames.push(json!({ "type": "close" })),
                _ => {}
            }
        }
        frames
    }

    fn kinds(frames: &[Value]) -> Vec<&str> {
        frames
            .iter()
            .map(|frame| frame["type"].as_str().unwrap())
            .collect()
    }

    async fn state_with_player(start: bool) -> (SharedState, PlayerId) {
        let state = AppState::new(AppConfig::default());
        state
            .attach_store(Arc::new(MemoryGameStore::new()))
            .await
            .unwrap();
        state.transition(GameEvent::OpenRegistration).await.unwrap();
        let player_id = state.register("Ada".into(), 1).await.unwrap().player_id;
        if start {
            state.transition(GameEvent::StartGame).await.unwrap();
        }
        (state, player_id)
    }

    #[tokio::test]
    async fn identification_frame_binds_the_socket() {
        let mut frames = stream::iter(vec![text(
            r#"{"type":"identification","player_id":"1700000000000"}"#,
        )]);
        let outcome = await_identification(&mut frames, IDENT_TIMEOUT).await;
        assert_eq!(outcome, IdentOutcome::Identified(PlayerId::from("1700000000000")));
    }

    #[tokio::test]
    async fn silent_client_hits_the_identification_deadline() {
        let mut frames = stream::pending::<Result<Message, axum::Error>>();
        let outcome = await_identification(&mut frames, Duration::from_millis(20)).await;
        assert_eq!(outcome, IdentOutcome::Rejected("identification timed out"));
    }

    #[tokio::test]
    async fn first_frame_must_be_an_identification() {
        let mut contribute = stream::iter(vec![text(r#"{"type":"contribute","amount":1}"#)]);
        assert_eq!(
            await_identification(&mut contribute, IDENT_TIMEOUT).await,
            IdentOutcome::Rejected("first message must be an identification")
        );

        let mut garbage = stream::iter(vec![text("not json")]);
        assert_eq!(
            await_identification(&mut garbage, IDENT_TIMEOUT).await,
            IdentOutcome::Rejected("malformed identification")
        );

        let mut closed = stream::iter(vec![Ok(Message::Close(None))]);
        assert_eq!(
            await_identification(&mut closed, IDENT_TIMEOUT).await,
            IdentOutcome::Closed
        );
    }

    #[tokio::test]
    async fn unknown_player_is_rejected_and_not_registered() {
        let (state, _) = state_with_player(false).await;
        let (tx, mut rx) = mpsc::unbounded_channel();

        let session = open_session(&state, &PlayerId::from("42"), &tx);
        assert!(session.is_none());
        assert_eq!(kinds(&drain(&mut rx)), ["error", "close"]);
        assert!(state.players().is_empty());
    }

    #[tokio::test]
    async fn newer_socket_supersedes_the_older_one() {
        let (state, player_id) = state_with_player(false).await;
        let (first_tx, mut first_rx) = mpsc::unbounded_channel();
        let (second_tx, mut second_rx) = mpsc::unbounded_channel();

        let (first_conn, _) = open_session(&state, &player_id, &first_tx).unwrap();
        assert_eq!(kinds(&drain(&mut first_rx)), ["ack", "player_state"]);

        let (second_conn, view) = open_session(&state, &player_id, &second_tx).unwrap();
        assert_ne!(first_conn, second_conn);
        assert_eq!(view.name, "Ada");
        assert_eq!(kinds(&drain(&mut first_rx)), ["error", "close"]);
        assert_eq!(kinds(&drain(&mut second_rx)), ["ack", "player_state"]);
        assert_eq!(state.players().get(&player_id).unwrap().conn_id, second_conn);
    }

    #[tokio::test]
    async fn contribute_frame_is_acknowledged() {
        let (state, player_id) = state_with_player(true).await;
        let (tx, mut rx) = mpsc::unbounded_channel();

        handle_text(&state, &player_id, &tx, r#"{"type":"contribute","amount":3.7}"#)
            .await
            .unwrap();
        let frames = drain(&mut rx);
        assert_eq!(kinds(&frames), ["contribution_accepted"]);
        assert_eq!(frames[0]["stored"], json!(3.0));
        assert_eq!(frames[0]["overwritten"], json!(false));

        let err = handle_text(&state, &player_id, &tx, r#"{"type":"dance"}"#)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PlayerSocketError::Service(ServiceError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn commits_refresh_the_view_until_a_reset_removes_the_player() {
        let (state, player_id) = state_with_player(true).await;
        let before = PlayerView::from_record(&state.game(), &player_id).unwrap();
        assert!(before.can_contribute);

        state
            .submit_contribution(player_id.clone(), 2.0)
            .await
            .unwrap();
        let after = match view_update(&state.game(), &player_id, &before) {
            ViewUpdate::Changed(view) => view,
            other => panic!("expected a changed view, got {other:?}"),
        };
        assert_eq!(after.current_vote, Some(2.0));
        assert!(!after.can_contribute);
        assert_eq!(
            view_update(&state.game(), &player_id, &after),
            ViewUpdate::Unchanged
        );

        state.transition(GameEvent::Reset).await.unwrap();
        assert_eq!(
            view_update(&state.game(), &player_id, &after),
            ViewUpdate::Removed
        );
    }
}
