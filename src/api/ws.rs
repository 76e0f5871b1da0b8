//! Live collection feeds over WebSocket.
//!
//! Every message is a complete snapshot `{"collection", "items"}` that
//! replaces the client's copy. The socket belongs to one session and closes
//! when that session signs out.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use super::error::ApiError;
use crate::feeds::{load_snapshot, Collection, Snapshot};
use crate::session::{Caller, SessionEvent};
use crate::AppState;

#[derive(Deserialize)]
pub struct WsAuthQuery {
    token: Option<String>,
}

async fn authenticate(state: &AppState, query: &WsAuthQuery) -> Result<Caller, ApiError> {
    let token = query
        .token
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    state
        .sessions
        .resolve(token)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))
}

/// GET /api/feeds/ws?token=...
pub async fn feeds_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<WsAuthQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let caller = authenticate(&state, &query).await?;
    tracing::debug!(user_id = %caller.id, session_id = %caller.session_id, "Feed socket opened");
    Ok(ws.on_upgrade(move |socket| handle_feeds(socket, state, caller)))
}

async fn send_snapshot<S>(sender: &mut S, snapshot: &Snapshot) -> bool
where
    S: Sink<Message> + Unpin,
{
    let text = match serde_json::to_string(snapshot) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode snapshot");
            return true;
        }
    };
    sender.send(Message::Text(text.into())).await.is_ok()
}

/// Load and send one collection. Returns false once the socket is gone.
async fn push<S>(sender: &mut S, state: &AppState, collection: Collection, caller: &Caller) -> bool
where
    S: Sink<Message> + Unpin,
{
    match load_snapshot(&state.db, collection, caller).await {
        Ok(snapshot) => send_snapshot(sender, &snapshot).await,
        Err(e) => {
            // Keep the client's last good snapshot
            tracing::warn!(collection = ?collection, error = %e, "Failed to load snapshot");
            true
        }
    }
}

async fn push_all<S>(sender: &mut S, state: &AppState, caller: &Caller) -> bool
where
    S: Sink<Message> + Unpin,
{
    for collection in Collection::ALL {
        if !push(sender, state, collection, caller).await {
            return false;
        }
    }
    true
}

/// Whether the socket's session may still receive user-scoped snapshots
async fn session_live(state: &AppState, caller: &Caller) -> bool {
    match state.sessions.is_live(&caller.session_id).await {
        Ok(live) => live,
        Err(e) => {
            tracing::warn!(session_id = %caller.session_id, error = %e, "Failed to check session");
            true
        }
    }
}

/// Clear the client's scoped state and close
async fn sign_off<S>(sender: &mut S, caller: &Caller)
where
    S: Sink<Message> + Unpin,
{
    let _ = send_snapshot(sender, &Snapshot::empty(Collection::UserRewards)).await;
    let _ = sender.send(Message::Close(None)).await;
    tracing::debug!(user_id = %caller.id, session_id = %caller.session_id, "Feed socket closed on sign-out");
}

async fn handle_feeds(socket: WebSocket, state: Arc<AppState>, caller: Caller) {
    let (sender, receiver) = socket.split();
    run_feeds(sender, receiver, state, caller).await;
}

async fn run_feeds<S, R, E>(mut sender: S, mut receiver: R, state: Arc<AppState>, caller: Caller)
where
    S: Sink<Message> + Unpin,
    R: Stream<Item = Result<Message, E>> + Unpin,
{
    // Subscribe before the first snapshot so no change is missed in between
    let mut changes = state.feeds.subscribe();
    let mut sessions = state.sessions.subscribe();

    if !push_all(&mut sender, &state, &caller).await {
        return;
    }

    loop {
        tokio::select! {
            change = changes.recv() => {
                // None means reload everything
                let collection = match change {
                    Ok(change) if change.concerns(&caller.id) => Some(change.collection),
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Feed subscriber lagged, resending all snapshots");
                        None
                    }
                    Err(RecvError::Closed) => return,
                };

                if !session_live(&state, &caller).await {
                    sign_off(&mut sender, &caller).await;
                    return;
                }

                let delivered = match collection {
                    Some(collection) => push(&mut sender, &state, collection, &caller).await,
                    None => push_all(&mut sender, &state, &caller).await,
                };
                if !delivered {
                    return;
                }
            }

            event = sessions.recv() => {
                match event {
                    Ok(SessionEvent::SignedOut { session_id, .. }) if session_id == caller.session_id => {
                        sign_off(&mut sender, &caller).await;
                        return;
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Session subscriber lagged");
                        if !session_live(&state, &caller).await {
                            sign_off(&mut sender, &caller).await;
                            return;
                        }
                    }
                    Err(RecvError::Closed) => return,
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            return;
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
                    _ => {}
                }
            }
        }
    }
}
