//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a WebSocket connection.
//! One connection is one page visit: it resolves the entry context, then drives
//! the view state machine from the client's button presses.

use crate::web::{
    celebration_task::celebration_process,
    protocol::{ClientMessage, LinksPayload, ServerMessage, ViewPayload},
    state::{AppState, SessionState},
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use rand::rngs::OsRng;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{
    mpsc::{self, UnboundedSender},
    Mutex,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use valentine_core::fireworks::Viewport;
use valentine_core::session::{
    create_valentine, CreateError, EntryContext, PendingReply, ERROR_MESSAGE,
};

/// The page's query string.
#[derive(Deserialize, Debug, Default)]
pub struct EntryQuery {
    pub code: Option<String>,
    pub results: Option<String>,
}

impl EntryQuery {
    pub fn entry_context(&self) -> EntryContext {
        EntryContext::from_params(self.code.as_deref(), self.results.as_deref())
    }
}

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<EntryQuery>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, query.entry_context()))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, entry: EntryContext) {
    info!("New WebSocket connection established: {:?}", entry);

    // All outgoing traffic goes through one channel so the show task and the
    // message loop never contend for the sink.
    let (mut sender, mut receiver) = socket.split();
    let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<ServerMessage>();
    let writer = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize server message: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                error!("Failed to send message; closing writer.");
                break;
            }
        }
    });

    // --- 1. Entry Resolution ---
    let session = SessionState::new(app_state.clone(), entry).await;
    let resolved = send_view(&session, &outbound);
    let session_state_lock = Arc::new(Mutex::new(session));

    // --- 2. Main Message Loop ---
    if resolved {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ClientMessage>(text.as_str()) {
                    Ok(client_msg) => {
                        handle_client_message(client_msg, &app_state, &session_state_lock, &outbound)
                            .await;
                    }
                    Err(e) => warn!("Failed to deserialize client message: {}", e),
                },
                Message::Close(_) => {
                    info!("Client sent close message.");
                    break;
                }
                _ => {}
            }
        }
    }

    // --- 3. Cleanup ---
    session_state_lock.lock().await.cancellation_token.cancel();
    drop(outbound);
    if writer.await.is_err() {
        warn!("Writer task ended abnormally.");
    }
    info!("WebSocket connection closed.");
}

/// Sends the current view, or the error screen if entry resolution failed.
/// Returns whether the session is usable.
pub fn send_view(session: &SessionState, outbound: &UnboundedSender<ServerMessage>) -> bool {
    let message = match ViewPayload::from_session(&session.view) {
        Some(view) => ServerMessage::View(view),
        None => ServerMessage::Error {
            message: ERROR_MESSAGE.to_string(),
            home_url: session.view.home_url().to_string(),
        },
    };
    let usable = matches!(message, ServerMessage::View(_));
    let _ = outbound.send(message);
    usable
}

/// Applies one client message to the session and queues the resulting updates.
pub async fn handle_client_message(
    client_msg: ClientMessage,
    app_state: &Arc<AppState>,
    session_state_lock: &Arc<Mutex<SessionState>>,
    outbound: &UnboundedSender<ServerMessage>,
) {
    let mut session = session_state_lock.lock().await;

    match client_msg {
        ClientMessage::CreateValentine {
            sender_name,
            recipient_name,
        } => {
            // The insert runs unlocked so a running preview show keeps its timing.
            let accepts = session.view.accepts_create();
            drop(session);
            let created = if accepts {
                create_valentine(
                    app_state.store.as_ref(),
                    &sender_name,
                    recipient_name.as_deref(),
                    &mut OsRng,
                )
                .await
            } else {
                Err(CreateError::WrongMode)
            };
            session = session_state_lock.lock().await;

            let _ = match session.view.finish_create(created) {
                Ok(links) => outbound.send(ServerMessage::LinkReady(LinksPayload::from(&links))),
                Err(e) => {
                    warn!("Create failed: {}", e);
                    outbound.send(ServerMessage::CreateFailed {
                        message: e.to_string(),
                    })
                }
            };
        }
        ClientMessage::StartPreview => session.view.start_preview(),
        ClientMessage::PressYes { viewport } => {
            let viewport = viewport.map(Viewport::from).unwrap_or_default();
            let SessionState { view, rng, .. } = &mut *session;
            let effects = view.press_yes(rng, viewport);
            if let Some(pending) = effects.persist {
                persist_in_background(app_state, pending);
            }
            if effects.show_started {
                info!("Yes! Starting the celebration.");
                session.cancellation_token.cancel();
                session.cancellation_token = CancellationToken::new();
                let token = session.cancellation_token.clone();
                let session_state_lock = session_state_lock.clone();
                let outbound = outbound.clone();
                tokio::spawn(celebration_process(session_state_lock, outbound, token));
            }
        }
        ClientMessage::PressNo => {
            if let Some(pending) = session.view.press_no().persist {
                info!("No limit reached; playing the video.");
                persist_in_background(app_state, pending);
            }
        }
        ClientMessage::DismissVideo => session.view.dismiss_video(),
    }

    send_view(&session, outbound);
}

/// Fires the reply write without waiting for it. The UI has already moved on.
fn persist_in_background(app_state: &Arc<AppState>, pending: PendingReply) {
    let store = app_state.store.clone();
    tokio::spawn(async move {
        pending.send(store.as_ref()).await;
    });
}
