//! services/api/src/web/celebration_task.rs
//!
//! This module contains the asynchronous "worker" function that plays the
//! firework show of a session in real time.

use crate::web::{
    protocol::{FireworkPayload, ServerMessage},
    state::SessionState,
};
use std::sync::Arc;
use tokio::sync::{mpsc::UnboundedSender, Mutex};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use valentine_core::fireworks::ShowEvent;

/// Plays the session's planned show, sending each spawn and retirement as it
/// falls due.
///
/// The schedule itself lives in the session; this task only sleeps until the next
/// due time and advances it. It can be cancelled via a `CancellationToken`.
pub async fn celebration_process(
    session_state_lock: Arc<Mutex<SessionState>>,
    outbound: UnboundedSender<ServerMessage>,
    cancellation_token: CancellationToken,
) {
    info!("Firework show started.");
    let started = Instant::now();

    loop {
        let next_due = session_state_lock.lock().await.view.next_firework_due();
        let Some(due) = next_due else {
            break;
        };

        tokio::select! {
            _ = cancellation_token.cancelled() => {
                info!("Firework show cancelled.");
                session_state_lock.lock().await.view.stop_fireworks();
                return;
            }
            _ = sleep_until(started + due) => {}
        }

        let events = session_state_lock
            .lock()
            .await
            .view
            .advance_fireworks(started.elapsed());

        for event in events {
            let message = match &event {
                ShowEvent::Spawn(firework) => ServerMessage::FireworkSpawned {
                    firework: FireworkPayload::from(firework),
                },
                ShowEvent::Retire(id) => ServerMessage::FireworkRetired { id: id.0 },
            };
            if outbound.send(message).is_err() {
                debug!("Client gone; ending firework show.");
                return;
            }
        }
    }

    info!("Firework show finished.");
    let _ = outbound.send(ServerMessage::ShowEnded);
}
