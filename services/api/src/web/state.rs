//! services/api/src/web/state.rs
//!
//! Defines the application's shared and session-specific states.

use crate::config::Config;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use valentine_core::ports::ValentineStore;
use valentine_core::session::{EntryContext, LinkBuilder, ViewSession};

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ValentineStore>,
    pub config: Arc<Config>,
    pub links: LinkBuilder,
}

impl AppState {
    pub fn new(store: Arc<dyn ValentineStore>, config: Arc<Config>) -> Self {
        let links = LinkBuilder::new(config.public_base_url.clone());
        Self {
            store,
            config,
            links,
        }
    }
}

//=========================================================================================
// SessionState (Specific to One WebSocket Connection)
//=========================================================================================

/// The state for a single, active WebSocket connection: one page visit.
pub struct SessionState {
    pub view: ViewSession,
    pub rng: StdRng,
    /// A token to cancel the running firework show.
    pub cancellation_token: CancellationToken,
}

impl SessionState {
    /// Creates a new `SessionState` by resolving the entry context against the store.
    pub async fn new(app_state: Arc<AppState>, entry: EntryContext) -> Self {
        let view = ViewSession::resolve(app_state.store.as_ref(), entry, app_state.links.clone()).await;
        Self {
            view,
            rng: StdRng::from_entropy(),
            cancellation_token: CancellationToken::new(),
        }
    }
}
