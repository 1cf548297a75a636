pub mod celebration_task;
pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;
pub mod ws_handler;

// Re-export the handlers the binary needs to build the web server router.
pub use middleware::log_requests;
pub use rest::{create_valentine_handler, get_valentine_handler, record_reply_handler};
pub use ws_handler::ws_handler;
