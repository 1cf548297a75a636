//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser page and the API
//! server. The server owns the view state; the page renders what it is sent.

use serde::{Deserialize, Serialize};
use valentine_core::fireworks::{Firework, Viewport};
use valentine_core::session::{Mode, ResultStatus, ShareLinks, ViewSession};

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Submits the create form.
    CreateValentine {
        sender_name: String,
        #[serde(default)]
        recipient_name: Option<String>,
    },

    /// Lets the sender try the question before sharing it.
    StartPreview,

    /// The page may report its viewport so fireworks land on screen.
    PressYes {
        #[serde(default)]
        viewport: Option<ViewportPayload>,
    },

    PressNo,

    /// The "Let me reconsider" button under the video.
    DismissVideo,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq)]
pub struct ViewportPayload {
    pub width: f64,
    pub height: f64,
}

impl From<ViewportPayload> for Viewport {
    fn from(payload: ViewportPayload) -> Self {
        Viewport {
            width: payload.width.max(0.0),
            height: payload.height.max(0.0),
        }
    }
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The full view state. Sent after every user action.
    View(ViewPayload),

    /// The create flow succeeded.
    LinkReady(LinksPayload),

    /// The create flow failed; the form can be resubmitted.
    CreateFailed { message: String },

    FireworkSpawned { firework: FireworkPayload },

    FireworkRetired { id: u64 },

    /// No more fireworks will be sent for this show.
    ShowEnded,

    /// Entry resolution failed. The page should offer a way back home.
    Error { message: String, home_url: String },
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ViewPayload {
    pub mode: &'static str,
    pub show_question: bool,
    pub show_celebration: bool,
    pub show_video: bool,
    pub no_attempts: u32,
    pub no_label: &'static str,
    pub sender_name: Option<String>,
    pub recipient_name: Option<String>,
    pub links: Option<LinksPayload>,
    pub create_error: Option<String>,
    pub results: Option<ResultsPayload>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct LinksPayload {
    pub code: String,
    pub answer_url: String,
    pub results_url: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ResultsPayload {
    pub headline: &'static str,
    pub reply: Option<&'static str>,
    pub replied_on: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct FireworkPayload {
    pub id: u64,
    pub x: f64,
    pub y: f64,
    pub particles: Vec<ParticlePayload>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ParticlePayload {
    pub id: usize,
    pub angle: f64,
    pub distance: f64,
    pub color: &'static str,
    pub size: f64,
    /// Final displacement from the burst origin.
    pub dx: f64,
    pub dy: f64,
}

//=========================================================================================
// Conversions from the core types
//=========================================================================================

fn mode_name(mode: Mode) -> &'static str {
    match mode {
        Mode::Create => "create",
        Mode::Answer => "answer",
        Mode::Results => "results",
        Mode::AlreadyAnswered => "already_answered",
    }
}

impl ViewPayload {
    /// Returns `None` for a session whose entry resolution failed.
    pub fn from_session(view: &ViewSession) -> Option<Self> {
        let mode = view.mode()?;
        let question = view.question();
        let record = view.record();
        let results = view.results().map(|r| ResultsPayload {
            headline: r.headline(),
            reply: match r.status {
                ResultStatus::Yes { .. } => Some("yes"),
                ResultStatus::No { .. } => Some("no"),
                ResultStatus::Unanswered => None,
            },
            replied_on: r.replied_on(),
        });

        Some(Self {
            mode: mode_name(mode),
            show_question: question.show_question,
            show_celebration: question.show_celebration,
            show_video: question.show_video,
            no_attempts: question.no_attempts,
            no_label: question.no_label(),
            sender_name: record.map(|r| r.sender_name.to_string()),
            recipient_name: record
                .and_then(|r| r.recipient_name.as_ref())
                .map(|n| n.as_str().to_string()),
            links: view.share_links().map(LinksPayload::from),
            create_error: view.create_error().map(String::from),
            results,
        })
    }
}

impl From<&ShareLinks> for LinksPayload {
    fn from(links: &ShareLinks) -> Self {
        Self {
            code: links.code.to_string(),
            answer_url: links.answer_url.clone(),
            results_url: links.results_url.clone(),
        }
    }
}

impl From<&Firework> for FireworkPayload {
    fn from(firework: &Firework) -> Self {
        Self {
            id: firework.id.0,
            x: firework.x,
            y: firework.y,
            particles: firework
                .particles
                .iter()
                .map(|p| {
                    let (dx, dy) = p.offset();
                    ParticlePayload {
                        id: p.index,
                        angle: p.angle,
                        distance: p.distance,
                        color: p.color,
                        size: p.size,
                        dx,
                        dy,
                    }
                })
                .collect(),
        }
    }
}
