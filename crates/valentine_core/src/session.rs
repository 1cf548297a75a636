//! crates/valentine_core/src/session.rs
//!
//! The view state machine for a single page visit.
//!
//! A `ViewSession` only exists once entry resolution has settled, so the mode is
//! fixed for its whole lifetime. The question flow (question, celebration, video)
//! is layered on top of the mode. Every user action is synchronous; anything that
//! has to reach the store is handed back to the caller as a [`PendingReply`].

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::code::generate_code;
use crate::domain::{
    Code, NewValentine, RecipientName, Reply, SenderName, ValentineRecord, ValidationError,
};
use crate::fireworks::{Firework, FireworkIds, FireworkSettings, FireworkShow, ShowEvent, Viewport};
use crate::ports::{Clipboard, ClipboardError, PortError, ValentineStore};

/// Labels of the "No" button, in escalation order.
pub const NO_LABELS: [&str; 5] = [
    "No",
    "Are you sure?",
    "Really sure?",
    "Think again",
    "Last chance",
];

/// Number of "No" clicks that triggers the fallback video.
pub const VIDEO_THRESHOLD: u32 = 5;

/// How many fresh codes the create flow tries before giving up on collisions.
pub const MAX_CODE_ATTEMPTS: usize = 5;

/// How long the "copied" confirmation stays visible.
pub const COPY_CONFIRMATION: Duration = Duration::from_secs(2);

/// Shown for every failed entry resolution, whatever the cause.
pub const ERROR_MESSAGE: &str =
    "Oh no! This valentine seems to have lost its way. The link may be broken or expired.";

//=========================================================================================
// Entry Context and Errors
//=========================================================================================

/// What the page was opened with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryContext {
    Create,
    Answer(String),
    Results(String),
}

impl EntryContext {
    /// Builds the context from the `code` and `results` query parameters.
    ///
    /// Blank values count as absent. If both are given, `results` wins.
    pub fn from_params(code: Option<&str>, results: Option<&str>) -> Self {
        let present = |v: Option<&str>| v.map(str::trim).filter(|s| !s.is_empty()).map(String::from);
        match (present(code), present(results)) {
            (_, Some(results)) => EntryContext::Results(results),
            (Some(code), None) => EntryContext::Answer(code),
            (None, None) => EntryContext::Create,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EntryError {
    #[error("Invalid code: {0}")]
    InvalidCode(String),
    #[error("Valentine not found: {0}")]
    NotFound(String),
    #[error("Lookup failed: {0}")]
    Remote(#[from] PortError),
}

#[derive(Debug, thiserror::Error)]
pub enum CreateError {
    #[error("Only available when creating a valentine")]
    WrongMode,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Could not save the valentine: {0}")]
    Store(PortError),
    #[error("Could not find a free code after {attempts} attempts")]
    CodeSpaceExhausted { attempts: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum CopyError {
    #[error("There is no link to copy yet")]
    NothingToCopy,
    #[error(transparent)]
    Clipboard(#[from] ClipboardError),
}

//=========================================================================================
// Modes, Links and Views
//=========================================================================================

/// The top-level screen a session is locked into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Create,
    Answer,
    Results,
    AlreadyAnswered,
}

#[derive(Debug)]
pub enum Phase {
    Ready(Mode),
    Failed(EntryError),
}

/// Derives the share URLs from the page's public base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkBuilder {
    base_url: String,
}

impl LinkBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    pub fn home(&self) -> &str {
        &self.base_url
    }

    pub fn links(&self, code: &Code) -> ShareLinks {
        ShareLinks {
            code: code.clone(),
            answer_url: format!("{}?code={}", self.base_url, code),
            results_url: format!("{}?results={}", self.base_url, code),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLinks {
    pub code: Code,
    pub answer_url: String,
    pub results_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Answer,
    Results,
}

/// The question flow flags. Only one of the three screens is visible at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionState {
    pub show_question: bool,
    pub show_celebration: bool,
    pub show_video: bool,
    pub no_attempts: u32,
}

impl QuestionState {
    fn asking() -> Self {
        Self {
            show_question: true,
            ..Self::default()
        }
    }

    /// The label the "No" button currently shows.
    pub fn no_label(&self) -> &'static str {
        let index = (self.no_attempts as usize).min(NO_LABELS.len() - 1);
        NO_LABELS[index]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultStatus {
    Yes { replied_at: Option<DateTime<Utc>> },
    No { replied_at: Option<DateTime<Utc>> },
    Unanswered,
}

/// What the sender sees when checking on their valentine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultsView {
    pub sender_name: String,
    pub recipient_name: Option<String>,
    pub status: ResultStatus,
}

impl ResultsView {
    fn from_record(record: &ValentineRecord) -> Self {
        let status = match record.reply {
            Some(Reply::Yes) => ResultStatus::Yes {
                replied_at: record.replied_at,
            },
            Some(Reply::No) => ResultStatus::No {
                replied_at: record.replied_at,
            },
            None => ResultStatus::Unanswered,
        };
        Self {
            sender_name: record.sender_name.to_string(),
            recipient_name: record.recipient_name.as_ref().map(|r| r.as_str().to_string()),
            status,
        }
    }

    pub fn headline(&self) -> &'static str {
        match self.status {
            ResultStatus::Yes { .. } => "They said YES!",
            ResultStatus::No { .. } => "They said no...",
            ResultStatus::Unanswered => "No answer yet. Check back later!",
        }
    }

    /// The reply date, e.g. "February 14, 2026".
    pub fn replied_on(&self) -> Option<String> {
        match self.status {
            ResultStatus::Yes { replied_at } | ResultStatus::No { replied_at } => {
                replied_at.map(|at| at.format("%B %-d, %Y").to_string())
            }
            ResultStatus::Unanswered => None,
        }
    }
}

//=========================================================================================
// Best-effort Persistence
//=========================================================================================

/// A reply write the caller should issue without waiting on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReply {
    pub code: Code,
    pub reply: Reply,
}

/// How a best-effort reply write ended. Callers are free to ignore it.
#[derive(Debug)]
pub enum PersistOutcome {
    Recorded(ValentineRecord),
    AlreadyAnswered,
    Failed(PortError),
}

impl PendingReply {
    pub async fn send(self, store: &dyn ValentineStore) -> PersistOutcome {
        match store.record_reply(&self.code, self.reply).await {
            Ok(record) => {
                info!("Recorded reply '{}' for valentine {}", self.reply, self.code);
                PersistOutcome::Recorded(record)
            }
            Err(PortError::AlreadyAnswered(_)) => {
                debug!(
                    "Valentine {} already answered; keeping the first reply",
                    self.code
                );
                PersistOutcome::AlreadyAnswered
            }
            Err(e) => {
                warn!("Failed to record reply for valentine {}: {:?}", self.code, e);
                PersistOutcome::Failed(e)
            }
        }
    }
}

//=========================================================================================
// Creation
//=========================================================================================

/// Validates the names and inserts a new valentine under a freshly generated code,
/// regenerating the code whenever the store reports a collision.
pub async fn create_valentine<R: Rng + ?Sized>(
    store: &dyn ValentineStore,
    sender_name: &str,
    recipient_name: Option<&str>,
    rng: &mut R,
) -> Result<ValentineRecord, CreateError> {
    let sender_name = SenderName::parse(sender_name)?;
    let recipient_name = RecipientName::parse_optional(recipient_name)?;

    for attempt in 1..=MAX_CODE_ATTEMPTS {
        let valentine = NewValentine {
            code: generate_code(rng),
            sender_name: sender_name.clone(),
            recipient_name: recipient_name.clone(),
        };
        match store.insert(valentine).await {
            Ok(record) => {
                info!("Created valentine {} from {}", record.code, record.sender_name);
                return Ok(record);
            }
            Err(PortError::Conflict(msg)) => {
                debug!("Code collision on attempt {}: {}", attempt, msg);
            }
            Err(e) => return Err(CreateError::Store(e)),
        }
    }
    Err(CreateError::CodeSpaceExhausted {
        attempts: MAX_CODE_ATTEMPTS,
    })
}

/// Side effects requested by a user action.
#[derive(Debug, Default)]
pub struct Effects {
    pub persist: Option<PendingReply>,
    pub show_started: bool,
}

//=========================================================================================
// ViewSession
//=========================================================================================

pub struct ViewSession {
    phase: Phase,
    record: Option<ValentineRecord>,
    links: LinkBuilder,
    question: QuestionState,
    share: Option<ShareLinks>,
    create_error: Option<String>,
    copied_at: Option<Instant>,
    ids: FireworkIds,
    settings: FireworkSettings,
    show: Option<FireworkShow>,
}

impl ViewSession {
    /// Resolves the entry context against the store and settles on exactly one
    /// mode (or the error screen). Dropping the future before it completes leaves
    /// nothing behind.
    pub async fn resolve(
        store: &dyn ValentineStore,
        entry: EntryContext,
        links: LinkBuilder,
    ) -> Self {
        let (phase, record) = match Self::lookup(store, entry).await {
            Ok((mode, record)) => (Phase::Ready(mode), record),
            Err(e) => {
                warn!("Entry resolution failed: {}", e);
                (Phase::Failed(e), None)
            }
        };
        let question = match phase {
            Phase::Ready(Mode::Answer) => QuestionState::asking(),
            _ => QuestionState::default(),
        };
        Self {
            phase,
            record,
            links,
            question,
            share: None,
            create_error: None,
            copied_at: None,
            ids: FireworkIds::new(),
            settings: FireworkSettings::default(),
            show: None,
        }
    }

    async fn lookup(
        store: &dyn ValentineStore,
        entry: EntryContext,
    ) -> Result<(Mode, Option<ValentineRecord>), EntryError> {
        let (raw, for_results) = match entry {
            EntryContext::Create => return Ok((Mode::Create, None)),
            EntryContext::Answer(raw) => (raw, false),
            EntryContext::Results(raw) => (raw, true),
        };
        let code = Code::parse(&raw).ok_or_else(|| EntryError::InvalidCode(raw.clone()))?;
        let record = store
            .find_by_code(&code)
            .await?
            .ok_or_else(|| EntryError::NotFound(code.to_string()))?;

        let mode = if for_results {
            Mode::Results
        } else if record.is_answered() {
            Mode::AlreadyAnswered
        } else {
            Mode::Answer
        };
        debug!("Valentine {} resolved to {:?}", code, mode);
        Ok((mode, Some(record)))
    }

    /// Overrides the firework tunables used by later shows.
    pub fn with_firework_settings(mut self, settings: FireworkSettings) -> Self {
        self.settings = settings;
        self
    }

    // --- Accessors ---

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn mode(&self) -> Option<Mode> {
        match self.phase {
            Phase::Ready(mode) => Some(mode),
            Phase::Failed(_) => None,
        }
    }

    /// The generic message for the error screen, if resolution failed.
    pub fn error_message(&self) -> Option<&'static str> {
        matches!(self.phase, Phase::Failed(_)).then_some(ERROR_MESSAGE)
    }

    /// Where the error screen's single recovery action leads.
    pub fn home_url(&self) -> &str {
        self.links.home()
    }

    pub fn record(&self) -> Option<&ValentineRecord> {
        self.record.as_ref()
    }

    pub fn question(&self) -> &QuestionState {
        &self.question
    }

    pub fn no_label(&self) -> &'static str {
        self.question.no_label()
    }

    pub fn share_links(&self) -> Option<&ShareLinks> {
        self.share.as_ref()
    }

    pub fn create_error(&self) -> Option<&str> {
        self.create_error.as_deref()
    }

    pub fn results(&self) -> Option<ResultsView> {
        match (self.mode(), &self.record) {
            (Some(Mode::Results), Some(record)) => Some(ResultsView::from_record(record)),
            _ => None,
        }
    }

    // --- Create flow ---

    /// Validates the names, saves a new valentine under a fresh code and returns
    /// its share links. Failures are kept in `create_error` and can be retried.
    pub async fn create<R: Rng + ?Sized>(
        &mut self,
        store: &dyn ValentineStore,
        sender_name: &str,
        recipient_name: Option<&str>,
        rng: &mut R,
    ) -> Result<ShareLinks, CreateError> {
        let created = if self.accepts_create() {
            create_valentine(store, sender_name, recipient_name, rng).await
        } else {
            Err(CreateError::WrongMode)
        };
        self.finish_create(created)
    }

    pub fn accepts_create(&self) -> bool {
        self.mode() == Some(Mode::Create)
    }

    /// Applies the outcome of a [`create_valentine`] call made without holding
    /// the session.
    pub fn finish_create(
        &mut self,
        created: Result<ValentineRecord, CreateError>,
    ) -> Result<ShareLinks, CreateError> {
        match created {
            Ok(record) => {
                let links = self.links.links(&record.code);
                self.record = Some(record);
                self.create_error = None;
                self.copied_at = None;
                self.share = Some(links.clone());
                Ok(links)
            }
            Err(e) => {
                self.create_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Lets the sender try the question themselves. Nothing is persisted.
    pub fn start_preview(&mut self) {
        let idle = self.question == QuestionState::default();
        if self.mode() == Some(Mode::Create) && idle {
            self.question = QuestionState::asking();
        }
    }

    // --- Answer flow ---

    pub fn press_yes<R: Rng + ?Sized>(&mut self, rng: &mut R, viewport: Viewport) -> Effects {
        if !self.question.show_question {
            return Effects::default();
        }
        self.question.show_question = false;
        self.question.show_celebration = true;
        self.show = Some(FireworkShow::plan(rng, &mut self.ids, viewport, &self.settings));

        Effects {
            persist: self.pending_reply(Reply::Yes),
            show_started: true,
        }
    }

    pub fn press_no(&mut self) -> Effects {
        if !self.question.show_question {
            return Effects::default();
        }
        self.question.no_attempts += 1;
        if self.question.no_attempts < VIDEO_THRESHOLD {
            return Effects::default();
        }
        self.question.show_question = false;
        self.question.show_video = true;

        Effects {
            persist: self.pending_reply(Reply::No),
            show_started: false,
        }
    }

    /// Closes the video and asks the question again from the start.
    pub fn dismiss_video(&mut self) {
        if self.question.show_video {
            self.question = QuestionState::asking();
        }
    }

    fn pending_reply(&self, reply: Reply) -> Option<PendingReply> {
        match (self.mode(), &self.record) {
            (Some(Mode::Answer), Some(record)) => Some(PendingReply {
                code: record.code.clone(),
                reply,
            }),
            _ => None,
        }
    }

    // --- Fireworks ---

    pub fn next_firework_due(&self) -> Option<Duration> {
        self.show.as_ref().and_then(FireworkShow::next_due)
    }

    pub fn advance_fireworks(&mut self, elapsed: Duration) -> Vec<ShowEvent> {
        self.show
            .as_mut()
            .map(|show| show.advance(elapsed))
            .unwrap_or_default()
    }

    pub fn stop_fireworks(&mut self) {
        if let Some(show) = self.show.as_mut() {
            show.stop();
        }
    }

    pub fn fireworks(&self) -> &[Firework] {
        self.show.as_ref().map(FireworkShow::active).unwrap_or(&[])
    }

    // --- Clipboard ---

    pub fn copy_link(
        &mut self,
        kind: LinkKind,
        clipboard: &dyn Clipboard,
        now: Instant,
    ) -> Result<(), CopyError> {
        let links = self.share.as_ref().ok_or(CopyError::NothingToCopy)?;
        let text = match kind {
            LinkKind::Answer => &links.answer_url,
            LinkKind::Results => &links.results_url,
        };
        if let Err(e) = clipboard.write_text(text) {
            debug!("Clipboard API failed, falling back to selection copy: {}", e);
            clipboard.select_and_copy(text)?;
        }
        self.copied_at = Some(now);
        Ok(())
    }

    pub fn link_copied(&self, now: Instant) -> bool {
        self.copied_at
            .is_some_and(|at| now.saturating_duration_since(at) < COPY_CONFIRMATION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_parameter_takes_precedence() {
        assert_eq!(
            EntryContext::from_params(Some("a"), Some("b")),
            EntryContext::Results("b".to_string())
        );
        assert_eq!(
            EntryContext::from_params(Some("a"), None),
            EntryContext::Answer("a".to_string())
        );
        assert_eq!(
            EntryContext::from_params(Some("  "), Some("")),
            EntryContext::Create
        );
    }

    #[test]
    fn no_label_clamps_at_last_phrase() {
        let mut state = QuestionState::asking();
        assert_eq!(state.no_label(), "No");
        state.no_attempts = 3;
        assert_eq!(state.no_label(), "Think again");
        state.no_attempts = 9;
        assert_eq!(state.no_label(), "Last chance");
    }

    #[test]
    fn links_are_built_from_base_url() {
        let builder = LinkBuilder::new("https://valentine.example/");
        let links = builder.links(&Code::parse("abc123def456").unwrap());
        assert_eq!(links.answer_url, "https://valentine.example/?code=abc123def456");
        assert_eq!(links.results_url, "https://valentine.example/?results=abc123def456");
    }

    #[test]
    fn results_view_formats_reply_date() {
        let replied_at = DateTime::parse_from_rfc3339("2026-02-14T18:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let view = ResultsView {
            sender_name: "Alex".to_string(),
            recipient_name: None,
            status: ResultStatus::Yes {
                replied_at: Some(replied_at),
            },
        };
        assert_eq!(view.headline(), "They said YES!");
        assert_eq!(view.replied_on().as_deref(), Some("February 14, 2026"));
    }
}
