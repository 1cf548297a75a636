//! Tests of the WebSocket session logic, driven through the outbound channel
//! instead of a real socket.

use api_lib::config::Config;
use api_lib::web::protocol::{ClientMessage, ServerMessage, ViewPayload};
use api_lib::web::state::{AppState, SessionState};
use api_lib::web::ws_handler::{handle_client_message, send_view, EntryQuery};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tokio::time::Instant;
use valentine_core::domain::{Code, NewValentine, Reply, ValentineRecord};
use valentine_core::memory::InMemoryStore;
use valentine_core::ports::{PortResult, ValentineStore};
use valentine_core::session::ERROR_MESSAGE;

/// An in-memory store whose inserts take a while.
struct SlowInsertStore {
    inner: Arc<InMemoryStore>,
    delay: Duration,
}

#[async_trait]
impl ValentineStore for SlowInsertStore {
    async fn find_by_code(&self, code: &Code) -> PortResult<Option<ValentineRecord>> {
        self.inner.find_by_code(code).await
    }

    async fn insert(&self, valentine: NewValentine) -> PortResult<ValentineRecord> {
        tokio::time::sleep(self.delay).await;
        self.inner.insert(valentine).await
    }

    async fn record_reply(&self, code: &Code, reply: Reply) -> PortResult<ValentineRecord> {
        self.inner.record_reply(code, reply).await
    }
}

struct Harness {
    app_state: Arc<AppState>,
    store: Arc<InMemoryStore>,
}

impl Harness {
    fn new() -> Self {
        let config = Config::from_lookup(|_| None).unwrap();
        let store = Arc::new(InMemoryStore::new());
        let app_state = Arc::new(AppState::new(store.clone(), Arc::new(config)));
        Self { app_state, store }
    }

    fn with_insert_delay(delay: Duration) -> Self {
        let config = Config::from_lookup(|_| None).unwrap();
        let store = Arc::new(InMemoryStore::new());
        let slow = SlowInsertStore {
            inner: store.clone(),
            delay,
        };
        let app_state = Arc::new(AppState::new(Arc::new(slow), Arc::new(config)));
        Self { app_state, store }
    }

    async fn open(
        &self,
        code: Option<&str>,
        results: Option<&str>,
    ) -> (
        Arc<Mutex<SessionState>>,
        UnboundedSender<ServerMessage>,
        UnboundedReceiver<ServerMessage>,
    ) {
        let query = EntryQuery {
            code: code.map(String::from),
            results: results.map(String::from),
        };
        let session = SessionState::new(self.app_state.clone(), query.entry_context()).await;
        let (tx, rx) = mpsc::unbounded_channel();
        send_view(&session, &tx);
        (Arc::new(Mutex::new(session)), tx, rx)
    }

    async fn send(
        &self,
        session: &Arc<Mutex<SessionState>>,
        tx: &UnboundedSender<ServerMessage>,
        msg: ClientMessage,
    ) {
        handle_client_message(msg, &self.app_state, session, tx).await;
    }

    async fn create_code(&self) -> String {
        let (session, tx, mut rx) = self.open(None, None).await;
        rx.recv().await.unwrap();
        self.send(
            &session,
            &tx,
            ClientMessage::CreateValentine {
                sender_name: "Alex".to_string(),
                recipient_name: Some("Sam".to_string()),
            },
        )
        .await;
        match rx.recv().await.unwrap() {
            ServerMessage::LinkReady(links) => links.code,
            other => panic!("expected link_ready, got {:?}", other),
        }
    }

    /// Waits for the background reply write to land.
    async fn stored_reply(&self, code: &str) -> Option<Reply> {
        let code = Code::parse(code).unwrap();
        for _ in 0..50 {
            let record = self.store.find_by_code(&code).await.unwrap().unwrap();
            if record.reply.is_some() {
                return record.reply;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        None
    }
}

fn expect_view(msg: Option<ServerMessage>) -> ViewPayload {
    match msg {
        Some(ServerMessage::View(view)) => view,
        other => panic!("expected a view, got {:?}", other),
    }
}

#[tokio::test]
async fn create_mode_produces_share_links() {
    let harness = Harness::new();
    let (session, tx, mut rx) = harness.open(None, None).await;
    let view = expect_view(rx.recv().await);
    assert_eq!(view.mode, "create");
    assert!(!view.show_question);

    harness
        .send(
            &session,
            &tx,
            ClientMessage::CreateValentine {
                sender_name: String::new(),
                recipient_name: None,
            },
        )
        .await;
    assert!(matches!(rx.recv().await, Some(ServerMessage::CreateFailed { .. })));
    let view = expect_view(rx.recv().await);
    assert!(view.create_error.is_some());
    assert!(harness.store.is_empty());

    harness
        .send(
            &session,
            &tx,
            ClientMessage::CreateValentine {
                sender_name: "Alex".to_string(),
                recipient_name: None,
            },
        )
        .await;
    let Some(ServerMessage::LinkReady(links)) = rx.recv().await else {
        panic!("expected link_ready");
    };
    assert!(links.answer_url.ends_with(&format!("?code={}", links.code)));
    let view = expect_view(rx.recv().await);
    assert_eq!(view.links, Some(links));
    assert_eq!(view.create_error, None);
}

#[tokio::test]
async fn unknown_code_gets_the_error_screen() {
    let harness = Harness::new();
    let (_session, _tx, mut rx) = harness.open(Some("abcdef123456"), None).await;
    match rx.recv().await {
        Some(ServerMessage::Error { message, home_url }) => {
            assert_eq!(message, ERROR_MESSAGE);
            assert_eq!(home_url, "http://localhost:5173/");
        }
        other => panic!("expected error, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn five_nos_play_the_video_and_persist_no() {
    let harness = Harness::new();
    let code = harness.create_code().await;
    let (session, tx, mut rx) = harness.open(Some(&code), None).await;
    let view = expect_view(rx.recv().await);
    assert_eq!(view.mode, "answer");
    assert_eq!(view.sender_name.as_deref(), Some("Alex"));
    assert_eq!(view.recipient_name.as_deref(), Some("Sam"));
    assert_eq!(view.no_label, "No");

    let expected = ["Are you sure?", "Really sure?", "Think again", "Last chance"];
    for label in expected {
        harness.send(&session, &tx, ClientMessage::PressNo).await;
        let view = expect_view(rx.recv().await);
        assert_eq!(view.no_label, label);
        assert!(view.show_question);
    }

    harness.send(&session, &tx, ClientMessage::PressNo).await;
    let view = expect_view(rx.recv().await);
    assert!(view.show_video);
    assert!(!view.show_question);
    assert_eq!(harness.stored_reply(&code).await, Some(Reply::No));

    harness.send(&session, &tx, ClientMessage::DismissVideo).await;
    let view = expect_view(rx.recv().await);
    assert!(view.show_question);
    assert_eq!(view.no_attempts, 0);
    assert_eq!(view.no_label, "No");
}

#[tokio::test(start_paused = true)]
async fn yes_celebrates_with_a_full_firework_show() {
    let harness = Harness::new();
    let code = harness.create_code().await;
    let (session, tx, mut rx) = harness.open(Some(&code), None).await;
    expect_view(rx.recv().await);

    harness
        .send(&session, &tx, ClientMessage::PressYes { viewport: None })
        .await;
    let view = expect_view(rx.recv().await);
    assert!(view.show_celebration);
    assert!(!view.show_question);

    let started = tokio::time::Instant::now();
    let mut spawned = 0;
    let mut retired = 0;
    loop {
        match rx.recv().await {
            Some(ServerMessage::FireworkSpawned { firework }) => {
                assert!((40..60).contains(&firework.particles.len()));
                spawned += 1;
            }
            Some(ServerMessage::FireworkRetired { .. }) => retired += 1,
            Some(ServerMessage::ShowEnded) => break,
            other => panic!("unexpected message {:?}", other),
        }
    }
    assert_eq!((spawned, retired), (25, 25));
    // The last firework spawns at 9.6 s and retires 1.5 s later.
    assert_eq!(started.elapsed(), Duration::from_millis(11_100));
    assert_eq!(harness.stored_reply(&code).await, Some(Reply::Yes));

    let results_code = code.clone();
    let (_session, _tx, mut rx) = harness.open(None, Some(&results_code)).await;
    let view = expect_view(rx.recv().await);
    assert_eq!(view.mode, "results");
    let results = view.results.unwrap();
    assert_eq!(results.headline, "They said YES!");
    assert_eq!(results.reply, Some("yes"));
    assert!(results.replied_on.is_some());
}

#[tokio::test(start_paused = true)]
async fn answered_valentine_is_locked() {
    let harness = Harness::new();
    let code = harness.create_code().await;
    harness
        .store
        .record_reply(&Code::parse(&code).unwrap(), Reply::No)
        .await
        .unwrap();

    let (session, tx, mut rx) = harness.open(Some(&code), None).await;
    let view = expect_view(rx.recv().await);
    assert_eq!(view.mode, "already_answered");
    assert!(!view.show_question);

    harness
        .send(&session, &tx, ClientMessage::PressYes { viewport: None })
        .await;
    let view = expect_view(rx.recv().await);
    assert!(!view.show_celebration);
    assert_eq!(harness.stored_reply(&code).await, Some(Reply::No));
}

#[tokio::test(start_paused = true)]
async fn cancelling_the_session_stops_the_show() {
    let harness = Harness::new();
    let code = harness.create_code().await;
    let (session, tx, mut rx) = harness.open(Some(&code), None).await;
    expect_view(rx.recv().await);

    harness
        .send(&session, &tx, ClientMessage::PressYes { viewport: None })
        .await;
    expect_view(rx.recv().await);

    tokio::time::sleep(Duration::from_millis(1000)).await;
    let mut spawned = 0;
    while let Ok(msg) = rx.try_recv() {
        if matches!(msg, ServerMessage::FireworkSpawned { .. }) {
            spawned += 1;
        }
    }
    // Spawns at 0, 400 and 800 ms.
    assert_eq!(spawned, 3);

    session.lock().await.cancellation_token.cancel();
    tokio::time::sleep(Duration::from_secs(12)).await;
    while let Ok(msg) = rx.try_recv() {
        assert!(
            !matches!(
                msg,
                ServerMessage::FireworkSpawned { .. } | ServerMessage::ShowEnded
            ),
            "unexpected message after cancel: {:?}",
            msg
        );
    }

    // Only the retirements of the three on-screen fireworks are left.
    let session = session.lock().await;
    assert_eq!(session.view.fireworks().len(), 3);
    assert_eq!(
        session.view.next_firework_due(),
        Some(Duration::from_millis(1500))
    );
}

#[tokio::test(start_paused = true)]
async fn slow_create_does_not_stall_the_preview_show() {
    let harness = Harness::with_insert_delay(Duration::from_secs(2));
    let (session, tx, mut rx) = harness.open(None, None).await;
    expect_view(rx.recv().await);

    harness.send(&session, &tx, ClientMessage::StartPreview).await;
    assert!(expect_view(rx.recv().await).show_question);
    harness
        .send(&session, &tx, ClientMessage::PressYes { viewport: None })
        .await;
    assert!(expect_view(rx.recv().await).show_celebration);
    let started = Instant::now();

    let create = {
        let app_state = harness.app_state.clone();
        let session = session.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let msg = ClientMessage::CreateValentine {
                sender_name: "Alex".to_string(),
                recipient_name: None,
            };
            handle_client_message(msg, &app_state, &session, &tx).await;
        })
    };

    let mut spawned = 0;
    let mut link_ready_at = None;
    loop {
        match rx.recv().await {
            Some(ServerMessage::FireworkSpawned { firework }) => {
                assert_eq!(
                    started.elapsed(),
                    Duration::from_millis(400 * firework.id),
                    "firework {} arrived late",
                    firework.id
                );
                spawned += 1;
            }
            Some(ServerMessage::LinkReady(_)) => link_ready_at = Some(started.elapsed()),
            Some(ServerMessage::ShowEnded) => break,
            Some(_) => {}
            None => panic!("outbound channel closed"),
        }
    }
    create.await.unwrap();

    assert_eq!(spawned, 25);
    assert_eq!(link_ready_at, Some(Duration::from_secs(2)));
    assert_eq!(harness.store.len(), 1);
}
