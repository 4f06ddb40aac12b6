//! Integration tests for the connection manager over the in-memory
//! transport.
//!
//! Every test runs with paused time: the runtime jumps the clock forward
//! whenever all tasks are idle, so backoff delays resolve instantly and
//! `sleep` doubles as "let the background driver settle".

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tether_protocol::{ClientEvent, Codec, DisconnectReason, JsonCodec, UserId};
use tether_realtime::{
    ConnectionEvent, ConnectionManager, ConnectionObserver, Initialized,
    LinkStatus, RealtimeConfig, RealtimeError,
};
use tether_transport::{Link, MemoryConnector, MemoryPeer, MemoryServer};

// =========================================================================
// Helpers
// =========================================================================

/// Records every lifecycle event it sees.
#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<ConnectionEvent>>>);

impl ConnectionObserver for Recorder {
    fn on_event(&self, event: &ConnectionEvent) {
        self.0.lock().unwrap().push(event.clone());
    }
}

impl Recorder {
    fn events(&self) -> Vec<ConnectionEvent> {
        self.0.lock().unwrap().clone()
    }

    fn count(&self, name: &str) -> usize {
        self.events().iter().filter(|e| e.name() == name).count()
    }
}

/// Default reconnection policy with jitter off, so delays are exact.
fn config() -> RealtimeConfig {
    RealtimeConfig {
        endpoint: "mem://realtime".into(),
        randomization_factor: 0.0,
        ..Default::default()
    }
}

fn setup_with(
    config: RealtimeConfig,
) -> (ConnectionManager<MemoryConnector>, MemoryServer, Recorder) {
    let (connector, server) = MemoryConnector::pair();
    let recorder = Recorder::default();
    let manager = ConnectionManager::builder(connector, config)
        .observer(recorder.clone())
        .build();
    (manager, server, recorder)
}

fn setup() -> (ConnectionManager<MemoryConnector>, MemoryServer, Recorder) {
    setup_with(config())
}

fn user(id: &str) -> UserId {
    UserId::from(id)
}

/// Reads the next client event off the server side of a link.
async fn next_event(peer: &MemoryPeer) -> ClientEvent {
    let bytes = peer
        .recv()
        .await
        .expect("recv should succeed")
        .expect("link should still be open");
    JsonCodec.decode(&bytes).expect("client should send valid events")
}

/// Asserts the client sends nothing more on this link.
async fn assert_silent(peer: &MemoryPeer) {
    let result = tokio::time::timeout(Duration::from_millis(100), peer.recv()).await;
    assert!(result.is_err(), "expected no frame, got {result:?}");
}

/// Asserts the setup pair for `id` arrives, in order.
async fn assert_setup(peer: &MemoryPeer, id: &str) {
    assert_eq!(next_event(peer).await, ClientEvent::Authenticate(user(id)));
    assert_eq!(next_event(peer).await, ClientEvent::JoinUserRoom(user(id)));
}

async fn settle(duration: Duration) {
    tokio::time::sleep(duration).await;
}

// =========================================================================
// Initialization
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_initialize_for_user_sends_setup_exactly_once() {
    let (manager, mut server, _) = setup();

    let first = manager.initialize_for_user(&user("u1")).await.unwrap();
    let second = manager.initialize_for_user(&user("u1")).await.unwrap();
    let third = manager.initialize_for_user(&user("u1")).await.unwrap();

    assert_eq!(first, Initialized::Fresh);
    assert_eq!(second, Initialized::AlreadyActive);
    assert_eq!(third, Initialized::AlreadyActive);

    let peer = server.accept().await.unwrap();
    assert_setup(&peer, "u1").await;
    assert_silent(&peer).await;
    assert_eq!(server.connect_attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_initialize_opens_one_link() {
    let (manager, mut server, _) = setup();
    let u1 = user("u1");

    let (a, b) = tokio::join!(
        manager.initialize_for_user(&u1),
        manager.initialize_for_user(&u1),
    );

    let mut outcomes = [a.unwrap(), b.unwrap()];
    outcomes.sort_by_key(|o| *o == Initialized::AlreadyActive);
    assert_eq!(outcomes, [Initialized::Fresh, Initialized::AlreadyActive]);

    let peer = server.accept().await.unwrap();
    assert_setup(&peer, "u1").await;
    assert_silent(&peer).await;
    assert!(server.try_accept().is_none(), "no second link");
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_ensure_connected_shares_one_link() {
    let (manager, server, recorder) = setup();

    let (a, b, c) = tokio::join!(
        manager.ensure_connected(),
        manager.ensure_connected(),
        manager.ensure_connected(),
    );
    a.unwrap();
    b.unwrap();
    c.unwrap();

    assert_eq!(server.connect_attempts(), 1);
    assert_eq!(recorder.count("connect"), 1);
    assert_eq!(manager.status(), LinkStatus::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_initialize_for_other_user_is_user_mismatch() {
    let (manager, _server, _) = setup();
    manager.initialize_for_user(&user("u1")).await.unwrap();

    let result = manager.initialize_for_user(&user("u2")).await;

    match result {
        Err(RealtimeError::UserMismatch { active, requested }) => {
            assert_eq!(active, user("u1"));
            assert_eq!(requested, user("u2"));
        }
        other => panic!("expected UserMismatch, got {other:?}"),
    }
    assert_eq!(manager.initialized_for_user().await, Some(user("u1")));
}

#[tokio::test(start_paused = true)]
async fn test_connect_refused_reports_connect_error() {
    let (manager, server, recorder) = setup();
    server.set_accepting(false);

    let result = manager.initialize_for_user(&user("u1")).await;

    assert!(matches!(result, Err(RealtimeError::Transport(_))));
    assert_eq!(manager.status(), LinkStatus::Disconnected);
    assert_eq!(manager.initialized_for_user().await, None);
    assert_eq!(recorder.count("connect_error"), 1);
}

// =========================================================================
// Teardown
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_teardown_closes_link_and_forgets_user() {
    let (manager, mut server, recorder) = setup();
    manager.initialize_for_user(&user("u1")).await.unwrap();
    let peer = server.accept().await.unwrap();
    assert_setup(&peer, "u1").await;

    manager.teardown().await;

    assert_eq!(peer.recv().await.unwrap(), None, "server should see a close");
    let handle = manager.handle().await;
    assert!(!handle.connected);
    assert_eq!(handle.initialized_for_user, None);
    assert_eq!(manager.status(), LinkStatus::Disconnected);
    assert!(recorder.events().contains(&ConnectionEvent::Disconnect {
        reason: DisconnectReason::ClientDisconnect
    }));
}

#[tokio::test(start_paused = true)]
async fn test_teardown_twice_is_noop() {
    let (manager, _server, recorder) = setup();
    manager.initialize_for_user(&user("u1")).await.unwrap();

    manager.teardown().await;
    manager.teardown().await;

    assert_eq!(recorder.count("disconnect"), 1);
    assert_eq!(manager.initialized_for_user().await, None);
}

#[tokio::test(start_paused = true)]
async fn test_teardown_without_link_is_noop() {
    let (manager, server, recorder) = setup();

    manager.teardown().await;

    assert_eq!(server.connect_attempts(), 0);
    assert!(recorder.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_initialize_after_teardown_binds_new_user() {
    let (manager, mut server, _) = setup();
    manager.initialize_for_user(&user("u1")).await.unwrap();
    manager.teardown().await;

    let outcome = manager.initialize_for_user(&user("u2")).await.unwrap();

    assert_eq!(outcome, Initialized::Fresh);
    let _old = server.accept().await.unwrap();
    let peer = server.accept().await.unwrap();
    assert_setup(&peer, "u2").await;
}

#[tokio::test(start_paused = true)]
async fn test_teardown_stops_reconnection_in_progress() {
    let (manager, mut server, _) = setup();
    manager.initialize_for_user(&user("u1")).await.unwrap();
    let peer = server.accept().await.unwrap();
    server.set_accepting(false);

    drop(peer);
    settle(Duration::from_millis(1_500)).await;
    assert_eq!(server.connect_attempts(), 2, "one retry after 1s");

    manager.teardown().await;
    settle(Duration::from_secs(60)).await;

    assert_eq!(server.connect_attempts(), 2);
    assert_eq!(manager.status(), LinkStatus::Disconnected);
}

// =========================================================================
// Server-initiated close
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_server_close_reconnects_once_and_rebinds() {
    let (manager, mut server, recorder) = setup();
    manager.initialize_for_user(&user("u1")).await.unwrap();
    let peer = server.accept().await.unwrap();
    assert_setup(&peer, "u1").await;

    peer.close().await.unwrap();

    let restored = server.accept().await.unwrap();
    assert_setup(&restored, "u1").await;
    settle(Duration::from_millis(10)).await;

    assert_eq!(manager.status(), LinkStatus::Connected);
    assert_eq!(server.connect_attempts(), 2);
    assert!(recorder.events().contains(&ConnectionEvent::Disconnect {
        reason: DisconnectReason::ServerDisconnect
    }));
    assert_eq!(recorder.count("reconnect_attempt"), 0, "no backoff policy");
}

#[tokio::test(start_paused = true)]
async fn test_server_close_with_failed_retry_does_not_back_off() {
    let (manager, mut server, recorder) = setup();
    manager.initialize_for_user(&user("u1")).await.unwrap();
    let peer = server.accept().await.unwrap();
    server.set_accepting(false);

    peer.close().await.unwrap();
    settle(Duration::from_secs(60)).await;

    assert_eq!(server.connect_attempts(), 2, "exactly one retry");
    assert_eq!(manager.status(), LinkStatus::Disconnected);
    assert_eq!(recorder.count("connect_error"), 1);
    assert_eq!(recorder.count("reconnect_failed"), 0);
}

// =========================================================================
// Transport drops and backoff
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_transport_drop_reconnects_and_reauthenticates() {
    let (manager, mut server, recorder) = setup();
    manager.initialize_for_user(&user("u1")).await.unwrap();
    let peer = server.accept().await.unwrap();

    drop(peer);

    let restored = server.accept().await.unwrap();
    assert_setup(&restored, "u1").await;
    settle(Duration::from_millis(10)).await;

    assert_eq!(manager.status(), LinkStatus::Connected);
    assert!(
        recorder
            .events()
            .contains(&ConnectionEvent::Reconnect { attempts: 1 })
    );
    assert_eq!(
        manager.initialize_for_user(&user("u1")).await.unwrap(),
        Initialized::AlreadyActive
    );
}

#[tokio::test(start_paused = true)]
async fn test_reauthenticate_disabled_leaves_restored_link_unbound() {
    let (manager, mut server, _) = setup_with(RealtimeConfig {
        reauthenticate_on_reconnect: false,
        ..config()
    });
    manager.initialize_for_user(&user("u1")).await.unwrap();
    drop(server.accept().await.unwrap());

    let restored = server.accept().await.unwrap();

    assert_silent(&restored).await;
    assert_eq!(manager.status(), LinkStatus::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_delays_follow_policy() {
    let (manager, mut server, _) = setup();
    manager.initialize_for_user(&user("u1")).await.unwrap();
    let peer = server.accept().await.unwrap();
    server.set_accepting(false);

    drop(peer);

    // Attempts land at 1s, 3s, 7s, 12s, 17s after the drop.
    settle(Duration::from_millis(500)).await;
    assert_eq!(server.connect_attempts(), 1);
    assert_eq!(manager.status(), LinkStatus::Reconnecting { attempt: 1 });

    settle(Duration::from_millis(1_000)).await;
    assert_eq!(server.connect_attempts(), 2);

    settle(Duration::from_millis(2_000)).await;
    assert_eq!(server.connect_attempts(), 3);

    settle(Duration::from_millis(4_000)).await;
    assert_eq!(server.connect_attempts(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_gives_up_after_attempt_budget() {
    let (manager, mut server, recorder) = setup();
    manager.initialize_for_user(&user("u1")).await.unwrap();
    let peer = server.accept().await.unwrap();
    server.set_accepting(false);

    drop(peer);
    settle(Duration::from_secs(60)).await;

    assert_eq!(server.connect_attempts(), 1 + 5);
    assert_eq!(recorder.count("reconnect_attempt"), 5);
    assert_eq!(recorder.count("reconnect_failed"), 1);
    assert_eq!(manager.status(), LinkStatus::Failed);

    settle(Duration::from_secs(600)).await;
    assert_eq!(server.connect_attempts(), 6, "nothing after giving up");
}

#[tokio::test(start_paused = true)]
async fn test_reconnection_disabled_never_retries() {
    let (manager, mut server, _) = setup_with(RealtimeConfig {
        reconnection: false,
        ..config()
    });
    manager.initialize_for_user(&user("u1")).await.unwrap();

    drop(server.accept().await.unwrap());
    settle(Duration::from_secs(60)).await;

    assert_eq!(server.connect_attempts(), 1);
    assert_eq!(manager.status(), LinkStatus::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_explicit_connect_recovers_after_giving_up() {
    let (manager, mut server, _) = setup();
    manager.initialize_for_user(&user("u1")).await.unwrap();
    let peer = server.accept().await.unwrap();
    server.set_accepting(false);
    drop(peer);
    settle(Duration::from_secs(60)).await;
    assert_eq!(manager.status(), LinkStatus::Failed);

    server.set_accepting(true);
    let outcome = manager.initialize_for_user(&user("u1")).await.unwrap();

    assert_eq!(outcome, Initialized::Restored);
    assert_eq!(manager.status(), LinkStatus::Connected);
    let restored = server.accept().await.unwrap();
    assert_setup(&restored, "u1").await;
    assert_silent(&restored).await;
}

#[tokio::test(start_paused = true)]
async fn test_explicit_connect_during_backoff_supersedes_it() {
    let (manager, mut server, recorder) = setup();
    manager.initialize_for_user(&user("u1")).await.unwrap();
    let peer = server.accept().await.unwrap();
    server.set_accepting(false);
    drop(peer);
    settle(Duration::from_millis(1_500)).await;

    server.set_accepting(true);
    manager.ensure_connected().await.unwrap();
    let restored = server.accept().await.unwrap();
    assert_setup(&restored, "u1").await;

    settle(Duration::from_secs(60)).await;
    assert_eq!(server.connect_attempts(), 3, "backoff stopped");
    assert_eq!(recorder.count("reconnect_failed"), 0);
    assert_silent(&restored).await;
}

// =========================================================================
// Events
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_emit_without_link_is_not_connected() {
    let (manager, _server, _) = setup();

    let result = manager
        .emit(&ClientEvent::Authenticate(user("u1")))
        .await;

    assert!(matches!(result, Err(RealtimeError::NotConnected)));
}

#[tokio::test(start_paused = true)]
async fn test_incoming_frames_are_broadcast() {
    let (manager, mut server, _) = setup();
    let mut incoming = manager.incoming();
    manager.ensure_connected().await.unwrap();
    let peer = server.accept().await.unwrap();

    peer.send(b"not json").await.unwrap();
    peer.send(br#"{"event":"notification","data":{"count":3}}"#)
        .await
        .unwrap();

    let frame = incoming.recv().await.unwrap();
    assert_eq!(frame.event, "notification");
    assert_eq!(frame.data["count"], 3);
}

#[tokio::test(start_paused = true)]
async fn test_watch_status_sees_connect() {
    let (manager, _server, _) = setup();
    let mut status = manager.watch_status();
    assert_eq!(*status.borrow(), LinkStatus::Disconnected);

    manager.ensure_connected().await.unwrap();

    status.changed().await.unwrap();
    assert_eq!(*status.borrow_and_update(), LinkStatus::Connected);
}
