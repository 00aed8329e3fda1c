//! Per-connection session state machine.
//!
//! ```text
//! AwaitingInit ──init{}──────────► Starting ─┐
//!      │       ──init{join}──────► Joining  ─┼──► Closed
//!      │       ──init{watch}─────► Watching ─┘
//!      └──────── bad / no init ──────────────────► Closed
//! ```
//!
//! The handler is transport-agnostic: it reads text frames from any
//! `Stream<Item = String>` that ends when the peer goes away, and writes
//! through a [`Peer`]. All registry and connection-set membership is held
//! in guards ([`SessionLease`](crate::domain::SessionLease),
//! [`Membership`](crate::domain::Membership)) so cleanup runs on every
//! exit path, including the task being dropped at shutdown.

use std::sync::Arc;

use futures_util::{Stream, StreamExt};

use super::messages::{Initiation, parse_init, parse_play};
use crate::domain::{Peer, Role, SessionEvent, SessionRegistry, SessionToken, replay};
use crate::error::GatewayError;
use crate::game::{GameError, Player};

/// Runs one connection from its first message until it closes.
///
/// # Errors
///
/// Returns the error that ended the handler: a protocol violation, an
/// unknown token, or the connection's writer going away. Errors meant for
/// the client have already been sent to it as an `error` event.
pub async fn run_session<S>(
    registry: Arc<SessionRegistry>,
    peer: Peer,
    mut incoming: S,
) -> Result<(), GatewayError>
where
    S: Stream<Item = String> + Unpin,
{
    let Some(first) = incoming.next().await else {
        return Err(GatewayError::Protocol(
            "connection closed before init".to_string(),
        ));
    };

    let initiation = parse_init(&first).inspect_err(|err| report(&peer, err))?;
    match initiation {
        Initiation::Start => start(&registry, peer, incoming).await,
        Initiation::Join(token) => attach(&registry, peer, &token, Role::Player, incoming).await,
        Initiation::Watch(token) => {
            attach(&registry, peer, &token, Role::Spectator, incoming).await
        }
    }
}

/// Creates a session, hands the tokens to the starter, then applies the
/// starter's moves until the connection closes.
async fn start<S>(
    registry: &Arc<SessionRegistry>,
    peer: Peer,
    mut incoming: S,
) -> Result<(), GatewayError>
where
    S: Stream<Item = String> + Unpin,
{
    let lease = registry.create_session(peer.clone());
    let session = lease.session();
    peer.send_event(&SessionEvent::Init {
        join: session.join_token().clone(),
        watch: session.watch_token().clone(),
    })?;

    while let Some(text) = incoming.next().await {
        let result = parse_play(&text).and_then(|column| {
            let column = usize::try_from(column).map_err(|_| GameError::InvalidColumn)?;
            session.play(Player::One, column)
        });
        match result {
            Ok(outcome) => {
                tracing::debug!(
                    session_id = %session.id(),
                    column = outcome.played.column,
                    row = outcome.played.row,
                    delivered = outcome.delivered,
                    "move played"
                );
                if let Some(winner) = outcome.winner {
                    tracing::info!(session_id = %session.id(), %winner, "game won");
                }
            }
            Err(err @ (GatewayError::IllegalMove(_) | GatewayError::Protocol(_))) => {
                tracing::debug!(session_id = %session.id(), %err, "move rejected");
                peer.send_event(&SessionEvent::error(err.client_message()))?;
            }
            Err(err) => return Err(err),
        }
    }

    tracing::debug!(session_id = %session.id(), "starter disconnected");
    Ok(())
}

/// Resolves `token` in the `role` namespace, attaches the peer, replays
/// the moves played so far, then waits for the connection to close.
///
/// Incoming messages are read only to notice the close and are otherwise
/// discarded.
async fn attach<S>(
    registry: &SessionRegistry,
    peer: Peer,
    token: &SessionToken,
    role: Role,
    mut incoming: S,
) -> Result<(), GatewayError>
where
    S: Stream<Item = String> + Unpin,
{
    let (membership, history) = registry
        .attach(token.as_str(), role, peer.clone())
        .inspect_err(|err| report(&peer, err))?;
    tracing::debug!(
        session_id = %membership.session().id(),
        %role,
        replayed = history.len(),
        "connection attached"
    );
    replay(&peer, &history)?;

    while incoming.next().await.is_some() {}

    drop(membership);
    Ok(())
}

/// Sends `err` to the client as an `error` event, ignoring a closed peer.
fn report(peer: &Peer, err: &GatewayError) {
    if peer
        .send_event(&SessionEvent::error(err.client_message()))
        .is_err()
    {
        tracing::debug!(connection_id = %peer.id(), "error event not delivered");
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use futures_util::stream;
    use serde_json::{Value, json};
    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;
    use tokio::time::timeout;

    use super::*;
    use crate::domain::{Outbox, Session};

    const TIMEOUT: Duration = Duration::from_secs(2);

    /// In-memory connection driving a spawned [`run_session`].
    struct TestClient {
        inbox: Option<mpsc::UnboundedSender<String>>,
        outbox: Outbox,
        handle: JoinHandle<Result<(), GatewayError>>,
    }

    impl TestClient {
        fn connect(registry: &Arc<SessionRegistry>) -> Self {
            let (peer, outbox) = Peer::channel();
            let (inbox, mut rx) = mpsc::unbounded_channel::<String>();
            let incoming = stream::poll_fn(move |cx| rx.poll_recv(cx));
            let handle = tokio::spawn(run_session(Arc::clone(registry), peer, incoming));
            Self {
                inbox: Some(inbox),
                outbox,
                handle,
            }
        }

        fn send(&self, value: &Value) {
            if let Some(inbox) = &self.inbox {
                let _ = inbox.send(value.to_string());
            }
        }

        async fn recv(&mut self) -> Value {
            let Ok(Some(frame)) = timeout(TIMEOUT, self.outbox.recv()).await else {
                panic!("no frame received");
            };
            let Ok(value) = serde_json::from_str(&frame) else {
                panic!("frame is not JSON: {frame}");
            };
            value
        }

        /// Asserts the outbound queue ends without further frames.
        async fn expect_end(&mut self) {
            match timeout(TIMEOUT, self.outbox.recv()).await {
                Ok(None) => {}
                Ok(Some(frame)) => panic!("unexpected frame: {frame}"),
                Err(_) => panic!("outbound queue never closed"),
            }
        }

        fn assert_quiet(&mut self) {
            if let Ok(frame) = self.outbox.try_recv() {
                panic!("unexpected frame: {frame}");
            }
        }

        async fn close(&mut self) -> Result<(), GatewayError> {
            self.inbox = None;
            let Ok(result) = timeout(TIMEOUT, &mut self.handle).await else {
                panic!("handler did not finish");
            };
            let Ok(result) = result else {
                panic!("handler panicked");
            };
            result
        }
    }

    /// Starts a game and returns the starter with its session.
    async fn started(registry: &Arc<SessionRegistry>) -> (TestClient, Arc<Session>) {
        let mut starter = TestClient::connect(registry);
        starter.send(&json!({"type": "init"}));
        let init = starter.recv().await;
        assert_eq!(init["type"], "init");
        let Some(join) = init["join"].as_str() else {
            panic!("init without join token");
        };
        let Ok(session) = registry.resolve_join(join) else {
            panic!("issued token does not resolve");
        };
        (starter, session)
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        let waited = timeout(TIMEOUT, async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await;
        if waited.is_err() {
            panic!("condition not reached");
        }
    }

    fn play_event(player: u8, column: usize, row: usize) -> Value {
        json!({"type": "play", "player": player, "column": column, "row": row})
    }

    #[tokio::test]
    async fn start_issues_distinct_join_and_watch_tokens() {
        let registry = Arc::new(SessionRegistry::new());
        let (mut starter, session) = started(&registry).await;

        assert_ne!(session.join_token(), session.watch_token());
        assert!(
            registry
                .resolve_watch(session.watch_token().as_str())
                .is_ok()
        );
        assert_eq!(session.connections(Role::Player).len(), 1);
        starter.assert_quiet();
    }

    #[tokio::test]
    async fn watcher_before_first_move_gets_only_live_play() {
        let registry = Arc::new(SessionRegistry::new());
        let (mut starter, session) = started(&registry).await;

        let mut watcher = TestClient::connect(&registry);
        watcher.send(&json!({"type": "init", "watch": session.watch_token().as_str()}));
        wait_until(|| session.connections(Role::Spectator).len() == 1).await;
        watcher.assert_quiet();

        starter.send(&json!({"type": "play", "column": 3}));
        assert_eq!(watcher.recv().await, play_event(1, 3, 0));
        assert_eq!(starter.recv().await, play_event(1, 3, 0));
        watcher.assert_quiet();
    }

    #[tokio::test]
    async fn watching_unknown_token_yields_single_error() {
        let registry = Arc::new(SessionRegistry::new());
        let mut watcher = TestClient::connect(&registry);
        watcher.send(&json!({"type": "init", "watch": "zzz"}));

        assert_eq!(
            watcher.recv().await,
            json!({"type": "error", "message": "Game not found."})
        );
        assert!(matches!(
            watcher.close().await,
            Err(GatewayError::SessionNotFound)
        ));
        watcher.expect_end().await;
    }

    #[tokio::test]
    async fn joining_unknown_token_registers_nothing() {
        let registry = Arc::new(SessionRegistry::new());
        let (_starter, session) = started(&registry).await;

        let mut joiner = TestClient::connect(&registry);
        joiner.send(&json!({"type": "init", "join": "not-a-token"}));
        assert_eq!(joiner.recv().await["message"], "Game not found.");
        assert!(joiner.close().await.is_err());
        assert_eq!(session.connections(Role::Player).len(), 1);
    }

    #[tokio::test]
    async fn illegal_move_errors_only_to_mover() {
        let registry = Arc::new(SessionRegistry::new());
        let (mut starter, session) = started(&registry).await;

        // Fill column 0 so the starter's next move there is rejected.
        for player in [Player::One, Player::Two].repeat(3) {
            if session.play(player, 0).is_err() {
                panic!("setup move rejected");
            }
        }
        for _ in 0..6 {
            let _ = starter.recv().await;
        }

        let mut watcher = TestClient::connect(&registry);
        watcher.send(&json!({"type": "init", "watch": session.watch_token().as_str()}));
        for _ in 0..6 {
            let _ = watcher.recv().await;
        }

        let before = session.history();
        starter.send(&json!({"type": "play", "column": 0}));
        assert_eq!(
            starter.recv().await,
            json!({"type": "error", "message": "This slot is full."})
        );

        // A legal move afterwards proves the loop survived and orders the
        // watcher's queue: nothing from the rejected move precedes it.
        starter.send(&json!({"type": "play", "column": 1}));
        assert_eq!(starter.recv().await, play_event(1, 1, 0));
        assert_eq!(watcher.recv().await, play_event(1, 1, 0));

        assert_eq!(session.history().len(), before.len() + 1);
        assert_eq!(session.winner(), None);
    }

    #[tokio::test]
    async fn out_of_turn_and_off_board_moves_are_reported() {
        let registry = Arc::new(SessionRegistry::new());
        let (mut starter, session) = started(&registry).await;

        starter.send(&json!({"type": "play", "column": -1}));
        assert_eq!(starter.recv().await["message"], "Invalid column.");
        starter.send(&json!({"type": "play", "column": 7}));
        assert_eq!(starter.recv().await["message"], "Invalid column.");

        starter.send(&json!({"type": "play", "column": 2}));
        assert_eq!(starter.recv().await, play_event(1, 2, 0));
        starter.send(&json!({"type": "play", "column": 2}));
        assert_eq!(starter.recv().await["message"], "It isn't your turn.");

        assert_eq!(session.history().len(), 1);
    }

    #[tokio::test]
    async fn malformed_play_is_reported_and_loop_continues() {
        let registry = Arc::new(SessionRegistry::new());
        let (mut starter, _session) = started(&registry).await;

        starter.send(&json!({"type": "play"}));
        assert_eq!(starter.recv().await["type"], "error");

        starter.send(&json!({"type": "play", "column": 4}));
        assert_eq!(starter.recv().await, play_event(1, 4, 0));
    }

    #[tokio::test]
    async fn starter_disconnect_retires_tokens() {
        let registry = Arc::new(SessionRegistry::new());
        let (mut starter, session) = started(&registry).await;
        let join = session.join_token().clone();
        let watch = session.watch_token().clone();

        assert!(starter.close().await.is_ok());
        starter.expect_end().await;
        assert!(registry.resolve_join(join.as_str()).is_err());
        assert!(registry.resolve_watch(watch.as_str()).is_err());

        let mut late = TestClient::connect(&registry);
        late.send(&json!({"type": "init", "join": join.as_str()}));
        assert_eq!(late.recv().await["message"], "Game not found.");
    }

    #[tokio::test]
    async fn aborted_starter_task_still_retires_tokens() {
        let registry = Arc::new(SessionRegistry::new());
        let (starter, session) = started(&registry).await;
        let join = session.join_token().clone();

        starter.handle.abort();
        let _ = starter.handle.await;
        assert!(registry.resolve_join(join.as_str()).is_err());
        assert!(session.connections(Role::Player).is_empty());
    }

    #[tokio::test]
    async fn joiner_receives_broadcasts_and_is_removed_on_close() {
        let registry = Arc::new(SessionRegistry::new());
        let (mut starter, session) = started(&registry).await;

        let mut joiner = TestClient::connect(&registry);
        joiner.send(&json!({"type": "init", "join": session.join_token().as_str()}));
        wait_until(|| session.connections(Role::Player).len() == 2).await;

        // Whatever a joined player sends is ignored.
        joiner.send(&json!({"type": "play", "column": 5}));
        joiner.send(&json!({"type": "chat", "text": "hi"}));

        starter.send(&json!({"type": "play", "column": 6}));
        assert_eq!(joiner.recv().await, play_event(1, 6, 0));
        assert_eq!(starter.recv().await, play_event(1, 6, 0));
        assert_eq!(session.history().len(), 1);

        assert!(joiner.close().await.is_ok());
        assert_eq!(session.connections(Role::Player).len(), 1);
        joiner.expect_end().await;
    }

    #[tokio::test]
    async fn late_watcher_gets_history_in_order_then_live_moves() {
        let registry = Arc::new(SessionRegistry::new());
        let (mut starter, session) = started(&registry).await;

        let setup = [
            (Player::One, 3),
            (Player::Two, 3),
            (Player::One, 4),
            (Player::Two, 0),
        ];
        for (player, column) in setup {
            if session.play(player, column).is_err() {
                panic!("setup move rejected");
            }
        }
        for _ in 0..setup.len() {
            let _ = starter.recv().await;
        }

        let mut watcher = TestClient::connect(&registry);
        watcher.send(&json!({"type": "init", "watch": session.watch_token().as_str()}));
        assert_eq!(watcher.recv().await, play_event(1, 3, 0));
        assert_eq!(watcher.recv().await, play_event(2, 3, 1));
        assert_eq!(watcher.recv().await, play_event(1, 4, 0));
        assert_eq!(watcher.recv().await, play_event(2, 0, 0));
        watcher.assert_quiet();

        starter.send(&json!({"type": "play", "column": 5}));
        assert_eq!(watcher.recv().await, play_event(1, 5, 0));

        assert!(watcher.close().await.is_ok());
        assert!(session.connections(Role::Spectator).is_empty());
    }

    #[tokio::test]
    async fn late_joiner_gets_history_in_order_then_live_moves() {
        let registry = Arc::new(SessionRegistry::new());
        let (mut starter, session) = started(&registry).await;

        starter.send(&json!({"type": "play", "column": 2}));
        assert_eq!(starter.recv().await, play_event(1, 2, 0));
        if session.play(Player::Two, 2).is_err() {
            panic!("setup move rejected");
        }
        assert_eq!(starter.recv().await, play_event(2, 2, 1));

        let mut joiner = TestClient::connect(&registry);
        joiner.send(&json!({"type": "init", "join": session.join_token().as_str()}));
        assert_eq!(joiner.recv().await, play_event(1, 2, 0));
        assert_eq!(joiner.recv().await, play_event(2, 2, 1));
        joiner.assert_quiet();
        assert_eq!(session.connections(Role::Player).len(), 2);
        assert!(session.connections(Role::Spectator).is_empty());

        starter.send(&json!({"type": "play", "column": 6}));
        assert_eq!(joiner.recv().await, play_event(1, 6, 0));
        assert_eq!(starter.recv().await, play_event(1, 6, 0));

        assert!(joiner.close().await.is_ok());
        assert_eq!(session.connections(Role::Player).len(), 1);
    }

    #[tokio::test]
    async fn win_is_broadcast_after_the_deciding_move() {
        let registry = Arc::new(SessionRegistry::new());
        let (mut starter, session) = started(&registry).await;
        let mut watcher = TestClient::connect(&registry);
        watcher.send(&json!({"type": "init", "watch": session.watch_token().as_str()}));
        wait_until(|| session.connections(Role::Spectator).len() == 1).await;

        for _ in 0..3 {
            let _ = session.play(Player::One, 0);
            let _ = session.play(Player::Two, 1);
        }
        starter.send(&json!({"type": "play", "column": 0}));

        let mut events = Vec::new();
        for _ in 0..8 {
            events.push(watcher.recv().await);
        }
        assert_eq!(events.get(6), Some(&play_event(1, 0, 3)));
        assert_eq!(events.get(7), Some(&json!({"type": "win", "player": 1})));

        for _ in 0..8 {
            let _ = starter.recv().await;
        }
        starter.send(&json!({"type": "play", "column": 0}));
        assert_eq!(
            starter.recv().await,
            json!({"type": "error", "message": "Game is over."})
        );
    }

    #[tokio::test]
    async fn malformed_init_closes_connection() {
        let registry = Arc::new(SessionRegistry::new());
        let mut client = TestClient::connect(&registry);
        client.send(&json!({"type": "play", "column": 1}));

        assert_eq!(client.recv().await["type"], "error");
        assert!(matches!(client.close().await, Err(GatewayError::Protocol(_))));
        client.expect_end().await;
        assert_eq!(registry.session_count(), 0);
    }

    #[tokio::test]
    async fn handler_idles_until_init_and_cleans_up_on_close() {
        let registry = Arc::new(SessionRegistry::new());
        let (peer, _outbox) = Peer::channel();
        let (inbox, mut rx) = mpsc::unbounded_channel::<String>();
        let incoming = stream::poll_fn(move |cx| rx.poll_recv(cx));
        let mut task = tokio_test::task::spawn(run_session(Arc::clone(&registry), peer, incoming));

        tokio_test::assert_pending!(task.poll());
        assert_eq!(registry.session_count(), 0);

        let _ = inbox.send(json!({"type": "init"}).to_string());
        assert!(task.is_woken());
        tokio_test::assert_pending!(task.poll());
        assert_eq!(registry.session_count(), 1);

        drop(inbox);
        let result = tokio_test::assert_ready!(task.poll());
        assert!(result.is_ok());
        assert_eq!(registry.session_count(), 0);
    }

    #[tokio::test]
    async fn close_before_init_is_a_protocol_violation() {
        let registry = Arc::new(SessionRegistry::new());
        let mut client = TestClient::connect(&registry);
        assert!(matches!(client.close().await, Err(GatewayError::Protocol(_))));
        client.expect_end().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn moves_during_replay_arrive_exactly_once() {
        const WATCHERS: usize = 8;
        let registry = Arc::new(SessionRegistry::new());
        let (_starter, session) = started(&registry).await;

        // Alternate columns so nobody wins and nothing fills up early.
        let columns: Vec<usize> = (0..7).chain(0..7).chain(0..7).collect();

        let mover = {
            let session = Arc::clone(&session);
            let columns = columns.clone();
            tokio::spawn(async move {
                let mut player = Player::One;
                for column in columns {
                    if session.play(player, column).is_ok() {
                        player = player.other();
                    }
                    tokio::task::yield_now().await;
                }
            })
        };

        let mut watchers = Vec::new();
        for _ in 0..WATCHERS {
            let watcher = TestClient::connect(&registry);
            watcher.send(&json!({"type": "init", "watch": session.watch_token().as_str()}));
            watchers.push(watcher);
            tokio::task::yield_now().await;
        }
        if mover.await.is_err() {
            panic!("mover task failed");
        }

        let history = session.history();
        for watcher in &mut watchers {
            let mut seen = Vec::new();
            for _ in 0..history.len() {
                seen.push(watcher.recv().await);
            }
            watcher.assert_quiet();
            for mv in &history {
                let expected = play_event(mv.player.number(), mv.column, mv.row);
                let count = seen.iter().filter(|e| **e == expected).count();
                assert_eq!(count, 1, "move {mv:?} seen {count} times");
            }
        }
    }
}
