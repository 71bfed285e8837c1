//! The cooperative timer loop each client runs: consume polled document
//! updates, surface them as events, and — on the host only — fire the
//! deadline-driven transitions. Restricting automatic transitions to the
//! host is a convention, not a lock: it keeps N clients from performing
//! the same destructive transition concurrently.

use crate::state::{GameClient, GameResult};
use crate::types::{GamePhase, SessionDoc, RESULTS_SECS};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Local countdown resolution; deadlines themselves are shared absolute
/// timestamps.
pub const TICK_INTERVAL: Duration = Duration::from_millis(400);

/// How long a finished matchup's result stays visible before the host
/// advances to the next one.
pub const MATCHUP_RESULT_MILLIS: i64 = 2_500;

/// What a client's UI needs to react to.
#[derive(Debug, Clone)]
pub enum GameEvent {
    /// The shared document changed (poll or our own write).
    Updated(SessionDoc),
    /// We were removed from the lobby roster; the driver has already
    /// detached from the room.
    Kicked,
}

/// Per-client game loop. One driver per joined room; dropping it (or the
/// poller) ends the loop.
pub struct Driver {
    client: Arc<GameClient>,
    events: mpsc::Sender<GameEvent>,
    doc: Option<SessionDoc>,
    /// When we first saw the current results screen, keyed by heat.
    results_shown_at: Option<(usize, DateTime<Utc>)>,
}

impl Driver {
    pub fn new(client: Arc<GameClient>, events: mpsc::Sender<GameEvent>) -> Self {
        Self {
            client,
            events,
            doc: None,
            results_shown_at: None,
        }
    }

    /// Run until the room watch closes, the event consumer goes away, or
    /// this client is kicked.
    pub async fn run(mut self, mut rx: watch::Receiver<Option<SessionDoc>>) {
        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                changed = rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    let doc = rx.borrow_and_update().clone();
                    if let Some(doc) = doc {
                        if !self.observe(doc).await {
                            return;
                        }
                    }
                }
                _ = ticker.tick() => {
                    if self.events.is_closed() {
                        return;
                    }
                    if let Err(e) = self.check_deadlines().await {
                        // store hiccups resolve on the next poll
                        tracing::debug!("deadline check failed: {e}");
                    }
                }
            }
        }
    }

    /// Fold a fresh document into the loop. Returns false when the loop
    /// should stop (this client was kicked from the lobby).
    pub async fn observe(&mut self, doc: SessionDoc) -> bool {
        if doc.phase == GamePhase::Lobby && doc.player(self.client.identity()).is_none() {
            tracing::info!("kicked from room {}", doc.code);
            self.client.leave().await;
            let _ = self.events.send(GameEvent::Kicked).await;
            return false;
        }

        // the poller echoes our own writes back one interval later
        if self.doc.as_ref() == Some(&doc) {
            return true;
        }

        match doc.phase {
            GamePhase::RoundResults => {
                let heat = doc.voting_round;
                if self.results_shown_at.map(|(h, _)| h) != Some(heat) {
                    self.results_shown_at = Some((heat, self.client.clock().now()));
                }
            }
            _ => self.results_shown_at = None,
        }

        self.doc = Some(doc.clone());
        let _ = self.events.send(GameEvent::Updated(doc)).await;
        true
    }

    /// One pass over the shared deadlines, against the injected clock.
    /// Only the host acts; everyone else just watches their countdowns.
    pub async fn check_deadlines(&mut self) -> GameResult<()> {
        let Some(doc) = self.doc.clone() else {
            return Ok(());
        };
        if !self.client.is_host(&doc) {
            return Ok(());
        }
        let now = self.client.clock().now();

        match doc.phase {
            GamePhase::Submitting => {
                let lapsed = doc.submit_deadline.map(|d| now >= d).unwrap_or(false);
                if lapsed {
                    if let Some(updated) = self.client.start_voting().await? {
                        self.observe(updated).await;
                    }
                }
            }
            GamePhase::Voting => {
                let grace = chrono::Duration::milliseconds(MATCHUP_RESULT_MILLIS);
                let lapsed = doc
                    .vote_deadline
                    .map(|d| now >= d + grace)
                    .unwrap_or(false);
                if lapsed {
                    if let Some(updated) = self.client.advance_matchup().await? {
                        self.observe(updated).await;
                    }
                }
            }
            GamePhase::RoundResults => {
                let display = chrono::Duration::seconds(RESULTS_SECS as i64);
                let lapsed = self
                    .results_shown_at
                    .map(|(_, since)| now - since >= display)
                    .unwrap_or(false);
                if lapsed {
                    if let Some(updated) = self.client.next_voting_round().await? {
                        self.observe(updated).await;
                    }
                }
            }
            GamePhase::Lobby | GamePhase::GameOver => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KvStore, MemoryStore};
    use crate::sync::ManualClock;
    use std::sync::Arc;

    async fn game_of(
        n: usize,
    ) -> (Arc<dyn KvStore>, Arc<ManualClock>, Vec<Arc<GameClient>>) {
        let clock = Arc::new(ManualClock::default());
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new(clock.clone()));
        let mut clients = Vec::new();
        let host = Arc::new(GameClient::with_identity_and_seed(
            store.clone(),
            clock.clone(),
            "p0",
            1,
        ));
        let doc = host.create_room("Player 0".to_string()).await.unwrap();
        clients.push(host);
        for i in 1..n {
            let c = Arc::new(GameClient::with_identity_and_seed(
                store.clone(),
                clock.clone(),
                format!("p{i}"),
                i as u64 + 1,
            ));
            c.join_room(&doc.code, format!("Player {i}")).await.unwrap();
            clients.push(c);
        }
        (store, clock, clients)
    }

    fn driver(client: &Arc<GameClient>) -> (Driver, mpsc::Receiver<GameEvent>) {
        let (tx, rx) = mpsc::channel(64);
        (Driver::new(client.clone(), tx), rx)
    }

    #[tokio::test]
    async fn host_fires_submit_deadline_exactly_once() {
        let (_, clock, clients) = game_of(3).await;
        let doc = clients[0].start_game().await.unwrap();

        let (mut host_driver, mut events) = driver(&clients[0]);
        assert!(host_driver.observe(doc.clone()).await);
        events.recv().await.unwrap();

        // deadline not reached: nothing happens
        host_driver.check_deadlines().await.unwrap();
        assert!(events.try_recv().is_err());

        clock.advance(Duration::from_secs(60 * 3 + 1));
        host_driver.check_deadlines().await.unwrap();

        // nobody submitted: the transition ends the game
        match events.recv().await.unwrap() {
            GameEvent::Updated(updated) => assert_eq!(updated.phase, GamePhase::GameOver),
            other => panic!("unexpected event {other:?}"),
        }

        // the repeat is a guarded no-op
        host_driver.check_deadlines().await.unwrap();
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn non_host_never_drives_transitions() {
        let (_, clock, clients) = game_of(3).await;
        let doc = clients[0].start_game().await.unwrap();

        let (mut guest_driver, mut events) = driver(&clients[1]);
        assert!(guest_driver.observe(doc).await);
        events.recv().await.unwrap();

        clock.advance(Duration::from_secs(60 * 10));
        guest_driver.check_deadlines().await.unwrap();
        assert!(events.try_recv().is_err());

        let unchanged = clients[1].fetch_room().await.unwrap();
        assert_eq!(unchanged.phase, GamePhase::Submitting);
    }

    #[tokio::test]
    async fn results_screen_advances_after_display_interval() {
        let (_, clock, clients) = game_of(2).await;
        clients[0].start_game().await.unwrap();

        // both players answer everything; the 2-player path lands on the
        // first results screen without any voting
        loop {
            let doc = clients[0].fetch_room().await.unwrap();
            if doc.phase != GamePhase::Submitting {
                break;
            }
            for c in &clients {
                let doc = c.fetch_room().await.unwrap();
                if doc.phase == GamePhase::Submitting
                    && crate::state::next_open_slot(&doc, c.identity()).is_some()
                {
                    c.record_submission("http://gif", "http://preview")
                        .await
                        .unwrap();
                }
            }
        }

        let doc = clients[0].fetch_room().await.unwrap();
        assert_eq!(doc.phase, GamePhase::RoundResults);
        let first_heat = doc.voting_round;

        let (mut host_driver, mut events) = driver(&clients[0]);
        assert!(host_driver.observe(doc).await);
        events.recv().await.unwrap();

        host_driver.check_deadlines().await.unwrap();
        assert!(events.try_recv().is_err(), "display interval not over");

        clock.advance(Duration::from_secs(RESULTS_SECS + 1));
        host_driver.check_deadlines().await.unwrap();
        match events.recv().await.unwrap() {
            GameEvent::Updated(updated) => {
                assert!(
                    updated.voting_round > first_heat
                        || updated.phase == GamePhase::GameOver
                );
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn kicked_player_detaches() {
        let (_, _, clients) = game_of(3).await;
        clients[0].kick_player("p1").await.unwrap();

        let doc = clients[0].fetch_room().await.unwrap();
        let (mut kicked_driver, mut events) = driver(&clients[1]);
        assert!(!kicked_driver.observe(doc).await);
        match events.recv().await.unwrap() {
            GameEvent::Kicked => {}
            other => panic!("unexpected event {other:?}"),
        }
        assert!(clients[1].room_code().await.is_err());
    }
}
