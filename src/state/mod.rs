mod room;
mod score;
mod submit;
mod transitions;
mod vote;

pub use score::{
    apply_heat_scores, award_uncontested_heat, heat_winners, record_matchup_result,
    HEAT_WIN_BONUS,
};
pub use submit::{all_required_done, assigned_heats, next_open_slot, submitted_count};
pub use transitions::{eligible_for_heat, find_next_votable_heat};
pub use vote::eligible_voters;

use crate::plan::PlanError;
use crate::store::{room_key, KvStore, StoreError};
use crate::sync::Clock;
use crate::types::{ClientId, DocError, RoomCode, SessionDoc, ROOM_TTL_SECS};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;

/// Result type for game operations
pub type GameResult<T> = Result<T, GameError>;

#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("Room not found")]
    RoomNotFound,

    #[error("Game already in progress")]
    GameInProgress,

    #[error("Room is full")]
    RoomFull,

    #[error("not joined to a room")]
    NotInRoom,

    #[error("only the host can {0}")]
    NotHost(&'static str),

    #[error("Need at least 2 players")]
    NotEnoughPlayers,

    #[error("cannot {action} while the game is in {phase:?}")]
    WrongPhase {
        action: &'static str,
        phase: crate::types::GamePhase,
    },

    #[error("contestants cannot vote in their own matchup")]
    ContestantCannotVote,

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("invalid session document: {0}")]
    Doc(#[from] DocError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("session document could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

/// One player's connection to the shared game: an explicit client identity
/// issued at construction, the store handle, and the client-local guard
/// against double-firing a transition this client is already mid-flight
/// on. All shared state lives in the store; this struct holds nothing
/// another client could need.
pub struct GameClient {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    identity: ClientId,
    room: RwLock<Option<RoomCode>>,
    rng: Mutex<StdRng>,
    transitioning: AtomicBool,
}

/// Releases the client-local transition guard on drop.
pub struct TransitionGuard<'a>(&'a AtomicBool);

impl Drop for TransitionGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl GameClient {
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            identity: ulid::Ulid::new().to_string(),
            room: RwLock::new(None),
            rng: Mutex::new(StdRng::from_os_rng()),
            transitioning: AtomicBool::new(false),
        }
    }

    /// Deterministic variant for tests: fixed identity and seeded shuffles.
    pub fn with_identity_and_seed(
        store: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
        identity: impl Into<ClientId>,
        seed: u64,
    ) -> Self {
        Self {
            store,
            clock,
            identity: identity.into(),
            room: RwLock::new(None),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            transitioning: AtomicBool::new(false),
        }
    }

    pub fn identity(&self) -> &ClientId {
        &self.identity
    }

    pub fn store(&self) -> Arc<dyn KvStore> {
        self.store.clone()
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    pub async fn room_code(&self) -> GameResult<RoomCode> {
        self.room.read().await.clone().ok_or(GameError::NotInRoom)
    }

    pub(crate) async fn set_room(&self, code: Option<RoomCode>) {
        *self.room.write().await = code;
    }

    pub fn is_host(&self, doc: &SessionDoc) -> bool {
        doc.host == self.identity
    }

    /// Run a closure against the client's random source. Kept synchronous
    /// so shuffles never hold the rng across an await point.
    pub(crate) fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut rng)
    }

    /// Fetch and validate the latest session document. Never trusts
    /// locally cached state for writes.
    pub async fn fetch_room(&self) -> GameResult<SessionDoc> {
        let code = self.room_code().await?;
        self.fetch_room_by_code(&code).await
    }

    pub(crate) async fn fetch_room_by_code(&self, code: &str) -> GameResult<SessionDoc> {
        let raw = self
            .store
            .get(&room_key(code))
            .await?
            .ok_or(GameError::RoomNotFound)?;
        let doc: SessionDoc = serde_json::from_str(&raw)?;
        doc.validate()?;
        Ok(doc)
    }

    /// Replace the whole document. The store has no partial updates.
    pub async fn write_room(&self, doc: &SessionDoc) -> GameResult<()> {
        doc.validate()?;
        let raw = serde_json::to_string(doc)?;
        self.store
            .set(
                &room_key(&doc.code),
                &raw,
                Duration::from_secs(ROOM_TTL_SECS),
            )
            .await?;
        Ok(())
    }

    /// The read-modify-write cycle every state-changing operation goes
    /// through: refetch, apply a pure transformation, write the full
    /// replacement back. The closure may return `None` to decline the
    /// write (a guarded no-op), which is how transitions stay idempotent
    /// when another client got there first.
    pub async fn update_room<F>(&self, transform: F) -> GameResult<Option<SessionDoc>>
    where
        F: FnOnce(SessionDoc) -> GameResult<Option<SessionDoc>>,
    {
        let doc = self.fetch_room().await?;
        match transform(doc)? {
            Some(updated) => {
                self.write_room(&updated).await?;
                Ok(Some(updated))
            }
            None => Ok(None),
        }
    }

    /// Claim the client-local transition guard. `None` means this client
    /// is already mid-flight on a transition and the caller should back
    /// off; another client's concurrent transition is not detectable here.
    pub fn begin_transition(&self) -> Option<TransitionGuard<'_>> {
        self.transitioning
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| TransitionGuard(&self.transitioning))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::sync::ManualClock;

    fn client() -> GameClient {
        let clock = Arc::new(ManualClock::default());
        let store = Arc::new(MemoryStore::new(clock.clone()));
        GameClient::with_identity_and_seed(store, clock, "me", 1)
    }

    #[tokio::test]
    async fn fetch_without_room_errors() {
        let client = client();
        assert!(matches!(
            client.fetch_room().await,
            Err(GameError::NotInRoom)
        ));
    }

    #[tokio::test]
    async fn transition_guard_is_exclusive() {
        let client = client();
        let guard = client.begin_transition();
        assert!(guard.is_some());
        assert!(client.begin_transition().is_none());
        drop(guard);
        assert!(client.begin_transition().is_some());
    }

    #[tokio::test]
    async fn update_room_declining_writes_nothing() {
        let client = client();
        let doc = client.create_room("Ann".to_string()).await.unwrap();

        let result = client.update_room(|_| Ok(None)).await.unwrap();
        assert!(result.is_none());

        let unchanged = client.fetch_room().await.unwrap();
        assert_eq!(unchanged, doc);
    }
}
