//! Synchronization layer: fixed-interval polling of the session document
//! plus the injectable clock every deadline check runs against.

use crate::store::{room_key, KvStore};
use crate::types::SessionDoc;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// How often every client re-reads the room document during active play.
pub const POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Time source used for deadlines and TTLs. Injected so deadline-driven
/// transitions can be tested without real sleeps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-cranked clock for tests.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            now: Mutex::new(Utc::now()),
        }
    }
}

impl ManualClock {
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::zero());
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Handle to a background polling loop. Receivers observe the latest
/// parsed session document; dropping the handle stops the loop (a client
/// leaving cleans up only its own timers, never shared state).
pub struct RoomWatch {
    rx: watch::Receiver<Option<SessionDoc>>,
    handle: JoinHandle<()>,
}

impl RoomWatch {
    pub fn subscribe(&self) -> watch::Receiver<Option<SessionDoc>> {
        self.rx.clone()
    }
}

impl Drop for RoomWatch {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Poll the room document at a fixed interval, publishing only when the
/// raw bytes differ from the last seen value — most polls are no-ops and
/// should not trigger re-renders. Store errors degrade to "no data" and
/// are retried on the next tick.
pub fn spawn_room_poller(
    store: Arc<dyn KvStore>,
    code: String,
    interval: Duration,
) -> RoomWatch {
    let (tx, rx) = watch::channel(None);
    let key = room_key(&code);

    let handle = tokio::spawn(async move {
        let mut last_raw: Option<String> = None;
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if tx.is_closed() {
                return;
            }

            let raw = match store.get(&key).await {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(e) => {
                    tracing::debug!("poll failed for {key}: {e}");
                    continue;
                }
            };

            if last_raw.as_deref() == Some(raw.as_str()) {
                continue;
            }

            match serde_json::from_str::<SessionDoc>(&raw) {
                Ok(doc) => {
                    if let Err(e) = doc.validate() {
                        tracing::warn!("ignoring invalid room document: {e}");
                        continue;
                    }
                    last_raw = Some(raw);
                    let _ = tx.send(Some(doc));
                }
                Err(e) => {
                    tracing::warn!("ignoring undecodable room document: {e}");
                }
            }
        }
    });

    RoomWatch { rx, handle }
}
