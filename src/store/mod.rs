// The roster store seam: the external relational store that persists teams,
// players, picks, and the shared draft status, and publishes a realtime
// change feed. The store is the sole serialization point between clients;
// the coordinator only ever observes it through this interface.

pub mod http;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::model::{DraftPick, DraftStatus, Event, NewPick, Player, Team};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StoreError {
    /// The store rejected a write because it would violate a uniqueness
    /// constraint (player already drafted, pick number already taken).
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The store rejected the request as malformed.
    #[error("validation: {0}")]
    Validation(String),

    /// Transport-level failure. Retryable by the user; no local state was
    /// changed on this side.
    #[error("network: {0}")]
    Network(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// Change feed
// ---------------------------------------------------------------------------

/// An event delivered by the store's realtime feed, already scoped to the
/// subscribed event.
#[derive(Debug, Clone)]
pub enum ChangeEvent {
    /// A pick row was inserted (by this client or any other).
    PickInserted(DraftPick),
    /// The draft status row changed. Authoritative for current pick and
    /// paused state.
    StatusUpdated(DraftStatus),
}

/// A live subscription to an event's change feed.
///
/// Holds the receiving end of the feed plus a guard over the background
/// pump task. Dropping the subscription aborts the task, so switching
/// events (or shutting down) cannot leak the previous feed.
pub struct Subscription {
    pub events: mpsc::Receiver<ChangeEvent>,
    guard: SubscriptionGuard,
}

impl Subscription {
    pub fn new(events: mpsc::Receiver<ChangeEvent>, task: JoinHandle<()>) -> Self {
        Subscription {
            events,
            guard: SubscriptionGuard { task: Some(task) },
        }
    }

    /// Receive the next change event. `None` means the feed is gone
    /// (transport closed or pump task ended); the consumer must refetch
    /// full state before resubscribing, since missed events never replay.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }

    /// Tear the subscription down explicitly. Equivalent to dropping it.
    pub fn unsubscribe(mut self) {
        self.guard.release();
    }
}

struct SubscriptionGuard {
    task: Option<JoinHandle<()>>,
}

impl SubscriptionGuard {
    fn release(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.release();
    }
}

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

/// Abstract interface to the roster store. All persistence, uniqueness
/// enforcement, and fan-out live behind this seam.
#[async_trait]
pub trait RosterStore: Send + Sync {
    async fn get_event(&self, event_id: &str) -> StoreResult<Event>;

    /// Teams for the event, ordered by draft order.
    async fn list_teams(&self, event_id: &str) -> StoreResult<Vec<Team>>;

    async fn list_players(&self, event_id: &str) -> StoreResult<Vec<Player>>;

    /// Picks for the event, ordered by pick number.
    async fn list_picks(&self, event_id: &str) -> StoreResult<Vec<DraftPick>>;

    /// Submit a pick. The store must accept at most one pick per player per
    /// event and at most one pick per pick number; a race loser gets
    /// [`StoreError::Conflict`].
    async fn create_pick(&self, pick: NewPick) -> StoreResult<DraftPick>;

    /// Delete every pick for the event. Destructive; used only by reset.
    async fn delete_all_picks(&self, event_id: &str) -> StoreResult<()>;

    /// The draft status row, or `None` when no row exists yet (the implicit
    /// initial state is pick 1, paused).
    async fn get_status(&self, event_id: &str) -> StoreResult<Option<DraftStatus>>;

    /// Create or overwrite the draft status row.
    async fn put_status(
        &self,
        event_id: &str,
        current_pick: u32,
        paused: bool,
    ) -> StoreResult<DraftStatus>;

    /// Open a change-feed subscription scoped to the event.
    async fn subscribe(&self, event_id: &str) -> StoreResult<Subscription>;
}
