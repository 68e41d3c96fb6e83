// In-process roster store.
//
// Serves as the reference implementation of the store contract — in
// particular the uniqueness constraints (one pick per player per event, one
// pick per pick number) that make the store the serialization point between
// racing clients — and as the store used throughout the test suite.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{broadcast, mpsc};

use crate::model::{DraftPick, DraftStatus, Event, NewPick, Player, Team};
use crate::store::{ChangeEvent, RosterStore, StoreError, StoreResult, Subscription};

#[derive(Default)]
struct Inner {
    events: HashMap<String, Event>,
    teams: Vec<Team>,
    players: Vec<Player>,
    picks: Vec<DraftPick>,
    statuses: HashMap<String, DraftStatus>,
}

pub struct MemoryStore {
    inner: Mutex<Inner>,
    feed: broadcast::Sender<ChangeEvent>,
    next_pick_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (feed, _) = broadcast::channel(256);
        MemoryStore {
            inner: Mutex::new(Inner::default()),
            feed,
            next_pick_id: AtomicU64::new(1),
        }
    }

    /// Seed an event with its teams and player pool. Test setup helper.
    pub fn seed(&self, event: Event, teams: Vec<Team>, players: Vec<Player>) {
        let mut inner = self.lock();
        inner.events.insert(event.id.clone(), event);
        inner.teams.extend(teams);
        inner.players.extend(players);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("memory store mutex poisoned")
    }

    fn publish(&self, event: ChangeEvent) {
        // Send fails only when no subscriber exists, which is fine.
        let _ = self.feed.send(event);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RosterStore for MemoryStore {
    async fn get_event(&self, event_id: &str) -> StoreResult<Event> {
        self.lock()
            .events
            .get(event_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("event {event_id}")))
    }

    async fn list_teams(&self, event_id: &str) -> StoreResult<Vec<Team>> {
        let mut teams: Vec<Team> = self
            .lock()
            .teams
            .iter()
            .filter(|t| t.event_id == event_id)
            .cloned()
            .collect();
        teams.sort_by_key(|t| t.draft_order);
        Ok(teams)
    }

    async fn list_players(&self, event_id: &str) -> StoreResult<Vec<Player>> {
        Ok(self
            .lock()
            .players
            .iter()
            .filter(|p| p.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn list_picks(&self, event_id: &str) -> StoreResult<Vec<DraftPick>> {
        let mut picks: Vec<DraftPick> = self
            .lock()
            .picks
            .iter()
            .filter(|p| p.event_id == event_id)
            .cloned()
            .collect();
        picks.sort_by_key(|p| p.pick_number);
        Ok(picks)
    }

    async fn create_pick(&self, new_pick: NewPick) -> StoreResult<DraftPick> {
        let pick = {
            let mut inner = self.lock();

            if !inner.players.iter().any(|p| {
                p.id == new_pick.player_id && p.event_id == new_pick.event_id
            }) {
                return Err(StoreError::Validation(format!(
                    "unknown player {}",
                    new_pick.player_id
                )));
            }
            if !inner
                .teams
                .iter()
                .any(|t| t.id == new_pick.team_id && t.event_id == new_pick.event_id)
            {
                return Err(StoreError::Validation(format!(
                    "unknown team {}",
                    new_pick.team_id
                )));
            }

            // Uniqueness constraints: these are what make the store the
            // arbiter between racing clients.
            if inner.picks.iter().any(|p| {
                p.event_id == new_pick.event_id && p.player_id == new_pick.player_id
            }) {
                return Err(StoreError::Conflict(format!(
                    "player {} is already drafted",
                    new_pick.player_id
                )));
            }
            if inner.picks.iter().any(|p| {
                p.event_id == new_pick.event_id && p.pick_number == new_pick.pick_number
            }) {
                return Err(StoreError::Conflict(format!(
                    "pick number {} is already taken",
                    new_pick.pick_number
                )));
            }

            let id = self.next_pick_id.fetch_add(1, Ordering::Relaxed);
            let pick = DraftPick {
                id: format!("pick_{id}"),
                event_id: new_pick.event_id,
                team_id: new_pick.team_id,
                player_id: new_pick.player_id,
                pick_number: new_pick.pick_number,
                round: new_pick.round,
                notes: new_pick.notes,
                traded: false,
                created_by: new_pick.created_by,
                created_at: Utc::now(),
            };
            inner.picks.push(pick.clone());
            pick
        };

        self.publish(ChangeEvent::PickInserted(pick.clone()));
        Ok(pick)
    }

    async fn delete_all_picks(&self, event_id: &str) -> StoreResult<()> {
        self.lock().picks.retain(|p| p.event_id != event_id);
        Ok(())
    }

    async fn get_status(&self, event_id: &str) -> StoreResult<Option<DraftStatus>> {
        Ok(self.lock().statuses.get(event_id).cloned())
    }

    async fn put_status(
        &self,
        event_id: &str,
        current_pick: u32,
        paused: bool,
    ) -> StoreResult<DraftStatus> {
        let status = DraftStatus {
            event_id: event_id.to_string(),
            current_pick,
            paused,
            updated_at: Utc::now(),
        };
        self.lock()
            .statuses
            .insert(event_id.to_string(), status.clone());
        self.publish(ChangeEvent::StatusUpdated(status.clone()));
        Ok(status)
    }

    async fn subscribe(&self, event_id: &str) -> StoreResult<Subscription> {
        let mut feed_rx = self.feed.subscribe();
        let (tx, rx) = mpsc::channel(256);
        let event_id = event_id.to_string();

        // Pump broadcast events into the per-subscription channel, filtered
        // to the subscribed event.
        let task = tokio::spawn(async move {
            loop {
                match feed_rx.recv().await {
                    Ok(event) => {
                        let matches = match &event {
                            ChangeEvent::PickInserted(p) => p.event_id == event_id,
                            ChangeEvent::StatusUpdated(s) => s.event_id == event_id,
                        };
                        if matches && tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // The feed does not replay; the consumer will notice
                        // via a full refetch. Log and keep going.
                        tracing::warn!("change feed lagged, skipped {} events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(Subscription::new(rx, task))
    }
}
