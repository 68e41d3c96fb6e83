// The turn coordinator: the state machine at the center of the board.
//
// Owns the current pick number, the pause flag, and the clock for one
// event; validates and submits picks; and folds authoritative change-feed
// events back into local state. Local turn state is provisional until the
// store confirms it — the store, not this struct, is the final arbiter of
// pick uniqueness, so every mutating operation goes store-first and only
// advances local state once the store has accepted the write.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::draft::clock::{DraftClock, TickOutcome};
use crate::draft::order;
use crate::model::{DraftPick, DraftStatus, Event, NewPick, Player, PlayerId, Team};
use crate::protocol::{BoardSnapshot, PickView, PlayerView, TeamView};
use crate::store::{RosterStore, StoreError};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum DraftError {
    /// Validation failures: rejected before any network call.
    #[error("the draft is complete; no picks remain")]
    DraftComplete,

    #[error("the draft is paused")]
    DraftPaused,

    #[error("player {0} is not in this event's pool")]
    UnknownPlayer(PlayerId),

    #[error("player {0} is already drafted")]
    PlayerUnavailable(PlayerId),

    #[error("no team is on the clock; the draft cannot proceed")]
    NoTeamOnClock,

    #[error("reset requires explicit confirmation")]
    ResetNotConfirmed,

    /// The store rejected or failed the operation. Conflict means another
    /// client won a race; network errors are user-retryable.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Proof that the user explicitly confirmed a destructive reset. The only
/// way to reach `reset_draft` is to construct one of these, so no code path
/// can delete picks unconditionally.
pub struct ResetConfirmation(());

impl ResetConfirmation {
    pub fn confirmed_by_user() -> Self {
        ResetConfirmation(())
    }
}

// ---------------------------------------------------------------------------
// TurnCoordinator
// ---------------------------------------------------------------------------

pub struct TurnCoordinator {
    store: Arc<dyn RosterStore>,
    event: Event,
    teams: Vec<Team>,
    players: Vec<Player>,
    picks: Vec<DraftPick>,
    current_pick: u32,
    paused: bool,
    clock: DraftClock,
    /// Identity recorded as the creator of picks submitted here.
    actor: Option<String>,
}

impl TurnCoordinator {
    /// Load the full draft context for an event from the store: event
    /// settings, teams (ordered by draft order), player pool, recorded
    /// picks, and the shared status row (pick 1, paused, when none exists).
    pub async fn load(
        store: Arc<dyn RosterStore>,
        event_id: &str,
        actor: Option<String>,
    ) -> Result<Self, DraftError> {
        let event = store.get_event(event_id).await?;
        let teams = store.list_teams(event_id).await?;
        let players = store.list_players(event_id).await?;
        let picks = store.list_picks(event_id).await?;
        let status = store
            .get_status(event_id)
            .await?
            .unwrap_or_else(|| DraftStatus::initial(event_id));

        info!(
            "Loaded draft {}: {} teams, {} players, {} picks, current pick {}",
            event.name,
            teams.len(),
            players.len(),
            picks.len(),
            status.current_pick
        );

        let clock = DraftClock::new(event.pick_seconds);
        let mut coordinator = TurnCoordinator {
            store,
            event,
            teams,
            players,
            picks,
            current_pick: status.current_pick,
            paused: status.paused,
            clock,
            actor,
        };
        // Routes through set_paused so a draft loaded already complete does
        // not come up with a running clock.
        coordinator.set_paused(status.paused);
        Ok(coordinator)
    }

    // -- Derived state ------------------------------------------------------

    pub fn current_pick(&self) -> u32 {
        self.current_pick
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn picks(&self) -> &[DraftPick] {
        &self.picks
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    /// The team on the clock for the current pick, or `None` when the draft
    /// is complete or no teams exist.
    pub fn current_team(&self) -> Option<&Team> {
        if self.is_complete() {
            return None;
        }
        order::team_on_the_clock(self.current_pick, &self.teams, self.event.draft_type)
    }

    /// Players not referenced by any recorded pick. This id-based filter is
    /// the single definition of availability.
    pub fn available_players(&self) -> Vec<&Player> {
        self.players
            .iter()
            .filter(|p| !self.picks.iter().any(|pick| pick.player_id == p.id))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.current_pick > self.event.total_picks()
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.clock.remaining_seconds()
    }

    // -- Operations ---------------------------------------------------------

    /// Draft `player_id` for the team on the clock.
    ///
    /// Validates locally, submits the pick to the store, and only then
    /// advances the local pick counter and resets the clock. A store
    /// conflict (another client drafted the player first) triggers a full
    /// authoritative refresh and leaves the turn unchanged.
    pub async fn select_player(&mut self, player_id: &str) -> Result<(), DraftError> {
        if self.is_complete() {
            return Err(DraftError::DraftComplete);
        }
        if self.paused {
            return Err(DraftError::DraftPaused);
        }
        if !self.players.iter().any(|p| p.id == player_id) {
            return Err(DraftError::UnknownPlayer(player_id.to_string()));
        }
        if self.picks.iter().any(|p| p.player_id == player_id) {
            return Err(DraftError::PlayerUnavailable(player_id.to_string()));
        }
        let team_id = match self.current_team() {
            Some(team) => team.id.clone(),
            None => return Err(DraftError::NoTeamOnClock),
        };

        let new_pick = NewPick {
            event_id: self.event.id.clone(),
            team_id,
            player_id: player_id.to_string(),
            pick_number: self.current_pick,
            round: order::round_for_pick(self.current_pick, self.event.team_count),
            notes: None,
            created_by: self.actor.clone(),
        };

        let created = match self.store.create_pick(new_pick).await {
            Ok(pick) => pick,
            Err(StoreError::Conflict(reason)) => {
                // A racing client won this pick. Re-establish authoritative
                // state before surfacing the error; do not advance.
                warn!("pick conflict ({reason}), refreshing from store");
                if let Err(e) = self.refresh().await {
                    warn!("refresh after conflict failed: {e}");
                }
                return Err(DraftError::Store(StoreError::Conflict(reason)));
            }
            Err(e) => return Err(DraftError::Store(e)),
        };

        info!(
            "Pick {} recorded: player {} -> team {}",
            created.pick_number, created.player_id, created.team_id
        );

        // The change feed may deliver this pick too; apply_pick_inserted
        // dedupes by id either way.
        self.apply_pick_inserted(created);
        self.current_pick += 1;
        self.reset_clock_for_turn();

        // Mirror the new turn to the shared status row so other clients
        // advance. The pick itself is already durable, so a failed mirror
        // write keeps the local advance; the error is surfaced and the next
        // authoritative status event reconverges everyone.
        if let Err(e) = self
            .store
            .put_status(&self.event.id.clone(), self.current_pick, self.paused)
            .await
        {
            warn!("pick recorded but status mirror failed: {e}");
            return Err(DraftError::Store(e));
        }
        Ok(())
    }

    /// Advance the turn without drafting anyone. The new turn is persisted
    /// first; local state does not move if the store write fails.
    pub async fn skip_pick(&mut self) -> Result<(), DraftError> {
        if self.is_complete() {
            return Err(DraftError::DraftComplete);
        }
        let next = self.current_pick + 1;
        self.store
            .put_status(&self.event.id.clone(), next, self.paused)
            .await?;
        info!("Pick {} skipped", self.current_pick);
        self.current_pick = next;
        self.reset_clock_for_turn();
        Ok(())
    }

    /// Flip the shared pause flag. Persists before applying locally; the
    /// status row is created implicitly on the first toggle.
    pub async fn toggle_pause(&mut self) -> Result<(), DraftError> {
        let next_paused = !self.paused;
        self.store
            .put_status(&self.event.id.clone(), self.current_pick, next_paused)
            .await?;
        self.set_paused(next_paused);
        info!(
            "Draft {}",
            if next_paused { "paused" } else { "resumed" }
        );
        Ok(())
    }

    /// Delete every pick and restart from pick 1, paused. Destructive and
    /// irreversible; requires a [`ResetConfirmation`]. A partial failure
    /// (picks deleted but status not reset, or vice versa) leaves the store
    /// in an inconsistent intermediate, so this forces a full refetch
    /// instead of building on local assumptions.
    pub async fn reset_draft(
        &mut self,
        _confirmation: ResetConfirmation,
    ) -> Result<(), DraftError> {
        let event_id = self.event.id.clone();
        if let Err(e) = self.store.delete_all_picks(&event_id).await {
            warn!("reset failed mid-delete, forcing refresh: {e}");
            if let Err(re) = self.refresh().await {
                warn!("refresh after failed reset also failed: {re}");
            }
            return Err(DraftError::Store(e));
        }
        if let Err(e) = self.store.put_status(&event_id, 1, true).await {
            warn!("picks deleted but status reset failed, forcing refresh: {e}");
            if let Err(re) = self.refresh().await {
                warn!("refresh after failed reset also failed: {re}");
            }
            return Err(DraftError::Store(e));
        }

        self.picks.clear();
        self.current_pick = 1;
        self.set_paused(true);
        self.reset_clock_for_turn();
        info!("Draft reset to pick 1");
        Ok(())
    }

    /// Clock expiry forfeits the pick: same path as an explicit skip. While
    /// paused the clock never expires, so no guard is needed here beyond
    /// the skip's own validation.
    pub async fn handle_expiry(&mut self) -> Result<(), DraftError> {
        info!("Pick {} timed out", self.current_pick);
        self.skip_pick().await
    }

    /// One beat of the event loop's interval.
    pub fn tick(&mut self) -> TickOutcome {
        self.clock.tick()
    }

    // -- Reconciliation -----------------------------------------------------

    /// Fold a pick-insert event from the change feed into local state.
    /// Idempotent: duplicates (including the echo of our own submit) are
    /// dropped by pick id. Never derives the current pick from this — the
    /// inserter's counter is not authoritative for this client.
    pub fn apply_pick_inserted(&mut self, pick: DraftPick) -> bool {
        if self.picks.iter().any(|p| p.id == pick.id) {
            return false;
        }
        self.picks.push(pick);
        self.picks.sort_by_key(|p| p.pick_number);
        true
    }

    /// Fold a status-update event into local state. The status row is
    /// authoritative for the current pick and pause flag, so local values
    /// are overwritten unconditionally and the clock restarts at the full
    /// pick duration (the sender's elapsed time is unknowable).
    ///
    /// Returns true when the authoritative pick number moved behind the
    /// locally recorded picks — a remote reset — in which case the caller
    /// must refetch the pick list.
    pub fn apply_status_update(&mut self, status: DraftStatus) -> bool {
        let needs_refresh = self
            .picks
            .last()
            .map(|p| p.pick_number >= status.current_pick)
            .unwrap_or(false);

        self.current_pick = status.current_pick;
        self.set_paused(status.paused);
        self.reset_clock_for_turn();
        needs_refresh
    }

    /// Refetch picks and status wholesale from the store. Used after
    /// conflicts, partial failures, and feed reconnects, where incremental
    /// events cannot be trusted to be complete.
    pub async fn refresh(&mut self) -> Result<(), DraftError> {
        let event_id = self.event.id.clone();
        let picks = self.store.list_picks(&event_id).await?;
        let status = self
            .store
            .get_status(&event_id)
            .await?
            .unwrap_or_else(|| DraftStatus::initial(&event_id));

        self.picks = picks;
        self.current_pick = status.current_pick;
        self.set_paused(status.paused);
        self.reset_clock_for_turn();
        info!(
            "Refreshed from store: {} picks, current pick {}",
            self.picks.len(),
            self.current_pick
        );
        Ok(())
    }

    fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
        if paused || self.is_complete() {
            self.clock.pause();
        } else {
            self.clock.resume();
        }
    }

    /// Rewind the clock for the next turn. Once the draft is complete there
    /// is no pick left to time, so the clock parks paused rather than
    /// counting down toward a skip that can only fail.
    fn reset_clock_for_turn(&mut self) {
        self.clock.reset(self.event.pick_seconds);
        if self.is_complete() {
            self.clock.pause();
        }
    }

    // -- Views --------------------------------------------------------------

    /// Build the read-only derived view consumers observe.
    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            event_id: self.event.id.clone(),
            event_name: self.event.name.clone(),
            current_pick: self.current_pick,
            round: order::round_for_pick(self.current_pick, self.event.team_count),
            total_picks: self.event.total_picks(),
            on_clock: self.current_team().map(TeamView::from),
            remaining_seconds: self.clock.remaining_seconds(),
            paused: self.paused,
            complete: self.is_complete(),
            picks: self
                .picks
                .iter()
                .map(|p| PickView::resolve(p, &self.teams, &self.players))
                .collect(),
            available_players: self
                .available_players()
                .into_iter()
                .map(PlayerView::from)
                .collect(),
        }
    }
}
