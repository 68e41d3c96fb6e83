// Application orchestration: the single event loop that drives the draft.
//
// Listens on three sources with `tokio::select!`:
// 1. the change-feed subscription from the roster store
// 2. user intents from the control socket
// 3. a one-second interval that beats the draft clock
//
// All coordinator mutations happen inside this loop, awaited inline, so
// intents are processed strictly one at a time — a double-clicked pick
// queues behind the first and fails validation instead of double-submitting.
// After every state change a fresh snapshot is pushed through `ui_tx`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::draft::clock::TickOutcome;
use crate::draft::coordinator::{DraftError, ResetConfirmation, TurnCoordinator};
use crate::protocol::{BoardUpdate, Intent};
use crate::store::{ChangeEvent, RosterStore, Subscription};

/// How often the draft clock beats.
pub const CLOCK_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Delay between reconnect attempts after the change feed drops.
pub const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(1);

/// Everything the event loop owns for one active event.
pub struct AppState {
    pub coordinator: TurnCoordinator,
    pub store: Arc<dyn RosterStore>,
    pub event_id: String,
}

/// Run the event loop until a `Quit` intent arrives or the intent channel
/// closes. The subscription is owned here; when the loop exits it is
/// dropped, which tears the feed down — no ticks or pick advancement can
/// leak past the active event's lifetime.
pub async fn run(
    mut state: AppState,
    mut subscription: Subscription,
    mut intent_rx: mpsc::Receiver<Intent>,
    ui_tx: mpsc::Sender<BoardUpdate>,
) -> anyhow::Result<()> {
    info!("Draft board event loop started for event {}", state.event_id);

    let mut clock_interval = tokio::time::interval(CLOCK_TICK_INTERVAL);
    // The first tick completes immediately; consume it so the countdown
    // starts one full second from now.
    clock_interval.tick().await;

    push_snapshot(&state, &ui_tx).await;

    loop {
        tokio::select! {
            // --- Change feed from the roster store ---
            change = subscription.recv() => {
                match change {
                    Some(event) => {
                        handle_change_event(&mut state, event, &ui_tx).await;
                    }
                    None => {
                        // Feed lost. The feed never replays missed events,
                        // so reconnecting always means subscribe first, then
                        // refetch full state before trusting anything again.
                        warn!("Change feed lost for event {}", state.event_id);
                        let _ = ui_tx
                            .send(BoardUpdate::FeedStatus { connected: false })
                            .await;
                        subscription = resubscribe(&mut state).await;
                        let _ = ui_tx
                            .send(BoardUpdate::FeedStatus { connected: true })
                            .await;
                        push_snapshot(&state, &ui_tx).await;
                    }
                }
            }

            // --- User intents ---
            intent = intent_rx.recv() => {
                match intent {
                    Some(Intent::Quit) => {
                        info!("Quit intent received, shutting down");
                        break;
                    }
                    Some(intent) => {
                        handle_intent(&mut state, intent, &ui_tx).await;
                    }
                    None => {
                        info!("Intent channel closed, shutting down");
                        break;
                    }
                }
            }

            // --- Clock beat ---
            _ = clock_interval.tick() => {
                match state.coordinator.tick() {
                    TickOutcome::Idle => {}
                    TickOutcome::Ticked(_) => {
                        push_snapshot(&state, &ui_tx).await;
                    }
                    TickOutcome::Expired => {
                        // Time out forfeits the pick: same path as a skip.
                        if let Err(e) = state.coordinator.handle_expiry().await {
                            warn!("Auto-skip after expiry failed: {e}");
                            report_error(&ui_tx, &e).await;
                        }
                        push_snapshot(&state, &ui_tx).await;
                    }
                }
            }
        }
    }

    info!("Draft board event loop exiting");
    Ok(())
}

/// Execute one user intent against the coordinator and report the outcome.
/// Every failure becomes a visible error update; a snapshot follows either
/// way so the UI never renders stale state.
async fn handle_intent(state: &mut AppState, intent: Intent, ui_tx: &mpsc::Sender<BoardUpdate>) {
    let result = match intent {
        Intent::SelectPlayer { ref player_id } => {
            state.coordinator.select_player(player_id).await
        }
        Intent::SkipPick => state.coordinator.skip_pick().await,
        Intent::TogglePause => state.coordinator.toggle_pause().await,
        Intent::ResetDraft { confirmed: false } => Err(DraftError::ResetNotConfirmed),
        Intent::ResetDraft { confirmed: true } => {
            state
                .coordinator
                .reset_draft(ResetConfirmation::confirmed_by_user())
                .await
        }
        // Quit is handled by the loop before reaching here.
        Intent::Quit => Ok(()),
    };

    if let Err(e) = result {
        warn!("Intent failed: {e}");
        report_error(ui_tx, &e).await;
    }
    push_snapshot(state, ui_tx).await;
}

/// Fold one change-feed event into the coordinator.
async fn handle_change_event(
    state: &mut AppState,
    event: ChangeEvent,
    ui_tx: &mpsc::Sender<BoardUpdate>,
) {
    match event {
        ChangeEvent::PickInserted(pick) => {
            // Merge if new; the echo of our own submit dedupes by id.
            if state.coordinator.apply_pick_inserted(pick) {
                push_snapshot(state, ui_tx).await;
            }
        }
        ChangeEvent::StatusUpdated(status) => {
            let needs_refresh = state.coordinator.apply_status_update(status);
            if needs_refresh {
                // The authoritative pick moved behind our recorded picks:
                // a remote reset. Incremental events cannot repair that.
                info!("Remote reset detected, refetching pick list");
                if let Err(e) = state.coordinator.refresh().await {
                    warn!("Refresh after remote reset failed: {e}");
                    report_error(ui_tx, &e).await;
                }
            }
            push_snapshot(state, ui_tx).await;
        }
    }
}

/// Re-establish the change feed after a loss: subscribe first, then refetch
/// full state so nothing missed while disconnected goes unnoticed. Retries
/// until it succeeds; there is nothing useful to do without a feed.
async fn resubscribe(state: &mut AppState) -> Subscription {
    loop {
        match state.store.subscribe(&state.event_id).await {
            Ok(subscription) => match state.coordinator.refresh().await {
                Ok(()) => {
                    info!("Change feed re-established for event {}", state.event_id);
                    return subscription;
                }
                Err(e) => {
                    warn!("State refetch after resubscribe failed: {e}");
                    drop(subscription);
                }
            },
            Err(e) => {
                warn!("Resubscribe failed: {e}");
            }
        }
        tokio::time::sleep(RESUBSCRIBE_DELAY).await;
    }
}

async fn push_snapshot(state: &AppState, ui_tx: &mpsc::Sender<BoardUpdate>) {
    let _ = ui_tx
        .send(BoardUpdate::Snapshot(state.coordinator.snapshot()))
        .await;
}

async fn report_error(ui_tx: &mpsc::Sender<BoardUpdate>, error: &DraftError) {
    let _ = ui_tx
        .send(BoardUpdate::Error {
            message: error.to_string(),
        })
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DraftType, Event, Player, Position, Team};
    use crate::protocol::BoardSnapshot;
    use crate::store::memory::MemoryStore;
    use tokio::task::JoinHandle;

    fn seed_store(team_count: u32, picks_per_team: u32) -> Arc<MemoryStore> {
        let store = MemoryStore::new();
        let event = Event {
            id: "e1".into(),
            name: "League Night".into(),
            scheduled_for: None,
            team_count,
            picks_per_team,
            pick_seconds: 60,
            draft_type: DraftType::Snake,
            prize: None,
        };
        let teams = (1..=team_count)
            .map(|i| Team {
                id: format!("t{i}"),
                event_id: "e1".into(),
                name: format!("Team {i}"),
                logo_url: None,
                draft_order: i,
                owner: None,
            })
            .collect();
        let players = (1..=team_count * picks_per_team + 2)
            .map(|i| Player {
                id: format!("p{i}"),
                event_id: "e1".into(),
                name: format!("Player {i}"),
                position: Position::Center,
            })
            .collect();
        store.seed(event, teams, players);
        Arc::new(store)
    }

    async fn spawn_app(
        store: Arc<MemoryStore>,
    ) -> (
        mpsc::Sender<Intent>,
        mpsc::Receiver<BoardUpdate>,
        JoinHandle<anyhow::Result<()>>,
    ) {
        let coordinator = TurnCoordinator::load(store.clone(), "e1", Some("tester".into()))
            .await
            .unwrap();
        let subscription = store.subscribe("e1").await.unwrap();
        let state = AppState {
            coordinator,
            store: store.clone() as Arc<dyn RosterStore>,
            event_id: "e1".into(),
        };
        let (intent_tx, intent_rx) = mpsc::channel(64);
        let (ui_tx, ui_rx) = mpsc::channel(256);
        let handle = tokio::spawn(run(state, subscription, intent_rx, ui_tx));
        (intent_tx, ui_rx, handle)
    }

    /// Drain updates until the next snapshot arrives.
    async fn next_snapshot(ui_rx: &mut mpsc::Receiver<BoardUpdate>) -> BoardSnapshot {
        loop {
            match ui_rx.recv().await.expect("ui channel closed") {
                BoardUpdate::Snapshot(snapshot) => return snapshot,
                _ => continue,
            }
        }
    }

    /// Drain updates until an error arrives.
    async fn next_error(ui_rx: &mut mpsc::Receiver<BoardUpdate>) -> String {
        loop {
            match ui_rx.recv().await.expect("ui channel closed") {
                BoardUpdate::Error { message } => return message,
                _ => continue,
            }
        }
    }

    #[tokio::test]
    async fn initial_snapshot_pushed_on_start() {
        let store = seed_store(4, 2);
        let (intent_tx, mut ui_rx, handle) = spawn_app(store).await;

        let snapshot = next_snapshot(&mut ui_rx).await;
        assert_eq!(snapshot.current_pick, 1);
        assert!(snapshot.paused);
        assert_eq!(snapshot.remaining_seconds, 60);

        intent_tx.send(Intent::Quit).await.unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn select_intent_advances_the_draft() {
        let store = seed_store(4, 2);
        let (intent_tx, mut ui_rx, handle) = spawn_app(store).await;

        intent_tx.send(Intent::TogglePause).await.unwrap();
        intent_tx
            .send(Intent::SelectPlayer {
                player_id: "p1".into(),
            })
            .await
            .unwrap();

        let mut snapshot = next_snapshot(&mut ui_rx).await;
        while snapshot.current_pick < 2 {
            snapshot = next_snapshot(&mut ui_rx).await;
        }
        assert_eq!(snapshot.current_pick, 2);
        assert_eq!(snapshot.picks.len(), 1);
        assert_eq!(snapshot.on_clock.as_ref().unwrap().id, "t2");

        intent_tx.send(Intent::Quit).await.unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn failed_select_reports_visible_error() {
        let store = seed_store(4, 2);
        let (intent_tx, mut ui_rx, handle) = spawn_app(store).await;

        // Still paused: the pick must be rejected with a readable message.
        intent_tx
            .send(Intent::SelectPlayer {
                player_id: "p1".into(),
            })
            .await
            .unwrap();

        let message = next_error(&mut ui_rx).await;
        assert!(message.contains("paused"));

        intent_tx.send(Intent::Quit).await.unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn unconfirmed_reset_is_rejected_without_deleting() {
        let store = seed_store(4, 2);
        let (intent_tx, mut ui_rx, handle) = spawn_app(store.clone()).await;

        intent_tx.send(Intent::TogglePause).await.unwrap();
        intent_tx
            .send(Intent::SelectPlayer {
                player_id: "p1".into(),
            })
            .await
            .unwrap();
        intent_tx
            .send(Intent::ResetDraft { confirmed: false })
            .await
            .unwrap();

        let message = next_error(&mut ui_rx).await;
        assert!(message.contains("confirmation"));
        assert_eq!(store.list_picks("e1").await.unwrap().len(), 1);

        intent_tx.send(Intent::Quit).await.unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn confirmed_reset_restarts_the_draft() {
        let store = seed_store(4, 2);
        let (intent_tx, mut ui_rx, handle) = spawn_app(store.clone()).await;

        intent_tx.send(Intent::TogglePause).await.unwrap();
        for i in 1..=3 {
            intent_tx
                .send(Intent::SelectPlayer {
                    player_id: format!("p{i}"),
                })
                .await
                .unwrap();
        }
        intent_tx
            .send(Intent::ResetDraft { confirmed: true })
            .await
            .unwrap();

        let mut snapshot = next_snapshot(&mut ui_rx).await;
        while !(snapshot.current_pick == 1 && snapshot.paused && snapshot.picks.is_empty()) {
            snapshot = next_snapshot(&mut ui_rx).await;
        }
        assert!(store.list_picks("e1").await.unwrap().is_empty());

        intent_tx.send(Intent::Quit).await.unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn clock_expiry_auto_skips_exactly_one_pick() {
        let store = seed_store(4, 2);
        let (intent_tx, mut ui_rx, handle) = spawn_app(store).await;

        intent_tx.send(Intent::TogglePause).await.unwrap();

        // With paused time, the runtime auto-advances through 60 interval
        // beats while we wait for the post-expiry snapshot.
        let mut snapshot = next_snapshot(&mut ui_rx).await;
        while snapshot.current_pick < 2 {
            snapshot = next_snapshot(&mut ui_rx).await;
        }
        assert_eq!(snapshot.current_pick, 2);
        assert_eq!(snapshot.remaining_seconds, 60);
        assert_eq!(snapshot.picks.len(), 0);

        intent_tx.send(Intent::Quit).await.unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn remote_pick_is_reconciled_into_snapshot() {
        let store = seed_store(4, 2);
        let (intent_tx, mut ui_rx, handle) = spawn_app(store.clone()).await;

        // Another client records a pick and advances the shared status.
        store
            .create_pick(crate::model::NewPick {
                event_id: "e1".into(),
                team_id: "t1".into(),
                player_id: "p1".into(),
                pick_number: 1,
                round: 1,
                notes: None,
                created_by: Some("rival".into()),
            })
            .await
            .unwrap();
        store.put_status("e1", 2, false).await.unwrap();

        let mut snapshot = next_snapshot(&mut ui_rx).await;
        while snapshot.current_pick < 2 || snapshot.picks.is_empty() {
            snapshot = next_snapshot(&mut ui_rx).await;
        }
        assert_eq!(snapshot.picks[0].player_name, "Player 1");
        assert!(!snapshot.paused);
        assert_eq!(snapshot.remaining_seconds, 60);

        intent_tx.send(Intent::Quit).await.unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn feed_loss_triggers_refetch_and_resubscribe() {
        let store = seed_store(4, 2);
        let coordinator = TurnCoordinator::load(store.clone(), "e1", None)
            .await
            .unwrap();
        let state = AppState {
            coordinator,
            store: store.clone() as Arc<dyn RosterStore>,
            event_id: "e1".into(),
        };

        // A subscription whose sender is already gone: the loop sees feed
        // loss immediately and must recover through the store.
        let (dead_tx, dead_rx) = mpsc::channel(4);
        drop(dead_tx);
        let dead_sub = Subscription::new(dead_rx, tokio::spawn(async {}));

        // Picks made while "disconnected" are only visible via refetch.
        store
            .create_pick(crate::model::NewPick {
                event_id: "e1".into(),
                team_id: "t1".into(),
                player_id: "p1".into(),
                pick_number: 1,
                round: 1,
                notes: None,
                created_by: None,
            })
            .await
            .unwrap();

        let (intent_tx, intent_rx) = mpsc::channel(64);
        let (ui_tx, mut ui_rx) = mpsc::channel(256);
        let handle = tokio::spawn(run(state, dead_sub, intent_rx, ui_tx));

        // Expect disconnect notice, then reconnect, then a snapshot that
        // contains the missed pick.
        let mut saw_disconnect = false;
        let mut saw_reconnect = false;
        loop {
            match ui_rx.recv().await.unwrap() {
                BoardUpdate::FeedStatus { connected: false } => saw_disconnect = true,
                BoardUpdate::FeedStatus { connected: true } => saw_reconnect = true,
                BoardUpdate::Snapshot(snapshot) if !snapshot.picks.is_empty() => break,
                _ => continue,
            }
        }
        assert!(saw_disconnect);
        assert!(saw_reconnect);

        intent_tx.send(Intent::Quit).await.unwrap();
        handle.await.unwrap().unwrap();
    }
}
