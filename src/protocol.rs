// Message types between the UI boundary and the application loop.
//
// Consumers never touch coordinator internals: they send `Intent`s and
// receive `BoardUpdate`s. Both have stable serde wire forms for the local
// control socket.

use serde::{Deserialize, Serialize};

use crate::model::{DraftPick, Player, PlayerId, Team};

// ---------------------------------------------------------------------------
// Intents (UI -> app)
// ---------------------------------------------------------------------------

/// A user intention, validated and executed by the coordinator. The draft
/// state is only ever mutated through these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Intent {
    /// Draft a player for the team currently on the clock.
    SelectPlayer { player_id: PlayerId },
    /// Forfeit the current pick and advance the turn.
    SkipPick,
    /// Pause or resume the draft clock for everyone.
    TogglePause,
    /// Delete all picks and restart from pick 1. `confirmed` must be true;
    /// an unconfirmed reset is rejected before anything is deleted.
    ResetDraft { confirmed: bool },
    /// Shut the board process down.
    Quit,
}

// ---------------------------------------------------------------------------
// Updates (app -> UI)
// ---------------------------------------------------------------------------

/// A message pushed to every connected UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BoardUpdate {
    /// Full derived view of the board. Sent after every state change.
    Snapshot(BoardSnapshot),
    /// A mutating operation failed. Always human-readable; silent failures
    /// are a defect.
    Error { message: String },
    /// Whether the realtime feed to the roster store is up.
    FeedStatus { connected: bool },
}

/// Read-only derived view of the draft. Player references are resolved to
/// display fields here, at the presentation boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardSnapshot {
    pub event_id: String,
    pub event_name: String,
    pub current_pick: u32,
    pub round: u32,
    pub total_picks: u32,
    pub on_clock: Option<TeamView>,
    pub remaining_seconds: u32,
    pub paused: bool,
    pub complete: bool,
    pub picks: Vec<PickView>,
    pub available_players: Vec<PlayerView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamView {
    pub id: String,
    pub name: String,
    pub draft_order: u32,
}

impl From<&Team> for TeamView {
    fn from(team: &Team) -> Self {
        TeamView {
            id: team.id.clone(),
            name: team.name.clone(),
            draft_order: team.draft_order,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: String,
    pub name: String,
    pub position: String,
}

impl From<&Player> for PlayerView {
    fn from(player: &Player) -> Self {
        PlayerView {
            id: player.id.clone(),
            name: player.name.clone(),
            position: player.position.display_str().to_string(),
        }
    }
}

/// A pick with its player and team resolved for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickView {
    pub pick_number: u32,
    pub round: u32,
    pub team_name: String,
    pub player_name: String,
    pub position: String,
    pub traded: bool,
}

impl PickView {
    /// Resolve a pick against the team and player catalogs. Unknown
    /// references render as their raw ids rather than being dropped.
    pub fn resolve(pick: &DraftPick, teams: &[Team], players: &[Player]) -> Self {
        let team_name = teams
            .iter()
            .find(|t| t.id == pick.team_id)
            .map(|t| t.name.clone())
            .unwrap_or_else(|| pick.team_id.clone());
        let (player_name, position) = players
            .iter()
            .find(|p| p.id == pick.player_id)
            .map(|p| (p.name.clone(), p.position.display_str().to_string()))
            .unwrap_or_else(|| (pick.player_id.clone(), String::new()));
        PickView {
            pick_number: pick.pick_number,
            round: pick.round,
            team_name,
            player_name,
            position,
            traded: pick.traded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Position;
    use chrono::Utc;

    #[test]
    fn intent_wire_format() {
        let intent: Intent =
            serde_json::from_str(r#"{"type":"select_player","player_id":"p7"}"#).unwrap();
        assert_eq!(
            intent,
            Intent::SelectPlayer {
                player_id: "p7".into()
            }
        );

        let intent: Intent = serde_json::from_str(r#"{"type":"skip_pick"}"#).unwrap();
        assert_eq!(intent, Intent::SkipPick);

        let intent: Intent =
            serde_json::from_str(r#"{"type":"reset_draft","confirmed":true}"#).unwrap();
        assert_eq!(intent, Intent::ResetDraft { confirmed: true });
    }

    #[test]
    fn error_update_is_tagged() {
        let update = BoardUpdate::Error {
            message: "player is already drafted".into(),
        };
        let json = serde_json::to_string(&update).unwrap();
        assert!(json.contains(r#""type":"error""#));
        assert!(json.contains("already drafted"));
    }

    #[test]
    fn pick_view_resolves_names() {
        let team = Team {
            id: "t1".into(),
            event_id: "e1".into(),
            name: "Hoopers".into(),
            logo_url: None,
            draft_order: 1,
            owner: None,
        };
        let player = Player {
            id: "p1".into(),
            event_id: "e1".into(),
            name: "Alice Zeal".into(),
            position: Position::Center,
        };
        let pick = DraftPick {
            id: "pick_1".into(),
            event_id: "e1".into(),
            team_id: "t1".into(),
            player_id: "p1".into(),
            pick_number: 1,
            round: 1,
            notes: None,
            traded: false,
            created_by: None,
            created_at: Utc::now(),
        };

        let view = PickView::resolve(&pick, &[team], &[player]);
        assert_eq!(view.team_name, "Hoopers");
        assert_eq!(view.player_name, "Alice Zeal");
        assert_eq!(view.position, "C");
    }

    #[test]
    fn pick_view_falls_back_to_raw_ids() {
        let pick = DraftPick {
            id: "pick_1".into(),
            event_id: "e1".into(),
            team_id: "t9".into(),
            player_id: "p9".into(),
            pick_number: 3,
            round: 1,
            notes: None,
            traded: true,
            created_by: None,
            created_at: Utc::now(),
        };
        let view = PickView::resolve(&pick, &[], &[]);
        assert_eq!(view.team_name, "t9");
        assert_eq!(view.player_name, "p9");
        assert!(view.traded);
    }
}
