// Core data model: events, teams, players, picks, and the shared draft
// status row that mirrors "whose turn is it" across clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type EventId = String;
pub type TeamId = String;
pub type PlayerId = String;
pub type PickId = String;

// ---------------------------------------------------------------------------
// Draft type
// ---------------------------------------------------------------------------

/// How the pick order moves between rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DraftType {
    /// Odd rounds run forward through the draft order, even rounds run
    /// backward, so the last picker of a round picks first in the next.
    Snake,
    /// Every round runs forward through the draft order.
    Linear,
}

impl DraftType {
    /// Parse a draft type string ("snake" / "linear", case-insensitive).
    pub fn from_str_type(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "snake" => Some(DraftType::Snake),
            "linear" => Some(DraftType::Linear),
            _ => None,
        }
    }

    pub fn display_str(&self) -> &'static str {
        match self {
            DraftType::Snake => "snake",
            DraftType::Linear => "linear",
        }
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// Root aggregate for a draft. Teams, players, and picks all reference an
/// event id. Settings are fixed once the draft begins; the coordinator never
/// rewrites them mid-draft.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub name: String,
    /// When the draft is scheduled to run, if a date has been set.
    pub scheduled_for: Option<DateTime<Utc>>,
    pub team_count: u32,
    pub picks_per_team: u32,
    /// Seconds each team gets on the clock per pick.
    pub pick_seconds: u32,
    pub draft_type: DraftType,
    /// Free-form prize description ("$50 gift card", trophy name, ...).
    pub prize: Option<String>,
}

impl Event {
    /// Total picks in the draft. The draft is complete once the current pick
    /// number exceeds this.
    pub fn total_picks(&self) -> u32 {
        self.team_count * self.picks_per_team
    }
}

// ---------------------------------------------------------------------------
// Team
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub event_id: EventId,
    pub name: String,
    pub logo_url: Option<String>,
    /// Position in the turn sequence, 1..N, unique per event.
    pub draft_order: u32,
    /// Identity of the team's owner, when known.
    pub owner: Option<String>,
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// Basketball positions used for the player pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    PointGuard,
    ShootingGuard,
    SmallForward,
    PowerForward,
    Center,
}

impl Position {
    /// Parse a position abbreviation into a Position enum.
    pub fn from_str_pos(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PG" => Some(Position::PointGuard),
            "SG" => Some(Position::ShootingGuard),
            "SF" => Some(Position::SmallForward),
            "PF" => Some(Position::PowerForward),
            "C" => Some(Position::Center),
            _ => None,
        }
    }

    /// Return the display string for this position.
    pub fn display_str(&self) -> &'static str {
        match self {
            Position::PointGuard => "PG",
            Position::ShootingGuard => "SG",
            Position::SmallForward => "SF",
            Position::PowerForward => "PF",
            Position::Center => "C",
        }
    }
}

/// Immutable catalog entry. Drafted/undrafted is derived: a player is
/// available iff no pick references it. The drafted flag is never stored
/// on the player itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub event_id: EventId,
    pub name: String,
    pub position: Position,
}

// ---------------------------------------------------------------------------
// DraftPick
// ---------------------------------------------------------------------------

/// A completed pick. Pick numbers are 1-based and globally sequential within
/// an event; a player id appears in at most one pick per event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftPick {
    pub id: PickId,
    pub event_id: EventId,
    /// The team the pick currently belongs to. May differ from the original
    /// slot owner when `traded` is set; the sequence number never changes.
    pub team_id: TeamId,
    /// The drafted player, always a plain id. Display resolution happens at
    /// the presentation boundary, never inside the core.
    pub player_id: PlayerId,
    pub pick_number: u32,
    pub round: u32,
    pub notes: Option<String>,
    pub traded: bool,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields the coordinator supplies when submitting a pick; the store assigns
/// the id and timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPick {
    pub event_id: EventId,
    pub team_id: TeamId,
    pub player_id: PlayerId,
    pub pick_number: u32,
    pub round: u32,
    pub notes: Option<String>,
    pub created_by: Option<String>,
}

// ---------------------------------------------------------------------------
// DraftStatus
// ---------------------------------------------------------------------------

/// The per-event turn row: the single source of truth for "whose turn is it"
/// across clients. Mutated only through the coordinator's submit/skip/pause/
/// reset operations and mirrored to every client via the change feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftStatus {
    pub event_id: EventId,
    pub current_pick: u32,
    pub paused: bool,
    pub updated_at: DateTime<Utc>,
}

impl DraftStatus {
    /// The implicit status before any row exists: pick 1, paused.
    pub fn initial(event_id: &str) -> Self {
        DraftStatus {
            event_id: event_id.to_string(),
            current_pick: 1,
            paused: true,
            updated_at: Utc::now(),
        }
    }
}
