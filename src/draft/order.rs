// Pick order resolution: which team is on the clock for a given pick.
//
// Pure functions over the ordered team list. No I/O, no clock, no store —
// everything here is independently unit-testable.

use crate::model::{DraftType, Team};

/// The round a 1-based pick number falls in: `ceil(pick_number / team_count)`.
/// Returns 0 when `team_count` is 0 (an empty draft has no rounds).
pub fn round_for_pick(pick_number: u32, team_count: u32) -> u32 {
    if team_count == 0 || pick_number == 0 {
        return 0;
    }
    (pick_number + team_count - 1) / team_count
}

/// The 1-based slot of a pick within its round.
pub fn slot_in_round(pick_number: u32, team_count: u32) -> u32 {
    if team_count == 0 || pick_number == 0 {
        return 0;
    }
    ((pick_number - 1) % team_count) + 1
}

/// Resolve the team on the clock for a 1-based pick number.
///
/// `teams` must be ordered by draft order. Returns `None` when `teams` is
/// empty; callers treat that as "draft cannot proceed", never as a panic.
///
/// Linear: pick slots cycle forward every round. Snake: odd rounds run
/// forward, even rounds run backward, so the team picking last in round 1
/// picks first in round 2.
pub fn team_on_the_clock<'a>(
    pick_number: u32,
    teams: &'a [Team],
    draft_type: DraftType,
) -> Option<&'a Team> {
    if teams.is_empty() || pick_number == 0 {
        return None;
    }
    let team_count = teams.len() as u32;
    let slot = slot_in_round(pick_number, team_count);

    let index = match draft_type {
        DraftType::Linear => slot - 1,
        DraftType::Snake => {
            let round = round_for_pick(pick_number, team_count);
            if round % 2 == 1 {
                slot - 1
            } else {
                team_count - slot
            }
        }
    };

    teams.get(index as usize)
}
