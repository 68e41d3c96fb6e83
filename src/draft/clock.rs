// The per-pick countdown clock.
//
// The clock is a plain state machine with no timer of its own: the
// application event loop owns the single one-second `tokio::time::interval`
// and calls `tick()` on each beat. Keeping the tick source out of the clock
// is what guarantees at most one active countdown per process — resuming an
// already-running clock cannot spawn a second timer because there is no
// timer to spawn.

/// Whether the countdown is advancing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    Running,
    Paused,
}

/// The result of one clock beat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The clock is paused; nothing happened.
    Idle,
    /// One second elapsed; this many seconds remain.
    Ticked(u32),
    /// The countdown reached zero. The clock has already rewound to the
    /// full pick duration and remains running; the caller decides whether
    /// to pause or let the next pick's countdown continue.
    Expired,
}

/// Countdown for the pick currently on the clock. Starts paused with the
/// full pick duration remaining.
#[derive(Debug, Clone)]
pub struct DraftClock {
    state: ClockState,
    remaining: u32,
    pick_seconds: u32,
}

impl DraftClock {
    pub fn new(pick_seconds: u32) -> Self {
        DraftClock {
            state: ClockState::Paused,
            remaining: pick_seconds,
            pick_seconds,
        }
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ClockState::Running
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining
    }

    /// Transition `Paused -> Running`. Returns false (and changes nothing)
    /// when already running.
    pub fn resume(&mut self) -> bool {
        if self.state == ClockState::Running {
            return false;
        }
        self.state = ClockState::Running;
        true
    }

    /// Transition `Running -> Paused`, preserving the remaining time.
    pub fn pause(&mut self) {
        self.state = ClockState::Paused;
    }

    /// Set the remaining time without changing Running/Paused. Used after
    /// every pick, skip, or authoritative status update. The given duration
    /// also becomes the rewind target for future expiries.
    pub fn reset(&mut self, duration_seconds: u32) {
        self.pick_seconds = duration_seconds;
        self.remaining = duration_seconds;
    }

    /// Advance the countdown by one second. Only the event loop's interval
    /// calls this. On expiry the clock rewinds to the full pick duration and
    /// stays running so the next pick's countdown continues seamlessly.
    pub fn tick(&mut self) -> TickOutcome {
        if self.state == ClockState::Paused {
            return TickOutcome::Idle;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.remaining = self.pick_seconds;
            TickOutcome::Expired
        } else {
            TickOutcome::Ticked(self.remaining)
        }
    }
}
