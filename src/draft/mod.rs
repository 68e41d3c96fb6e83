// Draft mechanics: pick order resolution, the per-pick clock, and the turn
// coordinator that ties them to the roster store.

pub mod clock;
pub mod coordinator;
pub mod order;
