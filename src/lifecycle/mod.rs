//! Time-driven election lifecycle: opening elections with invitations and
//! closing them with a published result.

pub mod clock;
pub mod decision;
pub mod dispatcher;
pub mod engine;
pub mod ledger;
pub mod render;
pub mod result;
pub mod scheduler;
pub mod tally;

#[cfg(test)]
pub(crate) mod testing;

pub use clock::OrgClock;
pub use engine::{DispatchSettings, LifecycleEngine, TickReport};
pub use scheduler::TickScheduler;
