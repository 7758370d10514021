//! The pure half of the lifecycle: given civil time and what is known about
//! an election, decide which transition (if any) is due this tick.

use chrono::Utc;

use crate::{
    error::Result,
    lifecycle::clock::{CivilHour, OrgClock},
    model::{common::Publicity, db::Election},
};

/// What the engine should do with an election this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Opening hour: invite every added voter, then open the election.
    Open,
    /// Open and not yet closed: invite voters still waiting for an invitation.
    RetryInvitations,
    /// Closing hour: tally and publish the result.
    Close,
    /// Nothing to do.
    None,
}

/// What the engine knows about an election when deciding.
#[derive(Debug, Clone, Copy)]
pub struct ElectionSnapshot<'a> {
    pub election: &'a Election,
    /// Whether a result has already been published.
    pub closed: bool,
}

/// Decide the transition due for an election at `now`.
///
/// Start and close are matched by exact (date, hour) equality. An election
/// whose hour passes without a tick is not caught up here.
pub fn decide(clock: &OrgClock, now: &CivilHour, snapshot: ElectionSnapshot<'_>) -> Result<Transition> {
    let election = snapshot.election;
    election.validate_schedule()?;

    if snapshot.closed {
        return Ok(Transition::None);
    }
    if now.date == election.end_date && now.hour == election.voting_end {
        return Ok(Transition::Close);
    }
    if now.date == election.start_date && now.hour == election.voting_start {
        return Ok(Transition::Open);
    }
    if election.publicity != Publicity::Private
        && now.instant < clock.close_instant(election)?.with_timezone(&Utc)
    {
        return Ok(Transition::RetryInvitations);
    }
    Ok(Transition::None)
}
