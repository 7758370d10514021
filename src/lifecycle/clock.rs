//! Organisation civil time.
//!
//! Elections are scheduled in civil dates and hours of one fixed IANA zone,
//! independent of the server's own clock. All conversions go through
//! `chrono-tz`; nothing is parsed back out of formatted strings.

use chrono::{DateTime, NaiveDate, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

use crate::{
    error::{Error, Result},
    model::db::Election,
};

/// The matching key for a tick: a civil date and hour of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CivilHour {
    /// The instant this civil hour was resolved from.
    pub instant: DateTime<Utc>,
    /// Civil date in organisation time.
    pub date: NaiveDate,
    /// Hour of day (0-23) in organisation time.
    pub hour: u32,
}

/// Converts between instants and organisation civil time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrgClock {
    tz: Tz,
}

impl OrgClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Resolve an instant to the civil date and hour it falls in.
    pub fn resolve(&self, now: DateTime<Utc>) -> CivilHour {
        let local = now.with_timezone(&self.tz);
        CivilHour {
            instant: now,
            date: local.date_naive(),
            hour: local.hour(),
        }
    }

    /// The instant at which `date` reaches `hour:00` in organisation time.
    /// Ambiguous local times resolve to the earliest instant; local times
    /// skipped by a DST jump do not exist.
    pub fn instant_at(&self, date: NaiveDate, hour: u32) -> Option<DateTime<Tz>> {
        let naive = date.and_hms_opt(hour, 0, 0)?;
        self.tz.from_local_datetime(&naive).earliest()
    }

    /// The instant voting closes for an election. Invitations expire then.
    pub fn close_instant(&self, election: &Election) -> Result<DateTime<Tz>> {
        self.instant_at(election.end_date, election.voting_end)
            .ok_or_else(|| {
                Error::schedule(
                    election.id,
                    format!(
                        "{} {:02}:00 does not exist in {}",
                        election.end_date,
                        election.voting_end,
                        self.tz.name()
                    ),
                )
            })
    }
}
