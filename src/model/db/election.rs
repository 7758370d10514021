use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    model::{common::Publicity, mongodb::Id},
};

/// Core election data, as stored in the database.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Election {
    /// Unique ID.
    #[serde(rename = "_id")]
    pub id: Id,
    /// Display name.
    pub name: String,
    /// URL-friendly unique name.
    pub slug: String,
    /// Civil date (organisation time) on which voting opens.
    pub start_date: NaiveDate,
    /// Civil date (organisation time) on which voting closes.
    pub end_date: NaiveDate,
    /// Hour of day (0-23) at which voting opens on `start_date`.
    pub voting_start: u32,
    /// Hour of day (0-23) at which voting closes on `end_date`.
    pub voting_end: u32,
    pub publicity: Publicity,
    /// Logo reference, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
}

impl Election {
    /// Check the schedule invariants that creation is supposed to enforce.
    pub fn validate_schedule(&self) -> Result<()> {
        if self.voting_start > 23 || self.voting_end > 23 {
            return Err(Error::schedule(
                self.id,
                format!(
                    "voting hours {}..{} are not hours of the day",
                    self.voting_start, self.voting_end
                ),
            ));
        }
        if self.voting_end <= self.voting_start {
            return Err(Error::schedule(
                self.id,
                format!(
                    "voting ends at {} but starts at {}",
                    self.voting_end, self.voting_start
                ),
            ));
        }
        if self.end_date < self.start_date {
            return Err(Error::schedule(
                self.id,
                format!("ends on {} before starting on {}", self.end_date, self.start_date),
            ));
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_schedule_passes() {
        Election::example().validate_schedule().unwrap();
    }

    #[test]
    fn end_hour_must_follow_start_hour() {
        let mut election = Election::example();
        election.voting_end = election.voting_start;
        assert!(matches!(
            election.validate_schedule(),
            Err(Error::Schedule { .. })
        ));
    }

    #[test]
    fn hours_must_be_hours_of_day() {
        let mut election = Election::example();
        election.voting_end = 24;
        assert!(election.validate_schedule().is_err());
    }

    #[test]
    fn end_date_cannot_precede_start_date() {
        let mut election = Election::example();
        election.end_date = NaiveDate::from_ymd_opt(2024, 5, 31).unwrap();
        assert!(election.validate_schedule().is_err());
    }
}
