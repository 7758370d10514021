use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::{api::ApiId, common::Publicity, db::Election};

/// An API-friendly election description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionDescription {
    pub id: ApiId,
    pub name: String,
    pub slug: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub voting_start: u32,
    pub voting_end: u32,
    pub publicity: Publicity,
    pub logo: Option<String>,
}

impl From<Election> for ElectionDescription {
    fn from(election: Election) -> Self {
        Self {
            id: election.id.into(),
            name: election.name,
            slug: election.slug,
            start_date: election.start_date,
            end_date: election.end_date,
            voting_start: election.voting_start,
            voting_end: election.voting_end,
            publicity: election.publicity,
            logo: election.logo,
        }
    }
}
