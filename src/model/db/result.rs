use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// A reference to a published result document. Immutable once created;
/// at most one exists per election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedElectionResult {
    #[serde(rename = "_id")]
    pub id: Id,
    /// File name of the document.
    pub name: String,
    /// Public URL of the document.
    pub link: String,
    pub election_id: Id,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl GeneratedElectionResult {
    pub fn new(name: String, link: String, election_id: Id, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Id::new(),
            name,
            link,
            election_id,
            created_at,
        }
    }
}
