use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{api::ApiId, db::GeneratedElectionResult};

/// An API-friendly description of a published result document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultDescription {
    pub id: ApiId,
    pub name: String,
    pub link: String,
    pub election_id: ApiId,
    pub created_at: DateTime<Utc>,
}

impl From<GeneratedElectionResult> for ResultDescription {
    fn from(result: GeneratedElectionResult) -> Self {
        Self {
            id: result.id.into(),
            name: result.name,
            link: result.link,
            election_id: result.election_id.into(),
            created_at: result.created_at,
        }
    }
}
