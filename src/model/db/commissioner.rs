use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Someone invited to help run a single election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitedCommissioner {
    #[serde(rename = "_id")]
    pub id: Id,
    pub election_id: Id,
    pub email: String,
}

impl InvitedCommissioner {
    pub fn new(election_id: Id, email: impl Into<String>) -> Self {
        Self {
            id: Id::new(),
            election_id,
            email: email.into(),
        }
    }
}
