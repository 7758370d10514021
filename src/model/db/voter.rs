use serde::{Deserialize, Serialize};

use crate::model::{common::VoterStatus, mongodb::Id};

/// A voter invited to a single election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitedVoter {
    #[serde(rename = "_id")]
    pub id: Id,
    pub election_id: Id,
    pub email: String,
    pub status: VoterStatus,
}

impl InvitedVoter {
    /// A freshly added, not yet invited voter.
    pub fn new(election_id: Id, email: impl Into<String>) -> Self {
        Self {
            id: Id::new(),
            election_id,
            email: email.into(),
            status: VoterStatus::Added,
        }
    }
}
