use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// One cast ballot entry: a voter's choice for one position.
/// A vote without a candidate is an abstention on that position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    #[serde(rename = "_id")]
    pub id: Id,
    pub election_id: Id,
    pub voter_id: Id,
    pub position_id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_id: Option<Id>,
}
