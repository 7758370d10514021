use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// A group of candidates running under one banner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partylist {
    #[serde(rename = "_id")]
    pub id: Id,
    pub election_id: Id,
    pub name: String,
    pub acronym: String,
}

/// An office being voted on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    #[serde(rename = "_id")]
    pub id: Id,
    pub election_id: Id,
    pub name: String,
    /// Display order within the election, ascending.
    pub order: u32,
}

/// A person running for a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: Id,
    pub election_id: Id,
    pub position_id: Id,
    pub partylist_id: Id,
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    pub last_name: String,
}
