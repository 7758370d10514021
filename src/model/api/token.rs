use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{api::ElectionDescription, common::TokenType, db::TokenId};

/// An invitation token together with the election it admits the voter to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationDescription {
    pub token: TokenId,
    #[serde(rename = "type")]
    pub kind: TokenType,
    pub expires_at: DateTime<Utc>,
    pub election: ElectionDescription,
}
