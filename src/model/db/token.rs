use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use data_encoding::HEXLOWER;
use mongodb::bson::{serde_helpers::chrono_datetime_as_bson_datetime, Bson};
use rand::RngCore;
use rocket::request::FromParam;
use serde::{Deserialize, Serialize};

use crate::model::common::{TokenOwner, TokenType};

/// Number of random bytes in a token ID.
const TOKEN_BYTES: usize = 32;

/// The secret identifying a verification token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(String);

impl TokenId {
    /// Generate a fresh, unguessable token ID.
    pub fn random() -> Self {
        let mut bytes = [0; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(HEXLOWER.encode(&bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TokenId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TokenId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<TokenId> for Bson {
    fn from(id: TokenId) -> Self {
        Bson::String(id.0)
    }
}

impl<'a> FromParam<'a> for TokenId {
    type Error = &'a str;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        if param.is_empty() {
            Err(param)
        } else {
            Ok(Self(param.to_string()))
        }
    }
}

/// A single-use credential, owned by exactly one party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationToken {
    #[serde(rename = "_id")]
    pub id: TokenId,
    #[serde(rename = "type")]
    pub kind: TokenType,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub expires_at: DateTime<Utc>,
    pub owner: TokenOwner,
}

impl VerificationToken {
    pub fn new(kind: TokenType, owner: TokenOwner, expires_at: DateTime<Utc>) -> Self {
        Self {
            id: TokenId::random(),
            kind,
            expires_at,
            owner,
        }
    }

    /// Has this token expired at `now`?
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}
