use mongodb::bson::{to_bson, Bson};
use rocket::FromFormField;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// What a verification token grants.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, FromFormField)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenType {
    #[field(value = "ELECTION_INVITATION")]
    ElectionInvitation,
    #[field(value = "EMAIL_VERIFICATION")]
    EmailVerification,
    #[field(value = "PASSWORD_RESET")]
    PasswordReset,
}

impl From<TokenType> for Bson {
    fn from(kind: TokenType) -> Self {
        to_bson(&kind).expect("Serialisation is infallible")
    }
}

/// The single owner of a token. A token belongs to exactly one of these.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenOwner {
    User(Id),
    InvitedVoter(Id),
    InvitedCommissioner(Id),
}

impl TokenOwner {
    /// The name of the owner's field in the stored document.
    pub fn field(&self) -> &'static str {
        match self {
            Self::User(_) => "owner.user",
            Self::InvitedVoter(_) => "owner.invited_voter",
            Self::InvitedCommissioner(_) => "owner.invited_commissioner",
        }
    }

    pub fn id(&self) -> Id {
        match *self {
            Self::User(id) | Self::InvitedVoter(id) | Self::InvitedCommissioner(id) => id,
        }
    }
}
