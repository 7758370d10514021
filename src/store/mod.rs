//! Persistence abstraction for the lifecycle.
//!
//! Every mutation the lifecycle performs is a single-row conditional update:
//! the row only changes if it is still in the expected prior state, and a row
//! that has already moved on is reported as unchanged rather than as an error.
//! This is what makes overlapping or repeated ticks safe.

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

use chrono::{DateTime, NaiveDate, Utc};

use crate::{
    error::Result,
    lifecycle::tally::BallotBox,
    model::{
        common::{Publicity, TokenOwner, TokenType, VoterStatus},
        db::{
            Election, GeneratedElectionResult, InvitedCommissioner, InvitedVoter, TokenId, User,
            VerificationToken,
        },
        mongodb::Id,
    },
};

#[rocket::async_trait]
pub trait Store: Send + Sync {
    /// Elections that open or close at the given civil date and hour.
    async fn elections_due(&self, date: NaiveDate, hour: u32) -> Result<Vec<Election>>;

    /// Elections past `Private` whose voting does not end before `date`.
    async fn elections_open_on(&self, date: NaiveDate) -> Result<Vec<Election>>;

    async fn election(&self, id: Id) -> Result<Option<Election>>;

    /// Move an election from `from` to `to`. Returns whether it changed.
    async fn update_publicity(&self, id: Id, from: Publicity, to: Publicity) -> Result<bool>;

    async fn voters_with_status(
        &self,
        election: Id,
        status: VoterStatus,
    ) -> Result<Vec<InvitedVoter>>;

    async fn invited_voter(&self, id: Id) -> Result<Option<InvitedVoter>>;

    async fn invited_commissioner(&self, id: Id) -> Result<Option<InvitedCommissioner>>;

    /// Move a voter from `from` to `to`. Returns whether it changed.
    async fn update_voter_status(
        &self,
        id: Id,
        from: VoterStatus,
        to: VoterStatus,
    ) -> Result<bool>;

    async fn insert_token(&self, token: &VerificationToken) -> Result<()>;

    async fn token(&self, id: &TokenId) -> Result<Option<VerificationToken>>;

    /// Delete every token of the given type held by `owner`.
    async fn delete_tokens(&self, owner: TokenOwner, kind: TokenType) -> Result<u64>;

    /// Everything needed to tally an election.
    async fn ballot_box(&self, election: Id) -> Result<BallotBox>;

    async fn result_exists(&self, election: Id) -> Result<bool>;

    /// Record a generated result unless the election already has one.
    /// Returns whether this result was the one recorded.
    async fn insert_result(&self, result: &GeneratedElectionResult) -> Result<bool>;

    async fn results(&self, election: Id) -> Result<Vec<GeneratedElectionResult>>;

    async fn user(&self, id: Id) -> Result<Option<User>>;

    async fn mark_email_verified(&self, user: Id, at: DateTime<Utc>) -> Result<()>;
}
