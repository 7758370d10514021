//! MongoDB implementation of [`Store`].

use chrono::{DateTime, NaiveDate, Utc};
use mongodb::{
    bson::{doc, DateTime as BsonDateTime, Document},
    Database,
};
use rocket::futures::TryStreamExt;

use super::Store;
use crate::{
    error::{Error, Result},
    lifecycle::tally::BallotBox,
    model::{
        common::{Publicity, TokenOwner, TokenType, VoterStatus},
        db::{
            Candidate, Election, GeneratedElectionResult, InvitedCommissioner, InvitedVoter,
            Partylist, Position, TokenId, User, VerificationToken, Vote,
        },
        mongodb::{is_duplicate_key_error, Coll, Id},
    },
};

/// A [`Store`] over the collections of one MongoDB database.
#[derive(Clone)]
pub struct MongoStore {
    elections: Coll<Election>,
    voters: Coll<InvitedVoter>,
    commissioners: Coll<InvitedCommissioner>,
    tokens: Coll<VerificationToken>,
    partylists: Coll<Partylist>,
    positions: Coll<Position>,
    candidates: Coll<Candidate>,
    votes: Coll<Vote>,
    results: Coll<GeneratedElectionResult>,
    users: Coll<User>,
}

impl MongoStore {
    pub fn new(db: &Database) -> Self {
        Self {
            elections: Coll::from_db(db),
            voters: Coll::from_db(db),
            commissioners: Coll::from_db(db),
            tokens: Coll::from_db(db),
            partylists: Coll::from_db(db),
            positions: Coll::from_db(db),
            candidates: Coll::from_db(db),
            votes: Coll::from_db(db),
            results: Coll::from_db(db),
            users: Coll::from_db(db),
        }
    }
}

/// Filter for every row belonging to an election.
fn in_election(election: Id) -> Document {
    doc! { "election_id": election }
}

/// Filter for every token of a type held by `owner`.
fn owned_by(owner: TokenOwner, kind: TokenType) -> Document {
    let mut filter = doc! { "type": kind };
    filter.insert(owner.field(), owner.id());
    filter
}

#[rocket::async_trait]
impl Store for MongoStore {
    async fn elections_due(&self, date: NaiveDate, hour: u32) -> Result<Vec<Election>> {
        let date = date.to_string();
        let hour = i64::from(hour);
        let filter = doc! {
            "$or": [
                {"start_date": &date, "voting_start": hour},
                {"end_date": &date, "voting_end": hour},
            ],
        };
        Ok(self.elections.find(filter, None).await?.try_collect().await?)
    }

    async fn elections_open_on(&self, date: NaiveDate) -> Result<Vec<Election>> {
        // `YYYY-MM-DD` strings order like the dates they hold.
        let filter = doc! {
            "publicity": { "$ne": Publicity::Private },
            "end_date": { "$gte": date.to_string() },
        };
        Ok(self.elections.find(filter, None).await?.try_collect().await?)
    }

    async fn election(&self, id: Id) -> Result<Option<Election>> {
        Ok(self.elections.find_one(id.as_doc(), None).await?)
    }

    async fn update_publicity(&self, id: Id, from: Publicity, to: Publicity) -> Result<bool> {
        let filter = doc! {
            "_id": id,
            "publicity": from,
        };
        let update = doc! {
            "$set": {
                "publicity": to,
            }
        };
        let result = self.elections.update_one(filter, update, None).await?;
        Ok(result.modified_count == 1)
    }

    async fn voters_with_status(
        &self,
        election: Id,
        status: VoterStatus,
    ) -> Result<Vec<InvitedVoter>> {
        let filter = doc! {
            "election_id": election,
            "status": status,
        };
        Ok(self.voters.find(filter, None).await?.try_collect().await?)
    }

    async fn invited_voter(&self, id: Id) -> Result<Option<InvitedVoter>> {
        Ok(self.voters.find_one(id.as_doc(), None).await?)
    }

    async fn invited_commissioner(&self, id: Id) -> Result<Option<InvitedCommissioner>> {
        Ok(self.commissioners.find_one(id.as_doc(), None).await?)
    }

    async fn update_voter_status(
        &self,
        id: Id,
        from: VoterStatus,
        to: VoterStatus,
    ) -> Result<bool> {
        if !from.can_advance_to(to) {
            return Err(Error::Inconsistent(format!(
                "voter status cannot move from {from:?} to {to:?}"
            )));
        }
        let filter = doc! {
            "_id": id,
            "status": from,
        };
        let update = doc! {
            "$set": {
                "status": to,
            }
        };
        let result = self.voters.update_one(filter, update, None).await?;
        Ok(result.modified_count == 1)
    }

    async fn insert_token(&self, token: &VerificationToken) -> Result<()> {
        self.tokens.insert_one(token, None).await?;
        Ok(())
    }

    async fn token(&self, id: &TokenId) -> Result<Option<VerificationToken>> {
        Ok(self
            .tokens
            .find_one(doc! { "_id": id.as_str() }, None)
            .await?)
    }

    async fn delete_tokens(&self, owner: TokenOwner, kind: TokenType) -> Result<u64> {
        let result = self
            .tokens
            .delete_many(owned_by(owner, kind), None)
            .await?;
        Ok(result.deleted_count)
    }

    async fn ballot_box(&self, election: Id) -> Result<BallotBox> {
        // Read a consistent-enough view: votes last, so every counted vote's
        // candidate and position has already been read.
        let partylists = self
            .partylists
            .find(in_election(election), None)
            .await?
            .try_collect()
            .await?;
        let positions = self
            .positions
            .find(in_election(election), None)
            .await?
            .try_collect()
            .await?;
        let candidates = self
            .candidates
            .find(in_election(election), None)
            .await?
            .try_collect()
            .await?;
        let votes = self
            .votes
            .find(in_election(election), None)
            .await?
            .try_collect()
            .await?;
        Ok(BallotBox {
            partylists,
            positions,
            candidates,
            votes,
        })
    }

    async fn result_exists(&self, election: Id) -> Result<bool> {
        let count = self
            .results
            .count_documents(in_election(election), None)
            .await?;
        Ok(count > 0)
    }

    async fn insert_result(&self, result: &GeneratedElectionResult) -> Result<bool> {
        // The unique index on `election_id` decides which result wins.
        match self.results.insert_one(result, None).await {
            Ok(_) => Ok(true),
            Err(e) if is_duplicate_key_error(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn results(&self, election: Id) -> Result<Vec<GeneratedElectionResult>> {
        Ok(self
            .results
            .find(in_election(election), None)
            .await?
            .try_collect()
            .await?)
    }

    async fn user(&self, id: Id) -> Result<Option<User>> {
        Ok(self.users.find_one(id.as_doc(), None).await?)
    }

    async fn mark_email_verified(&self, user: Id, at: DateTime<Utc>) -> Result<()> {
        let update = doc! {
            "$set": {
                "email_verified": BsonDateTime::from_chrono(at),
            }
        };
        let result = self.users.update_one(user.as_doc(), update, None).await?;
        if result.matched_count == 0 {
            return Err(Error::not_found(format!("User {user}")));
        }
        Ok(())
    }
}
