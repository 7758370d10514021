use std::ops::Deref;

use log::debug;
use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};

use crate::model::db::{
    Candidate, Election, GeneratedElectionResult, InvitedCommissioner, InvitedVoter, Partylist,
    Position, User, VerificationToken, Vote,
};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl MongoCollection for Election {
    const NAME: &'static str = "elections";
}

impl MongoCollection for InvitedVoter {
    const NAME: &'static str = "invited_voters";
}

impl MongoCollection for InvitedCommissioner {
    const NAME: &'static str = "invited_commissioners";
}

impl MongoCollection for VerificationToken {
    const NAME: &'static str = "verification_tokens";
}

impl MongoCollection for Partylist {
    const NAME: &'static str = "partylists";
}

impl MongoCollection for Position {
    const NAME: &'static str = "positions";
}

impl MongoCollection for Candidate {
    const NAME: &'static str = "candidates";
}

impl MongoCollection for Vote {
    const NAME: &'static str = "votes";
}

impl MongoCollection for GeneratedElectionResult {
    const NAME: &'static str = "generated_election_results";
}

impl MongoCollection for User {
    const NAME: &'static str = "users";
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // Elections are looked up by their opening and closing hours.
    let opening_index = IndexModel::builder()
        .keys(doc! {"start_date": 1, "voting_start": 1})
        .build();
    let closing_index = IndexModel::builder()
        .keys(doc! {"end_date": 1, "voting_end": 1})
        .build();
    let slug_index = IndexModel::builder()
        .keys(doc! {"slug": 1})
        .options(unique.clone())
        .build();
    Coll::<Election>::from_db(db)
        .create_indexes([opening_index, closing_index, slug_index], None)
        .await?;

    // Voters are dispatched per election and status.
    let voter_index = IndexModel::builder()
        .keys(doc! {"election_id": 1, "status": 1})
        .build();
    Coll::<InvitedVoter>::from_db(db)
        .create_index(voter_index, None)
        .await?;

    let commissioner_index = IndexModel::builder()
        .keys(doc! {"election_id": 1})
        .build();
    Coll::<InvitedCommissioner>::from_db(db)
        .create_index(commissioner_index, None)
        .await?;

    // Tokens are looked up by owner.
    let token_index = IndexModel::builder()
        .keys(doc! {"owner.invited_voter": 1, "type": 1})
        .build();
    let user_token_index = IndexModel::builder()
        .keys(doc! {"owner.user": 1, "type": 1})
        .build();
    Coll::<VerificationToken>::from_db(db)
        .create_indexes([token_index, user_token_index], None)
        .await?;

    // One vote per voter per position.
    let vote_index = IndexModel::builder()
        .keys(doc! {"election_id": 1, "voter_id": 1, "position_id": 1})
        .options(unique.clone())
        .build();
    Coll::<Vote>::from_db(db)
        .create_index(vote_index, None)
        .await?;

    // The first generated result for an election wins.
    let result_index = IndexModel::builder()
        .keys(doc! {"election_id": 1})
        .options(unique)
        .build();
    Coll::<GeneratedElectionResult>::from_db(db)
        .create_index(result_index, None)
        .await?;

    Ok(())
}
