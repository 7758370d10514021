//! In-memory implementation of [`Store`].
//!
//! All data is held in memory and lost on restart. Used by tests and for
//! exercising the lifecycle without a database.

use std::collections::HashMap;
#[cfg(test)]
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, NaiveDate, Utc};
use rocket::tokio::sync::RwLock;

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
        mongodb::Id,
    },
};

#[derive(Default)]
struct Tables {
    elections: HashMap<Id, Election>,
    voters: HashMap<Id, InvitedVoter>,
    commissioners: HashMap<Id, InvitedCommissioner>,
    tokens: HashMap<TokenId, VerificationToken>,
    partylists: Vec<Partylist>,
    positions: Vec<Position>,
    candidates: Vec<Candidate>,
    votes: Vec<Vote>,
    results: Vec<GeneratedElectionResult>,
    users: HashMap<Id, User>,
}

/// In-memory store. Every table sits behind one `RwLock`, so each
/// conditional update is atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    /// Number of upcoming token inserts that fail.
    #[cfg(test)]
    failing_token_inserts: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_election(&self, election: Election) {
        self.tables
            .write()
            .await
            .elections
            .insert(election.id, election);
    }

    pub async fn insert_voter(&self, voter: InvitedVoter) {
        self.tables.write().await.voters.insert(voter.id, voter);
    }

    pub async fn insert_commissioner(&self, commissioner: InvitedCommissioner) {
        self.tables
            .write()
            .await
            .commissioners
            .insert(commissioner.id, commissioner);
    }

    pub async fn insert_user(&self, user: User) {
        self.tables.write().await.users.insert(user.id, user);
    }

    pub async fn insert_partylist(&self, partylist: Partylist) {
        self.tables.write().await.partylists.push(partylist);
    }

    pub async fn insert_position(&self, position: Position) {
        self.tables.write().await.positions.push(position);
    }

    pub async fn insert_candidate(&self, candidate: Candidate) {
        self.tables.write().await.candidates.push(candidate);
    }

    pub async fn insert_vote(&self, vote: Vote) {
        self.tables.write().await.votes.push(vote);
    }

    /// All tokens held by `owner`, in no particular order.
    pub async fn tokens_owned_by(&self, owner: TokenOwner) -> Vec<VerificationToken> {
        self.tables
            .read()
            .await
            .tokens
            .values()
            .filter(|t| t.owner == owner)
            .cloned()
            .collect()
    }

    /// Make the next `count` token inserts fail.
    #[cfg(test)]
    pub fn fail_token_inserts(&self, count: usize) {
        self.failing_token_inserts.store(count, Ordering::SeqCst);
    }

    #[cfg(test)]
    fn injected_token_failure(&self) -> Result<()> {
        let failing = self.failing_token_inserts.fetch_update(
            Ordering::SeqCst,
            Ordering::SeqCst,
            |left| left.checked_sub(1),
        );
        match failing {
            Ok(_) => Err(Error::Inconsistent("token insert failed".to_string())),
            Err(_) => Ok(()),
        }
    }
}

fn sorted_by_id(mut elections: Vec<Election>) -> Vec<Election> {
    elections.sort_by_key(|e| e.id);
    elections
}

#[rocket::async_trait]
impl Store for MemoryStore {
    async fn elections_due(&self, date: NaiveDate, hour: u32) -> Result<Vec<Election>> {
        let tables = self.tables.read().await;
        Ok(sorted_by_id(
            tables
                .elections
                .values()
                .filter(|e| {
                    (e.start_date == date && e.voting_start == hour)
                        || (e.end_date == date && e.voting_end == hour)
                })
                .cloned()
                .collect(),
        ))
    }

    async fn elections_open_on(&self, date: NaiveDate) -> Result<Vec<Election>> {
        let tables = self.tables.read().await;
        Ok(sorted_by_id(
            tables
                .elections
                .values()
                .filter(|e| e.publicity != Publicity::Private && e.end_date >= date)
                .cloned()
                .collect(),
        ))
    }

    async fn election(&self, id: Id) -> Result<Option<Election>> {
        Ok(self.tables.read().await.elections.get(&id).cloned())
    }

    async fn update_publicity(&self, id: Id, from: Publicity, to: Publicity) -> Result<bool> {
        let mut tables = self.tables.write().await;
        match tables.elections.get_mut(&id) {
            Some(election) if election.publicity == from => {
                election.publicity = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn voters_with_status(
        &self,
        election: Id,
        status: VoterStatus,
    ) -> Result<Vec<InvitedVoter>> {
        let tables = self.tables.read().await;
        let mut voters: Vec<InvitedVoter> = tables
            .voters
            .values()
            .filter(|v| v.election_id == election && v.status == status)
            .cloned()
            .collect();
        voters.sort_by_key(|v| v.id);
        Ok(voters)
    }

    async fn invited_voter(&self, id: Id) -> Result<Option<InvitedVoter>> {
        Ok(self.tables.read().await.voters.get(&id).cloned())
    }

    async fn invited_commissioner(&self, id: Id) -> Result<Option<InvitedCommissioner>> {
        Ok(self.tables.read().await.commissioners.get(&id).cloned())
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
        let mut tables = self.tables.write().await;
        match tables.voters.get_mut(&id) {
            Some(voter) if voter.status == from => {
                voter.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_token(&self, token: &VerificationToken) -> Result<()> {
        #[cfg(test)]
        self.injected_token_failure()?;
        self.tables
            .write()
            .await
            .tokens
            .insert(token.id.clone(), token.clone());
        Ok(())
    }

    async fn token(&self, id: &TokenId) -> Result<Option<VerificationToken>> {
        Ok(self.tables.read().await.tokens.get(id).cloned())
    }

    async fn delete_tokens(&self, owner: TokenOwner, kind: TokenType) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.tokens.len();
        tables
            .tokens
            .retain(|_, t| !(t.owner == owner && t.kind == kind));
        Ok((before - tables.tokens.len()) as u64)
    }

    async fn ballot_box(&self, election: Id) -> Result<BallotBox> {
        let tables = self.tables.read().await;
        Ok(BallotBox {
            partylists: tables
                .partylists
                .iter()
                .filter(|p| p.election_id == election)
                .cloned()
                .collect(),
            positions: tables
                .positions
                .iter()
                .filter(|p| p.election_id == election)
                .cloned()
                .collect(),
            candidates: tables
                .candidates
                .iter()
                .filter(|c| c.election_id == election)
                .cloned()
                .collect(),
            votes: tables
                .votes
                .iter()
                .filter(|v| v.election_id == election)
                .cloned()
                .collect(),
        })
    }

    async fn result_exists(&self, election: Id) -> Result<bool> {
        Ok(self
            .tables
            .read()
            .await
            .results
            .iter()
            .any(|r| r.election_id == election))
    }

    async fn insert_result(&self, result: &GeneratedElectionResult) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables
            .results
            .iter()
            .any(|r| r.election_id == result.election_id)
        {
            return Ok(false);
        }
        tables.results.push(result.clone());
        Ok(true)
    }

    async fn results(&self, election: Id) -> Result<Vec<GeneratedElectionResult>> {
        Ok(self
            .tables
            .read()
            .await
            .results
            .iter()
            .filter(|r| r.election_id == election)
            .cloned()
            .collect())
    }

    async fn user(&self, id: Id) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn mark_email_verified(&self, user: Id, at: DateTime<Utc>) -> Result<()> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(&user)
            .ok_or_else(|| Error::not_found(format!("User {user}")))?;
        user.email_verified = Some(mongodb::bson::DateTime::from_chrono(at));
        Ok(())
    }
}
