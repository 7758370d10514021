//! Invitation dispatch for elections that are opening.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use log::{debug, info, warn};
use rocket::futures::{stream, StreamExt};
use serde::Serialize;

use crate::{
    error::Result,
    lifecycle::clock::OrgClock,
    mail::{Invitation, Mailer},
    model::{
        common::{TokenOwner, TokenType, VoterStatus},
        db::{Election, InvitedVoter, VerificationToken},
        mongodb::Id,
    },
    store::Store,
};

/// Outcome of dispatching invitations for one election.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InvitationReport {
    /// Voters moved to `Invited` by this dispatch.
    pub invited_count: usize,
    /// Voters whose invitation could not be delivered. They stay `Added`.
    pub failures: Vec<Id>,
}

pub struct InvitationDispatcher {
    store: Arc<dyn Store>,
    mailer: Arc<dyn Mailer>,
    clock: OrgClock,
    site_url: String,
    concurrency: usize,
}

impl InvitationDispatcher {
    pub fn new(
        store: Arc<dyn Store>,
        mailer: Arc<dyn Mailer>,
        clock: OrgClock,
        site_url: String,
        concurrency: usize,
    ) -> Self {
        Self {
            store,
            mailer,
            clock,
            site_url,
            concurrency: concurrency.max(1),
        }
    }

    /// Invite every voter of `election` still in `Added`.
    ///
    /// A voter whose attempt failed at any step, including issuing the
    /// token, is still `Added` and is picked up by the next call.
    pub async fn invite_voters(&self, election: &Election) -> Result<InvitationReport> {
        let voters = self
            .store
            .voters_with_status(election.id, VoterStatus::Added)
            .await?;
        self.dispatch(election, voters).await
    }

    async fn dispatch(
        &self,
        election: &Election,
        voters: Vec<InvitedVoter>,
    ) -> Result<InvitationReport> {
        let mut report = InvitationReport::default();
        if voters.is_empty() {
            debug!("No voters to invite for election {}", election.id);
            return Ok(report);
        }
        let closes_at = self.clock.close_instant(election)?;

        let outcomes: Vec<(Id, Result<bool>)> = stream::iter(voters)
            .map(|voter| async move {
                let outcome = self.invite(election, &voter, closes_at).await;
                (voter.id, outcome)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for (voter, outcome) in outcomes {
            match outcome {
                Ok(true) => report.invited_count += 1,
                Ok(false) => debug!("Voter {voter} was invited concurrently"),
                Err(e) => {
                    warn!("Failed to invite voter {voter} to election {}: {e}", election.id);
                    report.failures.push(voter);
                }
            }
        }
        report.failures.sort();

        info!(
            "Invited {} voters to election {}, {} failed",
            report.invited_count,
            election.id,
            report.failures.len()
        );
        Ok(report)
    }

    /// Issue a token, send the invitation and only then mark the voter invited.
    /// Returns whether this call moved the voter to `Invited`.
    async fn invite(
        &self,
        election: &Election,
        voter: &InvitedVoter,
        closes_at: DateTime<Tz>,
    ) -> Result<bool> {
        let token = VerificationToken::new(
            TokenType::ElectionInvitation,
            TokenOwner::InvitedVoter(voter.id),
            closes_at.with_timezone(&Utc),
        );
        self.store.insert_token(&token).await?;

        let invitation = Invitation {
            token: &token.id,
            election_name: &election.name,
            closes_at,
        };
        self.mailer
            .send(
                &voter.email,
                &invitation.subject(),
                &invitation.body(&self.site_url),
            )
            .await?;

        // A crash between the send and this write re-sends the email next
        // tick. That is accepted; never sending it is not.
        self.store
            .update_voter_status(voter.id, VoterStatus::Added, VoterStatus::Invited)
            .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::{lifecycle::testing::FakeMailer, store::MemoryStore};

    async fn setup(failing: &[&str]) -> (Arc<MemoryStore>, Arc<FakeMailer>, InvitationDispatcher) {
        let store = Arc::new(MemoryStore::new());
        let mailer = Arc::new(FakeMailer::failing_for(failing));
        let dispatcher = InvitationDispatcher::new(
            store.clone(),
            mailer.clone(),
            OrgClock::new(chrono_tz::Asia::Manila),
            "https://eboto.example".to_string(),
            4,
        );
        (store, mailer, dispatcher)
    }

    #[rocket::async_test]
    async fn failed_sends_leave_voters_added() {
        let (store, mailer, dispatcher) = setup(&["c@example.com"]).await;
        let election = Election::example();
        store.insert_election(election.clone()).await;
        for email in ["a@example.com", "b@example.com", "c@example.com"] {
            store.insert_voter(InvitedVoter::new(election.id, email)).await;
        }

        let report = dispatcher.invite_voters(&election).await.unwrap();

        assert_eq!(report.invited_count, 2);
        assert_eq!(report.failures.len(), 1);
        let still_added = store
            .voters_with_status(election.id, VoterStatus::Added)
            .await
            .unwrap();
        assert_eq!(still_added.len(), 1);
        assert_eq!(still_added[0].email, "c@example.com");
        assert_eq!(report.failures, vec![still_added[0].id]);
        assert_eq!(mailer.sent_to().len(), 2);
    }

    #[rocket::async_test]
    async fn tokens_expire_when_voting_closes() {
        let (store, _, dispatcher) = setup(&[]).await;
        let election = Election::example();
        let voter = InvitedVoter::new(election.id, "a@example.com");
        store.insert_voter(voter.clone()).await;

        dispatcher.invite_voters(&election).await.unwrap();

        let tokens = store
            .tokens_owned_by(TokenOwner::InvitedVoter(voter.id))
            .await;
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenType::ElectionInvitation);
        assert_eq!(
            tokens[0].expires_at,
            Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap()
        );
    }

    #[rocket::async_test]
    async fn invited_voters_are_not_emailed_again() {
        let (store, mailer, dispatcher) = setup(&[]).await;
        let election = Election::example();
        store.insert_voter(InvitedVoter::new(election.id, "a@example.com")).await;

        dispatcher.invite_voters(&election).await.unwrap();
        let second = dispatcher.invite_voters(&election).await.unwrap();

        assert_eq!(second, InvitationReport::default());
        assert_eq!(mailer.sent_to(), vec!["a@example.com".to_string()]);
    }

    #[rocket::async_test]
    async fn voters_whose_token_was_not_issued_are_invited_later() {
        let (store, mailer, dispatcher) = setup(&[]).await;
        let election = Election::example();
        store.insert_voter(InvitedVoter::new(election.id, "a@example.com")).await;
        store.fail_token_inserts(1);

        let first = dispatcher.invite_voters(&election).await.unwrap();
        assert_eq!(first.invited_count, 0);
        assert_eq!(first.failures.len(), 1);
        assert!(mailer.sent_to().is_empty());

        let second = dispatcher.invite_voters(&election).await.unwrap();
        assert_eq!(second.invited_count, 1);
        assert!(second.failures.is_empty());
        assert_eq!(mailer.sent_to(), vec!["a@example.com".to_string()]);
    }
}
