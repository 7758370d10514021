//! The I/O half of the lifecycle: one tick gathers candidate elections,
//! asks [`decide`] what each needs and carries that out.

use std::{collections::BTreeMap, sync::Arc};

use chrono::{DateTime, Utc};
use log::{error, info, trace, warn};
use serde::Serialize;

use crate::{
    error::{Error, Result},
    lifecycle::{
        clock::{CivilHour, OrgClock},
        decision::{decide, ElectionSnapshot, Transition},
        dispatcher::{InvitationDispatcher, InvitationReport},
        ledger::{Completed, Ledger},
        result::ResultGenerator,
    },
    mail::Mailer,
    model::{common::Publicity, db::Election, mongodb::Id},
    storage::DocumentStore,
    store::Store,
};

/// How invitations are sent.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Base URL of the voting site, used for invitation links.
    pub site_url: String,
    /// Maximum concurrent sends per election.
    pub concurrency: usize,
}

/// An election whose processing failed this tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElectionFailure {
    pub election: Id,
    pub error: String,
}

/// Aggregate outcome of one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Elections moved from `Private` to `Voter`.
    pub opened: usize,
    /// Open elections whose failed invitations were re-sent.
    pub retried: usize,
    /// Elections whose result was generated.
    pub closed: usize,
    pub invitations_sent: usize,
    pub invitation_failures: usize,
    pub failures: Vec<ElectionFailure>,
}

impl TickReport {
    fn record_invitations(&mut self, invitations: &InvitationReport) {
        self.invitations_sent += invitations.invited_count;
        self.invitation_failures += invitations.failures.len();
    }

    fn record_failure(&mut self, election: Id, err: Error) {
        error!("Processing election {election} failed: {err}");
        self.failures.push(ElectionFailure {
            election,
            error: err.to_string(),
        });
    }
}

pub struct LifecycleEngine {
    store: Arc<dyn Store>,
    clock: OrgClock,
    ledger: Ledger,
    dispatcher: InvitationDispatcher,
    generator: ResultGenerator,
}

impl LifecycleEngine {
    pub fn new(
        store: Arc<dyn Store>,
        mailer: Arc<dyn Mailer>,
        storage: Arc<dyn DocumentStore>,
        clock: OrgClock,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            ledger: Ledger::new(store.clone()),
            dispatcher: InvitationDispatcher::new(
                store.clone(),
                mailer,
                clock,
                settings.site_url,
                settings.concurrency,
            ),
            generator: ResultGenerator::new(store.clone(), storage, clock),
            store,
            clock,
        }
    }

    pub fn clock(&self) -> OrgClock {
        self.clock
    }

    /// Run one tick at `now`.
    ///
    /// Failures of individual elections are recorded in the report. Only a
    /// failure to list the candidate elections fails the tick.
    pub async fn process_tick(&self, now: DateTime<Utc>) -> Result<TickReport> {
        let civil = self.clock.resolve(now);
        info!(
            "Processing tick for {} {:02}:00 {}",
            civil.date,
            civil.hour,
            self.clock.timezone().name()
        );

        let mut report = TickReport::default();
        let mut openings = Vec::new();
        let mut closings = Vec::new();
        for election in self.candidates(&civil).await? {
            match self.plan(&civil, &election).await {
                Ok(Transition::Open) => openings.push((election, Transition::Open)),
                Ok(Transition::RetryInvitations) => {
                    openings.push((election, Transition::RetryInvitations))
                }
                Ok(Transition::Close) => closings.push(election),
                Ok(Transition::None) => trace!("Nothing to do for election {}", election.id),
                Err(err) => report.record_failure(election.id, err),
            }
        }

        // Opening work always precedes closing work within a tick.
        for (election, transition) in openings {
            let outcome = if transition == Transition::Open {
                self.open(&election).await
            } else {
                self.retry(&election).await
            };
            match outcome {
                Ok((invitations, changed)) => {
                    report.record_invitations(&invitations);
                    if changed {
                        match transition {
                            Transition::Open => report.opened += 1,
                            _ => report.retried += 1,
                        }
                    }
                }
                Err(err) => report.record_failure(election.id, err),
            }
        }

        for election in closings {
            match self.generator.generate_result(&election, now).await {
                Ok(Some(_)) => report.closed += 1,
                Ok(None) => {}
                Err(err) => report.record_failure(election.id, err),
            }
        }

        info!(
            "Tick done: {} opened, {} retried, {} closed, {} invitations sent, {} failed, {} elections failed",
            report.opened,
            report.retried,
            report.closed,
            report.invitations_sent,
            report.invitation_failures,
            report.failures.len()
        );
        Ok(report)
    }

    /// The transition a tick at `now` would attempt for each candidate
    /// election, without attempting any.
    pub async fn plan_tick(&self, now: DateTime<Utc>) -> Result<Vec<(Election, Result<Transition>)>> {
        let civil = self.clock.resolve(now);
        let mut plans = Vec::new();
        for election in self.candidates(&civil).await? {
            let transition = self.plan(&civil, &election).await;
            plans.push((election, transition));
        }
        Ok(plans)
    }

    /// Elections due to open or close this hour, plus every open election
    /// whose last voting day has not passed.
    async fn candidates(&self, civil: &CivilHour) -> Result<Vec<Election>> {
        let mut candidates = BTreeMap::new();
        for election in self.store.elections_due(civil.date, civil.hour).await? {
            candidates.insert(election.id, election);
        }
        for election in self.store.elections_open_on(civil.date).await? {
            candidates.entry(election.id).or_insert(election);
        }
        Ok(candidates.into_values().collect())
    }

    async fn plan(&self, civil: &CivilHour, election: &Election) -> Result<Transition> {
        let closed = self
            .ledger
            .has_completed(election, Completed::Closed)
            .await?;
        decide(&self.clock, civil, ElectionSnapshot { election, closed })
    }

    /// Invite the added voters, then open the election whatever the
    /// individual deliveries did. Returns whether the election was opened
    /// by this call.
    async fn open(&self, election: &Election) -> Result<(InvitationReport, bool)> {
        let invitations = self.dispatcher.invite_voters(election).await?;
        if self.ledger.has_completed(election, Completed::Opened).await? {
            trace!("Election {} is already open", election.id);
            return Ok((invitations, false));
        }
        let opened = self
            .store
            .update_publicity(election.id, Publicity::Private, Publicity::Voter)
            .await?;
        if opened {
            info!("Opened election {} ({})", election.id, election.slug);
        } else {
            warn!("Election {} left Private concurrently", election.id);
        }
        Ok((invitations, opened))
    }

    /// Invite whoever is still `Added`. Returns whether there was anyone.
    async fn retry(&self, election: &Election) -> Result<(InvitationReport, bool)> {
        let invitations = self.dispatcher.invite_voters(election).await?;
        let attempted = invitations.invited_count + invitations.failures.len() > 0;
        Ok((invitations, attempted))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::{
        lifecycle::testing::{FakeMailer, FakeStorage},
        model::{
            common::{TokenOwner, TokenType, VoterStatus},
            db::{Candidate, GeneratedElectionResult, InvitedVoter, Partylist, Position, Vote},
        },
        store::MemoryStore,
    };

    struct Harness {
        store: Arc<MemoryStore>,
        mailer: Arc<FakeMailer>,
        storage: Arc<FakeStorage>,
        engine: LifecycleEngine,
    }

    fn harness(failing: &[&str]) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let mailer = Arc::new(FakeMailer::failing_for(failing));
        let storage = Arc::new(FakeStorage::default());
        let engine = LifecycleEngine::new(
            store.clone(),
            mailer.clone(),
            storage.clone(),
            OrgClock::new(chrono_tz::Asia::Manila),
            DispatchSettings {
                site_url: "https://eboto.example".to_string(),
                concurrency: 2,
            },
        );
        Harness {
            store,
            mailer,
            storage,
            engine,
        }
    }

    /// 08:00 on 2024-06-01 in Manila.
    fn opening_hour() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    /// 17:00 on 2024-06-03 in Manila.
    fn closing_hour() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap()
    }

    async fn with_voters(h: &Harness, election: &Election, emails: &[&str]) {
        h.store.insert_election(election.clone()).await;
        for email in emails {
            h.store.insert_voter(InvitedVoter::new(election.id, *email)).await;
        }
    }

    async fn voters(h: &Harness, election: Id, status: VoterStatus) -> Vec<String> {
        let mut emails: Vec<String> = h
            .store
            .voters_with_status(election, status)
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.email)
            .collect();
        emails.sort();
        emails
    }

    #[rocket::async_test]
    async fn opening_with_one_failed_send() {
        let h = harness(&["c@example.com"]);
        let election = Election::example();
        with_voters(&h, &election, &["a@example.com", "b@example.com", "c@example.com"]).await;

        let report = h.engine.process_tick(opening_hour()).await.unwrap();

        assert_eq!(report.opened, 1);
        assert_eq!(report.invitations_sent, 2);
        assert_eq!(report.invitation_failures, 1);
        assert!(report.failures.is_empty());
        assert_eq!(
            voters(&h, election.id, VoterStatus::Invited).await,
            vec!["a@example.com", "b@example.com"]
        );
        assert_eq!(
            voters(&h, election.id, VoterStatus::Added).await,
            vec!["c@example.com"]
        );
        let stored = h.store.election(election.id).await.unwrap().unwrap();
        assert_eq!(stored.publicity, Publicity::Voter);
    }

    #[rocket::async_test]
    async fn invited_voters_hold_unexpired_tokens() {
        let h = harness(&[]);
        let election = Election::example();
        with_voters(&h, &election, &["a@example.com"]).await;

        h.engine.process_tick(opening_hour()).await.unwrap();

        let voter = &h
            .store
            .voters_with_status(election.id, VoterStatus::Invited)
            .await
            .unwrap()[0];
        let tokens = h
            .store
            .tokens_owned_by(TokenOwner::InvitedVoter(voter.id))
            .await;
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenType::ElectionInvitation);
        assert!(!tokens[0].is_expired(opening_hour()));
        assert_eq!(tokens[0].expires_at, closing_hour());
    }

    #[rocket::async_test]
    async fn repeated_tick_in_same_hour_changes_nothing() {
        let h = harness(&[]);
        let election = Election::example();
        with_voters(&h, &election, &["a@example.com", "b@example.com"]).await;

        let first = h.engine.process_tick(opening_hour()).await.unwrap();
        let second = h.engine.process_tick(opening_hour()).await.unwrap();

        assert_eq!(first.invitations_sent, 2);
        assert_eq!(second, TickReport::default());
        assert_eq!(h.mailer.sent_to().len(), 2);
    }

    #[rocket::async_test]
    async fn failed_invitations_are_retried_on_later_ticks() {
        let h = harness(&["c@example.com"]);
        let election = Election::example();
        with_voters(&h, &election, &["a@example.com", "c@example.com"]).await;
        h.engine.process_tick(opening_hour()).await.unwrap();

        h.mailer.recover();
        let later = opening_hour() + chrono::Duration::hours(1);
        let report = h.engine.process_tick(later).await.unwrap();

        assert_eq!(report.retried, 1);
        assert_eq!(report.invitations_sent, 1);
        assert!(voters(&h, election.id, VoterStatus::Added).await.is_empty());
        assert_eq!(h.mailer.sent_to(), vec!["a@example.com", "c@example.com"]);
    }

    #[rocket::async_test]
    async fn voters_missed_by_a_failed_token_insert_are_invited_next_tick() {
        let h = harness(&[]);
        let election = Election::example();
        with_voters(&h, &election, &["a@example.com", "b@example.com"]).await;
        h.store.fail_token_inserts(1);

        let opening = h.engine.process_tick(opening_hour()).await.unwrap();
        assert_eq!(opening.opened, 1);
        assert_eq!(opening.invitations_sent, 1);
        assert_eq!(opening.invitation_failures, 1);

        let later = opening_hour() + chrono::Duration::hours(1);
        let report = h.engine.process_tick(later).await.unwrap();

        assert_eq!(report.retried, 1);
        assert_eq!(report.invitations_sent, 1);
        assert!(voters(&h, election.id, VoterStatus::Added).await.is_empty());
        assert_eq!(h.mailer.sent_to(), vec!["a@example.com", "b@example.com"]);
    }

    #[rocket::async_test]
    async fn voters_added_after_opening_are_invited_next_tick() {
        let h = harness(&[]);
        let election = Election::example();
        with_voters(&h, &election, &["a@example.com"]).await;
        h.engine.process_tick(opening_hour()).await.unwrap();
        h.store.insert_voter(InvitedVoter::new(election.id, "late@example.com")).await;

        let later = opening_hour() + chrono::Duration::hours(1);
        let report = h.engine.process_tick(later).await.unwrap();

        assert_eq!(report.invitations_sent, 1);
        assert_eq!(h.mailer.sent_to(), vec!["a@example.com", "late@example.com"]);
    }

    #[rocket::async_test]
    async fn public_elections_keep_retrying_failed_invitations() {
        let h = harness(&["a@example.com"]);
        let election = Election::example();
        with_voters(&h, &election, &["a@example.com"]).await;
        h.engine.process_tick(opening_hour()).await.unwrap();
        h.store
            .update_publicity(election.id, Publicity::Voter, Publicity::Public)
            .await
            .unwrap();

        h.mailer.recover();
        let later = opening_hour() + chrono::Duration::hours(1);
        let report = h.engine.process_tick(later).await.unwrap();

        assert_eq!(report.retried, 1);
        assert_eq!(h.mailer.sent_to(), vec!["a@example.com"]);
    }

    #[rocket::async_test]
    async fn elections_past_their_last_day_are_not_candidates() {
        let h = harness(&[]);
        let mut election = Election::example();
        election.publicity = Publicity::Voter;
        h.store.insert_election(election.clone()).await;
        let result = GeneratedElectionResult::new(
            "result.pdf".to_string(),
            "https://storage.example/result.pdf".to_string(),
            election.id,
            closing_hour(),
        );
        h.store.insert_result(&result).await.unwrap();

        let on_last_day = h.engine.plan_tick(closing_hour()).await.unwrap();
        assert_eq!(on_last_day.len(), 1);

        let years_later = Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap();
        assert!(h.engine.plan_tick(years_later).await.unwrap().is_empty());
    }

    #[rocket::async_test]
    async fn closing_generates_exactly_one_result() {
        let h = harness(&[]);
        let mut election = Election::example();
        election.publicity = Publicity::Voter;
        h.store.insert_election(election.clone()).await;
        let partylist = Partylist {
            id: Id::new(),
            election_id: election.id,
            name: "Independent".to_string(),
            acronym: "IND".to_string(),
        };
        let position = Position {
            id: Id::new(),
            election_id: election.id,
            name: "President".to_string(),
            order: 0,
        };
        let candidate = Candidate {
            id: Id::new(),
            election_id: election.id,
            position_id: position.id,
            partylist_id: partylist.id,
            first_name: "Juan".to_string(),
            middle_name: None,
            last_name: "Dela Cruz".to_string(),
        };
        h.store
            .insert_vote(Vote {
                id: Id::new(),
                election_id: election.id,
                voter_id: Id::new(),
                position_id: position.id,
                candidate_id: Some(candidate.id),
            })
            .await;
        h.store.insert_partylist(partylist).await;
        h.store.insert_position(position).await;
        h.store.insert_candidate(candidate).await;

        let first = h.engine.process_tick(closing_hour()).await.unwrap();
        let second = h.engine.process_tick(closing_hour()).await.unwrap();

        assert_eq!(first.closed, 1);
        assert_eq!(second.closed, 0);
        assert_eq!(h.store.results(election.id).await.unwrap().len(), 1);
        assert_eq!(h.storage.uploads().len(), 1);
    }

    #[rocket::async_test]
    async fn closing_an_already_closed_election_is_a_no_op() {
        let h = harness(&[]);
        let mut election = Election::example();
        election.publicity = Publicity::Voter;
        with_voters(&h, &election, &["a@example.com"]).await;
        let existing = GeneratedElectionResult::new(
            "earlier.pdf".to_string(),
            "https://storage.example/earlier.pdf".to_string(),
            election.id,
            closing_hour(),
        );
        h.store.insert_result(&existing).await.unwrap();

        let report = h.engine.process_tick(closing_hour()).await.unwrap();

        assert_eq!(report, TickReport::default());
        assert_eq!(h.store.results(election.id).await.unwrap(), vec![existing]);
        assert!(h.storage.uploads().is_empty());
        assert!(h.mailer.sent_to().is_empty());
    }

    #[rocket::async_test]
    async fn one_broken_election_does_not_stop_the_tick() {
        let h = harness(&[]);
        let mut broken = Election::example();
        broken.slug = "broken".to_string();
        broken.voting_end = 7;
        let healthy = Election::example();
        with_voters(&h, &broken, &["x@example.com"]).await;
        with_voters(&h, &healthy, &["a@example.com"]).await;

        let report = h.engine.process_tick(opening_hour()).await.unwrap();

        assert_eq!(report.opened, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].election, broken.id);
        assert_eq!(h.mailer.sent_to(), vec!["a@example.com"]);
    }

    #[rocket::async_test]
    async fn planning_has_no_side_effects() {
        let h = harness(&[]);
        let election = Election::example();
        with_voters(&h, &election, &["a@example.com"]).await;

        let plans = h.engine.plan_tick(opening_hour()).await.unwrap();

        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].0.id, election.id);
        assert_eq!(plans[0].1.as_ref().unwrap(), &Transition::Open);
        assert!(h.mailer.sent_to().is_empty());
        assert_eq!(
            voters(&h, election.id, VoterStatus::Added).await,
            vec!["a@example.com"]
        );
    }

    #[rocket::async_test]
    async fn ticks_outside_scheduled_hours_do_nothing() {
        let h = harness(&[]);
        let election = Election::example();
        with_voters(&h, &election, &["a@example.com"]).await;

        let report = h
            .engine
            .process_tick(opening_hour() - chrono::Duration::hours(1))
            .await
            .unwrap();

        assert_eq!(report, TickReport::default());
        assert!(h.mailer.sent_to().is_empty());
    }
}
