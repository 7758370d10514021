//! Result generation for closing elections.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use log::{debug, info};

use crate::{
    error::Result,
    lifecycle::{clock::OrgClock, render::render_result, tally::tally},
    model::{
        db::{Election, GeneratedElectionResult},
        mongodb::Id,
    },
    storage::DocumentStore,
    store::Store,
};

pub struct ResultGenerator {
    store: Arc<dyn Store>,
    storage: Arc<dyn DocumentStore>,
    clock: OrgClock,
}

impl ResultGenerator {
    pub fn new(store: Arc<dyn Store>, storage: Arc<dyn DocumentStore>, clock: OrgClock) -> Self {
        Self {
            store,
            storage,
            clock,
        }
    }

    /// Tally `election`, upload the result document and record it.
    ///
    /// Returns `None` if the election already had a result, including one
    /// recorded concurrently while this call was rendering. The document
    /// uploaded by a losing call is left in storage unreferenced.
    pub async fn generate_result(
        &self,
        election: &Election,
        now: DateTime<Utc>,
    ) -> Result<Option<GeneratedElectionResult>> {
        if self.store.result_exists(election.id).await? {
            debug!("Election {} already has a result", election.id);
            return Ok(None);
        }

        let closes_at = self.clock.close_instant(election)?;
        let ballot_box = self.store.ballot_box(election.id).await?;
        let tally = tally(&ballot_box)?;
        let document = render_result(election, &tally, closes_at);

        let name = result_file_name(&election.name, now.with_timezone(&self.clock.timezone()));
        let path = result_path(election.id, &name);
        let link = self.storage.upload(&path, document).await?;

        let result = GeneratedElectionResult::new(name, link, election.id, now);
        if self.store.insert_result(&result).await? {
            info!(
                "Generated result {} for election {} ({} votes)",
                result.id,
                election.id,
                tally.total_votes()
            );
            Ok(Some(result))
        } else {
            info!(
                "Result for election {} was recorded concurrently, discarding {}",
                election.id, result.link
            );
            Ok(None)
        }
    }
}

/// `{timestamp_ms} - {name} (Result) ({Www Mmm dd yyyy}).pdf`
pub fn result_file_name(election_name: &str, now: DateTime<Tz>) -> String {
    format!(
        "{} - {} (Result) ({}).pdf",
        now.timestamp_millis(),
        election_name,
        now.format("%a %b %d %Y")
    )
}

pub fn result_path(election: Id, file_name: &str) -> String {
    format!("elections/{election}/results/{file_name}")
}
