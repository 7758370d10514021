use std::sync::Arc;

use rocket::{get, routes, serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    lifecycle::tally::{tally, ElectionTally},
    model::{api::ResultDescription, common::Publicity, mongodb::Id},
    store::Store,
};

pub fn routes() -> Vec<Route> {
    routes![election_results, election_tally]
}

#[get("/elections/<election_id>/results")]
async fn election_results(
    election_id: Id,
    store: &State<Arc<dyn Store>>,
) -> Result<Json<Vec<ResultDescription>>> {
    store
        .election(election_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election with ID '{election_id}'")))?;
    let results = store.results(election_id).await?;
    Ok(Json(results.into_iter().map(Into::into).collect()))
}

/// Live counts for an election that voters can see. Private elections are
/// reported as not found.
#[get("/elections/<election_id>/tally")]
async fn election_tally(
    election_id: Id,
    store: &State<Arc<dyn Store>>,
) -> Result<Json<ElectionTally>> {
    store
        .election(election_id)
        .await?
        .filter(|election| election.publicity != Publicity::Private)
        .ok_or_else(|| Error::not_found(format!("Election with ID '{election_id}'")))?;
    let ballot_box = store.ballot_box(election_id).await?;
    Ok(Json(tally(&ballot_box)?))
}
