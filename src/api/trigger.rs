use std::sync::Arc;

use chrono::Utc;
use log::info;
use rocket::{post, routes, serde::json::Json, Route, State};

use crate::{
    error::Result,
    lifecycle::{LifecycleEngine, TickReport},
    logging::RequestId,
    model::api::SignedTrigger,
};

pub fn routes() -> Vec<Route> {
    routes![do_election_processing]
}

/// Run one lifecycle tick. Responds once every due election was attempted;
/// per-election failures are in the report rather than the status.
#[post("/do-election-processing", data = "<_trigger>")]
async fn do_election_processing(
    _trigger: SignedTrigger,
    id: &RequestId,
    engine: &State<Arc<LifecycleEngine>>,
) -> Result<Json<TickReport>> {
    info!("{id} running triggered tick");
    let report = engine.process_tick(Utc::now()).await?;
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{Header, Status},
        serde::json::serde_json::json,
    };

    use super::*;
    use crate::{
        model::api::{sign, SIGNATURE_HEADER},
        test_client,
    };

    #[rocket::async_test]
    async fn signed_trigger_runs_a_tick() {
        let (client, _) = test_client().await;
        let body = r#"{"source":"schedule"}"#;
        let signature = sign("current-signing-key", body.as_bytes(), json!({}));

        let response = client
            .post("/api/do-election-processing")
            .header(Header::new(SIGNATURE_HEADER, signature))
            .body(body)
            .dispatch()
            .await;

        assert_eq!(Status::Ok, response.status());
        let report = response.into_json::<rocket::serde::json::Value>().await.unwrap();
        assert_eq!(report["opened"], 0);
        assert_eq!(report["failures"], json!([]));
    }

    #[rocket::async_test]
    async fn unsigned_trigger_is_rejected() {
        let (client, _) = test_client().await;

        let response = client
            .post("/api/do-election-processing")
            .body("{}")
            .dispatch()
            .await;

        assert_eq!(Status::Unauthorized, response.status());
    }

    #[rocket::async_test]
    async fn signature_for_another_body_is_rejected() {
        let (client, _) = test_client().await;
        let signature = sign("current-signing-key", b"{}", json!({}));

        let response = client
            .post("/api/do-election-processing")
            .header(Header::new(SIGNATURE_HEADER, signature))
            .body("{\"forged\":true}")
            .dispatch()
            .await;

        assert_eq!(Status::Unauthorized, response.status());
    }
}
