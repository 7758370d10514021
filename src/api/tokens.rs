use std::sync::Arc;

use chrono::Utc;
use rocket::{get, routes, serde::json::Json, FromForm, Route, State};

use crate::{
    error::{Error, Result},
    model::{api::InvitationDescription, common::TokenType, db::TokenId},
    store::Store,
    tokens::{lookup_invitation, verify_account_token},
};

pub fn routes() -> Vec<Route> {
    routes![verify_token, invitation]
}

#[derive(FromForm)]
struct VerifyQuery {
    #[field(name = "type")]
    kind: Option<TokenType>,
    token: Option<String>,
}

#[get("/tokens/verify?<query..>")]
async fn verify_token(
    query: VerifyQuery,
    store: &State<Arc<dyn Store>>,
) -> Result<Json<TokenType>> {
    let kind = query
        .kind
        .ok_or_else(|| Error::BadRequest("Type is required".to_string()))?;
    let token = query
        .token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| Error::BadRequest("Token is required".to_string()))?;
    let verified = verify_account_token(
        store.inner().as_ref(),
        kind,
        &TokenId::from(token),
        Utc::now(),
    )
    .await?;
    Ok(Json(verified))
}

#[get("/tokens/<token>/invitation?<email>")]
async fn invitation(
    token: TokenId,
    email: Option<String>,
    store: &State<Arc<dyn Store>>,
) -> Result<Json<InvitationDescription>> {
    let email = email.ok_or_else(|| Error::BadRequest("Email is required".to_string()))?;
    let found = lookup_invitation(store.inner().as_ref(), &token, &email, Utc::now()).await?;
    Ok(Json(found))
}
