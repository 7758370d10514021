use data_encoding::BASE64URL_NOPAD;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use log::warn;
use rocket::{
    data::{self, Data, FromData, ToByteUnit},
    http::Status,
    outcome::Outcome,
    Request,
};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::{config::Config, error::Error};

/// Header carrying the trigger's signed JWT.
pub const SIGNATURE_HEADER: &str = "Upstash-Signature";

const ISSUER: &str = "Upstash";

/// Claims we read ourselves; `exp`, `nbf`, `iss` and `sub` are checked by
/// the validation.
#[derive(Deserialize)]
struct Claims {
    /// Base64url SHA-256 of the request body.
    body: String,
}

/// Check that `signature` was issued by the trigger for exactly `body`.
/// Either of the configured signing keys is accepted.
pub fn verify_signature(config: &Config, signature: &str, body: &[u8]) -> Result<(), Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.set_required_spec_claims(&["exp", "nbf", "iss"]);
    validation.validate_nbf = true;
    validation.sub = config.trigger_url().map(str::to_string);

    let mut rejection = None;
    for key in config.trigger_signing_keys() {
        match jsonwebtoken::decode::<Claims>(signature, &DecodingKey::from_secret(key), &validation)
        {
            Ok(token) => {
                let expected = BASE64URL_NOPAD.encode(&Sha256::digest(body));
                return if token.claims.body.trim_end_matches('=') == expected {
                    Ok(())
                } else {
                    Err(Error::Unauthorized("Body does not match signature".to_string()))
                };
            }
            Err(e) => rejection = Some(e),
        }
    }
    Err(Error::Unauthorized(match rejection {
        Some(e) => format!("Invalid signature: {e}"),
        None => "No signing keys".to_string(),
    }))
}

/// A trigger request whose signature covers its body.
///
/// The body itself carries nothing the tick needs, so it is discarded after
/// verification.
#[derive(Debug)]
pub struct SignedTrigger;

#[rocket::async_trait]
impl<'r> FromData<'r> for SignedTrigger {
    type Error = Error;

    async fn from_data(req: &'r Request<'_>, data: Data<'r>) -> data::Outcome<'r, Self> {
        let config = match req.rocket().state::<Config>() {
            Some(config) => config,
            None => {
                return Outcome::Failure((
                    Status::InternalServerError,
                    Error::Inconsistent("Config is not managed".to_string()),
                ))
            }
        };
        let signature = match req.headers().get_one(SIGNATURE_HEADER) {
            Some(signature) => signature.to_string(),
            None => {
                warn!("Trigger request without {SIGNATURE_HEADER}");
                return Outcome::Failure((
                    Status::Unauthorized,
                    Error::Unauthorized(format!("Missing {SIGNATURE_HEADER}")),
                ));
            }
        };

        let limit = req.limits().get("trigger").unwrap_or_else(|| 64.kibibytes());
        let body = match data.open(limit).into_bytes().await {
            Ok(body) if body.is_complete() => body.into_inner(),
            Ok(_) => {
                return Outcome::Failure((
                    Status::PayloadTooLarge,
                    Error::BadRequest("Trigger body too large".to_string()),
                ))
            }
            Err(e) => return Outcome::Failure((Status::BadRequest, Error::BadRequest(e.to_string()))),
        };

        match verify_signature(config, &signature, &body) {
            Ok(()) => Outcome::Success(SignedTrigger),
            Err(e) => {
                warn!("Rejected trigger request: {e}");
                Outcome::Failure((Status::Unauthorized, e))
            }
        }
    }
}

/// Sign `body` the way the trigger does. Test helper.
#[cfg(test)]
pub fn sign(key: &str, body: &[u8], claims: rocket::serde::json::Value) -> String {
    use jsonwebtoken::{EncodingKey, Header};
    use rocket::serde::json::serde_json::json;

    let now = chrono::Utc::now().timestamp();
    let mut all = json!({
        "iss": ISSUER,
        "sub": "https://eboto.example/api/do-election-processing",
        "iat": now,
        "nbf": now,
        "exp": now + 300,
        "jti": "msg_1",
        "body": BASE64URL_NOPAD.encode(&Sha256::digest(body)),
    });
    if let (Some(all), Some(overrides)) = (all.as_object_mut(), claims.as_object()) {
        for (name, value) in overrides {
            all.insert(name.clone(), value.clone());
        }
    }
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &all,
        &EncodingKey::from_secret(key.as_bytes()),
    )
    .unwrap()
}

#[cfg(test)]
mod tests {
    use data_encoding::BASE64URL;
    use rocket::serde::json::serde_json::json;

    use super::*;

    const BODY: &[u8] = b"{}";

    fn verify(signature: &str) -> Result<(), Error> {
        verify_signature(&Config::example(), signature, BODY)
    }

    #[test]
    fn accepts_current_and_next_keys() {
        verify(&sign("current-signing-key", BODY, json!({}))).unwrap();
        verify(&sign("next-signing-key", BODY, json!({}))).unwrap();
    }

    #[test]
    fn accepts_padded_body_hash() {
        let padded = BASE64URL.encode(&Sha256::digest(BODY));
        assert!(padded.ends_with('='));
        verify(&sign("current-signing-key", BODY, json!({ "body": padded }))).unwrap();
    }

    #[test]
    fn rejects_unknown_keys() {
        let signature = sign("someone-else", BODY, json!({}));
        assert!(matches!(verify(&signature), Err(Error::Unauthorized(_))));
    }

    #[test]
    fn rejects_other_bodies() {
        let signature = sign("current-signing-key", b"{\"a\":1}", json!({}));
        assert!(matches!(verify(&signature), Err(Error::Unauthorized(_))));
    }

    #[test]
    fn rejects_bad_claims() {
        let now = chrono::Utc::now().timestamp();
        for claims in [
            json!({ "iss": "Someone" }),
            json!({ "exp": now - 3600, "nbf": now - 7200 }),
            json!({ "nbf": now + 3600, "exp": now + 7200 }),
            json!({ "sub": "https://elsewhere.example/" }),
        ] {
            let signature = sign("current-signing-key", BODY, claims.clone());
            assert!(
                matches!(verify(&signature), Err(Error::Unauthorized(_))),
                "accepted {claims}"
            );
        }
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(verify("not.a.jwt"), Err(Error::Unauthorized(_))));
    }
}
