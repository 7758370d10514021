use mongodb::error::Error as DbError;
use rocket::{http::Status, response::Responder};
use thiserror::Error;

use crate::{mail::DeliveryError, model::mongodb::Id, storage::StorageError};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("Invitation delivery failed: {0}")]
    Delivery(#[from] DeliveryError),
    #[error("Result upload failed: {0}")]
    Storage(#[from] StorageError),
    /// The election's schedule violates its invariants; processing it would
    /// corrupt the lifecycle.
    #[error("Invalid schedule for election {election}: {reason}")]
    Schedule { election: Id, reason: String },
    #[error("Inconsistent data: {0}")]
    Inconsistent(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn schedule(election: Id, reason: impl Into<String>) -> Self {
        Self::Schedule {
            election,
            reason: reason.into(),
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, _: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        Err(match self {
            Self::BadRequest(_) => Status::BadRequest,
            Self::Unauthorized(_) => Status::Unauthorized,
            Self::Forbidden(_) => Status::Forbidden,
            Self::NotFound(_) => Status::NotFound,
            Self::Db(_)
            | Self::Delivery(_)
            | Self::Storage(_)
            | Self::Schedule { .. }
            | Self::Inconsistent(_) => Status::InternalServerError,
        })
    }
}
