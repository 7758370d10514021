//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - IDs are serialised as hex strings.
//! - Datetimes are serialised as RFC 3339 strings.

mod election;
mod id;
mod result;
mod token;
mod trigger;

pub use election::ElectionDescription;
pub use id::ApiId;
pub use result::ResultDescription;
pub use token::InvitationDescription;
pub use trigger::{verify_signature, SignedTrigger, SIGNATURE_HEADER};
#[cfg(test)]
pub use trigger::sign;
