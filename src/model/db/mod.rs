//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in a DB-friendly way, e.g.:
//!
//! - IDs and instants are serialised in MongoDB's own format.
//! - Civil dates are serialised as `YYYY-MM-DD` strings, so they can be
//!   matched by equality.

mod commissioner;
pub use commissioner::InvitedCommissioner;

mod election;
pub use election::Election;

mod position;
pub use position::{Candidate, Partylist, Position};

mod result;
pub use result::GeneratedElectionResult;

mod token;
pub use token::{TokenId, VerificationToken};

mod user;
pub use user::User;

mod vote;
pub use vote::Vote;

mod voter;
pub use voter::InvitedVoter;
