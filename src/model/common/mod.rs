mod election;
mod token;
mod voter;

pub use election::Publicity;
pub use token::{TokenOwner, TokenType};
pub use voter::VoterStatus;
