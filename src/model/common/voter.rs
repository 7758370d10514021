use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

/// Invitation progress of a voter. Only ever moves forward.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoterStatus {
    Added,
    Invited,
    Accepted,
}

impl VoterStatus {
    /// Can a voter in this status be moved to `next`?
    pub fn can_advance_to(self, next: VoterStatus) -> bool {
        next > self
    }
}

impl From<VoterStatus> for Bson {
    fn from(status: VoterStatus) -> Self {
        to_bson(&status).expect("Serialisation is infallible")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_only_moves_forward() {
        assert!(VoterStatus::Added.can_advance_to(VoterStatus::Invited));
        assert!(VoterStatus::Invited.can_advance_to(VoterStatus::Accepted));
        assert!(!VoterStatus::Invited.can_advance_to(VoterStatus::Added));
        assert!(!VoterStatus::Invited.can_advance_to(VoterStatus::Invited));
    }
}
