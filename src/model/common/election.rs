use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

/// Who can see an election. The lifecycle only ever moves an election
/// forward from `Private` to `Voter`; being closed is tracked by the
/// existence of a generated result rather than by this field.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Publicity {
    /// Only visible to commissioners; voting has not opened yet.
    Private,
    /// Visible to invited voters; voting is open.
    Voter,
    /// Visible to everyone.
    Public,
}

impl From<Publicity> for Bson {
    fn from(publicity: Publicity) -> Self {
        to_bson(&publicity).expect("Serialisation is infallible")
    }
}
