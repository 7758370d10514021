//! Which transitions an election has already completed.
//!
//! There is no separate run log: completion is read back from business
//! state. An election has opened once its publicity left `Private`, and has
//! closed once a generated result exists for it.

use std::sync::Arc;

use crate::{
    error::Result,
    model::{common::Publicity, db::Election},
    store::Store,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completed {
    Opened,
    Closed,
}

pub struct Ledger {
    store: Arc<dyn Store>,
}

impl Ledger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Has `election` already completed the given transition?
    pub async fn has_completed(&self, election: &Election, transition: Completed) -> Result<bool> {
        match transition {
            Completed::Opened => Ok(election.publicity != Publicity::Private),
            Completed::Closed => self.store.result_exists(election.id).await,
        }
    }
}
