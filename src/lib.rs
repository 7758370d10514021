use rocket::{Build, Rocket};

use crate::{
    config::{CollaboratorFairing, ConfigFairing, DatabaseFairing},
    lifecycle::scheduler::LifecycleFairing,
    logging::LoggerFairing,
};

pub mod api;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod mail;
pub mod model;
pub mod scheduled_task;
pub mod storage;
pub mod store;
pub mod tokens;

/// Build the server. Fairings run in attachment order, and each depends on
/// the state placed by the ones before it.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/api", api::routes())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
        .attach(CollaboratorFairing)
        .attach(LifecycleFairing)
}

/// A local client over a server backed by an in-memory store and fake
/// collaborators.
#[cfg(test)]
async fn test_client() -> (
    rocket::local::asynchronous::Client,
    std::sync::Arc<store::MemoryStore>,
) {
    use std::sync::Arc;

    use crate::{
        lifecycle::testing::{FakeMailer, FakeStorage},
        mail::Mailer,
        storage::DocumentStore,
        store::{MemoryStore, Store},
    };

    let memory = Arc::new(MemoryStore::new());
    let store: Arc<dyn Store> = memory.clone();
    let mailer: Arc<dyn Mailer> = Arc::new(FakeMailer::default());
    let storage: Arc<dyn DocumentStore> = Arc::new(FakeStorage::default());
    let rocket = rocket::build()
        .mount("/api", api::routes())
        .manage(config::Config::example())
        .manage(store)
        .manage(mailer)
        .manage(storage)
        .attach(LifecycleFairing);
    let client = rocket::local::asynchronous::Client::tracked(rocket)
        .await
        .unwrap();
    (client, memory)
}
