//! Fake collaborators for lifecycle tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::{
    mail::{DeliveryError, Mailer},
    storage::{DocumentStore, StorageError},
};

/// A mailer that records recipients and rejects a configured set of them.
#[derive(Default)]
pub struct FakeMailer {
    failing: Mutex<HashSet<String>>,
    sent: Mutex<Vec<String>>,
}

impl FakeMailer {
    pub fn failing_for(recipients: &[&str]) -> Self {
        Self {
            failing: Mutex::new(recipients.iter().map(|r| r.to_string()).collect()),
            sent: Mutex::default(),
        }
    }

    /// Stop rejecting anyone.
    pub fn recover(&self) {
        self.failing.lock().unwrap().clear();
    }

    /// Every accepted recipient so far, sorted.
    pub fn sent_to(&self) -> Vec<String> {
        let mut sent = self.sent.lock().unwrap().clone();
        sent.sort();
        sent
    }
}

#[rocket::async_trait]
impl Mailer for FakeMailer {
    async fn send(&self, to: &str, _subject: &str, _body: &str) -> Result<(), DeliveryError> {
        if self.failing.lock().unwrap().contains(to) {
            return Err(DeliveryError::Rejected(503));
        }
        self.sent.lock().unwrap().push(to.to_string());
        Ok(())
    }
}

/// A document store that keeps uploads in memory.
#[derive(Default)]
pub struct FakeStorage {
    failing: AtomicBool,
    uploads: Mutex<Vec<(String, Vec<u8>)>>,
}

impl FakeStorage {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn uploads(&self) -> Vec<(String, Vec<u8>)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[rocket::async_trait]
impl DocumentStore for FakeStorage {
    async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<String, StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Rejected(500));
        }
        self.uploads.lock().unwrap().push((path.to_string(), bytes));
        Ok(format!("https://storage.example/{path}"))
    }
}
