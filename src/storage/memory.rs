//! In-process backing for ephemeral masters and tests

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::models::{CredentialRecord, NodeRecord};
use super::persistence::{Persistence, PersistenceError};

#[derive(Debug, Default)]
pub struct MemoryStore {
    credentials: Mutex<Vec<CredentialRecord>>,
    failing: AtomicBool,
    nodes: Mutex<Vec<NodeRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail with `PersistenceError::Unavailable`.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), PersistenceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable(
                "memory store is failing".to_string(),
            ));
        }
        Ok(())
    }
}

fn upsert_by<T: Clone>(
    records: &Mutex<Vec<T>>,
    record: &T,
    same_key: impl Fn(&T) -> bool,
) -> Result<(), PersistenceError> {
    let mut records = records
        .lock()
        .map_err(|_| PersistenceError::Unavailable("lock poisoned".to_string()))?;

    match records.iter_mut().find(|existing| same_key(existing)) {
        Some(existing) => *existing = record.clone(),
        None => records.push(record.clone()),
    }
    Ok(())
}

fn load_all<T: Clone>(records: &Mutex<Vec<T>>) -> Result<Vec<T>, PersistenceError> {
    records
        .lock()
        .map(|records| records.clone())
        .map_err(|_| PersistenceError::Unavailable("lock poisoned".to_string()))
}

impl Persistence for MemoryStore {
    fn load_credentials(&self) -> Result<Vec<CredentialRecord>, PersistenceError> {
        self.check()?;
        load_all(&self.credentials)
    }

    fn upsert_credential(&self, record: &CredentialRecord) -> Result<(), PersistenceError> {
        self.check()?;
        upsert_by(&self.credentials, record, |r| r.identity == record.identity)
    }

    fn load_nodes(&self) -> Result<Vec<NodeRecord>, PersistenceError> {
        self.check()?;
        load_all(&self.nodes)
    }

    fn upsert_node(&self, record: &NodeRecord) -> Result<(), PersistenceError> {
        self.check()?;
        upsert_by(&self.nodes, record, |r| r.name == record.name)
    }
}
