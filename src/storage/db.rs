use redb::{
    Database as RedbDatabase, ReadTransaction, ReadableTable, TableDefinition, WriteTransaction,
};
use serde::de::DeserializeOwned;
use std::path::Path;

use super::models::{CredentialRecord, NodeRecord};
use super::persistence::{Persistence, PersistenceError};
use super::tables::*;

type SlotTable = TableDefinition<'static, u64, &'static [u8]>;
type IndexTable = TableDefinition<'static, &'static str, u64>;

/// redb-backed authoritative storage for a master node
pub struct Database {
    db: RedbDatabase,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self, PersistenceError> {
        std::fs::create_dir_all(data_dir.as_ref())?;
        let db_path = data_dir.as_ref().join("subsync.redb");
        let db = RedbDatabase::create(db_path)?;

        // Initialize tables
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(CREDENTIALS)?;
            let _ = write_txn.open_table(CREDENTIAL_INDEX)?;
            let _ = write_txn.open_table(NODES)?;
            let _ = write_txn.open_table(NODE_INDEX)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Begin a read transaction
    fn begin_read(&self) -> Result<ReadTransaction, PersistenceError> {
        Ok(self.db.begin_read()?)
    }

    /// Begin a write transaction
    fn begin_write(&self) -> Result<WriteTransaction, PersistenceError> {
        Ok(self.db.begin_write()?)
    }

    /// Read every record of a slotted table in slot order
    fn load_slotted<T: DeserializeOwned>(
        &self,
        slots: SlotTable,
    ) -> Result<Vec<T>, PersistenceError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(slots)?;

        let mut records = Vec::new();
        for result in table.iter()? {
            let (_, value) = result?;
            records.push(bincode::deserialize(value.value())?);
        }

        Ok(records)
    }

    /// Replace the record stored under `key`, or append it in a new slot.
    ///
    /// Index and slot table are updated in one write transaction.
    fn upsert_slotted(
        &self,
        index: IndexTable,
        slots: SlotTable,
        key: &str,
        data: &[u8],
    ) -> Result<(), PersistenceError> {
        let write_txn = self.begin_write()?;
        {
            let mut index_table = write_txn.open_table(index)?;
            let mut slot_table = write_txn.open_table(slots)?;

            let existing = index_table.get(key)?.map(|guard| guard.value());
            let slot = match existing {
                Some(slot) => slot,
                None => {
                    let next = slot_table
                        .last()?
                        .map(|(slot, _)| slot.value() + 1)
                        .unwrap_or(0);
                    index_table.insert(key, next)?;
                    next
                }
            };

            slot_table.insert(slot, data)?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

impl Persistence for Database {
    fn load_credentials(&self) -> Result<Vec<CredentialRecord>, PersistenceError> {
        self.load_slotted(CREDENTIALS)
    }

    fn upsert_credential(&self, record: &CredentialRecord) -> Result<(), PersistenceError> {
        let data = bincode::serialize(record)?;
        self.upsert_slotted(CREDENTIAL_INDEX, CREDENTIALS, &record.identity, &data)
    }

    fn load_nodes(&self) -> Result<Vec<NodeRecord>, PersistenceError> {
        self.load_slotted(NODES)
    }

    fn upsert_node(&self, record: &NodeRecord) -> Result<(), PersistenceError> {
        let data = bincode::serialize(record)?;
        self.upsert_slotted(NODE_INDEX, NODES, &record.name, &data)
    }
}
