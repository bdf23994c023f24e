use std::{
    fmt::Debug,
    path::Path,
    sync::{Mutex, MutexGuard},
};

use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::api::StoreEngine;
use crate::error::RegistryError;
use crate::types::{ContractRecord, NetworkFields, NetworkPreset, NewContract};

/// ### SQLStore
/// A single SQLite connection guarded by a mutex. Every registry operation runs
/// while holding the lock, and multi-row updates run inside a SQL transaction, so
/// writers are serialized and readers never see a partially applied change.
pub struct SQLStore {
    conn: Mutex<Connection>,
}

impl Debug for SQLStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SQLStore")
    }
}

const DB_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS networks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        rpc_url TEXT NOT NULL,
        is_default INTEGER NOT NULL DEFAULT 0
    );
    CREATE TABLE IF NOT EXISTS contracts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        address TEXT NOT NULL,
        abi_json TEXT NOT NULL
    );
";

/// Raw contract row; the ABI column is parsed outside the rusqlite row closure.
struct ContractRow {
    id: u64,
    name: String,
    address: String,
    abi_json: String,
}

impl ContractRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row_id(row, 0)?,
            name: row.get(1)?,
            address: row.get(2)?,
            abi_json: row.get(3)?,
        })
    }

    fn into_record(self) -> Result<ContractRecord, RegistryError> {
        Ok(ContractRecord {
            id: self.id,
            name: self.name,
            address: self.address,
            abi: serde_json::from_str(&self.abi_json)?,
        })
    }
}

/// Row ids are stored as SQLite INTEGER (i64); ids above `i64::MAX` cannot exist.
fn sql_id(id: u64) -> i64 {
    i64::try_from(id).unwrap_or(i64::MAX)
}

fn row_id(row: &Row<'_>, index: usize) -> rusqlite::Result<u64> {
    let id: i64 = row.get(index)?;
    Ok(id.unsigned_abs())
}

fn network_from_row(row: &Row<'_>) -> rusqlite::Result<NetworkPreset> {
    let is_default: i64 = row.get(3)?;
    Ok(NetworkPreset {
        id: row_id(row, 0)?,
        name: row.get(1)?,
        rpc_url: row.get(2)?,
        is_default: is_default != 0,
    })
}

impl SQLStore {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_db()?;
        Ok(store)
    }

    fn init_db(&self) -> Result<(), RegistryError> {
        self.conn()?.execute_batch(DB_SCHEMA)?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, RegistryError> {
        self.conn
            .lock()
            .map_err(|_| RegistryError::Custom("Failed to lock the sqlite connection".to_string()))
    }

    fn query_network(conn: &Connection, id: u64) -> Result<Option<NetworkPreset>, RegistryError> {
        Ok(conn
            .query_row(
                "SELECT id, name, rpc_url, is_default FROM networks WHERE id = ?1",
                params![sql_id(id)],
                network_from_row,
            )
            .optional()?)
    }
}

impl StoreEngine for SQLStore {
    fn list_networks(&self) -> Result<Vec<NetworkPreset>, RegistryError> {
        let conn = self.conn()?;
        let mut statement =
            conn.prepare("SELECT id, name, rpc_url, is_default FROM networks ORDER BY id")?;
        let rows = statement.query_map([], network_from_row)?;

        let mut networks = Vec::new();
        for row in rows {
            networks.push(row?);
        }
        Ok(networks)
    }

    fn get_network(&self, id: u64) -> Result<Option<NetworkPreset>, RegistryError> {
        let conn = self.conn()?;
        Self::query_network(&conn, id)
    }

    fn insert_network(&self, fields: NetworkFields) -> Result<NetworkPreset, RegistryError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        if fields.is_default {
            tx.execute("UPDATE networks SET is_default = 0", [])?;
        }
        tx.execute(
            "INSERT INTO networks (name, rpc_url, is_default) VALUES (?1, ?2, ?3)",
            params![fields.name, fields.rpc_url, fields.is_default],
        )?;
        let id = tx.last_insert_rowid().unsigned_abs();
        tx.commit()?;

        Ok(NetworkPreset {
            id,
            name: fields.name,
            rpc_url: fields.rpc_url,
            is_default: fields.is_default,
        })
    }

    fn update_network(
        &self,
        id: u64,
        fields: NetworkFields,
    ) -> Result<Option<NetworkPreset>, RegistryError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        if Self::query_network(&tx, id)?.is_none() {
            return Ok(None);
        }
        if fields.is_default {
            tx.execute("UPDATE networks SET is_default = 0", [])?;
        }
        tx.execute(
            "UPDATE networks SET name = ?1, rpc_url = ?2, is_default = ?3 WHERE id = ?4",
            params![fields.name, fields.rpc_url, fields.is_default, sql_id(id)],
        )?;
        let updated = Self::query_network(&tx, id)?;
        tx.commit()?;
        Ok(updated)
    }

    fn delete_network(&self, id: u64) -> Result<bool, RegistryError> {
        let removed = self
            .conn()?
            .execute("DELETE FROM networks WHERE id = ?1", params![sql_id(id)])?;
        Ok(removed > 0)
    }

    fn set_default_network(&self, id: u64) -> Result<Option<NetworkPreset>, RegistryError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        if Self::query_network(&tx, id)?.is_none() {
            // Dropping the transaction rolls it back; nothing was written anyway.
            return Ok(None);
        }
        tx.execute("UPDATE networks SET is_default = 0", [])?;
        tx.execute(
            "UPDATE networks SET is_default = 1 WHERE id = ?1",
            params![sql_id(id)],
        )?;
        let activated = Self::query_network(&tx, id)?;
        tx.commit()?;
        Ok(activated)
    }

    fn list_contracts(&self) -> Result<Vec<ContractRecord>, RegistryError> {
        let rows = {
            let conn = self.conn()?;
            let mut statement =
                conn.prepare("SELECT id, name, address, abi_json FROM contracts ORDER BY id")?;
            let mapped = statement.query_map([], ContractRow::from_row)?;
            let mut rows = Vec::new();
            for row in mapped {
                rows.push(row?);
            }
            rows
        };
        rows.into_iter().map(ContractRow::into_record).collect()
    }

    fn get_contract(&self, id: u64) -> Result<Option<ContractRecord>, RegistryError> {
        let row = self
            .conn()?
            .query_row(
                "SELECT id, name, address, abi_json FROM contracts WHERE id = ?1",
                params![sql_id(id)],
                ContractRow::from_row,
            )
            .optional()?;
        row.map(ContractRow::into_record).transpose()
    }

    fn insert_contract(&self, contract: NewContract) -> Result<ContractRecord, RegistryError> {
        let abi_json = serde_json::to_string(&contract.abi)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO contracts (name, address, abi_json) VALUES (?1, ?2, ?3)",
            params![contract.name, contract.address, abi_json],
        )?;
        let id = conn.last_insert_rowid().unsigned_abs();

        Ok(ContractRecord {
            id,
            name: contract.name,
            address: contract.address,
            abi: contract.abi,
        })
    }

    fn delete_contract(&self, id: u64) -> Result<bool, RegistryError> {
        let removed = self
            .conn()?
            .execute("DELETE FROM contracts WHERE id = ?1", params![sql_id(id)])?;
        Ok(removed > 0)
    }
}
