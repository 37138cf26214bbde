use anyhow::Result as AnyResult;
use rusqlite::{Connection, Result};
use std::path::Path;

use crate::repositories::{SlotRepository, SqliteSlotRepository};

/// SQLite database holding the durable storage slots
pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn new(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        let db = Database { conn };
        db.initialize_schema()?;
        Ok(db)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.initialize_schema()?;
        Ok(db)
    }

    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS slots (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        Ok(())
    }

    pub fn slots(&self) -> SqliteSlotRepository<'_> {
        SqliteSlotRepository::new(&self.conn)
    }

    #[cfg(test)]
    pub fn get_slot_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM slots", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl SlotRepository for Database {
    fn read_slot(&self, key: &str) -> AnyResult<Option<String>> {
        self.slots().read_slot(key)
    }

    fn write_slot(&self, key: &str, value: &str) -> AnyResult<()> {
        self.slots().write_slot(key, value)
    }
}
