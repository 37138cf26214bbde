// SlotRepository - 永続化スロット操作の責務を分離
// Each collection lives in its own string-keyed JSON slot

use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};
use std::cell::RefCell;
use std::collections::HashMap;

/// 文字列キーのスロット読み書きの責務を持つRepository trait
pub trait SlotRepository {
    fn read_slot(&self, key: &str) -> Result<Option<String>>;
    fn write_slot(&self, key: &str, value: &str) -> Result<()>;
}

impl<R: SlotRepository + ?Sized> SlotRepository for Box<R> {
    fn read_slot(&self, key: &str) -> Result<Option<String>> {
        (**self).read_slot(key)
    }

    fn write_slot(&self, key: &str, value: &str) -> Result<()> {
        (**self).write_slot(key, value)
    }
}

/// SQLite実装のSlotRepository
pub struct SqliteSlotRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSlotRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl<'a> SlotRepository for SqliteSlotRepository<'a> {
    fn read_slot(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM slots WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;

        Ok(value)
    }

    fn write_slot(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO slots (key, value, updated_at)
             VALUES (?1, ?2, CURRENT_TIMESTAMP)",
            params![key, value],
        )?;

        Ok(())
    }
}

/// メモリ上のSlotRepository (永続化できない場合のフォールバック、テスト用)
#[derive(Debug, Default)]
pub struct MemorySlotRepository {
    slots: RefCell<HashMap<String, String>>,
}

impl MemorySlotRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_slot(self, key: &str, value: &str) -> Self {
        self.slots
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        self
    }
}

impl SlotRepository for MemorySlotRepository {
    fn read_slot(&self, key: &str) -> Result<Option<String>> {
        Ok(self.slots.borrow().get(key).cloned())
    }

    fn write_slot(&self, key: &str, value: &str) -> Result<()> {
        self.slots
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
