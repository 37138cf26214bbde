// Repository Pattern実装
// 永続化スロットの読み書きを分離

pub mod slot_repository;

pub use slot_repository::{MemorySlotRepository, SlotRepository, SqliteSlotRepository};
