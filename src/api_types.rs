// API型定義 - TypeScript自動生成対応
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

// =============================================================================
// Core Domain Types
// =============================================================================

/// One tracked tag feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, JsonSchema)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub id: String,
    pub original_url: String,
    pub numeric_id: String,
    /// Creation time in milliseconds since the Unix epoch
    #[ts(type = "number")]
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub label: Option<String>,
    #[serde(default)]
    pub list_ids: Vec<String>,
}

impl Link {
    pub fn new(
        original_url: impl Into<String>,
        numeric_id: impl Into<String>,
        label: Option<&str>,
        timestamp: i64,
    ) -> Self {
        Self {
            id: generate_id(),
            original_url: original_url.into(),
            numeric_id: numeric_id.into(),
            timestamp,
            label: clean_label(label),
            list_ids: Vec::new(),
        }
    }

    pub fn is_in_list(&self, list_id: &str) -> bool {
        self.list_ids.iter().any(|id| id == list_id)
    }

    /// Returns true when the membership was added.
    pub fn join_list(&mut self, list_id: &str) -> bool {
        if self.is_in_list(list_id) {
            return false;
        }
        self.list_ids.push(list_id.to_string());
        true
    }

    /// Returns true when the membership was present.
    pub fn leave_list(&mut self, list_id: &str) -> bool {
        let before = self.list_ids.len();
        self.list_ids.retain(|id| id != list_id);
        self.list_ids.len() != before
    }
}

/// A user-defined named grouping of links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, JsonSchema)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TagList {
    pub id: String,
    pub name: String,
}

impl TagList {
    /// Returns None when the name trims to empty.
    pub fn new(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        Some(Self {
            id: generate_id(),
            name: name.to_string(),
        })
    }
}

/// Serialized snapshot envelope used for export and import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, JsonSchema)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BackupData {
    #[ts(type = "number")]
    pub version: i64,
    #[ts(type = "number")]
    pub timestamp: i64,
    pub links: Vec<Link>,
    pub lists: Vec<TagList>,
}

// =============================================================================
// Helpers
// =============================================================================

/// Fresh opaque identifier for links and lists
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Trimmed label, or None when nothing remains
pub fn clean_label(label: Option<&str>) -> Option<String> {
    label
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .map(str::to_string)
}

// =============================================================================
// TypeScript / Schema Generation Helpers
// =============================================================================

/// TypeScript型定義を生成するヘルパー関数
pub fn generate_typescript_bindings() -> AppResult<()> {
    Link::export().map_err(|e| AppError::Internal(anyhow::anyhow!("Link: {e}")))?;
    TagList::export().map_err(|e| AppError::Internal(anyhow::anyhow!("TagList: {e}")))?;
    BackupData::export().map_err(|e| AppError::Internal(anyhow::anyhow!("BackupData: {e}")))?;

    log::info!("TypeScript bindings generated");
    Ok(())
}

/// バックアップファイルのJSON Schemaを生成するヘルパー関数
pub fn generate_backup_schema() -> AppResult<String> {
    use schemars::schema_for;

    let schema = schema_for!(BackupData);
    Ok(serde_json::to_string_pretty(&schema)?)
}
