use thiserror::Error;

use crate::tag_url::TagUrlError;

/// アプリケーション全体で使用する統一エラー型
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Tag URL error: {0}")]
    TagUrl(#[from] TagUrlError),

    #[error("Duplicate tag id: {numeric_id}")]
    DuplicateTagId { numeric_id: String },

    #[error("Invalid backup format: {reason}")]
    InvalidFormat { reason: String },

    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Persistence failure for slot {slot}: {message}")]
    Persistence { slot: String, message: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl AppError {
    /// バリデーションエラーを作成
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn duplicate_tag_id(numeric_id: impl Into<String>) -> Self {
        Self::DuplicateTagId {
            numeric_id: numeric_id.into(),
        }
    }

    pub fn invalid_format(reason: impl Into<String>) -> Self {
        Self::InvalidFormat {
            reason: reason.into(),
        }
    }

    pub fn persistence(slot: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Persistence {
            slot: slot.into(),
            message: message.into(),
        }
    }

    /// 設定エラーを作成
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

/// アプリケーション全体で使用するResult型
pub type AppResult<T> = Result<T, AppError>;

/// エラーのカテゴリ分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// ユーザー操作エラー（修正可能）
    UserError,
    /// システムエラー（セッションはメモリ上で継続）
    SystemError,
    /// 設定エラー（データベースの場所を変更する必要あり）
    ConfigError,
}

impl AppError {
    /// エラーのカテゴリを取得
    pub fn category(&self) -> ErrorCategory {
        match self {
            AppError::TagUrl(_) => ErrorCategory::UserError,
            AppError::DuplicateTagId { .. } => ErrorCategory::UserError,
            AppError::InvalidFormat { .. } => ErrorCategory::UserError,
            AppError::InvalidJson(_) => ErrorCategory::UserError,
            AppError::Validation { .. } => ErrorCategory::UserError,
            AppError::Persistence { .. } => ErrorCategory::SystemError,
            AppError::Database(_) => ErrorCategory::SystemError,
            AppError::Io(_) => ErrorCategory::SystemError,
            AppError::Serialization(_) => ErrorCategory::SystemError,
            AppError::Internal(_) => ErrorCategory::SystemError,
            AppError::Configuration(_) => ErrorCategory::ConfigError,
        }
    }

    /// ユーザー向けメッセージを取得
    pub fn user_message(&self) -> String {
        match self {
            AppError::TagUrl(err) => err.user_message().to_string(),
            AppError::DuplicateTagId { .. } => "This tag ID has already been added.".to_string(),
            AppError::InvalidFormat { .. } => "Invalid backup file format.".to_string(),
            AppError::InvalidJson(_) => "Failed to parse JSON file.".to_string(),
            AppError::Persistence { .. } => {
                "Changes could not be saved and will only last for this session.".to_string()
            }
            AppError::Database(_) => {
                "A storage error occurred. Changes will only last for this session.".to_string()
            }
            AppError::Io(_) => {
                "A file operation failed. Check the file path and permissions.".to_string()
            }
            AppError::Serialization(_) => "Data could not be converted.".to_string(),
            AppError::Internal(err) => format!("Internal error: {err}"),
            AppError::Validation { field, message } => format!("{field}: {message}"),
            AppError::Configuration(msg) => {
                format!("{msg}. Set AO3_FILTER_DB or pass --db to choose another location.")
            }
        }
    }

    /// 入力を修正すれば再送信できるかどうか
    pub fn is_recoverable(&self) -> bool {
        matches!(self.category(), ErrorCategory::UserError)
    }
}

/// AppError を String に変換 (エラーメッセージの表示)
impl From<AppError> for String {
    fn from(err: AppError) -> Self {
        err.user_message()
    }
}
