use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

pub mod api_types;
pub mod backup;
pub mod cli;
pub mod config;
pub mod database;
pub mod errors;
pub mod query;
pub mod repositories;
pub mod store;
pub mod tag_url;

use crate::config::app;
use database::Database;
use repositories::{MemorySlotRepository, SlotRepository};
use store::LinkStore;

pub use api_types::{BackupData, Link, TagList};
pub use errors::{AppError, AppResult};

// アプリケーション状態管理
pub struct AppState {
    pub store: LinkStore<Box<dyn SlotRepository>>,
}

impl AppState {
    /// Opens the slot database. When durable storage is unavailable the
    /// session continues in memory only.
    pub fn new(db_path: Option<PathBuf>) -> Self {
        let repo: Box<dyn SlotRepository> = match open_database(db_path) {
            Ok(db) => Box::new(db),
            Err(e) => {
                log::error!("{e}; continuing with an in-memory session");
                Box::new(MemorySlotRepository::new())
            }
        };

        AppState {
            store: LinkStore::load(repo),
        }
    }

    pub fn in_memory() -> Self {
        AppState {
            store: LinkStore::load(Box::new(MemorySlotRepository::new())),
        }
    }
}

fn open_database(db_path: Option<PathBuf>) -> AppResult<Database> {
    let db_path = match db_path {
        Some(path) => path,
        None => default_database_path()?,
    };

    log::debug!("Opening slot database at {}", db_path.display());
    Ok(Database::new(&db_path)?)
}

/// `$AO3_FILTER_DB`, otherwise `<data dir>/AO3_Filter/ao3_filter.db`
pub fn default_database_path() -> AppResult<PathBuf> {
    if let Some(path) = std::env::var_os(app::DATABASE_ENV_VAR).filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }

    let base_dir = dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."));

    database_path_in(base_dir)
}

/// `<base>/AO3_Filter/ao3_filter.db`, creating the directory when needed
fn database_path_in(base_dir: PathBuf) -> AppResult<PathBuf> {
    let app_data_dir = base_dir.join(app::DATA_DIR_NAME);

    // ディレクトリが存在しない場合は作成
    if !app_data_dir.exists() {
        std::fs::create_dir_all(&app_data_dir).map_err(|e| {
            AppError::config(format!(
                "Cannot create data directory {}: {e}",
                app_data_dir.display()
            ))
        })?;
    }

    Ok(app_data_dir.join(app::DATABASE_FILENAME))
}

pub fn run() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(app::DEFAULT_LOG_FILTER),
    )
    .init();

    let args = cli::Cli::parse();
    let mut state = AppState::new(args.db.clone());
    let mut stdout = std::io::stdout().lock();

    match cli::execute(args.command, &mut state, &mut stdout) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::debug!("Command failed: {e}");
            eprintln!("{}", e.user_message());
            ExitCode::FAILURE
        }
    }
}
