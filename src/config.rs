// Configuration constants for AO3 Filter Builder
// This module centralizes all magic numbers and hardcoded strings to improve maintainability

/// Application configuration constants
pub mod app {
    /// Name of the application data directory
    pub const DATA_DIR_NAME: &str = "AO3_Filter";

    /// Database file name
    pub const DATABASE_FILENAME: &str = "ao3_filter.db";

    /// Environment variable overriding the database location
    pub const DATABASE_ENV_VAR: &str = "AO3_FILTER_DB";

    /// Log filter used when RUST_LOG is not set
    pub const DEFAULT_LOG_FILTER: &str = "warn";
}

/// Durable storage slot keys
pub mod storage {
    /// Slot holding the serialized links collection
    pub const LINKS_KEY: &str = "ao3_filter_links";

    /// Slot holding the serialized lists collection
    pub const LISTS_KEY: &str = "ao3_filter_lists";
}

/// Archive of Our Own configuration constants
pub mod ao3 {
    /// Main AO3 domain
    pub const MAIN_DOMAIN: &str = "archiveofourown.org";

    /// AO3 subdomain suffix pattern
    pub const SUBDOMAIN_SUFFIX: &str = ".archiveofourown.org";

    /// Schemes accepted for tag feed URLs
    pub const ALLOWED_SCHEMES: &[&str] = &["http", "https"];

    /// Pattern locating the numeric tag id in a URL path
    pub const TAG_PATH_PATTERN: &str = r"/tags/(\d+)";

    /// Base used when a feed URL has to be synthesized from a tag id
    pub const TAG_URL_BASE: &str = "https://archiveofourown.org/tags/";

    /// Feed suffix appended to synthesized tag URLs
    pub const FEED_SUFFIX: &str = "/feed.atom";
}

/// Backup file configuration constants
pub mod backup {
    /// Current backup schema version
    pub const CURRENT_VERSION: i64 = 1;

    /// Export file name prefix
    pub const FILENAME_PREFIX: &str = "ao3_filter_backup_";

    /// Export file name extension
    pub const FILENAME_EXTENSION: &str = ".json";

    /// Date format stamped into export file names
    pub const FILENAME_DATE_FORMAT: &str = "%Y-%m-%d";
}

/// Search filter query constants
pub mod query {
    /// Prefix applied to every numeric tag id
    pub const FILTER_PREFIX: &str = "filter_ids:";

    /// Separator joining filter terms
    pub const SEPARATOR: &str = " OR ";
}

/// Regex group indices
pub mod regex {
    /// First capture group index
    pub const GROUP_1: usize = 1;
}
