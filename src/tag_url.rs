use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;
use url::Url;

use crate::config::{ao3, regex as groups};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TagUrlError {
    #[error("Input is empty")]
    EmptyInput,

    #[error("Malformed URL: {input}")]
    MalformedUrl { input: String },

    #[error("URL is not on archiveofourown.org: {host}")]
    WrongDomain { host: String },

    #[error("No numeric tag id in path: {path}")]
    NoTagId { path: String },
}

impl TagUrlError {
    /// Short message shown next to the URL input
    pub fn user_message(&self) -> &'static str {
        match self {
            TagUrlError::EmptyInput => "Input is empty.",
            TagUrlError::MalformedUrl { .. } => {
                "Please enter a valid URL (starting with http:// or https://)."
            }
            TagUrlError::WrongDomain { .. } => "The URL must be from archiveofourown.org.",
            TagUrlError::NoTagId { .. } => {
                "Could not find a numeric tag ID in the URL path (e.g. .../tags/12345/...)."
            }
        }
    }
}

fn tag_path_regex() -> Option<&'static Regex> {
    static TAG_PATH: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();

    match TAG_PATH.get_or_init(|| Regex::new(ao3::TAG_PATH_PATTERN)) {
        Ok(regex) => Some(regex),
        Err(e) => {
            log::error!("Tag path pattern failed to compile: {e}");
            None
        }
    }
}

/// Extracts the numeric tag id from an AO3 tag feed URL.
///
/// The digits are returned verbatim, leading zeros included, so ids of any
/// length survive without numeric coercion.
pub fn parse_tag_url(input: &str) -> Result<String, TagUrlError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(TagUrlError::EmptyInput);
    }

    let parsed_url = Url::parse(trimmed).map_err(|_| TagUrlError::MalformedUrl {
        input: trimmed.to_string(),
    })?;

    if !ao3::ALLOWED_SCHEMES.contains(&parsed_url.scheme()) {
        return Err(TagUrlError::MalformedUrl {
            input: trimmed.to_string(),
        });
    }

    if !is_ao3_url(&parsed_url) {
        return Err(TagUrlError::WrongDomain {
            host: parsed_url.host_str().unwrap_or("").to_string(),
        });
    }

    extract_tag_id(parsed_url.path()).ok_or_else(|| TagUrlError::NoTagId {
        path: parsed_url.path().to_string(),
    })
}

/// Supports both archiveofourown.org and *.archiveofourown.org
fn is_ao3_url(url: &Url) -> bool {
    let host = url.host_str().unwrap_or("").to_ascii_lowercase();
    let host = host.strip_suffix('.').unwrap_or(&host);

    host == ao3::MAIN_DOMAIN || host.ends_with(ao3::SUBDOMAIN_SUFFIX)
}

/// First `/tags/<digits>` occurrence wins
fn extract_tag_id(path: &str) -> Option<String> {
    tag_path_regex()?
        .captures(path)?
        .get(groups::GROUP_1)
        .map(|m| m.as_str().to_string())
}

/// Canonical feed URL for a tag id, used when a backup entry carries no URL
pub fn canonical_tag_url(numeric_id: &str) -> String {
    format!("{}{}{}", ao3::TAG_URL_BASE, numeric_id, ao3::FEED_SUFFIX)
}

/// Non-empty and ASCII digits only
pub fn is_numeric_tag_id(candidate: &str) -> bool {
    !candidate.is_empty() && candidate.chars().all(|c| c.is_ascii_digit())
}
