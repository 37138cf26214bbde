// Backup export/import helpers
// Imported documents are untrusted: individual bad entries are dropped, only a wrong root shape is fatal

use chrono::{TimeZone, Utc};
use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::api_types::{clean_label, generate_id, BackupData, Link, TagList};
use crate::config::backup;
use crate::errors::{AppError, AppResult};
use crate::tag_url::{canonical_tag_url, is_numeric_tag_id};

/// Largest float that still truncates to an exact i64 (2^53)
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_992.0;

/// Rebuilds an internally consistent snapshot from an arbitrary JSON value.
///
/// Fails with `InvalidFormat` only when the root is not an object carrying
/// `links` and `lists` arrays. Everything else is repaired or dropped:
/// lists need a non-empty `id` and `name`, links need a derivable numeric
/// tag id, and `listIds` are pruned to the lists that survived.
pub fn normalize_backup(raw: &Value, now: i64) -> AppResult<BackupData> {
    let root = raw
        .as_object()
        .ok_or_else(|| AppError::invalid_format("backup root is not an object"))?;

    let raw_links = root
        .get("links")
        .and_then(Value::as_array)
        .ok_or_else(|| AppError::invalid_format("`links` is missing or not an array"))?;

    let raw_lists = root
        .get("lists")
        .and_then(Value::as_array)
        .ok_or_else(|| AppError::invalid_format("`lists` is missing or not an array"))?;

    let version = root
        .get("version")
        .and_then(as_integer)
        .unwrap_or(backup::CURRENT_VERSION);
    let timestamp = root.get("timestamp").and_then(as_integer).unwrap_or(now);

    let lists = normalize_lists(raw_lists);
    let links = {
        let known_list_ids: HashSet<&str> = lists.iter().map(|list| list.id.as_str()).collect();
        normalize_links(raw_links, &known_list_ids, now)
    };

    let dropped_lists = raw_lists.len() - lists.len();
    let dropped_links = raw_links.len() - links.len();
    if dropped_lists > 0 || dropped_links > 0 {
        log::debug!(
            "Backup normalization dropped {dropped_links} link(s) and {dropped_lists} list(s)"
        );
    }

    Ok(BackupData {
        version,
        timestamp,
        links,
        lists,
    })
}

/// Keeps lists with a non-empty `id` and name; the first list wins a shared id
pub(crate) fn normalize_lists(raw_lists: &[Value]) -> Vec<TagList> {
    let mut seen = HashSet::new();
    let mut lists = Vec::new();

    for entry in raw_lists.iter().filter_map(Value::as_object) {
        let Some(id) = non_empty_str(entry, "id") else {
            continue;
        };
        let Some(name) = non_empty_str(entry, "name").map(str::trim) else {
            continue;
        };
        if name.is_empty() || !seen.insert(id.to_string()) {
            continue;
        }

        lists.push(TagList {
            id: id.to_string(),
            name: name.to_string(),
        });
    }

    lists
}

/// Also used when loading the links slot, so stored data gets the same repairs
pub(crate) fn normalize_links(
    raw_links: &[Value],
    known_list_ids: &HashSet<&str>,
    now: i64,
) -> Vec<Link> {
    let mut seen_ids = HashSet::new();
    let mut seen_numeric_ids = HashSet::new();
    let mut links = Vec::new();

    for entry in raw_links.iter().filter_map(Value::as_object) {
        let Some(numeric_id) = entry.get("numericId").and_then(derive_numeric_id) else {
            continue;
        };
        // numeric ids stay unique across the collection
        if !seen_numeric_ids.insert(numeric_id.clone()) {
            continue;
        }

        let id = match non_empty_str(entry, "id") {
            Some(id) if !seen_ids.contains(id) => id.to_string(),
            _ => generate_id(),
        };
        seen_ids.insert(id.clone());

        let original_url = non_empty_str(entry, "originalUrl")
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| canonical_tag_url(&numeric_id));

        let timestamp = entry.get("timestamp").and_then(as_integer).unwrap_or(now);
        let label = clean_label(entry.get("label").and_then(Value::as_str));

        let mut list_ids: Vec<String> = Vec::new();
        for list_id in entry
            .get("listIds")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
        {
            if known_list_ids.contains(list_id) && !list_ids.iter().any(|id| id == list_id) {
                list_ids.push(list_id.to_string());
            }
        }

        links.push(Link {
            id,
            original_url,
            numeric_id,
            timestamp,
            label,
            list_ids,
        });
    }

    links
}

/// Digit strings are taken verbatim; finite non-negative whole numbers are
/// rendered in decimal form, however large.
fn derive_numeric_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if is_numeric_tag_id(s) => Some(s.clone()),
        Value::Number(n) => {
            if let Some(unsigned) = n.as_u64() {
                return Some(unsigned.to_string());
            }
            let float = n.as_f64()?;
            if float.is_finite() && float >= 0.0 && float.fract() == 0.0 {
                Some(format!("{float:.0}"))
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Finite numbers only; fractional parts are truncated
fn as_integer(value: &Value) -> Option<i64> {
    if let Some(int) = value.as_i64() {
        return Some(int);
    }
    value
        .as_f64()
        .filter(|float| float.is_finite() && float.abs() < MAX_EXACT_FLOAT)
        .map(|float| float.trunc() as i64)
}

fn non_empty_str<'a>(entry: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    entry
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Decodes user supplied backup text; non-JSON content is rejected
pub fn parse_backup_text(text: &str) -> AppResult<Value> {
    serde_json::from_str(text).map_err(|e| AppError::InvalidJson(e.to_string()))
}

/// Pretty printed with two-space indentation, fields in declaration order
pub fn to_pretty_json(data: &BackupData) -> AppResult<String> {
    Ok(serde_json::to_string_pretty(data)?)
}

/// `ao3_filter_backup_YYYY-MM-DD.json`, stamped with the export date in UTC
pub fn backup_file_name(exported_at_ms: i64) -> String {
    let date = Utc
        .timestamp_millis_opt(exported_at_ms)
        .single()
        .map(|exported_at| exported_at.format(backup::FILENAME_DATE_FORMAT).to_string())
        .unwrap_or_else(|| "1970-01-01".to_string());

    format!(
        "{}{}{}",
        backup::FILENAME_PREFIX,
        date,
        backup::FILENAME_EXTENSION
    )
}
