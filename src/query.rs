use crate::api_types::Link;
use crate::config::query;

/// `filter_ids:<id> OR filter_ids:<id> ...` in the given order.
///
/// Tag ids are digits only, so nothing needs escaping.
pub fn build_query<'a, I>(links: I) -> String
where
    I: IntoIterator<Item = &'a Link>,
{
    links
        .into_iter()
        .map(|link| format!("{}{}", query::FILTER_PREFIX, link.numeric_id))
        .collect::<Vec<_>>()
        .join(query::SEPARATOR)
}

/// Narrows links to the active list (if any), then to those whose label or
/// original URL contains the search text case-insensitively, or whose numeric
/// id contains it. Order is preserved.
pub fn filter_links<'a>(
    links: &'a [Link],
    active_list_id: Option<&str>,
    search: Option<&str>,
) -> Vec<&'a Link> {
    let needle = search
        .map(|q| q.trim().to_lowercase())
        .filter(|q| !q.is_empty());

    links
        .iter()
        .filter(|link| active_list_id.map_or(true, |list_id| link.is_in_list(list_id)))
        .filter(|link| match &needle {
            Some(q) => matches_search(link, q),
            None => true,
        })
        .collect()
}

fn matches_search(link: &Link, needle: &str) -> bool {
    link.label
        .as_deref()
        .is_some_and(|label| label.to_lowercase().contains(needle))
        || link.original_url.to_lowercase().contains(needle)
        || link.numeric_id.contains(needle)
}
