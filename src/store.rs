// LinkStore - リンクとリストの状態管理と永続化
// In-memory state is the source of truth for the session; every successful
// mutation is written through to its slot, and write failures are only logged

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;

use crate::api_types::{clean_label, BackupData, Link, TagList};
use crate::backup::{normalize_backup, normalize_links, normalize_lists, parse_backup_text};
use crate::config::{backup, storage};
use crate::errors::{AppError, AppResult};
use crate::repositories::SlotRepository;
use crate::tag_url::parse_tag_url;

/// Milliseconds since the Unix epoch
pub type Clock = fn() -> i64;

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Owns the links and lists collections and their durable slots.
pub struct LinkStore<R: SlotRepository> {
    repo: R,
    links: Vec<Link>,
    lists: Vec<TagList>,
    clock: Clock,
}

impl<R: SlotRepository> LinkStore<R> {
    /// Loads both collections independently. A missing slot starts empty; an
    /// unreadable one is logged and also starts empty. Stored entries go
    /// through the same repairs as an imported backup, so one bad entry never
    /// costs the rest of the collection.
    pub fn load(repo: R) -> Self {
        Self::load_with_clock(repo, now_millis)
    }

    pub fn load_with_clock(repo: R, clock: Clock) -> Self {
        let raw_lists: Vec<Value> = load_slot(&repo, storage::LISTS_KEY);
        let raw_links: Vec<Value> = load_slot(&repo, storage::LINKS_KEY);

        let lists = normalize_lists(&raw_lists);
        let links = {
            let known: HashSet<&str> = lists.iter().map(|list| list.id.as_str()).collect();
            normalize_links(&raw_links, &known, clock())
        };

        let dropped = (raw_links.len() - links.len()) + (raw_lists.len() - lists.len());
        if dropped > 0 {
            log::warn!("Dropped {dropped} stored entr(ies) that could not be repaired");
        }

        log::debug!("Loaded {} link(s) and {} list(s)", links.len(), lists.len());

        Self {
            repo,
            links,
            lists,
            clock,
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Most recent first
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn lists(&self) -> &[TagList] {
        &self.lists
    }

    pub fn link(&self, link_id: &str) -> Option<&Link> {
        self.links.iter().find(|link| link.id == link_id)
    }

    pub fn list(&self, list_id: &str) -> Option<&TagList> {
        self.lists.iter().find(|list| list.id == list_id)
    }

    pub fn list_by_name(&self, name: &str) -> Option<&TagList> {
        let name = name.trim();
        self.lists.iter().find(|list| list.name == name)
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    // =========================================================================
    // Link operations
    // =========================================================================

    /// Parses the URL and prepends a new link. Nothing changes on failure.
    pub fn add_link(&mut self, url: &str, label: Option<&str>) -> AppResult<Link> {
        let numeric_id = parse_tag_url(url)?;

        if self.links.iter().any(|link| link.numeric_id == numeric_id) {
            return Err(AppError::duplicate_tag_id(numeric_id));
        }

        let link = Link::new(url.trim(), numeric_id, label, (self.clock)());
        self.links.insert(0, link.clone());
        self.persist_links();

        log::info!("Added tag {} ({})", link.numeric_id, link.id);
        Ok(link)
    }

    /// Blank labels unset the label. Returns false for an unknown link.
    pub fn update_label(&mut self, link_id: &str, new_label: &str) -> bool {
        let Some(link) = self.links.iter_mut().find(|link| link.id == link_id) else {
            return false;
        };

        link.label = clean_label(Some(new_label));
        self.persist_links();
        true
    }

    pub fn remove_link(&mut self, link_id: &str) -> bool {
        let before = self.links.len();
        self.links.retain(|link| link.id != link_id);
        if self.links.len() == before {
            return false;
        }

        self.persist_links();
        true
    }

    pub fn clear_all_links(&mut self) {
        self.links.clear();
        self.persist_links();
    }

    // =========================================================================
    // List operations
    // =========================================================================

    /// Returns None (and changes nothing) when the name trims to empty.
    pub fn create_list(&mut self, name: &str) -> Option<TagList> {
        let list = TagList::new(name)?;
        self.lists.push(list.clone());
        self.persist_lists();
        Some(list)
    }

    /// Removes the list and every membership that points at it. Links stay.
    pub fn delete_list(&mut self, list_id: &str) -> bool {
        let before = self.lists.len();
        self.lists.retain(|list| list.id != list_id);
        let removed_list = self.lists.len() != before;

        let mut removed_memberships = false;
        for link in &mut self.links {
            removed_memberships |= link.leave_list(list_id);
        }

        if removed_list {
            self.persist_lists();
        }
        if removed_memberships {
            self.persist_links();
        }
        removed_list
    }

    /// Adds the list to each named link that is not already in it. Unknown
    /// lists are ignored so memberships always reference an existing list.
    /// Returns the number of links that joined.
    pub fn add_links_to_list<S: AsRef<str>>(&mut self, link_ids: &[S], list_id: &str) -> usize {
        if self.list(list_id).is_none() {
            log::warn!("Ignoring membership change for unknown list {list_id}");
            return 0;
        }

        let wanted: HashSet<&str> = link_ids.iter().map(|id| id.as_ref()).collect();
        let mut joined = 0;
        for link in self
            .links
            .iter_mut()
            .filter(|link| wanted.contains(link.id.as_str()))
        {
            if link.join_list(list_id) {
                joined += 1;
            }
        }

        if joined > 0 {
            self.persist_links();
        }
        joined
    }

    pub fn remove_link_from_list(&mut self, link_id: &str, list_id: &str) -> bool {
        let removed = self
            .links
            .iter_mut()
            .find(|link| link.id == link_id)
            .map(|link| link.leave_list(list_id))
            .unwrap_or(false);

        if removed {
            self.persist_links();
        }
        removed
    }

    // =========================================================================
    // Import / Export
    // =========================================================================

    /// Snapshot of the current state, stamped with the current time
    pub fn export_backup(&self) -> BackupData {
        BackupData {
            version: backup::CURRENT_VERSION,
            timestamp: (self.clock)(),
            links: self.links.clone(),
            lists: self.lists.clone(),
        }
    }

    /// Replaces both collections with the normalized snapshot. On failure the
    /// current state is left untouched.
    pub fn import_backup(&mut self, raw: &Value) -> AppResult<()> {
        let data = normalize_backup(raw, (self.clock)())?;

        self.links = data.links;
        self.lists = data.lists;
        self.persist_links();
        self.persist_lists();

        log::info!(
            "Imported backup: {} link(s), {} list(s)",
            self.links.len(),
            self.lists.len()
        );
        Ok(())
    }

    pub fn import_backup_str(&mut self, text: &str) -> AppResult<()> {
        let raw = parse_backup_text(text)?;
        self.import_backup(&raw)
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    fn persist_links(&self) {
        persist_slot(&self.repo, storage::LINKS_KEY, &self.links);
    }

    fn persist_lists(&self) {
        persist_slot(&self.repo, storage::LISTS_KEY, &self.lists);
    }
}

fn load_slot<R, T>(repo: &R, key: &str) -> Vec<T>
where
    R: SlotRepository,
    T: DeserializeOwned,
{
    let raw = match repo.read_slot(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            log::error!("Failed to load {key}: {e}");
            return Vec::new();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(items) => items,
        Err(e) => {
            log::error!("Failed to load {key}: {e}");
            Vec::new()
        }
    }
}

/// Best effort: failures are logged and the in-memory state is kept
fn persist_slot<R, T>(repo: &R, key: &str, items: &T)
where
    R: SlotRepository,
    T: Serialize + ?Sized,
{
    let result = serde_json::to_string(items)
        .map_err(|e| AppError::persistence(key, e.to_string()))
        .and_then(|json| {
            repo.write_slot(key, &json)
                .map_err(|e| AppError::persistence(key, e.to_string()))
        });

    if let Err(e) = result {
        log::error!("{e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_values;
    use crate::repositories::MemorySlotRepository;
    use crate::tag_url::{canonical_tag_url, TagUrlError};
    use serde_json::json;

    fn fixed_clock() -> i64 {
        test_values::TEST_TIMESTAMP_MS
    }

    fn create_test_store() -> LinkStore<MemorySlotRepository> {
        LinkStore::load_with_clock(MemorySlotRepository::new(), fixed_clock)
    }

    fn stored_links(store: &LinkStore<MemorySlotRepository>) -> Vec<Link> {
        let raw = store
            .repository()
            .read_slot(storage::LINKS_KEY)
            .unwrap()
            .expect("links slot written");
        serde_json::from_str(&raw).unwrap()
    }

    fn stored_lists(store: &LinkStore<MemorySlotRepository>) -> Vec<TagList> {
        let raw = store
            .repository()
            .read_slot(storage::LISTS_KEY)
            .unwrap()
            .expect("lists slot written");
        serde_json::from_str(&raw).unwrap()
    }

    /// Every write fails
    struct FailingSlotRepository;

    impl SlotRepository for FailingSlotRepository {
        fn read_slot(&self, _key: &str) -> anyhow::Result<Option<String>> {
            Err(anyhow::anyhow!("storage unavailable"))
        }

        fn write_slot(&self, _key: &str, _value: &str) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("quota exceeded"))
        }
    }

    #[test]
    fn test_load_empty_and_malformed_slots() {
        let store = create_test_store();
        assert!(store.links().is_empty());
        assert!(store.lists().is_empty());

        let repo = MemorySlotRepository::new()
            .with_slot(storage::LINKS_KEY, "{broken")
            .with_slot(storage::LISTS_KEY, r#"[{"id":"a","name":"A"}]"#);
        let store = LinkStore::load(repo);
        assert!(store.links().is_empty());
        assert_eq!(store.lists().len(), 1);
    }

    #[test]
    fn test_load_defaults_missing_list_ids_and_prunes_unknown_lists() {
        let links = json!([
            {"id": "1", "originalUrl": "u1", "numericId": "1", "timestamp": 5},
            {"id": "2", "originalUrl": "u2", "numericId": "2", "timestamp": 6,
             "listIds": ["a", "gone"]}
        ]);
        let repo = MemorySlotRepository::new()
            .with_slot(storage::LINKS_KEY, &links.to_string())
            .with_slot(storage::LISTS_KEY, r#"[{"id":"a","name":"A"}]"#);

        let store = LinkStore::load(repo);
        assert!(store.link("1").unwrap().list_ids.is_empty());
        assert_eq!(store.link("2").unwrap().list_ids, vec!["a".to_string()]);
    }

    #[test]
    fn test_load_repairs_stored_entries_and_keeps_the_rest() {
        let links = json!([
            {"id": "1", "originalUrl": "u1", "numericId": "5", "timestamp": 1},
            {"id": "2", "numericId": "6", "timestamp": 1},
            {"id": "3", "originalUrl": "u3", "numericId": "not-digits", "timestamp": 1},
            {"id": "4", "originalUrl": "u4", "numericId": "7", "label": "",
             "listIds": ["a", "a"]},
            {"id": "5", "originalUrl": "u5", "numericId": "7", "timestamp": 1}
        ]);
        let repo = MemorySlotRepository::new()
            .with_slot(storage::LINKS_KEY, &links.to_string())
            .with_slot(storage::LISTS_KEY, r#"[{"id":"a","name":"A"},{"id":"","name":"B"}]"#);

        let store = LinkStore::load_with_clock(repo, fixed_clock);

        let ids: Vec<&str> = store.links().iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "4"]);
        assert_eq!(store.link("2").unwrap().original_url, canonical_tag_url("6"));

        let repaired = store.link("4").unwrap();
        assert_eq!(repaired.label, None);
        assert_eq!(repaired.list_ids, vec!["a".to_string()]);
        assert_eq!(repaired.timestamp, test_values::TEST_TIMESTAMP_MS);
        assert_eq!(store.lists().len(), 1);
    }

    #[test]
    fn test_load_with_duplicate_stored_numeric_id_still_rejects_add() {
        let links = json!([
            {"id": "1", "originalUrl": "u1", "numericId": "55", "timestamp": 1},
            {"id": "2", "originalUrl": "u2", "numericId": "55", "timestamp": 2}
        ]);
        let repo = MemorySlotRepository::new().with_slot(storage::LINKS_KEY, &links.to_string());

        let mut store = LinkStore::load_with_clock(repo, fixed_clock);
        assert_eq!(store.links().len(), 1);
        assert!(matches!(
            store.add_link("https://archiveofourown.org/tags/55/feed.atom", None),
            Err(AppError::DuplicateTagId { .. })
        ));
    }

    #[test]
    fn test_load_survives_unreadable_storage() {
        let store = LinkStore::load(FailingSlotRepository);
        assert!(store.links().is_empty());
        assert!(store.lists().is_empty());
    }

    #[test]
    fn test_add_link_prepends_and_persists() {
        let mut store = create_test_store();

        let first = store
            .add_link(test_values::TEST_TAG_URL_1, Some("  Fluff "))
            .expect("Failed to add link");
        let second = store
            .add_link(&format!("  {}  ", test_values::TEST_TAG_URL_2), None)
            .expect("Failed to add link");

        assert_eq!(first.numeric_id, test_values::TEST_TAG_ID_1);
        assert_eq!(first.label.as_deref(), Some("Fluff"));
        assert_eq!(first.timestamp, test_values::TEST_TIMESTAMP_MS);
        assert_eq!(second.original_url, test_values::TEST_TAG_URL_2);
        assert_eq!(second.label, None);
        assert_ne!(first.id, second.id);

        let ids: Vec<&str> = store.links().iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec![second.id.as_str(), first.id.as_str()]);
        assert_eq!(stored_links(&store), store.links());
    }

    #[test]
    fn test_add_link_duplicate_numeric_id() {
        let mut store = create_test_store();
        store
            .add_link("https://archiveofourown.org/tags/55/feed.atom", None)
            .unwrap();

        let result = store.add_link("https://www.archiveofourown.org/tags/55/works", None);
        assert!(matches!(
            result,
            Err(AppError::DuplicateTagId { ref numeric_id }) if numeric_id == "55"
        ));
        assert_eq!(store.links().len(), 1);
    }

    #[test]
    fn test_add_link_parser_errors_leave_state_untouched() {
        let mut store = create_test_store();

        assert!(matches!(
            store.add_link("   ", None),
            Err(AppError::TagUrl(TagUrlError::EmptyInput))
        ));
        assert!(matches!(
            store.add_link("https://example.com/tags/1", None),
            Err(AppError::TagUrl(TagUrlError::WrongDomain { .. }))
        ));
        assert!(store.links().is_empty());
        assert!(store
            .repository()
            .read_slot(storage::LINKS_KEY)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_update_label() {
        let mut store = create_test_store();
        let link = store.add_link(test_values::TEST_TAG_URL_1, None).unwrap();

        assert!(store.update_label(&link.id, "  Angst  "));
        assert_eq!(store.link(&link.id).unwrap().label.as_deref(), Some("Angst"));

        assert!(store.update_label(&link.id, "   "));
        assert_eq!(store.link(&link.id).unwrap().label, None);
        assert_eq!(stored_links(&store)[0].label, None);

        assert!(!store.update_label("missing", "ignored"));
    }

    #[test]
    fn test_remove_and_clear_links() {
        let mut store = create_test_store();
        let first = store.add_link(test_values::TEST_TAG_URL_1, None).unwrap();
        store.add_link(test_values::TEST_TAG_URL_2, None).unwrap();
        store.add_link(test_values::TEST_TAG_URL_3, None).unwrap();

        assert!(store.remove_link(&first.id));
        assert!(!store.remove_link(&first.id));
        assert_eq!(store.links().len(), 2);
        assert_eq!(stored_links(&store).len(), 2);

        store.clear_all_links();
        assert!(store.links().is_empty());
        assert!(stored_links(&store).is_empty());
    }

    #[test]
    fn test_removed_numeric_id_can_be_added_again() {
        let mut store = create_test_store();
        let link = store.add_link(test_values::TEST_TAG_URL_1, None).unwrap();
        store.remove_link(&link.id);

        let again = store.add_link(test_values::TEST_TAG_URL_1, None).unwrap();
        assert_ne!(again.id, link.id);
    }

    #[test]
    fn test_create_list() {
        let mut store = create_test_store();

        assert!(store.create_list("   ").is_none());
        assert!(store
            .repository()
            .read_slot(storage::LISTS_KEY)
            .unwrap()
            .is_none());

        let first = store.create_list(" Favourites ").unwrap();
        let second = store.create_list("To read").unwrap();
        assert_eq!(first.name, "Favourites");
        assert_eq!(store.lists(), &[first.clone(), second]);
        assert_eq!(store.list_by_name("Favourites"), Some(&first));
        assert_eq!(stored_lists(&store), store.lists());
    }

    #[test]
    fn test_delete_list_cascades_memberships() {
        let mut store = create_test_store();
        let a = store.add_link(test_values::TEST_TAG_URL_1, None).unwrap();
        let b = store.add_link(test_values::TEST_TAG_URL_2, None).unwrap();
        let keep = store.create_list("Keep").unwrap();
        let doomed = store.create_list("Doomed").unwrap();

        store.add_links_to_list(&[a.id.as_str(), b.id.as_str()], &doomed.id);
        store.add_links_to_list(&[a.id.as_str()], &keep.id);

        assert!(store.delete_list(&doomed.id));
        assert_eq!(store.links().len(), 2);
        assert!(store.links().iter().all(|link| !link.is_in_list(&doomed.id)));
        assert!(store.link(&a.id).unwrap().is_in_list(&keep.id));
        assert!(store.list(&doomed.id).is_none());

        assert!(stored_links(&store)
            .iter()
            .all(|link| !link.is_in_list(&doomed.id)));
        assert_eq!(stored_lists(&store), vec![keep]);

        assert!(!store.delete_list(&doomed.id));
    }

    #[test]
    fn test_add_links_to_list_is_idempotent() {
        let mut store = create_test_store();
        let a = store.add_link(test_values::TEST_TAG_URL_1, None).unwrap();
        let b = store.add_link(test_values::TEST_TAG_URL_2, None).unwrap();
        let list = store.create_list("Favourites").unwrap();

        assert_eq!(store.add_links_to_list(&[a.id.clone()], &list.id), 1);
        assert_eq!(
            store.add_links_to_list(&[a.id.clone(), b.id.clone(), "ghost".to_string()], &list.id),
            1
        );
        assert_eq!(store.add_links_to_list(&[a.id.clone()], &list.id), 0);

        assert_eq!(store.link(&a.id).unwrap().list_ids, vec![list.id.clone()]);
        assert_eq!(store.link(&b.id).unwrap().list_ids, vec![list.id.clone()]);
    }

    #[test]
    fn test_add_links_to_unknown_list_is_ignored() {
        let mut store = create_test_store();
        let a = store.add_link(test_values::TEST_TAG_URL_1, None).unwrap();

        assert_eq!(store.add_links_to_list(&[a.id.as_str()], "missing"), 0);
        assert!(store.link(&a.id).unwrap().list_ids.is_empty());
    }

    #[test]
    fn test_remove_link_from_list() {
        let mut store = create_test_store();
        let a = store.add_link(test_values::TEST_TAG_URL_1, None).unwrap();
        let first = store.create_list("First").unwrap();
        let second = store.create_list("Second").unwrap();
        store.add_links_to_list(&[a.id.as_str()], &first.id);
        store.add_links_to_list(&[a.id.as_str()], &second.id);

        assert!(store.remove_link_from_list(&a.id, &first.id));
        assert!(!store.remove_link_from_list(&a.id, &first.id));
        assert!(!store.remove_link_from_list("missing", &second.id));

        assert_eq!(store.link(&a.id).unwrap().list_ids, vec![second.id.clone()]);
        assert_eq!(store.lists().len(), 2);
    }

    #[test]
    fn test_import_replaces_state() {
        let mut store = create_test_store();
        store.add_link(test_values::TEST_TAG_URL_1, None).unwrap();
        store.create_list("Old").unwrap();

        let raw = json!({
            "version": 1,
            "timestamp": 10,
            "links": [{"id": "x", "originalUrl": "u", "numericId": "9", "timestamp": 3,
                       "listIds": ["n"]}],
            "lists": [{"id": "n", "name": "New"}]
        });
        store.import_backup(&raw).expect("Failed to import backup");

        assert_eq!(store.links().len(), 1);
        assert_eq!(store.links()[0].numeric_id, "9");
        assert_eq!(store.links()[0].list_ids, vec!["n".to_string()]);
        assert_eq!(store.lists().len(), 1);
        assert_eq!(store.lists()[0].name, "New");
        assert_eq!(stored_links(&store), store.links());
        assert_eq!(stored_lists(&store), store.lists());
    }

    #[test]
    fn test_failed_import_leaves_state_untouched() {
        let mut store = create_test_store();
        let link = store.add_link(test_values::TEST_TAG_URL_1, None).unwrap();
        let list = store.create_list("Keep").unwrap();

        assert!(matches!(
            store.import_backup(&json!([1, 2, 3])),
            Err(AppError::InvalidFormat { .. })
        ));
        assert!(matches!(
            store.import_backup_str("definitely not json"),
            Err(AppError::InvalidJson(_))
        ));

        assert_eq!(store.links(), &[link]);
        assert_eq!(store.lists(), &[list]);
    }

    #[test]
    fn test_export_then_import_round_trip() {
        let mut store = create_test_store();
        let a = store.add_link(test_values::TEST_TAG_URL_1, Some("A")).unwrap();
        store.add_link(test_values::TEST_TAG_URL_3, None).unwrap();
        let list = store.create_list("Favourites").unwrap();
        store.add_links_to_list(&[a.id.as_str()], &list.id);

        let exported = store.export_backup();
        assert_eq!(exported.version, backup::CURRENT_VERSION);
        assert_eq!(exported.timestamp, test_values::TEST_TIMESTAMP_MS);
        let text = crate::backup::to_pretty_json(&exported).unwrap();

        let mut restored = create_test_store();
        restored.import_backup_str(&text).unwrap();

        assert_eq!(restored.links(), store.links());
        assert_eq!(restored.lists(), store.lists());
    }

    #[test]
    fn test_persistence_failure_keeps_memory_state() {
        let mut store = LinkStore::load_with_clock(FailingSlotRepository, fixed_clock);

        let link = store
            .add_link(test_values::TEST_TAG_URL_1, None)
            .expect("write failures must not fail the operation");
        let list = store.create_list("Still here").unwrap();
        assert_eq!(store.add_links_to_list(&[link.id.as_str()], &list.id), 1);

        assert_eq!(store.links().len(), 1);
        assert_eq!(store.lists().len(), 1);
        assert!(store.link(&link.id).unwrap().is_in_list(&list.id));
    }

    #[test]
    fn test_state_survives_reload() {
        let repo = MemorySlotRepository::new();
        let mut store = LinkStore::load_with_clock(repo, fixed_clock);
        let link = store.add_link(test_values::TEST_TAG_URL_1, Some("x")).unwrap();
        let list = store.create_list("L").unwrap();
        store.add_links_to_list(&[link.id.as_str()], &list.id);

        let LinkStore { repo, .. } = store;
        let reloaded = LinkStore::load(repo);
        assert_eq!(reloaded.link(&link.id).unwrap().list_ids, vec![list.id.clone()]);
        assert_eq!(reloaded.list(&list.id).unwrap().name, "L");
    }
}
