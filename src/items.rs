// Persisted record store: history, bookmarks, search keywords and tab
// snapshots, one JSON document on disk. Reads degrade to empty and writes
// are skipped (logged) on persistence failure; callers never crash on it.

use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;
use url::Url;
use uuid::Uuid;

use crate::session::SessionId;

pub type ItemId = Uuid;

const ITEMS_FILE: &str = "items.json";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    History,
    Bookmark,
    Keywords,
    Tab,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: ItemId,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub created: DateTime<Utc>,
    pub title: String,
    pub url: Url,
    pub keywords: String,
    /// Session the record originated from.
    pub owner: SessionId,
    pub pinned: bool,
    pub selected: bool,
    /// Position in the tab strip; meaningful only for `Tab` records.
    pub order: Option<u32>,
}

/// Arguments for `ItemStore::add`. The convenience constructors cover the
/// record shapes the rest of the app actually writes.
#[derive(Clone, Debug)]
pub struct NewItem {
    pub item_type: ItemType,
    pub title: String,
    pub url: Url,
    pub keywords: String,
    pub owner: SessionId,
    pub pinned: bool,
    pub selected: bool,
    pub order: Option<u32>,
}

impl NewItem {
    pub fn new(item_type: ItemType, title: impl Into<String>, url: Url, owner: SessionId) -> Self {
        Self {
            item_type,
            title: title.into(),
            url,
            keywords: String::new(),
            owner,
            pinned: false,
            selected: false,
            order: None,
        }
    }

    pub fn history(title: impl Into<String>, url: Url, owner: SessionId) -> Self {
        Self::new(ItemType::History, title, url, owner)
    }

    pub fn bookmark(title: impl Into<String>, url: Url, owner: SessionId) -> Self {
        Self::new(ItemType::Bookmark, title, url, owner)
    }

    /// Keyword record: the entered text doubles as title and identity.
    pub fn keyword(text: impl Into<String>, url: Url, owner: SessionId) -> Self {
        let text = text.into();
        let mut item = Self::new(ItemType::Keywords, text.clone(), url, owner);
        item.keywords = text;
        item
    }

    pub fn tab(
        title: impl Into<String>,
        url: Url,
        owner: SessionId,
        selected: bool,
        pinned: bool,
        order: u32,
    ) -> Self {
        let mut item = Self::new(ItemType::Tab, title, url, owner);
        item.selected = selected;
        item.pinned = pinned;
        item.order = Some(order);
        item
    }
}

/// Subscriber to the published query stream (see `set_type` /
/// `set_filter_text`). Notified with the settled result set only.
pub trait ItemsObserver: Send + Sync {
    fn items_changed(&self, items: &[Item]);
}

struct StoreInner {
    records: Vec<Item>,
    // The published query key.
    item_type: ItemType,
    filter_text: String,
}

pub struct ItemStore {
    inner: Mutex<StoreInner>,
    path: PathBuf,
    published: ArcSwap<Vec<Item>>,
    observers: Mutex<Vec<Arc<dyn ItemsObserver>>>,
}

impl ItemStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir).ok();
        let path = data_dir.join(ITEMS_FILE);

        let records = match Self::load(&path) {
            Ok(records) => records,
            Err(e) => {
                warn!("[Items] Failed to load {:?}: {}, starting empty", path, e);
                Vec::new()
            }
        };
        info!("[Items] Loaded {} records", records.len());

        Self {
            inner: Mutex::new(StoreInner {
                records,
                item_type: ItemType::Bookmark,
                filter_text: String::new(),
            }),
            path,
            published: ArcSwap::from_pointee(Vec::new()),
            observers: Mutex::new(Vec::new()),
        }
    }

    fn load(path: &PathBuf) -> Result<Vec<Item>, String> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(path).map_err(|e| e.to_string())?;
        serde_json::from_str(&content).map_err(|e| e.to_string())
    }

    // Atomic write: tmp + rename (pattern shared with settings.rs).
    fn save(&self, records: &[Item]) -> Result<(), String> {
        let tmp_path = self.path.with_extension("tmp");
        let json = serde_json::to_string_pretty(records).map_err(|e| e.to_string())?;
        fs::write(&tmp_path, json).map_err(|e| e.to_string())?;
        fs::rename(&tmp_path, &self.path).map_err(|e| e.to_string())?;
        Ok(())
    }

    // --- Commands for the published query stream ---

    pub fn set_type(&self, item_type: ItemType) {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.item_type = item_type;
        }
        self.republish();
    }

    pub fn set_filter_text(&self, text: impl Into<String>) {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.filter_text = text.into();
        }
        self.republish();
    }

    /// Latest result set for the current (type, filter) key.
    pub fn items(&self) -> Arc<Vec<Item>> {
        self.published.load_full()
    }

    pub fn subscribe(&self, observer: Arc<dyn ItemsObserver>) {
        self.observers.lock().unwrap().push(observer);
    }

    // --- Queries ---

    /// Records of one type, filtered by case-/diacritic-insensitive title
    /// containment. `Tab` records sort by strip order, everything else
    /// newest-first.
    pub fn query(&self, item_type: ItemType, filter_text: &str) -> Vec<Item> {
        let inner = self.inner.lock().unwrap();
        Self::query_records(&inner.records, item_type, filter_text)
    }

    fn query_records(records: &[Item], item_type: ItemType, filter_text: &str) -> Vec<Item> {
        let needle = fold_for_search(filter_text);
        let mut results: Vec<Item> = records
            .iter()
            .filter(|item| item.item_type == item_type)
            .filter(|item| needle.is_empty() || fold_for_search(&item.title).contains(&needle))
            .cloned()
            .collect();
        match item_type {
            ItemType::Tab => results.sort_by_key(|item| item.order.unwrap_or(0)),
            _ => results.sort_by(|a, b| b.created.cmp(&a.created)),
        }
        results
    }

    pub fn item(&self, id: ItemId) -> Option<Item> {
        let inner = self.inner.lock().unwrap();
        inner.records.iter().find(|item| item.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // --- Mutations ---

    /// Upsert by identity: a `Keywords` record matching on
    /// (keywords, type), anything else on (url, type), is refreshed in
    /// place (created/title/keywords/owner) instead of duplicated.
    pub fn add(&self, new: NewItem) -> Result<(), String> {
        let keywords = new.keywords.trim().to_string();
        let result = {
            let mut inner = self.inner.lock().unwrap();
            let existing = inner.records.iter_mut().find(|item| {
                item.item_type == new.item_type
                    && match new.item_type {
                        ItemType::Keywords => item.keywords == keywords,
                        _ => item.url == new.url,
                    }
            });
            match existing {
                Some(item) => {
                    // Overwrite: refresh the record, keep its identity.
                    item.created = Utc::now();
                    item.title = new.title;
                    item.keywords = keywords;
                    item.owner = new.owner;
                }
                None => {
                    inner.records.push(Item {
                        id: Uuid::new_v4(),
                        item_type: new.item_type,
                        created: Utc::now(),
                        title: new.title,
                        url: new.url,
                        keywords,
                        owner: new.owner,
                        pinned: new.pinned,
                        selected: new.selected,
                        order: new.order,
                    });
                }
            }
            self.save(&inner.records)
        };
        if let Err(ref e) = result {
            warn!("[Items] Could not save: {}", e);
        }
        self.republish();
        result
    }

    pub fn delete(&self, id: ItemId) -> Result<(), String> {
        let result = {
            let mut inner = self.inner.lock().unwrap();
            let before = inner.records.len();
            inner.records.retain(|item| item.id != id);
            if inner.records.len() == before {
                info!("[Items] Delete of unknown id {}, ignoring", id);
                return Ok(());
            }
            self.save(&inner.records)
        };
        if let Err(ref e) = result {
            warn!("[Items] Could not save: {}", e);
        }
        self.republish();
        result
    }

    /// Delete every record, or every record of one type.
    pub fn delete_all(&self, item_type: Option<ItemType>) -> Result<(), String> {
        let result = {
            let mut inner = self.inner.lock().unwrap();
            match item_type {
                Some(t) => inner.records.retain(|item| item.item_type != t),
                None => inner.records.clear(),
            }
            self.save(&inner.records)
        };
        if let Err(ref e) = result {
            warn!("[Items] Could not save: {}", e);
        }
        self.republish();
        result
    }

    // Recompute the published result set and notify subscribers, outside
    // the store lock.
    fn republish(&self) {
        let results = {
            let inner = self.inner.lock().unwrap();
            Self::query_records(&inner.records, inner.item_type, &inner.filter_text)
        };
        self.published.store(Arc::new(results.clone()));
        let observers: Vec<Arc<dyn ItemsObserver>> =
            self.observers.lock().unwrap().iter().cloned().collect();
        for observer in observers {
            observer.items_changed(&results);
        }
    }
}

/// Case- and diacritic-insensitive fold, the equality used by the title
/// filter: NFD-decompose, strip combining marks, lowercase.
fn fold_for_search(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}
