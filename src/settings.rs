use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use log::warn;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::items::{ItemStore, ItemType, NewItem};
use crate::session::{PageKind, SessionInfo};

const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SearchEngine {
    Google,
    YahooJapan,
    Bing,
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::Google
    }
}

impl SearchEngine {
    pub fn title(&self) -> &'static str {
        match self {
            Self::Google => "Google",
            Self::YahooJapan => "Yahoo! Japan",
            Self::Bing => "Bing",
        }
    }

    pub fn url_prefix(&self) -> &'static str {
        match self {
            Self::Google => "https://www.google.com/search?q=",
            Self::YahooJapan => "https://search.yahoo.co.jp/search?p=",
            Self::Bing => "https://www.bing.com/search?q=",
        }
    }

    pub fn query_url(&self, query: &str) -> String {
        format!("{}{}", self.url_prefix(), urlencoding::encode(query))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub search_engine: SearchEngine,
    /// Whether the first-run flow has completed; tabs are only restored
    /// after it has.
    pub onboarding: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            search_engine: SearchEngine::default(),
            onboarding: false,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                    warn!("[Settings] Failed to parse settings: {}, returning defaults", e);
                    Self::default()
                }),
                Err(e) => {
                    warn!("[Settings] Failed to read file: {}, returning defaults", e);
                    Self::default()
                }
            }
        } else {
            Self::default()
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), String> {
        let tmp_path = path.with_extension("tmp");
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| e.to_string())?;

        // Atomic Write Strategy: Write to tmp, then rename.
        // This ensures we never have a half-written file if the app crashes.
        fs::write(&tmp_path, json).map_err(|e| e.to_string())?;
        fs::rename(tmp_path, path).map_err(|e| e.to_string())?;

        Ok(())
    }
}

/// File-backed settings with get/set accessors. Failed saves are logged
/// and the in-memory value stands until the next successful write.
pub struct SettingsStore {
    path: PathBuf,
    current: RwLock<Settings>,
}

impl SettingsStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let path = data_dir.into().join(SETTINGS_FILE);
        let current = RwLock::new(Settings::load(&path));
        Self { path, current }
    }

    pub fn get(&self) -> Settings {
        self.current.read().unwrap().clone()
    }

    pub fn search_engine(&self) -> SearchEngine {
        self.current.read().unwrap().search_engine
    }

    pub fn set_search_engine(&self, engine: SearchEngine) {
        self.update(|settings| settings.search_engine = engine);
    }

    pub fn onboarding(&self) -> bool {
        self.current.read().unwrap().onboarding
    }

    pub fn set_onboarding(&self, done: bool) {
        self.update(|settings| settings.onboarding = done);
    }

    fn update(&self, apply: impl FnOnce(&mut Settings)) {
        let snapshot = {
            let mut current = self.current.write().unwrap();
            apply(&mut current);
            current.clone()
        };
        if let Err(e) = snapshot.save(&self.path) {
            warn!("[Settings] Failed to save: {}", e);
        }
    }
}

/// Saved shape of one tab, as read back from `Tab` records.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedTab {
    pub url: Url,
    pub title: String,
    pub selected: bool,
    pub pinned: bool,
}

/// Read the persisted tab strip, in strip order. Exactly one entry comes
/// back selected: the stored selection if any, else the last tab.
pub fn saved_tabs(items: &ItemStore) -> Vec<SavedTab> {
    let mut tabs: Vec<SavedTab> = items
        .query(ItemType::Tab, "")
        .into_iter()
        .map(|item| SavedTab {
            url: item.url,
            title: item.title,
            selected: item.selected,
            pinned: item.pinned,
        })
        .collect();
    if !tabs.iter().any(|tab| tab.selected) {
        if let Some(last) = tabs.last_mut() {
            last.selected = true;
        }
    }
    tabs
}

/// Rewrite the persisted tab strip from the live session list. Search
/// placeholders and private tabs are not persisted; `order` is the strip
/// position.
pub fn store_tabs(items: &ItemStore, sessions: &[SessionInfo]) -> Result<(), String> {
    items.delete_all(Some(ItemType::Tab))?;
    let snapshots = sessions
        .iter()
        .filter(|session| session.kind == PageKind::Content && !session.private_mode)
        .enumerate();
    for (order, session) in snapshots {
        let Some(url) = session.url.clone() else {
            continue;
        };
        items.add(NewItem::tab(
            session.title.clone(),
            url,
            session.id,
            session.selected,
            session.pinned,
            order as u32,
        ))?;
    }
    Ok(())
}
