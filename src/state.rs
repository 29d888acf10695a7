// App-wide service wiring. Everything is constructed once at startup and
// passed by reference; there is no ambient global state.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::info;
use url::Url;

use crate::items::{ItemStore, NewItem};
use crate::modules::search_bar::SearchBar;
use crate::persist::{TabPersister, SNAPSHOT_DEBOUNCE};
use crate::registry::SessionRegistry;
use crate::session::{SessionId, SurfaceFactory};
use crate::settings::{self, SettingsStore};

pub struct AppState {
    pub items: Arc<ItemStore>,
    pub settings: Arc<SettingsStore>,
    pub registry: Arc<SessionRegistry>,
    persister: Arc<TabPersister>,
    initialized: AtomicBool,
}

impl AppState {
    pub fn new(data_dir: &Path, surfaces: Arc<dyn SurfaceFactory>) -> Self {
        Self::with_debounce(data_dir, surfaces, SNAPSHOT_DEBOUNCE)
    }

    pub fn with_debounce(
        data_dir: &Path,
        surfaces: Arc<dyn SurfaceFactory>,
        debounce: Duration,
    ) -> Self {
        let items = Arc::new(ItemStore::new(data_dir));
        let settings = Arc::new(SettingsStore::new(data_dir));
        let registry = Arc::new(SessionRegistry::new(items.clone(), surfaces));
        let persister = TabPersister::spawn(Arc::downgrade(&registry), items.clone(), debounce);
        Self {
            items,
            settings,
            registry,
            persister,
            initialized: AtomicBool::new(false),
        }
    }

    /// Seed the registry from the saved tab snapshot and start persisting
    /// changes. Does nothing until onboarding has completed, and runs at
    /// most once.
    pub fn initialize(&self) {
        if !self.settings.onboarding() {
            return;
        }
        if self.initialized.swap(true, Ordering::AcqRel) {
            return;
        }
        let saved = settings::saved_tabs(&self.items);
        if saved.is_empty() {
            self.registry.append_search_placeholder(false);
        } else {
            self.registry.restore(saved);
        }
        // Attach the persister only after restoring, so the restore
        // itself does not immediately rewrite the snapshot it came from.
        self.registry.subscribe(self.persister.clone());
        info!("[App] Initialized with {} tabs", self.registry.len());
    }

    /// Mark the first-run flow finished and bring the registry up.
    pub fn complete_onboarding(&self) {
        self.settings.set_onboarding(true);
        self.initialize();
    }

    pub fn search_bar(&self) -> SearchBar {
        SearchBar::new(
            self.registry.clone(),
            self.items.clone(),
            self.settings.clone(),
        )
    }

    /// Bookmark a page for the tab it is open in.
    pub fn add_bookmark(&self, title: &str, url: Url, owner: SessionId) {
        let _ = self.items.add(NewItem::bookmark(title, url, owner));
    }

    /// Write the tab snapshot now (app moving to the background).
    pub fn flush(&self) {
        self.persister.flush();
    }
}
