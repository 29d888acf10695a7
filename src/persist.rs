// Debounced tab-snapshot persistence. A background thread watches for
// registry changes and rewrites the persisted tab records after a quiet
// window; a failed save stays dirty and is retried on the next window.
// Fire-and-forget: nothing here ever surfaces an error to the caller.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, Weak};
use std::thread;
use std::time::Duration;

use log::{info, warn};

use crate::items::ItemStore;
use crate::registry::{RegistryObserver, RegistryUpdate, SessionRegistry};
use crate::settings;

/// Quiet window before a changed tab strip is written out.
pub const SNAPSHOT_DEBOUNCE: Duration = Duration::from_secs(5);

pub struct TabPersister {
    registry: Weak<SessionRegistry>,
    items: Arc<ItemStore>,
    dirty: AtomicBool,
    saves: AtomicUsize,
    tx: Mutex<mpsc::Sender<()>>,
}

impl TabPersister {
    /// Spawn the background saver. Subscribe the returned handle to the
    /// registry to start receiving change signals.
    pub fn spawn(
        registry: Weak<SessionRegistry>,
        items: Arc<ItemStore>,
        debounce: Duration,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::channel();
        let persister = Arc::new(Self {
            registry,
            items,
            dirty: AtomicBool::new(false),
            saves: AtomicUsize::new(0),
            tx: Mutex::new(tx),
        });

        let worker = persister.clone();
        thread::spawn(move || {
            loop {
                // Sleep until something changed, unless a failed save is
                // still pending retry.
                if !worker.dirty.load(Ordering::Acquire) {
                    match rx.recv() {
                        Ok(()) => {}
                        Err(_) => break,
                    }
                }
                // Debounce: absorb further signals until the window
                // passes quietly.
                let mut disconnected = false;
                loop {
                    match rx.recv_timeout(debounce) {
                        Ok(()) => continue,
                        Err(RecvTimeoutError::Timeout) => break,
                        Err(RecvTimeoutError::Disconnected) => {
                            disconnected = true;
                            break;
                        }
                    }
                }
                worker.save();
                if disconnected {
                    break;
                }
            }
            info!("[Persist] Snapshot worker stopped");
        });

        persister
    }

    /// Write the snapshot now, on the calling thread. Used on app
    /// backgrounding, where waiting out the debounce window would lose
    /// the newest state.
    pub fn flush(&self) {
        self.dirty.store(true, Ordering::Release);
        self.save();
    }

    /// Completed snapshot writes so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::Acquire)
    }

    fn save(&self) {
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return;
        }
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let sessions = registry.sessions();
        match settings::store_tabs(&self.items, &sessions) {
            Ok(()) => {
                self.saves.fetch_add(1, Ordering::AcqRel);
            }
            Err(e) => {
                // Leave it dirty; the worker retries after the next window.
                warn!("[Persist] Snapshot save failed, will retry: {}", e);
                self.dirty.store(true, Ordering::Release);
            }
        }
    }
}

impl RegistryObserver for TabPersister {
    fn registry_changed(&self, _update: &RegistryUpdate) {
        self.dirty.store(true, Ordering::Release);
        // The worker owning the receiver may already have exited; a dead
        // channel just means nothing is listening anymore.
        let _ = self.tx.lock().unwrap().send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::ItemType;
    use crate::session::{ContentSurface, SessionId, SurfaceFactory};
    use std::time::Instant;
    use tempfile::TempDir;
    use url::Url;

    struct NullSurface;
    impl ContentSurface for NullSurface {
        fn load(&self, _url: &Url) {}
        fn go_back(&self) {}
        fn go_forward(&self) {}
        fn reload(&self) {}
    }

    struct NullFactory;
    impl SurfaceFactory for NullFactory {
        fn create(&self, _session: SessionId) -> Arc<dyn ContentSurface> {
            Arc::new(NullSurface)
        }
    }

    fn setup(debounce: Duration) -> (TempDir, Arc<ItemStore>, Arc<SessionRegistry>, Arc<TabPersister>) {
        let dir = TempDir::new().unwrap();
        let items = Arc::new(ItemStore::new(dir.path()));
        let registry = Arc::new(SessionRegistry::new(items.clone(), Arc::new(NullFactory)));
        let persister = TabPersister::spawn(Arc::downgrade(&registry), items.clone(), debounce);
        registry.subscribe(persister.clone());
        (dir, items, registry, persister)
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn wait_for_saves(persister: &TabPersister, at_least: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while persister.save_count() < at_least {
            assert!(Instant::now() < deadline, "timed out waiting for a save");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn a_burst_of_changes_coalesces_into_one_save() {
        let (_dir, items, registry, persister) = setup(Duration::from_millis(50));

        registry.append_content_sessions(&[url("https://a.test")]);
        registry.append_content_sessions(&[url("https://b.test")]);
        registry.append_content_sessions(&[url("https://c.test")]);

        wait_for_saves(&persister, 1);
        // The whole burst fell inside one debounce window.
        assert_eq!(persister.save_count(), 1);

        let tabs = items.query(ItemType::Tab, "");
        assert_eq!(tabs.len(), 3);
        assert!(tabs[2].selected);
    }

    #[test]
    fn later_changes_trigger_another_save() {
        let (_dir, items, registry, persister) = setup(Duration::from_millis(30));

        registry.append_content_sessions(&[url("https://a.test")]);
        wait_for_saves(&persister, 1);

        let sessions = registry.sessions();
        registry.delete(sessions[0].id);
        wait_for_saves(&persister, 2);

        // The surviving placeholder is not persisted.
        assert!(items.query(ItemType::Tab, "").is_empty());
    }

    #[test]
    fn flush_saves_immediately() {
        let (_dir, items, registry, persister) = setup(Duration::from_secs(3600));

        registry.append_content_sessions(&[url("https://a.test")]);
        assert!(items.query(ItemType::Tab, "").is_empty());

        persister.flush();

        let tabs = items.query(ItemType::Tab, "");
        assert_eq!(tabs.len(), 1);
        assert_eq!(tabs[0].url, url("https://a.test"));
    }

    #[test]
    fn flush_writes_even_after_a_quiet_period() {
        let (_dir, _items, registry, persister) = setup(Duration::from_millis(20));

        registry.append_content_sessions(&[url("https://a.test")]);
        wait_for_saves(&persister, 1);

        let before = persister.save_count();
        persister.flush();
        assert_eq!(persister.save_count(), before + 1);
    }
}
