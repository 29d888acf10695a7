// Session registry: the ordered tab list plus the selection cursor.
// Every mutation runs under one mutex and ends in a single published
// snapshot, so observers never see a half-applied state. Surface calls
// and observer callbacks happen after the lock is released; either may
// re-enter the registry.

use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use log::info;
use url::Url;
use uuid::Uuid;

use crate::items::{ItemStore, NewItem};
use crate::modules::navigation;
use crate::session::{
    ContentSurface, PageEvent, PageKind, Session, SessionId, SessionInfo, SurfaceFactory,
};
use crate::settings::SavedTab;

/// One settled registry state: the full session list and the current
/// (selected) session.
#[derive(Clone, Debug, Default)]
pub struct RegistryUpdate {
    pub sessions: Vec<SessionInfo>,
    pub current: Option<SessionInfo>,
}

/// Subscriber to registry changes (tab strip, address bar, chrome,
/// persistence). Called once per completed operation with the final state.
pub trait RegistryObserver: Send + Sync {
    fn registry_changed(&self, update: &RegistryUpdate);
}

type SurfaceLoad = (Arc<dyn ContentSurface>, Url);

pub struct SessionRegistry {
    inner: Mutex<Vec<Session>>,
    published: ArcSwap<RegistryUpdate>,
    observers: Mutex<Vec<Arc<dyn RegistryObserver>>>,
    items: Arc<ItemStore>,
    surfaces: Arc<dyn SurfaceFactory>,
}

impl SessionRegistry {
    /// The registry starts empty; `AppState::initialize` seeds it from the
    /// saved snapshot or with a search placeholder before anything
    /// observes it.
    pub fn new(items: Arc<ItemStore>, surfaces: Arc<dyn SurfaceFactory>) -> Self {
        Self {
            inner: Mutex::new(Vec::new()),
            published: ArcSwap::from_pointee(RegistryUpdate::default()),
            observers: Mutex::new(Vec::new()),
            items,
            surfaces,
        }
    }

    pub fn subscribe(&self, observer: Arc<dyn RegistryObserver>) {
        self.observers.lock().unwrap().push(observer);
    }

    // --- Reads ---

    /// Latest settled state, lock-free.
    pub fn snapshot(&self) -> Arc<RegistryUpdate> {
        self.published.load_full()
    }

    pub fn sessions(&self) -> Vec<SessionInfo> {
        self.published.load().sessions.clone()
    }

    pub fn current(&self) -> Option<SessionInfo> {
        self.published.load().current.clone()
    }

    pub fn get(&self, id: SessionId) -> Option<SessionInfo> {
        let sessions = self.inner.lock().unwrap();
        sessions.iter().find(|s| s.id == id).map(Session::info)
    }

    /// Most-recently-appended session showing exactly this URL.
    pub fn session_by_url(&self, url: &Url) -> Option<SessionInfo> {
        let sessions = self.inner.lock().unwrap();
        sessions
            .iter()
            .rev()
            .find(|s| s.url.as_ref() == Some(url))
            .map(Session::info)
    }

    /// First search placeholder, if one is open.
    pub fn search_placeholder_id(&self) -> Option<SessionId> {
        let sessions = self.inner.lock().unwrap();
        sessions
            .iter()
            .find(|s| s.kind == PageKind::Search)
            .map(|s| s.id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // --- Mutations ---

    /// Append one content session per URL and select the last one. An
    /// empty slice is a complete no-op: clearing and re-assigning the
    /// selection is one transaction here, so there is no exit path that
    /// leaves the registry without a current session.
    pub fn append_content_sessions(&self, urls: &[Url]) {
        if urls.is_empty() {
            return;
        }
        let new_sessions: Vec<Session> = urls
            .iter()
            .map(|url| {
                let id = Uuid::new_v4();
                Session::content(id, url.clone(), self.surfaces.create(id))
            })
            .collect();
        self.apply(move |sessions| {
            for session in sessions.iter_mut() {
                session.selected = false;
            }
            sessions.extend(new_sessions);
            let last = sessions.len() - 1;
            select_index(sessions, last);
            Some(Vec::new())
        });
    }

    pub fn append_content_session(&self, url: Url) {
        self.append_content_sessions(std::slice::from_ref(&url));
    }

    /// Append the search/keyword view as a new tab and select it.
    pub fn append_search_placeholder(&self, private_mode: bool) {
        self.apply(move |sessions| {
            sessions.push(Session::search(private_mode));
            let last = sessions.len() - 1;
            select_index(sessions, last);
            Some(Vec::new())
        });
    }

    /// Open a URL directly after the current tab and select it.
    pub fn insert_content_session(&self, url: Url, private_mode: bool) {
        let id = Uuid::new_v4();
        let mut session = Session::content(id, url, self.surfaces.create(id));
        session.private_mode = private_mode;
        self.apply(move |sessions| {
            let index = (selected_index(sessions) + 1).min(sessions.len());
            sessions.insert(index, session);
            select_index(sessions, index);
            Some(Vec::new())
        });
    }

    /// Exclusive selection; unknown ids are ignored.
    pub fn select(&self, id: SessionId) {
        self.apply(move |sessions| {
            if !select_id(sessions, id) {
                return None;
            }
            Some(Vec::new())
        });
    }

    /// Remove one session. If it was selected, selection moves to the
    /// session now occupying its index (or the new last element); closing
    /// a background tab never moves the cursor. Deleting the final
    /// session leaves a fresh, selected search placeholder behind.
    pub fn delete(&self, id: SessionId) {
        self.apply(move |sessions| {
            let pos = sessions.iter().position(|s| s.id == id)?;
            let was_selected = sessions[pos].selected;
            let was_last = pos + 1 == sessions.len();
            sessions.remove(pos);
            if sessions.is_empty() {
                let mut placeholder = Session::search(false);
                placeholder.selected = true;
                sessions.push(placeholder);
            } else if was_selected {
                let index = if was_last { sessions.len() - 1 } else { pos };
                select_index(sessions, index);
            }
            Some(Vec::new())
        });
    }

    /// Close every tab, or every unpinned tab. The current tab stays
    /// current when it survives the filter.
    pub fn delete_all(&self, include_pinned: bool) {
        info!("[Registry] Closing all tabs (include_pinned: {})", include_pinned);
        self.apply(move |sessions| {
            let current_id = sessions.iter().find(|s| s.selected).map(|s| s.id);
            if include_pinned {
                sessions.clear();
            } else {
                sessions.retain(|s| s.pinned);
            }
            repair_after_bulk_delete(sessions, current_id);
            Some(Vec::new())
        });
    }

    /// Close every private tab, keeping the current tab when it survives.
    pub fn delete_all_private(&self) {
        info!("[Registry] Closing all private tabs");
        self.apply(move |sessions| {
            let current_id = sessions.iter().find(|s| s.selected).map(|s| s.id);
            sessions.retain(|s| !s.private_mode);
            repair_after_bulk_delete(sessions, current_id);
            Some(Vec::new())
        });
    }

    /// Pin or unpin one tab, then repartition the strip into
    /// [pinned..][unpinned..] keeping relative order on both sides.
    /// Selection follows the session, not its position.
    pub fn set_pin(&self, id: SessionId, pinned: bool) {
        self.apply(move |sessions| {
            let session = sessions.iter_mut().find(|s| s.id == id)?;
            session.pinned = pinned;
            let current_id = sessions.iter().find(|s| s.selected).map(|s| s.id);
            let drained: Vec<Session> = sessions.drain(..).collect();
            let (mut reordered, unpinned): (Vec<Session>, Vec<Session>) =
                drained.into_iter().partition(|s| s.pinned);
            reordered.extend(unpinned);
            *sessions = reordered;
            if let Some(current_id) = current_id {
                select_id(sessions, current_id);
            }
            Some(Vec::new())
        });
    }

    pub fn set_private_mode(&self, id: SessionId, mode: bool) {
        self.apply(move |sessions| {
            let session = sessions.iter_mut().find(|s| s.id == id)?;
            session.private_mode = mode;
            Some(Vec::new())
        });
    }

    /// Bring the search view forward: select the existing placeholder
    /// (switching its private flag) or open a new one.
    pub fn show_search(&self, private_mode: bool) {
        self.apply(move |sessions| {
            match sessions.iter().position(|s| s.kind == PageKind::Search) {
                Some(index) => {
                    sessions[index].private_mode = private_mode;
                    select_index(sessions, index);
                }
                None => {
                    sessions.push(Session::search(private_mode));
                    let last = sessions.len() - 1;
                    select_index(sessions, last);
                }
            }
            Some(Vec::new())
        });
    }

    /// Navigation request for one session. A search placeholder converts
    /// to a content session in place (exactly once); a content session
    /// loads the URL into its existing surface.
    pub fn open_url(&self, id: SessionId, url: Url) {
        let needs_conversion = {
            let sessions = self.inner.lock().unwrap();
            match sessions.iter().find(|s| s.id == id) {
                None => return,
                Some(session) => session.kind == PageKind::Search,
            }
        };

        if !needs_conversion {
            self.apply(move |sessions| {
                let session = sessions.iter_mut().find(|s| s.id == id)?;
                let surface = session.surface.clone()?;
                session.content_loaded = true;
                Some(vec![(surface, url)])
            });
            return;
        }

        // First navigation: create the surface outside the lock, then
        // convert. The kind is re-checked in case it flipped in between.
        let surface = self.surfaces.create(id);
        self.apply(move |sessions| {
            let session = sessions.iter_mut().find(|s| s.id == id)?;
            match session.kind {
                PageKind::Search => {
                    session.convert_to_content(url.clone(), surface.clone());
                    Some(vec![(surface, url)])
                }
                PageKind::Content => {
                    let existing = session.surface.clone()?;
                    session.content_loaded = true;
                    Some(vec![(existing, url)])
                }
            }
        });
    }

    pub fn reload(&self, id: SessionId) {
        if let Some(surface) = self.surface_of(id) {
            surface.reload();
        }
    }

    pub fn go_back(&self, id: SessionId) {
        if let Some(surface) = self.surface_of(id) {
            surface.go_back();
        }
    }

    pub fn go_forward(&self, id: SessionId) {
        if let Some(surface) = self.surface_of(id) {
            surface.go_forward();
        }
    }

    fn surface_of(&self, id: SessionId) -> Option<Arc<dyn ContentSurface>> {
        let sessions = self.inner.lock().unwrap();
        sessions
            .iter()
            .find(|s| s.id == id)
            .and_then(|s| s.surface.clone())
    }

    /// Completion from a content surface, marshaled onto the registry.
    /// Events for sessions that have since been deleted are discarded.
    pub fn handle_page_event(&self, id: SessionId, event: PageEvent) {
        match event {
            PageEvent::NewTabRequested(url) => {
                self.insert_content_session(url, false);
            }
            PageEvent::ExternalSchemeRequested(url) => {
                // Close the tab that bounced us out to the App Store.
                if navigation::is_app_store_url(&url) {
                    info!("[Registry] App Store launched, closing tab {}", id);
                    self.delete(id);
                }
            }
            PageEvent::NavigationFinished { url, title } => {
                if self.get(id).is_none() {
                    return;
                }
                let _ = self.items.add(NewItem::history(title, url, id));
            }
            event => self.apply(move |sessions| {
                let session = sessions.iter_mut().find(|s| s.id == id)?;
                match event {
                    PageEvent::TitleChanged(title) => session.title = title,
                    PageEvent::UrlChanged(url) => session.url = Some(url),
                    PageEvent::LoadingChanged(loading) => session.loading = loading,
                    PageEvent::ProgressChanged(progress) => session.progress = progress,
                    PageEvent::CanGoBackChanged(can) => session.can_go_back = can,
                    PageEvent::CanGoForwardChanged(can) => session.can_go_forward = can,
                    PageEvent::Scrolled(offset) => session.scroll_offset = offset,
                    PageEvent::DragEnded { velocity } => session.scroll_velocity = velocity,
                    // Routed above.
                    PageEvent::NewTabRequested(_)
                    | PageEvent::NavigationFinished { .. }
                    | PageEvent::ExternalSchemeRequested(_) => {}
                }
                Some(Vec::new())
            }),
        }
    }

    /// Seed the registry from the persisted snapshot. Content is not
    /// loaded here; the selected tab loads through the usual lazy path.
    pub fn restore(&self, saved: Vec<SavedTab>) {
        if saved.is_empty() {
            return;
        }
        info!("[Registry] Restoring {} saved tabs", saved.len());
        let mut restored: Vec<Session> = saved
            .into_iter()
            .map(|tab| {
                let id = Uuid::new_v4();
                let mut session = Session::content(id, tab.url, self.surfaces.create(id));
                session.title = tab.title;
                session.pinned = tab.pinned;
                session.selected = tab.selected;
                session
            })
            .collect();
        // Exactly one selection; the last marked entry wins, or the last
        // tab when the snapshot carries none.
        let chosen = restored
            .iter()
            .rposition(|s| s.selected)
            .unwrap_or(restored.len() - 1);
        for (index, session) in restored.iter_mut().enumerate() {
            session.selected = index == chosen;
        }
        self.apply(move |sessions| {
            *sessions = restored;
            Some(Vec::new())
        });
    }

    // Locked mutation, then publish/notify/load outside the lock. A
    // closure returning None means no-op: nothing is published.
    fn apply<F>(&self, mutate: F)
    where
        F: FnOnce(&mut Vec<Session>) -> Option<Vec<SurfaceLoad>>,
    {
        let (update, loads) = {
            let mut sessions = self.inner.lock().unwrap();
            let Some(mut loads) = mutate(&mut sessions) else {
                return;
            };
            loads.extend(lazy_loads(&mut sessions));
            (snapshot_of(&sessions), loads)
        };
        self.published.store(Arc::new(update.clone()));
        let observers: Vec<Arc<dyn RegistryObserver>> =
            self.observers.lock().unwrap().iter().cloned().collect();
        for observer in observers {
            observer.registry_changed(&update);
        }
        for (surface, url) in loads {
            surface.load(&url);
        }
    }
}

fn snapshot_of(sessions: &[Session]) -> RegistryUpdate {
    let infos: Vec<SessionInfo> = sessions.iter().map(Session::info).collect();
    let current = infos.iter().find(|s| s.selected).cloned();
    RegistryUpdate {
        sessions: infos,
        current,
    }
}

fn selected_index(sessions: &[Session]) -> usize {
    sessions.iter().position(|s| s.selected).unwrap_or(0)
}

fn select_index(sessions: &mut [Session], index: usize) {
    for (i, session) in sessions.iter_mut().enumerate() {
        session.selected = i == index;
    }
}

fn select_id(sessions: &mut [Session], id: SessionId) -> bool {
    if !sessions.iter().any(|s| s.id == id) {
        return false;
    }
    for session in sessions.iter_mut() {
        session.selected = session.id == id;
    }
    true
}

fn repair_after_bulk_delete(sessions: &mut Vec<Session>, current_id: Option<SessionId>) {
    if sessions.is_empty() {
        let mut placeholder = Session::search(false);
        placeholder.selected = true;
        sessions.push(placeholder);
        return;
    }
    let survived = current_id.filter(|id| sessions.iter().any(|s| s.id == *id));
    match survived {
        Some(id) => {
            select_id(sessions, id);
        }
        None => {
            let last = sessions.len() - 1;
            select_index(sessions, last);
        }
    }
}

// The deferred first load: whenever a mutation settles with an unloaded
// content session selected, load it exactly once and latch the flag.
fn lazy_loads(sessions: &mut [Session]) -> Vec<SurfaceLoad> {
    let mut loads = Vec::new();
    if let Some(session) = sessions.iter_mut().find(|s| s.selected) {
        if session.kind == PageKind::Content && !session.content_loaded {
            if let (Some(url), Some(surface)) = (session.url.clone(), session.surface.clone()) {
                session.content_loaded = true;
                loads.push((surface, url));
            }
        }
    }
    loads
}
