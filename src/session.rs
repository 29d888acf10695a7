// Per-tab session model and the content-surface seam.
// Sessions are owned and mutated by the registry; everything here is
// plain data plus the traits the platform webview layer implements.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

pub type SessionId = Uuid;

/// What a tab is showing: a loaded web page, or the search/keyword view
/// a fresh tab starts on. A `Search` session converts to `Content` exactly
/// once, on its first navigation; the conversion is irreversible.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PageKind {
    Content,
    Search,
}

/// 2D scroll vector (content offset or fling velocity).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Events a content surface reports back to the registry.
/// Surface implementations marshal these onto the registry thread via
/// `SessionRegistry::handle_page_event`; events for sessions that no longer
/// exist are discarded there.
#[derive(Clone, Debug)]
pub enum PageEvent {
    TitleChanged(String),
    UrlChanged(Url),
    LoadingChanged(bool),
    ProgressChanged(f32),
    CanGoBackChanged(bool),
    CanGoForwardChanged(bool),
    Scrolled(Point),
    DragEnded { velocity: Point },
    /// The page asked for a link to open in a new tab.
    NewTabRequested(Url),
    /// A main-frame navigation committed and finished loading.
    NavigationFinished { url: Url, title: String },
    /// The page navigated to a non-web scheme handled by another app.
    ExternalSchemeRequested(Url),
}

/// Rendering surface of one content session (a webview, in the shell).
pub trait ContentSurface: Send + Sync {
    fn load(&self, url: &Url);
    fn go_back(&self);
    fn go_forward(&self);
    fn reload(&self);
}

/// Creates the surface backing a content session. Injected into the
/// registry so tests can substitute a recording fake.
pub trait SurfaceFactory: Send + Sync {
    fn create(&self, session: SessionId) -> Arc<dyn ContentSurface>;
}

/// One open tab. Only the registry mutates sessions; observers get
/// `SessionInfo` snapshots.
pub(crate) struct Session {
    pub id: SessionId,
    pub kind: PageKind,
    /// None exactly while `kind == Search`.
    pub url: Option<Url>,
    pub title: String,
    pub pinned: bool,
    pub private_mode: bool,
    pub selected: bool,
    pub loading: bool,
    pub progress: f32,
    pub can_go_back: bool,
    pub can_go_forward: bool,
    pub scroll_offset: Point,
    pub scroll_velocity: Point,
    /// One-way latch: set by the first load so re-selecting a tab never
    /// reloads it.
    pub content_loaded: bool,
    /// None exactly while `kind == Search`.
    pub surface: Option<Arc<dyn ContentSurface>>,
}

impl Session {
    pub fn content(id: SessionId, url: Url, surface: Arc<dyn ContentSurface>) -> Self {
        Self {
            id,
            kind: PageKind::Content,
            url: Some(url),
            title: String::new(),
            pinned: false,
            private_mode: false,
            selected: false,
            loading: false,
            progress: 0.0,
            can_go_back: false,
            can_go_forward: false,
            scroll_offset: Point::default(),
            scroll_velocity: Point::default(),
            content_loaded: false,
            surface: Some(surface),
        }
    }

    pub fn search(private_mode: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: PageKind::Search,
            url: None,
            title: String::new(),
            pinned: false,
            private_mode,
            selected: false,
            loading: false,
            progress: 0.0,
            can_go_back: false,
            can_go_forward: false,
            scroll_offset: Point::default(),
            scroll_velocity: Point::default(),
            content_loaded: false,
            surface: None,
        }
    }

    /// Irreversible search -> content conversion, performed on the first
    /// navigation request. Sets the load latch so a later re-selection
    /// cannot trigger a duplicate load.
    pub fn convert_to_content(&mut self, url: Url, surface: Arc<dyn ContentSurface>) {
        debug_assert_eq!(self.kind, PageKind::Search);
        self.kind = PageKind::Content;
        self.url = Some(url);
        self.surface = Some(surface);
        self.content_loaded = true;
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id,
            kind: self.kind,
            url: self.url.clone(),
            title: self.title.clone(),
            pinned: self.pinned,
            private_mode: self.private_mode,
            selected: self.selected,
            loading: self.loading,
            progress: self.progress,
            can_go_back: self.can_go_back,
            can_go_forward: self.can_go_forward,
            scroll_offset: self.scroll_offset,
            scroll_velocity: self.scroll_velocity,
            content_loaded: self.content_loaded,
        }
    }
}

/// Plain-data view of a session, published to observers and the UI layer.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: SessionId,
    pub kind: PageKind,
    pub url: Option<Url>,
    pub title: String,
    pub pinned: bool,
    pub private_mode: bool,
    pub selected: bool,
    pub loading: bool,
    pub progress: f32,
    pub can_go_back: bool,
    pub can_go_forward: bool,
    pub scroll_offset: Point,
    pub scroll_velocity: Point,
    pub content_loaded: bool,
}
