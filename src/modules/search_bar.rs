// Search/address bar controller: turns submitted text into navigation,
// records search keywords, and routes URLs opened from the search view.

use std::sync::Arc;

use log::warn;
use url::Url;

use crate::items::{ItemStore, ItemType, NewItem};
use crate::modules::navigation;
use crate::registry::SessionRegistry;
use crate::session::PageKind;
use crate::settings::SettingsStore;

pub struct SearchBar {
    registry: Arc<SessionRegistry>,
    items: Arc<ItemStore>,
    settings: Arc<SettingsStore>,
}

impl SearchBar {
    pub fn new(
        registry: Arc<SessionRegistry>,
        items: Arc<ItemStore>,
        settings: Arc<SettingsStore>,
    ) -> Self {
        Self {
            registry,
            items,
            settings,
        }
    }

    /// Committed address-bar input. Plain text becomes a search-engine
    /// query and is remembered as a keyword record; URLs navigate as-is.
    pub fn submit(&self, text: &str) {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return;
        }
        let engine = self.settings.search_engine();
        let Some(url) = navigation::location_url(trimmed, engine) else {
            return;
        };
        if !navigation::is_probable_url(trimmed) {
            // Save keywords
            match self.registry.current() {
                Some(current) => {
                    let _ = self.items.add(NewItem::keyword(trimmed, url.clone(), current.id));
                }
                None => warn!("[SearchBar] No current session to own the keyword record"),
            }
        }
        self.open_url(&url);
    }

    /// Open a URL from the bar. From the search view this jumps to an
    /// existing tab with the same URL (or opens a new one) and then
    /// closes the search view; from a content tab it navigates in place.
    pub fn open_url(&self, url: &Url) {
        let Some(current) = self.registry.current() else {
            return;
        };
        match current.kind {
            PageKind::Search => {
                match self.registry.session_by_url(url) {
                    Some(existing) => self.registry.select(existing.id),
                    None => self.registry.append_content_session(url.clone()),
                }
                // Close search view
                if let Some(placeholder) = self.registry.search_placeholder_id() {
                    self.registry.delete(placeholder);
                }
            }
            PageKind::Content => self.registry.open_url(current.id, url.clone()),
        }
    }

    /// Live input: surface matching keyword records while typing.
    pub fn set_entered_text(&self, text: &str) {
        self.items.set_type(ItemType::Keywords);
        self.items.set_filter_text(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ContentSurface, SessionId, SurfaceFactory};
    use tempfile::TempDir;

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

    fn setup() -> (TempDir, Arc<ItemStore>, Arc<SessionRegistry>, SearchBar) {
        let dir = TempDir::new().unwrap();
        let items = Arc::new(ItemStore::new(dir.path()));
        let settings = Arc::new(SettingsStore::new(dir.path()));
        let registry = Arc::new(SessionRegistry::new(items.clone(), Arc::new(NullFactory)));
        let bar = SearchBar::new(registry.clone(), items.clone(), settings);
        (dir, items, registry, bar)
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn submitting_text_searches_and_saves_a_keyword() {
        let (_dir, items, registry, bar) = setup();
        registry.append_search_placeholder(false);

        bar.submit("rust lifetimes");

        // The search landed in a new content tab and the placeholder is
        // gone.
        let sessions = registry.sessions();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].kind, PageKind::Content);
        assert!(sessions[0].selected);
        assert_eq!(
            sessions[0].url.as_ref().unwrap().as_str(),
            "https://www.google.com/search?q=rust%20lifetimes"
        );

        let keywords = items.query(ItemType::Keywords, "");
        assert_eq!(keywords.len(), 1);
        assert_eq!(keywords[0].keywords, "rust lifetimes");
        assert_eq!(keywords[0].title, "rust lifetimes");
    }

    #[test]
    fn submitting_a_url_does_not_save_a_keyword() {
        let (_dir, items, registry, bar) = setup();
        registry.append_search_placeholder(false);

        bar.submit("example.com");

        assert!(items.query(ItemType::Keywords, "").is_empty());
        let sessions = registry.sessions();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].url, Some(url("https://example.com/")));
    }

    #[test]
    fn repeating_a_search_reuses_the_keyword_record() {
        let (_dir, items, registry, bar) = setup();
        registry.append_search_placeholder(false);
        bar.submit("rust");

        registry.show_search(false);
        bar.submit("rust");

        assert_eq!(items.query(ItemType::Keywords, "").len(), 1);
    }

    #[test]
    fn opening_a_url_from_search_jumps_to_an_existing_tab() {
        let (_dir, _items, registry, bar) = setup();
        registry.append_content_sessions(&[url("https://a.test"), url("https://b.test")]);
        let existing = registry.sessions()[0].id;
        registry.show_search(false);
        assert_eq!(registry.len(), 3);

        bar.open_url(&url("https://a.test"));

        // Jumped to the existing tab, search view closed, nothing opened.
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.current().unwrap().id, existing);
    }

    #[test]
    fn opening_from_a_content_tab_navigates_in_place() {
        let (_dir, _items, registry, bar) = setup();
        registry.append_content_sessions(&[url("https://a.test")]);
        let id = registry.sessions()[0].id;

        bar.open_url(&url("https://b.test"));

        // Same tab; the page navigates rather than a new tab opening.
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.sessions()[0].id, id);
    }

    #[test]
    fn empty_input_is_ignored() {
        let (_dir, items, registry, bar) = setup();
        registry.append_search_placeholder(false);

        bar.submit("   ");

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.sessions()[0].kind, PageKind::Search);
        assert!(items.is_empty());
    }

    #[test]
    fn typing_filters_the_keyword_stream() {
        let (_dir, items, registry, bar) = setup();
        registry.append_search_placeholder(false);
        bar.submit("rust lifetimes");
        registry.show_search(false);
        bar.submit("python asyncio");

        bar.set_entered_text("rust");

        let published = items.items();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].keywords, "rust lifetimes");
    }
}
