// Tab strip projection - pure logic, no platform imports.
// Maps a registry snapshot to the rows the tab strip renders.

use serde::Serialize;
use url::Url;

use crate::registry::RegistryUpdate;
use crate::session::{PageKind, SessionId};

/// Title shown on the search placeholder's tab.
pub const SEARCH_TAB_TITLE: &str = "Search";

/// One row in the tab strip.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    pub id: SessionId,
    pub kind: PageKind,
    pub title: String,
    pub url: Option<Url>,
    pub active: bool,
    pub loading: bool,
    pub progress: f32,
    pub pinned: bool,
    pub private_mode: bool,
}

/// Rows for the current session list. A search placeholder renders with a
/// fixed title and no URL, and never shows as pinned or loading.
pub fn tab_strip(update: &RegistryUpdate) -> Vec<Tab> {
    update
        .sessions
        .iter()
        .map(|session| match session.kind {
            PageKind::Content => Tab {
                id: session.id,
                kind: PageKind::Content,
                title: session.title.clone(),
                url: session.url.clone(),
                active: session.selected,
                loading: session.loading,
                progress: session.progress,
                pinned: session.pinned,
                private_mode: session.private_mode,
            },
            PageKind::Search => Tab {
                id: session.id,
                kind: PageKind::Search,
                title: SEARCH_TAB_TITLE.to_string(),
                url: None,
                active: session.selected,
                loading: false,
                progress: 0.0,
                pinned: false,
                private_mode: session.private_mode,
            },
        })
        .collect()
}

/// Index of the active row, for the strip's scroll position.
pub fn selected_index(update: &RegistryUpdate) -> usize {
    update
        .sessions
        .iter()
        .position(|session| session.selected)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Point, SessionInfo};
    use uuid::Uuid;

    fn content(url_str: &str, selected: bool) -> SessionInfo {
        SessionInfo {
            id: Uuid::new_v4(),
            kind: PageKind::Content,
            url: Some(Url::parse(url_str).unwrap()),
            title: format!("page {}", url_str),
            pinned: true,
            private_mode: false,
            selected,
            loading: true,
            progress: 0.25,
            can_go_back: false,
            can_go_forward: false,
            scroll_offset: Point::default(),
            scroll_velocity: Point::default(),
            content_loaded: true,
        }
    }

    fn search(selected: bool) -> SessionInfo {
        SessionInfo {
            id: Uuid::new_v4(),
            kind: PageKind::Search,
            url: None,
            title: String::new(),
            pinned: false,
            private_mode: true,
            selected,
            loading: false,
            progress: 0.0,
            can_go_back: false,
            can_go_forward: false,
            scroll_offset: Point::default(),
            scroll_velocity: Point::default(),
            content_loaded: false,
        }
    }

    fn update_of(sessions: Vec<SessionInfo>) -> RegistryUpdate {
        let current = sessions.iter().find(|s| s.selected).cloned();
        RegistryUpdate { sessions, current }
    }

    #[test]
    fn content_rows_carry_session_state_through() {
        let update = update_of(vec![content("https://a.test", true)]);
        let rows = tab_strip(&update);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "page https://a.test");
        assert_eq!(rows[0].url, Some(Url::parse("https://a.test").unwrap()));
        assert!(rows[0].active);
        assert!(rows[0].loading);
        assert!(rows[0].pinned);
    }

    #[test]
    fn search_rows_use_the_fixed_title_and_hide_page_state() {
        let update = update_of(vec![content("https://a.test", false), search(true)]);
        let rows = tab_strip(&update);

        assert_eq!(rows[1].title, SEARCH_TAB_TITLE);
        assert!(rows[1].url.is_none());
        assert!(!rows[1].loading);
        assert!(!rows[1].pinned);
        assert!(rows[1].private_mode);
        assert!(rows[1].active);
    }

    #[test]
    fn selected_index_follows_the_active_row() {
        let update = update_of(vec![content("https://a.test", false), search(true)]);
        assert_eq!(selected_index(&update), 1);

        let empty = RegistryUpdate::default();
        assert_eq!(selected_index(&empty), 0);
    }
}
