//! Tab transition classification.
//!
//! Tracks the last URL seen for every open tab and turns each new
//! observation into a [`Transition`]. No I/O happens here.

use std::collections::HashMap;

use crate::tab::{TabId, Transition};

#[derive(Debug, Default)]
pub struct TabStates {
    urls: HashMap<TabId, String>,
}

impl TabStates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies a completed load of `url` in `tab_id` and records it.
    pub fn observed(&mut self, tab_id: TabId, url: &str) -> Transition {
        let kind = match self.urls.get(&tab_id) {
            None => Transition::Load,
            Some(previous) if previous == url => Transition::Reload,
            Some(previous) => {
                let (previous_base, previous_fragment) = split_fragment(previous);
                let (base, fragment) = split_fragment(url);
                if previous_base == base && previous_fragment != fragment {
                    Transition::HashChange
                } else {
                    Transition::Load
                }
            }
        };
        self.urls.insert(tab_id, url.to_string());
        kind
    }

    /// Forgets `tab_id`, returning the last URL it had if it was tracked.
    /// The transition is always [`Transition::Close`].
    pub fn closed(&mut self, tab_id: TabId) -> (Transition, Option<String>) {
        (Transition::Close, self.urls.remove(&tab_id))
    }

    pub fn url(&self, tab_id: TabId) -> Option<&str> {
        self.urls.get(&tab_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn clear(&mut self) {
        self.urls.clear();
    }
}

/// Splits on the first `#`. `page#` has an empty but present fragment.
fn split_fragment(url: &str) -> (&str, Option<&str>) {
    match url.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (url, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "https://example.com/page";

    #[test]
    fn full_lifecycle_sequence() {
        let mut states = TabStates::new();
        let mut kinds = vec![
            states.observed(1, PAGE),
            states.observed(1, PAGE),
            states.observed(1, &format!("{PAGE}#frag1")),
            states.observed(1, &format!("{PAGE}#frag2")),
            states.observed(1, PAGE),
        ];
        kinds.push(states.closed(1).0);

        assert_eq!(
            kinds,
            vec![
                Transition::Load,
                Transition::Reload,
                Transition::HashChange,
                Transition::HashChange,
                Transition::HashChange,
                Transition::Close,
            ]
        );
        assert!(states.is_empty());
    }

    #[test]
    fn base_change_is_a_load() {
        let mut states = TabStates::new();
        states.observed(1, "https://a.test/one#x");
        assert_eq!(states.observed(1, "https://a.test/two#x"), Transition::Load);
        assert_eq!(states.url(1), Some("https://a.test/two#x"));
    }

    #[test]
    fn empty_fragment_differs_from_none() {
        let mut states = TabStates::new();
        states.observed(1, PAGE);
        assert_eq!(states.observed(1, &format!("{PAGE}#")), Transition::HashChange);
        assert_eq!(states.observed(1, PAGE), Transition::HashChange);
    }

    #[test]
    fn fragment_is_everything_after_first_hash() {
        let mut states = TabStates::new();
        states.observed(1, "https://a.test/#a#b");
        assert_eq!(states.observed(1, "https://a.test/#a#c"), Transition::HashChange);
    }

    #[test]
    fn close_of_unknown_tab_still_reports_close() {
        let mut states = TabStates::new();
        assert_eq!(states.closed(99), (Transition::Close, None));
        assert!(states.is_empty());
    }

    #[test]
    fn close_returns_last_url_and_reuse_is_a_load() {
        let mut states = TabStates::new();
        states.observed(5, PAGE);
        assert_eq!(states.closed(5), (Transition::Close, Some(PAGE.to_string())));
        assert_eq!(states.observed(5, PAGE), Transition::Load);
    }

    #[test]
    fn tabs_are_tracked_independently() {
        let mut states = TabStates::new();
        states.observed(1, PAGE);
        assert_eq!(states.observed(2, PAGE), Transition::Load);
        assert_eq!(states.observed(1, PAGE), Transition::Reload);
        assert_eq!(states.len(), 2);
    }
}
