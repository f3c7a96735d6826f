//! Single-page-app navigation detection.

use footprint_protocol::{EventEnvelope, VIRTUAL_PAGE_VIEW};

#[derive(Debug, Clone)]
pub struct NavigationDetector {
    last_url: String,
}

impl NavigationDetector {
    pub fn new(initial_url: impl Into<String>) -> Self {
        Self {
            last_url: initial_url.into(),
        }
    }

    /// Returns a `virtual_page_view` event when the location actually changed.
    pub fn observe(&mut self, url: &str) -> Option<EventEnvelope> {
        if url == self.last_url {
            return None;
        }
        let from = std::mem::replace(&mut self.last_url, url.to_string());
        Some(
            EventEnvelope::new(VIRTUAL_PAGE_VIEW)
                .field("from", from)
                .field("to", url.to_string()),
        )
    }

    pub fn current_url(&self) -> &str {
        &self.last_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_change_emits_from_and_to() {
        let mut detector = NavigationDetector::new("https://shop.example/");
        let event = detector.observe("https://shop.example/cart").unwrap();
        assert_eq!(
            event.to_value(),
            json!({
                "event": "virtual_page_view",
                "from": "https://shop.example/",
                "to": "https://shop.example/cart"
            })
        );
        assert_eq!(detector.current_url(), "https://shop.example/cart");
    }

    #[test]
    fn test_same_url_is_ignored() {
        let mut detector = NavigationDetector::new("https://shop.example/");
        assert!(detector.observe("https://shop.example/").is_none());
        assert!(detector.observe("https://shop.example/a").is_some());
        assert!(detector.observe("https://shop.example/a").is_none());
    }
}
