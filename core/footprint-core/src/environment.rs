//! Host capabilities: page location, referrer, user agent, scroll geometry, time.
//!
//! The tracker never reaches for ambient globals. Hosts implement
//! [`Environment`] and [`Clock`]; tests use [`StaticEnvironment`] and
//! [`ManualClock`] for deterministic runs.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;

use chrono::Utc;

/// Scroll geometry of the current document, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub viewport_height: f64,
    pub document_height: f64,
}

impl ScrollMetrics {
    /// Percentage of the document that has been on screen, capped at 100.
    /// Returns `None` when the document has no height.
    pub fn depth_percent(&self) -> Option<f64> {
        if self.document_height <= 0.0 {
            return None;
        }
        let seen = (self.scroll_top + self.viewport_height) / self.document_height * 100.0;
        Some(seen.clamp(0.0, 100.0))
    }
}

/// Read-only view of the page the tracker runs in.
pub trait Environment: Send + Sync {
    /// Full URL of the current page, including the query string.
    fn current_url(&self) -> String;

    /// `document.referrer`-style value; empty when there is none.
    fn referrer(&self) -> String;

    fn user_agent(&self) -> String;

    /// Current scroll geometry, if the host can measure it.
    fn scroll_metrics(&self) -> Option<ScrollMetrics> {
        None
    }
}

/// Source of "now" in epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// Wall clock backed by `chrono::Utc`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(now_ms),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: i64) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default)]
struct PageState {
    url: String,
    referrer: String,
    user_agent: String,
    scroll: Option<ScrollMetrics>,
}

/// A settable [`Environment`], used by the CLI and by tests.
#[derive(Debug, Default)]
pub struct StaticEnvironment {
    state: RwLock<PageState>,
}

impl StaticEnvironment {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            state: RwLock::new(PageState {
                url: url.into(),
                ..PageState::default()
            }),
        }
    }

    pub fn with_referrer(self, referrer: impl Into<String>) -> Self {
        self.write().referrer = referrer.into();
        self
    }

    pub fn with_user_agent(self, user_agent: impl Into<String>) -> Self {
        self.write().user_agent = user_agent.into();
        self
    }

    pub fn set_url(&self, url: impl Into<String>) {
        self.write().url = url.into();
    }

    pub fn set_referrer(&self, referrer: impl Into<String>) {
        self.write().referrer = referrer.into();
    }

    pub fn set_scroll(&self, metrics: ScrollMetrics) {
        self.write().scroll = Some(metrics);
    }

    // Recover from poisoning - page state is plain data, a torn write is harmless
    fn read(&self) -> std::sync::RwLockReadGuard<'_, PageState> {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, PageState> {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Environment for StaticEnvironment {
    fn current_url(&self) -> String {
        self.read().url.clone()
    }

    fn referrer(&self) -> String {
        self.read().referrer.clone()
    }

    fn user_agent(&self) -> String {
        self.read().user_agent.clone()
    }

    fn scroll_metrics(&self) -> Option<ScrollMetrics> {
        self.read().scroll
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_percent() {
        let metrics = ScrollMetrics {
            scroll_top: 400.0,
            viewport_height: 600.0,
            document_height: 2000.0,
        };
        assert_eq!(metrics.depth_percent(), Some(50.0));
    }

    #[test]
    fn test_depth_percent_caps_and_guards() {
        let overscrolled = ScrollMetrics {
            scroll_top: 2000.0,
            viewport_height: 600.0,
            document_height: 2000.0,
        };
        assert_eq!(overscrolled.depth_percent(), Some(100.0));

        let empty = ScrollMetrics {
            scroll_top: 0.0,
            viewport_height: 600.0,
            document_height: 0.0,
        };
        assert_eq!(empty.depth_percent(), None);
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(1_000);
        clock.advance(500);
        assert_eq!(clock.now_ms(), 1_500);
        clock.set(10);
        assert_eq!(clock.now_ms(), 10);
    }

    #[test]
    fn test_static_environment_setters() {
        let env = StaticEnvironment::new("https://a.example/")
            .with_referrer("https://b.example/")
            .with_user_agent("UA");
        env.set_url("https://a.example/next");
        assert_eq!(env.current_url(), "https://a.example/next");
        assert_eq!(env.referrer(), "https://b.example/");
        assert_eq!(env.user_agent(), "UA");
        assert!(env.scroll_metrics().is_none());
    }
}
