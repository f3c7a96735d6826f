//! Tracker - the main entry point for host pages.
//!
//! A `Tracker` owns everything one page activation needs: configuration, the
//! record store, resolved connectors, the deferred-task queue, and the
//! per-page signal producers. It is:
//! - **Synchronous**: hosts drive deferred work with [`Tracker::run_due_tasks`]
//! - **Non-throwing**: storage and connector failures are logged, never returned
//! - **Explicit**: all environment access goes through [`Capabilities`]
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use footprint_core::{Capabilities, StaticEnvironment, Tracker, TrackerConfig};
//!
//! let env = Arc::new(StaticEnvironment::new("https://shop.example/?utm_source=news"));
//! let mut tracker = Tracker::init(TrackerConfig::default(), Capabilities::in_memory(env))?;
//! println!("{:?}", tracker.data_layer().event_names());
//! ```

use std::sync::Arc;

use footprint_protocol::{
    EventEnvelope, FIRST_VISIT, NEW_VISIT_SOURCE, PAGE_LOAD, VISIT_ENGAGED, VISIT_START,
};
use serde_json::{json, Map, Value};

use crate::attribution::build_source;
use crate::config::TrackerConfig;
use crate::connectors::{ConnectorSinks, DataLayer, DispatchReport, Dispatcher, TagCallLog};
use crate::device::DeviceType;
use crate::environment::{Clock, Environment, ScrollMetrics, SystemClock};
use crate::error::{FootprintError, Result};
use crate::ids::{IdGenerator, UlidGenerator};
use crate::scheduler::{Scheduler, TaskKind};
use crate::session::{
    next_record, promote_engaged, EngagementOutcome, Transition, TransitionFlags, TransitionInput,
};
use crate::signals::{
    AdBlockProbe, ErrorReport, ErrorTracker, NavigationDetector, ScrollDepthTracker,
    VitalsCollector,
};
use crate::storage::{CookieJar, KeyValueStore, MemoryCookieJar, MemoryStore, RecordStore};
use crate::types::{IdentityRecord, RecordKind};

/// Host-provided capabilities the tracker depends on.
#[derive(Clone)]
pub struct Capabilities {
    pub environment: Arc<dyn Environment>,
    pub store: Arc<dyn KeyValueStore>,
    pub cookies: Arc<dyn CookieJar>,
    pub clock: Arc<dyn Clock>,
    pub ids: Arc<dyn IdGenerator>,
    pub ad_block_probe: Option<Arc<dyn AdBlockProbe>>,
}

impl Capabilities {
    pub fn new(
        environment: Arc<dyn Environment>,
        store: Arc<dyn KeyValueStore>,
        cookies: Arc<dyn CookieJar>,
    ) -> Self {
        Self {
            environment,
            store,
            cookies,
            clock: Arc::new(SystemClock),
            ids: Arc::new(UlidGenerator),
            ad_block_probe: None,
        }
    }

    /// Fresh in-memory store and cookie jar with the system clock.
    pub fn in_memory(environment: Arc<dyn Environment>) -> Self {
        Self::new(
            environment,
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryCookieJar::new()),
        )
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_ad_block_probe(mut self, probe: Arc<dyn AdBlockProbe>) -> Self {
        self.ad_block_probe = Some(probe);
        self
    }
}

/// Per-page producers; replaced on every activation.
struct PageSignals {
    scroll: ScrollDepthTracker,
    errors: ErrorTracker,
    navigation: NavigationDetector,
    vitals: VitalsCollector,
}

impl PageSignals {
    fn new(config: &TrackerConfig, url: &str) -> Self {
        Self {
            scroll: ScrollDepthTracker::new(&config.scroll_thresholds),
            errors: ErrorTracker::new(),
            navigation: NavigationDetector::new(url),
            vitals: VitalsCollector::new(),
        }
    }
}

pub struct Tracker {
    config: TrackerConfig,
    caps: Capabilities,
    store: RecordStore,
    sinks: ConnectorSinks,
    dispatcher: Dispatcher,
    scheduler: Scheduler,
    record: Option<IdentityRecord>,
    flags: TransitionFlags,
    device_type: DeviceType,
    page: PageSignals,
}

impl Tracker {
    /// Validates the config, resolves connectors, and runs the first activation.
    ///
    /// Only an invalid config is an error; everything after that degrades.
    pub fn init(config: TrackerConfig, caps: Capabilities) -> Result<Self> {
        let mut tracker = Self::attach(config, caps)?;
        tracker.activate();
        Ok(tracker)
    }

    /// Builds a tracker over the existing persisted state without activating.
    ///
    /// Used by hosts that only need accessors, mutators, or a deferred check
    /// (the CLI's `show`, `set-data`, `tick`). No events are dispatched.
    pub fn attach(config: TrackerConfig, caps: Capabilities) -> Result<Self> {
        config.validate()?;

        let sinks = ConnectorSinks::default();
        let dispatcher = Dispatcher::resolve(&config.connectors, &sinks);
        let store = RecordStore::new(
            Arc::clone(&caps.store),
            Arc::clone(&caps.cookies),
            config.cookie_name.clone(),
        );
        let url = caps.environment.current_url();

        Ok(Self {
            page: PageSignals::new(&config, &url),
            record: store.load(),
            flags: TransitionFlags::default(),
            device_type: DeviceType::detect(&caps.environment.user_agent()),
            scheduler: Scheduler::new(),
            config,
            caps,
            store,
            sinks,
            dispatcher,
        })
    }

    /// One page activation: attribution → transition → persist → events → timers.
    ///
    /// Calling it again models a reload: page-scoped producers and pending
    /// tasks are discarded, as a browser would discard them.
    pub fn activate(&mut self) {
        let now = self.caps.clock.now_ms();
        let url = self.caps.environment.current_url();
        let transition = resolve_transition(&self.config, &self.caps, &self.store, &url, now);
        self.apply(transition, &url, now);
    }

    fn apply(&mut self, transition: Transition, url: &str, now: i64) {
        let record = transition.record;
        self.store.save(&record);
        self.flags = transition.flags;
        self.device_type = DeviceType::detect(&self.caps.environment.user_agent());
        self.scheduler = Scheduler::new();
        self.page = PageSignals::new(&self.config, url);

        tracing::info!(
            user_id = %record.id,
            visit_id = record.visit_id().unwrap_or_default(),
            new_user = self.flags.is_new_user,
            new_visit = self.flags.is_new_visit,
            new_source = self.flags.is_new_source,
            "Activation complete"
        );

        self.emit(
            EventEnvelope::new(PAGE_LOAD)
                .field("userActivity", record_snapshot(&record))
                .field("deviceType", self.device_type.as_str()),
        );
        let visit_id = record.visit_id().map(str::to_string);
        self.record = Some(record);

        if self.flags.is_new_user {
            self.emit(EventEnvelope::new(FIRST_VISIT));
        }

        if self.flags.is_new_visit {
            let mut visit_start = EventEnvelope::new(VISIT_START);
            if self.config.detect_ad_block {
                match &self.caps.ad_block_probe {
                    Some(probe) => visit_start = visit_start.field("adBlock", probe.is_blocked()),
                    None => tracing::debug!("Ad-block detection enabled without a probe"),
                }
            }
            self.emit(visit_start);

            if let Some(visit_id) = visit_id {
                self.scheduler.schedule(
                    now.saturating_add(self.config.engagement_delay_ms()),
                    TaskKind::EngagementCheck { visit_id },
                );
            }
        }

        if self.flags.announces_new_source() {
            self.emit(EventEnvelope::new(NEW_VISIT_SOURCE));
        }

        self.scheduler.schedule(
            now.saturating_add(self.config.vitals_delay_ms()),
            TaskKind::VitalsSummary,
        );
    }

    fn emit(&self, event: EventEnvelope) -> DispatchReport {
        self.dispatcher.dispatch(&event)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Deferred Tasks
    // ─────────────────────────────────────────────────────────────────────────────

    /// Runs every task due by now. Returns how many ran.
    pub fn run_due_tasks(&mut self) -> usize {
        let due = self.scheduler.take_due(self.caps.clock.now_ms());
        let count = due.len();
        for task in due {
            match task.kind {
                TaskKind::EngagementCheck { visit_id } => self.check_engagement(&visit_id),
                TaskKind::VitalsSummary => self.emit_vitals_summary(),
            }
        }
        count
    }

    pub fn next_task_due(&self) -> Option<i64> {
        self.scheduler.next_due()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Engagement check against the persisted record, not the in-memory copy.
    pub fn check_engagement(&mut self, visit_id: &str) {
        match promote_engaged(self.store.load(), visit_id) {
            EngagementOutcome::Promoted(record) => {
                self.store.save(&record);
                self.record = Some(record);
                self.emit(
                    EventEnvelope::new(VISIT_ENGAGED).field("visit", json!({ "isEngaged": true })),
                );
            }
            outcome => {
                tracing::debug!(visit_id, ?outcome, "Engagement check skipped");
            }
        }
    }

    fn emit_vitals_summary(&mut self) {
        if let Some(event) = self.page.vitals.summarize() {
            self.emit(event);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Host Callbacks (auxiliary signals)
    // ─────────────────────────────────────────────────────────────────────────────

    /// Scroll callback; reads geometry from the environment.
    pub fn on_scroll(&mut self) {
        if let Some(metrics) = self.caps.environment.scroll_metrics() {
            self.on_scroll_metrics(&metrics);
        }
    }

    pub fn on_scroll_metrics(&mut self, metrics: &ScrollMetrics) {
        for event in self.page.scroll.observe(metrics) {
            self.emit(event);
        }
    }

    pub fn on_error(&mut self, report: &ErrorReport) {
        if !self.config.track_errors {
            return;
        }
        if let Some(event) = self.page.errors.capture(report) {
            self.emit(event);
        }
    }

    /// Location-change callback for single-page apps.
    pub fn on_navigation(&mut self) {
        if !self.config.track_spa_navigation {
            return;
        }
        let url = self.caps.environment.current_url();
        if let Some(event) = self.page.navigation.observe(&url) {
            self.touch_last_activity();
            self.emit(event);
        }
    }

    pub fn on_page_hide(&mut self) {
        self.emit_vitals_summary();
    }

    pub fn record_vital(&mut self, name: &str, value: f64) {
        self.page.vitals.record(name, value);
    }

    fn touch_last_activity(&mut self) {
        let now = self.caps.clock.now_ms();
        self.update_record(|record| {
            record.last_activity = now;
        });
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Public Accessors
    // ─────────────────────────────────────────────────────────────────────────────

    /// The persisted record, or the in-memory one when storage is unreadable.
    pub fn record(&self) -> Option<IdentityRecord> {
        self.store.load().or_else(|| self.record.clone())
    }

    pub fn user_id(&self) -> Option<String> {
        self.record().map(|record| record.id)
    }

    pub fn visit_id(&self) -> Option<String> {
        self.record().and_then(|record| record.visit).map(|visit| visit.id)
    }

    pub fn custom_data(&self) -> Map<String, Value> {
        self.record()
            .map(|record| record.custom_data)
            .unwrap_or_default()
    }

    pub fn flags(&self) -> TransitionFlags {
        self.flags
    }

    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn data_layer(&self) -> &DataLayer {
        &self.sinks.data_layer
    }

    pub fn tag_calls(&self) -> &TagCallLog {
        &self.sinks.tag_calls
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Public Mutators
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn set_custom_data(&mut self, key: &str, value: Value) {
        self.update_record(|record| {
            record.custom_data.insert(key.to_string(), value);
        });
    }

    pub fn delete_custom_data(&mut self, key: &str) {
        self.update_record(|record| {
            record.custom_data.remove(key);
        });
    }

    /// Adds or replaces a caller-defined field on the user or visit record.
    pub fn set_field(&mut self, kind: RecordKind, key: &str, value: Value) -> Result<()> {
        ensure_not_reserved(kind, key)?;
        self.update_record(|record| {
            if let Some(fields) = extra_fields(record, kind) {
                fields.insert(key.to_string(), value);
            }
        });
        Ok(())
    }

    pub fn delete_field(&mut self, kind: RecordKind, key: &str) -> Result<()> {
        ensure_not_reserved(kind, key)?;
        self.update_record(|record| {
            if let Some(fields) = extra_fields(record, kind) {
                fields.remove(key);
            }
        });
        Ok(())
    }

    /// Dispatches a caller-named event. A payload `event` key is ignored.
    pub fn send_event(&self, name: &str, payload: Map<String, Value>) -> DispatchReport {
        self.emit(EventEnvelope::with_payload(name, payload))
    }

    /// Read-modify-write on the persisted record (falling back to memory).
    fn update_record<F>(&mut self, mutate: F)
    where
        F: FnOnce(&mut IdentityRecord),
    {
        let Some(mut record) = self.record() else {
            tracing::debug!("No identity record to update");
            return;
        };
        mutate(&mut record);
        self.store.save(&record);
        self.record = Some(record);
    }
}

fn resolve_transition(
    config: &TrackerConfig,
    caps: &Capabilities,
    store: &RecordStore,
    url: &str,
    now: i64,
) -> Transition {
    let source = build_source(url, &caps.environment.referrer(), config);
    let params = config.attribution_params();
    next_record(
        TransitionInput {
            previous: store.load(),
            source,
            landing_page: url,
            now_ms: now,
            user_ttl_ms: config.user_ttl_ms(),
            visit_ttl_ms: config.visit_ttl_ms(),
            params: &params,
        },
        caps.ids.as_ref(),
    )
}

fn ensure_not_reserved(kind: RecordKind, key: &str) -> Result<()> {
    if kind.is_reserved(key) {
        return Err(FootprintError::ReservedField {
            kind: kind.to_string(),
            field: key.to_string(),
        });
    }
    Ok(())
}

fn extra_fields(record: &mut IdentityRecord, kind: RecordKind) -> Option<&mut Map<String, Value>> {
    match kind {
        RecordKind::User => Some(&mut record.extra),
        RecordKind::Visit => record.visit.as_mut().map(|visit| &mut visit.extra),
    }
}

/// Deep copy handed to connectors so they never share state with the tracker.
fn record_snapshot(record: &IdentityRecord) -> Value {
    match serde_json::to_value(record) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to snapshot identity record");
            Value::Null
        }
    }
}
