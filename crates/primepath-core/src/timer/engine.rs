//! Exam countdown engine.
//!
//! The engine is a tick-driven state machine. It does not own a thread or
//! an interval - the caller invokes `tick()` once per second and the
//! engine decrements, renders, evaluates warnings, persists and expires
//! in a fixed order within that call.
//!
//! ## State Transitions
//!
//! ```text
//! Ready -> Running <-> Paused
//! Running -> Expired
//! ExpiredPending -> GracePending -> Expired
//! Ready | Running | Paused -> Stopped
//! ```
//!
//! `ExpiredPending` is entered when the remaining time is already zero
//! at build time (a zero input duration; spent snapshots are discarded
//! during restore). Starting such a timer shows the expired display first
//! and fires the expiry callback only after the configured grace delay,
//! so the caller has attached its handlers and the user sees why the
//! submission happens.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info};

use crate::clock::{Clock, SystemClock};
use crate::config::{TimerConfig, WarningRule};
use crate::display::{format_time, ColorClass, DisplaySink};
use crate::error::{Result, TimerError};
use crate::events::Event;
use crate::expiry::ExpiryCoordinator;
use crate::session::{KeyLease, SessionRegistry};
use crate::storage::{MemoryStore, PersistenceStore, SnapshotStore, TimerSnapshot};

use super::warnings::WarningPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerState {
    /// Initialized, countdown not yet started.
    Ready,
    Running,
    Paused,
    /// Remaining time was already zero at build time; expiry is deferred
    /// until `start()`.
    ExpiredPending,
    /// `start()` was called on an expired-pending timer; expiry fires
    /// once the grace delay elapses. Not cancellable by pause or reset.
    GracePending,
    Expired,
    Stopped,
}

/// Read-only snapshot of the engine, serializable for status output.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TimerStats {
    pub state: TimerState,
    pub remaining_secs: u64,
    pub total_secs: u64,
    pub elapsed_secs: u64,
    pub progress_pct: f64,
    pub is_running: bool,
    pub is_paused: bool,
    /// Remaining time has reached zero. An expired snapshot that still
    /// reports `is_running` means a tick fired after the countdown was
    /// spent but before expiry resolved.
    pub is_expired: bool,
    pub warnings_fired: Vec<u64>,
}

/// Builder for [`TimerEngine`]. Every collaborator is injected; the only
/// required inputs are the persistence key and the allotted duration.
pub struct TimerEngineBuilder {
    key: String,
    total_secs: u64,
    config: TimerConfig,
    clock: Arc<dyn Clock>,
    store: Option<Arc<dyn SnapshotStore>>,
    registry: Option<SessionRegistry>,
    display: Option<Box<dyn DisplaySink>>,
    on_expire: Option<Box<dyn FnMut()>>,
    on_warning: Option<Box<dyn FnMut(&WarningRule)>>,
}

impl TimerEngineBuilder {
    pub fn config(mut self, config: TimerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Snapshot store backing persistence. Defaults to an in-memory
    /// store; pass a [`crate::storage::SqliteStore`] for durability.
    pub fn store(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Registry enforcing exclusive key ownership. Defaults to a fresh
    /// private registry; share one across engines to get enforcement.
    pub fn registry(mut self, registry: SessionRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn display(mut self, display: Box<dyn DisplaySink>) -> Self {
        self.display = Some(display);
        self
    }

    pub fn on_expire(mut self, callback: impl FnMut() + 'static) -> Self {
        self.on_expire = Some(Box::new(callback));
        self
    }

    pub fn on_warning(mut self, callback: impl FnMut(&WarningRule) + 'static) -> Self {
        self.on_warning = Some(Box::new(callback));
        self
    }

    /// Initialize the engine: validate inputs, acquire key ownership,
    /// attempt restore from the snapshot store, render the initial
    /// display. A valid persisted snapshot overrides the input duration.
    pub fn build(self) -> Result<TimerEngine> {
        if self.key.trim().is_empty() {
            error!("rejecting timer init: empty persistence key");
            return Err(TimerError::InvalidKey {
                reason: "key must be non-empty".into(),
            });
        }
        if let Err(e) = self.config.validate() {
            error!(error = %e, "rejecting timer init: invalid configuration");
            return Err(e.into());
        }

        let registry = self.registry.unwrap_or_default();
        let lease = registry.acquire(&self.key)?;

        let store: Arc<dyn SnapshotStore> =
            self.store.unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let persistence = PersistenceStore::new(
            store,
            self.key.clone(),
            self.clock.clone(),
            self.config.max_snapshot_age_ms(),
            self.config.persistence_enabled,
        );

        let (total_secs, remaining_secs, restored) = match persistence.restore() {
            Some(snapshot) => {
                info!(
                    key = %self.key,
                    remaining = snapshot.time_remaining,
                    "recovered persisted timer state"
                );
                (snapshot.total_time, snapshot.time_remaining, true)
            }
            None => (self.total_secs, self.total_secs, false),
        };

        let state = if remaining_secs == 0 {
            TimerState::ExpiredPending
        } else {
            TimerState::Ready
        };

        let mut engine = TimerEngine {
            state,
            total_secs,
            remaining_secs,
            restored,
            warnings: WarningPolicy::new(self.config.warnings.clone()),
            config: self.config,
            persistence,
            clock: self.clock,
            display: self.display,
            coordinator: ExpiryCoordinator::new(),
            listeners: Vec::new(),
            on_expire: self.on_expire,
            on_warning: self.on_warning,
            ticks_since_save: 0,
            grace_deadline_ms: None,
            _lease: lease,
        };
        engine.render();
        Ok(engine)
    }
}

/// Tick-driven exam countdown with persisted recovery and coordinated
/// expiry. One instance owns one persistence key for its whole lifetime.
pub struct TimerEngine {
    state: TimerState,
    total_secs: u64,
    remaining_secs: u64,
    restored: bool,
    config: TimerConfig,
    warnings: WarningPolicy,
    persistence: PersistenceStore,
    clock: Arc<dyn Clock>,
    display: Option<Box<dyn DisplaySink>>,
    coordinator: ExpiryCoordinator,
    listeners: Vec<Box<dyn FnMut(&Event)>>,
    on_expire: Option<Box<dyn FnMut()>>,
    on_warning: Option<Box<dyn FnMut(&WarningRule)>>,
    ticks_since_save: u32,
    grace_deadline_ms: Option<u64>,
    _lease: KeyLease,
}

impl TimerEngine {
    pub fn builder(key: impl Into<String>, total_secs: u64) -> TimerEngineBuilder {
        TimerEngineBuilder {
            key: key.into(),
            total_secs,
            config: TimerConfig::default(),
            clock: Arc::new(SystemClock),
            store: None,
            registry: None,
            display: None,
            on_expire: None,
            on_warning: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn total_secs(&self) -> u64 {
        self.total_secs
    }

    pub fn key(&self) -> &str {
        self.persistence.key()
    }

    /// True when the countdown was recovered from a persisted snapshot.
    pub fn was_restored(&self) -> bool {
        self.restored
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.total_secs.saturating_sub(self.remaining_secs)
    }

    /// 0.0 .. 100.0 progress through the allotted duration.
    pub fn progress_pct(&self) -> f64 {
        if self.total_secs == 0 {
            return 100.0;
        }
        (self.elapsed_secs() as f64 / self.total_secs as f64 * 100.0).min(100.0)
    }

    pub fn stats(&self) -> TimerStats {
        TimerStats {
            state: self.state,
            remaining_secs: self.remaining_secs,
            total_secs: self.total_secs,
            elapsed_secs: self.elapsed_secs(),
            progress_pct: self.progress_pct(),
            is_running: self.state == TimerState::Running,
            is_paused: self.state == TimerState::Paused,
            is_expired: self.remaining_secs == 0,
            warnings_fired: self.warnings.fired().collect(),
        }
    }

    // ── Listeners and collaborators ──────────────────────────────────

    /// Subscribe to all engine events. Listeners run synchronously, in
    /// subscription order, within the tick that produced the event.
    pub fn subscribe(&mut self, listener: impl FnMut(&Event) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn set_on_expire(&mut self, callback: impl FnMut() + 'static) {
        self.on_expire = Some(Box::new(callback));
    }

    pub fn set_on_warning(&mut self, callback: impl FnMut(&WarningRule) + 'static) {
        self.on_warning = Some(Box::new(callback));
    }

    pub fn coordinator(&self) -> &ExpiryCoordinator {
        &self.coordinator
    }

    /// Blocking surfaces (the difficulty modal) register here.
    pub fn coordinator_mut(&mut self) -> &mut ExpiryCoordinator {
        &mut self.coordinator
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self) -> Option<Event> {
        match self.state {
            TimerState::Paused => self.resume(),
            TimerState::ExpiredPending => {
                // Show the expired display first; the callback fires only
                // after the grace delay so the user sees the cause.
                self.render();
                let grace_ms = self.config.grace_delay_secs.saturating_mul(1000);
                self.grace_deadline_ms = Some(self.clock.now_ms().saturating_add(grace_ms));
                self.state = TimerState::GracePending;
                info!(
                    key = %self.persistence.key(),
                    grace_secs = self.config.grace_delay_secs,
                    "timer already expired; deferring expiry"
                );
                Some(self.emit(Event::ExpiryPending {
                    grace_delay_secs: self.config.grace_delay_secs,
                    at: Utc::now(),
                }))
            }
            TimerState::Ready => {
                self.state = TimerState::Running;
                self.ticks_since_save = 0;
                self.persist();
                self.render();
                debug!(key = %self.persistence.key(), remaining = self.remaining_secs, "timer started");
                Some(self.emit(Event::Started {
                    remaining_secs: self.remaining_secs,
                    total_secs: self.total_secs,
                    restored: self.restored,
                    at: Utc::now(),
                }))
            }
            _ => None,
        }
    }

    pub fn pause(&mut self) -> Option<Event> {
        if self.state != TimerState::Running {
            return None;
        }
        self.state = TimerState::Paused;
        self.persist();
        Some(self.emit(Event::Paused {
            remaining_secs: self.remaining_secs,
            at: Utc::now(),
        }))
    }

    /// No persist here: the next periodic save covers it.
    pub fn resume(&mut self) -> Option<Event> {
        if self.state != TimerState::Paused {
            return None;
        }
        self.state = TimerState::Running;
        Some(self.emit(Event::Resumed {
            remaining_secs: self.remaining_secs,
            at: Utc::now(),
        }))
    }

    /// Advance the countdown by one second. Call at 1 Hz while the exam
    /// page is live. Returns the expiry event on the tick that spends
    /// the countdown (or ends the grace delay).
    pub fn tick(&mut self) -> Option<Event> {
        match self.state {
            TimerState::GracePending => {
                let deadline = self.grace_deadline_ms?;
                if self.clock.now_ms() >= deadline {
                    return Some(self.expire());
                }
                None
            }
            TimerState::Running => {
                self.remaining_secs = self.remaining_secs.saturating_sub(1);
                self.render();
                for rule in self.warnings.check(self.remaining_secs) {
                    if let Some(cb) = self.on_warning.as_mut() {
                        cb(&rule);
                    }
                    self.emit(Event::Warning {
                        remaining_secs: self.remaining_secs,
                        message: rule.message.clone(),
                        severity: rule.severity,
                        at: Utc::now(),
                    });
                }
                self.ticks_since_save += 1;
                if self.ticks_since_save >= self.config.persist_every_ticks {
                    self.persist();
                    self.ticks_since_save = 0;
                }
                self.emit(Event::Tick {
                    remaining_secs: self.remaining_secs,
                    elapsed_secs: self.elapsed_secs(),
                    progress_pct: self.progress_pct(),
                    at: Utc::now(),
                });
                if self.remaining_secs == 0 {
                    return Some(self.expire());
                }
                None
            }
            _ => None,
        }
    }

    /// Extend the countdown. Does not touch the total duration or the
    /// already-fired warning set.
    pub fn add_time(&mut self, secs: u64) -> Option<Event> {
        match self.state {
            TimerState::Ready | TimerState::Running | TimerState::Paused => {
                self.remaining_secs = self.remaining_secs.saturating_add(secs);
                self.render();
                Some(self.emit(Event::TimeAdded {
                    added_secs: secs,
                    remaining_secs: self.remaining_secs,
                    at: Utc::now(),
                }))
            }
            _ => None,
        }
    }

    /// Stop the countdown and restore the full duration, optionally
    /// replacing it. Clears the fired-warning set. A no-op while a
    /// deferred expiry is pending.
    pub fn reset(&mut self, new_total_secs: Option<u64>) -> Option<Event> {
        if self.state == TimerState::GracePending {
            return None;
        }
        if let Some(total) = new_total_secs {
            self.total_secs = total;
        }
        self.remaining_secs = self.total_secs;
        self.state = if self.remaining_secs == 0 {
            TimerState::ExpiredPending
        } else {
            TimerState::Ready
        };
        self.restored = false;
        self.warnings.reset();
        self.ticks_since_save = 0;
        self.grace_deadline_ms = None;
        self.render();
        Some(self.emit(Event::Reset {
            total_secs: self.total_secs,
            at: Utc::now(),
        }))
    }

    /// Halt the countdown and delete the persisted snapshot.
    pub fn stop(&mut self) -> Option<Event> {
        match self.state {
            TimerState::Expired | TimerState::Stopped => None,
            _ => {
                self.state = TimerState::Stopped;
                self.grace_deadline_ms = None;
                self.persistence.clear();
                debug!(key = %self.persistence.key(), "timer stopped");
                Some(self.emit(Event::Stopped {
                    elapsed_secs: self.elapsed_secs(),
                    at: Utc::now(),
                }))
            }
        }
    }

    /// Persist the current state immediately. For hosts that are about
    /// to shut down between ticks (a CLI invocation, tab unload). No-op
    /// once the timer is expired or stopped.
    pub fn save_now(&self) {
        match self.state {
            TimerState::Ready | TimerState::Running | TimerState::Paused => self.persist(),
            _ => {}
        }
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Finalize the countdown. Ordering is part of the contract: halt,
    /// tear down blocking surfaces, clear persisted state, then the
    /// expire callback, then the event.
    fn expire(&mut self) -> Event {
        self.state = TimerState::Expired;
        self.grace_deadline_ms = None;
        self.remaining_secs = 0;

        let resolution = self.coordinator.resolve();
        if resolution.races_detected > 0 {
            debug!(
                surfaces_hidden = resolution.surfaces_hidden,
                intervals_cancelled = resolution.intervals_cancelled,
                "expiry won over blocking surfaces"
            );
        }
        self.persistence.clear();
        self.render();
        info!(key = %self.persistence.key(), total = self.total_secs, "timer expired");
        if let Some(cb) = self.on_expire.as_mut() {
            cb();
        }
        self.emit(Event::Expired {
            total_secs: self.total_secs,
            elapsed_secs: self.elapsed_secs(),
            at: Utc::now(),
        })
    }

    fn emit(&mut self, event: Event) -> Event {
        for listener in &mut self.listeners {
            listener(&event);
        }
        event
    }

    fn render(&mut self) {
        let Some(display) = self.display.as_mut() else {
            return;
        };
        let formatted = format_time(self.remaining_secs, self.config.show_hours);
        display.render(&formatted, ColorClass::for_remaining(self.remaining_secs));
    }

    fn persist(&self) {
        self.persistence.save(TimerSnapshot {
            time_remaining: self.remaining_secs,
            total_time: self.total_secs,
            timestamp: 0, // stamped by the store on save
            is_running: self.state == TimerState::Running,
            is_paused: self.state == TimerState::Paused,
        });
    }
}

impl std::fmt::Debug for TimerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerEngine")
            .field("key", &self.persistence.key())
            .field("state", &self.state)
            .field("remaining_secs", &self.remaining_secs)
            .field("total_secs", &self.total_secs)
            .field("restored", &self.restored)
            .finish()
    }
}
