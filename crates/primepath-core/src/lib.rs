//! # PrimePath Core Library
//!
//! Core logic for the PrimePath exam timer: a countdown state machine
//! that survives page reloads, announces warning thresholds exactly once,
//! and guarantees that expiry wins over any UI surface blocking
//! submission at the moment the countdown reaches zero.
//!
//! ## Architecture
//!
//! - **Timer Engine**: a tick-driven state machine; the caller invokes
//!   `tick()` at 1 Hz and the engine handles decrement, display,
//!   warnings, persistence cadence and expiry in a fixed order
//! - **Persistence Store**: key-value snapshots with staleness and
//!   corruption guards, compensating for wall-clock time elapsed while
//!   the host was unloaded
//! - **Expiry Coordinator**: registry of blocking UI surfaces torn down
//!   before the expiry callback runs
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: core countdown state machine, built via
//!   [`TimerEngine::builder`]
//! - [`PersistenceStore`] / [`SnapshotStore`]: snapshot save/restore
//! - [`ExpiryCoordinator`]: expiry-vs-modal race resolution
//! - [`TimerConfig`]: warning thresholds, grace delay, persistence cadence

pub mod clock;
pub mod config;
pub mod display;
pub mod error;
pub mod events;
pub mod expiry;
pub mod session;
pub mod storage;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{TimerConfig, WarningRule};
pub use display::{format_time, ColorClass, DisplaySink};
pub use error::{ConfigError, Result, StoreError, TimerError};
pub use events::Event;
pub use expiry::{BlockingSurface, ExpiryCoordinator, IntervalHandle, RaceResolution};
pub use session::{KeyLease, SessionRegistry};
pub use storage::{MemoryStore, PersistenceStore, SnapshotStore, SqliteStore, TimerSnapshot};
pub use timer::{TimerEngine, TimerEngineBuilder, TimerState, TimerStats};
