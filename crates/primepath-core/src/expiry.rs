//! Expiry coordination with competing UI surfaces.
//!
//! A difficulty-selection modal can be open at the instant the countdown
//! reaches zero. Both are driven by independently scheduled callbacks on
//! one event loop, so this is an ordering hazard, not a memory race. The
//! resolution policy is fixed: expiry always wins. The modal is hidden,
//! any polling interval it registered is cancelled, and expiry proceeds.
//!
//! Surfaces register with the coordinator explicitly, replacing the
//! original scheme of stashing interval ids in display attributes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::warn;

/// Handle to a repeating scheduled callback. Cancelling flips a shared
/// flag the callback's scheduler is expected to observe.
#[derive(Debug, Clone, Default)]
pub struct IntervalHandle {
    cancelled: Arc<AtomicBool>,
}

impl IntervalHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// A UI surface that can block submission while visible.
pub trait BlockingSurface {
    /// Stable identifier, used for unregistration and log lines.
    fn id(&self) -> &str;
    fn is_visible(&self) -> bool;
    fn hide(&mut self);
    /// Hand over the surface's own timer-polling interval, if it
    /// registered one, so the coordinator can cancel it.
    fn take_poll_interval(&mut self) -> Option<IntervalHandle>;
}

/// Outcome of one expiry resolution pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RaceResolution {
    /// Surfaces found visible at expiry. Nonzero means the race was hit.
    pub races_detected: usize,
    pub surfaces_hidden: usize,
    pub intervals_cancelled: usize,
}

/// Registry of blocking surfaces consulted when the countdown expires.
#[derive(Default)]
pub struct ExpiryCoordinator {
    surfaces: Vec<Box<dyn BlockingSurface>>,
}

impl ExpiryCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, surface: Box<dyn BlockingSurface>) {
        self.surfaces.push(surface);
    }

    /// Remove a surface by id. Returns true if one was removed.
    pub fn unregister(&mut self, id: &str) -> bool {
        let before = self.surfaces.len();
        self.surfaces.retain(|s| s.id() != id);
        self.surfaces.len() != before
    }

    pub fn is_any_visible(&self) -> bool {
        self.surfaces.iter().any(|s| s.is_visible())
    }

    /// Tear down every visible surface so expiry can proceed. Called by
    /// the engine before the expire callback runs.
    pub fn resolve(&mut self) -> RaceResolution {
        let mut outcome = RaceResolution::default();
        for surface in &mut self.surfaces {
            if !surface.is_visible() {
                continue;
            }
            outcome.races_detected += 1;
            warn!(
                surface = surface.id(),
                "blocking surface visible at expiry; forcing it closed"
            );
            if let Some(interval) = surface.take_poll_interval() {
                interval.cancel();
                outcome.intervals_cancelled += 1;
            }
            surface.hide();
            outcome.surfaces_hidden += 1;
        }
        outcome
    }
}

impl std::fmt::Debug for ExpiryCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiryCoordinator")
            .field("surfaces", &self.surfaces.len())
            .finish()
    }
}
