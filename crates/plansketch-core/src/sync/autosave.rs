//! Auto-save debounce and the save ledger.

use crate::storage::StoreResult;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Decides when sealed strokes turn into a queued save.
///
/// With a zero debounce every commit saves immediately. Otherwise the first
/// commit opens a window and every commit inside it shares the save that is
/// queued once the window has elapsed.
#[derive(Debug, Clone)]
pub struct AutoSave {
    enabled: bool,
    debounce: Duration,
    pending_since: Option<Instant>,
}

impl AutoSave {
    pub fn new(enabled: bool, debounce: Duration) -> Self {
        Self { enabled, debounce, pending_since: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.pending_since = None;
        }
    }

    /// Whether a save is waiting for its window to close.
    pub fn is_pending(&self) -> bool {
        self.pending_since.is_some()
    }

    /// Record a commit. Returns true when a save should be queued now.
    pub fn note_commit(&mut self, now: Instant) -> bool {
        if !self.enabled {
            return false;
        }
        if self.debounce.is_zero() {
            return true;
        }
        if self.pending_since.is_none() {
            self.pending_since = Some(now);
        }
        false
    }

    /// Take the pending save if its window has elapsed.
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.pending_since {
            Some(since) if now.saturating_duration_since(since) >= self.debounce => {
                self.pending_since = None;
                true
            }
            _ => false,
        }
    }

    /// Take the pending save regardless of the window.
    pub fn take_pending(&mut self) -> bool {
        self.pending_since.take().is_some()
    }
}

/// Kind of push sent to the plan store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaveOp {
    Drawings,
    Shapes,
    Layers,
    Title,
    Destination,
}

/// Generation bookkeeping for issued saves.
///
/// Every push gets a monotonically increasing generation. A completion
/// older than the newest completed push of the same kind is counted and
/// logged; it is not rejected, the store keeps whichever write lands last.
#[derive(Debug, Clone, Default)]
pub struct SaveLedger {
    issued: u64,
    completed: HashMap<SaveOp, u64>,
    failures: u64,
    stale: u64,
}

impl SaveLedger {
    /// Allocate the next generation.
    pub fn issue(&mut self, op: SaveOp) -> u64 {
        self.issued += 1;
        log::trace!("Issued {:?} save generation {}", op, self.issued);
        self.issued
    }

    pub fn complete<T>(&mut self, op: SaveOp, generation: u64, result: &StoreResult<T>) {
        if let Err(err) = result {
            self.failures += 1;
            log::warn!("{:?} save generation {} failed: {}", op, generation, err);
            return;
        }
        let newest = self.completed.entry(op).or_insert(0);
        if generation < *newest {
            self.stale += 1;
            log::warn!(
                "{:?} save generation {} completed after generation {}",
                op,
                generation,
                newest
            );
        } else {
            *newest = generation;
        }
    }

    /// Number of saves issued so far.
    pub fn issued(&self) -> u64 {
        self.issued
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Completions that arrived after a newer save of the same kind.
    pub fn stale_completions(&self) -> u64 {
        self.stale
    }

    pub fn last_completed(&self, op: SaveOp) -> Option<u64> {
        self.completed.get(&op).copied()
    }
}
