//! Frame admission: one evaluation in flight, a single latest-wins slot,
//! and a time budget that decides when to drop instead of queue.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::session::SessionId;

/// Frame waiting in the slot
#[derive(Debug)]
pub struct PendingFrame<F> {
    pub session_id: SessionId,
    pub frame: F,
    pub timestamp_ms: u64,
}

/// Outcome of offering a frame
pub enum Admission<'a, F> {
    /// In flight and still inside the budget window
    Dropped,
    /// Left in the slot for the active drainer
    Queued { superseded: bool },
    /// Caller owns the gate and must drain the slot
    Draining {
        guard: DrainGuard<'a, F>,
        superseded: bool,
    },
}

pub struct AdmissionController<F> {
    frame_budget_ms: u64,
    in_flight: AtomicBool,
    /// Frame timestamp plus processing time of the last completed evaluation
    last_completed_ms: Mutex<Option<u64>>,
    slot: Mutex<Option<PendingFrame<F>>>,
}

impl<F> AdmissionController<F> {
    pub fn new(frame_budget_ms: u64) -> Self {
        Self {
            frame_budget_ms,
            in_flight: AtomicBool::new(false),
            last_completed_ms: Mutex::new(None),
            slot: Mutex::new(None),
        }
    }

    pub fn frame_budget_ms(&self) -> u64 {
        self.frame_budget_ms
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn has_pending(&self) -> bool {
        self.slot.lock().is_some()
    }

    fn within_budget(&self, timestamp_ms: u64) -> bool {
        match *self.last_completed_ms.lock() {
            Some(done) => timestamp_ms.saturating_sub(done) < self.frame_budget_ms,
            None => false,
        }
    }

    pub fn admit(&self, session_id: SessionId, frame: F, timestamp_ms: u64) -> Admission<'_, F> {
        if self.is_in_flight() && self.within_budget(timestamp_ms) {
            return Admission::Dropped;
        }

        let pending = PendingFrame {
            session_id,
            frame,
            timestamp_ms,
        };
        let superseded = self.slot.lock().replace(pending).is_some();

        match self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Admission::Draining {
                guard: DrainGuard {
                    controller: self,
                    holding: true,
                },
                superseded,
            },
            Err(_) => Admission::Queued { superseded },
        }
    }
}

/// Ownership of the in-flight gate; released on drop
pub struct DrainGuard<'a, F> {
    controller: &'a AdmissionController<F>,
    holding: bool,
}

impl<F> DrainGuard<'_, F> {
    /// Next frame to evaluate, or `None` once the slot is empty and the gate
    /// has been handed back
    pub fn next(&mut self) -> Option<PendingFrame<F>> {
        loop {
            if !self.holding {
                return None;
            }
            if let Some(pending) = self.controller.slot.lock().take() {
                return Some(pending);
            }

            self.release();
            // a frame queued by a caller that lost the race would be stranded
            if !self.controller.has_pending() {
                return None;
            }
            if self
                .controller
                .in_flight
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return None;
            }
            self.holding = true;
        }
    }

    /// Set the reference instant for the budget check
    pub fn complete(&self, completed_at_ms: u64) {
        let mut last = self.controller.last_completed_ms.lock();
        *last = Some(last.map_or(completed_at_ms, |prev| prev.max(completed_at_ms)));
    }

    fn release(&mut self) {
        if self.holding {
            self.controller.in_flight.store(false, Ordering::Release);
            self.holding = false;
        }
    }
}

impl<F> Drop for DrainGuard<'_, F> {
    fn drop(&mut self) {
        self.release();
    }
}
