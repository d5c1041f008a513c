#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

use argon_time_sync::{HandleId, TimeHandle, TimeInterval, TimeSource};

/// Stands in for the owning time source and records every callback the handle raises.
#[derive(Default)]
pub struct RecordingSource {
    /// When set, `unblock_handle` answers `false` and the resuming request stays parked.
    pub veto_unblock: AtomicBool,
    unblocks: AtomicUsize,
    activations: AtomicUsize,
    progress: Mutex<Vec<TimeInterval>>,
}

impl RecordingSource {
    /// Number of accepted unblock consultations.
    pub fn unblocks(&self) -> usize {
        self.unblocks.load(Ordering::SeqCst)
    }

    /// Number of quantum pickups reported through `report_handle_active`.
    pub fn activations(&self) -> usize {
        self.activations.load(Ordering::SeqCst)
    }

    /// Every progress delta reported through `report_time_progress`, in order.
    pub fn progress_log(&self) -> Vec<TimeInterval> {
        self.progress.lock().unwrap().clone()
    }
}

impl TimeSource for RecordingSource {
    fn unblock_handle(&self, _id: HandleId) -> bool {
        if self.veto_unblock.load(Ordering::SeqCst) {
            return false;
        }
        self.unblocks.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn report_handle_active(&self, _id: HandleId) {
        self.activations.fetch_add(1, Ordering::SeqCst);
    }

    fn report_time_progress(&self, _id: HandleId, progress: TimeInterval) {
        self.progress.lock().unwrap().push(progress);
    }
}

pub fn ticks(n: u64) -> TimeInterval {
    TimeInterval::from_ticks(n)
}

pub fn new_handle() -> (Arc<RecordingSource>, Arc<TimeHandle>) {
    let source = Arc::new(RecordingSource::default());
    let weak = Arc::downgrade(&source) as Weak<dyn TimeSource>;
    (source, Arc::new(TimeHandle::new(HandleId::new(1), weak)))
}
