use crate::interval::TimeInterval;

/// Identifies one handle within its owning time source.
///
/// Assigned by the source when the handle is created; threaded through every
/// callback and log line so a source owning many handles can tell them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(u64);

impl HandleId {
    pub const fn new(raw: u64) -> Self {
        HandleId(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// The callback surface a [`TimeHandle`](crate::TimeHandle) raises into its
/// owning time source.
///
/// The handle keeps the source as a weak reference; if the source is gone all
/// callbacks are skipped and [`unblock_handle`](TimeSource::unblock_handle)
/// counts as accepted.
pub trait TimeSource: Send + Sync {
    /// A sink that previously broke out of its quantum has called
    /// [`request_interval`](crate::TimeHandle::request_interval) again and a
    /// quantum is on offer. Return `true` to let the sink resume, `false` to
    /// keep its request parked for now.
    ///
    /// Invoked with the handle's internal lock held: the implementation must
    /// return promptly and must not call back into the handle.
    fn unblock_handle(&self, id: HandleId) -> bool;

    /// The sink has fetched a quantum and started consuming it. Fires on
    /// every successful [`request_interval`](crate::TimeHandle::request_interval),
    /// not only the first one after an inactive period.
    fn report_handle_active(&self, id: HandleId);

    /// The source-side wait observed `progress` ticks of sink progress that it
    /// had not seen before. Deltas over one quantum sum to the amount the sink
    /// reported consumed, also when the quantum is split by a break.
    fn report_time_progress(&self, id: HandleId, progress: TimeInterval);
}
