use std::mem;
use std::sync::{Condvar, Mutex, MutexGuard, Weak};

use log::trace;

use crate::interval::TimeInterval;
use crate::source::{HandleId, TimeSource};

/// Outcome of [`TimeHandle::wait_until_done`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOutcome {
    /// The sink finished the quantum cleanly, or was never handed one this cycle.
    pub done: bool,
    /// A sink that previously broke out of a quantum has resumed since the last wait.
    pub unblocked_recently: bool,
    /// Portion of the granted quantum the sink did not consume.
    pub residual: TimeInterval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Report {
    Continue,
    Break,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// No quantum outstanding.
    Idle,
    /// A quantum is on offer; the sink has not fetched it yet.
    Offered,
    /// The sink fetched the quantum and is consuming it.
    Consuming,
    /// The sink reported back; the source has not collected the report yet.
    Reported(Report),
}

#[derive(Debug)]
struct State {
    phase: Phase,
    /// The quantum currently on offer or being consumed.
    granted: TimeInterval,
    /// Cumulative time the sink reported consumed out of `granted`.
    used: TimeInterval,
    /// Portion of `used` the source has already collected through a report.
    acked: TimeInterval,
    /// Set by a break report; clears when a quantum is handed to the returning sink,
    /// or when the source collects a partial-progress break.
    blocking: bool,
    /// A `request_interval` from the broken sink is in flight, so the source may grant
    /// again even though `blocking` has not cleared yet.
    resuming: bool,
    enabled: bool,
    source_side_active: bool,
    latch_count: u32,
    disposed: bool,
    recently_unblocked: bool,
    total_elapsed: TimeInterval,
}

/// Synchronization handle attaching one time sink to its virtual-time source.
///
/// The source thread offers quanta with [`grant`](TimeHandle::grant) and collects outcomes
/// with [`wait_until_done`](TimeHandle::wait_until_done). The sink thread fetches quanta
/// with [`request_interval`](TimeHandle::request_interval) and reports back with
/// [`report_continue`](TimeHandle::report_continue) or
/// [`report_break`](TimeHandle::report_break). Controller threads may flip
/// [`set_enabled`](TimeHandle::set_enabled) and
/// [`set_source_side_active`](TimeHandle::set_source_side_active), hold the handle with
/// [`latch`](TimeHandle::latch)/[`unlatch`](TimeHandle::unlatch), or end its life with
/// [`dispose`](TimeHandle::dispose), all without coordinating with either side.
///
/// All state sits behind one mutex. The only entry points that can suspend the caller are
/// `request_interval`, `wait_until_done`, and `set_enabled(true)` on a latched handle;
/// every other call returns in bounded time.
pub struct TimeHandle {
    id: HandleId,
    source: Weak<dyn TimeSource>,
    state: Mutex<State>,
    /// Parks `wait_until_done`.
    source_cv: Condvar,
    /// Parks `request_interval` and a latched `set_enabled(true)`.
    sink_cv: Condvar,
}

impl TimeHandle {
    /// Creates a handle owned by the source reachable through `source`.
    ///
    /// The reference is weak: the source owns its handles, not the other way around. A
    /// handle whose source is gone keeps working and skips the callbacks.
    pub fn new(id: HandleId, source: Weak<dyn TimeSource>) -> Self {
        TimeHandle {
            id,
            source,
            state: Mutex::new(State {
                phase: Phase::Idle,
                granted: TimeInterval::EMPTY,
                used: TimeInterval::EMPTY,
                acked: TimeInterval::EMPTY,
                blocking: false,
                resuming: false,
                enabled: true,
                source_side_active: true,
                latch_count: 0,
                disposed: false,
                recently_unblocked: false,
                total_elapsed: TimeInterval::EMPTY,
            }),
            source_cv: Condvar::new(),
            sink_cv: Condvar::new(),
        }
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Offers `interval` to the sink. Non-blocking.
    ///
    /// Granting requires an idle, non-disposed handle whose sink is not away inside a
    /// broken quantum; anything else is a protocol violation by the source and trips a
    /// debug assertion. The source can check
    /// [`is_ready_for_new_time_grant`](TimeHandle::is_ready_for_new_time_grant) first.
    pub fn grant(&self, interval: TimeInterval) {
        trace!("time handle {}: grant of {} ticks", self.id.raw(), interval);
        let mut state = self.state.lock().unwrap();
        debug_assert!(!state.disposed, "time granted to a disposed handle");
        debug_assert!(
            !state.blocking || state.resuming,
            "time granted to a blocking handle"
        );
        debug_assert_eq!(
            state.phase,
            Phase::Idle,
            "time granted while a quantum is outstanding"
        );
        debug_assert!(!interval.is_empty(), "empty time grant");
        if state.disposed {
            return;
        }
        state.phase = Phase::Offered;
        state.granted = interval;
        state.used = TimeInterval::EMPTY;
        state.acked = TimeInterval::EMPTY;
        self.sink_cv.notify_all();
    }

    /// Collects the outcome of the current cycle. May block.
    ///
    /// Blocks only while the sink is consuming a quantum it has fetched; a quantum that
    /// was granted but never fetched is left on offer and reported immediately. The
    /// `unblocked_recently` flag is consumed by every return path.
    pub fn wait_until_done(&self) -> WaitOutcome {
        let mut state = self.state.lock().unwrap();
        loop {
            if state.disposed {
                return WaitOutcome {
                    done: true,
                    unblocked_recently: mem::take(&mut state.recently_unblocked),
                    residual: TimeInterval::EMPTY,
                };
            }
            match state.phase {
                Phase::Reported(report) => return self.collect_report(state, report),
                Phase::Offered => {
                    // The sink never fetched the quantum; it stays on offer for the
                    // sink's next cycle. A latched handle counts as done so an external
                    // reconfiguration holding the latch can finish.
                    return WaitOutcome {
                        done: state.latch_count > 0,
                        unblocked_recently: mem::take(&mut state.recently_unblocked),
                        residual: TimeInterval::EMPTY,
                    };
                }
                Phase::Idle => {
                    // Nothing was granted this cycle.
                    return WaitOutcome {
                        done: true,
                        unblocked_recently: mem::take(&mut state.recently_unblocked),
                        residual: TimeInterval::EMPTY,
                    };
                }
                Phase::Consuming => {
                    if !state.enabled || !state.source_side_active {
                        // The quantum stays in place so a late report still lands.
                        return WaitOutcome {
                            done: false,
                            unblocked_recently: mem::take(&mut state.recently_unblocked),
                            residual: TimeInterval::EMPTY,
                        };
                    }
                    state = self.source_cv.wait(state).unwrap();
                }
            }
        }
    }

    fn collect_report(&self, mut state: MutexGuard<'_, State>, report: Report) -> WaitOutcome {
        let residual = state.granted - state.used;
        let progress = state.used - state.acked;
        let done = report == Report::Continue;
        if report == Report::Break && !state.used.is_empty() {
            // The sink paused partway through and the source has now synchronized up to
            // the break point. The unconsumed remainder goes straight back on offer; the
            // sink's next request picks it up without a new grant, and its next report
            // stays cumulative for this quantum.
            state.phase = Phase::Offered;
            state.acked = state.used;
            state.blocking = false;
            self.sink_cv.notify_all();
        } else {
            // Clean completion, or a break before any work happened. The cycle closes;
            // after a no-progress break the handle stays blocking until the returning
            // sink is handed a quantum.
            state.phase = Phase::Idle;
            state.granted = TimeInterval::EMPTY;
            state.used = TimeInterval::EMPTY;
            state.acked = TimeInterval::EMPTY;
        }
        state.total_elapsed += progress;
        let unblocked_recently = mem::take(&mut state.recently_unblocked);
        drop(state);
        if !progress.is_empty() {
            if let Some(source) = self.source.upgrade() {
                source.report_time_progress(self.id, progress);
            }
        }
        WaitOutcome {
            done,
            unblocked_recently,
            residual,
        }
    }

    /// Fetches the quantum currently on offer, parking until one arrives. Returns `None`
    /// when the handle is disposed, disabled, or inactive on the source side.
    ///
    /// For a sink coming back from a break, the source's no-grant window ends once this
    /// call is in flight, but the handle stays blocking until a quantum is actually
    /// handed over: the source is consulted through [`TimeSource::unblock_handle`] first
    /// and may keep the request parked, and a denied call leaves the pause intact.
    pub fn request_interval(&self) -> Option<TimeInterval> {
        let mut state = self.state.lock().unwrap();
        if state.blocking {
            state.resuming = true;
        }
        loop {
            if state.disposed || !state.enabled || !state.source_side_active {
                state.resuming = false;
                return None;
            }
            if state.phase == Phase::Offered {
                if state.blocking {
                    if !self.consult_unblock() {
                        state = self.sink_cv.wait(state).unwrap();
                        continue;
                    }
                    state.recently_unblocked = true;
                    state.blocking = false;
                }
                state.resuming = false;
                state.phase = Phase::Consuming;
                let interval = state.granted;
                drop(state);
                if let Some(source) = self.source.upgrade() {
                    source.report_handle_active(self.id);
                }
                return Some(interval);
            }
            state = self.sink_cv.wait(state).unwrap();
        }
    }

    fn consult_unblock(&self) -> bool {
        match self.source.upgrade() {
            Some(source) => source.unblock_handle(self.id),
            None => true,
        }
    }

    /// Reports that the sink consumed `used` ticks of the quantum and ended it cleanly.
    /// Non-blocking.
    pub fn report_continue(&self, used: TimeInterval) {
        self.report(used, Report::Continue);
    }

    /// Reports that the sink consumed `used` ticks of the quantum and paused; the source
    /// must resynchronize before the sink continues. Non-blocking.
    pub fn report_break(&self, used: TimeInterval) {
        self.report(used, Report::Break);
    }

    fn report(&self, used: TimeInterval, report: Report) {
        let mut state = self.state.lock().unwrap();
        if state.disposed {
            // Late report racing a disposal; drop it.
            return;
        }
        debug_assert!(
            matches!(state.phase, Phase::Offered | Phase::Consuming),
            "completion reported with no unreported quantum outstanding"
        );
        debug_assert!(
            used <= state.granted,
            "sink reported more time than was granted"
        );
        state.used = used;
        state.phase = Phase::Reported(report);
        if report == Report::Break {
            state.blocking = true;
        }
        self.source_cv.notify_all();
    }

    /// Switches the sink side on or off. Switching on parks the caller while the handle
    /// is latched; switching off is non-blocking and wakes both sides.
    pub fn set_enabled(&self, enabled: bool) {
        trace!("time handle {}: enabled = {}", self.id.raw(), enabled);
        let mut state = self.state.lock().unwrap();
        if enabled {
            // Held back while latched so an in-progress reconfiguration never observes
            // the flag flipping under it.
            while state.latch_count > 0 && !state.disposed {
                state = self.sink_cv.wait(state).unwrap();
            }
            state.enabled = true;
        } else {
            state.enabled = false;
            self.sink_cv.notify_all();
            self.source_cv.notify_all();
        }
    }

    /// Switches the source side's intent to grant time. Non-blocking; switching off
    /// wakes both sides so parked calls return their denied results.
    pub fn set_source_side_active(&self, active: bool) {
        trace!(
            "time handle {}: source side active = {}",
            self.id.raw(),
            active
        );
        let mut state = self.state.lock().unwrap();
        if state.source_side_active == active {
            return;
        }
        state.source_side_active = active;
        if !active {
            self.sink_cv.notify_all();
            self.source_cv.notify_all();
        }
    }

    /// Holds back enable transitions until the matching [`unlatch`](TimeHandle::unlatch).
    /// Latches nest.
    pub fn latch(&self) {
        let mut state = self.state.lock().unwrap();
        state.latch_count += 1;
    }

    pub fn unlatch(&self) {
        let mut state = self.state.lock().unwrap();
        debug_assert!(state.latch_count > 0, "unlatch without a matching latch");
        state.latch_count = state.latch_count.saturating_sub(1);
        if state.latch_count == 0 {
            self.sink_cv.notify_all();
        }
    }

    /// Ends the handle's life. Idempotent and non-blocking; wakes every parked call and
    /// permanently rejects future grants.
    pub fn dispose(&self) {
        trace!("time handle {}: disposed", self.id.raw());
        let mut state = self.state.lock().unwrap();
        if state.disposed {
            return;
        }
        state.disposed = true;
        self.sink_cv.notify_all();
        self.source_cv.notify_all();
    }

    /// True when the source may issue a new grant: the handle is live, no quantum is
    /// outstanding, and the sink is not away inside a broken quantum without having
    /// come back to ask for time again.
    pub fn is_ready_for_new_time_grant(&self) -> bool {
        let state = self.state.lock().unwrap();
        !state.disposed && state.phase == Phase::Idle && (!state.blocking || state.resuming)
    }

    pub fn enabled(&self) -> bool {
        self.state.lock().unwrap().enabled
    }

    pub fn source_side_active(&self) -> bool {
        self.state.lock().unwrap().source_side_active
    }

    /// Total sink progress ever collected by [`wait_until_done`](TimeHandle::wait_until_done).
    pub fn total_elapsed(&self) -> TimeInterval {
        self.state.lock().unwrap().total_elapsed
    }
}
