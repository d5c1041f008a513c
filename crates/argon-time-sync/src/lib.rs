//! Synchronization handle between the machine's virtual-time source and its time sinks.
//!
//! The emulator advances **virtual time** centrally: one time source hands out quanta of
//! simulation time, and every consumer of time (an emulated CPU, a peripheral with its own
//! clock, a nested emulation) is attached to it through exactly one [`TimeHandle`]. The
//! source offers a quantum with [`TimeHandle::grant`] and collects the outcome with
//! [`TimeHandle::wait_until_done`]; the sink fetches the quantum with
//! [`TimeHandle::request_interval`], runs, and reports back with
//! [`TimeHandle::report_continue`] or [`TimeHandle::report_break`]. Controller threads can
//! enable, disable, latch, or dispose a handle at any point without stopping either side.
//!
//! The handle owns no thread and schedules no work. It is a passive shared object: one
//! mutex, two condition variables, and a small state machine that serializes the protocol
//! between whichever OS threads call into it.

mod handle;
mod interval;
mod source;

pub use handle::{TimeHandle, WaitOutcome};
pub use interval::TimeInterval;
pub use source::{HandleId, TimeSource};
