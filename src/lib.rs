//! pytrace: shadow call-stack tracing for CPython with PyO3 bindings.
//!
//! Mirrors the interpreter's call stack out-of-band: every call/return
//! trace event pushes/pops a pooled frame record on a per-thread shadow
//! stack, and every exception event parks an independent snapshot of that
//! stack on the raised exception object. Error-reporting code can then
//! recover the full call path (file, line, method, captured frame) after
//! the native stack has long unwound, without walking the real stack on
//! every raise.
//!
//! # Architecture
//!
//! - **Per-thread stack store**: thread id → owned `StackState`, created on
//!   the first event observed for a thread
//! - **Pooled frame nodes**: slab arena with a free list; warm push/pop is
//!   O(1) with no per-event heap allocation
//! - **Copy-on-attach snapshots**: raise events deep-copy the live chain,
//!   so later pops never invalidate an attached stack

pub mod arena;
pub mod frame;
pub mod ids;
pub mod logging;
pub mod registry;
pub mod stack;
pub mod tracer;

// Re-exports for convenience
pub use arena::FrameArena;
pub use frame::{CallRecord, Frame, TraceFrame};
pub use ids::FrameId;
pub use registry::ThreadRegistry;
pub use stack::{FrameIter, StackState};
pub use tracer::{get_stack_state, make_tracepoint, Tracepoint, STACK_STATE_ATTR};
