//! # Introduction
//!
//! tinyscope inspects a live process that links the tinyalloc allocator. It
//! works through a host debugger, reached via the
//! [`session::InspectionSession`] trait, and offers two tools:
//!
//! - a heap dump that walks the allocator's `free`, `used` and `fresh` lists
//!   and renders them as text ([`heap::HeapSnapshotFormatter`]);
//! - a tracer that pairs every `ta_alloc` entry with its own return and
//!   reports `<pointer> = ta_alloc(<size>)` ([`tracer::CallPairTracer`]).
//!
//! ## Pipeline
//!
//! ```text
//! Host stop → InspectionSession → HeapSnapshotFormatter → HeapSnapshot → text / JSON
//!                               → CallPairTracer        → CallRecord   → trace line
//! ```
//!
//! 1. [`session`]: the host interface, stop events and debuggee values.
//! 2. [`heap`]: list walks with cycle detection and payload previews.
//! 3. [`tracer`]: frame-keyed pairing of entry and return stops.
//! 4. [`config`]: symbol names and preview bounds.
//! 5. [`errors`]: [`errors::InspectError`], the operator-facing taxonomy.
//! 6. [`sim`]: an in-memory debuggee for tests and the demo binary.
//!
//! Nothing here writes to debuggee memory. Stops are handled synchronously on
//! the host's thread while the debuggee is paused.

pub mod config;
pub mod errors;
pub mod heap;
pub mod session;
pub mod sim;
pub mod tracer;
