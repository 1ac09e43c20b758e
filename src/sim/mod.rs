//! In-memory simulated debuggee
//!
//! A stand-in for a real debugger session, used by the tests and the demo
//! binary:
//! - [`memory`]: mapped regions with unmapped-page semantics
//! - [`layout`]: packed struct layouts for typed reads and writes
//! - [`stack`]: per-thread call stacks with depth-derived frame ids
//! - [`process`]: [`SimulatedProcess`], the
//!   [`InspectionSession`](crate::session::InspectionSession) implementation
//! - [`image`]: [`TinyallocImage`], a tinyalloc heap laid out in that memory
//!
//! The simulation models only what the inspector observes. It does not run
//! the allocator; scenarios arrange list state directly.

pub mod constants;
pub mod image;
pub mod layout;
pub mod memory;
pub mod process;
pub mod stack;

pub use image::TinyallocImage;
pub use process::SimulatedProcess;

use crate::session::value::{Address, Value};
use crate::session::{SessionError, ThreadId};
use thiserror::Error;

/// Failures while arranging or driving a simulation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("cannot map {size} bytes at 0x{base:x}")]
    BadMapping { base: Address, size: usize },

    #[error("write to unmapped address 0x{address:x}")]
    UnmappedWrite { address: Address },

    #[error("no struct type named {0}")]
    UnknownType(String),

    #[error("struct {type_name} has no field {field}")]
    UnknownField { type_name: String, field: String },

    #[error("value {value} does not fit field {field}")]
    BadFieldValue { field: String, value: Value },

    #[error("no function named {0}")]
    UnknownFunction(String),

    #[error("{0} has no frame to return from")]
    NoFrame(ThreadId),

    #[error("the process has exited")]
    NotRunning,

    #[error("no fresh blocks left")]
    OutOfBlocks,

    #[error("0x{0:x} is not a used block")]
    NotAllocated(Address),

    #[error(transparent)]
    Session(#[from] SessionError),
}
