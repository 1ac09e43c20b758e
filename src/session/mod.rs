//! Inspection session interface
//!
//! The host debugger is an external collaborator. Everything this crate needs
//! from it goes through the [`InspectionSession`] trait:
//! - [`value`]: owned values produced by expression evaluation
//! - [`StopEvent`]: what the host reports each time the debuggee stops
//! - [`FrameSymbol`]: in-scope symbols of a paused frame
//!
//! # Stop Delivery
//!
//! The host delivers stops one at a time on a single thread, with the debuggee
//! fully paused. Implementations of this trait are never called concurrently
//! for the same debuggee, so nothing here needs to be `Sync`.

pub mod value;

use std::fmt;
use thiserror::Error;
use value::{Address, Value};

/// Identity of a debuggee thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId(pub u64);

/// Identity of one stack frame (one activation of a function)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub u64);

/// Handle to a breakpoint or return watch installed in the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BreakpointId(pub u32);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thread {}", self.0)
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame #{:x}", self.0)
    }
}

impl fmt::Display for BreakpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "breakpoint {}", self.0)
    }
}

/// A symbol visible in a paused frame's lexical block
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSymbol {
    pub name: String,
    pub is_argument: bool,
    pub value: Value,
}

impl FrameSymbol {
    pub fn argument(name: impl Into<String>, value: Value) -> Self {
        FrameSymbol {
            name: name.into(),
            is_argument: true,
            value,
        }
    }

    pub fn local(name: impl Into<String>, value: Value) -> Self {
        FrameSymbol {
            name: name.into(),
            is_argument: false,
            value,
        }
    }
}

/// A stop reported by the host
#[derive(Debug, Clone, PartialEq)]
pub enum StopEvent {
    /// A function breakpoint was hit; `frame` is the freshly entered activation
    Breakpoint {
        id: BreakpointId,
        thread: ThreadId,
        frame: FrameId,
    },

    /// A return watch fired; `frame` is the activation that just returned
    Return {
        id: BreakpointId,
        thread: ThreadId,
        frame: FrameId,
        value: Option<Value>,
    },

    /// The debuggee terminated
    Exited { code: i32 },
}

/// Failures reported by the host session
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("no symbol \"{0}\" in current context")]
    UnknownSymbol(String),

    #[error("there is no member named {field}")]
    NoSuchField { field: String },

    #[error("no struct type named {0}")]
    UnknownType(String),

    #[error("cannot access memory at address 0x{address:x}")]
    UnreadableMemory { address: Address },

    #[error("{0} is not active")]
    UnknownFrame(FrameId),

    #[error("no {0} is installed")]
    UnknownBreakpoint(BreakpointId),

    #[error("function \"{0}\" not defined")]
    UnknownFunction(String),

    #[error("the program is not being run")]
    NotRunning,

    #[error("expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },
}

/// Access to a live (paused) debuggee
pub trait InspectionSession {
    /// Evaluate an expression, keyed by symbol name, against the current state
    fn evaluate(&self, expr: &str) -> Result<Value, SessionError>;

    /// Read the struct of type `type_name` stored at `addr`
    fn deref(&self, addr: Address, type_name: &str) -> Result<Value, SessionError>;

    /// Read up to `len` bytes starting at `addr`
    ///
    /// Implementations may return fewer bytes when the range runs past the end
    /// of readable memory. They fail only when `addr` itself is unreadable.
    fn read_memory(&self, addr: Address, len: usize) -> Result<Vec<u8>, SessionError>;

    /// Enumerate the in-scope symbols of a paused frame, parameters first
    fn frame_symbols(
        &self,
        thread: ThreadId,
        frame: FrameId,
    ) -> Result<Vec<FrameSymbol>, SessionError>;

    /// Install a persistent breakpoint on entry to `function`
    fn set_breakpoint(&mut self, function: &str) -> Result<BreakpointId, SessionError>;

    /// Install a one-shot watch that fires when `frame` on `thread` returns
    fn set_return_watch(
        &mut self,
        thread: ThreadId,
        frame: FrameId,
    ) -> Result<BreakpointId, SessionError>;

    /// Remove a breakpoint or watch
    fn delete_breakpoint(&mut self, id: BreakpointId) -> Result<(), SessionError>;
}
