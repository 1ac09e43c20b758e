//! Error types for heap dumps and call tracing
//!
//! This module defines [`InspectError`], the failures this crate reports to the
//! operator (as opposed to [`SessionError`], which is what the host reports to us).
//!
//! - Symbol resolution failures abort the operation that hit them.
//! - List corruption terminates a single list; the rest of the dump survives.
//! - Argument resolution failures drop a single traced activation.

use crate::heap::ListName;
use crate::session::value::Address;
use crate::session::{FrameId, SessionError, ThreadId};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Why a list walk stopped early
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CorruptionKind {
    /// A `next` pointer led back to a node already walked
    Cycle,
    /// The node structure itself could not be read
    Unreadable { reason: String },
}

impl fmt::Display for CorruptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorruptionKind::Cycle => write!(f, "next chain revisits an earlier node"),
            CorruptionKind::Unreadable { reason } => write!(f, "node is unreadable ({})", reason),
        }
    }
}

/// Failures surfaced to the operator
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InspectError {
    /// A named allocator symbol, global or field could not be resolved
    #[error("cannot resolve '{symbol}': {source}")]
    SymbolResolution {
        symbol: String,
        #[source]
        source: SessionError,
    },

    /// A list walk revisited a node or hit unreadable memory
    #[error("{list} list corrupted at node 0x{address:x}: {kind}")]
    CorruptedList {
        list: ListName,
        address: Address,
        kind: CorruptionKind,
    },

    /// The entry frame of a traced call had no parameter to capture
    #[error("no argument found in {function} ({thread}, {frame})")]
    ArgumentResolution {
        function: String,
        thread: ThreadId,
        frame: FrameId,
    },

    /// Breakpoint bookkeeping failed in the host
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl InspectError {
    pub(crate) fn symbol(symbol: impl Into<String>, source: SessionError) -> Self {
        InspectError::SymbolResolution {
            symbol: symbol.into(),
            source,
        }
    }

    /// Short category name used when annotating output
    pub fn category(&self) -> &'static str {
        match self {
            InspectError::SymbolResolution { .. } => "SymbolResolutionError",
            InspectError::CorruptedList { .. } => "CorruptedListError",
            InspectError::ArgumentResolution { .. } => "ArgumentResolutionError",
            InspectError::Session(_) => "SessionError",
        }
    }

    /// Render as a one-line annotation, e.g. `<CorruptedListError: ...>`
    pub fn annotation(&self) -> String {
        format!("<{}: {}>", self.category(), self)
    }
}
