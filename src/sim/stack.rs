//! Per-thread call stacks of the simulated debuggee
//!
//! Frame ids are derived from the frame's depth, the way a real debugger derives
//! them from the stack pointer: two calls made one after the other at the same
//! depth get the same id. Only activations that are live at the same time are
//! guaranteed distinct ids.
//!
//! Hosts that number frames by level instead are modelled with
//! [`FrameNumbering::Level`]. Those ids are unique within a thread only.

use super::constants::{FRAME_SIZE, STACK_ADDRESS_TOP, THREAD_STACK_SIZE};
use crate::session::{FrameId, FrameSymbol, ThreadId};

/// How a stack assigns frame ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameNumbering {
    /// Derived from the frame's stack address, distinct across threads
    #[default]
    StackAddress,
    /// The frame's depth, shared by every thread
    Level,
}

/// Stack frame for one function activation
#[derive(Debug, Clone)]
pub struct StackFrame {
    pub id: FrameId,
    pub function_name: String,
    pub symbols: Vec<FrameSymbol>, // Parameters first, then locals
}

/// One thread's call stack
#[derive(Debug, Clone)]
pub struct Stack {
    thread: ThreadId,
    numbering: FrameNumbering,
    frames: Vec<StackFrame>,
}

impl Stack {
    pub fn new(thread: ThreadId) -> Self {
        Self::with_numbering(thread, FrameNumbering::default())
    }

    pub fn with_numbering(thread: ThreadId, numbering: FrameNumbering) -> Self {
        Stack {
            thread,
            numbering,
            frames: Vec::new(),
        }
    }

    /// The id the next pushed frame will get
    fn next_frame_id(&self) -> FrameId {
        let depth = self.frames.len() as u64 + 1;
        match self.numbering {
            FrameNumbering::StackAddress => FrameId(
                STACK_ADDRESS_TOP
                    .wrapping_sub(self.thread.0.wrapping_mul(THREAD_STACK_SIZE))
                    .wrapping_sub(depth.wrapping_mul(FRAME_SIZE)),
            ),
            FrameNumbering::Level => FrameId(depth),
        }
    }

    /// Push a new stack frame and return its id
    pub fn push_frame(&mut self, function_name: String, symbols: Vec<FrameSymbol>) -> FrameId {
        let id = self.next_frame_id();
        self.frames.push(StackFrame {
            id,
            function_name,
            symbols,
        });
        id
    }

    /// Pop the top stack frame
    pub fn pop_frame(&mut self) -> Option<StackFrame> {
        self.frames.pop()
    }

    /// Get the current (top) frame
    pub fn current_frame(&self) -> Option<&StackFrame> {
        self.frames.last()
    }

    pub fn find(&self, id: FrameId) -> Option<&StackFrame> {
        self.frames.iter().find(|f| f.id == id)
    }

    /// Get the depth of the call stack
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
