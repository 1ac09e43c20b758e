//! The simulated debuggee and its [`InspectionSession`] implementation

use super::layout::StructLayout;
use super::memory::Memory;
use super::stack::{FrameNumbering, Stack};
use super::SimError;
use crate::session::value::{Address, Value};
use crate::session::{
    BreakpointId, FrameId, FrameSymbol, InspectionSession, SessionError, StopEvent, ThreadId,
};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Watch {
    Entry { function: String },
    Return { thread: ThreadId, frame: FrameId },
}

/// A scriptable in-memory process
///
/// Tests and demos lay out memory with the setup methods, then drive execution
/// with [`call`](Self::call) and [`ret`](Self::ret). Each returns the stop the
/// host would deliver, which the caller hands to whoever is tracing.
#[derive(Debug)]
pub struct SimulatedProcess {
    memory: Memory,
    layouts: FxHashMap<String, StructLayout>,
    globals: FxHashMap<String, Value>,
    functions: FxHashSet<String>,
    threads: BTreeMap<ThreadId, Stack>,
    breakpoints: BTreeMap<BreakpointId, Watch>, // Ordered so the lowest id wins a tie
    next_breakpoint: u32,
    numbering: FrameNumbering,
    running: bool,
}

impl SimulatedProcess {
    pub fn new() -> Self {
        SimulatedProcess {
            memory: Memory::new(),
            layouts: FxHashMap::default(),
            globals: FxHashMap::default(),
            functions: FxHashSet::default(),
            threads: BTreeMap::new(),
            breakpoints: BTreeMap::new(),
            next_breakpoint: 1,
            numbering: FrameNumbering::default(),
            running: true,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Choose how frame ids are assigned to threads started from now on
    pub fn set_frame_numbering(&mut self, numbering: FrameNumbering) {
        self.numbering = numbering;
    }

    pub fn map_region(&mut self, base: Address, size: usize) -> Result<(), SimError> {
        self.memory.map(base, size)
    }

    pub fn define_struct(&mut self, layout: StructLayout) {
        self.layouts.insert(layout.name.clone(), layout);
    }

    pub fn define_global(&mut self, name: &str, value: Value) {
        self.globals.insert(name.to_string(), value);
    }

    pub fn define_function(&mut self, name: &str) {
        self.functions.insert(name.to_string());
    }

    pub fn write_bytes(&mut self, addr: Address, bytes: &[u8]) -> Result<(), SimError> {
        self.memory.write_bytes_at(addr, bytes)
    }

    /// Write one field of the struct of type `type_name` at `addr`
    pub fn write_field(
        &mut self,
        addr: Address,
        type_name: &str,
        field: &str,
        value: &Value,
    ) -> Result<(), SimError> {
        let layout = self
            .layouts
            .get(type_name)
            .ok_or_else(|| SimError::UnknownType(type_name.to_string()))?;
        let (offset, bytes) = layout.encode_field(field, value)?;
        self.memory.write_bytes_at(addr + offset as u64, &bytes)
    }

    pub fn write_struct(
        &mut self,
        addr: Address,
        type_name: &str,
        fields: &[(&str, Value)],
    ) -> Result<(), SimError> {
        for (field, value) in fields {
            self.write_field(addr, type_name, field, value)?;
        }
        Ok(())
    }

    /// Number of breakpoints and watches currently installed
    pub fn installed_breakpoints(&self) -> usize {
        self.breakpoints.len()
    }

    /// Enter `function` on `thread` with the given frame symbols
    ///
    /// Returns the breakpoint stop if an entry breakpoint covers `function`.
    pub fn call(
        &mut self,
        thread: ThreadId,
        function: &str,
        symbols: Vec<FrameSymbol>,
    ) -> Result<Option<StopEvent>, SimError> {
        if !self.running {
            return Err(SimError::NotRunning);
        }
        if !self.functions.contains(function) {
            return Err(SimError::UnknownFunction(function.to_string()));
        }

        let numbering = self.numbering;
        let frame = self
            .threads
            .entry(thread)
            .or_insert_with(|| Stack::with_numbering(thread, numbering))
            .push_frame(function.to_string(), symbols);
        trace!(%thread, %frame, function, "call");

        let hit = self.breakpoints.iter().find_map(|(&id, watch)| match watch {
            Watch::Entry { function: f } if f == function => Some(id),
            _ => None,
        });
        Ok(hit.map(|id| StopEvent::Breakpoint { id, thread, frame }))
    }

    /// Return from the innermost frame of `thread` with `value`
    ///
    /// Returns the watch stop if a return watch covers that frame. Watches are
    /// one-shot and removed as they fire.
    pub fn ret(&mut self, thread: ThreadId, value: Value) -> Result<Option<StopEvent>, SimError> {
        let frame = self
            .threads
            .get_mut(&thread)
            .and_then(Stack::pop_frame)
            .ok_or(SimError::NoFrame(thread))?
            .id;
        trace!(%thread, %frame, %value, "return");

        let hit = self.take_return_watch(thread, frame);
        Ok(hit.map(|id| StopEvent::Return {
            id,
            thread,
            frame,
            value: Some(value),
        }))
    }

    /// Discard the innermost frame without returning (a `longjmp` past it)
    ///
    /// Any watch on that frame goes out of scope and is removed silently.
    pub fn unwind(&mut self, thread: ThreadId) -> Result<FrameId, SimError> {
        let frame = self
            .threads
            .get_mut(&thread)
            .and_then(Stack::pop_frame)
            .ok_or(SimError::NoFrame(thread))?
            .id;
        self.take_return_watch(thread, frame);
        Ok(frame)
    }

    /// Discard the innermost frame without the host noticing
    ///
    /// Unlike [`unwind`](Self::unwind), a watch on that frame stays installed.
    pub fn unwind_unobserved(&mut self, thread: ThreadId) -> Result<FrameId, SimError> {
        let frame = self
            .threads
            .get_mut(&thread)
            .and_then(Stack::pop_frame)
            .ok_or(SimError::NoFrame(thread))?
            .id;
        trace!(%thread, %frame, "frame discarded with its watch");
        Ok(frame)
    }

    /// Terminate the process
    pub fn exit(&mut self, code: i32) -> StopEvent {
        self.running = false;
        self.threads.clear();
        self.breakpoints
            .retain(|_, watch| matches!(watch, Watch::Entry { .. }));
        StopEvent::Exited { code }
    }

    fn take_return_watch(&mut self, thread: ThreadId, frame: FrameId) -> Option<BreakpointId> {
        let target = Watch::Return { thread, frame };
        let id = self
            .breakpoints
            .iter()
            .find_map(|(&id, watch)| (*watch == target).then_some(id))?;
        self.breakpoints.remove(&id);
        Some(id)
    }

    fn ensure_running(&self) -> Result<(), SessionError> {
        if self.running {
            Ok(())
        } else {
            Err(SessionError::NotRunning)
        }
    }

    fn install(&mut self, watch: Watch) -> BreakpointId {
        let id = BreakpointId(self.next_breakpoint);
        self.next_breakpoint += 1;
        self.breakpoints.insert(id, watch);
        id
    }
}

impl Default for SimulatedProcess {
    fn default() -> Self {
        Self::new()
    }
}

impl InspectionSession for SimulatedProcess {
    fn evaluate(&self, expr: &str) -> Result<Value, SessionError> {
        self.ensure_running()?;
        let name = expr.trim();
        self.globals
            .get(name)
            .cloned()
            .ok_or_else(|| SessionError::UnknownSymbol(name.to_string()))
    }

    fn deref(&self, addr: Address, type_name: &str) -> Result<Value, SessionError> {
        self.ensure_running()?;
        let layout = self
            .layouts
            .get(type_name)
            .ok_or_else(|| SessionError::UnknownType(type_name.to_string()))?;
        let size = layout.size();
        let bytes = self.memory.read_bytes_at(addr, size)?;
        if bytes.len() < size {
            return Err(SessionError::UnreadableMemory {
                address: addr + bytes.len() as u64,
            });
        }
        Ok(layout.decode(&bytes))
    }

    fn read_memory(&self, addr: Address, len: usize) -> Result<Vec<u8>, SessionError> {
        self.ensure_running()?;
        self.memory.read_bytes_at(addr, len)
    }

    fn frame_symbols(
        &self,
        thread: ThreadId,
        frame: FrameId,
    ) -> Result<Vec<FrameSymbol>, SessionError> {
        self.ensure_running()?;
        self.threads
            .get(&thread)
            .and_then(|stack| stack.find(frame))
            .map(|f| f.symbols.clone())
            .ok_or(SessionError::UnknownFrame(frame))
    }

    fn set_breakpoint(&mut self, function: &str) -> Result<BreakpointId, SessionError> {
        if !self.functions.contains(function) {
            return Err(SessionError::UnknownFunction(function.to_string()));
        }
        Ok(self.install(Watch::Entry {
            function: function.to_string(),
        }))
    }

    fn set_return_watch(
        &mut self,
        thread: ThreadId,
        frame: FrameId,
    ) -> Result<BreakpointId, SessionError> {
        self.ensure_running()?;
        let live = self
            .threads
            .get(&thread)
            .is_some_and(|stack| stack.find(frame).is_some());
        if !live {
            return Err(SessionError::UnknownFrame(frame));
        }
        Ok(self.install(Watch::Return { thread, frame }))
    }

    fn delete_breakpoint(&mut self, id: BreakpointId) -> Result<(), SessionError> {
        self.breakpoints
            .remove(&id)
            .map(|_| ())
            .ok_or(SessionError::UnknownBreakpoint(id))
    }
}
