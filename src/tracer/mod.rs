//! Call-pairing tracer for the allocation entry point
//!
//! Entry and exit of a traced call arrive as two separate stops. The tracer
//! pairs them:
//! 1. On the entry breakpoint, capture the first argument of the paused frame
//!    and install a one-shot return watch bound to that frame.
//! 2. When the watch fires, pair the captured size with the return value and
//!    emit a [`CallRecord`].
//!
//! Pending activations are keyed by `(thread, frame)`. Recursive calls therefore
//! report innermost first, each with its own size.

pub mod activation;

use crate::config::InspectorConfig;
use crate::errors::InspectError;
use crate::session::value::Value;
use crate::session::{BreakpointId, FrameId, InspectionSession, StopEvent, ThreadId};
use activation::{ActivationKey, CallActivation, CallRecord};
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

/// What a stop meant to the tracer
#[derive(Debug, Clone, PartialEq)]
pub enum TraceOutcome {
    /// Not one of the tracer's breakpoints
    Ignored,
    /// Entry captured; waiting for the return
    Pending,
    /// A call completed
    Reported(CallRecord),
    /// An entry could not be traced; only that activation is dropped
    Skipped(InspectError),
    /// The debuggee exited with calls still in flight
    Exited { abandoned: usize },
}

impl TraceOutcome {
    /// The operator-facing trace line, if this stop produces one
    pub fn line(&self) -> Option<String> {
        match self {
            TraceOutcome::Reported(record) => Some(record.to_string()),
            TraceOutcome::Skipped(err) => Some(format!("skipped call: {}", err.annotation())),
            TraceOutcome::Exited { abandoned } if *abandoned > 0 => Some(format!(
                "process exited with {} call(s) still in flight",
                abandoned
            )),
            _ => None,
        }
    }
}

/// Pairs entries and returns of the allocation function
#[derive(Debug)]
pub struct CallPairTracer {
    function: String,
    entry: Option<BreakpointId>,
    pending: FxHashMap<ActivationKey, CallActivation>,
}

impl CallPairTracer {
    pub fn new(config: &InspectorConfig) -> Self {
        CallPairTracer {
            function: config.alloc_function.clone(),
            entry: None,
            pending: FxHashMap::default(),
        }
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn is_attached(&self) -> bool {
        self.entry.is_some()
    }

    /// Number of calls entered but not yet returned
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Install the entry breakpoint
    pub fn attach<S>(&mut self, session: &mut S) -> Result<BreakpointId, InspectError>
    where
        S: InspectionSession + ?Sized,
    {
        if let Some(id) = self.entry {
            return Ok(id);
        }
        let id = session
            .set_breakpoint(&self.function)
            .map_err(|e| InspectError::symbol(&self.function, e))?;
        debug!(function = %self.function, %id, "entry breakpoint installed");
        self.entry = Some(id);
        Ok(id)
    }

    /// React to one stop delivered by the host
    pub fn handle_stop<S>(&mut self, session: &mut S, event: &StopEvent) -> TraceOutcome
    where
        S: InspectionSession + ?Sized,
    {
        match event {
            StopEvent::Breakpoint { id, thread, frame } if Some(*id) == self.entry => {
                match self.on_entry(session, *thread, *frame) {
                    Ok(()) => TraceOutcome::Pending,
                    Err(err) => {
                        warn!(%thread, %frame, error = %err, "dropping activation");
                        TraceOutcome::Skipped(err)
                    }
                }
            }
            StopEvent::Return {
                id,
                thread,
                frame,
                value,
            } => self.on_return(*id, *thread, *frame, value.clone()),
            StopEvent::Exited { code } => {
                let abandoned = self.pending.len();
                self.pending.clear();
                debug!(code, abandoned, "debuggee exited");
                TraceOutcome::Exited { abandoned }
            }
            StopEvent::Breakpoint { .. } => TraceOutcome::Ignored,
        }
    }

    fn on_entry<S>(
        &mut self,
        session: &mut S,
        thread: ThreadId,
        frame: FrameId,
    ) -> Result<(), InspectError>
    where
        S: InspectionSession + ?Sized,
    {
        let argument = session
            .frame_symbols(thread, frame)?
            .into_iter()
            .find(|symbol| symbol.is_argument)
            .ok_or_else(|| InspectError::ArgumentResolution {
                function: self.function.clone(),
                thread,
                frame,
            })?;

        // The frame's storage is only valid during this stop, so keep the rendering
        let size = argument.value.to_string();
        let key = ActivationKey { thread, frame };

        if let Some(stale) = self.pending.remove(&key) {
            // Same frame entered again without a return: the old call unwound abnormally
            warn!(%thread, %frame, size = %stale.size, "replacing activation that never returned");
            if let Some(watch) = stale.watch() {
                if let Err(e) = session.delete_breakpoint(watch) {
                    warn!(%watch, error = %e, "could not remove stale return watch");
                }
            }
        }

        let mut activation = CallActivation::enter(key, size);
        let watch = session.set_return_watch(thread, frame)?;
        activation.await_return(watch);
        debug!(%thread, %frame, size = %activation.size, %watch, "call entered");
        self.pending.insert(key, activation);
        Ok(())
    }

    fn on_return(
        &mut self,
        id: BreakpointId,
        thread: ThreadId,
        frame: FrameId,
        value: Option<Value>,
    ) -> TraceOutcome {
        let key = ActivationKey { thread, frame };
        if !self.pending.get(&key).is_some_and(|a| a.watch() == Some(id)) {
            return TraceOutcome::Ignored;
        }
        let Some(activation) = self.pending.remove(&key) else {
            return TraceOutcome::Ignored;
        };

        let record = activation.report(&self.function, value);
        debug!(%thread, %frame, record = %record, "call returned");
        TraceOutcome::Reported(record)
    }

    /// Remove the entry breakpoint and every outstanding return watch
    ///
    /// Returns how many in-flight calls were abandoned.
    pub fn detach<S>(&mut self, session: &mut S) -> Result<usize, InspectError>
    where
        S: InspectionSession + ?Sized,
    {
        let abandoned = self.pending.len();
        let mut watches: Vec<BreakpointId> =
            self.pending.drain().filter_map(|(_, a)| a.watch()).collect();
        watches.sort();

        let mut first_error = None;
        for watch in watches.into_iter().chain(self.entry.take()) {
            if let Err(e) = session.delete_breakpoint(watch) {
                warn!(%watch, error = %e, "could not remove breakpoint");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        debug!(abandoned, "tracer detached");

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(abandoned),
        }
    }
}
