//! In-flight calls to the traced function
//!
//! A [`CallActivation`] lives from the entry stop to the matching return stop:
//!
//! ```text
//! Entered → AwaitingReturn → Reported
//! ```
//!
//! Activations are keyed by [`ActivationKey`], never by the function, so nested
//! or concurrent calls each pair with their own return.

use crate::session::value::Value;
use crate::session::{BreakpointId, FrameId, ThreadId};
use std::fmt;

/// Identity of one activation: the frame, qualified by its thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActivationKey {
    pub thread: ThreadId,
    pub frame: FrameId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationState {
    Entered,
    AwaitingReturn,
    Reported,
}

/// A call whose entry has been seen
#[derive(Debug, Clone)]
pub struct CallActivation {
    pub key: ActivationKey,
    pub size: String, // Captured while the entry frame was still paused
    state: ActivationState,
    watch: Option<BreakpointId>,
}

impl CallActivation {
    pub fn enter(key: ActivationKey, size: String) -> Self {
        CallActivation {
            key,
            size,
            state: ActivationState::Entered,
            watch: None,
        }
    }

    /// Bind the return watch installed for this activation
    pub fn await_return(&mut self, watch: BreakpointId) {
        debug_assert_eq!(self.state, ActivationState::Entered);
        self.state = ActivationState::AwaitingReturn;
        self.watch = Some(watch);
    }

    pub fn state(&self) -> ActivationState {
        self.state
    }

    pub fn watch(&self) -> Option<BreakpointId> {
        self.watch
    }

    /// Consume the activation into its record
    pub fn report(mut self, function: &str, returned: Option<Value>) -> CallRecord {
        debug_assert_eq!(self.state, ActivationState::AwaitingReturn);
        self.state = ActivationState::Reported;
        CallRecord {
            function: function.to_string(),
            thread: self.key.thread,
            size: self.size,
            returned,
        }
    }
}

/// One completed call, paired entry to return
#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    pub function: String,
    pub thread: ThreadId,
    pub size: String,
    pub returned: Option<Value>,
}

impl fmt::Display for CallRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.returned {
            Some(value) => write!(f, "{} = {}({})", value, self.function, self.size),
            None => write!(f, "<unavailable> = {}({})", self.function, self.size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ActivationKey {
        ActivationKey {
            thread: ThreadId(1),
            frame: FrameId(0x7ff0),
        }
    }

    #[test]
    fn test_state_transitions() {
        let mut activation = CallActivation::enter(key(), "64".to_string());
        assert_eq!(activation.state(), ActivationState::Entered);
        assert!(activation.watch().is_none());

        activation.await_return(BreakpointId(7));
        assert_eq!(activation.state(), ActivationState::AwaitingReturn);
        assert_eq!(activation.watch(), Some(BreakpointId(7)));

        let record = activation.report("ta_alloc", Some(Value::Pointer(0x4052a0)));
        assert_eq!(record.to_string(), "0x4052a0 = ta_alloc(64)");
    }

    #[test]
    fn test_null_and_missing_return_values() {
        let record = CallRecord {
            function: "ta_alloc".to_string(),
            thread: ThreadId(1),
            size: "0".to_string(),
            returned: Some(Value::Null),
        };
        assert_eq!(record.to_string(), "0x0 = ta_alloc(0)");

        let record = CallRecord {
            returned: None,
            ..record
        };
        assert_eq!(record.to_string(), "<unavailable> = ta_alloc(0)");
    }
}
