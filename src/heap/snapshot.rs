// Structured heap snapshot and its text rendering

use super::preview::Preview;
use super::ListName;
use crate::errors::{CorruptionKind, InspectError};
use crate::session::value::{Address, Value};
use serde::Serialize;
use std::fmt;

/// One node of an allocator list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockRecord {
    pub node: Address, // Address of the node structure itself
    pub addr: Address,
    pub next: Address,
    pub size: u64,
    pub preview: Option<Preview>,
}

impl fmt::Display for BlockRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} = {{", Value::pointer(self.node))?;
        writeln!(f, "\taddr = {},", Value::pointer(self.addr))?;
        writeln!(f, "\tnext = {},", Value::pointer(self.next))?;
        writeln!(f, "\tsize = {},", self.size)?;
        if let Some(preview) = &self.preview {
            writeln!(f, "\tcontent = {}", preview)?;
        }
        writeln!(f, "}}")
    }
}

/// Where and why a list walk was cut short
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Corruption {
    pub address: Address,
    #[serde(flatten)]
    pub kind: CorruptionKind,
}

/// The walked prefix of one list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListDump {
    pub name: ListName,
    pub root: Address,
    pub blocks: Vec<BlockRecord>,
    pub corruption: Option<Corruption>,
}

impl ListDump {
    pub(crate) fn new(name: ListName, root: Address) -> Self {
        ListDump {
            name,
            root,
            blocks: Vec::new(),
            corruption: None,
        }
    }

    /// The corruption as an error value, if the walk was cut short
    pub fn error(&self) -> Option<InspectError> {
        self.corruption
            .as_ref()
            .map(|corruption| InspectError::CorruptedList {
                list: self.name,
                address: corruption.address,
                kind: corruption.kind.clone(),
            })
    }

    /// Total bytes described by the walked blocks
    pub fn total_size(&self) -> u64 {
        self.blocks.iter().map(|b| b.size).sum()
    }
}

impl fmt::Display for ListDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}: {}", self.name, Value::pointer(self.root))?;
        for block in &self.blocks {
            write!(f, "{}", block)?;
        }
        if let Some(err) = self.error() {
            writeln!(f, "{}", err.annotation())?;
        }
        Ok(())
    }
}

/// Point-in-time view of the allocator's bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeapSnapshot {
    pub descriptor: Address,
    pub top: Value,
    pub limit: Value,
    pub max_blocks: Value,
    pub lists: Vec<ListDump>, // Always free, used, fresh
}

impl HeapSnapshot {
    /// Render the operator-facing text dump
    pub fn render(&self) -> String {
        self.to_string()
    }

    /// Serialize the snapshot as JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn list(&self, name: ListName) -> Option<&ListDump> {
        self.lists.iter().find(|l| l.name == name)
    }

    /// Errors recorded while walking, in list order
    pub fn errors(&self) -> Vec<InspectError> {
        self.lists.iter().filter_map(ListDump::error).collect()
    }
}

impl fmt::Display for HeapSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Heap start: \t{}", Value::pointer(self.descriptor))?;
        writeln!(f, "Heap top: \t{}", self.top)?;
        writeln!(f, "Heap limit: \t{}", self.limit)?;
        writeln!(f, "Heap blocks: \t{}", self.max_blocks)?;
        for (i, list) in self.lists.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", list)?;
        }
        Ok(())
    }
}
