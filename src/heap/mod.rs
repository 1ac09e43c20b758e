//! Heap-list dumps
//!
//! This module walks tinyalloc's bookkeeping through an [`InspectionSession`]:
//! - [`HeapSnapshotFormatter`]: resolves the heap descriptor and walks its lists
//! - [`snapshot`]: the structured result and its text rendering
//! - [`preview`]: bounded, failure-tolerant payload previews
//!
//! # List Walks
//!
//! The lists live in memory this crate does not own and cannot trust. Every walk
//! tracks the node addresses it has visited; a repeat (a cycle in the `next`
//! chain) or an unreadable node ends that list with a [`Corruption`] record.
//! The other lists are still walked.
//!
//! The descriptor is resolved again on every call. Nothing is cached between
//! stops, since the debuggee keeps running in between.

pub mod preview;
pub mod snapshot;

use crate::config::InspectorConfig;
use crate::errors::{CorruptionKind, InspectError};
use crate::session::value::{Address, Value};
use crate::session::InspectionSession;
use rustc_hash::FxHashSet;
use serde::Serialize;
use snapshot::{BlockRecord, Corruption, HeapSnapshot, ListDump};
use std::fmt;
use tracing::{debug, warn};

/// The three lists rooted in the heap descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ListName {
    Free,
    Used,
    Fresh,
}

impl ListName {
    /// Dump order
    pub const ALL: [ListName; 3] = [ListName::Free, ListName::Used, ListName::Fresh];

    /// The descriptor field holding this list's root
    pub fn field(self) -> &'static str {
        match self {
            ListName::Free => "free",
            ListName::Used => "used",
            ListName::Fresh => "fresh",
        }
    }
}

impl fmt::Display for ListName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field())
    }
}

/// Produces heap snapshots on demand
#[derive(Debug, Clone, Default)]
pub struct HeapSnapshotFormatter {
    config: InspectorConfig,
}

impl HeapSnapshotFormatter {
    pub fn new(config: InspectorConfig) -> Self {
        HeapSnapshotFormatter { config }
    }

    /// Dump the heap as text
    pub fn dump<S>(&self, session: &S) -> Result<String, InspectError>
    where
        S: InspectionSession + ?Sized,
    {
        Ok(self.snapshot(session)?.render())
    }

    /// Read the descriptor and walk all three lists
    ///
    /// Fails only on symbol resolution; list corruption is recorded in the
    /// affected [`ListDump`].
    pub fn snapshot<S>(&self, session: &S) -> Result<HeapSnapshot, InspectError>
    where
        S: InspectionSession + ?Sized,
    {
        let cfg = &self.config;

        let descriptor = session
            .evaluate(&cfg.heap_symbol)
            .and_then(|v| v.expect_pointer())
            .map_err(|e| InspectError::symbol(&cfg.heap_symbol, e))?;
        let heap = session
            .deref(descriptor, &cfg.heap_type)
            .map_err(|e| InspectError::symbol(format!("*{}", cfg.heap_symbol), e))?;

        let top = self.descriptor_field(&heap, "top")?.clone();
        let limit = session
            .evaluate(&cfg.limit_symbol)
            .map_err(|e| InspectError::symbol(&cfg.limit_symbol, e))?;
        let max_blocks = session
            .evaluate(&cfg.max_blocks_symbol)
            .map_err(|e| InspectError::symbol(&cfg.max_blocks_symbol, e))?;

        // Resolve every root before walking so a layout mismatch fails up front
        let mut roots = Vec::with_capacity(ListName::ALL.len());
        for list in ListName::ALL {
            let root = self
                .descriptor_field(&heap, list.field())?
                .expect_pointer()
                .map_err(|e| InspectError::symbol(self.field_path(list.field()), e))?;
            roots.push((list, root));
        }

        let mut lists = Vec::with_capacity(roots.len());
        for (list, root) in roots {
            lists.push(self.walk(session, list, root)?);
        }

        debug!(
            descriptor = format_args!("0x{:x}", descriptor),
            "heap snapshot taken"
        );

        Ok(HeapSnapshot {
            descriptor,
            top,
            limit,
            max_blocks,
            lists,
        })
    }

    fn descriptor_field<'a>(&self, heap: &'a Value, name: &str) -> Result<&'a Value, InspectError> {
        heap.expect_field(name)
            .map_err(|e| InspectError::symbol(self.field_path(name), e))
    }

    fn field_path(&self, field: &str) -> String {
        format!("{}->{}", self.config.heap_symbol, field)
    }

    /// Walk one list from `root` until the null sentinel or a corruption
    fn walk<S>(
        &self,
        session: &S,
        list: ListName,
        root: Address,
    ) -> Result<ListDump, InspectError>
    where
        S: InspectionSession + ?Sized,
    {
        let mut dump = ListDump::new(list, root);
        let mut visited = FxHashSet::default();
        let mut current = root;

        while current != 0 {
            if !visited.insert(current) {
                warn!(%list, node = format_args!("0x{:x}", current), "list revisits a node");
                dump.corruption = Some(Corruption {
                    address: current,
                    kind: CorruptionKind::Cycle,
                });
                break;
            }

            let node = match session.deref(current, &self.config.block_type) {
                Ok(node) => node,
                Err(e) => {
                    warn!(
                        %list,
                        node = format_args!("0x{:x}", current),
                        error = %e,
                        "list node unreadable"
                    );
                    dump.corruption = Some(Corruption {
                        address: current,
                        kind: CorruptionKind::Unreadable {
                            reason: e.to_string(),
                        },
                    });
                    break;
                }
            };

            let block = self.read_block(session, current, &node)?;
            current = block.next;
            dump.blocks.push(block);
        }

        debug!(%list, blocks = dump.blocks.len(), "list walked");
        Ok(dump)
    }

    fn read_block<S>(
        &self,
        session: &S,
        at: Address,
        node: &Value,
    ) -> Result<BlockRecord, InspectError>
    where
        S: InspectionSession + ?Sized,
    {
        let symbol = |name: &str| format!("{}.{}", self.config.block_type, name);
        let field = |name: &str| {
            node.expect_field(name)
                .map_err(|e| InspectError::symbol(symbol(name), e))
        };

        let addr = field("addr")?
            .expect_pointer()
            .map_err(|e| InspectError::symbol(symbol("addr"), e))?;
        let next = field("next")?
            .expect_pointer()
            .map_err(|e| InspectError::symbol(symbol("next"), e))?;
        let size = field("size")?
            .expect_size()
            .map_err(|e| InspectError::symbol(symbol("size"), e))?;

        let preview = if addr != 0 {
            Some(preview::read_preview(session, addr, self.config.preview_limit))
        } else {
            None
        };

        Ok(BlockRecord {
            node: at,
            addr,
            next,
            size,
            preview,
        })
    }
}
