//! Inspector configuration
//!
//! Names of the allocator's symbols and types in the debuggee, plus the content
//! preview bound. Defaults match tinyalloc built with debug info.

use serde::Deserialize;

/// Default number of bytes shown in a block content preview
pub const DEFAULT_PREVIEW_LIMIT: usize = 200;

/// Controls which debuggee symbols are inspected and how previews are bounded.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InspectorConfig {
    /// Global holding a pointer to the heap descriptor.
    pub heap_symbol: String,
    /// Struct type of the heap descriptor.
    pub heap_type: String,
    /// Struct type of one list node.
    pub block_type: String,
    /// Global holding the heap's upper address bound.
    pub limit_symbol: String,
    /// Global holding the block table capacity.
    pub max_blocks_symbol: String,
    /// The allocation entry point to trace.
    pub alloc_function: String,
    /// Maximum number of payload bytes rendered per block.
    pub preview_limit: usize,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            heap_symbol: "heap".to_string(),
            heap_type: "Heap".to_string(),
            block_type: "Block".to_string(),
            limit_symbol: "heap_limit".to_string(),
            max_blocks_symbol: "heap_max_blocks".to_string(),
            alloc_function: "ta_alloc".to_string(),
            preview_limit: DEFAULT_PREVIEW_LIMIT,
        }
    }
}

impl InspectorConfig {
    /// Load a configuration document; absent fields keep their defaults.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    #[must_use]
    pub fn with_preview_limit(mut self, limit: usize) -> Self {
        self.preview_limit = limit;
        self
    }

    #[must_use]
    pub fn with_alloc_function(mut self, function: impl Into<String>) -> Self {
        self.alloc_function = function.into();
        self
    }
}
