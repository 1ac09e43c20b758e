//! A tinyalloc heap laid out in simulated memory
//!
//! The layout follows the allocator's own initialisation: the `Heap`
//! descriptor sits at the base of the region, the block table follows it, and
//! payload memory starts after the table. All blocks begin on the `fresh` list.
//!
//! ```text
//! base                                   top                 limit
//! | Heap | Block[0] ... Block[n-1] | payload ... |   unused   |
//! ```

use super::layout::StructLayout;
use super::process::SimulatedProcess;
use super::SimError;
use crate::heap::ListName;
use crate::session::value::{Address, Value};
use crate::session::InspectionSession;

pub const HEAP_TYPE: &str = "Heap";
pub const BLOCK_TYPE: &str = "Block";

/// A simulated process hosting a tinyalloc heap
#[derive(Debug)]
pub struct TinyallocImage {
    process: SimulatedProcess,
    base: Address,
    block_size: u64,
    max_blocks: usize,
    top: Address,
}

impl TinyallocImage {
    /// Map `size` bytes at `base` and initialise a heap with `max_blocks` blocks
    pub fn new(base: Address, size: usize, max_blocks: usize) -> Result<Self, SimError> {
        let heap_layout = StructLayout::tinyalloc_heap();
        let block_layout = StructLayout::tinyalloc_block();
        let block_size = block_layout.size() as u64;
        let top = base + heap_layout.size() as u64 + max_blocks as u64 * block_size;

        let mut process = SimulatedProcess::new();
        process.map_region(base, size)?;
        process.define_struct(heap_layout);
        process.define_struct(block_layout);
        process.define_function("ta_alloc");
        process.define_function("ta_free");
        process.define_global("heap", Value::pointer(base));
        process.define_global("heap_limit", Value::pointer(base + size as u64));
        process.define_global("heap_max_blocks", Value::Size(max_blocks as u64));

        let mut image = TinyallocImage {
            process,
            base,
            block_size,
            max_blocks,
            top,
        };

        for index in 0..max_blocks {
            let next = if index + 1 < max_blocks {
                image.block(index + 1)
            } else {
                0
            };
            image.write_block(image.block(index), 0, next, 0)?;
        }
        let fresh = if max_blocks > 0 { image.block(0) } else { 0 };
        image.set_root(ListName::Fresh, fresh)?;
        image.set_root(ListName::Free, 0)?;
        image.set_root(ListName::Used, 0)?;
        image.set_top(top)?;
        Ok(image)
    }

    pub fn process(&self) -> &SimulatedProcess {
        &self.process
    }

    pub fn process_mut(&mut self) -> &mut SimulatedProcess {
        &mut self.process
    }

    /// Address of the heap descriptor
    pub fn descriptor(&self) -> Address {
        self.base
    }

    pub fn max_blocks(&self) -> usize {
        self.max_blocks
    }

    pub fn top(&self) -> Address {
        self.top
    }

    /// Address of block table entry `index`
    pub fn block(&self, index: usize) -> Address {
        self.base + StructLayout::tinyalloc_heap().size() as u64 + index as u64 * self.block_size
    }

    pub fn set_root(&mut self, list: ListName, node: Address) -> Result<(), SimError> {
        self.process
            .write_field(self.base, HEAP_TYPE, list.field(), &Value::pointer(node))
    }

    pub fn set_top(&mut self, top: Address) -> Result<(), SimError> {
        self.top = top;
        self.process
            .write_field(self.base, HEAP_TYPE, "top", &Value::Size(top))
    }

    pub fn write_block(
        &mut self,
        node: Address,
        addr: Address,
        next: Address,
        size: u64,
    ) -> Result<(), SimError> {
        self.process.write_struct(
            node,
            BLOCK_TYPE,
            &[
                ("addr", Value::pointer(addr)),
                ("next", Value::pointer(next)),
                ("size", Value::Size(size)),
            ],
        )
    }

    fn root(&self, list: ListName) -> Result<Address, SimError> {
        let heap = self.process.deref(self.base, HEAP_TYPE)?;
        Ok(heap.expect_field(list.field())?.expect_pointer()?)
    }

    fn next_of(&self, node: Address) -> Result<Address, SimError> {
        let block = self.process.deref(node, BLOCK_TYPE)?;
        Ok(block.expect_field("next")?.expect_pointer()?)
    }

    /// Take a block off `fresh`, bump `top` and push the block onto `used`
    ///
    /// Returns the payload address. `payload` is copied to the start of it.
    pub fn carve(&mut self, size: u64, payload: &[u8]) -> Result<Address, SimError> {
        let node = self.root(ListName::Fresh)?;
        if node == 0 {
            return Err(SimError::OutOfBlocks);
        }
        let fresh_next = self.next_of(node)?;
        let used = self.root(ListName::Used)?;
        let addr = self.top;

        self.write_block(node, addr, used, size)?;
        self.set_root(ListName::Fresh, fresh_next)?;
        self.set_root(ListName::Used, node)?;
        self.set_top(addr + size)?;
        if !payload.is_empty() {
            self.process.write_bytes(addr, payload)?;
        }
        Ok(addr)
    }

    /// Move the `used` block owning `addr` onto the head of `free`
    pub fn release(&mut self, addr: Address) -> Result<(), SimError> {
        let mut prev = 0;
        let mut node = self.root(ListName::Used)?;
        while node != 0 {
            let block = self.process.deref(node, BLOCK_TYPE)?;
            let next = block.expect_field("next")?.expect_pointer()?;
            if block.expect_field("addr")?.expect_pointer()? == addr {
                if prev == 0 {
                    self.set_root(ListName::Used, next)?;
                } else {
                    self.process
                        .write_field(prev, BLOCK_TYPE, "next", &Value::pointer(next))?;
                }
                let free = self.root(ListName::Free)?;
                self.process
                    .write_field(node, BLOCK_TYPE, "next", &Value::pointer(free))?;
                return self.set_root(ListName::Free, node);
            }
            prev = node;
            node = next;
        }
        Err(SimError::NotAllocated(addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::constants::HEAP_ADDRESS_START;

    #[test]
    fn test_fresh_list_holds_every_block() {
        let image = TinyallocImage::new(HEAP_ADDRESS_START, 0x1000, 3).unwrap();
        assert_eq!(image.root(ListName::Fresh).unwrap(), image.block(0));
        assert_eq!(image.next_of(image.block(0)).unwrap(), image.block(1));
        assert_eq!(image.next_of(image.block(2)).unwrap(), 0);
        assert_eq!(image.top(), HEAP_ADDRESS_START + 32 + 3 * 24);
    }

    #[test]
    fn test_carve_and_release() {
        let mut image = TinyallocImage::new(HEAP_ADDRESS_START, 0x1000, 2).unwrap();
        let first = image.carve(16, b"abc\0").unwrap();
        let second = image.carve(8, b"").unwrap();
        assert_eq!(second, first + 16);
        assert!(matches!(image.carve(8, b""), Err(SimError::OutOfBlocks)));

        image.release(first).unwrap();
        assert_eq!(image.root(ListName::Free).unwrap(), image.block(0));
        assert_eq!(image.root(ListName::Used).unwrap(), image.block(1));
        assert!(matches!(image.release(first), Err(SimError::NotAllocated(_))));
    }
}
