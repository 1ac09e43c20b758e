//! Address space of the simulated debuggee
//!
//! Memory is a set of non-overlapping mapped regions. Anything outside a region
//! is unreadable, like an unmapped page in a real process:
//! - reads that start inside a region return bytes up to the region's end
//! - reads that start outside every region fail
//! - writes must fit entirely inside one region

use super::SimError;
use crate::session::value::Address;
use crate::session::SessionError;
use std::collections::BTreeMap;

/// Mapped regions keyed by base address
#[derive(Debug, Clone, Default)]
pub struct Memory {
    regions: BTreeMap<Address, Vec<u8>>,
}

impl Memory {
    pub fn new() -> Self {
        Memory {
            regions: BTreeMap::new(),
        }
    }

    /// Map a zero-filled region
    pub fn map(&mut self, base: Address, size: usize) -> Result<(), SimError> {
        let end = base.saturating_add(size as u64);
        let overlaps = self.regions.iter().any(|(&start, data)| {
            let region_end = start + data.len() as u64;
            base < region_end && start < end
        });
        if overlaps || size == 0 {
            return Err(SimError::BadMapping { base, size });
        }
        self.regions.insert(base, vec![0; size]);
        Ok(())
    }

    /// Find the region containing `addr` and the offset into it
    fn locate(&self, addr: Address) -> Option<(Address, usize)> {
        let (&base, data) = self.regions.range(..=addr).next_back()?;
        let offset = (addr - base) as usize;
        (offset < data.len()).then_some((base, offset))
    }

    pub fn is_mapped(&self, addr: Address) -> bool {
        self.locate(addr).is_some()
    }

    /// Read up to `len` bytes; short when the region ends first
    pub fn read_bytes_at(&self, addr: Address, len: usize) -> Result<Vec<u8>, SessionError> {
        let (base, offset) = self
            .locate(addr)
            .ok_or(SessionError::UnreadableMemory { address: addr })?;
        let data = &self.regions[&base];
        let end = offset.saturating_add(len).min(data.len());
        Ok(data[offset..end].to_vec())
    }

    /// Write bytes; the whole range must be mapped by one region
    pub fn write_bytes_at(&mut self, addr: Address, bytes: &[u8]) -> Result<(), SimError> {
        let (base, offset) = self
            .locate(addr)
            .ok_or(SimError::UnmappedWrite { address: addr })?;
        let data = self
            .regions
            .get_mut(&base)
            .ok_or(SimError::UnmappedWrite { address: addr })?;
        if offset + bytes.len() > data.len() {
            return Err(SimError::UnmappedWrite {
                address: base + data.len() as u64,
            });
        }
        data[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}
