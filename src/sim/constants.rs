// Address-space constants for the simulated debuggee

/// Highest stack address; frames grow down from here
pub const STACK_ADDRESS_TOP: u64 = 0x7fff_ffff_f000;

/// Stack space reserved per thread
pub const THREAD_STACK_SIZE: u64 = 0x10_0000;

/// Stack space consumed by one frame
pub const FRAME_SIZE: u64 = 0x40;

/// Default base address of a tinyalloc heap image
pub const HEAP_ADDRESS_START: u64 = 0x1000_0000;
