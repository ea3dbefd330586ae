//! Sparse byte-addressable memory covering the full 32-bit address space.
//!
//! Storage is split into 4 KiB pages keyed by `addr >> PAGE_SHIFT` and
//! allocated on first write. Each page tracks which bytes were ever written
//! so reads of fresh memory can be told apart from stored zeros.

#![allow(clippy::cast_possible_truncation)]

use std::collections::BTreeMap;

/// log2 of the page size.
pub const PAGE_SHIFT: u32 = 12;
/// Bytes per page.
pub const PAGE_SIZE: usize = 1 << PAGE_SHIFT;

const PAGE_MASK: u32 = (PAGE_SIZE as u32) - 1;
const BITMAP_WORDS: usize = PAGE_SIZE / 64;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Page {
    bytes: [u8; PAGE_SIZE],
    written: [u64; BITMAP_WORDS],
}

impl Page {
    const fn new() -> Self {
        Self {
            bytes: [0; PAGE_SIZE],
            written: [0; BITMAP_WORDS],
        }
    }

    const fn is_written(&self, offset: usize) -> bool {
        (self.written[offset / 64] >> (offset % 64)) & 1 != 0
    }

    const fn store(&mut self, offset: usize, value: u8) {
        self.bytes[offset] = value;
        self.written[offset / 64] |= 1 << (offset % 64);
    }
}

/// Lazily allocated little-endian memory.
///
/// All addresses wrap modulo 2^32; a multi-byte access at `0xFFFF_FFFE`
/// continues at `0x0000_0000`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SparseMemory {
    pages: BTreeMap<u32, Box<Page>>,
}

impl SparseMemory {
    /// Creates an empty memory where every byte is unwritten.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the byte at `addr`, or `None` when it was never written.
    #[must_use]
    pub fn get(&self, addr: u32) -> Option<u8> {
        let page = self.pages.get(&(addr >> PAGE_SHIFT))?;
        let offset = (addr & PAGE_MASK) as usize;
        page.is_written(offset).then_some(page.bytes[offset])
    }

    /// Returns `true` when `addr` has been written at least once.
    #[must_use]
    pub fn is_initialized(&self, addr: u32) -> bool {
        self.get(addr).is_some()
    }

    /// Stores one byte, allocating its page on demand.
    pub fn write_u8(&mut self, addr: u32, value: u8) {
        let page = self
            .pages
            .entry(addr >> PAGE_SHIFT)
            .or_insert_with(|| Box::new(Page::new()));
        page.store((addr & PAGE_MASK) as usize, value);
    }

    /// Stores `bytes` starting at `base`.
    pub fn write_bytes(&mut self, base: u32, bytes: &[u8]) {
        let mut addr = base;
        for &byte in bytes {
            self.write_u8(addr, byte);
            addr = addr.wrapping_add(1);
        }
    }

    /// Marks `len` bytes starting at `base` as written zeros.
    pub fn zero_fill(&mut self, base: u32, len: u32) {
        let mut addr = base;
        for _ in 0..len {
            self.write_u8(addr, 0);
            addr = addr.wrapping_add(1);
        }
    }

    /// Composes four bytes little-endian without touching the written map.
    /// Unwritten bytes read as zero.
    #[must_use]
    pub fn peek_u32(&self, addr: u32) -> u32 {
        let mut bytes = [0_u8; 4];
        for (offset, slot) in (0_u32..).zip(bytes.iter_mut()) {
            *slot = self.get(addr.wrapping_add(offset)).unwrap_or(0);
        }
        u32::from_le_bytes(bytes)
    }

    /// Number of allocated pages.
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Number of bytes that have been written at least once.
    #[must_use]
    pub fn initialized_bytes(&self) -> usize {
        self.pages
            .values()
            .map(|page| {
                page.written
                    .iter()
                    .map(|word| word.count_ones() as usize)
                    .sum::<usize>()
            })
            .sum()
    }

    /// Drops every page.
    pub fn clear(&mut self) {
        self.pages.clear();
    }
}
