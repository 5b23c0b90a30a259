use crate::primitives::packed::PackedIntArray;
use crate::types::{Result, StoreError};

/// Interleaved `(start, length)` pairs locating each adjacency block inside
/// the node's slot buffer. Entry `2k` is the start of block `k`, entry
/// `2k + 1` its occupied length in slots.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OffsetTable {
    entries: PackedIntArray,
}

impl OffsetTable {
    /// Creates an all-zero table for `block_count` blocks.
    pub fn new(block_count: usize) -> Self {
        Self {
            entries: PackedIntArray::zeroed(block_count * 2),
        }
    }

    /// Rebuilds a table from raw interleaved entries.
    pub fn from_entries(entries: &[u64]) -> Result<Self> {
        if entries.len() % 2 != 0 {
            return Err(StoreError::Corruption("offset table has odd entry count"));
        }
        Ok(Self {
            entries: PackedIntArray::from_values(entries),
        })
    }

    /// Number of blocks described by the table.
    pub fn block_count(&self) -> usize {
        self.entries.len() / 2
    }

    /// Start index of `block` in the slot buffer.
    pub fn start(&self, block: usize) -> usize {
        self.entries.get(2 * block) as usize
    }

    /// Occupied length of `block`, in slots.
    pub fn length(&self, block: usize) -> usize {
        self.entries.get(2 * block + 1) as usize
    }

    /// Overwrites the start of `block`.
    pub fn set_start(&mut self, block: usize, start: usize) {
        self.entries.set(2 * block, start as u64);
    }

    /// Overwrites the occupied length of `block`.
    pub fn set_length(&mut self, block: usize, length: usize) {
        self.entries.set(2 * block + 1, length as u64);
    }

    /// Slots reserved for `block`: the distance to the next block's start, or
    /// to the end of a buffer of `buffer_len` slots for the last block.
    pub fn capacity(&self, block: usize, buffer_len: usize) -> usize {
        let end = if block + 1 < self.block_count() {
            self.start(block + 1)
        } else {
            buffer_len
        };
        end.saturating_sub(self.start(block))
    }

    /// Adds `additional` to the start of every block after `block`.
    pub fn shift_starts_after(&mut self, block: usize, additional: usize) -> Result<()> {
        for later in block + 1..self.block_count() {
            let start = self
                .start(later)
                .checked_add(additional)
                .ok_or_else(|| StoreError::integrity("block start overflowed usize"))?;
            self.set_start(later, start);
        }
        Ok(())
    }

    /// Sum of all occupied lengths.
    pub fn total_length(&self) -> usize {
        (0..self.block_count()).map(|block| self.length(block)).sum()
    }

    /// Raw interleaved entries.
    pub fn to_entries(&self) -> Vec<u64> {
        self.entries.to_vec()
    }

    /// Checks the block invariants against a buffer of `buffer_len` slots.
    pub fn validate(&self, buffer_len: usize, stride_widths: &[usize]) -> Result<()> {
        if stride_widths.len() != self.block_count() {
            return Err(StoreError::Corruption("offset table does not match layout"));
        }
        let mut floor = 0usize;
        for (block, &stride) in stride_widths.iter().enumerate() {
            let start = self.start(block);
            let length = self.length(block);
            if start < floor {
                return Err(StoreError::Corruption("adjacency blocks overlap"));
            }
            if length % stride != 0 {
                return Err(StoreError::Corruption(
                    "block length is not a multiple of its stride",
                ));
            }
            floor = start
                .checked_add(length)
                .ok_or(StoreError::Corruption("block end overflows"))?;
            if floor > buffer_len {
                return Err(StoreError::Corruption("block extends past buffer end"));
            }
        }
        Ok(())
    }
}
