#![forbid(unsafe_code)]
//! Fixed-length integer array that stores its values in the narrowest
//! bit-width able to hold the largest value written so far.

use std::fmt;

/// Storage width currently used by a [`PackedIntArray`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum Width {
    /// 8-bit lanes.
    U8,
    /// 16-bit lanes.
    U16,
    /// 32-bit lanes.
    U32,
    /// 64-bit lanes.
    U64,
}

impl Width {
    fn for_value(value: u64) -> Self {
        if value <= u64::from(u8::MAX) {
            Width::U8
        } else if value <= u64::from(u16::MAX) {
            Width::U16
        } else if value <= u64::from(u32::MAX) {
            Width::U32
        } else {
            Width::U64
        }
    }
}

#[derive(Clone)]
enum Lanes {
    U8(Box<[u8]>),
    U16(Box<[u16]>),
    U32(Box<[u32]>),
    U64(Box<[u64]>),
}

/// Array of non-negative integers that widens its lanes transparently.
///
/// Widening happens on [`PackedIntArray::set`]; values are never truncated.
/// Equality compares values, not lane widths.
#[derive(Clone)]
pub struct PackedIntArray {
    lanes: Lanes,
}

impl PackedIntArray {
    /// Creates an array of `len` zeroes using 8-bit lanes.
    pub fn zeroed(len: usize) -> Self {
        Self {
            lanes: Lanes::U8(vec![0u8; len].into_boxed_slice()),
        }
    }

    /// Builds an array holding `values` in the narrowest fitting width.
    pub fn from_values(values: &[u64]) -> Self {
        let mut array = Self::zeroed(values.len());
        let max = values.iter().copied().max().unwrap_or(0);
        array.widen_to(Width::for_value(max));
        for (idx, &value) in values.iter().enumerate() {
            array.set(idx, value);
        }
        array
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        match &self.lanes {
            Lanes::U8(v) => v.len(),
            Lanes::U16(v) => v.len(),
            Lanes::U32(v) => v.len(),
            Lanes::U64(v) => v.len(),
        }
    }

    /// Whether the array has no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current lane width.
    pub fn width(&self) -> Width {
        match &self.lanes {
            Lanes::U8(_) => Width::U8,
            Lanes::U16(_) => Width::U16,
            Lanes::U32(_) => Width::U32,
            Lanes::U64(_) => Width::U64,
        }
    }

    /// Reads entry `idx`. Panics if `idx` is out of bounds.
    pub fn get(&self, idx: usize) -> u64 {
        match &self.lanes {
            Lanes::U8(v) => u64::from(v[idx]),
            Lanes::U16(v) => u64::from(v[idx]),
            Lanes::U32(v) => u64::from(v[idx]),
            Lanes::U64(v) => v[idx],
        }
    }

    /// Writes entry `idx`, widening every lane first if `value` does not fit.
    /// Panics if `idx` is out of bounds.
    pub fn set(&mut self, idx: usize, value: u64) {
        let needed = Width::for_value(value);
        if needed > self.width() {
            self.widen_to(needed);
        }
        // Lane conversions below cannot truncate: the width was checked above.
        match &mut self.lanes {
            Lanes::U8(v) => v[idx] = value as u8,
            Lanes::U16(v) => v[idx] = value as u16,
            Lanes::U32(v) => v[idx] = value as u32,
            Lanes::U64(v) => v[idx] = value,
        }
    }

    /// Copies every entry out as `u64`.
    pub fn to_vec(&self) -> Vec<u64> {
        (0..self.len()).map(|idx| self.get(idx)).collect()
    }

    fn widen_to(&mut self, width: Width) {
        if width <= self.width() {
            return;
        }
        let values = self.to_vec();
        self.lanes = match width {
            Width::U8 => unreachable!("u8 is the narrowest width"),
            Width::U16 => Lanes::U16(values.iter().map(|&v| v as u16).collect()),
            Width::U32 => Lanes::U32(values.iter().map(|&v| v as u32).collect()),
            Width::U64 => Lanes::U64(values.into_boxed_slice()),
        };
    }
}

impl PartialEq for PackedIntArray {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && (0..self.len()).all(|idx| self.get(idx) == other.get(idx))
    }
}

impl Eq for PackedIntArray {}

impl fmt::Debug for PackedIntArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackedIntArray")
            .field("width", &self.width())
            .field("values", &self.to_vec())
            .finish()
    }
}
