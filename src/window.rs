//! Sliding window shared by the frame-based codecs
//!
//! MSZIP, LZX and Quantum all decode into a power-of-two ring buffer and
//! copy earlier output forward when a match is decoded. [`Window`] owns
//! that buffer and the wrap-aware copy; each codec keeps its own write
//! position because their flush rules differ.

use crate::common::{DecrunchError, Result};

/// Power-of-two ring buffer with overlap-safe match copies.
#[derive(Debug)]
pub struct Window {
    data: Box<[u8]>,
    mask: usize,
}

impl Window {
    /// Allocate a zero-filled window of `size` bytes (must be a power of two).
    pub fn new(size: usize) -> Self {
        debug_assert!(size.is_power_of_two());
        Self {
            data: vec![0u8; size].into_boxed_slice(),
            mask: size - 1,
        }
    }

    /// Window size in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Overwrite the whole window with `value`.
    pub fn fill(&mut self, value: u8) {
        self.data.fill(value);
    }

    /// Byte at `pos`, wrapped into the window.
    #[inline]
    pub fn get(&self, pos: usize) -> u8 {
        self.data[pos & self.mask]
    }

    /// Store a byte at `pos`, wrapped into the window.
    #[inline]
    pub fn put(&mut self, pos: usize, value: u8) {
        let mask = self.mask;
        self.data[pos & mask] = value;
    }

    /// Direct view of `start..end` (no wrapping; caller splits runs).
    #[inline]
    pub fn slice(&self, start: usize, end: usize) -> &[u8] {
        &self.data[start..end]
    }

    /// Mutable view of `start..end` (no wrapping; caller splits runs).
    #[inline]
    pub fn slice_mut(&mut self, start: usize, end: usize) -> &mut [u8] {
        &mut self.data[start..end]
    }

    /// Copy `length` bytes of earlier output to `dest`, reading from
    /// `offset` bytes back. Both cursors wrap; a byte-wise forward copy
    /// keeps overlapping matches (offset < length) correct.
    pub fn copy_match(&mut self, dest: usize, offset: usize, length: usize) {
        let mask = self.mask;
        let mut src = dest.wrapping_sub(offset) & mask;
        let mut dst = dest & mask;
        for _ in 0..length {
            self.data[dst] = self.data[src];
            src = (src + 1) & mask;
            dst = (dst + 1) & mask;
        }
    }

    /// Validate a backward offset against the bytes produced so far.
    ///
    /// `produced` is the total output position; until the window has
    /// wrapped once, offsets may not reach behind the start of the data.
    #[inline]
    pub fn check_offset(&self, offset: usize, produced: usize) -> Result<()> {
        if offset == 0 || (produced <= self.mask && offset > produced) {
            return Err(DecrunchError::InvalidMatchOffset {
                offset: offset as u32,
                position: produced as u32,
            });
        }
        Ok(())
    }
}
