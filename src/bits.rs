//! Bit-level input stream shared by all codecs
//!
//! [`BitReader`] pulls bytes from a [`Read`] source into a 32-bit
//! accumulator and hands out variable-width bit fields. The significance
//! order is a type parameter: [`Msb`] packs new bytes below the existing
//! bits (LZX, Quantum, KWAJ) while [`Lsb`] packs them above (MSZIP's
//! DEFLATE layer). LZX additionally refills 16-bit little-endian words at
//! a time rather than single bytes.
//!
//! When the source reports end-of-stream, the reader synthesizes zero
//! padding so that well-formed streams decode their final symbols without
//! special casing. How much padding depends on [`EofPolicy`].

use std::io::Read;
use std::marker::PhantomData;

use crate::common::{checked_input_size, DecrunchError, Result};

/// Width of the bit accumulator
pub const BITBUF_WIDTH: u32 = 32;

/// Bit significance order of the compressed stream.
pub trait BitOrder {
    /// True when the stream packs the most significant bit first.
    const IS_MSB: bool;
    /// Pack `nbits` of new data into the accumulator holding `bits_left` bits.
    fn inject(buffer: &mut u32, bits_left: u32, data: u32, nbits: u32);
    /// Extract the next `nbits` without consuming them. `nbits` is 1..=24.
    fn peek(buffer: u32, nbits: u32) -> u32;
    /// Consume `nbits` from the accumulator.
    fn remove(buffer: &mut u32, nbits: u32);
    /// The `index`-th upcoming bit (0 = the very next bit to be consumed).
    fn stream_bit(buffer: u32, index: u32) -> u32;
}

/// Most-significant-bit-first order (LZX, Quantum, KWAJ)
#[derive(Debug)]
pub enum Msb {}

/// Least-significant-bit-first order (MSZIP / DEFLATE)
#[derive(Debug)]
pub enum Lsb {}

impl BitOrder for Msb {
    const IS_MSB: bool = true;

    #[inline]
    fn inject(buffer: &mut u32, bits_left: u32, data: u32, nbits: u32) {
        *buffer |= data << (BITBUF_WIDTH - nbits - bits_left);
    }

    #[inline]
    fn peek(buffer: u32, nbits: u32) -> u32 {
        buffer >> (BITBUF_WIDTH - nbits)
    }

    #[inline]
    fn remove(buffer: &mut u32, nbits: u32) {
        *buffer = buffer.wrapping_shl(nbits);
    }

    #[inline]
    fn stream_bit(buffer: u32, index: u32) -> u32 {
        (buffer >> (BITBUF_WIDTH - 1 - index)) & 1
    }
}

impl BitOrder for Lsb {
    const IS_MSB: bool = false;

    #[inline]
    fn inject(buffer: &mut u32, bits_left: u32, data: u32, nbits: u32) {
        debug_assert!(nbits + bits_left <= BITBUF_WIDTH);
        *buffer |= data << bits_left;
    }

    #[inline]
    fn peek(buffer: u32, nbits: u32) -> u32 {
        buffer & ((1u32 << nbits) - 1)
    }

    #[inline]
    fn remove(buffer: &mut u32, nbits: u32) {
        *buffer >>= nbits;
    }

    #[inline]
    fn stream_bit(buffer: u32, index: u32) -> u32 {
        (buffer >> index) & 1
    }
}

/// Refill granularity of the accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    /// One byte at a time
    Byte,
    /// 16-bit little-endian words (the LZX stream layout)
    LeWord,
}

/// What to do when the underlying source runs out of bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EofPolicy {
    /// Synthesize two zero bytes once; a later refill attempt is a fatal
    /// read error (LZX, Quantum, MSZIP)
    ZeroPadOnce,
    /// Synthesize one zero byte per refill forever, counting synthetic
    /// bits so the caller can detect exhaustion (KWAJ)
    ZeroPadForever,
}

/// Bit reader over a byte source, parameterized by bit order.
#[derive(Debug)]
pub struct BitReader<R, O: BitOrder> {
    source: R,
    inbuf: Box<[u8]>,
    i_pos: usize,
    i_len: usize,
    bit_buffer: u32,
    bits_left: u32,
    fill: Fill,
    eof: EofPolicy,
    in_padding: bool,
    padding_bits: u32,
    _order: PhantomData<O>,
}

impl<R: Read, O: BitOrder> BitReader<R, O> {
    /// Create a bit reader with the given input buffer size.
    ///
    /// The size is rounded up to even; sizes below 2 are rejected.
    pub fn new(source: R, buffer_size: usize, fill: Fill, eof: EofPolicy) -> Result<Self> {
        let buffer_size = checked_input_size(buffer_size)?;
        Ok(Self {
            source,
            inbuf: vec![0u8; buffer_size].into_boxed_slice(),
            i_pos: 0,
            i_len: 0,
            bit_buffer: 0,
            bits_left: 0,
            fill,
            eof,
            in_padding: false,
            padding_bits: 0,
            _order: PhantomData,
        })
    }

    /// Refill the input buffer, applying the end-of-stream padding policy.
    fn refill_input(&mut self) -> Result<()> {
        if self.in_padding && self.eof == EofPolicy::ZeroPadOnce {
            return Err(DecrunchError::UnexpectedEof);
        }
        loop {
            match self.source.read(&mut self.inbuf) {
                Ok(0) => break,
                Ok(n) => {
                    self.i_len = n;
                    self.i_pos = 0;
                    return Ok(());
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(DecrunchError::Read(e)),
            }
        }
        // out of real input: synthesize zero padding
        self.in_padding = true;
        let pad = match self.eof {
            EofPolicy::ZeroPadOnce => 2,
            EofPolicy::ZeroPadForever => 1,
        };
        self.inbuf[..pad].fill(0);
        self.i_len = pad;
        self.i_pos = 0;
        Ok(())
    }

    #[inline]
    fn next_byte(&mut self) -> Result<u8> {
        if self.i_pos >= self.i_len {
            self.refill_input()?;
        }
        let b = self.inbuf[self.i_pos];
        self.i_pos += 1;
        if self.in_padding {
            self.padding_bits += 8;
        }
        Ok(b)
    }

    /// Guarantee at least `nbits` (max 16) are buffered.
    pub fn ensure_bits(&mut self, nbits: u32) -> Result<()> {
        debug_assert!(nbits <= 16);
        while self.bits_left < nbits {
            match self.fill {
                Fill::LeWord => {
                    let b0 = u32::from(self.next_byte()?);
                    let b1 = u32::from(self.next_byte()?);
                    O::inject(&mut self.bit_buffer, self.bits_left, (b1 << 8) | b0, 16);
                    self.bits_left += 16;
                }
                Fill::Byte => {
                    let b = u32::from(self.next_byte()?);
                    O::inject(&mut self.bit_buffer, self.bits_left, b, 8);
                    self.bits_left += 8;
                }
            }
        }
        Ok(())
    }

    /// Look at the next `nbits` without consuming them.
    #[inline]
    pub fn peek_bits(&self, nbits: u32) -> u32 {
        if nbits == 0 {
            return 0;
        }
        O::peek(self.bit_buffer, nbits)
    }

    /// Consume `nbits` already guaranteed by [`BitReader::ensure_bits`].
    #[inline]
    pub fn remove_bits(&mut self, nbits: u32) {
        debug_assert!(nbits <= self.bits_left);
        O::remove(&mut self.bit_buffer, nbits);
        self.bits_left -= nbits;
    }

    /// Read and consume `nbits` (max 16).
    #[inline]
    pub fn read_bits(&mut self, nbits: u32) -> Result<u32> {
        if nbits == 0 {
            return Ok(0);
        }
        self.ensure_bits(nbits)?;
        let value = self.peek_bits(nbits);
        self.remove_bits(nbits);
        Ok(value)
    }

    /// Read up to 25 bits, MSB-first across chunk boundaries.
    ///
    /// Offset footers in LZX and Quantum can exceed the 16-bit guarantee
    /// of [`BitReader::ensure_bits`], so wide fields are split.
    pub fn read_many_bits(&mut self, nbits: u32) -> Result<u32> {
        debug_assert!(nbits <= 25);
        let mut value = 0u32;
        let mut needed = nbits;
        while needed > 0 {
            if self.bits_left <= BITBUF_WIDTH - 16 {
                self.ensure_bits(16)?;
            }
            let run = self.bits_left.min(needed);
            value = (value << run) | self.peek_bits(run);
            self.remove_bits(run);
            needed -= run;
        }
        Ok(value)
    }

    /// The `index`-th upcoming bit of the accumulator (for tree walks).
    #[inline]
    pub fn buffered_bit(&self, index: u32) -> u32 {
        O::stream_bit(self.bit_buffer, index)
    }

    /// Number of bits currently buffered.
    #[inline]
    pub fn bits_left(&self) -> u32 {
        self.bits_left
    }

    /// Drop 0-7 bits so the next read starts on a byte boundary.
    pub fn align_to_byte(&mut self) {
        let n = self.bits_left & 7;
        if n > 0 {
            self.remove_bits(n);
        }
    }

    /// Consume 1-16 bits so the stream lands on a 16-bit boundary, then
    /// empty the accumulator (LZX uncompressed block preamble).
    pub fn realign_discard(&mut self) -> Result<()> {
        if self.bits_left == 0 {
            self.ensure_bits(16)?;
        }
        self.bit_buffer = 0;
        self.bits_left = 0;
        Ok(())
    }

    /// Re-align a word-filled stream to a 16-bit boundary between frames.
    pub fn realign_to_word(&mut self) -> Result<()> {
        if self.bits_left > 0 {
            self.ensure_bits(16)?;
        }
        let n = self.bits_left & 15;
        if n > 0 {
            self.remove_bits(n);
        }
        Ok(())
    }

    /// Read one raw byte, bypassing the accumulator.
    ///
    /// Only valid when the accumulator is empty (after a realign/drain).
    pub fn read_raw_byte(&mut self) -> Result<u8> {
        debug_assert_eq!(self.bits_left, 0);
        self.next_byte()
    }

    /// Fill `out` with raw bytes, bypassing the accumulator.
    pub fn read_raw(&mut self, out: &mut [u8]) -> Result<()> {
        debug_assert_eq!(self.bits_left, 0);
        let mut done = 0;
        while done < out.len() {
            if self.i_pos >= self.i_len {
                self.refill_input()?;
            }
            let run = (self.i_len - self.i_pos).min(out.len() - done);
            out[done..done + run].copy_from_slice(&self.inbuf[self.i_pos..self.i_pos + run]);
            self.i_pos += run;
            done += run;
            if self.in_padding {
                self.padding_bits += 8 * run as u32;
            }
        }
        Ok(())
    }

    /// Have we consumed past the last real input bit into the padding?
    pub fn in_padding(&self) -> bool {
        self.padding_bits > 0 && self.bits_left < self.padding_bits
    }
}
