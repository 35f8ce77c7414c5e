//! DEFLATE block decoding for the MSZIP codec
//!
//! One call to [`inflate`] decodes an entire DEFLATE stream (one MSZIP
//! frame): a chain of stored, fixed-Huffman or dynamic-Huffman blocks up
//! to and including the block with the final flag set. Decoded bytes land
//! in the frame window; the caller flushes them to the output sink.

use std::io::Read;

use crate::bits::{BitReader, Lsb};
use crate::common::{DecrunchError, Result, FRAME_SIZE};
use crate::huffman::HuffmanTable;
use crate::tables::deflate::{
    BITLEN_ORDER, DISTANCE_BASE, DISTANCE_EXTRA, LENGTH_BASE, LENGTH_EXTRA,
};
use crate::window::Window;

/// Literal/length alphabet size
const LITERAL_MAXSYMBOLS: usize = 288;
const LITERAL_TABLEBITS: u32 = 9;

/// Distance alphabet size
const DISTANCE_MAXSYMBOLS: usize = 32;
const DISTANCE_TABLEBITS: u32 = 7;

/// Per-stream DEFLATE state: the frame window and the block code tables.
#[derive(Debug)]
pub(super) struct InflateState {
    pub window: Window,
    pub window_posn: usize,
    pub bytes_output: usize,
    literal: HuffmanTable<Lsb>,
    distance: HuffmanTable<Lsb>,
}

impl InflateState {
    pub fn new() -> Self {
        Self {
            window: Window::new(FRAME_SIZE),
            window_posn: 0,
            bytes_output: 0,
            literal: HuffmanTable::new("literal", LITERAL_MAXSYMBOLS, LITERAL_TABLEBITS),
            distance: HuffmanTable::new("distance", DISTANCE_MAXSYMBOLS, DISTANCE_TABLEBITS),
        }
    }

    /// Account for `n` bytes decoded into the window this frame.
    fn flush(&mut self, n: usize) -> Result<()> {
        self.bytes_output += n;
        if self.bytes_output > FRAME_SIZE {
            return Err(DecrunchError::FrameOverflow);
        }
        Ok(())
    }
}

/// Decode DEFLATE blocks until the final block completes.
pub(super) fn inflate<R: Read>(bits: &mut BitReader<R, Lsb>, st: &mut InflateState) -> Result<()> {
    loop {
        let last_block = bits.read_bits(1)?;
        let block_type = bits.read_bits(2)?;

        match block_type {
            0 => stored_block(bits, st)?,
            1 => {
                // fixed code lengths per RFC 1951 §3.2.6
                let lens = st.literal.lengths_mut();
                for (i, len) in lens.iter_mut().enumerate() {
                    *len = match i {
                        0..=143 => 8,
                        144..=255 => 9,
                        256..=279 => 7,
                        _ => 8,
                    };
                }
                st.literal.build()?;
                st.distance.lengths_mut().fill(5);
                st.distance.build()?;
            }
            2 => {
                read_lens(bits, st)?;
                st.literal.build()?;
                st.distance.build()?;
            }
            other => return Err(DecrunchError::BadBlockType(other)),
        }

        if block_type != 0 {
            huffman_block(bits, st)?;
        }
        if last_block == 1 {
            break;
        }
    }

    if st.window_posn > 0 {
        let n = st.window_posn;
        st.flush(n)?;
    }
    Ok(())
}

/// Stored block: byte-aligned length, one's-complement check, raw copy.
fn stored_block<R: Read>(bits: &mut BitReader<R, Lsb>, st: &mut InflateState) -> Result<()> {
    bits.align_to_byte();

    // drain any whole bytes still in the accumulator before going raw
    let mut lens_buf = [0u8; 4];
    let mut have = 0;
    while bits.bits_left() >= 8 {
        if have == 4 {
            return Err(DecrunchError::Corrupt("stored block length buffering"));
        }
        lens_buf[have] = bits.peek_bits(8) as u8;
        bits.remove_bits(8);
        have += 1;
    }
    for slot in lens_buf[have..].iter_mut() {
        *slot = bits.read_raw_byte()?;
    }

    let length = usize::from(lens_buf[0]) | (usize::from(lens_buf[1]) << 8);
    let check = usize::from(lens_buf[2]) | (usize::from(lens_buf[3]) << 8);
    if length != (!check & 0xFFFF) {
        return Err(DecrunchError::BadStoredLength);
    }

    let mut remaining = length;
    while remaining > 0 {
        let run = remaining.min(FRAME_SIZE - st.window_posn);
        let posn = st.window_posn;
        bits.read_raw(st.window.slice_mut(posn, posn + run))?;
        st.window_posn += run;
        remaining -= run;
        if st.window_posn == FRAME_SIZE {
            st.flush(FRAME_SIZE)?;
            st.window_posn = 0;
        }
    }
    Ok(())
}

/// Dynamic block header: code lengths for both alphabets, themselves
/// Huffman coded with run-length escapes (codes 16/17/18).
fn read_lens<R: Read>(bits: &mut BitReader<R, Lsb>, st: &mut InflateState) -> Result<()> {
    let lit_codes = bits.read_bits(5)? as usize + 257;
    let dist_codes = bits.read_bits(5)? as usize + 1;
    let bitlen_codes = bits.read_bits(4)? as usize + 4;
    if lit_codes > LITERAL_MAXSYMBOLS || dist_codes > DISTANCE_MAXSYMBOLS {
        return Err(DecrunchError::Corrupt("code count in dynamic block header"));
    }

    let mut bitlen: HuffmanTable<Lsb> = HuffmanTable::new("bitlen", 19, 7);
    {
        let lens = bitlen.lengths_mut();
        for i in 0..bitlen_codes {
            lens[BITLEN_ORDER[i]] = bits.read_bits(3)? as u8;
        }
        for i in bitlen_codes..19 {
            lens[BITLEN_ORDER[i]] = 0;
        }
    }
    bitlen.build()?;

    let total = lit_codes + dist_codes;
    let mut lens = vec![0u8; total];
    let mut last_code = 0u8;
    let mut i = 0;
    while i < total {
        let code = bitlen.read_symbol(bits)?;
        if code < 16 {
            last_code = code as u8;
            lens[i] = last_code;
            i += 1;
        } else {
            let (run, value) = match code {
                16 => (bits.read_bits(2)? as usize + 3, last_code),
                17 => (bits.read_bits(3)? as usize + 3, 0),
                18 => (bits.read_bits(7)? as usize + 11, 0),
                _ => return Err(DecrunchError::Corrupt("bit-length code out of range")),
            };
            if i + run > total {
                return Err(DecrunchError::Corrupt("bit-length run overruns alphabets"));
            }
            lens[i..i + run].fill(value);
            i += run;
        }
    }

    let lit_lens = st.literal.lengths_mut();
    lit_lens[..lit_codes].copy_from_slice(&lens[..lit_codes]);
    lit_lens[lit_codes..].fill(0);
    let dist_lens = st.distance.lengths_mut();
    dist_lens[..dist_codes].copy_from_slice(&lens[lit_codes..]);
    dist_lens[dist_codes..].fill(0);
    Ok(())
}

/// LZ77 decode loop for fixed and dynamic blocks.
fn huffman_block<R: Read>(bits: &mut BitReader<R, Lsb>, st: &mut InflateState) -> Result<()> {
    loop {
        let code = st.literal.read_symbol(bits)? as u32;
        if code < 256 {
            st.window.put(st.window_posn, code as u8);
            st.window_posn += 1;
            if st.window_posn == FRAME_SIZE {
                st.flush(FRAME_SIZE)?;
                st.window_posn = 0;
            }
            continue;
        }
        if code == 256 {
            return Ok(()); // end of block
        }

        let code = code - 257;
        if code >= 29 {
            return Err(DecrunchError::InvalidSymbol(code + 257));
        }
        let length = usize::from(LENGTH_BASE[code as usize])
            + bits.read_bits(u32::from(LENGTH_EXTRA[code as usize]))? as usize;

        let dist_code = st.distance.read_symbol(bits)? as u32;
        if dist_code >= 30 {
            return Err(DecrunchError::InvalidSymbol(dist_code));
        }
        let distance = usize::from(DISTANCE_BASE[dist_code as usize])
            + bits.read_bits(u32::from(DISTANCE_EXTRA[dist_code as usize]))? as usize;

        // a distance past the frame start wraps into the previous frame,
        // still resident in the window
        let mut match_posn = if distance > st.window_posn {
            FRAME_SIZE + st.window_posn - distance
        } else {
            st.window_posn - distance
        };

        for _ in 0..length {
            st.window.put(st.window_posn, st.window.get(match_posn));
            match_posn = (match_posn + 1) & (FRAME_SIZE - 1);
            st.window_posn += 1;
            if st.window_posn == FRAME_SIZE {
                st.flush(FRAME_SIZE)?;
                st.window_posn = 0;
            }
        }
    }
}
