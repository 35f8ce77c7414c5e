//! KWAJ LZH decompression
//!
//! The KWAJ container's method 3: LZSS-style matches through a 4 KiB
//! ring, but with Huffman-coded match lengths, literal run lengths,
//! offsets and literals. Five trees are transmitted up front, each with
//! one of four length-storage encodings selected by a 4-bit tag.
//!
//! Like LZSS, the stream has no end marker; it simply runs out. The bit
//! reader pads with zeroes forever, and the decoder stops successfully
//! the moment a read consumes synthetic padding rather than real input.

use std::io::{Read, Write};

use crate::bits::{BitReader, EofPolicy, Fill, Msb};
use crate::common::{DecrunchError, Result, DEFAULT_INPUT_SIZE, LZSS_WINDOW_SIZE};
use crate::huffman::HuffmanTable;

const TABLEBITS: u32 = 9;
const MATCHLEN_SYMS: usize = 16;
const LITLEN_SYMS: usize = 32;
const OFFSET_SYMS: usize = 64;
const LITERAL_SYMS: usize = 256;

/// Ring pre-fill byte (ASCII space)
const WINDOW_FILL: u8 = 0x20;

/// Decompress a KWAJ LZH stream until the input is exhausted.
pub fn kwaj_decompress<R: Read, W: Write>(input: R, mut output: W) -> Result<()> {
    let mut bits: BitReader<R, Msb> = BitReader::new(
        input,
        DEFAULT_INPUT_SIZE,
        Fill::Byte,
        EofPolicy::ZeroPadForever,
    )?;
    let mut out_buf = Vec::with_capacity(LZSS_WINDOW_SIZE);
    let result = match decode(&mut bits, &mut out_buf, &mut output) {
        // padding consumed: the clean end of the stream
        Err(DecrunchError::InputExhausted) => Ok(()),
        other => other,
    };
    if !out_buf.is_empty() {
        output.write_all(&out_buf).map_err(DecrunchError::Write)?;
    }
    output.flush().map_err(DecrunchError::Write)?;
    result
}

/// Decompress an in-memory KWAJ LZH stream.
pub fn kwaj_decompress_bytes(data: &[u8]) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    kwaj_decompress(data, &mut output)?;
    Ok(output)
}

fn decode<R: Read, W: Write>(
    bits: &mut BitReader<R, Msb>,
    out_buf: &mut Vec<u8>,
    output: &mut W,
) -> Result<()> {
    // six 4-bit encoding tags for byte alignment; only five are used
    let mut types = [0u32; 6];
    for tag in types.iter_mut() {
        *tag = read_bits_safe(bits, 4)?;
    }

    let matchlen1 = build_tree(bits, "matchlen1", types[0], MATCHLEN_SYMS)?;
    let matchlen2 = build_tree(bits, "matchlen2", types[1], MATCHLEN_SYMS)?;
    let litlen = build_tree(bits, "litlen", types[2], LITLEN_SYMS)?;
    let offtree = build_tree(bits, "offset", types[3], OFFSET_SYMS)?;
    let literal = build_tree(bits, "literal", types[4], LITERAL_SYMS)?;

    let mut window = [WINDOW_FILL; LZSS_WINDOW_SIZE];
    let mut pos = 0usize;
    let mut lit_run = false;

    loop {
        // a separate length tree applies right after a literal run
        let table = if lit_run { &matchlen2 } else { &matchlen1 };
        let len = read_symbol_safe(table, bits)? as usize;

        if len > 0 {
            let len = len + 2;
            lit_run = false;
            let high = read_symbol_safe(&offtree, bits)? as usize;
            let low = read_bits_safe(bits, 6)? as usize;
            let offset = (high << 6) | low;
            for _ in 0..len {
                let b = window[(pos + LZSS_WINDOW_SIZE - offset) & (LZSS_WINDOW_SIZE - 1)];
                window[pos] = b;
                pos = (pos + 1) & (LZSS_WINDOW_SIZE - 1);
                push_byte(out_buf, output, b)?;
            }
        } else {
            let run = read_symbol_safe(&litlen, bits)? as usize + 1;
            lit_run = run != 32; // a full-length run does not end the run state
            for _ in 0..run {
                let b = read_symbol_safe(&literal, bits)? as u8;
                window[pos] = b;
                pos = (pos + 1) & (LZSS_WINDOW_SIZE - 1);
                push_byte(out_buf, output, b)?;
            }
        }
    }
}

fn push_byte<W: Write>(out_buf: &mut Vec<u8>, output: &mut W, b: u8) -> Result<()> {
    out_buf.push(b);
    if out_buf.len() >= LZSS_WINDOW_SIZE {
        output.write_all(out_buf).map_err(DecrunchError::Write)?;
        out_buf.clear();
    }
    Ok(())
}

/// A bit read that fails with the exhaustion sentinel once it has eaten
/// into the synthetic zero padding.
fn read_bits_safe<R: Read>(bits: &mut BitReader<R, Msb>, n: u32) -> Result<u32> {
    let value = bits.read_bits(n)?;
    if bits.in_padding() {
        return Err(DecrunchError::InputExhausted);
    }
    Ok(value)
}

fn read_symbol_safe<R: Read>(table: &HuffmanTable<Msb>, bits: &mut BitReader<R, Msb>) -> Result<u16> {
    let sym = table.read_symbol(bits)?;
    if bits.in_padding() {
        return Err(DecrunchError::InputExhausted);
    }
    Ok(sym)
}

/// Read one tree's code lengths in the encoding picked by `tag`, then
/// build its decode table.
fn build_tree<R: Read>(
    bits: &mut BitReader<R, Msb>,
    name: &'static str,
    tag: u32,
    numsyms: usize,
) -> Result<HuffmanTable<Msb>> {
    let mut table = HuffmanTable::new(name, numsyms, TABLEBITS);
    {
        let lens = table.lengths_mut();
        match tag {
            0 => {
                // fixed width decided by the alphabet size
                let width = match numsyms {
                    16 => 4,
                    32 => 5,
                    64 => 6,
                    256 => 8,
                    _ => 0,
                };
                lens.fill(width);
            }
            1 => {
                // per-symbol selector: same / increment / explicit
                let mut c = read_bits_safe(bits, 4)? as u8;
                lens[0] = c;
                for i in 1..numsyms {
                    if read_bits_safe(bits, 1)? == 0 {
                        lens[i] = c;
                    } else if read_bits_safe(bits, 1)? == 0 {
                        c = c.wrapping_add(1);
                        lens[i] = c;
                    } else {
                        c = read_bits_safe(bits, 4)? as u8;
                        lens[i] = c;
                    }
                }
            }
            2 => {
                // 2-bit delta in -1..=1, or escape to an explicit width
                let mut c = read_bits_safe(bits, 4)? as u8;
                lens[0] = c;
                for i in 1..numsyms {
                    let sel = read_bits_safe(bits, 2)?;
                    if sel == 3 {
                        c = read_bits_safe(bits, 4)? as u8;
                    } else {
                        c = c.wrapping_add(sel as u8).wrapping_sub(1);
                    }
                    lens[i] = c;
                }
            }
            3 => {
                for len in lens.iter_mut() {
                    *len = read_bits_safe(bits, 4)? as u8;
                }
            }
            _ => return Err(DecrunchError::Corrupt("tree length encoding type")),
        }
    }
    table.build()?;
    Ok(table)
}
