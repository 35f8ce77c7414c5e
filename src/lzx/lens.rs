//! LZX code-length reading via the run-length "pretree"
//!
//! Every verbatim or aligned block re-transmits its main and length tree
//! code lengths as deltas against the previous block's lengths, coded
//! with a 20-symbol pretree: symbols 0-16 are length deltas, 17 and 18
//! are zero runs, 19 repeats a following delta symbol.

use std::io::Read;

use crate::bits::{BitReader, Msb};
use crate::common::Result;
use crate::huffman::HuffmanTable;

/// Pretree alphabet size
pub(super) const PRETREE_NUM_SYMBOLS: usize = 20;

/// Pretree fast-lookup width
pub(super) const PRETREE_TABLEBITS: u32 = 6;

/// Read updated code lengths for `lens[first..last]`.
///
/// The pretree itself (20 fixed 4-bit lengths) is re-read per call. Run
/// symbols may legally spill a few entries past `last`; those writes stay
/// inside `lens` and are overwritten by the next range's update.
pub(super) fn read_lens<R: Read>(
    bits: &mut BitReader<R, Msb>,
    pretree: &mut HuffmanTable<Msb>,
    lens: &mut [u8],
    first: usize,
    last: usize,
) -> Result<()> {
    for i in 0..PRETREE_NUM_SYMBOLS {
        pretree.lengths_mut()[i] = bits.read_bits(4)? as u8;
    }
    pretree.build()?;

    let mut x = first;
    while x < last {
        let z = pretree.read_symbol(bits)? as u8;
        match z {
            17 => {
                // run of 4-19 zeros
                let run = bits.read_bits(4)? as usize + 4;
                for _ in 0..run {
                    if x < lens.len() {
                        lens[x] = 0;
                    }
                    x += 1;
                }
            }
            18 => {
                // run of 20-51 zeros
                let run = bits.read_bits(5)? as usize + 20;
                for _ in 0..run {
                    if x < lens.len() {
                        lens[x] = 0;
                    }
                    x += 1;
                }
            }
            19 => {
                // run of 4-5 repeats of a following delta symbol
                let run = bits.read_bits(1)? as usize + 4;
                let sym = pretree.read_symbol(bits)? as u8;
                let value = delta(lens[x], sym);
                for _ in 0..run {
                    if x < lens.len() {
                        lens[x] = value;
                    }
                    x += 1;
                }
            }
            _ => {
                // delta against this entry's previous length
                lens[x] = delta(lens[x], z);
                x += 1;
            }
        }
    }
    Ok(())
}

/// New length = (previous - symbol) mod 17.
#[inline]
fn delta(previous: u8, sym: u8) -> u8 {
    let z = i32::from(previous) - i32::from(sym);
    if z < 0 {
        (z + 17) as u8
    } else {
        z as u8
    }
}
