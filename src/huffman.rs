//! Canonical Huffman decode tables
//!
//! [`HuffmanTable`] turns a canonical code-length array into a flat decode
//! table: codes no longer than `tablebits` get direct lookup slots, longer
//! codes (up to 16 bits) get binary tree nodes appended after the direct
//! slots. The same builder serves MSZIP, LZX and KWAJ; the LSB variant
//! bit-reverses each code because LSB-first streams present codes in the
//! opposite significance order.
//!
//! Code lengths come from untrusted input, so a length set that overfills
//! or underfills the code space is reported as a data error, never a
//! panic. An all-zero length set is the legal "empty tree": tolerated
//! where the format allows it, but decoding a symbol from one is fatal.

use std::io::Read;
use std::marker::PhantomData;

use crate::bits::{BitOrder, BitReader};
use crate::common::{DecrunchError, Result};

/// Longest supported code length in bits
pub const HUFF_MAX_BITS: u32 = 16;

/// Sentinel marking an unused decode-table slot during construction
const UNUSED: u16 = 0xFFFF;

/// Reverse the low `width` bits of `value`.
#[inline]
fn reverse_bits(value: u32, width: u32) -> u32 {
    value.reverse_bits() >> (32 - width)
}

/// A canonical Huffman decode table parameterized by bit order.
#[derive(Debug)]
pub struct HuffmanTable<O: BitOrder> {
    name: &'static str,
    maxsymbols: usize,
    tablebits: u32,
    lengths: Vec<u8>,
    table: Vec<u16>,
    empty: bool,
    _order: PhantomData<O>,
}

impl<O: BitOrder> HuffmanTable<O> {
    /// Create a table for `maxsymbols` symbols with a direct-lookup prefix
    /// of `tablebits` bits. All code lengths start at zero.
    pub fn new(name: &'static str, maxsymbols: usize, tablebits: u32) -> Self {
        debug_assert!(tablebits <= HUFF_MAX_BITS);
        Self {
            name,
            maxsymbols,
            tablebits,
            lengths: vec![0; maxsymbols],
            table: vec![0; (1 << tablebits) + maxsymbols * 2],
            empty: true,
            _order: PhantomData,
        }
    }

    /// The code-length array, one entry per symbol (0 = unused).
    pub fn lengths(&self) -> &[u8] {
        &self.lengths
    }

    /// Mutable access to the code lengths, for table readers.
    pub fn lengths_mut(&mut self) -> &mut [u8] {
        &mut self.lengths
    }

    /// Number of symbols this table can decode.
    pub fn maxsymbols(&self) -> usize {
        self.maxsymbols
    }

    /// Whether the last build produced the legal all-zero "empty tree".
    pub fn is_empty_tree(&self) -> bool {
        self.empty
    }

    /// Build the decode table; an empty tree is an error here.
    pub fn build(&mut self) -> Result<()> {
        self.build_allow_empty()?;
        if self.empty {
            return Err(DecrunchError::CorruptHuffmanTable(self.name));
        }
        Ok(())
    }

    /// Build the decode table, tolerating the all-zero length set.
    pub fn build_allow_empty(&mut self) -> Result<()> {
        self.empty = false;
        if self.fill_decode_table() {
            return Ok(());
        }
        // either a malformed length set or no codes at all
        if self.lengths.iter().any(|&len| len != 0) {
            return Err(DecrunchError::CorruptHuffmanTable(self.name));
        }
        self.empty = true;
        Ok(())
    }

    /// Two-pass canonical table fill. Returns false when the length set
    /// does not exactly cover the code space.
    fn fill_decode_table(&mut self) -> bool {
        let nsyms = self.maxsymbols;
        let nbits = self.tablebits;
        let table = &mut self.table;

        let mut pos: u32 = 0;
        let mut table_mask: u32 = 1 << nbits;
        let mut bit_mask: u32 = table_mask >> 1;

        // pass 1: codes short enough for a direct mapping
        for bit_num in 1..=nbits {
            for sym in 0..nsyms {
                if u32::from(self.lengths[sym]) != bit_num {
                    continue;
                }
                let mut leaf = if O::IS_MSB {
                    pos as usize
                } else {
                    reverse_bits(pos >> (nbits - bit_num), bit_num) as usize
                };

                pos += bit_mask;
                if pos > table_mask {
                    return false; // table overrun
                }

                // fill all lookup slots whose prefix is this code
                if O::IS_MSB {
                    for slot in &mut table[leaf..leaf + bit_mask as usize] {
                        *slot = sym as u16;
                    }
                } else {
                    let stride = 1usize << bit_num;
                    for _ in 0..bit_mask {
                        table[leaf] = sym as u16;
                        leaf += stride;
                    }
                }
            }
            bit_mask >>= 1;
        }

        if pos == table_mask {
            return true;
        }

        // mark remaining direct slots unused before growing the tree
        for idx in pos..table_mask {
            let leaf = if O::IS_MSB {
                idx as usize
            } else {
                reverse_bits(idx, nbits) as usize
            };
            table[leaf] = UNUSED;
        }

        // node indices start above both the symbols and the direct slots
        let mut next_symbol = ((table_mask >> 1) as usize).max(nsyms);

        // pass 2: grow the table by up to 16 extra bits of depth,
        // bookkeeping in 16.16 fixed point
        pos <<= 16;
        table_mask <<= 16;
        bit_mask = 1 << 15;

        for bit_num in (nbits + 1)..=HUFF_MAX_BITS {
            for sym in 0..nsyms {
                if u32::from(self.lengths[sym]) != bit_num {
                    continue;
                }
                if pos >= table_mask {
                    return false; // table overrun
                }

                let mut leaf = if O::IS_MSB {
                    (pos >> 16) as usize
                } else {
                    reverse_bits(pos >> 16, nbits) as usize
                };

                for fill in 0..(bit_num - nbits) {
                    // allocate a node pair the first time this path is taken
                    if table[leaf] == UNUSED {
                        if next_symbol * 2 + 1 >= table.len() {
                            return false;
                        }
                        table[next_symbol * 2] = UNUSED;
                        table[next_symbol * 2 + 1] = UNUSED;
                        table[leaf] = next_symbol as u16;
                        next_symbol += 1;
                    }
                    leaf = (table[leaf] as usize) << 1;
                    // path bits come from the code counter in decode order
                    // for both bit orders; only the direct-slot index above
                    // is reversed for LSB streams
                    leaf += ((pos >> (15 - fill)) & 1) as usize;
                }
                table[leaf] = sym as u16;

                pos += bit_mask;
                if pos > table_mask {
                    return false;
                }
            }
            bit_mask >>= 1;
        }

        pos == table_mask
    }

    /// Decode one symbol from the bit stream.
    pub fn read_symbol<R: Read>(&self, bits: &mut BitReader<R, O>) -> Result<u16> {
        if self.empty {
            return Err(DecrunchError::EmptyHuffmanTree(self.name));
        }
        bits.ensure_bits(HUFF_MAX_BITS)?;
        let mut sym = self.table[bits.peek_bits(self.tablebits) as usize];
        if sym as usize >= self.maxsymbols {
            // long code: walk the tree one bit at a time
            let mut i = self.tablebits;
            loop {
                if i >= HUFF_MAX_BITS {
                    return Err(DecrunchError::InvalidHuffmanCode(self.name));
                }
                let idx = ((sym as usize) << 1) | bits.buffered_bit(i) as usize;
                sym = *self
                    .table
                    .get(idx)
                    .ok_or(DecrunchError::InvalidHuffmanCode(self.name))?;
                if (sym as usize) < self.maxsymbols {
                    break;
                }
                i += 1;
            }
        }
        bits.remove_bits(u32::from(self.lengths[sym as usize]));
        Ok(sym)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::{EofPolicy, Fill, Lsb, Msb};
    use std::io::Cursor;

    fn msb_reader(data: &[u8]) -> BitReader<Cursor<Vec<u8>>, Msb> {
        BitReader::new(
            Cursor::new(data.to_vec()),
            16,
            Fill::Byte,
            EofPolicy::ZeroPadOnce,
        )
        .unwrap()
    }

    fn lsb_reader(data: &[u8]) -> BitReader<Cursor<Vec<u8>>, Lsb> {
        BitReader::new(
            Cursor::new(data.to_vec()),
            16,
            Fill::Byte,
            EofPolicy::ZeroPadOnce,
        )
        .unwrap()
    }

    #[test]
    fn test_msb_simple_codes() {
        // canonical lengths [1, 2, 2]: sym0 = 0, sym1 = 10, sym2 = 11
        let mut t: HuffmanTable<Msb> = HuffmanTable::new("test", 3, 4);
        t.lengths_mut().copy_from_slice(&[1, 2, 2]);
        t.build().unwrap();

        let mut r = msb_reader(&[0b0_10_11_00_0]);
        assert_eq!(t.read_symbol(&mut r).unwrap(), 0);
        assert_eq!(t.read_symbol(&mut r).unwrap(), 1);
        assert_eq!(t.read_symbol(&mut r).unwrap(), 2);
    }

    #[test]
    fn test_lsb_simple_codes() {
        // same code set, but the stream presents codes low-bit first
        let mut t: HuffmanTable<Lsb> = HuffmanTable::new("test", 3, 4);
        t.lengths_mut().copy_from_slice(&[1, 2, 2]);
        t.build().unwrap();

        // sym0 = 0, sym1 = 10 (sent as 01), sym2 = 11; packed LSB-first:
        // bits 0, then 0,1, then 1,1 -> 0b...11_01_0
        let mut r = lsb_reader(&[0b000_11_01_0]);
        assert_eq!(t.read_symbol(&mut r).unwrap(), 0);
        assert_eq!(t.read_symbol(&mut r).unwrap(), 1);
        assert_eq!(t.read_symbol(&mut r).unwrap(), 2);
    }

    #[test]
    fn test_long_codes_use_tree_nodes() {
        // tablebits 2 with 3-bit codes forces pass-2 tree traversal:
        // lengths [1, 3, 3, 3, 3] -> 0, 100, 101, 110, 111
        let mut t: HuffmanTable<Msb> = HuffmanTable::new("test", 5, 2);
        t.lengths_mut().copy_from_slice(&[1, 3, 3, 3, 3]);
        t.build().unwrap();

        let mut r = msb_reader(&[0b100_101_11, 0b0_111_0000]);
        assert_eq!(t.read_symbol(&mut r).unwrap(), 1);
        assert_eq!(t.read_symbol(&mut r).unwrap(), 2);
        assert_eq!(t.read_symbol(&mut r).unwrap(), 3);
        assert_eq!(t.read_symbol(&mut r).unwrap(), 4);
    }

    #[test]
    fn test_lsb_long_codes_use_tree_nodes() {
        // the LSB stream reverses the direct-lookup prefix, but the tree
        // path beyond tablebits follows the code bits in decode order
        let mut t: HuffmanTable<Lsb> = HuffmanTable::new("test", 5, 2);
        t.lengths_mut().copy_from_slice(&[1, 3, 3, 3, 3]);
        t.build().unwrap();

        // codes 100, 101, 110, 111 sent high-bit first within each code,
        // packed into LSB-first bytes
        let mut r = lsb_reader(&[0xE9, 0x0E]);
        assert_eq!(t.read_symbol(&mut r).unwrap(), 1);
        assert_eq!(t.read_symbol(&mut r).unwrap(), 2);
        assert_eq!(t.read_symbol(&mut r).unwrap(), 3);
        assert_eq!(t.read_symbol(&mut r).unwrap(), 4);
    }

    #[test]
    fn test_overfull_lengths_rejected() {
        let mut t: HuffmanTable<Msb> = HuffmanTable::new("test", 3, 4);
        t.lengths_mut().copy_from_slice(&[1, 1, 1]);
        assert!(matches!(
            t.build(),
            Err(DecrunchError::CorruptHuffmanTable("test"))
        ));
    }

    #[test]
    fn test_incomplete_lengths_rejected() {
        let mut t: HuffmanTable<Msb> = HuffmanTable::new("test", 3, 4);
        t.lengths_mut().copy_from_slice(&[2, 0, 0]);
        assert!(t.build().is_err());
    }

    #[test]
    fn test_empty_tree_allowed_but_not_decoded() {
        let mut t: HuffmanTable<Msb> = HuffmanTable::new("test", 8, 4);
        t.build_allow_empty().unwrap();
        assert!(t.is_empty_tree());

        let mut r = msb_reader(&[0xAA]);
        assert!(matches!(
            t.read_symbol(&mut r),
            Err(DecrunchError::EmptyHuffmanTree("test"))
        ));
    }

    #[test]
    fn test_empty_tree_is_error_when_required() {
        let mut t: HuffmanTable<Msb> = HuffmanTable::new("test", 8, 4);
        assert!(t.build().is_err());
    }

    #[test]
    fn test_every_pattern_decodes_consistently() {
        // a complete 8-symbol code with mixed lengths
        let lens = [2u8, 2, 3, 3, 4, 4, 4, 4];
        let mut t: HuffmanTable<Msb> = HuffmanTable::new("test", 8, 3);
        t.lengths_mut().copy_from_slice(&lens);
        t.build().unwrap();

        // walking all 16-bit prefixes must decode some symbol whose
        // assigned length is then consumed
        for prefix in 0u32..16 {
            let first = (prefix << 4) as u8;
            let mut r = msb_reader(&[first, 0, 0]);
            let sym = t.read_symbol(&mut r).unwrap() as usize;
            assert!(sym < 8);
            assert!(lens[sym] >= 1);
        }
    }
}
