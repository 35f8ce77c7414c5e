//! Static decoding tables for the Huffman-based codecs
//!
//! DEFLATE's tables are fixed by RFC 1951. The LZX and Quantum position
//! tables follow a doubling pattern, so they are generated by const fns
//! instead of being spelled out.

/// DEFLATE tables (used by the MSZIP codec)
pub mod deflate {
    /// Transmission order of the code-length code lengths
    pub const BITLEN_ORDER: [usize; 19] = [
        16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
    ];

    /// Base match length for literal/length codes 257..=285
    pub const LENGTH_BASE: [u16; 29] = [
        3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 15, 17, 19, 23, 27, 31, 35, 43, 51, 59, 67, 83, 99, 115,
        131, 163, 195, 227, 258,
    ];

    /// Extra bits carried by literal/length codes 257..=285
    pub const LENGTH_EXTRA: [u8; 29] = [
        0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0,
    ];

    /// Base match distance for distance codes 0..=29
    pub const DISTANCE_BASE: [u16; 30] = [
        1, 2, 3, 4, 5, 7, 9, 13, 17, 25, 33, 49, 65, 97, 129, 193, 257, 385, 513, 769, 1025, 1537,
        2049, 3073, 4097, 6145, 8193, 12289, 16385, 24577,
    ];

    /// Extra bits carried by distance codes 0..=29
    pub const DISTANCE_EXTRA: [u8; 30] = [
        0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12,
        13, 13,
    ];
}

/// LZX position-slot tables
pub mod lzx {
    /// Number of position slots for window bits 15 through 25
    pub const POSITION_SLOTS: [usize; 11] = [30, 32, 34, 36, 38, 42, 50, 66, 98, 162, 290];

    /// Largest slot count (a 2^25 window)
    pub const MAX_POSITION_SLOTS: usize = 290;

    /// Verbatim bits carried by a position slot's offset footer.
    pub const fn footer_bits(slot: usize) -> u32 {
        if slot < 2 {
            0
        } else if slot < 36 {
            (slot as u32 >> 1) - 1
        } else {
            17
        }
    }

    const fn position_base() -> [u32; MAX_POSITION_SLOTS] {
        let mut base = [0u32; MAX_POSITION_SLOTS];
        let mut slot = 1;
        while slot < MAX_POSITION_SLOTS {
            base[slot] = base[slot - 1] + (1 << footer_bits(slot - 1));
            slot += 1;
        }
        base
    }

    /// Formatted offset at which each position slot starts
    pub const POSITION_BASE: [u32; MAX_POSITION_SLOTS] = position_base();
}

/// Quantum position and length tables
pub mod qtm {
    const POSITION_SLOTS: usize = 42;
    const LENGTH_SLOTS: usize = 27;

    const fn position_extra(slot: usize) -> u32 {
        if slot < 2 {
            0
        } else {
            (slot as u32 - 2) >> 1
        }
    }

    const fn position_base() -> [u32; POSITION_SLOTS] {
        let mut base = [0u32; POSITION_SLOTS];
        let mut slot = 1;
        while slot < POSITION_SLOTS {
            base[slot] = base[slot - 1] + (1 << position_extra(slot - 1));
            slot += 1;
        }
        base
    }

    const fn extra_bits() -> [u8; POSITION_SLOTS] {
        let mut bits = [0u8; POSITION_SLOTS];
        let mut slot = 0;
        while slot < POSITION_SLOTS {
            bits[slot] = position_extra(slot) as u8;
            slot += 1;
        }
        bits
    }

    const fn length_extra() -> [u8; LENGTH_SLOTS] {
        let mut bits = [0u8; LENGTH_SLOTS];
        let mut slot = 0;
        while slot < LENGTH_SLOTS - 1 {
            bits[slot] = if slot < 2 { 0 } else { ((slot - 2) >> 2) as u8 };
            slot += 1;
        }
        // the last slot is an exact length, not a range
        bits[LENGTH_SLOTS - 1] = 0;
        bits
    }

    const fn length_base() -> [u8; LENGTH_SLOTS] {
        let extra = length_extra();
        let mut base = [0u8; LENGTH_SLOTS];
        let mut slot = 1;
        while slot < LENGTH_SLOTS {
            base[slot] = base[slot - 1] + (1u8 << extra[slot - 1]);
            slot += 1;
        }
        base
    }

    /// Match offset at which each position slot starts
    pub const POSITION_BASE: [u32; POSITION_SLOTS] = position_base();

    /// Extra bits carried by each position slot
    pub const EXTRA_BITS: [u8; POSITION_SLOTS] = extra_bits();

    /// Selector-6 match length at which each length slot starts
    pub const LENGTH_BASE: [u8; LENGTH_SLOTS] = length_base();

    /// Extra bits carried by each length slot
    pub const LENGTH_EXTRA: [u8; LENGTH_SLOTS] = length_extra();
}
