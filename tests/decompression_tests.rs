//! End-to-end decompression tests with hand-assembled streams
//!
//! Each codec gets at least one complete stream built bit-by-bit from the
//! format definition, decoded through the public API.

use decrunch::{
    kwaj_decompress_bytes, lzss_decompress_bytes, lzx_decompress_bytes, mszip_decompress_bytes,
    none_decompress_bytes, qtm_decompress_bytes, DecrunchError, LzssMode, MszipDecompressor,
};

/// MSB-first bit assembler packed into 16-bit little-endian words, the
/// way LZX streams are laid out.
struct LzxSink {
    bits: Vec<bool>,
}

impl LzxSink {
    fn new() -> Self {
        Self { bits: Vec::new() }
    }

    fn push(&mut self, value: u32, width: u32) {
        for i in (0..width).rev() {
            self.bits.push((value >> i) & 1 == 1);
        }
    }

    fn finish(self) -> Vec<u8> {
        let mut out = Vec::new();
        for chunk in self.bits.chunks(16) {
            let mut word = 0u16;
            for (i, bit) in chunk.iter().enumerate() {
                if *bit {
                    word |= 1 << (15 - i);
                }
            }
            out.push((word & 0xFF) as u8);
            out.push((word >> 8) as u8);
        }
        out
    }
}

/// An MSZIP frame holding one stored DEFLATE block.
fn mszip_stored_frame(payload: &[u8]) -> Vec<u8> {
    assert!(payload.len() <= 0x8000);
    let mut data = vec![b'C', b'K', 0x01];
    let len = payload.len() as u16;
    data.extend_from_slice(&len.to_le_bytes());
    data.extend_from_slice(&(!len).to_le_bytes());
    data.extend_from_slice(payload);
    data
}

#[test]
fn test_none_is_a_passthrough() {
    let data: Vec<u8> = (0u32..5000).map(|i| (i % 251) as u8).collect();
    assert_eq!(none_decompress_bytes(&data).unwrap(), data);
}

#[test]
fn test_lzss_expand_literals_and_match() {
    // control 0xFF = eight literals "abcdefgh", which land at ring
    // positions 0xFF0..; control 0x01 = literal 'i' then the match
    // <position 0xFF0, length 5 + 3> repeating them
    let data = hex::decode("ff61626364656667680169f0f5").unwrap();

    let out = lzss_decompress_bytes(&data, LzssMode::Expand).unwrap();
    assert_eq!(out, b"abcdefghiabcdefgh");
}

#[test]
fn test_lzss_mshelp_inverts_control() {
    let mut data = vec![0x00]; // inverted: all literals
    data.extend_from_slice(b"helpfile");
    let out = lzss_decompress_bytes(&data, LzssMode::MsHelp).unwrap();
    assert_eq!(out, b"helpfile");
}

#[test]
fn test_mszip_two_frames() {
    let frame1: Vec<u8> = (0u32..0x8000).map(|i| (i * 13 % 256) as u8).collect();
    let frame2 = b"tail frame".to_vec();

    let mut data = mszip_stored_frame(&frame1);
    data.extend_from_slice(&mszip_stored_frame(&frame2));

    let out = mszip_decompress_bytes(&data, 0x8000 + 10, false).unwrap();
    assert_eq!(&out[..0x8000], &frame1[..]);
    assert_eq!(&out[0x8000..], &frame2[..]);
}

#[test]
fn test_mszip_repair_salvages_later_frames() {
    let mut bad_frame = mszip_stored_frame(&[b'A'; 256]);
    bad_frame[5] ^= 0xFF; // corrupt the stored-length complement

    let mut data = bad_frame;
    data.extend_from_slice(&mszip_stored_frame(b"hello"));

    // strict mode refuses
    assert!(matches!(
        mszip_decompress_bytes(&data, 0x8000 + 5, false),
        Err(DecrunchError::BadStoredLength)
    ));

    // repair mode zero-fills the damaged frame and recovers the next
    let out = mszip_decompress_bytes(&data, 0x8000 + 5, true).unwrap();
    assert!(out[..0x8000].iter().all(|&b| b == 0));
    assert_eq!(&out[0x8000..], b"hello");
}

#[test]
fn test_mszip_incremental_calls_match_single_call() {
    let payload: Vec<u8> = (0u32..40_000).map(|i| (i * 31 % 256) as u8).collect();
    let mut data = mszip_stored_frame(&payload[..0x8000]);
    data.extend_from_slice(&mszip_stored_frame(&payload[0x8000..]));

    let whole = mszip_decompress_bytes(&data, 40_000, false).unwrap();
    assert_eq!(whole, payload);

    let mut chunked = Vec::new();
    let mut stream = MszipDecompressor::new(&data[..], &mut chunked, 0x800, false).unwrap();
    for chunk in [1u64, 999, 11_000, 2, 27_998] {
        stream.decompress(chunk).unwrap();
    }
    assert_eq!(chunked, payload);
}

#[test]
fn test_mszip_repair_zero_fills_frame_with_lost_marker() {
    // destroy the second frame's marker: repair mode substitutes a 32 KiB
    // zero frame so the third frame lands at its expected offset
    let mut data = mszip_stored_frame(b"first");
    let mut lost = mszip_stored_frame(&[b'x'; 40]);
    lost[0] = b'z';
    data.extend_from_slice(&lost);
    data.extend_from_slice(&mszip_stored_frame(b"last"));

    let out = mszip_decompress_bytes(&data, 5 + 0x8000 + 4, true).unwrap();
    assert_eq!(&out[..5], b"first");
    assert!(out[5..5 + 0x8000].iter().all(|&b| b == 0));
    assert_eq!(&out[5 + 0x8000..], b"last");
}

#[test]
fn test_lzx_uncompressed_block() {
    let mut s = LzxSink::new();
    s.push(0, 1); // no E8 header
    s.push(3, 3); // uncompressed block
    s.push(0, 16); // block length, upper bits
    s.push(10, 8); // block length = 10

    let mut data = s.finish();
    // R0/R1/R2 as 32-bit little-endian words, then the raw payload
    for _ in 0..3 {
        data.extend_from_slice(&1u32.to_le_bytes());
    }
    data.extend_from_slice(b"ABCDEFGHIJ");

    let out = lzx_decompress_bytes(&data, 15, 10).unwrap();
    assert_eq!(out, b"ABCDEFGHIJ");
}

#[test]
fn test_lzx_uncompressed_block_spans_frames() {
    let payload: Vec<u8> = (0u32..40_000).map(|i| (i * 7 % 256) as u8).collect();

    let mut s = LzxSink::new();
    s.push(0, 1);
    s.push(3, 3);
    s.push(0x009C, 16); // 40000 = 0x9C40
    s.push(0x40, 8);

    let mut data = s.finish();
    for _ in 0..3 {
        data.extend_from_slice(&1u32.to_le_bytes());
    }
    data.extend_from_slice(&payload);

    let out = lzx_decompress_bytes(&data, 16, 40_000).unwrap();
    assert_eq!(out, payload);
}

#[test]
fn test_lzx_verbatim_block_with_repeat_offset() {
    // one verbatim block of 8 bytes: literals a, b, c then a length-5
    // match against the most recent offset (initially 1), giving
    // "abcccccc". Only main-tree symbols 97, 98, 99 and 259 are coded,
    // all with 2-bit lengths.
    let mut s = LzxSink::new();
    s.push(0, 1); // no E8 header
    s.push(1, 3); // verbatim block
    s.push(0, 16);
    s.push(8, 8); // block length = 8

    // main tree, first 256 elements: pretree with symbols 15 and 18
    for i in 0..20 {
        s.push(u32::from(i == 15 || i == 18), 4);
    }
    // 97 zeros (51 + 46)
    s.push(1, 1);
    s.push(31, 5);
    s.push(1, 1);
    s.push(26, 5);
    // lengths for 'a' 'b' 'c': delta symbol 15 maps 0 to 2
    for _ in 0..3 {
        s.push(0, 1);
    }
    // 156 zeros (51 + 51 + 34 + 20)
    for run in [31, 31, 14, 0] {
        s.push(1, 1);
        s.push(run, 5);
    }

    // main tree, match elements 256..496: pretree codes 18 -> 0,
    // 0 -> 10, 15 -> 11
    for i in 0..20 {
        let len = match i {
            18 => 1,
            0 | 15 => 2,
            _ => 0,
        };
        s.push(len, 4);
    }
    for _ in 0..3 {
        s.push(0b10, 2); // elements 256-258 keep length 0
    }
    s.push(0b11, 2); // element 259 -> length 2
                     // 236 zeros (51 * 4 + 32)
    for _ in 0..4 {
        s.push(0, 1);
        s.push(31, 5);
    }
    s.push(0, 1);
    s.push(12, 5);

    // length tree stays empty: 249 zeros (51 * 4 + 45)
    for i in 0..20 {
        s.push(u32::from(i == 17 || i == 18), 4);
    }
    for _ in 0..4 {
        s.push(1, 1);
        s.push(31, 5);
    }
    s.push(1, 1);
    s.push(25, 5);

    // body: codes in canonical order are a=00, b=01, c=10, 259=11;
    // element 259 is <repeat offset R0, length header 3> = 5 bytes
    s.push(0b00, 2);
    s.push(0b01, 2);
    s.push(0b10, 2);
    s.push(0b11, 2);

    let out = lzx_decompress_bytes(&s.finish(), 15, 8).unwrap();
    assert_eq!(out, b"abcccccc");
}

#[test]
fn test_lzx_repeat_offset_cache_promotes_r1() {
    // an uncompressed block seeds R0=1, R1=2, R2=3 and emits "abcdef";
    // a verbatim block then codes <slot 1, length 5> followed by
    // <slot 0, length 4>. The slot-1 match must use offset 2 and swap
    // it into R0, so the slot-0 match repeats offset 2, not 1.
    let mut s = LzxSink::new();
    s.push(0, 1); // no E8 header
    s.push(3, 3); // uncompressed block
    s.push(0, 16);
    s.push(6, 8); // block length = 6

    let mut data = s.finish();
    for r in [1u32, 2, 3] {
        data.extend_from_slice(&r.to_le_bytes());
    }
    data.extend_from_slice(b"abcdef");

    let mut s = LzxSink::new();
    s.push(1, 3); // verbatim block
    s.push(0, 16);
    s.push(9, 8); // block length = 5 + 4

    // main tree, first 256 elements all zero: pretree codes 17 -> 0,
    // 18 -> 1; 256 zeros as runs 51 * 4 + 32 + 20
    for i in 0..20 {
        s.push(u32::from(i == 17 || i == 18), 4);
    }
    for run in [31, 31, 31, 31, 12, 0] {
        s.push(1, 1);
        s.push(run, 5);
    }

    // match elements 256..496: only 258 (slot 0, header 2) and 267
    // (slot 1, header 3) get codes; pretree 18 -> 0, 0 -> 10,
    // 16 -> 110, 17 -> 111
    for i in 0..20 {
        let len = match i {
            18 => 1,
            0 => 2,
            16 | 17 => 3,
            _ => 0,
        };
        s.push(len, 4);
    }
    s.push(0b10, 2); // element 256 stays zero
    s.push(0b10, 2); // element 257 stays zero
    s.push(0b110, 3); // element 258 -> length 1
    s.push(0b111, 3); // 8 zeros (259..266)
    s.push(4, 4);
    s.push(0b110, 3); // element 267 -> length 1
                      // 228 zeros (51 * 4 + 24)
    for run in [31, 31, 31, 31, 4] {
        s.push(0, 1);
        s.push(run, 5);
    }

    // length tree stays empty: 249 zeros (51 * 4 + 45)
    for i in 0..20 {
        s.push(u32::from(i == 17 || i == 18), 4);
    }
    for run in [31, 31, 31, 31, 25] {
        s.push(1, 1);
        s.push(run, 5);
    }

    // body: main-tree codes are 258 -> 0, 267 -> 1
    s.push(1, 1); // <slot 1, length 5>: "efefe"
    s.push(0, 1); // <slot 0, length 4>: "fefe"

    data.extend_from_slice(&s.finish());
    let out = lzx_decompress_bytes(&data, 15, 15).unwrap();
    assert_eq!(out, b"abcdefefefefefe");
}

#[test]
fn test_quantum_rejects_bad_window() {
    assert!(matches!(
        qtm_decompress_bytes(&[], 9, 16),
        Err(DecrunchError::InvalidWindowBits { bits: 9, .. })
    ));
    assert!(qtm_decompress_bytes(&[], 22, 16).is_err());
}

#[test]
fn test_quantum_truncated_input_is_read_error() {
    // an empty stream cannot satisfy any output request
    let err = qtm_decompress_bytes(&[], 10, 100_000).unwrap_err();
    assert_eq!(err.kind(), decrunch::ErrorKind::Read);
}

/// MSB-first bit assembler packed a byte at a time (KWAJ streams).
struct ByteSink {
    bytes: Vec<u8>,
    acc: u32,
    nbits: u32,
}

impl ByteSink {
    fn new() -> Self {
        Self {
            bytes: Vec::new(),
            acc: 0,
            nbits: 0,
        }
    }

    fn push(&mut self, value: u32, width: u32) {
        for i in (0..width).rev() {
            self.acc = (self.acc << 1) | ((value >> i) & 1);
            self.nbits += 1;
            if self.nbits == 8 {
                self.bytes.push(self.acc as u8);
                self.acc = 0;
                self.nbits = 0;
            }
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if self.nbits > 0 {
            self.bytes.push((self.acc << (8 - self.nbits)) as u8);
        }
        self.bytes
    }
}

#[test]
fn test_kwaj_literal_stream() {
    // all five trees flat (plain 4-bit length encoding), then a run of
    // three literals; flat codes make every codeword its symbol index
    let mut s = ByteSink::new();

    for _ in 0..6 {
        s.push(3, 4); // encoding tag: plain lengths
    }
    for _ in 0..16 {
        s.push(4, 4);
    }
    for _ in 0..16 {
        s.push(4, 4);
    }
    for _ in 0..32 {
        s.push(5, 4);
    }
    for _ in 0..64 {
        s.push(6, 4);
    }
    for _ in 0..256 {
        s.push(8, 4);
    }

    s.push(0, 4); // match length 0: literal run follows
    s.push(2, 5); // run of 3
    s.push(u32::from(b'H'), 8);
    s.push(u32::from(b'I'), 8);
    s.push(u32::from(b'!'), 8);
    s.push(0, 7); // byte padding

    let out = kwaj_decompress_bytes(&s.finish()).unwrap();
    assert_eq!(out, b"HI!");
}
