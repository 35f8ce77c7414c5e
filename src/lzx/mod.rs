//! LZX decompression
//!
//! LZX is the heavyweight of the family: a 32 KiB to 32 MiB sliding
//! window, three block types (verbatim, aligned-offset, uncompressed), a
//! three-entry cache of recently used match offsets, per-frame bitstream
//! realignment, and an optional reversal of the Intel E8 call-target
//! transform applied to executables at compression time.
//!
//! The LZX DELTA variant extends the window range to 2^25, allows
//! caller-supplied reference data to sit logically before the stream's
//! own output, skips a 16-bit chunk size per frame, and adds an extended
//! match-length encoding for very long matches.
//!
//! Output is produced in 32 KiB frames. Each frame is staged through a
//! scratch buffer (where the E8 reversal is applied when active) so the
//! window itself always holds untransformed data for back-references.

mod lens;

use std::io::{Read, Write};

use crate::bits::{BitReader, EofPolicy, Fill, Msb};
use crate::common::{DecrunchError, ErrorKind, Result, DEFAULT_INPUT_SIZE, FRAME_SIZE};
use crate::huffman::HuffmanTable;
use crate::tables::lzx::{footer_bits, POSITION_BASE, POSITION_SLOTS};
use crate::window::Window;

/// Smallest encodable match
const MIN_MATCH: usize = 2;

/// Largest match without the DELTA length extension
const MAX_MATCH: usize = 257;

/// Literal alphabet size; main-tree symbols past this encode matches
const NUM_CHARS: usize = 256;

/// Match-length headers expressible in the main tree element itself
const NUM_PRIMARY_LENGTHS: usize = 7;

/// Length-tree alphabet: secondary lengths 0..249
const NUM_SECONDARY_LENGTHS: usize = 249;

const MAINTREE_TABLEBITS: u32 = 12;
const LENGTH_TABLEBITS: u32 = 12;
const ALIGNED_MAXSYMBOLS: usize = 8;
const ALIGNED_TABLEBITS: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockType {
    Invalid,
    Verbatim,
    Aligned,
    Uncompressed,
}

/// Streaming LZX decompressor.
#[derive(Debug)]
pub struct LzxDecompressor<R: Read, W: Write> {
    bits: BitReader<R, Msb>,
    output: W,

    window: Window,
    window_size: usize,
    window_posn: usize,
    frame_posn: usize,
    frame: u32,
    reset_interval: u32,
    is_delta: bool,
    ref_data_size: usize,

    // number of position slots for this window size
    num_offsets: usize,

    // recent match offset cache
    r0: usize,
    r1: usize,
    r2: usize,

    block_type: BlockType,
    block_length: usize,
    block_remaining: usize,
    header_read: bool,

    intel_filesize: i32,
    intel_curpos: i32,
    intel_started: bool,

    pretree: HuffmanTable<Msb>,
    maintree: HuffmanTable<Msb>,
    lengthtree: HuffmanTable<Msb>,
    alignedtree: HuffmanTable<Msb>,

    // frame staging buffer; also where the E8 reversal happens
    frame_buf: Box<[u8]>,
    pending_start: usize,
    pending_end: usize,

    // total bytes delivered to the output sink
    offset: u64,
    // declared total stream length (0 = not declared)
    length: u64,

    poisoned: bool,
}

impl<R: Read, W: Write> LzxDecompressor<R, W> {
    /// Create an LZX stream.
    ///
    /// `window_bits` must be 15-21 (17-25 with `is_delta`).
    /// `reset_interval` is in frames; 0 disables periodic resets.
    /// `output_length` bounds the stream; 0 means not yet known (set it
    /// later with [`LzxDecompressor::set_output_length`] before the final
    /// partial frame is reached).
    pub fn new(
        input: R,
        output: W,
        window_bits: u32,
        reset_interval: u32,
        buffer_size: usize,
        output_length: u64,
        is_delta: bool,
    ) -> Result<Self> {
        let (min, max) = if is_delta { (17, 25) } else { (15, 21) };
        if window_bits < min || window_bits > max {
            return Err(DecrunchError::InvalidWindowBits {
                bits: window_bits,
                min,
                max,
            });
        }
        let window_size = 1usize << window_bits;
        let num_offsets = POSITION_SLOTS[(window_bits - 15) as usize];
        let maintree_syms = NUM_CHARS + (num_offsets << 3);

        let mut stream = Self {
            bits: BitReader::new(input, buffer_size, Fill::LeWord, EofPolicy::ZeroPadOnce)?,
            output,
            window: Window::new(window_size),
            window_size,
            window_posn: 0,
            frame_posn: 0,
            frame: 0,
            reset_interval,
            is_delta,
            ref_data_size: 0,
            num_offsets,
            r0: 1,
            r1: 1,
            r2: 1,
            block_type: BlockType::Invalid,
            block_length: 0,
            block_remaining: 0,
            header_read: false,
            intel_filesize: 0,
            intel_curpos: 0,
            intel_started: false,
            pretree: HuffmanTable::new(
                "pretree",
                lens::PRETREE_NUM_SYMBOLS,
                lens::PRETREE_TABLEBITS,
            ),
            maintree: HuffmanTable::new("maintree", maintree_syms, MAINTREE_TABLEBITS),
            lengthtree: HuffmanTable::new(
                "length",
                NUM_SECONDARY_LENGTHS + 1,
                LENGTH_TABLEBITS,
            ),
            alignedtree: HuffmanTable::new("aligned", ALIGNED_MAXSYMBOLS, ALIGNED_TABLEBITS),
            frame_buf: vec![0u8; FRAME_SIZE].into_boxed_slice(),
            pending_start: 0,
            pending_end: 0,
            offset: 0,
            length: output_length,
            poisoned: false,
        };
        stream.reset_state();
        Ok(stream)
    }

    /// Declare the total decompressed length of the stream.
    pub fn set_output_length(&mut self, length: u64) {
        self.length = length;
    }

    /// Supply DELTA reference data, logically preceding the stream.
    ///
    /// Only valid on DELTA streams, before any output has been produced,
    /// and with at most a window's worth of data.
    pub fn set_reference_data(&mut self, data: &[u8]) -> Result<()> {
        if !self.is_delta {
            return Err(DecrunchError::InvalidConfiguration(
                "only LZX DELTA streams support reference data",
            ));
        }
        if self.offset != 0 || self.frame != 0 {
            return Err(DecrunchError::InvalidConfiguration(
                "too late to set reference data after decoding starts",
            ));
        }
        if data.len() > self.window_size {
            return Err(DecrunchError::InvalidConfiguration(
                "reference data larger than the window",
            ));
        }
        // reference data sits at the tail of the window, just before
        // position 0 in wrap order
        let start = self.window_size - data.len();
        self.window
            .slice_mut(start, self.window_size)
            .copy_from_slice(data);
        self.ref_data_size = data.len();
        Ok(())
    }

    /// Fresh model state: offset cache, block bookkeeping, tree lengths.
    fn reset_state(&mut self) {
        self.r0 = 1;
        self.r1 = 1;
        self.r2 = 1;
        self.header_read = false;
        self.block_remaining = 0;
        self.block_type = BlockType::Invalid;
        // deltas apply against these, so they must start at zero
        self.maintree.lengths_mut().fill(0);
        self.lengthtree.lengths_mut().fill(0);
    }

    /// Decompress exactly `out_bytes` more bytes to the output sink.
    pub fn decompress(&mut self, mut out_bytes: u64) -> Result<()> {
        if self.poisoned {
            return Err(DecrunchError::Poisoned);
        }
        match self.decompress_inner(&mut out_bytes) {
            Ok(()) => Ok(()),
            Err(e) => {
                if e.kind() != ErrorKind::Args {
                    self.poisoned = true;
                }
                Err(e)
            }
        }
    }

    fn decompress_inner(&mut self, out_bytes: &mut u64) -> Result<()> {
        // flush out any stored-up bytes before we begin
        let stored = (self.pending_end - self.pending_start).min(*out_bytes as usize);
        if stored > 0 {
            self.output
                .write_all(&self.frame_buf[self.pending_start..self.pending_start + stored])
                .map_err(DecrunchError::Write)?;
            self.pending_start += stored;
            self.offset += stored as u64;
            *out_bytes -= stored as u64;
        }
        if *out_bytes == 0 {
            return Ok(());
        }

        let end_frame = (self.offset + *out_bytes) / FRAME_SIZE as u64 + 1;

        while u64::from(self.frame) < end_frame {
            // periodic model reset, if the container asked for one
            if self.reset_interval != 0 && self.frame % self.reset_interval == 0 {
                if self.block_remaining > 0 {
                    // this is a file format error, but make a best effort
                    log::warn!("{} bytes remaining at reset interval", self.block_remaining);
                }
                self.reset_state();
            }

            // LZX DELTA streams carry a 16-bit chunk size per frame
            if self.is_delta {
                self.bits.ensure_bits(16)?;
                self.bits.remove_bits(16);
            }

            // one-time stream header: E8 translation size
            if !self.header_read {
                let mut intel = 0;
                if self.bits.read_bits(1)? != 0 {
                    let hi = self.bits.read_bits(16)?;
                    let lo = self.bits.read_bits(16)?;
                    intel = ((hi << 16) | lo) as i32;
                }
                self.intel_filesize = intel;
                self.header_read = true;
            }

            // all frames are 32 KiB except a declared-length final frame
            let mut frame_size = FRAME_SIZE as u64;
            if self.length != 0 && (self.length - self.offset) < frame_size {
                frame_size = self.length - self.offset;
            }
            let frame_size = frame_size as usize;

            // decode bytes until this frame is complete
            let mut bytes_todo = (self.frame_posn + frame_size - self.window_posn) as i64;
            while bytes_todo > 0 {
                if self.block_remaining == 0 {
                    self.read_block_header()?;
                }

                let mut this_run = self.block_remaining.min(bytes_todo as usize) as i64;
                bytes_todo -= this_run;
                self.block_remaining -= this_run as usize;

                this_run = match self.block_type {
                    BlockType::Verbatim => self.decode_lz_run(this_run, false)?,
                    BlockType::Aligned => self.decode_lz_run(this_run, true)?,
                    BlockType::Uncompressed => {
                        let posn = self.window_posn;
                        let run = this_run as usize;
                        self.bits.read_raw(self.window.slice_mut(posn, posn + run))?;
                        self.window_posn += run;
                        0
                    }
                    BlockType::Invalid => {
                        return Err(DecrunchError::Corrupt("block body before header"))
                    }
                };

                // the final match may overrun the requested run length
                if this_run < 0 {
                    let overrun = (-this_run) as usize;
                    if overrun > self.block_remaining {
                        return Err(DecrunchError::Corrupt("match overran the block end"));
                    }
                    self.block_remaining -= overrun;
                }
            }

            // streams don't extend over frame boundaries
            if self.window_posn - self.frame_posn != frame_size {
                return Err(DecrunchError::Corrupt("decode beyond output frame limits"));
            }

            // re-align the bitstream to a 16-bit boundary
            self.bits.realign_to_word()?;

            // the previous frame must be fully consumed before staging this one
            if self.pending_start != self.pending_end {
                return Err(DecrunchError::Corrupt("previous frame not consumed"));
            }

            self.stage_frame(frame_size);

            // write out as much of the frame as this call needs
            let run = (*out_bytes as usize).min(frame_size);
            self.output
                .write_all(&self.frame_buf[..run])
                .map_err(DecrunchError::Write)?;
            self.pending_start = run;
            self.pending_end = frame_size;
            self.offset += run as u64;
            *out_bytes -= run as u64;

            self.frame_posn += frame_size;
            self.frame += 1;

            if self.window_posn == self.window_size {
                self.window_posn = 0;
            }
            if self.frame_posn == self.window_size {
                self.frame_posn = 0;
            }
        }

        if *out_bytes != 0 {
            return Err(DecrunchError::Corrupt("bytes left to output at stream end"));
        }
        Ok(())
    }

    /// Read a block header and its tree updates.
    fn read_block_header(&mut self) -> Result<()> {
        // an odd-length uncompressed block is padded to even
        if self.block_type == BlockType::Uncompressed && (self.block_length & 1) == 1 {
            self.bits.read_raw_byte()?;
        }

        let raw_type = self.bits.read_bits(3)?;
        let hi = self.bits.read_bits(16)?;
        let lo = self.bits.read_bits(8)?;
        self.block_length = ((hi << 8) | lo) as usize;
        self.block_remaining = self.block_length;

        self.block_type = match raw_type {
            1 => BlockType::Verbatim,
            2 => BlockType::Aligned,
            3 => BlockType::Uncompressed,
            other => return Err(DecrunchError::BadBlockType(other)),
        };

        match self.block_type {
            BlockType::Aligned | BlockType::Verbatim => {
                if self.block_type == BlockType::Aligned {
                    // the aligned tree precedes the main tree; the
                    // published ordering in the LZX document is wrong
                    for i in 0..ALIGNED_MAXSYMBOLS {
                        self.alignedtree.lengths_mut()[i] = self.bits.read_bits(3)? as u8;
                    }
                    self.alignedtree.build()?;
                }

                lens::read_lens(
                    &mut self.bits,
                    &mut self.pretree,
                    self.maintree.lengths_mut(),
                    0,
                    NUM_CHARS,
                )?;
                lens::read_lens(
                    &mut self.bits,
                    &mut self.pretree,
                    self.maintree.lengths_mut(),
                    NUM_CHARS,
                    NUM_CHARS + (self.num_offsets << 3),
                )?;
                self.maintree.build()?;
                // a reachable 0xE8 literal arms the Intel transform
                if self.maintree.lengths()[0xE8] != 0 {
                    self.intel_started = true;
                }

                lens::read_lens(
                    &mut self.bits,
                    &mut self.pretree,
                    self.lengthtree.lengths_mut(),
                    0,
                    NUM_SECONDARY_LENGTHS,
                )?;
                self.lengthtree.build_allow_empty()?;
            }
            BlockType::Uncompressed => {
                // can't rule out an E8 byte in raw data
                self.intel_started = true;

                self.bits.realign_discard()?;
                let mut cache = [0u8; 12];
                self.bits.read_raw(&mut cache)?;
                self.r0 = u32::from_le_bytes([cache[0], cache[1], cache[2], cache[3]]) as usize;
                self.r1 = u32::from_le_bytes([cache[4], cache[5], cache[6], cache[7]]) as usize;
                self.r2 = u32::from_le_bytes([cache[8], cache[9], cache[10], cache[11]]) as usize;
            }
            BlockType::Invalid => unreachable!(),
        }
        Ok(())
    }

    /// Decode literals and matches until `this_run` bytes are produced.
    ///
    /// Returns the (possibly negative) remaining run count; a final match
    /// may legally overshoot into the next portion of the block.
    fn decode_lz_run(&mut self, mut this_run: i64, aligned: bool) -> Result<i64> {
        while this_run > 0 {
            let main_element = self.maintree.read_symbol(&mut self.bits)? as usize;
            if main_element < NUM_CHARS {
                self.window.put(self.window_posn, main_element as u8);
                self.window_posn += 1;
                this_run -= 1;
                continue;
            }

            // match: low 3 bits hold the length header, the rest the slot
            let main_element = main_element - NUM_CHARS;

            let mut match_length = main_element & NUM_PRIMARY_LENGTHS;
            if match_length == NUM_PRIMARY_LENGTHS {
                match_length += self.lengthtree.read_symbol(&mut self.bits)? as usize;
            }
            match_length += MIN_MATCH;

            let slot = main_element >> 3;
            let match_offset = match slot {
                0 => self.r0,
                1 => {
                    let offset = self.r1;
                    self.r1 = self.r0;
                    self.r0 = offset;
                    offset
                }
                2 => {
                    let offset = self.r2;
                    self.r2 = self.r0;
                    self.r0 = offset;
                    offset
                }
                3 => {
                    self.r2 = self.r1;
                    self.r1 = self.r0;
                    self.r0 = 1;
                    1
                }
                _ => {
                    let extra = footer_bits(slot);
                    let offset = if aligned {
                        let mut offset = POSITION_BASE[slot] as usize - 2;
                        if extra > 3 {
                            // verbatim bits, then a 3-bit aligned symbol
                            offset +=
                                (self.bits.read_many_bits(extra - 3)? as usize) << 3;
                            offset += self.alignedtree.read_symbol(&mut self.bits)? as usize;
                        } else if extra == 3 {
                            // aligned bits only
                            offset += self.alignedtree.read_symbol(&mut self.bits)? as usize;
                        } else {
                            // extra is 1 or 2: verbatim bits only
                            offset += self.bits.read_bits(extra)? as usize;
                        }
                        offset
                    } else {
                        POSITION_BASE[slot] as usize - 2
                            + self.bits.read_many_bits(extra)? as usize
                    };
                    self.r2 = self.r1;
                    self.r1 = self.r0;
                    self.r0 = offset;
                    offset
                }
            };

            // DELTA streams extend a maximum-length match even further
            if self.is_delta && match_length == MAX_MATCH {
                match_length += self.read_extended_length()?;
            }

            if self.window_posn + match_length > self.window_size {
                return Err(DecrunchError::Corrupt("match ran over window wrap"));
            }

            if match_offset > self.window_posn {
                // reaches back past the window start: only legal within
                // supplied reference data
                let behind = match_offset - self.window_posn;
                if match_offset as u64 > self.offset && behind > self.ref_data_size {
                    return Err(DecrunchError::InvalidMatchOffset {
                        offset: match_offset as u32,
                        position: self.window_posn as u32,
                    });
                }
                if behind > self.window_size {
                    return Err(DecrunchError::InvalidMatchOffset {
                        offset: match_offset as u32,
                        position: self.window_posn as u32,
                    });
                }
            }

            self.window
                .copy_match(self.window_posn, match_offset, match_length);
            self.window_posn += match_length;
            this_run -= match_length as i64;
        }
        Ok(this_run)
    }

    /// DELTA extended match length: a 4-leaf prefix code selecting how
    /// many extra length bits follow.
    fn read_extended_length(&mut self) -> Result<usize> {
        self.bits.ensure_bits(3)?;
        Ok(if self.bits.peek_bits(1) == 0 {
            self.bits.remove_bits(1);
            self.bits.read_bits(8)? as usize
        } else if self.bits.peek_bits(2) == 2 {
            self.bits.remove_bits(2);
            self.bits.read_bits(10)? as usize + 0x100
        } else if self.bits.peek_bits(3) == 6 {
            self.bits.remove_bits(3);
            self.bits.read_bits(12)? as usize + 0x500
        } else {
            self.bits.remove_bits(3);
            self.bits.read_bits(15)? as usize
        })
    }

    /// Copy the finished frame into the staging buffer and undo the E8
    /// transform there if it is active for this frame.
    fn stage_frame(&mut self, frame_size: usize) {
        self.frame_buf[..frame_size]
            .copy_from_slice(self.window.slice(self.frame_posn, self.frame_posn + frame_size));

        let transform = self.intel_started
            && self.intel_filesize != 0
            && self.frame <= 32768
            && frame_size > 10;
        if transform {
            let buf = &mut self.frame_buf;
            let filesize = self.intel_filesize;
            let mut curpos = self.intel_curpos;
            let mut i = 0;
            while i < frame_size - 10 {
                if buf[i] != 0xE8 {
                    i += 1;
                    curpos += 1;
                    continue;
                }
                let abs_off = (u32::from(buf[i + 1])
                    | (u32::from(buf[i + 2]) << 8)
                    | (u32::from(buf[i + 3]) << 16)
                    | (u32::from(buf[i + 4]) << 24)) as i32;
                if abs_off >= -curpos && abs_off < filesize {
                    let rel_off = if abs_off >= 0 {
                        abs_off.wrapping_sub(curpos)
                    } else {
                        abs_off.wrapping_add(filesize)
                    };
                    buf[i + 1] = rel_off as u8;
                    buf[i + 2] = (rel_off >> 8) as u8;
                    buf[i + 3] = (rel_off >> 16) as u8;
                    buf[i + 4] = (rel_off >> 24) as u8;
                }
                i += 5;
                curpos += 5;
            }
            self.intel_curpos += frame_size as i32;
        } else if self.intel_filesize != 0 {
            self.intel_curpos += frame_size as i32;
        }
    }
}

/// Decompress `out_length` bytes from an in-memory LZX stream.
pub fn lzx_decompress_bytes(data: &[u8], window_bits: u32, out_length: u64) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(out_length as usize);
    let mut stream = LzxDecompressor::new(
        data,
        &mut output,
        window_bits,
        0,
        DEFAULT_INPUT_SIZE,
        out_length,
        false,
    )?;
    stream.decompress(out_length)?;
    Ok(output)
}
