//! Quantum decompression
//!
//! Quantum drives an arithmetic (range) coder over eight adaptive
//! frequency models: a 7-symbol selector model, four 64-symbol literal
//! models covering one quarter of the byte space each, two fixed-length
//! match models (3 and 4 bytes) and a variable-length match model with
//! its own length sub-model. Output is produced in 32 KiB frames; each
//! frame ends with a byte realignment and a 0xFF resync trailer injected
//! by the container.
//!
//! The decoded window doubles as the output staging area, so a match
//! that crosses the window end forces a flush mid-request.

mod model;

use std::io::{Read, Write};

use crate::bits::{BitReader, EofPolicy, Fill, Msb};
use crate::common::{DecrunchError, ErrorKind, Result, DEFAULT_INPUT_SIZE, FRAME_SIZE};
use crate::tables::qtm::{EXTRA_BITS, LENGTH_BASE, LENGTH_EXTRA, POSITION_BASE};
use crate::window::Window;

use model::Model;

/// Decode one symbol from `m`, narrowing the `[low, high]` interval and
/// renormalizing bit by bit. Mutates the model's frequencies.
fn get_symbol<R: Read>(
    m: &mut Model,
    bits: &mut BitReader<R, Msb>,
    h: &mut u16,
    l: &mut u16,
    c: &mut u16,
) -> Result<u16> {
    let range = ((i32::from(*h) - i32::from(*l)) & 0xFFFF) + 1;
    let symf = (((i32::from(*c) - i32::from(*l) + 1) * i32::from(m.total()) - 1) / range) & 0xFFFF;

    let i = m.lookup(symf);
    let sym = m.sym(i - 1);

    let range = i32::from(*h) - i32::from(*l) + 1;
    let total = i32::from(m.total());
    *h = (i32::from(*l) + (i32::from(m.cumfreq(i - 1)) * range) / total - 1) as u16;
    *l = (i32::from(*l) + (i32::from(m.cumfreq(i)) * range) / total) as u16;

    m.update(i);

    loop {
        if (*l & 0x8000) != (*h & 0x8000) {
            if (*l & 0x4000) != 0 && (*h & 0x4000) == 0 {
                // underflow: pinch out the middle bit
                *c ^= 0x4000;
                *l &= 0x3FFF;
                *h |= 0x4000;
            } else {
                break;
            }
        }
        *l <<= 1;
        *h = (*h << 1) | 1;
        bits.ensure_bits(1)?;
        *c = (*c << 1) | (bits.peek_bits(1) as u16);
        bits.remove_bits(1);
    }
    Ok(sym)
}

/// Streaming Quantum decompressor.
#[derive(Debug)]
pub struct QtmDecompressor<R: Read, W: Write> {
    bits: BitReader<R, Msb>,
    output: W,

    window: Window,
    window_size: usize,
    window_posn: usize,
    frame_todo: usize,
    header_read: bool,

    // range coder registers
    high: u16,
    low: u16,
    code: u16,

    model0: Model,
    model1: Model,
    model2: Model,
    model3: Model,
    model4: Model,
    model5: Model,
    model6: Model,
    model6len: Model,
    model7: Model,

    // staged output inside the window
    pending_start: usize,
    pending_end: usize,

    poisoned: bool,
}

impl<R: Read, W: Write> QtmDecompressor<R, W> {
    /// Create a Quantum stream. `window_bits` must be 10-21.
    pub fn new(input: R, output: W, window_bits: u32, buffer_size: usize) -> Result<Self> {
        if !(10..=21).contains(&window_bits) {
            return Err(DecrunchError::InvalidWindowBits {
                bits: window_bits,
                min: 10,
                max: 21,
            });
        }
        let window_size = 1usize << window_bits;
        let msz = (window_bits as usize) * 2;
        Ok(Self {
            bits: BitReader::new(input, buffer_size, Fill::Byte, EofPolicy::ZeroPadOnce)?,
            output,
            window: Window::new(window_size),
            window_size,
            window_posn: 0,
            frame_todo: FRAME_SIZE,
            header_read: false,
            high: 0xFFFF,
            low: 0,
            code: 0,
            model0: Model::new(0x00, 64),
            model1: Model::new(0x40, 64),
            model2: Model::new(0x80, 64),
            model3: Model::new(0xC0, 64),
            model4: Model::new(0, msz.min(24)),
            model5: Model::new(0, msz.min(36)),
            model6: Model::new(0, msz),
            model6len: Model::new(0, 27),
            model7: Model::new(0, 7),
            pending_start: 0,
            pending_end: 0,
            poisoned: false,
        })
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
                .write_all(
                    self.window
                        .slice(self.pending_start, self.pending_start + stored),
                )
                .map_err(DecrunchError::Write)?;
            self.pending_start += stored;
            *out_bytes -= stored as u64;
        }
        if *out_bytes == 0 {
            return Ok(());
        }

        let mut h = self.high;
        let mut l = self.low;
        let mut c = self.code;
        let mut window_posn = self.window_posn;
        let mut frame_todo = self.frame_todo;

        while ((self.pending_end - self.pending_start) as u64) < *out_bytes {
            // per-frame header seeds the range coder registers
            if !self.header_read {
                h = 0xFFFF;
                l = 0;
                c = self.bits.read_bits(16)? as u16;
                self.header_read = true;
            }

            // decode up to the bytes needed, the frame boundary, or the
            // window boundary, whichever is nearest
            let needed = *out_bytes as usize - (self.pending_end - self.pending_start);
            let mut frame_end = window_posn + needed;
            if window_posn + frame_todo < frame_end {
                frame_end = window_posn + frame_todo;
            }
            if frame_end > self.window_size {
                frame_end = self.window_size;
            }

            while window_posn < frame_end {
                let selector = get_symbol(&mut self.model7, &mut self.bits, &mut h, &mut l, &mut c)?;
                if selector < 4 {
                    let literal_model = match selector {
                        0 => &mut self.model0,
                        1 => &mut self.model1,
                        2 => &mut self.model2,
                        _ => &mut self.model3,
                    };
                    let sym = get_symbol(literal_model, &mut self.bits, &mut h, &mut l, &mut c)?;
                    self.window.put(window_posn, sym as u8);
                    window_posn += 1;
                    frame_todo -= 1;
                    continue;
                }

                let (match_offset, match_length) = match selector {
                    4 => {
                        // fixed 3-byte match
                        let sym = get_symbol(&mut self.model4, &mut self.bits, &mut h, &mut l, &mut c)?
                            as usize;
                        let extra = self.bits.read_many_bits(u32::from(EXTRA_BITS[sym]))? as usize;
                        (POSITION_BASE[sym] as usize + extra + 1, 3)
                    }
                    5 => {
                        // fixed 4-byte match
                        let sym = get_symbol(&mut self.model5, &mut self.bits, &mut h, &mut l, &mut c)?
                            as usize;
                        let extra = self.bits.read_many_bits(u32::from(EXTRA_BITS[sym]))? as usize;
                        (POSITION_BASE[sym] as usize + extra + 1, 4)
                    }
                    6 => {
                        // variable length match: length first, then offset
                        let sym =
                            get_symbol(&mut self.model6len, &mut self.bits, &mut h, &mut l, &mut c)?
                                as usize;
                        let extra =
                            self.bits.read_many_bits(u32::from(LENGTH_EXTRA[sym]))? as usize;
                        let length = usize::from(LENGTH_BASE[sym]) + extra + 5;

                        let sym = get_symbol(&mut self.model6, &mut self.bits, &mut h, &mut l, &mut c)?
                            as usize;
                        let extra = self.bits.read_many_bits(u32::from(EXTRA_BITS[sym]))? as usize;
                        (POSITION_BASE[sym] as usize + extra + 1, length)
                    }
                    _ => return Err(DecrunchError::InvalidSymbol(u32::from(selector))),
                };

                frame_todo = frame_todo.wrapping_sub(match_length);

                if window_posn + match_length > self.window_size {
                    // the match crosses the window end: copy the head,
                    // flush everything up to the window end, then copy
                    // the tail at the window start
                    let head = self.window_size - window_posn;
                    self.window.copy_match(window_posn, match_offset, head);

                    let flush = self.window_size - self.pending_start;
                    if flush as u64 > *out_bytes {
                        // can't flush past the caller's request and can't
                        // leave the match half-copied either
                        return Err(DecrunchError::Corrupt(
                            "window wrap while output backlogged",
                        ));
                    }
                    self.output
                        .write_all(self.window.slice(self.pending_start, self.window_size))
                        .map_err(DecrunchError::Write)?;
                    *out_bytes -= flush as u64;
                    self.pending_start = 0;
                    self.pending_end = 0;

                    self.window.copy_match(0, match_offset, match_length - head);
                    window_posn = match_length - head;
                } else {
                    self.window.copy_match(window_posn, match_offset, match_length);
                    window_posn += match_length;
                }
            }

            self.pending_end = window_posn;

            // a match overshooting the frame is a format violation; the
            // subtraction above wraps in that case
            if frame_todo > FRAME_SIZE {
                return Err(DecrunchError::Corrupt("overshot frame alignment"));
            }

            // frame finished: realign and consume the resync trailer
            if frame_todo == 0 {
                self.bits.align_to_byte();
                while self.bits.read_bits(8)? != 0xFF {}
                self.header_read = false;
                frame_todo = FRAME_SIZE;
            }

            if window_posn == self.window_size {
                // flush all currently stored data, unless it already
                // satisfies the request
                let avail = self.pending_end - self.pending_start;
                if avail as u64 >= *out_bytes {
                    break;
                }
                if avail > 0 {
                    self.output
                        .write_all(self.window.slice(self.pending_start, self.pending_end))
                        .map_err(DecrunchError::Write)?;
                }
                *out_bytes -= avail as u64;
                self.pending_start = 0;
                self.pending_end = 0;
                window_posn = 0;
            }
        }

        if *out_bytes > 0 {
            let n = *out_bytes as usize;
            self.output
                .write_all(self.window.slice(self.pending_start, self.pending_start + n))
                .map_err(DecrunchError::Write)?;
            self.pending_start += n;
            *out_bytes = 0;
        }

        self.high = h;
        self.low = l;
        self.code = c;
        self.window_posn = window_posn;
        self.frame_todo = frame_todo;
        Ok(())
    }
}

/// Decompress `out_length` bytes from an in-memory Quantum stream.
pub fn qtm_decompress_bytes(data: &[u8], window_bits: u32, out_length: u64) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(out_length as usize);
    let mut stream = QtmDecompressor::new(data, &mut output, window_bits, DEFAULT_INPUT_SIZE)?;
    stream.decompress(out_length)?;
    Ok(output)
}
