//! LZSS decompression
//!
//! The oldest codec in the family: a control byte selects literal or match
//! for each of its 8 bits, matches are 2-byte `(position, length)` pairs
//! into a 4 KiB ring pre-filled with spaces. Three historical dialects
//! exist; they differ only in whether the control byte is bit-inverted and
//! in the ring's starting write position.
//!
//! LZSS streams carry no end marker. The stream is over when the input
//! runs out, so input exhaustion mid-loop is success, not an error.

use std::io::{Read, Write};

use crate::common::{DecrunchError, Result, DEFAULT_INPUT_SIZE, LZSS_WINDOW_SIZE};

/// Ring pre-fill byte (ASCII space)
const WINDOW_FILL: u8 = 0x20;

/// Which historical LZSS dialect to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LzssMode {
    /// The generic dialect used by EXPAND.EXE-era archives
    Expand,
    /// MS Help files; the control byte is stored bit-inverted
    MsHelp,
    /// QBasic's variant; the ring starts two bytes earlier
    QBasic,
}

/// Byte-at-a-time input with a refill buffer, reporting EOF as `None`.
#[derive(Debug)]
struct ByteSource<R> {
    source: R,
    buffer: Box<[u8]>,
    pos: usize,
    len: usize,
}

impl<R: Read> ByteSource<R> {
    fn new(source: R, buffer_size: usize) -> Self {
        Self {
            source,
            buffer: vec![0u8; buffer_size].into_boxed_slice(),
            pos: 0,
            len: 0,
        }
    }

    fn next(&mut self) -> Result<Option<u8>> {
        if self.pos >= self.len {
            loop {
                match self.source.read(&mut self.buffer) {
                    Ok(0) => return Ok(None),
                    Ok(n) => {
                        self.len = n;
                        self.pos = 0;
                        break;
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(DecrunchError::Read(e)),
                }
            }
        }
        let b = self.buffer[self.pos];
        self.pos += 1;
        Ok(Some(b))
    }
}

/// Decompress an LZSS stream until the input is exhausted.
pub fn lzss_decompress<R: Read, W: Write>(input: R, mut output: W, mode: LzssMode) -> Result<()> {
    let mut source = ByteSource::new(input, DEFAULT_INPUT_SIZE);
    let mut window = [WINDOW_FILL; LZSS_WINDOW_SIZE];
    let mut pos = match mode {
        LzssMode::QBasic => LZSS_WINDOW_SIZE - 18,
        _ => LZSS_WINDOW_SIZE - 16,
    };
    let invert = if mode == LzssMode::MsHelp { 0xFF } else { 0x00 };

    // staged output, flushed when full
    let mut out_buf = Vec::with_capacity(LZSS_WINDOW_SIZE);

    'stream: loop {
        let control = match source.next()? {
            Some(c) => c ^ invert,
            None => break 'stream,
        };
        for bit in 0..8 {
            if control & (1 << bit) != 0 {
                // literal
                let c = match source.next()? {
                    Some(c) => c,
                    None => break 'stream,
                };
                window[pos] = c;
                pos = (pos + 1) & (LZSS_WINDOW_SIZE - 1);
                out_buf.push(c);
            } else {
                // match: 12-bit absolute ring position, 4-bit length
                let b0 = match source.next()? {
                    Some(c) => c,
                    None => break 'stream,
                };
                let b1 = match source.next()? {
                    Some(c) => c,
                    None => break 'stream,
                };
                let mut mpos = usize::from(b0) | (usize::from(b1 & 0xF0) << 4);
                let len = usize::from(b1 & 0x0F) + 3;
                for _ in 0..len {
                    let c = window[mpos];
                    mpos = (mpos + 1) & (LZSS_WINDOW_SIZE - 1);
                    window[pos] = c;
                    pos = (pos + 1) & (LZSS_WINDOW_SIZE - 1);
                    out_buf.push(c);
                }
            }
            if out_buf.len() >= LZSS_WINDOW_SIZE {
                output.write_all(&out_buf).map_err(DecrunchError::Write)?;
                out_buf.clear();
            }
        }
    }

    if !out_buf.is_empty() {
        output.write_all(&out_buf).map_err(DecrunchError::Write)?;
    }
    output.flush().map_err(DecrunchError::Write)?;
    Ok(())
}

/// Decompress an in-memory LZSS stream.
pub fn lzss_decompress_bytes(data: &[u8], mode: LzssMode) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    lzss_decompress(data, &mut output, mode)?;
    Ok(output)
}
