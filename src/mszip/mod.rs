//! MSZIP decompression
//!
//! MSZIP wraps DEFLATE in 32 KiB frames, each introduced by a literal
//! two-byte `CK` marker after byte realignment. The window survives
//! across frames so matches may reach back into the previous frame, but
//! every frame restarts its DEFLATE block chain and code tables.
//!
//! An optional repair mode papers over corrupt frames: the damaged frame
//! is zero-filled, a diagnostic is logged, and decoding continues with
//! the next frame. Read and write failures stay fatal even then.

mod inflate;

use std::io::{Read, Write};

use crate::bits::{BitReader, EofPolicy, Fill, Lsb};
use crate::common::{DecrunchError, ErrorKind, Result, DEFAULT_INPUT_SIZE, FRAME_SIZE};

use inflate::InflateState;

/// Streaming MSZIP decompressor.
#[derive(Debug)]
pub struct MszipDecompressor<R: Read, W: Write> {
    bits: BitReader<R, Lsb>,
    output: W,
    state: InflateState,
    repair: bool,
    // a resync scan consumes the next frame's marker ahead of time
    marker_pending: bool,
    pending_start: usize,
    pending_end: usize,
    poisoned: bool,
}

impl<R: Read, W: Write> MszipDecompressor<R, W> {
    /// Create an MSZIP stream.
    ///
    /// `buffer_size` is the input read granularity; `repair` enables the
    /// lossy frame-recovery policy.
    pub fn new(input: R, output: W, buffer_size: usize, repair: bool) -> Result<Self> {
        Ok(Self {
            bits: BitReader::new(input, buffer_size, Fill::Byte, EofPolicy::ZeroPadOnce)?,
            output,
            state: InflateState::new(),
            repair,
            marker_pending: false,
            pending_start: 0,
            pending_end: 0,
            poisoned: false,
        })
    }

    /// Decompress exactly `out_bytes` more bytes to the output sink.
    ///
    /// Overproduced frame bytes are buffered and satisfy later calls
    /// first.
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
                    self.state
                        .window
                        .slice(self.pending_start, self.pending_start + stored),
                )
                .map_err(DecrunchError::Write)?;
            self.pending_start += stored;
            *out_bytes -= stored as u64;
        }

        while *out_bytes > 0 {
            let have_frame = self.read_frame_marker()?;

            // unpack one frame
            self.state.window_posn = 0;
            self.state.bytes_output = 0;
            if !have_frame {
                // the marker never showed up, so the whole frame it
                // introduced is lost; emit its 32 KiB as zeros to keep
                // later frames at their expected output offsets
                log::warn!("MSZIP error, {FRAME_SIZE} bytes of data lost: missing frame marker");
                self.state.window.slice_mut(0, FRAME_SIZE).fill(0);
                self.state.bytes_output = FRAME_SIZE;
            } else {
                match inflate::inflate(&mut self.bits, &mut self.state) {
                    Ok(()) => {}
                    // read/write problems are fatal even in repair mode
                    Err(e) if matches!(e.kind(), ErrorKind::Read | ErrorKind::Write) => {
                        return Err(e)
                    }
                    Err(e) => {
                        if !self.repair {
                            return Err(e);
                        }
                        log::warn!(
                            "MSZIP error, {} bytes of data lost: {e}",
                            FRAME_SIZE - self.state.bytes_output
                        );
                        let lost_from = self.state.bytes_output;
                        self.state.window.slice_mut(lost_from, FRAME_SIZE).fill(0);
                        self.state.bytes_output = FRAME_SIZE;
                    }
                }
            }
            self.pending_start = 0;
            self.pending_end = self.state.bytes_output;

            // write out as much of the frame as this call needs
            let run = (*out_bytes as usize).min(self.state.bytes_output);
            self.output
                .write_all(self.state.window.slice(0, run))
                .map_err(DecrunchError::Write)?;
            self.pending_start = run;
            *out_bytes -= run as u64;
        }
        Ok(())
    }

    /// Byte-align and check the two-byte `CK` frame marker.
    ///
    /// Returns true when the marker is where it belongs. In repair mode a
    /// misplaced marker means the frame is lost: the scan hunts forward
    /// to the next `CK` pair (held over for the following frame) and
    /// reports false so the caller can zero-fill.
    fn read_frame_marker(&mut self) -> Result<bool> {
        if self.marker_pending {
            self.marker_pending = false;
            return Ok(true);
        }
        self.bits.align_to_byte();
        let mut state = 0;
        let mut seen = 0u32;
        loop {
            let c = self.bits.read_bits(8)?;
            seen += 1;
            if state == 1 && c == u32::from(b'K') {
                if seen == 2 {
                    return Ok(true);
                }
                self.marker_pending = true;
                return Ok(false);
            }
            state = u32::from(c == u32::from(b'C'));
            if seen >= 2 && !self.repair {
                return Err(DecrunchError::MissingBlockMarker);
            }
        }
    }
}

/// Decompress `out_length` bytes from an in-memory MSZIP stream.
pub fn mszip_decompress_bytes(data: &[u8], out_length: u64, repair: bool) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(out_length as usize);
    let mut stream = MszipDecompressor::new(data, &mut output, DEFAULT_INPUT_SIZE, repair)?;
    stream.decompress(out_length)?;
    Ok(output)
}
