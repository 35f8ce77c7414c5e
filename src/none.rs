//! The no-op "stored" codec
//!
//! Archive containers mark some members as not compressed at all; those
//! still go through the same decompressor interface so the container code
//! has a single code path. This codec just moves bytes.

use std::io::{Read, Write};

use crate::common::{checked_input_size, DecrunchError, Result, DEFAULT_INPUT_SIZE};

/// Pass-through decompressor for stored (uncompressed) streams.
#[derive(Debug)]
pub struct NoneDecompressor<R, W> {
    input: R,
    output: W,
    buffer: Box<[u8]>,
}

impl<R: Read, W: Write> NoneDecompressor<R, W> {
    /// Create a pass-through stream with the given copy buffer size.
    pub fn new(input: R, output: W, buffer_size: usize) -> Result<Self> {
        let buffer_size = checked_input_size(buffer_size)?;
        Ok(Self {
            input,
            output,
            buffer: vec![0u8; buffer_size].into_boxed_slice(),
        })
    }

    /// Copy exactly `out_bytes` bytes from input to output.
    pub fn decompress(&mut self, mut out_bytes: u64) -> Result<()> {
        while out_bytes > 0 {
            let run = (self.buffer.len() as u64).min(out_bytes) as usize;
            self.input
                .read_exact(&mut self.buffer[..run])
                .map_err(|e| match e.kind() {
                    std::io::ErrorKind::UnexpectedEof => DecrunchError::UnexpectedEof,
                    _ => DecrunchError::Read(e),
                })?;
            self.output
                .write_all(&self.buffer[..run])
                .map_err(DecrunchError::Write)?;
            out_bytes -= run as u64;
        }
        Ok(())
    }
}

/// Copy `data` through the stored codec.
pub fn none_decompress_bytes(data: &[u8]) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(data.len());
    let mut copier = NoneDecompressor::new(data, &mut output, DEFAULT_INPUT_SIZE)?;
    copier.decompress(data.len() as u64)?;
    Ok(output)
}
