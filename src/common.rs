//! Common types and constants for the decompression engine
//!
//! This module defines the error type, the coarse error taxonomy exposed to
//! container layers, and the constants shared by more than one codec.

use thiserror::Error;

/// Coarse error category, the contract a container layer dispatches on.
///
/// Every [`DecrunchError`] variant maps onto exactly one kind via
/// [`DecrunchError::kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad configuration passed to a constructor
    Args,
    /// Failure reading from the input source
    Read,
    /// Failure (or short write) on the output sink
    Write,
    /// Malformed headers or markers in the compressed stream
    DataFormat,
    /// Invalid compressed data encountered mid-decode
    Decrunch,
    /// Ran out of real input; only synthetic padding remains
    NoMemory,
}

/// Error type for decompression operations
#[derive(Debug, Error)]
pub enum DecrunchError {
    /// Window size exponent outside the format's legal range
    #[error("Invalid window bits: {bits} (expected {min} to {max})")]
    InvalidWindowBits {
        /// The rejected exponent
        bits: u32,
        /// Smallest legal exponent for this format
        min: u32,
        /// Largest legal exponent for this format
        max: u32,
    },

    /// Input buffer size below the minimum of 2 bytes
    #[error("Invalid input buffer size: {0} (minimum is 2)")]
    InvalidBufferSize(usize),

    /// A constructor or setter was called with inconsistent parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(&'static str),

    /// I/O error while reading compressed input
    #[error("Read error: {0}")]
    Read(#[source] std::io::Error),

    /// Input ran out and the synthetic zero padding was consumed too
    #[error("Unexpected end of input")]
    UnexpectedEof,

    /// I/O error (or short write) while writing decompressed output
    #[error("Write error: {0}")]
    Write(#[source] std::io::Error),

    /// An MSZIP frame did not start with the 'CK' marker
    #[error("Missing 'CK' block marker")]
    MissingBlockMarker,

    /// A block header carried an undefined block type tag
    #[error("Invalid block type: {0}")]
    BadBlockType(u32),

    /// A stored block's length did not match its one's-complement copy
    #[error("Stored block length does not match its complement")]
    BadStoredLength,

    /// A canonical Huffman length set overflowed or underfilled its table
    #[error("Corrupt Huffman code lengths in {0} tree")]
    CorruptHuffmanTable(&'static str),

    /// A symbol was requested from a tree with no codes at all
    #[error("Symbol requested from empty {0} tree")]
    EmptyHuffmanTree(&'static str),

    /// Bit pattern matched no code during long-code traversal
    #[error("Invalid Huffman code in {0} tree")]
    InvalidHuffmanCode(&'static str),

    /// A literal/length or distance symbol outside the format's range
    #[error("Invalid symbol code: {0}")]
    InvalidSymbol(u32),

    /// A match tried to copy from before the start of available data
    #[error("Match offset {offset} out of range at window position {position}")]
    InvalidMatchOffset {
        /// Decoded backward offset
        offset: u32,
        /// Window write position when the match was decoded
        position: u32,
    },

    /// Decoded data overran a frame or window boundary
    #[error("Decoded data overruns the frame boundary")]
    FrameOverflow,

    /// Miscellaneous invalid compressed data
    #[error("Decompression error: {0}")]
    Corrupt(&'static str),

    /// Input exhausted with only synthetic padding left (benign for KWAJ)
    #[error("Input exhausted; only padding remains")]
    InputExhausted,

    /// The stream already failed; decompression cannot be resumed
    #[error("Stream is unusable after a previous error")]
    Poisoned,
}

impl DecrunchError {
    /// Map this error onto the coarse taxonomy used by container layers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DecrunchError::InvalidWindowBits { .. }
            | DecrunchError::InvalidBufferSize(_)
            | DecrunchError::InvalidConfiguration(_) => ErrorKind::Args,
            DecrunchError::Read(_) | DecrunchError::UnexpectedEof => ErrorKind::Read,
            DecrunchError::Write(_) => ErrorKind::Write,
            DecrunchError::MissingBlockMarker | DecrunchError::BadStoredLength => {
                ErrorKind::DataFormat
            }
            DecrunchError::InputExhausted => ErrorKind::NoMemory,
            _ => ErrorKind::Decrunch,
        }
    }
}

/// Result type alias for decompression operations
pub type Result<T> = std::result::Result<T, DecrunchError>;

/// Frame size shared by the MSZIP, LZX and Quantum codecs (32 KiB)
pub const FRAME_SIZE: usize = 0x8000;

/// LZSS and KWAJ ring buffer size (4 KiB)
pub const LZSS_WINDOW_SIZE: usize = 4096;

/// Default input buffer size used by the convenience functions
pub const DEFAULT_INPUT_SIZE: usize = 0x800;

/// Round an input buffer size up to even and reject sizes below 2.
pub(crate) fn checked_input_size(size: usize) -> Result<usize> {
    let rounded = size
        .checked_add(1)
        .ok_or(DecrunchError::InvalidBufferSize(size))?
        & !1;
    if rounded < 2 {
        return Err(DecrunchError::InvalidBufferSize(size));
    }
    Ok(rounded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(DecrunchError::InvalidBufferSize(0).kind(), ErrorKind::Args);
        assert_eq!(DecrunchError::UnexpectedEof.kind(), ErrorKind::Read);
        assert_eq!(
            DecrunchError::MissingBlockMarker.kind(),
            ErrorKind::DataFormat
        );
        assert_eq!(DecrunchError::InputExhausted.kind(), ErrorKind::NoMemory);
        assert_eq!(
            DecrunchError::InvalidMatchOffset {
                offset: 9,
                position: 1
            }
            .kind(),
            ErrorKind::Decrunch
        );
    }

    #[test]
    fn test_input_size_rounding() {
        assert_eq!(checked_input_size(1).unwrap(), 2);
        assert_eq!(checked_input_size(2).unwrap(), 2);
        assert_eq!(checked_input_size(3).unwrap(), 4);
        assert_eq!(checked_input_size(0x800).unwrap(), 0x800);
        assert!(checked_input_size(0).is_err());
    }

    #[test]
    fn test_constants() {
        assert_eq!(FRAME_SIZE, 32768);
        assert_eq!(LZSS_WINDOW_SIZE, 4096);
    }
}
