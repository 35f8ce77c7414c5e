//! Decrunch - decompressors for the classic Microsoft archive codecs
//!
//! This crate provides pure Rust decompressors for the compression formats
//! used by CAB, HLP, and the DOS-era COMPRESS/EXPAND containers: MS-ZIP
//! (DEFLATE in CK frames), LZX (including LZX DELTA), Quantum, the simple
//! LZSS family (EXPAND, QBasic, help files), KWAJ's Huffman-coded LZH, and
//! the trivial stored codec. Compression is out of scope; these formats
//! are read far more often than they are written.
//!
//! # Features
//!
//! - Streaming API via `Read`/`Write` traits with incremental `decompress(n)` calls
//! - Window sizes up to 2 MiB (LZX DELTA: 32 MiB)
//! - MS-ZIP repair mode for recovering data after a damaged frame
//! - LZX x86 call-translation (E8) undo and DELTA reference data
//! - `*_bytes` convenience functions for in-memory data
//!
//! # Example
//!
//! ```no_run
//! use decrunch::{mszip_decompress_bytes, MszipDecompressor};
//!
//! // Decompress MS-ZIP data in memory
//! let compressed = std::fs::read("member.mszip")?;
//! let decompressed = mszip_decompress_bytes(&compressed, 0x8000, false)?;
//!
//! // Or stream incrementally
//! let mut output = Vec::new();
//! let mut stream = MszipDecompressor::new(
//!     std::io::Cursor::new(compressed),
//!     &mut output,
//!     0x800,
//!     false,
//! )?;
//! stream.decompress(0x8000)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

// Shared infrastructure
pub mod bits;
pub mod common;
pub mod error;
pub mod huffman;
pub mod tables;
pub mod window;

// Codecs
pub mod kwaj;
pub mod lzss;
pub mod lzx;
pub mod mszip;
pub mod none;
pub mod qtm;

// Re-export commonly used types
pub use common::{
    DecrunchError, ErrorKind, Result, DEFAULT_INPUT_SIZE, FRAME_SIZE, LZSS_WINDOW_SIZE,
};
pub use kwaj::{kwaj_decompress, kwaj_decompress_bytes};
pub use lzss::{lzss_decompress, lzss_decompress_bytes, LzssMode};
pub use lzx::{lzx_decompress_bytes, LzxDecompressor};
pub use mszip::{mszip_decompress_bytes, MszipDecompressor};
pub use none::{none_decompress_bytes, NoneDecompressor};
pub use qtm::{qtm_decompress_bytes, QtmDecompressor};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reexports() {
        let _ = LzssMode::Expand;
        let _ = ErrorKind::DataFormat;

        let data = b"test";
        let copied = none_decompress_bytes(data).unwrap();
        assert_eq!(copied, data);
    }
}
