//! Error handling for decompression operations
//!
//! This module re-exports the error types defined in [`crate::common`].
//! It uses thiserror for ergonomic error handling and provides a coarse
//! [`ErrorKind`] taxonomy for container layers.

pub use crate::common::DecrunchError;
pub use crate::common::ErrorKind;
pub use crate::common::Result;
