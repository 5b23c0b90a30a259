//! Low-level primitives the storage engine is built from.

/// Byte-level encoding utilities.
///
/// Varints and a fallible cursor used by the node image codec.
pub mod bytes;

/// Variable-width packed integer arrays.
pub mod packed;
