//! # Formats Module
//!
//! Byte-level encoding of stored collections. File and database I/O live in
//! `store` and `storage`.

mod persistence;

pub use persistence::*;
