//! # Storage Module
//!
//! Persistent record store backends.

mod redb_store;

pub use redb_store::RedbStore;
