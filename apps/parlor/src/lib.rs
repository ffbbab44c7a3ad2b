//! # parlor
//!
//! The binary side of Parlor: the HTTP facade, the CLI, refresh polling and
//! the configuration they share. Exposed as a library so integration tests
//! can build the router directly.

pub mod alerts;
pub mod api;
pub mod cli;
pub mod config;
pub mod poll;
