//! CLI command implementations.

pub mod common;
pub mod get;
pub mod info;
pub mod put;
