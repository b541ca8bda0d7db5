//! Integration test entry point
//!
//! Run with: `cargo test --test integration_tests`
//!
//! `common` is pulled in through `#[path]` from `integration/mod.rs` so it is
//! compiled once.

mod integration;

pub use integration::*;
