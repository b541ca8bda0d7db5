//! Shared test utilities for livenote
//!
//! - Temporary databases and cores
//! - Notebook and region fixtures
//! - A fake execution service

#![allow(dead_code)]

pub mod fixtures;
