//! Integration tests for livenote
//!
//! These tests verify that multiple components work together correctly.

#[path = "../common/mod.rs"]
pub mod common;

pub mod capture_restore;
pub mod chapter_switch;
pub mod cli;
pub mod clone_restore;
pub mod persistence;
