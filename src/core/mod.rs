//! Core module containing the notebook controller and shared infrastructure.
//!
//! - Chapter switching, capture and restore orchestration
//! - Clone-to-new-window handoff
//! - Database access and the configured notebook store
//! - Service functions used by the CLI

pub mod clone;
mod controller;
mod livenote_core;
pub mod services;

pub use clone::{clone_region, purge_expired_clones, restore_from_url, ClonedRestore};
pub use controller::{
    ChapterTab, ControllerError, Notice, NoticeLevel, NotebookController, SwitchPhase,
};
pub use livenote_core::LivenoteCore;
