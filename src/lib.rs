//! SCOREWATCH: live event score tracker
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod source;
pub mod publish;
pub mod engine;
pub mod scheduler;
pub mod api;
pub mod app;
