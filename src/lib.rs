// ABOUTME: Library root for quayd - exposes the daemon's modules for testing.
// ABOUTME: The main binary is in main.rs.

/// API version prefix of every REST path.
pub const API_VERSION: &str = "1.0";

pub mod api;
pub mod config;
pub mod container;
pub mod daemon;
pub mod db;
pub mod error;
pub mod operation;
pub mod response;
pub mod runtime;
pub mod status;
pub mod storage;
pub mod types;
