// ============================================
// TANZU CLI - Core Library
// ============================================

//! Plugin distribution and catalog management for the Tanzu CLI.
//!
//! Repositories publish versioned plugin binaries, the [`plugins::Catalog`]
//! installs them under a local root and the client config records which
//! repositories to use.

pub mod cli;
pub mod config;
pub mod error;
pub mod plugins;
pub mod ui;

pub use error::{PluginError, Result};
