//! CLI command implementations
//!
//! Commands are organized by task:
//! - `core` - Shared utilities (open_store)
//! - `import` - CSV import
//! - `serve` - Web server command
//! - `status` - Store status
//! - `verify` - Post-import verification

pub mod core;
pub mod import;
pub mod serve;
pub mod status;
pub mod verify;

// Re-export command functions for main.rs
pub use core::*;
pub use import::*;
pub use serve::*;
pub use status::*;
pub use verify::*;
