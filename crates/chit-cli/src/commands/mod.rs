//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Core commands (init, status, audit) and shared utilities (open_db)
//! - `ask` - Conversational agent command
//! - `process` - Receipt pipeline command
//! - `receipts` - Receipt listing and deletion commands
//! - `serve` - Web server command

pub mod ask;
pub mod core;
pub mod process;
pub mod receipts;
pub mod serve;

// Re-export command functions for main.rs
pub use ask::*;
pub use core::*;
pub use process::*;
pub use receipts::*;
pub use serve::*;

/// User identity used when no user is specified
pub const DEFAULT_USER: &str = "local@chit.dev";

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        format!("{}...", &s[..max.saturating_sub(3)])
    }
}
