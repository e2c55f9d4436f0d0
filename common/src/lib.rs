//! Shared utilities for the skystack workspace.

pub mod buffer2;
pub mod file_utils;
pub mod log_setup;
pub mod test_utils;

pub use buffer2::Buffer2;
