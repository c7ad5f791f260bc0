//! Foundation module - Core utilities and types
//!
//! Fundamental utilities used throughout the engine:
//! - Math types and operations
//! - Logging utilities

pub mod logging;
pub mod math;
