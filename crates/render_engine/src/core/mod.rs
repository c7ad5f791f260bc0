//! Core module - Engine configuration

pub mod config;
