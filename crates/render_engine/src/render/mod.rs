//! Rendering module
//!
//! The Vulkan backend, GPU resource management, deferred render graph, and
//! the frame-loop driver.

pub mod deferred;
pub mod engine;
pub mod frame;
pub mod registry;
pub mod scene;
pub mod uniforms;
pub mod vulkan;
