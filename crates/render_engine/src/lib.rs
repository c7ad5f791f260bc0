//! # Render Engine
//!
//! A deferred-shading rendering engine built on Vulkan.
//!
//! The engine wraps raw Vulkan handles in ownership-safe RAII types, pools
//! descriptor writes behind builder abstractions, and sequences a three-pass
//! frame (geometry, compute lighting, tone mapping) across a double-buffered
//! swapchain with explicit inter-pass barriers.
//!
//! ## Architecture
//!
//! - [`foundation`] - Logging and math utilities
//! - [`core`] - Engine configuration
//! - [`render`] - Vulkan context, GPU resources, descriptor and pipeline
//!   builders, swapchain and frame synchronization, the deferred render
//!   graph, and the frame-loop driver

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]

pub mod core;
pub mod foundation;
pub mod render;

pub use crate::core::config::{EngineConfig, RendererConfig, WindowConfig};
pub use render::deferred::{CameraPose, DeferredRenderer};
pub use render::engine::{Engine, EngineError};
pub use render::scene::{AlbedoSource, MaterialData, MeshData, SceneData, SceneNode, Vertex};
