//! Vulkan backend
//!
//! Low-level Vulkan wrappers following RAII ownership: every type owns
//! exactly one native handle (plus backing memory where applicable) and
//! destroys it on drop. All fallible operations return [`VulkanResult`].

pub mod buffer;
pub mod commands;
pub mod context;
pub mod descriptor;
pub mod framebuffer;
pub mod image;
pub mod pipeline;
pub mod render_pass;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod window;

pub use buffer::{Buffer, BufferMode};
pub use commands::CommandRecorder;
pub use context::VulkanContext;
pub use descriptor::{DescriptorError, DescriptorSet, DescriptorSetLayout};
pub use framebuffer::{DepthBuffer, Framebuffer};
pub use image::{Image, ImageView, Sampler};
pub use pipeline::{ComputePipelineBuilder, GraphicsPipelineBuilder, Pipeline};
pub use render_pass::RenderPass;
pub use shader::ShaderModule;
pub use swapchain::Swapchain;
pub use sync::{Fence, FrameSync, Semaphore};
pub use window::{Window, WindowError};

use ash::vk;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from the Vulkan backend
#[derive(Error, Debug)]
pub enum VulkanError {
    /// Raw Vulkan API error
    #[error("Vulkan API error: {0}")]
    Api(#[from] vk::Result),

    /// Instance or device setup failed
    #[error("Vulkan initialization failed: {0}")]
    InitializationFailed(String),

    /// A native object or its memory could not be created
    #[error("resource creation failed: {reason}")]
    ResourceCreationFailure {
        /// What failed
        reason: String,
    },

    /// No memory type satisfies both the resource requirements and the
    /// requested property flags
    #[error("no suitable memory type found")]
    NoSuitableMemoryType,

    /// Device memory allocation failed
    #[error("out of device memory (requested {requested} bytes)")]
    OutOfMemory {
        /// Allocation size that failed
        requested: u64,
    },

    /// An operation was attempted in an invalid state
    #[error("invalid operation: {reason}")]
    InvalidOperation {
        /// Why the operation is invalid
        reason: String,
    },

    /// A shader binary was missing or empty
    #[error("shader binary missing or empty: {path}")]
    ShaderFileMissing {
        /// Path that was attempted
        path: PathBuf,
    },

    /// Descriptor builder contract violation
    #[error(transparent)]
    Descriptor(#[from] descriptor::DescriptorError),

    /// Windowing error during surface setup
    #[error(transparent)]
    Window(#[from] window::WindowError),
}

/// Result alias for the Vulkan backend
pub type VulkanResult<T> = Result<T, VulkanError>;
