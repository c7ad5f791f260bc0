//! Shader module loading
//!
//! Loads pre-compiled SPIR-V binaries from disk and wraps them in shader
//! modules. Modules are transient: pipeline builders destroy them as soon as
//! the pipeline object exists.

use ash::{vk, Device};
use std::ffi::CStr;
use std::path::Path;

use crate::render::vulkan::{VulkanError, VulkanResult};

/// Entry point name shared by all shader stages
pub const SHADER_ENTRY_POINT: &CStr =
    unsafe { CStr::from_bytes_with_nul_unchecked(b"main\0") };

/// Compiled shader module with RAII cleanup
pub struct ShaderModule {
    device: Device,
    module: vk::ShaderModule,
}

impl ShaderModule {
    /// Create a shader module from raw SPIR-V bytes.
    pub fn from_bytes(device: Device, bytes: &[u8]) -> VulkanResult<Self> {
        let (prefix, code, suffix) = unsafe { bytes.align_to::<u32>() };
        if !prefix.is_empty() || !suffix.is_empty() {
            return Err(VulkanError::ResourceCreationFailure {
                reason: "SPIR-V binary is not 4-byte aligned".to_string(),
            });
        }

        let create_info = vk::ShaderModuleCreateInfo::builder().code(code);
        let module = unsafe {
            device
                .create_shader_module(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self { device, module })
    }

    /// Load a SPIR-V binary from disk.
    ///
    /// Fails with [`VulkanError::ShaderFileMissing`] when the file is absent
    /// or empty; no further validation is performed on the blob.
    pub fn from_file(device: Device, path: &Path) -> VulkanResult<Self> {
        let bytes = std::fs::read(path).map_err(|_| VulkanError::ShaderFileMissing {
            path: path.to_path_buf(),
        })?;
        if bytes.is_empty() {
            return Err(VulkanError::ShaderFileMissing {
                path: path.to_path_buf(),
            });
        }
        Self::from_bytes(device, &bytes)
    }

    /// Stage create info referencing this module.
    #[must_use]
    pub fn stage_info(&self, stage: vk::ShaderStageFlags) -> vk::PipelineShaderStageCreateInfo {
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(stage)
            .module(self.module)
            .name(SHADER_ENTRY_POINT)
            .build()
    }

    /// The module handle.
    #[must_use]
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.module, None);
        }
    }
}
