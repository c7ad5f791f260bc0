//! Framebuffer and depth buffer management

use ash::{vk, Device};
use std::sync::Arc;

use crate::render::vulkan::context::VulkanContext;
use crate::render::vulkan::image::{Image, ImageView};
use crate::render::vulkan::{VulkanError, VulkanResult};

/// Framebuffer wrapper with RAII cleanup
pub struct Framebuffer {
    device: Device,
    framebuffer: vk::Framebuffer,
}

impl Framebuffer {
    /// Create a framebuffer binding `attachments` to `render_pass`.
    pub fn new(
        device: Device,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        let create_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = unsafe {
            device
                .create_framebuffer(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self {
            device,
            framebuffer,
        })
    }

    /// The framebuffer handle.
    #[must_use]
    pub fn handle(&self) -> vk::Framebuffer {
        self.framebuffer
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_framebuffer(self.framebuffer, None);
        }
    }
}

/// Depth buffer shared by the geometry pass and sampled by the lighting pass
pub struct DepthBuffer {
    view: ImageView,
    format: vk::Format,
}

impl DepthBuffer {
    /// Depth format used across the engine
    pub const FORMAT: vk::Format = vk::Format::D32_SFLOAT;

    /// Create a depth buffer sized to `extent`.
    pub fn new(context: &VulkanContext, extent: vk::Extent2D) -> VulkanResult<Self> {
        let image = Arc::new(Image::new(
            context,
            extent.width,
            extent.height,
            1,
            Self::FORMAT,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
        )?);
        let view = ImageView::from_owned(context, image, vk::ImageAspectFlags::DEPTH)?;

        Ok(Self {
            view,
            format: Self::FORMAT,
        })
    }

    /// The depth view handle.
    #[must_use]
    pub fn view(&self) -> vk::ImageView {
        self.view.handle()
    }

    /// The depth format.
    #[must_use]
    pub fn format(&self) -> vk::Format {
        self.format
    }
}
