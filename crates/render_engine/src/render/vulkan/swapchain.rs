//! Swapchain management
//!
//! Owns the presentable image chain, the present render pass, the shared
//! depth buffer, and one framebuffer per swapchain image. Recreation tears
//! down framebuffers, then depth resources, then image views, then the
//! swapchain itself, and rebuilds in reverse; per-frame sync objects are
//! never touched.

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::vk;

use crate::render::vulkan::context::VulkanContext;
use crate::render::vulkan::framebuffer::{DepthBuffer, Framebuffer};
use crate::render::vulkan::image::ImageView;
use crate::render::vulkan::render_pass::RenderPass;
use crate::render::vulkan::{VulkanError, VulkanResult};

/// Pick the preferred surface format, falling back to the first reported.
#[must_use]
pub fn choose_surface_format(available: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    available
        .iter()
        .find(|format| {
            format.format == vk::Format::B8G8R8A8_SRGB
                && format.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .copied()
        .unwrap_or(available[0])
}

/// Pick MAILBOX when available, otherwise the always-supported FIFO.
#[must_use]
pub fn choose_present_mode(available: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if available.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// Resolve the swapchain extent from the surface capabilities.
///
/// A `current_extent.width` of `u32::MAX` means the surface lets the
/// application choose; the desired extent is clamped to the reported range.
#[must_use]
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    desired: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: desired.width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: desired.height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        }
    }
}

/// Swapchain with its views, depth buffer, present pass, and framebuffers
pub struct Swapchain {
    // Teardown order is load-bearing: framebuffers before depth before
    // views; the raw swapchain handle goes last in Drop.
    framebuffers: Vec<Framebuffer>,
    depth: Option<DepthBuffer>,
    views: Vec<ImageView>,
    render_pass: RenderPass,
    images: Vec<vk::Image>,
    swapchain: vk::SwapchainKHR,
    loader: SwapchainLoader,
    format: vk::Format,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Create the swapchain for the current surface state.
    ///
    /// Pass the previous swapchain's handle during recreation so the
    /// presentation engine can migrate resources.
    pub fn new(
        context: &VulkanContext,
        desired_extent: vk::Extent2D,
        old_swapchain: vk::SwapchainKHR,
    ) -> VulkanResult<Self> {
        let surface = context.surface;
        let surface_loader = &context.surface_loader;
        let physical = context.physical_device.device;

        let capabilities = unsafe {
            surface_loader
                .get_physical_device_surface_capabilities(physical, surface)
                .map_err(VulkanError::Api)?
        };
        let formats = unsafe {
            surface_loader
                .get_physical_device_surface_formats(physical, surface)
                .map_err(VulkanError::Api)?
        };
        let present_modes = unsafe {
            surface_loader
                .get_physical_device_surface_present_modes(physical, surface)
                .map_err(VulkanError::Api)?
        };

        if formats.is_empty() || present_modes.is_empty() {
            return Err(VulkanError::InitializationFailed(
                "surface reports no formats or present modes".to_string(),
            ));
        }

        let surface_format = choose_surface_format(&formats);
        let present_mode = choose_present_mode(&present_modes);
        let extent = choose_extent(&capabilities, desired_extent);

        let mut image_count = capabilities.min_image_count + 1;
        if capabilities.max_image_count > 0 && image_count > capabilities.max_image_count {
            image_count = capabilities.max_image_count;
        }

        let graphics_family = context.physical_device.graphics_family;
        let present_family = context.physical_device.present_family;
        let family_indices = [graphics_family, present_family];

        let mut create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        create_info = if graphics_family == present_family {
            create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        } else {
            create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&family_indices)
        };

        let loader = context.device.swapchain_loader.clone();
        let swapchain = unsafe {
            loader
                .create_swapchain(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        let device = context.raw_device();
        let images = unsafe {
            loader
                .get_swapchain_images(swapchain)
                .map_err(VulkanError::Api)?
        };

        let views: Vec<ImageView> = images
            .iter()
            .map(|&image| {
                ImageView::from_external(
                    device.clone(),
                    image,
                    surface_format.format,
                    vk::ImageAspectFlags::COLOR,
                )
            })
            .collect::<VulkanResult<_>>()?;

        let depth = DepthBuffer::new(context, extent)?;
        let render_pass = RenderPass::new_present_pass(device.clone(), surface_format.format)?;

        let framebuffers: Vec<Framebuffer> = views
            .iter()
            .map(|view| {
                Framebuffer::new(
                    device.clone(),
                    render_pass.handle(),
                    &[view.handle()],
                    extent,
                )
            })
            .collect::<VulkanResult<_>>()?;

        log::debug!(
            "swapchain created: {} images, {:?}, {}x{}",
            images.len(),
            surface_format.format,
            extent.width,
            extent.height
        );

        Ok(Self {
            framebuffers,
            depth: Some(depth),
            views,
            render_pass,
            images,
            swapchain,
            loader,
            format: surface_format.format,
            extent,
        })
    }

    /// Acquire the next presentable image index.
    ///
    /// Returns `None` when the surface is out of date and the swapchain
    /// must be recreated before rendering.
    pub fn acquire_next_image(&self, signal: vk::Semaphore) -> VulkanResult<Option<u32>> {
        let result = unsafe {
            self.loader
                .acquire_next_image(self.swapchain, u64::MAX, signal, vk::Fence::null())
        };
        match result {
            Ok((index, _suboptimal)) => Ok(Some(index)),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(None),
            Err(e) => Err(VulkanError::Api(e)),
        }
    }

    /// Present `image_index` after `wait` signals.
    ///
    /// Returns `true` when the swapchain should be recreated (out of date
    /// or suboptimal).
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> VulkanResult<bool> {
        let wait_semaphores = [wait];
        let swapchains = [self.swapchain];
        let indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&indices);

        let result = unsafe { self.loader.queue_present(queue, &present_info) };
        match result {
            Ok(suboptimal) => Ok(suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(true),
            Err(e) => Err(VulkanError::Api(e)),
        }
    }

    /// The raw swapchain handle.
    #[must_use]
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// The surface format of the chain's images.
    #[must_use]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// The current drawable extent.
    #[must_use]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Number of images in the chain.
    #[must_use]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// The present render pass.
    #[must_use]
    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass.handle()
    }

    /// The framebuffer for a given image index.
    #[must_use]
    pub fn framebuffer(&self, image_index: u32) -> vk::Framebuffer {
        self.framebuffers[image_index as usize].handle()
    }

    /// The shared depth buffer.
    #[must_use]
    pub fn depth(&self) -> &DepthBuffer {
        self.depth.as_ref().expect("depth buffer present until drop")
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.framebuffers.clear();
        self.depth = None;
        self.views.clear();
        unsafe {
            self.loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_srgb_bgra() {
        let formats = [
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];
        let chosen = choose_surface_format(&formats);
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
    }

    #[test]
    fn falls_back_to_first_format() {
        let formats = [vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }];
        let chosen = choose_surface_format(&formats);
        assert_eq!(chosen.format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn mailbox_preferred_over_fifo() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(choose_present_mode(&modes), vk::PresentModeKHR::MAILBOX);
        let fifo_only = [vk::PresentModeKHR::FIFO];
        assert_eq!(choose_present_mode(&fifo_only), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn fixed_extent_wins_over_desired() {
        let mut caps = vk::SurfaceCapabilitiesKHR::default();
        caps.current_extent = vk::Extent2D {
            width: 800,
            height: 600,
        };
        let extent = choose_extent(
            &caps,
            vk::Extent2D {
                width: 1920,
                height: 1080,
            },
        );
        assert_eq!(extent.width, 800);
        assert_eq!(extent.height, 600);
    }

    #[test]
    fn flexible_extent_clamps_to_bounds() {
        let mut caps = vk::SurfaceCapabilitiesKHR::default();
        caps.current_extent = vk::Extent2D {
            width: u32::MAX,
            height: u32::MAX,
        };
        caps.min_image_extent = vk::Extent2D {
            width: 64,
            height: 64,
        };
        caps.max_image_extent = vk::Extent2D {
            width: 1024,
            height: 1024,
        };
        let extent = choose_extent(
            &caps,
            vk::Extent2D {
                width: 4096,
                height: 32,
            },
        );
        assert_eq!(extent.width, 1024);
        assert_eq!(extent.height, 64);
    }
}
