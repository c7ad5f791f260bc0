//! GPU image management
//!
//! Images own a native handle plus a dedicated allocation. Views are typed
//! windows over an owned image or an externally managed one (swapchain
//! images). Mip chains are generated on the GPU with a per-level blit chain.

use ash::{vk, Device};
use std::sync::Arc;

use crate::render::vulkan::buffer::{find_memory_type, Buffer, BufferMode};
use crate::render::vulkan::commands::SingleTimeCommands;
use crate::render::vulkan::context::VulkanContext;
use crate::render::vulkan::{VulkanError, VulkanResult};

/// Number of mip levels for a full chain over a `width` x `height` image.
#[must_use]
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// Dimensions of mip level `level`, floor-halved and clamped to 1.
#[must_use]
pub fn mip_extent(width: u32, height: u32, level: u32) -> (u32, u32) {
    ((width >> level).max(1), (height >> level).max(1))
}

/// GPU image with dedicated memory and RAII cleanup
pub struct Image {
    device: Device,
    image: vk::Image,
    memory: vk::DeviceMemory,
    format: vk::Format,
    extent: vk::Extent2D,
    mip_levels: u32,
}

impl Image {
    /// Create an image with a dedicated device-local allocation.
    pub fn new(
        context: &VulkanContext,
        width: u32,
        height: u32,
        mip_levels: u32,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
    ) -> VulkanResult<Self> {
        let device = context.raw_device();

        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width,
                height,
                depth: 1,
            })
            .mip_levels(mip_levels)
            .array_layers(1)
            .format(format)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .samples(vk::SampleCountFlags::TYPE_1);

        let image = unsafe {
            device
                .create_image(&image_info, None)
                .map_err(VulkanError::Api)?
        };

        let requirements = unsafe { device.get_image_memory_requirements(image) };
        let memory_type_index = match find_memory_type(
            requirements.memory_type_bits,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            context.memory_properties(),
        ) {
            Ok(index) => index,
            Err(e) => {
                unsafe { device.destroy_image(image, None) };
                return Err(e);
            }
        };

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);

        let memory = unsafe {
            match device.allocate_memory(&alloc_info, None) {
                Ok(memory) => memory,
                Err(e) => {
                    device.destroy_image(image, None);
                    return Err(VulkanError::Api(e));
                }
            }
        };

        unsafe {
            if let Err(e) = device.bind_image_memory(image, memory, 0) {
                device.destroy_image(image, None);
                device.free_memory(memory, None);
                return Err(VulkanError::Api(e));
            }
        }

        Ok(Self {
            device,
            image,
            memory,
            format,
            extent: vk::Extent2D { width, height },
            mip_levels,
        })
    }

    /// Create a sampled RGBA8 texture from raw pixels, uploading through a
    /// staging buffer and generating the full mip chain on the GPU.
    pub fn from_rgba_pixels(
        context: &VulkanContext,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> VulkanResult<Arc<Self>> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(VulkanError::ResourceCreationFailure {
                reason: format!(
                    "pixel data size {} does not match {}x{} RGBA",
                    pixels.len(),
                    width,
                    height
                ),
            });
        }

        let mip_levels = mip_level_count(width, height);
        let image = Self::new(
            context,
            width,
            height,
            mip_levels,
            vk::Format::R8G8B8A8_SRGB,
            vk::ImageUsageFlags::TRANSFER_SRC
                | vk::ImageUsageFlags::TRANSFER_DST
                | vk::ImageUsageFlags::SAMPLED,
        )?;

        let staging = Buffer::new(
            context,
            pixels.len() as vk::DeviceSize,
            vk::BufferUsageFlags::TRANSFER_SRC,
            BufferMode::ContinuousTransfer,
            Some(pixels),
        )?;

        image.transition_layout(
            context,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )?;
        image.copy_from_buffer(context, &staging)?;
        image.generate_mipmaps(context)?;

        Ok(Arc::new(image))
    }

    /// Transition all mip levels between layouts.
    pub fn transition_layout(
        &self,
        context: &VulkanContext,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
    ) -> VulkanResult<()> {
        let (src_access, src_stage) = match old_layout {
            vk::ImageLayout::UNDEFINED => (
                vk::AccessFlags::empty(),
                vk::PipelineStageFlags::TOP_OF_PIPE,
            ),
            vk::ImageLayout::TRANSFER_DST_OPTIMAL => (
                vk::AccessFlags::TRANSFER_WRITE,
                vk::PipelineStageFlags::TRANSFER,
            ),
            other => {
                return Err(VulkanError::InvalidOperation {
                    reason: format!("unsupported source layout {other:?}"),
                })
            }
        };
        let (dst_access, dst_stage) = match new_layout {
            vk::ImageLayout::TRANSFER_DST_OPTIMAL => (
                vk::AccessFlags::TRANSFER_WRITE,
                vk::PipelineStageFlags::TRANSFER,
            ),
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL => (
                vk::AccessFlags::SHADER_READ,
                vk::PipelineStageFlags::FRAGMENT_SHADER,
            ),
            vk::ImageLayout::GENERAL => (
                vk::AccessFlags::SHADER_READ | vk::AccessFlags::SHADER_WRITE,
                vk::PipelineStageFlags::COMPUTE_SHADER,
            ),
            other => {
                return Err(VulkanError::InvalidOperation {
                    reason: format!("unsupported destination layout {other:?}"),
                })
            }
        };

        let barrier = vk::ImageMemoryBarrier::builder()
            .old_layout(old_layout)
            .new_layout(new_layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(self.image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: self.mip_levels,
                base_array_layer: 0,
                layer_count: 1,
            })
            .src_access_mask(src_access)
            .dst_access_mask(dst_access);

        let commands = SingleTimeCommands::begin(context)?;
        unsafe {
            context.device().cmd_pipeline_barrier(
                commands.buffer(),
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier.build()],
            );
        }
        commands.submit()
    }

    fn copy_from_buffer(&self, context: &VulkanContext, staging: &Buffer) -> VulkanResult<()> {
        let region = vk::BufferImageCopy::builder()
            .image_subresource(vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            })
            .image_extent(vk::Extent3D {
                width: self.extent.width,
                height: self.extent.height,
                depth: 1,
            });

        let commands = SingleTimeCommands::begin(context)?;
        unsafe {
            context.device().cmd_copy_buffer_to_image(
                commands.buffer(),
                staging.handle(),
                self.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region.build()],
            );
        }
        commands.submit()
    }

    /// Fill mip levels 1..n by blitting each level from the one above it,
    /// leaving every level in `SHADER_READ_ONLY_OPTIMAL`.
    ///
    /// Level 0 must be in `TRANSFER_DST_OPTIMAL` when called. Each level is
    /// transitioned to `TRANSFER_SRC_OPTIMAL` before serving as a blit
    /// source and to shader-read once its data is final; the last level has
    /// no blit source within itself and is transitioned straight from
    /// transfer-dst to shader-read.
    pub fn generate_mipmaps(&self, context: &VulkanContext) -> VulkanResult<()> {
        let commands = SingleTimeCommands::begin(context)?;
        let device = context.device();
        let cmd = commands.buffer();

        let mut barrier = vk::ImageMemoryBarrier::builder()
            .image(self.image)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            })
            .build();

        let mut mip_width = self.extent.width;
        let mut mip_height = self.extent.height;

        for level in 1..self.mip_levels {
            // Source level: transfer-dst -> transfer-src.
            barrier.subresource_range.base_mip_level = level - 1;
            barrier.old_layout = vk::ImageLayout::TRANSFER_DST_OPTIMAL;
            barrier.new_layout = vk::ImageLayout::TRANSFER_SRC_OPTIMAL;
            barrier.src_access_mask = vk::AccessFlags::TRANSFER_WRITE;
            barrier.dst_access_mask = vk::AccessFlags::TRANSFER_READ;
            unsafe {
                device.cmd_pipeline_barrier(
                    cmd,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[barrier],
                );
            }

            let (dst_width, dst_height) = mip_extent(self.extent.width, self.extent.height, level);
            let blit = vk::ImageBlit::builder()
                .src_offsets([
                    vk::Offset3D { x: 0, y: 0, z: 0 },
                    vk::Offset3D {
                        x: mip_width as i32,
                        y: mip_height as i32,
                        z: 1,
                    },
                ])
                .src_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: level - 1,
                    base_array_layer: 0,
                    layer_count: 1,
                })
                .dst_offsets([
                    vk::Offset3D { x: 0, y: 0, z: 0 },
                    vk::Offset3D {
                        x: dst_width as i32,
                        y: dst_height as i32,
                        z: 1,
                    },
                ])
                .dst_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: level,
                    base_array_layer: 0,
                    layer_count: 1,
                });

            unsafe {
                device.cmd_blit_image(
                    cmd,
                    self.image,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                    self.image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[blit.build()],
                    vk::Filter::LINEAR,
                );
            }

            // Source level is final: transfer-src -> shader-read.
            barrier.old_layout = vk::ImageLayout::TRANSFER_SRC_OPTIMAL;
            barrier.new_layout = vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL;
            barrier.src_access_mask = vk::AccessFlags::TRANSFER_READ;
            barrier.dst_access_mask = vk::AccessFlags::SHADER_READ;
            unsafe {
                device.cmd_pipeline_barrier(
                    cmd,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::PipelineStageFlags::FRAGMENT_SHADER,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[barrier],
                );
            }

            mip_width = dst_width;
            mip_height = dst_height;
        }

        // Last level never becomes a blit source.
        barrier.subresource_range.base_mip_level = self.mip_levels - 1;
        barrier.old_layout = vk::ImageLayout::TRANSFER_DST_OPTIMAL;
        barrier.new_layout = vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL;
        barrier.src_access_mask = vk::AccessFlags::TRANSFER_WRITE;
        barrier.dst_access_mask = vk::AccessFlags::SHADER_READ;
        unsafe {
            device.cmd_pipeline_barrier(
                cmd,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::FRAGMENT_SHADER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
        }

        commands.submit()
    }

    /// The image handle.
    #[must_use]
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    /// The image format.
    #[must_use]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Image extent.
    #[must_use]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Number of mip levels.
    #[must_use]
    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Typed view over an image's pixel data
///
/// Holds the owning [`Image`] alive when constructed from one; views over
/// external images (swapchain images) own only the view object.
pub struct ImageView {
    device: Device,
    view: vk::ImageView,
    // Keeps the backing image alive for owned views.
    _image: Option<Arc<Image>>,
}

impl ImageView {
    /// Create a view over an engine-owned image.
    pub fn from_owned(
        context: &VulkanContext,
        image: Arc<Image>,
        aspect: vk::ImageAspectFlags,
    ) -> VulkanResult<Self> {
        let view = Self::create_raw(
            context.device(),
            image.handle(),
            image.format(),
            aspect,
            image.mip_levels(),
        )?;
        Ok(Self {
            device: context.raw_device(),
            view,
            _image: Some(image),
        })
    }

    /// Create a view over an externally owned image, such as a swapchain
    /// image. The image handle is borrowed, never destroyed.
    pub fn from_external(
        device: Device,
        image: vk::Image,
        format: vk::Format,
        aspect: vk::ImageAspectFlags,
    ) -> VulkanResult<Self> {
        let view = Self::create_raw(&device, image, format, aspect, 1)?;
        Ok(Self {
            device,
            view,
            _image: None,
        })
    }

    fn create_raw(
        device: &Device,
        image: vk::Image,
        format: vk::Format,
        aspect: vk::ImageAspectFlags,
        mip_levels: u32,
    ) -> VulkanResult<vk::ImageView> {
        let create_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect,
                base_mip_level: 0,
                level_count: mip_levels,
                base_array_layer: 0,
                layer_count: 1,
            });

        unsafe {
            device
                .create_image_view(&create_info, None)
                .map_err(VulkanError::Api)
        }
    }

    /// The view handle.
    #[must_use]
    pub fn handle(&self) -> vk::ImageView {
        self.view
    }
}

impl Drop for ImageView {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.view, None);
        }
    }
}

/// Texture sampler with anisotropic filtering
pub struct Sampler {
    device: Device,
    sampler: vk::Sampler,
}

impl Sampler {
    /// Create a linear sampler covering `mip_levels` of detail.
    pub fn new(context: &VulkanContext, mip_levels: u32) -> VulkanResult<Self> {
        let create_info = vk::SamplerCreateInfo::builder()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .anisotropy_enable(true)
            .max_anisotropy(context.limits().max_sampler_anisotropy)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .min_lod(0.0)
            .max_lod(mip_levels as f32)
            .mip_lod_bias(0.0);

        let sampler = unsafe {
            context
                .device()
                .create_sampler(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self {
            device: context.raw_device(),
            sampler,
        })
    }

    /// Create a clamp-to-edge sampler without anisotropy, used for sampling
    /// render targets at exact texel positions.
    pub fn nearest_clamp(context: &VulkanContext) -> VulkanResult<Self> {
        let create_info = vk::SamplerCreateInfo::builder()
            .mag_filter(vk::Filter::NEAREST)
            .min_filter(vk::Filter::NEAREST)
            .address_mode_u(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .address_mode_v(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .anisotropy_enable(false)
            .max_anisotropy(1.0)
            .mipmap_mode(vk::SamplerMipmapMode::NEAREST)
            .min_lod(0.0)
            .max_lod(0.0);

        let sampler = unsafe {
            context
                .device()
                .create_sampler(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self {
            device: context.raw_device(),
            sampler,
        })
    }

    /// The sampler handle.
    #[must_use]
    pub fn handle(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.sampler, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_chain_level_count() {
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(2, 2), 2);
        assert_eq!(mip_level_count(1024, 1024), 11);
        assert_eq!(mip_level_count(1920, 1080), 11);
        assert_eq!(mip_level_count(4096, 1), 13);
    }

    #[test]
    fn level_count_matches_log2_formula() {
        for &(w, h) in &[(1u32, 1u32), (7, 3), (256, 512), (1920, 1080)] {
            let expected = (f64::from(w.max(h)).log2().floor() as u32) + 1;
            assert_eq!(mip_level_count(w, h), expected, "for {w}x{h}");
        }
    }

    #[test]
    fn mip_dimensions_halve_and_clamp() {
        assert_eq!(mip_extent(1024, 512, 0), (1024, 512));
        assert_eq!(mip_extent(1024, 512, 1), (512, 256));
        assert_eq!(mip_extent(1024, 512, 9), (2, 1));
        assert_eq!(mip_extent(1024, 512, 10), (1, 1));
        assert_eq!(mip_extent(1024, 512, 20), (1, 1));
    }

    #[test]
    fn mip_chain_is_monotonic() {
        let (w, h) = (1920u32, 1080u32);
        let levels = mip_level_count(w, h);
        let mut prev = (w + 1, h + 1);
        for level in 0..levels {
            let dims = mip_extent(w, h, level);
            assert!(dims.0 < prev.0 || dims.0 == 1);
            assert!(dims.1 < prev.1 || dims.1 == 1);
            prev = dims;
        }
        assert_eq!(mip_extent(w, h, levels - 1).0.max(mip_extent(w, h, levels - 1).1), 1);
    }
}
