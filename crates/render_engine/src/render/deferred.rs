//! Deferred shading render graph
//!
//! Three stages per frame: a geometry pass rasterizes the scene into the
//! G-buffer, a compute pass evaluates lighting per 16x16 tile into an HDR
//! image, and a tone-mapping pass draws a full-screen triangle into the
//! swapchain image. Two barriers order the stages: color-attachment-output
//! to compute, then compute to fragment.

use ash::vk;
use std::sync::Arc;

use crate::core::config::RendererConfig;
use crate::foundation::math::{perspective_vk, Mat4, Point3, Vec3};
use crate::render::frame::{FrameContext, RenderGraph};
use crate::render::registry::{DrawItem, ModelRegistry};
use crate::render::uniforms::{
    CameraLightUniform, DrawPushConstants, LightingControls, TonemapPushConstants,
};
use crate::render::vulkan::{
    Buffer, BufferMode, ComputePipelineBuilder, DepthBuffer, DescriptorSet, DescriptorSetLayout,
    Framebuffer, GraphicsPipelineBuilder, Image, ImageView, Pipeline, RenderPass, Sampler,
    Swapchain, VulkanContext, VulkanError, VulkanResult,
};

/// World-space normals, signed and high precision
pub const NORMAL_FORMAT: vk::Format = vk::Format::R16G16B16A16_SFLOAT;
/// Base color
pub const ALBEDO_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;
/// Metallic scalar
pub const METALLIC_FORMAT: vk::Format = vk::Format::R8_UNORM;
/// Roughness scalar
pub const ROUGHNESS_FORMAT: vk::Format = vk::Format::R8_UNORM;
/// HDR lighting output
pub const HDR_FORMAT: vk::Format = vk::Format::R16G16B16A16_SFLOAT;

/// Compute lighting work group edge length in pixels
pub const LIGHTING_TILE_SIZE: u32 = 16;

/// Work groups needed to cover `extent` pixels with `tile`-sized groups.
#[must_use]
pub fn dispatch_group_count(extent: u32, tile: u32) -> u32 {
    (extent + tile - 1) / tile
}

/// Camera placement and projection parameters
#[derive(Debug, Clone, Copy)]
pub struct CameraPose {
    /// Eye position
    pub eye: Point3,
    /// Look-at target
    pub target: Point3,
    /// Up direction
    pub up: Vec3,
    /// Vertical field of view in radians
    pub fovy: f32,
    /// Near plane distance
    pub near: f32,
    /// Far plane distance
    pub far: f32,
}

impl Default for CameraPose {
    fn default() -> Self {
        Self {
            eye: Point3::new(0.0, 0.0, 3.0),
            target: Point3::new(0.0, 0.0, 0.0),
            up: Vec3::new(0.0, 1.0, 0.0),
            fovy: std::f32::consts::FRAC_PI_4,
            near: 0.1,
            far: 100.0,
        }
    }
}

fn color_target(
    context: &VulkanContext,
    extent: vk::Extent2D,
    format: vk::Format,
    usage: vk::ImageUsageFlags,
) -> VulkanResult<ImageView> {
    let image = Arc::new(Image::new(
        context,
        extent.width,
        extent.height,
        1,
        format,
        usage,
    )?);
    ImageView::from_owned(context, image, vk::ImageAspectFlags::COLOR)
}

/// Geometry pass attachments and their framebuffer
struct GBuffer {
    normal: ImageView,
    albedo: ImageView,
    metallic: ImageView,
    roughness: ImageView,
    framebuffer: Framebuffer,
    extent: vk::Extent2D,
}

impl GBuffer {
    const COLOR_FORMATS: [vk::Format; 4] = [
        NORMAL_FORMAT,
        ALBEDO_FORMAT,
        METALLIC_FORMAT,
        ROUGHNESS_FORMAT,
    ];

    fn new(
        context: &VulkanContext,
        geometry_pass: &RenderPass,
        extent: vk::Extent2D,
        depth_view: vk::ImageView,
    ) -> VulkanResult<Self> {
        let usage = vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED;
        let normal = color_target(context, extent, NORMAL_FORMAT, usage)?;
        let albedo = color_target(context, extent, ALBEDO_FORMAT, usage)?;
        let metallic = color_target(context, extent, METALLIC_FORMAT, usage)?;
        let roughness = color_target(context, extent, ROUGHNESS_FORMAT, usage)?;

        let attachments = [
            normal.handle(),
            albedo.handle(),
            metallic.handle(),
            roughness.handle(),
            depth_view,
        ];
        let framebuffer = Framebuffer::new(
            context.raw_device(),
            geometry_pass.handle(),
            &attachments,
            extent,
        )?;

        Ok(Self {
            normal,
            albedo,
            metallic,
            roughness,
            framebuffer,
            extent,
        })
    }

    fn views(&self) -> [vk::ImageView; 4] {
        [
            self.normal.handle(),
            self.albedo.handle(),
            self.metallic.handle(),
            self.roughness.handle(),
        ]
    }
}

/// HDR lighting target, written by compute and sampled by tone mapping
struct HdrTarget {
    image: Arc<Image>,
    view: ImageView,
}

impl HdrTarget {
    fn new(context: &VulkanContext, extent: vk::Extent2D) -> VulkanResult<Self> {
        let image = Arc::new(Image::new(
            context,
            extent.width,
            extent.height,
            1,
            HDR_FORMAT,
            vk::ImageUsageFlags::STORAGE | vk::ImageUsageFlags::SAMPLED,
        )?);
        let view = ImageView::from_owned(context, image.clone(), vk::ImageAspectFlags::COLOR)?;
        Ok(Self { image, view })
    }
}

struct FinalizedSet {
    _set: DescriptorSet,
    handle: vk::DescriptorSet,
}

/// The deferred shading graph: owns the scene's GPU data, all three
/// pipelines, and the intermediate render targets
pub struct DeferredRenderer {
    registry: ModelRegistry,
    draw_list: Vec<DrawItem>,

    geometry_pass: RenderPass,
    geometry_pipeline: Pipeline,
    lighting_pipeline: Pipeline,
    tonemap_pipeline: Pipeline,

    frame_layout: DescriptorSetLayout,
    lighting_layout: DescriptorSetLayout,
    tonemap_layout: DescriptorSetLayout,

    camera_buffers: Vec<Buffer>,
    controls_buffers: Vec<Buffer>,
    frame_sets: Vec<FinalizedSet>,
    lighting_sets: Vec<FinalizedSet>,
    tonemap_set: Option<FinalizedSet>,

    gbuffer: GBuffer,
    hdr: HdrTarget,
    target_sampler: Sampler,

    camera: CameraPose,
    light_dir: Vec3,
    controls: LightingControls,
    exposure: f32,
    model_transform: Mat4,
}

impl DeferredRenderer {
    /// Build the graph for an uploaded registry and a draw list.
    pub fn new(
        context: &VulkanContext,
        swapchain: &Swapchain,
        config: &RendererConfig,
        registry: ModelRegistry,
        draw_list: Vec<DrawItem>,
    ) -> VulkanResult<Self> {
        if !registry.is_uploaded() {
            return Err(VulkanError::InvalidOperation {
                reason: "registry must be uploaded before building the renderer".to_string(),
            });
        }
        let shader_dir = config.shader_dir.clone();

        let geometry_pass = RenderPass::new_geometry_pass(
            context.raw_device(),
            &GBuffer::COLOR_FORMATS,
            DepthBuffer::FORMAT,
        )?;

        let mut frame_layout = DescriptorSetLayout::new(context);
        frame_layout.add_binding(
            vk::DescriptorType::UNIFORM_BUFFER,
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
            1,
        )?;
        frame_layout.create_layout()?;

        let mut lighting_layout = DescriptorSetLayout::new(context);
        // Bindings 0-4: normal, albedo, metallic, roughness, depth.
        for _ in 0..5 {
            lighting_layout.add_binding(
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                vk::ShaderStageFlags::COMPUTE,
                1,
            )?;
        }
        lighting_layout.add_binding(
            vk::DescriptorType::STORAGE_IMAGE,
            vk::ShaderStageFlags::COMPUTE,
            1,
        )?;
        lighting_layout.add_binding(
            vk::DescriptorType::UNIFORM_BUFFER,
            vk::ShaderStageFlags::COMPUTE,
            1,
        )?;
        lighting_layout.add_binding(
            vk::DescriptorType::UNIFORM_BUFFER,
            vk::ShaderStageFlags::COMPUTE,
            1,
        )?;
        lighting_layout.create_layout()?;

        let mut tonemap_layout = DescriptorSetLayout::new(context);
        tonemap_layout.add_binding(
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            vk::ShaderStageFlags::FRAGMENT,
            1,
        )?;
        tonemap_layout.create_layout()?;

        let geometry_pipeline = GraphicsPipelineBuilder::new(
            context,
            "geometry",
            geometry_pass.handle(),
            true,
            true,
            GBuffer::COLOR_FORMATS.len() as u32,
        )
        .add_shader_stage(
            vk::ShaderStageFlags::VERTEX,
            &shader_dir.join("geometry.vert.spv"),
        )?
        .add_shader_stage(
            vk::ShaderStageFlags::FRAGMENT,
            &shader_dir.join("geometry.frag.spv"),
        )?
        .add_descriptor_set_layout(frame_layout.handle()?)
        .add_descriptor_set_layout(registry.material_layout()?)
        .add_push_constant_range(
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
            0,
            std::mem::size_of::<DrawPushConstants>() as u32,
        )
        .build()?;

        let lighting_pipeline =
            ComputePipelineBuilder::new(context, "lighting", &shader_dir.join("lighting.comp.spv"))?
                .add_descriptor_set_layout(lighting_layout.handle()?)
                .build()?;

        let tonemap_pipeline = GraphicsPipelineBuilder::new(
            context,
            "tonemap",
            swapchain.render_pass(),
            false,
            false,
            1,
        )
        .without_vertex_input()
        .add_shader_stage(
            vk::ShaderStageFlags::VERTEX,
            &shader_dir.join("tonemap.vert.spv"),
        )?
        .add_shader_stage(
            vk::ShaderStageFlags::FRAGMENT,
            &shader_dir.join("tonemap.frag.spv"),
        )?
        .add_descriptor_set_layout(tonemap_layout.handle()?)
        .add_push_constant_range(
            vk::ShaderStageFlags::FRAGMENT,
            0,
            std::mem::size_of::<TonemapPushConstants>() as u32,
        )
        .build()?;

        let controls = LightingControls::new(config.sunlight_intensity, config.ambient_factor);
        let mut camera_buffers = Vec::with_capacity(config.frames_in_flight);
        let mut controls_buffers = Vec::with_capacity(config.frames_in_flight);
        for _ in 0..config.frames_in_flight {
            camera_buffers.push(Buffer::new(
                context,
                std::mem::size_of::<CameraLightUniform>() as vk::DeviceSize,
                vk::BufferUsageFlags::UNIFORM_BUFFER,
                BufferMode::ContinuousTransfer,
                Some(bytemuck::bytes_of(&CameraLightUniform::default())),
            )?);
            controls_buffers.push(Buffer::new(
                context,
                std::mem::size_of::<LightingControls>() as vk::DeviceSize,
                vk::BufferUsageFlags::UNIFORM_BUFFER,
                BufferMode::ContinuousTransfer,
                Some(bytemuck::bytes_of(&controls)),
            )?);
        }

        let gbuffer = GBuffer::new(context, &geometry_pass, swapchain.extent(), swapchain.depth().view())?;
        let hdr = HdrTarget::new(context, swapchain.extent())?;
        let target_sampler = Sampler::nearest_clamp(context)?;

        let mut renderer = Self {
            registry,
            draw_list,
            geometry_pass,
            geometry_pipeline,
            lighting_pipeline,
            tonemap_pipeline,
            frame_layout,
            lighting_layout,
            tonemap_layout,
            camera_buffers,
            controls_buffers,
            frame_sets: Vec::new(),
            lighting_sets: Vec::new(),
            tonemap_set: None,
            gbuffer,
            hdr,
            target_sampler,
            camera: CameraPose::default(),
            light_dir: Vec3::new(-0.4, -1.0, -0.3),
            controls,
            exposure: 1.0,
            model_transform: Mat4::identity(),
        };
        renderer.build_frame_sets(context)?;
        renderer.build_target_sets(context, swapchain.depth().view())?;
        Ok(renderer)
    }

    /// Build the per-slot sets referencing only per-frame uniform buffers.
    /// These survive swapchain recreation.
    fn build_frame_sets(&mut self, context: &VulkanContext) -> VulkanResult<()> {
        self.frame_sets.clear();
        for buffer in &self.camera_buffers {
            let mut set = DescriptorSet::new(context, &self.frame_layout)?;
            set.add_buffers_to_binding(&[(buffer.handle(), buffer.size())])?;
            let handle = set.create_descriptor_set()?;
            self.frame_sets.push(FinalizedSet { _set: set, handle });
        }
        Ok(())
    }

    /// Place the camera.
    pub fn set_camera(&mut self, pose: CameraPose) {
        self.camera = pose;
    }

    /// Point the directional light.
    pub fn set_light_direction(&mut self, direction: Vec3) {
        self.light_dir = direction;
    }

    /// Adjust the lighting terms.
    pub fn set_lighting_controls(&mut self, sunlight_intensity: f32, ambient_factor: f32) {
        self.controls = LightingControls::new(sunlight_intensity, ambient_factor);
    }

    /// Set the tone-mapping exposure.
    pub fn set_exposure(&mut self, exposure: f32) {
        self.exposure = exposure;
    }

    /// Set the whole-model transform applied under every node transform.
    pub fn set_model_transform(&mut self, transform: Mat4) {
        self.model_transform = transform;
    }

    fn camera_uniform(&self, extent: vk::Extent2D) -> CameraLightUniform {
        let aspect = extent.width as f32 / extent.height.max(1) as f32;
        let view = Mat4::look_at_rh(&self.camera.eye, &self.camera.target, &self.camera.up);
        let proj = perspective_vk(self.camera.fovy, aspect, self.camera.near, self.camera.far);
        CameraLightUniform {
            view: view.into(),
            proj: proj.into(),
            camera_pos: [self.camera.eye.x, self.camera.eye.y, self.camera.eye.z, 1.0],
            light_dir: [self.light_dir.x, self.light_dir.y, self.light_dir.z, 0.0],
        }
    }

    /// Rebuild the descriptor sets that reference extent-dependent targets.
    fn build_target_sets(
        &mut self,
        context: &VulkanContext,
        depth_view: vk::ImageView,
    ) -> VulkanResult<()> {
        self.lighting_sets.clear();
        self.tonemap_set = None;

        let sampler = self.target_sampler.handle();
        for slot in 0..self.camera_buffers.len() {
            let mut set = DescriptorSet::new(context, &self.lighting_layout)?;
            for view in self.gbuffer.views() {
                set.add_images_to_binding(
                    &[view],
                    &[sampler],
                    &[vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL],
                )?;
            }
            set.add_images_to_binding(
                &[depth_view],
                &[sampler],
                &[vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL],
            )?;
            set.add_images_to_binding(
                &[self.hdr.view.handle()],
                &[vk::Sampler::null()],
                &[vk::ImageLayout::GENERAL],
            )?;
            set.add_buffers_to_binding(&[(
                self.camera_buffers[slot].handle(),
                self.camera_buffers[slot].size(),
            )])?;
            set.add_buffers_to_binding(&[(
                self.controls_buffers[slot].handle(),
                self.controls_buffers[slot].size(),
            )])?;
            let handle = set.create_descriptor_set()?;
            self.lighting_sets.push(FinalizedSet { _set: set, handle });
        }

        let mut set = DescriptorSet::new(context, &self.tonemap_layout)?;
        set.add_images_to_binding(
            &[self.hdr.view.handle()],
            &[sampler],
            &[vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL],
        )?;
        let handle = set.create_descriptor_set()?;
        self.tonemap_set = Some(FinalizedSet { _set: set, handle });

        Ok(())
    }

    fn record_geometry_pass(&self, frame: &mut FrameContext<'_>) -> VulkanResult<()> {
        let extent = self.gbuffer.extent;
        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        let mut clear_values = vec![
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: [0.0, 0.0, 0.0, 0.0],
                },
            };
            GBuffer::COLOR_FORMATS.len()
        ];
        clear_values.push(vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue {
                depth: 1.0,
                stencil: 0,
            },
        });

        let vertex_buffer = self.registry.vertex_buffer()?;
        let index_buffer = self.registry.index_buffer()?;
        let material_set = self.registry.material_set()?;
        let frame_set = self.frame_sets[frame.frame_slot].handle;

        let mut pass = frame.recorder.begin_render_pass(
            self.geometry_pass.handle(),
            self.gbuffer.framebuffer.handle(),
            render_area,
            &clear_values,
        )?;
        pass.set_viewport(full_viewport(extent));
        pass.set_scissor(render_area);
        pass.bind_pipeline(self.geometry_pipeline.handle());
        pass.bind_descriptor_sets(
            self.geometry_pipeline.layout(),
            0,
            &[frame_set, material_set],
        );
        pass.bind_vertex_buffers(&[vertex_buffer], &[0]);
        pass.bind_index_buffer(index_buffer);

        for item in &self.draw_list {
            let Some(range) = self.registry.mesh_range(item.mesh) else {
                continue;
            };
            let Some(binding) = self.registry.material_binding(range.material) else {
                continue;
            };
            let push = DrawPushConstants {
                submesh_transform: item.transform.into(),
                model_transform: self.model_transform.into(),
                material_index: binding.texture_index,
                color_index: binding.color_index,
                texture_type: binding.texture_type as u32,
                metallic: binding.metallic,
                roughness: binding.roughness,
            };
            pass.push_constants(
                self.geometry_pipeline.layout(),
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                bytemuck::bytes_of(&push),
            );
            pass.draw_indexed(range.index_count, range.first_index, range.vertex_offset);
        }

        Ok(())
    }

    fn record_lighting_pass(&self, frame: &mut FrameContext<'_>) {
        // The geometry pass's exit dependency already makes the G-buffer
        // and depth writes visible to compute; this barrier only discards
        // the HDR image into GENERAL for the tile writes.
        let to_compute = vk::ImageMemoryBarrier::builder()
            .old_layout(vk::ImageLayout::UNDEFINED)
            .new_layout(vk::ImageLayout::GENERAL)
            .src_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
            .dst_access_mask(vk::AccessFlags::SHADER_WRITE | vk::AccessFlags::SHADER_READ)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(self.hdr.image.handle())
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            })
            .build();
        frame.recorder.pipeline_barrier(
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            vk::PipelineStageFlags::COMPUTE_SHADER,
            &[to_compute],
        );

        frame
            .recorder
            .bind_compute_pipeline(self.lighting_pipeline.handle());
        frame.recorder.bind_compute_descriptor_sets(
            self.lighting_pipeline.layout(),
            0,
            &[self.lighting_sets[frame.frame_slot].handle],
        );
        let extent = self.gbuffer.extent;
        frame.recorder.dispatch(
            dispatch_group_count(extent.width, LIGHTING_TILE_SIZE),
            dispatch_group_count(extent.height, LIGHTING_TILE_SIZE),
            1,
        );

        let to_fragment = vk::ImageMemoryBarrier::builder()
            .old_layout(vk::ImageLayout::GENERAL)
            .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
            .src_access_mask(vk::AccessFlags::SHADER_WRITE)
            .dst_access_mask(vk::AccessFlags::SHADER_READ)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(self.hdr.image.handle())
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            })
            .build();
        frame.recorder.pipeline_barrier(
            vk::PipelineStageFlags::COMPUTE_SHADER,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
            &[to_fragment],
        );
    }

    fn record_tonemap_pass(&self, frame: &mut FrameContext<'_>) -> VulkanResult<()> {
        let tonemap_set = self
            .tonemap_set
            .as_ref()
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: "tone-mapping descriptor set not built".to_string(),
            })?
            .handle;

        let extent = frame.swapchain.extent();
        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        let clear_values = [vk::ClearValue {
            color: vk::ClearColorValue {
                float32: [0.0, 0.0, 0.0, 1.0],
            },
        }];

        let mut pass = frame.recorder.begin_render_pass(
            frame.swapchain.render_pass(),
            frame.swapchain.framebuffer(frame.image_index),
            render_area,
            &clear_values,
        )?;
        pass.set_viewport(full_viewport(extent));
        pass.set_scissor(render_area);
        pass.bind_pipeline(self.tonemap_pipeline.handle());
        pass.bind_descriptor_sets(self.tonemap_pipeline.layout(), 0, &[tonemap_set]);
        let push = TonemapPushConstants {
            exposure: self.exposure,
        };
        pass.push_constants(
            self.tonemap_pipeline.layout(),
            vk::ShaderStageFlags::FRAGMENT,
            bytemuck::bytes_of(&push),
        );
        pass.draw(3);

        Ok(())
    }
}

impl RenderGraph for DeferredRenderer {
    fn record(&mut self, frame: &mut FrameContext<'_>) -> VulkanResult<()> {
        let slot = frame.frame_slot;
        let camera = self.camera_uniform(self.gbuffer.extent);
        self.camera_buffers[slot].write(&[camera])?;
        let controls = self.controls;
        self.controls_buffers[slot].write(&[controls])?;

        self.record_geometry_pass(frame)?;
        self.record_lighting_pass(frame);
        self.record_tonemap_pass(frame)?;
        Ok(())
    }

    fn on_swapchain_recreated(
        &mut self,
        context: &VulkanContext,
        swapchain: &Swapchain,
    ) -> VulkanResult<()> {
        let extent = swapchain.extent();
        log::debug!(
            "rebuilding render targets for {}x{}",
            extent.width,
            extent.height
        );
        self.gbuffer = GBuffer::new(context, &self.geometry_pass, extent, swapchain.depth().view())?;
        self.hdr = HdrTarget::new(context, extent)?;
        self.build_target_sets(context, swapchain.depth().view())
    }
}

fn full_viewport(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn ambient_only_shading_passes_through_tonemap() {
        // Mirrors the shader arithmetic: the lighting stage scales albedo
        // by the ambient factor, and the tone-mapping operator applies
        // exposure and nothing else.
        let albedo = [1.0f32, 0.0, 0.0];
        let controls = LightingControls::new(1.0, 0.5);
        let exposure = 1.0f32;

        let shaded: Vec<f32> = albedo
            .iter()
            .map(|channel| channel * controls.ambient_factor * exposure)
            .collect();
        assert_relative_eq!(shaded[0], 0.5);
        assert_relative_eq!(shaded[1], 0.0);
        assert_relative_eq!(shaded[2], 0.0);
    }

    #[test]
    fn tile_counts_cover_every_pixel() {
        assert_eq!(dispatch_group_count(1920, LIGHTING_TILE_SIZE), 120);
        assert_eq!(dispatch_group_count(1080, LIGHTING_TILE_SIZE), 68);
        assert_eq!(dispatch_group_count(1, LIGHTING_TILE_SIZE), 1);
        assert_eq!(dispatch_group_count(16, LIGHTING_TILE_SIZE), 1);
        assert_eq!(dispatch_group_count(17, LIGHTING_TILE_SIZE), 2);
    }

    #[test]
    fn tile_counts_never_undershoot() {
        for extent in 1..200 {
            let groups = dispatch_group_count(extent, LIGHTING_TILE_SIZE);
            assert!(groups * LIGHTING_TILE_SIZE >= extent);
            assert!((groups - 1) * LIGHTING_TILE_SIZE < extent);
        }
    }

    #[test]
    fn default_camera_produces_finite_matrices() {
        let pose = CameraPose::default();
        let view = Mat4::look_at_rh(&pose.eye, &pose.target, &pose.up);
        let proj = perspective_vk(pose.fovy, 16.0 / 9.0, pose.near, pose.far);
        assert!(view.iter().all(|v| v.is_finite()));
        assert!(proj.iter().all(|v| v.is_finite()));
    }
}
