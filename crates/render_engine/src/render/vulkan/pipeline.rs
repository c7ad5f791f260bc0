//! Graphics and compute pipeline builders
//!
//! Builders accumulate shader stages, descriptor set layouts, and push
//! constant ranges, then assemble the pipeline layout and pipeline object in
//! one all-or-nothing `build` call. Shader modules are destroyed as soon as
//! the pipeline exists.

use ash::{vk, Device};
use std::path::{Path, PathBuf};

use crate::render::scene::Vertex;
use crate::render::vulkan::context::VulkanContext;
use crate::render::vulkan::shader::ShaderModule;
use crate::render::vulkan::{VulkanError, VulkanResult};

/// Built pipeline owning its layout, with RAII cleanup
pub struct Pipeline {
    device: Device,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
}

impl Pipeline {
    /// The pipeline handle.
    #[must_use]
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// The pipeline layout handle.
    #[must_use]
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline_layout(self.layout, None);
            self.device.destroy_pipeline(self.pipeline, None);
        }
    }
}

fn create_pipeline_layout(
    device: &Device,
    set_layouts: &[vk::DescriptorSetLayout],
    push_constant_ranges: &[vk::PushConstantRange],
) -> VulkanResult<vk::PipelineLayout> {
    let layout_info = vk::PipelineLayoutCreateInfo::builder()
        .set_layouts(set_layouts)
        .push_constant_ranges(push_constant_ranges);
    unsafe {
        device
            .create_pipeline_layout(&layout_info, None)
            .map_err(VulkanError::Api)
    }
}

/// Builder for graphics pipelines targeting one render pass
pub struct GraphicsPipelineBuilder<'a> {
    context: &'a VulkanContext,
    name: String,
    render_pass: vk::RenderPass,
    depth_test: bool,
    depth_write: bool,
    color_attachment_count: u32,
    cull_mode: vk::CullModeFlags,
    use_vertex_input: bool,
    stages: Vec<(vk::ShaderStageFlags, ShaderModule)>,
    set_layouts: Vec<vk::DescriptorSetLayout>,
    push_constant_ranges: Vec<vk::PushConstantRange>,
}

impl<'a> GraphicsPipelineBuilder<'a> {
    /// Start a builder for a pipeline rendering into `render_pass`.
    ///
    /// One alpha-blended color-blend state is synthesized per color
    /// attachment. Viewport and scissor are dynamic.
    #[must_use]
    pub fn new(
        context: &'a VulkanContext,
        name: &str,
        render_pass: vk::RenderPass,
        depth_test: bool,
        depth_write: bool,
        color_attachment_count: u32,
    ) -> Self {
        Self {
            context,
            name: name.to_string(),
            render_pass,
            depth_test,
            depth_write,
            color_attachment_count,
            cull_mode: vk::CullModeFlags::BACK,
            use_vertex_input: true,
            stages: Vec::new(),
            set_layouts: Vec::new(),
            push_constant_ranges: Vec::new(),
        }
    }

    /// Disable vertex input state, for full-screen passes that synthesize
    /// geometry in the vertex shader.
    #[must_use]
    pub fn without_vertex_input(mut self) -> Self {
        self.use_vertex_input = false;
        self.cull_mode = vk::CullModeFlags::NONE;
        self
    }

    /// Load a SPIR-V binary and append it as a shader stage.
    pub fn add_shader_stage(
        mut self,
        stage: vk::ShaderStageFlags,
        path: &Path,
    ) -> VulkanResult<Self> {
        let module = ShaderModule::from_file(self.context.raw_device(), path)?;
        self.context
            .set_object_name(module.handle(), &format!("{}-shader", self.name));
        self.stages.push((stage, module));
        Ok(self)
    }

    /// Reference a finalized descriptor set layout.
    #[must_use]
    pub fn add_descriptor_set_layout(mut self, layout: vk::DescriptorSetLayout) -> Self {
        self.set_layouts.push(layout);
        self
    }

    /// Append a push constant range.
    #[must_use]
    pub fn add_push_constant_range(
        mut self,
        stages: vk::ShaderStageFlags,
        offset: u32,
        size: u32,
    ) -> Self {
        self.push_constant_ranges.push(vk::PushConstantRange {
            stage_flags: stages,
            offset,
            size,
        });
        self
    }

    /// Assemble the pipeline layout and pipeline, consuming the builder and
    /// destroying the transient shader modules.
    pub fn build(self) -> VulkanResult<Pipeline> {
        let device = self.context.raw_device();

        let layout = create_pipeline_layout(
            &device,
            &self.set_layouts,
            &self.push_constant_ranges,
        )?;

        let stage_infos: Vec<vk::PipelineShaderStageCreateInfo> = self
            .stages
            .iter()
            .map(|(stage, module)| module.stage_info(*stage))
            .collect();

        let binding_descriptions = [Vertex::binding_description()];
        let attribute_descriptions = Vertex::attribute_descriptions();
        let vertex_input = if self.use_vertex_input {
            vk::PipelineVertexInputStateCreateInfo::builder()
                .vertex_binding_descriptions(&binding_descriptions)
                .vertex_attribute_descriptions(&attribute_descriptions)
                .build()
        } else {
            vk::PipelineVertexInputStateCreateInfo::builder().build()
        };

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);

        let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(self.cull_mode)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .depth_bias_enable(false);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(self.depth_test)
            .depth_write_enable(self.depth_write)
            .depth_compare_op(vk::CompareOp::LESS)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let blend_attachments: Vec<vk::PipelineColorBlendAttachmentState> = (0
            ..self.color_attachment_count)
            .map(|_| {
                vk::PipelineColorBlendAttachmentState::builder()
                    .color_write_mask(vk::ColorComponentFlags::RGBA)
                    .blend_enable(true)
                    .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
                    .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
                    .color_blend_op(vk::BlendOp::ADD)
                    .src_alpha_blend_factor(vk::BlendFactor::ONE)
                    .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
                    .alpha_blend_op(vk::BlendOp::ADD)
                    .build()
            })
            .collect();

        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&stage_infos)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .render_pass(self.render_pass)
            .subpass(0);

        let pipeline = unsafe {
            match device.create_graphics_pipelines(
                vk::PipelineCache::null(),
                &[pipeline_info.build()],
                None,
            ) {
                Ok(pipelines) => pipelines[0],
                Err((_, e)) => {
                    device.destroy_pipeline_layout(layout, None);
                    return Err(VulkanError::Api(e));
                }
            }
        };

        self.context
            .set_object_name(pipeline, &format!("{}-pipeline", self.name));

        // Shader modules drop here with the builder.
        Ok(Pipeline {
            device,
            pipeline,
            layout,
        })
    }
}

/// Builder for compute pipelines
pub struct ComputePipelineBuilder<'a> {
    context: &'a VulkanContext,
    name: String,
    module: ShaderModule,
    set_layouts: Vec<vk::DescriptorSetLayout>,
    push_constant_ranges: Vec<vk::PushConstantRange>,
}

impl<'a> ComputePipelineBuilder<'a> {
    /// Load the single compute stage from a SPIR-V binary.
    pub fn new(context: &'a VulkanContext, name: &str, path: &Path) -> VulkanResult<Self> {
        let module = ShaderModule::from_file(context.raw_device(), path)?;
        context.set_object_name(module.handle(), &format!("{name}-shader"));
        Ok(Self {
            context,
            name: name.to_string(),
            module,
            set_layouts: Vec::new(),
            push_constant_ranges: Vec::new(),
        })
    }

    /// Reference a finalized descriptor set layout.
    #[must_use]
    pub fn add_descriptor_set_layout(mut self, layout: vk::DescriptorSetLayout) -> Self {
        self.set_layouts.push(layout);
        self
    }

    /// Append a push constant range.
    #[must_use]
    pub fn add_push_constant_range(
        mut self,
        stages: vk::ShaderStageFlags,
        offset: u32,
        size: u32,
    ) -> Self {
        self.push_constant_ranges.push(vk::PushConstantRange {
            stage_flags: stages,
            offset,
            size,
        });
        self
    }

    /// Assemble the layout and pipeline, consuming the builder.
    pub fn build(self) -> VulkanResult<Pipeline> {
        let device = self.context.raw_device();

        let layout = create_pipeline_layout(
            &device,
            &self.set_layouts,
            &self.push_constant_ranges,
        )?;

        let stage = self.module.stage_info(vk::ShaderStageFlags::COMPUTE);
        let pipeline_info = vk::ComputePipelineCreateInfo::builder()
            .stage(stage)
            .layout(layout);

        let pipeline = unsafe {
            match device.create_compute_pipelines(
                vk::PipelineCache::null(),
                &[pipeline_info.build()],
                None,
            ) {
                Ok(pipelines) => pipelines[0],
                Err((_, e)) => {
                    device.destroy_pipeline_layout(layout, None);
                    return Err(VulkanError::Api(e));
                }
            }
        };

        self.context
            .set_object_name(pipeline, &format!("{}-pipeline", self.name));

        Ok(Pipeline {
            device,
            pipeline,
            layout,
        })
    }
}
