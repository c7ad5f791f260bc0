//! Engine assembly and main loop
//!
//! Wires the window, Vulkan context, swapchain, model registry, deferred
//! graph, and frame loop together, and owns the recreation policy when the
//! surface goes stale or the window resizes.

use ash::vk;
use thiserror::Error;

use crate::core::config::EngineConfig;
use crate::render::deferred::DeferredRenderer;
use crate::render::frame::{FrameLoop, FrameOutcome, RenderGraph};
use crate::render::registry::{DrawItem, ModelRegistry};
use crate::render::scene::SceneData;
use crate::render::vulkan::{Swapchain, VulkanContext, VulkanError, Window, WindowError};

/// Top-level engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// The configuration failed validation
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Window or surface setup failed
    #[error(transparent)]
    Window(#[from] WindowError),

    /// Any Vulkan backend failure
    #[error(transparent)]
    Vulkan(#[from] VulkanError),

    /// The scene referenced a mesh or material index it never declared
    #[error("scene references out-of-range {kind} index {index}")]
    SceneIndex {
        /// Which table the index points into
        kind: &'static str,
        /// The offending index
        index: usize,
    },
}

/// The assembled engine
///
/// Field order doubles as teardown order: the renderer and frame resources
/// go before the swapchain, the swapchain before the context, and the
/// window outlives the surface the context destroys.
pub struct Engine {
    renderer: DeferredRenderer,
    frame_loop: FrameLoop,
    swapchain: Swapchain,
    context: VulkanContext,
    window: Window,
}

impl Engine {
    /// Build the engine and upload `scene` to the device.
    pub fn new(config: EngineConfig, scene: &SceneData) -> Result<Self, EngineError> {
        config.validate().map_err(EngineError::Config)?;

        let mut window = Window::new(
            &config.window.title,
            config.window.width,
            config.window.height,
        )?;
        let context = VulkanContext::new(
            &mut window,
            &config.window.title,
            config.renderer.validation_enabled(),
        )?;

        let (width, height) = window.framebuffer_size();
        let swapchain = Swapchain::new(
            &context,
            vk::Extent2D { width, height },
            vk::SwapchainKHR::null(),
        )?;

        let (registry, draw_list) = Self::upload_scene(&context, scene)?;
        let renderer = DeferredRenderer::new(
            &context,
            &swapchain,
            &config.renderer,
            registry,
            draw_list,
        )?;
        let frame_loop = FrameLoop::new(&context, config.renderer.frames_in_flight)?;

        log::info!(
            "engine ready: {} nodes, {} frames in flight",
            scene.effective_nodes().len(),
            config.renderer.frames_in_flight
        );

        Ok(Self {
            renderer,
            frame_loop,
            swapchain,
            context,
            window,
        })
    }

    fn upload_scene(
        context: &VulkanContext,
        scene: &SceneData,
    ) -> Result<(ModelRegistry, Vec<DrawItem>), EngineError> {
        let mut registry = ModelRegistry::new();

        let mut material_keys = Vec::with_capacity(scene.materials.len());
        for material in &scene.materials {
            material_keys.push(registry.add_material(material.clone())?);
        }

        let mut mesh_keys = Vec::with_capacity(scene.meshes.len());
        for mesh in &scene.meshes {
            let material = *material_keys.get(mesh.material_index).ok_or(
                EngineError::SceneIndex {
                    kind: "material",
                    index: mesh.material_index,
                },
            )?;
            mesh_keys.push(registry.add_mesh(mesh, material)?);
        }

        registry.upload(context)?;

        let draw_list = scene
            .effective_nodes()
            .into_iter()
            .map(|node| {
                let mesh = *mesh_keys.get(node.mesh_index).ok_or(EngineError::SceneIndex {
                    kind: "mesh",
                    index: node.mesh_index,
                })?;
                Ok(DrawItem {
                    mesh,
                    transform: node.transform,
                })
            })
            .collect::<Result<Vec<_>, EngineError>>()?;

        Ok((registry, draw_list))
    }

    /// The deferred graph, for camera and lighting control.
    pub fn renderer_mut(&mut self) -> &mut DeferredRenderer {
        &mut self.renderer
    }

    /// Run the main loop until the window closes.
    pub fn run(&mut self) -> Result<(), EngineError> {
        log::info!("entering main loop");
        while !self.window.should_close() {
            self.window.poll_events();
            if self.window.should_close() {
                break;
            }
            if self.window.take_resized() {
                self.recreate_swapchain()?;
            }

            match self
                .frame_loop
                .draw_frame(&self.context, &self.swapchain, &mut self.renderer)?
            {
                FrameOutcome::Presented {
                    swapchain_stale: false,
                } => {}
                FrameOutcome::Presented {
                    swapchain_stale: true,
                }
                | FrameOutcome::SkippedStale => self.recreate_swapchain()?,
            }
        }

        self.context.wait_idle()?;
        log::info!("main loop exited");
        Ok(())
    }

    /// Rebuild the swapchain and every extent-dependent resource.
    ///
    /// Blocks while the framebuffer has zero area (minimized window).
    fn recreate_swapchain(&mut self) -> Result<(), EngineError> {
        loop {
            let (width, height) = self.window.framebuffer_size();
            if width > 0 && height > 0 {
                break;
            }
            self.window.wait_events();
            if self.window.should_close() {
                return Ok(());
            }
        }

        self.context.wait_idle()?;

        let (width, height) = self.window.framebuffer_size();
        let replacement = Swapchain::new(
            &self.context,
            vk::Extent2D { width, height },
            self.swapchain.handle(),
        )?;
        // The old swapchain drops here, after serving as old_swapchain.
        self.swapchain = replacement;

        self.renderer
            .on_swapchain_recreated(&self.context, &self.swapchain)?;
        Ok(())
    }
}
