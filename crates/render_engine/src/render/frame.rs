//! Frame orchestration
//!
//! Drives the per-frame state machine: wait on the slot fence, acquire a
//! swapchain image, record through the installed [`RenderGraph`], submit,
//! present, advance the slot. Swapchain staleness is reported to the caller
//! rather than handled here, since recreation needs the window.

use ash::vk;

use crate::render::vulkan::commands::{allocate_command_buffers, CommandRecorder};
use crate::render::vulkan::sync::{next_frame_slot, FrameSync};
use crate::render::vulkan::{Swapchain, VulkanContext, VulkanError, VulkanResult};

/// Everything a render graph needs to record one frame
pub struct FrameContext<'a> {
    /// Recorder for this slot's primary command buffer
    pub recorder: &'a mut CommandRecorder,
    /// Frame-in-flight slot index, for per-slot resources
    pub frame_slot: usize,
    /// Swapchain image index acquired for this frame
    pub image_index: u32,
    /// The swapchain being rendered into
    pub swapchain: &'a Swapchain,
}

/// A recording strategy the frame loop drives
///
/// The loop owns synchronization and presentation; implementors own passes,
/// pipelines, and extent-dependent resources.
pub trait RenderGraph {
    /// Record one frame's commands into `frame.recorder`.
    fn record(&mut self, frame: &mut FrameContext<'_>) -> VulkanResult<()>;

    /// Rebuild extent-dependent resources after the swapchain was recreated.
    fn on_swapchain_recreated(
        &mut self,
        context: &VulkanContext,
        swapchain: &Swapchain,
    ) -> VulkanResult<()>;
}

/// What happened to one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame was submitted and presented
    Presented {
        /// The presentation engine asked for swapchain recreation
        swapchain_stale: bool,
    },
    /// Acquisition found the swapchain out of date; nothing was recorded
    /// and the slot fence stayed signaled
    SkippedStale,
}

struct FrameSlot {
    sync: FrameSync,
    recorder: CommandRecorder,
}

/// Per-slot sync objects and command buffers, advanced round-robin
pub struct FrameLoop {
    slots: Vec<FrameSlot>,
    current: usize,
}

impl FrameLoop {
    /// Allocate sync objects and a command buffer per frame-in-flight slot.
    pub fn new(context: &VulkanContext, frames_in_flight: usize) -> VulkanResult<Self> {
        let device = context.raw_device();
        let buffers =
            allocate_command_buffers(&device, context.command_pool(), frames_in_flight as u32)?;

        let slots = buffers
            .into_iter()
            .map(|buffer| {
                Ok(FrameSlot {
                    sync: FrameSync::new(&device)?,
                    recorder: CommandRecorder::new(buffer, device.clone()),
                })
            })
            .collect::<VulkanResult<Vec<_>>>()?;

        Ok(Self { slots, current: 0 })
    }

    /// Number of frame-in-flight slots.
    #[must_use]
    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    /// Run one frame through `graph`.
    pub fn draw_frame(
        &mut self,
        context: &VulkanContext,
        swapchain: &Swapchain,
        graph: &mut dyn RenderGraph,
    ) -> VulkanResult<FrameOutcome> {
        let slot_index = self.current;
        let slot = &mut self.slots[slot_index];

        slot.sync.in_flight.wait()?;

        let Some(image_index) =
            swapchain.acquire_next_image(slot.sync.image_available.handle())?
        else {
            // Fence stays signaled; the retry after recreation waits on it
            // again without deadlocking.
            return Ok(FrameOutcome::SkippedStale);
        };

        slot.sync.in_flight.reset()?;
        slot.recorder.reset()?;
        slot.recorder.begin()?;

        let mut frame = FrameContext {
            recorder: &mut slot.recorder,
            frame_slot: slot_index,
            image_index,
            swapchain,
        };
        graph.record(&mut frame)?;

        slot.recorder.end()?;

        let wait_semaphores = [slot.sync.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [slot.recorder.buffer()];
        let signal_semaphores = [slot.sync.render_finished.handle()];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            context
                .device()
                .queue_submit(
                    context.graphics_queue(),
                    &[submit_info.build()],
                    slot.sync.in_flight.handle(),
                )
                .map_err(VulkanError::Api)?;
        }

        let swapchain_stale = swapchain.present(
            context.present_queue(),
            image_index,
            slot.sync.render_finished.handle(),
        )?;

        self.current = next_frame_slot(self.current, self.slots.len());
        Ok(FrameOutcome::Presented { swapchain_stale })
    }
}
