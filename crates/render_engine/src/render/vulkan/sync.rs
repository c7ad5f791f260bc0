//! Frame synchronization primitives
//!
//! Semaphores order GPU work against other GPU work; fences let the CPU
//! observe GPU completion. One [`FrameSync`] exists per frame-in-flight slot
//! and persists across swapchain recreation.

use ash::{vk, Device};

use crate::render::vulkan::{VulkanError, VulkanResult};

/// Binary semaphore with RAII cleanup
pub struct Semaphore {
    device: Device,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create an unsignaled semaphore.
    pub fn new(device: Device) -> VulkanResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::builder();
        let semaphore = unsafe {
            device
                .create_semaphore(&create_info, None)
                .map_err(VulkanError::Api)?
        };
        Ok(Self { device, semaphore })
    }

    /// The semaphore handle.
    #[must_use]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Fence with RAII cleanup
pub struct Fence {
    device: Device,
    fence: vk::Fence,
}

impl Fence {
    /// Create a fence, optionally already signaled.
    ///
    /// Frame fences start signaled so the first wait on each slot returns
    /// immediately.
    pub fn new(device: Device, signaled: bool) -> VulkanResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::builder().flags(flags);
        let fence = unsafe {
            device
                .create_fence(&create_info, None)
                .map_err(VulkanError::Api)?
        };
        Ok(Self { device, fence })
    }

    /// Block until the fence signals.
    pub fn wait(&self) -> VulkanResult<()> {
        unsafe {
            self.device
                .wait_for_fences(&[self.fence], true, u64::MAX)
                .map_err(VulkanError::Api)
        }
    }

    /// Reset to unsignaled.
    pub fn reset(&self) -> VulkanResult<()> {
        unsafe {
            self.device
                .reset_fences(&[self.fence])
                .map_err(VulkanError::Api)
        }
    }

    /// The fence handle.
    #[must_use]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.fence, None);
        }
    }
}

/// Per-slot synchronization objects for one frame in flight
pub struct FrameSync {
    /// Signaled when the swapchain image is ready to be rendered into
    pub image_available: Semaphore,
    /// Signaled when this slot's rendering commands have finished
    pub render_finished: Semaphore,
    /// Signaled when the GPU has fully consumed this slot's command buffer
    pub in_flight: Fence,
}

impl FrameSync {
    /// Create the sync objects for one slot. The fence starts signaled.
    pub fn new(device: &Device) -> VulkanResult<Self> {
        Ok(Self {
            image_available: Semaphore::new(device.clone())?,
            render_finished: Semaphore::new(device.clone())?,
            in_flight: Fence::new(device.clone(), true)?,
        })
    }
}

/// Advance a frame-in-flight slot index.
#[must_use]
pub fn next_frame_slot(current: usize, frames_in_flight: usize) -> usize {
    (current + 1) % frames_in_flight
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_index_cycles_modulo_n() {
        assert_eq!(next_frame_slot(0, 2), 1);
        assert_eq!(next_frame_slot(1, 2), 0);
        assert_eq!(next_frame_slot(2, 3), 0);
    }

    #[test]
    fn slot_sequence_visits_every_slot() {
        let mut slot = 0;
        let mut seen = [false; 3];
        for _ in 0..6 {
            seen[slot] = true;
            slot = next_frame_slot(slot, 3);
        }
        assert!(seen.iter().all(|&s| s));
        assert_eq!(slot, 0);
    }
}
