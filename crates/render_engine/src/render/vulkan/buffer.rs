//! GPU buffer management
//!
//! Buffers pair a native handle with a dedicated allocation sized per the
//! driver's reported requirements. Three usage modes cover the engine's
//! needs: device-local static data, persistently mapped per-frame data, and
//! one-time staged uploads.

use ash::{vk, Device};
use bytemuck::Pod;

use crate::render::vulkan::commands::SingleTimeCommands;
use crate::render::vulkan::context::VulkanContext;
use crate::render::vulkan::{VulkanError, VulkanResult};

/// How a buffer's memory is accessed over its lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferMode {
    /// Device-local, never host-accessible. Written once via a staging copy.
    GpuOnly,
    /// Host-visible and coherent, persistently mapped for per-frame updates.
    ContinuousTransfer,
    /// Uploaded once through a transient staging buffer into device-local
    /// memory; no host access afterward.
    OneTimeTransfer,
}

/// Select a memory type satisfying both the resource's type mask and the
/// requested property flags.
pub fn find_memory_type(
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
) -> VulkanResult<u32> {
    for i in 0..memory_properties.memory_type_count {
        if (type_filter & (1 << i)) != 0
            && memory_properties.memory_types[i as usize]
                .property_flags
                .contains(properties)
        {
            return Ok(i);
        }
    }
    Err(VulkanError::NoSuitableMemoryType)
}

fn allocate_bound_buffer(
    device: &Device,
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    size: vk::DeviceSize,
    usage: vk::BufferUsageFlags,
    properties: vk::MemoryPropertyFlags,
) -> VulkanResult<(vk::Buffer, vk::DeviceMemory)> {
    let buffer_info = vk::BufferCreateInfo::builder()
        .size(size)
        .usage(usage)
        .sharing_mode(vk::SharingMode::EXCLUSIVE);

    let buffer = unsafe {
        device
            .create_buffer(&buffer_info, None)
            .map_err(VulkanError::Api)?
    };

    let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
    let memory_type_index =
        match find_memory_type(requirements.memory_type_bits, properties, memory_properties) {
            Ok(index) => index,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

    let alloc_info = vk::MemoryAllocateInfo::builder()
        .allocation_size(requirements.size)
        .memory_type_index(memory_type_index);

    let memory = unsafe {
        match device.allocate_memory(&alloc_info, None) {
            Ok(memory) => memory,
            Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_OUT_OF_HOST_MEMORY) => {
                device.destroy_buffer(buffer, None);
                return Err(VulkanError::OutOfMemory {
                    requested: requirements.size,
                });
            }
            Err(e) => {
                device.destroy_buffer(buffer, None);
                return Err(VulkanError::Api(e));
            }
        }
    };

    unsafe {
        if let Err(e) = device.bind_buffer_memory(buffer, memory, 0) {
            device.destroy_buffer(buffer, None);
            device.free_memory(memory, None);
            return Err(VulkanError::Api(e));
        }
    }

    Ok((buffer, memory))
}

/// GPU buffer with dedicated memory and RAII cleanup
pub struct Buffer {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
    mapped: *mut std::ffi::c_void,
    mode: BufferMode,
}

impl Buffer {
    /// Create a buffer in the given mode.
    ///
    /// `data` is required for [`BufferMode::OneTimeTransfer`] and optional
    /// for [`BufferMode::ContinuousTransfer`] (written through the
    /// persistent mapping when present). It is rejected for
    /// [`BufferMode::GpuOnly`].
    pub fn new(
        context: &VulkanContext,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        mode: BufferMode,
        data: Option<&[u8]>,
    ) -> VulkanResult<Self> {
        if size == 0 {
            return Err(VulkanError::ResourceCreationFailure {
                reason: "buffer size must be non-zero".to_string(),
            });
        }

        match mode {
            BufferMode::GpuOnly => {
                if data.is_some() {
                    return Err(VulkanError::InvalidOperation {
                        reason: "GpuOnly buffers cannot take initial data".to_string(),
                    });
                }
                Self::new_unmapped(context, size, usage, mode)
            }
            BufferMode::ContinuousTransfer => {
                let mut buffer = Self::new_mapped(context, size, usage)?;
                if let Some(bytes) = data {
                    buffer.write_bytes(bytes)?;
                }
                Ok(buffer)
            }
            BufferMode::OneTimeTransfer => {
                let bytes = data.ok_or_else(|| VulkanError::InvalidOperation {
                    reason: "OneTimeTransfer buffers require initial data".to_string(),
                })?;
                Self::new_staged(context, size, usage, bytes)
            }
        }
    }

    fn new_unmapped(
        context: &VulkanContext,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        mode: BufferMode,
    ) -> VulkanResult<Self> {
        let device = context.raw_device();
        let (buffer, memory) = allocate_bound_buffer(
            &device,
            context.memory_properties(),
            size,
            usage,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;
        Ok(Self {
            device,
            buffer,
            memory,
            size,
            mapped: std::ptr::null_mut(),
            mode,
        })
    }

    fn new_mapped(
        context: &VulkanContext,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
    ) -> VulkanResult<Self> {
        let device = context.raw_device();
        let (buffer, memory) = allocate_bound_buffer(
            &device,
            context.memory_properties(),
            size,
            usage,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;

        let mapped = unsafe {
            match device.map_memory(memory, 0, size, vk::MemoryMapFlags::empty()) {
                Ok(ptr) => ptr,
                Err(e) => {
                    device.destroy_buffer(buffer, None);
                    device.free_memory(memory, None);
                    return Err(VulkanError::Api(e));
                }
            }
        };

        Ok(Self {
            device,
            buffer,
            memory,
            size,
            mapped,
            mode: BufferMode::ContinuousTransfer,
        })
    }

    fn new_staged(
        context: &VulkanContext,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        bytes: &[u8],
    ) -> VulkanResult<Self> {
        if bytes.len() as vk::DeviceSize > size {
            return Err(VulkanError::InvalidOperation {
                reason: "initial data exceeds buffer size".to_string(),
            });
        }

        let staging = Self::new(
            context,
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            BufferMode::ContinuousTransfer,
            Some(bytes),
        )?;

        let destination = Self::new_unmapped(
            context,
            size,
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            BufferMode::OneTimeTransfer,
        )?;

        copy_buffer(context, staging.buffer, destination.buffer, size)?;
        // Staging buffer drops here, after the copy has completed.
        Ok(destination)
    }

    /// Write POD data through the persistent mapping.
    ///
    /// Only valid for [`BufferMode::ContinuousTransfer`] buffers.
    pub fn write<T: Pod>(&mut self, data: &[T]) -> VulkanResult<()> {
        self.write_bytes(bytemuck::cast_slice(data))
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> VulkanResult<()> {
        if self.mode != BufferMode::ContinuousTransfer {
            return Err(VulkanError::InvalidOperation {
                reason: "buffer is not host-mapped".to_string(),
            });
        }
        if bytes.len() as vk::DeviceSize > self.size {
            return Err(VulkanError::InvalidOperation {
                reason: "write exceeds buffer size".to_string(),
            });
        }
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.mapped.cast::<u8>(), bytes.len());
        }
        Ok(())
    }

    /// Read the buffer's contents back through a staging download.
    ///
    /// The buffer must have been created with `TRANSFER_SRC` usage.
    pub fn download(&self, context: &VulkanContext) -> VulkanResult<Vec<u8>> {
        let readback = Self::new_mapped(
            context,
            self.size,
            vk::BufferUsageFlags::TRANSFER_DST,
        )?;
        copy_buffer(context, self.buffer, readback.buffer, self.size)?;

        let mut contents = vec![0u8; self.size as usize];
        unsafe {
            std::ptr::copy_nonoverlapping(
                readback.mapped.cast::<u8>(),
                contents.as_mut_ptr(),
                contents.len(),
            );
        }
        Ok(contents)
    }

    /// The buffer handle.
    #[must_use]
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Size in bytes.
    #[must_use]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// The buffer's transfer mode.
    #[must_use]
    pub fn mode(&self) -> BufferMode {
        self.mode
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            if !self.mapped.is_null() {
                self.device.unmap_memory(self.memory);
            }
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Record and execute a device-side buffer copy, waiting for completion.
fn copy_buffer(
    context: &VulkanContext,
    src: vk::Buffer,
    dst: vk::Buffer,
    size: vk::DeviceSize,
) -> VulkanResult<()> {
    let commands = SingleTimeCommands::begin(context)?;
    let region = vk::BufferCopy::builder().size(size).build();
    unsafe {
        context
            .device()
            .cmd_copy_buffer(commands.buffer(), src, dst, &[region]);
    }
    commands.submit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_memory_properties() -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties::default();
        props.memory_type_count = 3;
        props.memory_types[0].property_flags = vk::MemoryPropertyFlags::DEVICE_LOCAL;
        props.memory_types[1].property_flags =
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        props.memory_types[2].property_flags = vk::MemoryPropertyFlags::DEVICE_LOCAL
            | vk::MemoryPropertyFlags::HOST_VISIBLE
            | vk::MemoryPropertyFlags::HOST_COHERENT;
        props
    }

    #[test]
    fn selects_device_local_type() {
        let props = fake_memory_properties();
        let index =
            find_memory_type(0b111, vk::MemoryPropertyFlags::DEVICE_LOCAL, &props).unwrap();
        assert_eq!(index, 0);
    }

    #[test]
    fn selects_host_visible_coherent_type() {
        let props = fake_memory_properties();
        let index = find_memory_type(
            0b111,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            &props,
        )
        .unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn respects_type_filter_mask() {
        let props = fake_memory_properties();
        // Only type 2 allowed by the filter.
        let index =
            find_memory_type(0b100, vk::MemoryPropertyFlags::DEVICE_LOCAL, &props).unwrap();
        assert_eq!(index, 2);
    }

    #[test]
    fn fails_when_no_type_matches() {
        let props = fake_memory_properties();
        let result = find_memory_type(
            0b001,
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            &props,
        );
        assert!(matches!(result, Err(VulkanError::NoSuitableMemoryType)));
    }

    #[test]
    fn fails_on_empty_filter() {
        let props = fake_memory_properties();
        let result = find_memory_type(0, vk::MemoryPropertyFlags::DEVICE_LOCAL, &props);
        assert!(matches!(result, Err(VulkanError::NoSuitableMemoryType)));
    }
}
