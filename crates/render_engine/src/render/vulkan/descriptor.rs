//! Descriptor set and layout builders
//!
//! A layout accumulates typed bindings and finalizes exactly once into a
//! native layout object. A set bound to a finalized layout is filled binding
//! by binding, in declaration order, then finalized with one batched
//! descriptor write. Contract violations surface as [`DescriptorError`]
//! immediately at the violating call.

use ash::{vk, Device};
use thiserror::Error;

use crate::render::vulkan::context::VulkanContext;

/// Descriptor builder contract violations and allocation failures
#[derive(Error, Debug)]
pub enum DescriptorError {
    /// A binding was added, or finalization re-attempted, after the layout
    /// was finalized
    #[error("descriptor set layout already finalized")]
    LayoutAlreadyFinalized,

    /// A set was constructed against a layout that has not been finalized
    #[error("descriptor set layout not finalized")]
    LayoutNotFinalized,

    /// More binding fills were supplied than the layout declares
    #[error("binding {binding} is out of range for layout with {count} bindings")]
    BindingOutOfRange {
        /// Binding index the fill would have targeted
        binding: u32,
        /// Number of bindings the layout declares
        count: u32,
    },

    /// The supplied collection length differs from the declared array count
    #[error("binding {binding} expects {expected} descriptors, got {actual}")]
    BindingArityMismatch {
        /// Binding index being filled
        binding: u32,
        /// Declared descriptor count
        expected: u32,
        /// Supplied descriptor count
        actual: u32,
    },

    /// Image data supplied to a buffer binding or vice versa
    #[error("binding {binding} has type {declared:?}, incompatible with the supplied resources")]
    BindingTypeMismatch {
        /// Binding index being filled
        binding: u32,
        /// Type the layout declares for this binding
        declared: vk::DescriptorType,
    },

    /// Finalization attempted before every binding was filled
    #[error("descriptor set incomplete: {filled} of {expected} bindings filled")]
    IncompleteBindings {
        /// Number of bindings filled so far
        filled: u32,
        /// Number of bindings the layout declares
        expected: u32,
    },

    /// The set was already finalized
    #[error("descriptor set already created")]
    AlreadyCreated,

    /// Native allocation or creation failure
    #[error("Vulkan API error: {0}")]
    Api(#[from] vk::Result),
}

/// One declared binding in a layout
#[derive(Debug, Clone, Copy)]
pub struct BindingDesc {
    /// Descriptor type
    pub ty: vk::DescriptorType,
    /// Shader stages that can see this binding
    pub stages: vk::ShaderStageFlags,
    /// Array element count
    pub count: u32,
}

fn is_image_type(ty: vk::DescriptorType) -> bool {
    matches!(
        ty,
        vk::DescriptorType::COMBINED_IMAGE_SAMPLER
            | vk::DescriptorType::SAMPLED_IMAGE
            | vk::DescriptorType::STORAGE_IMAGE
    )
}

fn is_buffer_type(ty: vk::DescriptorType) -> bool {
    matches!(
        ty,
        vk::DescriptorType::UNIFORM_BUFFER | vk::DescriptorType::STORAGE_BUFFER
    )
}

/// Pure fill-order state machine shared by [`DescriptorSet`]
///
/// Tracks the next expected binding and validates arity and type class
/// without touching the device, so the contract is testable on its own.
#[derive(Debug, Clone)]
struct FillCursor {
    bindings: Vec<BindingDesc>,
    next: u32,
}

impl FillCursor {
    fn new(bindings: Vec<BindingDesc>) -> Self {
        Self { bindings, next: 0 }
    }

    fn accept(
        &mut self,
        supplied: u32,
        type_ok: fn(vk::DescriptorType) -> bool,
    ) -> Result<u32, DescriptorError> {
        let binding = self.next;
        let count = self.bindings.len() as u32;
        let Some(desc) = self.bindings.get(binding as usize) else {
            return Err(DescriptorError::BindingOutOfRange { binding, count });
        };
        if !type_ok(desc.ty) {
            return Err(DescriptorError::BindingTypeMismatch {
                binding,
                declared: desc.ty,
            });
        }
        if supplied != desc.count {
            return Err(DescriptorError::BindingArityMismatch {
                binding,
                expected: desc.count,
                actual: supplied,
            });
        }
        self.next += 1;
        Ok(binding)
    }

    fn accept_images(&mut self, supplied: u32) -> Result<u32, DescriptorError> {
        self.accept(supplied, is_image_type)
    }

    fn accept_buffers(&mut self, supplied: u32) -> Result<u32, DescriptorError> {
        self.accept(supplied, is_buffer_type)
    }

    fn ensure_complete(&self) -> Result<(), DescriptorError> {
        let expected = self.bindings.len() as u32;
        if self.next < expected {
            return Err(DescriptorError::IncompleteBindings {
                filled: self.next,
                expected,
            });
        }
        Ok(())
    }
}

/// Append-only descriptor set layout, finalized exactly once
pub struct DescriptorSetLayout {
    device: Device,
    bindings: Vec<BindingDesc>,
    layout: Option<vk::DescriptorSetLayout>,
}

impl DescriptorSetLayout {
    /// Start an empty layout.
    #[must_use]
    pub fn new(context: &VulkanContext) -> Self {
        Self {
            device: context.raw_device(),
            bindings: Vec::new(),
            layout: None,
        }
    }

    /// Append a binding. Indices are assigned sequentially from 0 in call
    /// order. Fails after [`Self::create_layout`].
    pub fn add_binding(
        &mut self,
        ty: vk::DescriptorType,
        stages: vk::ShaderStageFlags,
        count: u32,
    ) -> Result<u32, DescriptorError> {
        if self.layout.is_some() {
            return Err(DescriptorError::LayoutAlreadyFinalized);
        }
        let index = self.bindings.len() as u32;
        self.bindings.push(BindingDesc { ty, stages, count });
        Ok(index)
    }

    /// Finalize into the native layout object. Callable exactly once.
    pub fn create_layout(&mut self) -> Result<(), DescriptorError> {
        if self.layout.is_some() {
            return Err(DescriptorError::LayoutAlreadyFinalized);
        }

        let native_bindings: Vec<vk::DescriptorSetLayoutBinding> = self
            .bindings
            .iter()
            .enumerate()
            .map(|(index, desc)| {
                vk::DescriptorSetLayoutBinding::builder()
                    .binding(index as u32)
                    .descriptor_type(desc.ty)
                    .descriptor_count(desc.count)
                    .stage_flags(desc.stages)
                    .build()
            })
            .collect();

        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&native_bindings);
        let layout = unsafe { self.device.create_descriptor_set_layout(&layout_info, None)? };
        self.layout = Some(layout);
        Ok(())
    }

    /// The finalized layout handle.
    pub fn handle(&self) -> Result<vk::DescriptorSetLayout, DescriptorError> {
        self.layout.ok_or(DescriptorError::LayoutNotFinalized)
    }

    /// Declared bindings.
    #[must_use]
    pub fn bindings(&self) -> &[BindingDesc] {
        &self.bindings
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        if let Some(layout) = self.layout.take() {
            unsafe {
                self.device.destroy_descriptor_set_layout(layout, None);
            }
        }
    }
}

/// Descriptor set filled binding-by-binding against one finalized layout
pub struct DescriptorSet {
    device: Device,
    pool: vk::DescriptorPool,
    layout: vk::DescriptorSetLayout,
    cursor: FillCursor,
    // Staging accumulators, discarded after the batched write.
    image_infos: Vec<Vec<vk::DescriptorImageInfo>>,
    buffer_infos: Vec<Vec<vk::DescriptorBufferInfo>>,
    binding_records: Vec<(u32, vk::DescriptorType, bool)>,
    set: Option<vk::DescriptorSet>,
}

impl DescriptorSet {
    /// Start filling a set against a finalized layout, allocating from the
    /// context's shared pool.
    pub fn new(
        context: &VulkanContext,
        layout: &DescriptorSetLayout,
    ) -> Result<Self, DescriptorError> {
        let handle = layout.handle()?;
        Ok(Self {
            device: context.raw_device(),
            pool: context.descriptor_pool(),
            layout: handle,
            cursor: FillCursor::new(layout.bindings().to_vec()),
            image_infos: Vec::new(),
            buffer_infos: Vec::new(),
            binding_records: Vec::new(),
            set: None,
        })
    }

    /// Fill the next binding with image descriptors.
    ///
    /// `views`, `samplers`, and `layouts` must all have the declared array
    /// count for the binding; storage-image bindings pass null samplers.
    pub fn add_images_to_binding(
        &mut self,
        views: &[vk::ImageView],
        samplers: &[vk::Sampler],
        layouts: &[vk::ImageLayout],
    ) -> Result<(), DescriptorError> {
        if self.set.is_some() {
            return Err(DescriptorError::AlreadyCreated);
        }
        if views.len() != samplers.len() || views.len() != layouts.len() {
            let binding = self.cursor.next;
            return Err(DescriptorError::BindingArityMismatch {
                binding,
                expected: views.len() as u32,
                actual: samplers.len().min(layouts.len()) as u32,
            });
        }

        let binding = self.cursor.accept_images(views.len() as u32)?;
        let ty = self.cursor.bindings[binding as usize].ty;

        let infos: Vec<vk::DescriptorImageInfo> = views
            .iter()
            .zip(samplers)
            .zip(layouts)
            .map(|((&view, &sampler), &layout)| vk::DescriptorImageInfo {
                sampler,
                image_view: view,
                image_layout: layout,
            })
            .collect();

        self.image_infos.push(infos);
        self.binding_records.push((binding, ty, true));
        Ok(())
    }

    /// Fill the next binding with whole-buffer descriptors.
    pub fn add_buffers_to_binding(
        &mut self,
        buffers: &[(vk::Buffer, vk::DeviceSize)],
    ) -> Result<(), DescriptorError> {
        if self.set.is_some() {
            return Err(DescriptorError::AlreadyCreated);
        }

        let binding = self.cursor.accept_buffers(buffers.len() as u32)?;
        let ty = self.cursor.bindings[binding as usize].ty;

        let infos: Vec<vk::DescriptorBufferInfo> = buffers
            .iter()
            .map(|&(buffer, range)| vk::DescriptorBufferInfo {
                buffer,
                offset: 0,
                range,
            })
            .collect();

        self.buffer_infos.push(infos);
        self.binding_records.push((binding, ty, false));
        Ok(())
    }

    /// Allocate the native set and flush every staged binding in one
    /// batched write. Fails unless all declared bindings have been filled.
    pub fn create_descriptor_set(&mut self) -> Result<vk::DescriptorSet, DescriptorError> {
        if self.set.is_some() {
            return Err(DescriptorError::AlreadyCreated);
        }
        self.cursor.ensure_complete()?;

        let layouts = [self.layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts);
        let set = unsafe { self.device.allocate_descriptor_sets(&alloc_info)?[0] };

        let mut writes = Vec::with_capacity(self.binding_records.len());
        let mut image_iter = self.image_infos.iter();
        let mut buffer_iter = self.buffer_infos.iter();
        for &(binding, ty, is_image) in &self.binding_records {
            let mut write = vk::WriteDescriptorSet::builder()
                .dst_set(set)
                .dst_binding(binding)
                .dst_array_element(0)
                .descriptor_type(ty);
            if is_image {
                let infos = image_iter.next().expect("staged image infos");
                write = write.image_info(infos);
            } else {
                let infos = buffer_iter.next().expect("staged buffer infos");
                write = write.buffer_info(infos);
            }
            writes.push(write.build());
        }

        unsafe {
            self.device.update_descriptor_sets(&writes, &[]);
        }

        // Staging maps are scratch state; the native set holds the data now.
        self.image_infos.clear();
        self.buffer_infos.clear();
        self.binding_records.clear();

        self.set = Some(set);
        Ok(set)
    }

    /// The finalized set handle, if created.
    #[must_use]
    pub fn handle(&self) -> Option<vk::DescriptorSet> {
        self.set
    }
}

impl Drop for DescriptorSet {
    fn drop(&mut self) {
        if let Some(set) = self.set.take() {
            unsafe {
                let _ = self.device.free_descriptor_sets(self.pool, &[set]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bindings() -> Vec<BindingDesc> {
        vec![
            BindingDesc {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                stages: vk::ShaderStageFlags::VERTEX,
                count: 1,
            },
            BindingDesc {
                ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                stages: vk::ShaderStageFlags::FRAGMENT,
                count: 4,
            },
            BindingDesc {
                ty: vk::DescriptorType::STORAGE_IMAGE,
                stages: vk::ShaderStageFlags::COMPUTE,
                count: 1,
            },
        ]
    }

    #[test]
    fn fills_in_declared_order() {
        let mut cursor = FillCursor::new(sample_bindings());
        assert_eq!(cursor.accept_buffers(1).unwrap(), 0);
        assert_eq!(cursor.accept_images(4).unwrap(), 1);
        assert_eq!(cursor.accept_images(1).unwrap(), 2);
        assert!(cursor.ensure_complete().is_ok());
    }

    #[test]
    fn rejects_type_mismatch() {
        let mut cursor = FillCursor::new(sample_bindings());
        // Binding 0 is a uniform buffer; supplying images must fail.
        let err = cursor.accept_images(1).unwrap_err();
        assert!(matches!(
            err,
            DescriptorError::BindingTypeMismatch { binding: 0, .. }
        ));
        // The cursor must not advance on failure.
        assert_eq!(cursor.accept_buffers(1).unwrap(), 0);
    }

    #[test]
    fn rejects_arity_mismatch() {
        let mut cursor = FillCursor::new(sample_bindings());
        cursor.accept_buffers(1).unwrap();
        let err = cursor.accept_images(3).unwrap_err();
        assert!(matches!(
            err,
            DescriptorError::BindingArityMismatch {
                binding: 1,
                expected: 4,
                actual: 3,
            }
        ));
    }

    #[test]
    fn incomplete_fill_cannot_finalize() {
        let mut cursor = FillCursor::new(sample_bindings());
        cursor.accept_buffers(1).unwrap();
        let err = cursor.ensure_complete().unwrap_err();
        assert!(matches!(
            err,
            DescriptorError::IncompleteBindings {
                filled: 1,
                expected: 3,
            }
        ));
    }

    #[test]
    fn rejects_fill_past_last_binding() {
        let mut cursor = FillCursor::new(vec![BindingDesc {
            ty: vk::DescriptorType::UNIFORM_BUFFER,
            stages: vk::ShaderStageFlags::VERTEX,
            count: 1,
        }]);
        cursor.accept_buffers(1).unwrap();
        let err = cursor.accept_buffers(1).unwrap_err();
        assert!(matches!(
            err,
            DescriptorError::BindingOutOfRange {
                binding: 1,
                count: 1,
            }
        ));
    }

    #[test]
    fn empty_layout_completes_immediately() {
        let cursor = FillCursor::new(Vec::new());
        assert!(cursor.ensure_complete().is_ok());
    }
}
