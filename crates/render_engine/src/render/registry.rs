//! Model registry
//!
//! Owns every uploaded mesh and material. Geometry from all registered
//! meshes is merged into one vertex buffer and one index buffer; each mesh
//! keeps a range record for indexed draws. Materials resolve to either an
//! entry in the texture array or an entry in the flat color table, both
//! bound through one shared descriptor set.

use ash::vk;
use slotmap::{new_key_type, SlotMap};

use crate::foundation::math::Mat4;
use crate::render::scene::{AlbedoSource, MaterialData, MeshData, TextureType, Vertex};
use crate::render::vulkan::{
    Buffer, BufferMode, DescriptorSet, DescriptorSetLayout, Image, ImageView, Sampler,
    VulkanContext, VulkanError, VulkanResult,
};

/// Capacity of the bound texture array; the geometry shader declares the
/// same fixed size. Unused slots repeat the fallback texture.
pub const MAX_MATERIAL_TEXTURES: u32 = 16;

new_key_type! {
    /// Stable handle to a registered mesh
    pub struct MeshKey;
    /// Stable handle to a registered material
    pub struct MaterialKey;
}

/// Draw range of one mesh inside the merged buffers
#[derive(Debug, Clone, Copy)]
pub struct MeshRange {
    /// Offset into the merged index buffer
    pub first_index: u32,
    /// Number of indices to draw
    pub index_count: u32,
    /// Offset added to each index before vertex fetch
    pub vertex_offset: i32,
    /// Material this mesh draws with
    pub material: MaterialKey,
}

/// Shader-facing indices and surface terms resolved for a material
#[derive(Debug, Clone, Copy)]
pub struct MaterialBinding {
    /// Index into the bound texture array
    pub texture_index: u32,
    /// Index into the flat color table
    pub color_index: u32,
    /// Which of the two the shader should use
    pub texture_type: TextureType,
    /// Metallic term written to the G-buffer
    pub metallic: f32,
    /// Roughness term written to the G-buffer
    pub roughness: f32,
}

struct MaterialRecord {
    binding: MaterialBinding,
    // Encoded image bytes held until upload decodes them.
    pending_bytes: Option<Vec<u8>>,
}

/// One node to draw: a mesh handle plus its placement
#[derive(Debug, Clone)]
pub struct DrawItem {
    /// Mesh to draw
    pub mesh: MeshKey,
    /// Node transform applied on top of the model transform
    pub transform: Mat4,
}

struct TextureResources {
    view: ImageView,
    sampler: Sampler,
}

struct RegistryGpu {
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    color_buffer: Buffer,
    textures: Vec<TextureResources>,
    layout: DescriptorSetLayout,
    set: DescriptorSet,
    set_handle: vk::DescriptorSet,
}

/// Registry of uploaded meshes and materials
pub struct ModelRegistry {
    meshes: SlotMap<MeshKey, MeshRange>,
    materials: SlotMap<MaterialKey, MaterialRecord>,
    pending_vertices: Vec<Vertex>,
    pending_indices: Vec<u32>,
    // Slot 0 of both tables is a white fallback, so untextured materials
    // can always point somewhere valid.
    color_table: Vec<[f32; 4]>,
    texture_count: u32,
    gpu: Option<RegistryGpu>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            meshes: SlotMap::with_key(),
            materials: SlotMap::with_key(),
            pending_vertices: Vec::new(),
            pending_indices: Vec::new(),
            color_table: vec![[1.0, 1.0, 1.0, 1.0]],
            texture_count: 1,
            gpu: None,
        }
    }

    /// Register a material. Fails after [`Self::upload`].
    pub fn add_material(&mut self, material: MaterialData) -> VulkanResult<MaterialKey> {
        self.ensure_mutable()?;

        let record = match material.albedo {
            AlbedoSource::Texture { bytes } => {
                if self.texture_count == MAX_MATERIAL_TEXTURES {
                    return Err(VulkanError::InvalidOperation {
                        reason: format!(
                            "texture array capacity of {MAX_MATERIAL_TEXTURES} exceeded"
                        ),
                    });
                }
                let texture_index = self.texture_count;
                self.texture_count += 1;
                MaterialRecord {
                    binding: MaterialBinding {
                        texture_index,
                        color_index: 0,
                        texture_type: TextureType::Texture,
                        metallic: material.metallic,
                        roughness: material.roughness,
                    },
                    pending_bytes: Some(bytes),
                }
            }
            AlbedoSource::FlatColor { rgba } => {
                let color_index = self.color_table.len() as u32;
                self.color_table.push(rgba);
                MaterialRecord {
                    binding: MaterialBinding {
                        texture_index: 0,
                        color_index,
                        texture_type: TextureType::FlatColor,
                        metallic: material.metallic,
                        roughness: material.roughness,
                    },
                    pending_bytes: None,
                }
            }
        };

        Ok(self.materials.insert(record))
    }

    /// Register a mesh drawing with `material`. Fails after [`Self::upload`].
    pub fn add_mesh(&mut self, mesh: &MeshData, material: MaterialKey) -> VulkanResult<MeshKey> {
        self.ensure_mutable()?;
        if !self.materials.contains_key(material) {
            return Err(VulkanError::InvalidOperation {
                reason: "mesh references an unknown material".to_string(),
            });
        }
        if mesh.vertices.is_empty() || mesh.indices.is_empty() {
            return Err(VulkanError::InvalidOperation {
                reason: "mesh has no geometry".to_string(),
            });
        }

        let range = MeshRange {
            first_index: self.pending_indices.len() as u32,
            index_count: mesh.indices.len() as u32,
            vertex_offset: self.pending_vertices.len() as i32,
            material,
        };
        self.pending_vertices.extend_from_slice(&mesh.vertices);
        self.pending_indices.extend_from_slice(&mesh.indices);

        Ok(self.meshes.insert(range))
    }

    /// Upload all registered geometry and materials to the device and build
    /// the shared material descriptor set. Callable exactly once.
    pub fn upload(&mut self, context: &VulkanContext) -> VulkanResult<()> {
        self.ensure_mutable()?;
        if self.meshes.is_empty() {
            return Err(VulkanError::InvalidOperation {
                reason: "registry has no meshes to upload".to_string(),
            });
        }

        let vertex_bytes: &[u8] = bytemuck::cast_slice(&self.pending_vertices);
        let vertex_buffer = Buffer::new(
            context,
            vertex_bytes.len() as vk::DeviceSize,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            BufferMode::OneTimeTransfer,
            Some(vertex_bytes),
        )?;

        let index_bytes: &[u8] = bytemuck::cast_slice(&self.pending_indices);
        let index_buffer = Buffer::new(
            context,
            index_bytes.len() as vk::DeviceSize,
            vk::BufferUsageFlags::INDEX_BUFFER,
            BufferMode::OneTimeTransfer,
            Some(index_bytes),
        )?;

        let color_bytes: &[u8] = bytemuck::cast_slice(&self.color_table);
        let color_buffer = Buffer::new(
            context,
            color_bytes.len() as vk::DeviceSize,
            vk::BufferUsageFlags::STORAGE_BUFFER,
            BufferMode::OneTimeTransfer,
            Some(color_bytes),
        )?;

        let textures = self.upload_textures(context)?;

        let mut layout = DescriptorSetLayout::new(context);
        layout.add_binding(
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            vk::ShaderStageFlags::FRAGMENT,
            MAX_MATERIAL_TEXTURES,
        )?;
        layout.add_binding(
            vk::DescriptorType::STORAGE_BUFFER,
            vk::ShaderStageFlags::FRAGMENT,
            1,
        )?;
        layout.create_layout()?;

        let capacity = MAX_MATERIAL_TEXTURES as usize;
        let mut views: Vec<vk::ImageView> = textures.iter().map(|t| t.view.handle()).collect();
        let mut samplers: Vec<vk::Sampler> = textures.iter().map(|t| t.sampler.handle()).collect();
        views.resize(capacity, views[0]);
        samplers.resize(capacity, samplers[0]);
        let layouts = vec![vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL; capacity];

        let mut set = DescriptorSet::new(context, &layout)?;
        set.add_images_to_binding(&views, &samplers, &layouts)?;
        set.add_buffers_to_binding(&[(color_buffer.handle(), color_buffer.size())])?;
        let set_handle = set.create_descriptor_set()?;

        log::info!(
            "registry uploaded: {} meshes, {} materials, {} textures, {} colors",
            self.meshes.len(),
            self.materials.len(),
            self.texture_count,
            self.color_table.len()
        );

        self.pending_vertices = Vec::new();
        self.pending_indices = Vec::new();

        self.gpu = Some(RegistryGpu {
            vertex_buffer,
            index_buffer,
            color_buffer,
            textures,
            layout,
            set,
            set_handle,
        });
        Ok(())
    }

    fn upload_textures(&mut self, context: &VulkanContext) -> VulkanResult<Vec<TextureResources>> {
        // Fallback texture occupies slot 0.
        let white = [255u8; 4];
        let mut decoded: Vec<(u32, u32, u32, Vec<u8>)> = vec![(0, 1, 1, white.to_vec())];

        let mut pending: Vec<(u32, Vec<u8>)> = Vec::new();
        for record in self.materials.values_mut() {
            if let Some(bytes) = record.pending_bytes.take() {
                pending.push((record.binding.texture_index, bytes));
            }
        }
        pending.sort_by_key(|(index, _)| *index);

        for (index, bytes) in pending {
            let image =
                image::load_from_memory(&bytes).map_err(|e| VulkanError::ResourceCreationFailure {
                    reason: format!("texture decode failed: {e}"),
                })?;
            let rgba = image.to_rgba8();
            let (width, height) = rgba.dimensions();
            decoded.push((index, width, height, rgba.into_raw()));
        }

        decoded
            .into_iter()
            .map(|(_, width, height, pixels)| {
                let image = Image::from_rgba_pixels(context, width, height, &pixels)?;
                let mip_levels = image.mip_levels();
                let view = ImageView::from_owned(context, image, vk::ImageAspectFlags::COLOR)?;
                let sampler = Sampler::new(context, mip_levels)?;
                Ok(TextureResources { view, sampler })
            })
            .collect()
    }

    fn ensure_mutable(&self) -> VulkanResult<()> {
        if self.gpu.is_some() {
            return Err(VulkanError::InvalidOperation {
                reason: "registry already uploaded".to_string(),
            });
        }
        Ok(())
    }

    fn gpu(&self) -> VulkanResult<&RegistryGpu> {
        self.gpu.as_ref().ok_or_else(|| VulkanError::InvalidOperation {
            reason: "registry not uploaded".to_string(),
        })
    }

    /// Draw range of a registered mesh.
    #[must_use]
    pub fn mesh_range(&self, key: MeshKey) -> Option<MeshRange> {
        self.meshes.get(key).copied()
    }

    /// Shader-facing indices of a registered material.
    #[must_use]
    pub fn material_binding(&self, key: MaterialKey) -> Option<MaterialBinding> {
        self.materials.get(key).map(|record| record.binding)
    }

    /// The merged vertex buffer handle.
    pub fn vertex_buffer(&self) -> VulkanResult<vk::Buffer> {
        Ok(self.gpu()?.vertex_buffer.handle())
    }

    /// The merged index buffer handle.
    pub fn index_buffer(&self) -> VulkanResult<vk::Buffer> {
        Ok(self.gpu()?.index_buffer.handle())
    }

    /// The shared material descriptor set layout.
    pub fn material_layout(&self) -> VulkanResult<vk::DescriptorSetLayout> {
        Ok(self.gpu()?.layout.handle()?)
    }

    /// The shared material descriptor set.
    pub fn material_set(&self) -> VulkanResult<vk::DescriptorSet> {
        Ok(self.gpu()?.set_handle)
    }

    /// Whether [`Self::upload`] has run.
    #[must_use]
    pub fn is_uploaded(&self) -> bool {
        self.gpu.is_some()
    }

    /// Number of entries in the bound texture array, fallback included.
    #[must_use]
    pub fn texture_count(&self) -> u32 {
        self.texture_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad_mesh() -> MeshData {
        let v = |x: f32, y: f32| Vertex {
            position: [x, y, 0.0],
            normal: [0.0, 0.0, 1.0],
            tex_coord: [x, y],
        };
        MeshData {
            vertices: vec![v(0.0, 0.0), v(1.0, 0.0), v(1.0, 1.0), v(0.0, 1.0)],
            indices: vec![0, 1, 2, 2, 3, 0],
            material_index: 0,
        }
    }

    #[test]
    fn mesh_ranges_accumulate_offsets() {
        let mut registry = ModelRegistry::new();
        let material = registry
            .add_material(MaterialData::flat_color([0.5, 0.5, 0.5, 1.0]))
            .unwrap();

        let first = registry.add_mesh(&quad_mesh(), material).unwrap();
        let second = registry.add_mesh(&quad_mesh(), material).unwrap();

        let first = registry.mesh_range(first).unwrap();
        assert_eq!(first.first_index, 0);
        assert_eq!(first.index_count, 6);
        assert_eq!(first.vertex_offset, 0);

        let second = registry.mesh_range(second).unwrap();
        assert_eq!(second.first_index, 6);
        assert_eq!(second.index_count, 6);
        assert_eq!(second.vertex_offset, 4);
    }

    #[test]
    fn flat_colors_index_past_fallback() {
        let mut registry = ModelRegistry::new();
        let red = registry
            .add_material(MaterialData::flat_color([1.0, 0.0, 0.0, 1.0]))
            .unwrap();
        let blue = registry
            .add_material(MaterialData::flat_color([0.0, 0.0, 1.0, 1.0]))
            .unwrap();

        let red = registry.material_binding(red).unwrap();
        assert_eq!(red.color_index, 1);
        assert_eq!(red.texture_index, 0);
        assert_eq!(red.texture_type, TextureType::FlatColor);

        let blue = registry.material_binding(blue).unwrap();
        assert_eq!(blue.color_index, 2);
    }

    #[test]
    fn textures_index_past_fallback() {
        let mut registry = ModelRegistry::new();
        let first = registry
            .add_material(MaterialData::textured(vec![0; 4]))
            .unwrap();
        let second = registry
            .add_material(MaterialData::textured(vec![0; 4]))
            .unwrap();

        assert_eq!(registry.material_binding(first).unwrap().texture_index, 1);
        assert_eq!(registry.material_binding(second).unwrap().texture_index, 2);
        assert_eq!(registry.texture_count(), 3);
    }

    #[test]
    fn material_binding_carries_surface_terms() {
        let mut registry = ModelRegistry::new();
        let brushed_metal = registry
            .add_material(MaterialData {
                albedo: AlbedoSource::FlatColor {
                    rgba: [0.9, 0.9, 0.9, 1.0],
                },
                metallic: 1.0,
                roughness: 0.25,
            })
            .unwrap();

        let binding = registry.material_binding(brushed_metal).unwrap();
        assert_eq!(binding.metallic, 1.0);
        assert_eq!(binding.roughness, 0.25);
    }

    #[test]
    fn texture_capacity_enforced() {
        let mut registry = ModelRegistry::new();
        // Fallback holds slot 0, leaving capacity - 1 user slots.
        for _ in 0..MAX_MATERIAL_TEXTURES - 1 {
            registry
                .add_material(MaterialData::textured(vec![0; 4]))
                .unwrap();
        }
        assert!(matches!(
            registry.add_material(MaterialData::textured(vec![0; 4])),
            Err(VulkanError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn empty_mesh_rejected() {
        let mut registry = ModelRegistry::new();
        let material = registry
            .add_material(MaterialData::flat_color([1.0; 4]))
            .unwrap();
        let empty = MeshData {
            vertices: Vec::new(),
            indices: Vec::new(),
            material_index: 0,
        };
        assert!(matches!(
            registry.add_mesh(&empty, material),
            Err(VulkanError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn gpu_accessors_fail_before_upload() {
        let registry = ModelRegistry::new();
        assert!(!registry.is_uploaded());
        assert!(registry.vertex_buffer().is_err());
        assert!(registry.material_set().is_err());
    }
}
