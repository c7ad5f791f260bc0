//! Scene interface types
//!
//! The boundary with the model-import collaborator: plain vertex/index
//! arrays, material descriptors, and an optional node list with per-mesh
//! transforms. The engine consumes these; it never parses model files.

use ash::vk;
use bytemuck::{Pod, Zeroable};

use crate::foundation::math::Mat4;

/// Interleaved vertex layout shared by all meshes
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Object-space position
    pub position: [f32; 3],
    /// Object-space normal
    pub normal: [f32; 3],
    /// Texture coordinates
    pub tex_coord: [f32; 2],
}

impl Vertex {
    /// Vertex buffer binding description.
    #[must_use]
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<Self>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// Attribute descriptions for position, normal, and texcoord.
    #[must_use]
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 3] {
        [
            vk::VertexInputAttributeDescription {
                location: 0,
                binding: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 0,
            },
            vk::VertexInputAttributeDescription {
                location: 1,
                binding: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 12,
            },
            vk::VertexInputAttributeDescription {
                location: 2,
                binding: 0,
                format: vk::Format::R32G32_SFLOAT,
                offset: 24,
            },
        ]
    }
}

/// How a draw resolves its surface color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum TextureType {
    /// Sample the material's texture
    Texture = 0,
    /// Look up a flat color from the color table
    FlatColor = 1,
}

/// One mesh record from the import collaborator
#[derive(Debug, Clone)]
pub struct MeshData {
    /// Vertex array
    pub vertices: Vec<Vertex>,
    /// Index array, triangle list
    pub indices: Vec<u32>,
    /// Index into [`SceneData::materials`]
    pub material_index: usize,
}

/// Where a material's base color comes from
#[derive(Debug, Clone)]
pub enum AlbedoSource {
    /// Encoded image bytes (PNG), decoded at upload time
    Texture {
        /// Encoded image contents
        bytes: Vec<u8>,
    },
    /// Constant surface color
    FlatColor {
        /// RGBA color
        rgba: [f32; 4],
    },
}

/// One material record from the import collaborator
#[derive(Debug, Clone)]
pub struct MaterialData {
    /// Base color source
    pub albedo: AlbedoSource,
    /// Metallic term written to the G-buffer
    pub metallic: f32,
    /// Roughness term written to the G-buffer
    pub roughness: f32,
}

impl MaterialData {
    /// Default dielectric metallic term
    pub const DEFAULT_METALLIC: f32 = 0.0;
    /// Default roughness term
    pub const DEFAULT_ROUGHNESS: f32 = 0.8;

    /// Textured material with the default surface terms.
    #[must_use]
    pub fn textured(bytes: Vec<u8>) -> Self {
        Self {
            albedo: AlbedoSource::Texture { bytes },
            metallic: Self::DEFAULT_METALLIC,
            roughness: Self::DEFAULT_ROUGHNESS,
        }
    }

    /// Flat-colored material with the default surface terms.
    #[must_use]
    pub fn flat_color(rgba: [f32; 4]) -> Self {
        Self {
            albedo: AlbedoSource::FlatColor { rgba },
            metallic: Self::DEFAULT_METALLIC,
            roughness: Self::DEFAULT_ROUGHNESS,
        }
    }
}

/// A placed mesh instance with its transform
#[derive(Debug, Clone)]
pub struct SceneNode {
    /// Index into [`SceneData::meshes`]
    pub mesh_index: usize,
    /// Submesh transform applied on top of the model transform
    pub transform: Mat4,
}

/// Everything the import collaborator hands the engine
#[derive(Debug, Clone, Default)]
pub struct SceneData {
    /// Mesh records
    pub meshes: Vec<MeshData>,
    /// Material records
    pub materials: Vec<MaterialData>,
    /// Placed instances; one per mesh when empty
    pub nodes: Vec<SceneNode>,
}

impl SceneData {
    /// Nodes to draw: the explicit node list, or one identity-placed node
    /// per mesh when the scene has no hierarchy.
    #[must_use]
    pub fn effective_nodes(&self) -> Vec<SceneNode> {
        if self.nodes.is_empty() {
            (0..self.meshes.len())
                .map(|mesh_index| SceneNode {
                    mesh_index,
                    transform: Mat4::identity(),
                })
                .collect()
        } else {
            self.nodes.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<Vertex>(), 32);
        assert_eq!(Vertex::binding_description().stride, 32);
    }

    #[test]
    fn attribute_offsets_match_field_layout() {
        let attrs = Vertex::attribute_descriptions();
        assert_eq!(attrs[0].offset, 0);
        assert_eq!(attrs[1].offset, 12);
        assert_eq!(attrs[2].offset, 24);
        assert_eq!(attrs[2].format, vk::Format::R32G32_SFLOAT);
    }

    #[test]
    fn material_constructors_use_dielectric_defaults() {
        let material = MaterialData::flat_color([1.0; 4]);
        assert!(matches!(material.albedo, AlbedoSource::FlatColor { .. }));
        assert_eq!(material.metallic, MaterialData::DEFAULT_METALLIC);
        assert_eq!(material.roughness, MaterialData::DEFAULT_ROUGHNESS);
    }

    #[test]
    fn empty_scene_yields_no_nodes() {
        assert!(SceneData::default().effective_nodes().is_empty());
    }

    #[test]
    fn meshes_without_nodes_get_identity_placement() {
        let scene = SceneData {
            meshes: vec![MeshData {
                vertices: Vec::new(),
                indices: Vec::new(),
                material_index: 0,
            }],
            materials: vec![MaterialData::flat_color([1.0, 0.0, 0.0, 1.0])],
            nodes: Vec::new(),
        };
        let nodes = scene.effective_nodes();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].mesh_index, 0);
        assert_eq!(nodes[0].transform, Mat4::identity());
    }
}
