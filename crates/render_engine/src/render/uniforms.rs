//! GPU-visible uniform and push constant layouts
//!
//! All structs here are `repr(C)` POD types whose layouts match the shader
//! declarations. The push constant block keeps its full shape across every
//! pass even where a pass leaves fields unused.

use bytemuck::{Pod, Zeroable};

use crate::foundation::math::Mat4;

/// Per-frame camera and directional light state, bound as a uniform buffer
/// in both the geometry and lighting stages
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CameraLightUniform {
    /// View matrix
    pub view: [[f32; 4]; 4],
    /// Projection matrix
    pub proj: [[f32; 4]; 4],
    /// World-space camera position, w unused
    pub camera_pos: [f32; 4],
    /// World-space light direction, w unused
    pub light_dir: [f32; 4],
}

impl Default for CameraLightUniform {
    fn default() -> Self {
        Self {
            view: Mat4::identity().into(),
            proj: Mat4::identity().into(),
            camera_pos: [0.0, 0.0, 0.0, 1.0],
            light_dir: [0.0, -1.0, 0.0, 0.0],
        }
    }
}

/// Tunable lighting terms, bound as a uniform buffer in the lighting stage
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct LightingControls {
    /// Directional light intensity
    pub sunlight_intensity: f32,
    /// Ambient factor applied to albedo
    pub ambient_factor: f32,
    _pad: [f32; 2],
}

impl LightingControls {
    /// Create lighting controls.
    #[must_use]
    pub fn new(sunlight_intensity: f32, ambient_factor: f32) -> Self {
        Self {
            sunlight_intensity,
            ambient_factor,
            _pad: [0.0; 2],
        }
    }
}

/// Per-draw push constants for the geometry stage
///
/// `color_index` is unused for textured draws and `material_index` for
/// flat-colored ones; the block keeps both so the same layout serves every
/// draw.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct DrawPushConstants {
    /// Per-node transform from the scene hierarchy
    pub submesh_transform: [[f32; 4]; 4],
    /// Whole-model transform
    pub model_transform: [[f32; 4]; 4],
    /// Index into the material texture array
    pub material_index: u32,
    /// Index into the flat color table
    pub color_index: u32,
    /// Discriminant matching [`crate::render::scene::TextureType`]
    pub texture_type: u32,
    /// Metallic term written to the G-buffer
    pub metallic: f32,
    /// Roughness term written to the G-buffer
    pub roughness: f32,
}

/// Push constant block for the tone-mapping stage
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct TonemapPushConstants {
    /// Exposure multiplier; 1.0 is the identity operator
    pub exposure: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_light_uniform_is_std140_compatible() {
        assert_eq!(std::mem::size_of::<CameraLightUniform>(), 160);
    }

    #[test]
    fn lighting_controls_pad_to_vec4() {
        assert_eq!(std::mem::size_of::<LightingControls>(), 16);
    }

    #[test]
    fn draw_push_constants_fit_minimum_guaranteed_budget() {
        // Two mat4s, three index words, and two surface terms; common
        // hardware exposes a 256-byte push constant budget.
        assert_eq!(std::mem::size_of::<DrawPushConstants>(), 148);
    }

    #[test]
    fn push_constant_bytes_round_trip() {
        let constants = DrawPushConstants {
            submesh_transform: Mat4::identity().into(),
            model_transform: Mat4::identity().into(),
            material_index: 3,
            color_index: 7,
            texture_type: 1,
            metallic: 1.0,
            roughness: 0.25,
        };
        let bytes = bytemuck::bytes_of(&constants);
        assert_eq!(bytes.len(), 148);
        let restored: DrawPushConstants = *bytemuck::from_bytes(bytes);
        assert_eq!(restored.material_index, 3);
        assert_eq!(restored.color_index, 7);
        assert_eq!(restored.texture_type, 1);
        assert_eq!(restored.metallic, 1.0);
        assert_eq!(restored.roughness, 0.25);
    }
}
