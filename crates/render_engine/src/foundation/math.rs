//! Math types for 3D graphics
//!
//! Re-exports the nalgebra types used across the engine under short aliases.

pub use nalgebra::{Matrix4, Vector2, Vector3, Vector4};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Build a right-handed perspective projection with the Y axis flipped for
/// Vulkan's inverted clip-space Y.
#[must_use]
pub fn perspective_vk(fovy: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    let mut proj = Mat4::new_perspective(aspect, fovy, near, far);
    proj[(1, 1)] *= -1.0;
    proj
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn perspective_flips_y() {
        let standard = Mat4::new_perspective(16.0 / 9.0, 1.0, 0.1, 100.0);
        let vk = perspective_vk(1.0, 16.0 / 9.0, 0.1, 100.0);
        assert_relative_eq!(vk[(1, 1)], -standard[(1, 1)]);
    }
}
