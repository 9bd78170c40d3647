use glam::{Mat4, Vec3};

/// Model, view and projection matrices for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UniformMatrices {
  pub model: Mat4,
  pub view:  Mat4,
  pub proj:  Mat4,
}

impl UniformMatrices {
  /// The model spins about +Z at 90 degrees per second, seen from (2, 2, 2).
  pub fn at(elapsed_secs: f32, aspect_ratio: f32) -> Self {
    let model = Mat4::from_rotation_z(elapsed_secs * 90f32.to_radians());
    let view = Mat4::look_at_rh(Vec3::splat(2.0), Vec3::ZERO, Vec3::Z);

    // glam already targets a 0..1 depth range; only Y has to be flipped for Vulkan clip space.
    let mut proj = Mat4::perspective_rh(45f32.to_radians(), aspect_ratio, 0.1, 10.0);
    proj.y_axis.y *= -1.0;

    Self { model, view, proj }
  }

  pub fn to_shader(self) -> crate::shaders::model_vs::UniformBufferObject {
    crate::shaders::model_vs::UniformBufferObject {
      model: self.model.to_cols_array_2d(),
      view:  self.view.to_cols_array_2d(),
      proj:  self.proj.to_cols_array_2d(),
    }
  }
}
