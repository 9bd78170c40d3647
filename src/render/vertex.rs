use vulkano::{buffer::BufferContents, pipeline::graphics::vertex_input::Vertex};

/// Field names must match the vertex shader's input variables.
#[derive(BufferContents, Vertex, Clone, Copy, Debug, PartialEq)]
#[repr(C)]
pub struct ModelVertex {
  #[format(R32G32B32_SFLOAT)]
  pub position:  [f32; 3],
  #[format(R32G32B32_SFLOAT)]
  pub color:     [f32; 3],
  #[format(R32G32_SFLOAT)]
  pub tex_coord: [f32; 2],
}

/// One simulated particle. Matches the std430 layout of the compute shader's storage buffers
/// and doubles as the vertex format for drawing them.
#[derive(BufferContents, Vertex, Clone, Copy, Debug, PartialEq)]
#[repr(C)]
pub struct Particle {
  #[format(R32G32_SFLOAT)]
  pub position: [f32; 2],
  #[format(R32G32_SFLOAT)]
  pub velocity: [f32; 2],
  #[format(R32G32B32A32_SFLOAT)]
  pub color:    [f32; 4],
}
