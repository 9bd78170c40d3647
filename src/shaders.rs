//! GLSL shaders, compiled into SPIR-V at build time by `vulkano_shaders`.

/// Transforms model vertices by the model/view/projection uniform block.
pub mod model_vs {
  vulkano_shaders::shader! {
    ty: "vertex",
    path: "src/shaders/model.vert",
  }
}

/// Modulates the vertex color with the sampled texture.
pub mod model_fs {
  vulkano_shaders::shader! {
    ty: "fragment",
    path: "src/shaders/model.frag",
  }
}

/// Advances every particle by one step and bounces it off the clip-space border.
pub mod particle_cs {
  vulkano_shaders::shader! {
    ty: "compute",
    path: "src/shaders/particle.comp",
  }
}

pub mod particle_vs {
  vulkano_shaders::shader! {
    ty: "vertex",
    path: "src/shaders/particle.vert",
  }
}

pub mod particle_fs {
  vulkano_shaders::shader! {
    ty: "fragment",
    path: "src/shaders/particle.frag",
  }
}

/// Local workgroup size of `particle_cs`.
pub const PARTICLE_WORKGROUP_SIZE: u32 = 256;
