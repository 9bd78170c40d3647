//! Flattens a loaded [`Model`] into one indexed vertex stream and uploads it.

use std::{collections::HashMap, path::Path, sync::Arc};

use glam::{Mat4, Vec2, Vec4};
use vulkano::{
  buffer::{Buffer, BufferCreateInfo, BufferUsage, Subbuffer},
  memory::allocator::{AllocationCreateInfo, MemoryTypeFilter, StandardMemoryAllocator},
};

use crate::{
  error::{EngineError, Result},
  loader::Model,
  render::vertex::ModelVertex,
};

/// CPU-side geometry ready for upload.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Geometry {
  pub vertices: Vec<ModelVertex>,
  pub indices:  Vec<u32>,
}

impl Geometry {
  /// Bakes node transforms into positions and merges bitwise-identical vertices.
  pub fn from_model(model: &Model) -> Self {
    let world = world_transforms(model);
    let mut geometry = Self::default();
    let mut unique: HashMap<[u32; 8], u32> = HashMap::new();

    for mesh in &model.meshes {
      let transform = mesh
        .parent
        .and_then(|parent| world.get(parent))
        .copied()
        .unwrap_or(Mat4::IDENTITY);
      let info = &mesh.vertex_info;

      for triangle in &mesh.topology {
        let corners = [triangle.a, triangle.b, triangle.c].map(|i| i as usize);
        if corners.iter().any(|&i| i >= info.position.len()) {
          log::warn!("Skipping triangle with out-of-range index in {}", mesh.name);
          continue;
        }

        for index in corners {
          let position = &info.position[index];

          let vertex = ModelVertex {
            position:  transform.transform_point3(*position).to_array(),
            color:     info
              .color
              .get(index)
              .map_or(Vec4::ONE, |c| *c)
              .truncate()
              .to_array(),
            tex_coord: info.texcoord.get(index).copied().unwrap_or(Vec2::ZERO).to_array(),
          };

          let next = geometry.vertices.len() as u32;
          let slot = *unique.entry(vertex_key(&vertex)).or_insert_with(|| {
            geometry.vertices.push(vertex);
            next
          });
          geometry.indices.push(slot);
        }
      }
    }

    geometry
  }

  pub fn is_empty(&self) -> bool {
    self.indices.is_empty()
  }
}

fn vertex_key(vertex: &ModelVertex) -> [u32; 8] {
  let [px, py, pz] = vertex.position;
  let [r, g, b] = vertex.color;
  let [u, v] = vertex.tex_coord;
  [px, py, pz, r, g, b, u, v].map(f32::to_bits)
}

/// Relies on the level order of `model.nodes`: a parent's world transform is known before
/// any of its children are visited.
fn world_transforms(model: &Model) -> Vec<Mat4> {
  let mut world: Vec<Mat4> = Vec::with_capacity(model.nodes.len());
  for node in &model.nodes {
    let parent = node
      .parent
      .and_then(|p| world.get(p))
      .copied()
      .unwrap_or(Mat4::IDENTITY);
    world.push(parent * node.transformation);
  }
  world
}

/// Device buffers holding the model's vertices and indices.
pub struct ModelBuffers {
  pub vertices: Subbuffer<[ModelVertex]>,
  pub indices:  Subbuffer<[u32]>,
}

impl ModelBuffers {
  pub fn upload(
    memory_allocator: &Arc<StandardMemoryAllocator>,
    geometry: Geometry,
    source: &Path,
  ) -> Result<Self> {
    if geometry.is_empty() {
      return Err(EngineError::UnsupportedModel(source.to_path_buf()));
    }

    log::info!(
      "Uploading {} unique vertices, {} indices",
      geometry.vertices.len(),
      geometry.indices.len()
    );

    let allocation = || AllocationCreateInfo {
      memory_type_filter: MemoryTypeFilter::PREFER_DEVICE | MemoryTypeFilter::HOST_SEQUENTIAL_WRITE,
      ..Default::default()
    };

    let vertices = Buffer::from_iter(
      memory_allocator.clone(),
      BufferCreateInfo {
        usage: BufferUsage::VERTEX_BUFFER,
        ..Default::default()
      },
      allocation(),
      geometry.vertices,
    )?;

    let indices = Buffer::from_iter(
      memory_allocator.clone(),
      BufferCreateInfo {
        usage: BufferUsage::INDEX_BUFFER,
        ..Default::default()
      },
      allocation(),
      geometry.indices,
    )?;

    Ok(Self { vertices, indices })
  }

  pub fn index_count(&self) -> u32 {
    self.indices.len() as u32
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use glam::Vec3;

  use crate::loader::{Mesh, Node, Triangle, VertexInfo};

  fn quad(parent: Option<usize>) -> Mesh {
    Mesh {
      parent,
      material: None,
      topology: vec![Triangle { a: 0, b: 1, c: 2 }, Triangle { a: 2, b: 3, c: 0 }],
      vertex_info: VertexInfo {
        position: vec![
          Vec3::new(0.0, 0.0, 0.0),
          Vec3::new(1.0, 0.0, 0.0),
          Vec3::new(1.0, 1.0, 0.0),
          Vec3::new(0.0, 1.0, 0.0),
        ],
        texcoord: vec![Vec2::ZERO, Vec2::X, Vec2::ONE, Vec2::Y],
        ..Default::default()
      },
      name: "mesh0".into(),
    }
  }

  fn node(parent: Option<usize>, transformation: Mat4) -> Node {
    Node {
      parent,
      transformation,
      name: String::new(),
    }
  }

  #[test]
  fn shared_corners_are_merged() {
    let model = Model {
      meshes: vec![quad(None)],
      ..Default::default()
    };
    let geometry = Geometry::from_model(&model);
    assert_eq!(geometry.vertices.len(), 4);
    assert_eq!(geometry.indices, vec![0, 1, 2, 2, 3, 0]);
  }

  #[test]
  fn missing_colors_default_to_white() {
    let model = Model {
      meshes: vec![quad(None)],
      ..Default::default()
    };
    let geometry = Geometry::from_model(&model);
    assert!(geometry.vertices.iter().all(|v| v.color == [1.0, 1.0, 1.0]));
  }

  #[test]
  fn node_transforms_are_composed_down_the_tree() {
    let model = Model {
      nodes: vec![
        node(None, Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0))),
        node(Some(0), Mat4::from_translation(Vec3::new(0.0, 0.0, 5.0))),
      ],
      meshes: vec![quad(Some(1))],
      ..Default::default()
    };
    let geometry = Geometry::from_model(&model);
    assert_eq!(geometry.vertices[0].position, [10.0, 0.0, 5.0]);
    assert_eq!(geometry.vertices[2].position, [11.0, 1.0, 5.0]);
  }

  #[test]
  fn identical_meshes_under_different_nodes_stay_distinct() {
    let model = Model {
      nodes: vec![
        node(None, Mat4::IDENTITY),
        node(Some(0), Mat4::from_translation(Vec3::Z)),
      ],
      meshes: vec![quad(Some(0)), quad(Some(1))],
      ..Default::default()
    };
    let geometry = Geometry::from_model(&model);
    assert_eq!(geometry.vertices.len(), 8);
    assert_eq!(geometry.indices.len(), 12);
    assert_eq!(geometry.indices[6..], [4, 5, 6, 6, 7, 4]);
  }

  #[test]
  fn triangles_with_out_of_range_indices_are_dropped() {
    let mut mesh = quad(None);
    mesh.topology = vec![Triangle { a: 0, b: 1, c: 9 }, Triangle { a: 0, b: 1, c: 2 }];
    let model = Model {
      meshes: vec![mesh],
      ..Default::default()
    };
    let geometry = Geometry::from_model(&model);
    assert_eq!(geometry.indices, vec![0, 1, 2]);
  }
}
