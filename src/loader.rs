//! Model loading.
//!
//! Scene files are flattened into three arrays: nodes, meshes and materials. Meshes and nodes
//! point at their parent node and material by index. The node array is stored in level order,
//! so a parent always comes before its children.
//!
//! OBJ files go through `tobj`, glTF files through `gltf`.

use std::{
  collections::{BTreeSet, HashMap, VecDeque},
  io::BufRead,
  ops::Range,
  path::Path,
};

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::error::{EngineError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextureType {
  Unknown,
  Diffuse,
  Specular,
  Ambient,
  Opacity,
  Height,
  Emissive,
  Normal,
  Shininess,
  Displacement,
  Reflection,
  Lightmap,
  BaseColor,
  NormalCamera,
  EmissionColor,
  Metalness,
  DiffuseRoughness,
  AmbientOcclusion,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
  /// Index into `Model::nodes`, `None` for the root.
  pub parent:         Option<usize>,
  pub transformation: Mat4,
  pub name:           String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Triangle {
  pub a: u32,
  pub b: u32,
  pub c: u32,
}

/// Per-vertex attribute streams. Streams a file does not provide stay empty.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VertexInfo {
  pub position:  Vec<Vec3>,
  pub normal:    Vec<Vec3>,
  pub tangent:   Vec<Vec3>,
  pub bitangent: Vec<Vec3>,
  pub texcoord:  Vec<Vec2>,
  pub color:     Vec<Vec4>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
  pub parent:      Option<usize>,
  pub material:    Option<usize>,
  pub topology:    Vec<Triangle>,
  pub vertex_info: VertexInfo,
  pub name:        String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Material {
  pub diffuse_color:     Vec4,
  pub specular_color:    Vec4,
  pub ambient_color:     Vec4,
  pub transparent_color: Vec4,
  pub emissive_color:    Vec4,

  pub shininess: f32,
  pub opacity:   f32,

  pub material_textures: HashMap<TextureType, String>,

  pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Model {
  pub nodes:     Vec<Node>,
  pub meshes:    Vec<Mesh>,
  pub materials: Vec<Material>,
  /// Every texture path referenced by a material, deduplicated.
  pub textures:  BTreeSet<String>,
}

impl Model {
  /// First diffuse or base color texture that lives in its own file.
  ///
  /// Embedded textures are named `*<index>` and are skipped.
  pub fn primary_texture(&self) -> Option<&str> {
    self
      .materials
      .iter()
      .flat_map(|material| {
        [TextureType::Diffuse, TextureType::BaseColor]
          .into_iter()
          .filter_map(|ty| material.material_textures.get(&ty))
      })
      .map(String::as_str)
      .find(|path| !path.starts_with('*'))
  }

  pub fn vertex_count(&self) -> usize {
    self.meshes.iter().map(|m| m.vertex_info.position.len()).sum()
  }

  pub fn triangle_count(&self) -> usize {
    self.meshes.iter().map(|m| m.topology.len()).sum()
  }

  fn add_texture(&mut self, material: &mut Material, ty: TextureType, path: &str) {
    if path.is_empty() {
      return;
    }

    let path = path.replace('\\', "/");
    if self.textures.insert(path.clone()) {
      log::debug!("Texture referenced: {path}");
    }
    material.material_textures.entry(ty).or_insert(path);
  }
}

/// Hands out `"{prefix}{n}"` names for unnamed objects.
struct NameGenerator {
  prefix: &'static str,
  next:   usize,
}

impl NameGenerator {
  fn new(prefix: &'static str) -> Self {
    Self { prefix, next: 0 }
  }

  fn generate(&mut self) -> String {
    let name = format!("{}{}", self.prefix, self.next);
    self.next += 1;
    name
  }

  fn or_generate(&mut self, name: Option<&str>) -> String {
    match name {
      Some(name) if !name.is_empty() => name.to_owned(),
      _ => self.generate(),
    }
  }

  /// Meshes always carry the generated name, followed by their own when they have one.
  fn with_suffix(&mut self, name: Option<&str>) -> String {
    let mut generated = self.generate();
    if let Some(name) = name.filter(|n| !n.is_empty()) {
      generated.push_str(": ");
      generated.push_str(name);
    }
    generated
  }
}

pub fn load_model(path: impl AsRef<Path>) -> Result<Model> {
  let path = path.as_ref();
  log::info!("Loading model {}...", path.display());

  let extension = path
    .extension()
    .and_then(|e| e.to_str())
    .map(str::to_ascii_lowercase);

  let model = match extension.as_deref() {
    Some("obj") => {
      let (models, materials) = tobj::load_obj(path, &obj_load_options())?;
      from_obj(models, materials)
    }
    Some("gltf" | "glb") => {
      let gltf::Gltf { document, blob } = gltf::Gltf::open(path)?;
      let buffers = gltf::import_buffers(&document, path.parent(), blob)?;
      from_gltf(&document, &buffers)
    }
    _ => return Err(EngineError::UnsupportedModel(path.to_path_buf())),
  };

  log::info!(
    "Model loaded: {} meshes, {} materials, {} nodes, {} textures",
    model.meshes.len(),
    model.materials.len(),
    model.nodes.len(),
    model.textures.len()
  );

  Ok(model)
}

fn obj_load_options() -> tobj::LoadOptions {
  tobj::LoadOptions {
    single_index: true,
    triangulate: true,
    ..Default::default()
  }
}

/// Parses an OBJ document from `reader`. `material_loader` resolves `mtllib` statements.
pub fn load_obj_from_reader<R: BufRead>(
  reader: &mut R,
  material_loader: impl Fn(&Path) -> tobj::MTLLoadResult,
) -> Result<Model> {
  let (models, materials) = tobj::load_obj_buf(reader, &obj_load_options(), material_loader)?;
  Ok(from_obj(models, materials))
}

fn from_obj(
  models: Vec<tobj::Model>,
  materials: std::result::Result<Vec<tobj::Material>, tobj::LoadError>,
) -> Model {
  let materials = materials.unwrap_or_else(|e| {
    log::warn!("Material library could not be loaded: {e}");
    Vec::new()
  });

  let mut model = Model::default();

  // OBJ has no hierarchy, everything hangs off a single root.
  model.nodes.push(Node {
    parent:         None,
    transformation: Mat4::IDENTITY,
    name:           "root".to_owned(),
  });

  let mut material_names = NameGenerator::new("material");
  for obj_material in materials {
    let rgb = |c: Option<[f32; 3]>| c.map_or(Vec4::ZERO, |[r, g, b]| Vec4::new(r, g, b, 1.0));

    let mut material = Material {
      diffuse_color: rgb(obj_material.diffuse),
      specular_color: rgb(obj_material.specular),
      ambient_color: rgb(obj_material.ambient),
      shininess: obj_material.shininess.unwrap_or(0.0),
      opacity: obj_material.dissolve.unwrap_or(1.0),
      name: material_names.or_generate(Some(obj_material.name.as_str())),
      ..Default::default()
    };

    let maps = [
      (TextureType::Diffuse, &obj_material.diffuse_texture),
      (TextureType::Specular, &obj_material.specular_texture),
      (TextureType::Ambient, &obj_material.ambient_texture),
      (TextureType::Normal, &obj_material.normal_texture),
      (TextureType::Shininess, &obj_material.shininess_texture),
      (TextureType::Opacity, &obj_material.dissolve_texture),
    ];
    for (ty, path) in maps {
      if let Some(path) = path {
        model.add_texture(&mut material, ty, path);
      }
    }

    model.materials.push(material);
  }

  let mut mesh_names = NameGenerator::new("mesh");
  for obj_model in models {
    let mesh = &obj_model.mesh;

    let vec3s = |data: &[f32]| {
      data
        .chunks_exact(3)
        .map(|c| Vec3::new(c[0], c[1], c[2]))
        .collect::<Vec<_>>()
    };

    let vertex_info = VertexInfo {
      position: vec3s(&mesh.positions),
      normal: vec3s(&mesh.normals),
      texcoord: mesh
        .texcoords
        .chunks_exact(2)
        .map(|uv| Vec2::new(uv[0], 1.0 - uv[1]))
        .collect(),
      color: mesh
        .vertex_color
        .chunks_exact(3)
        .map(|c| Vec4::new(c[0], c[1], c[2], 1.0))
        .collect(),
      ..Default::default()
    };

    let material = mesh.material_id.filter(|&id| id < model.materials.len());
    model.meshes.push(Mesh {
      parent: Some(0),
      material,
      topology: triangles(&mesh.indices),
      vertex_info,
      name: mesh_names.with_suffix(Some(obj_model.name.as_str())),
    });
  }

  model
}

fn triangles(indices: &[u32]) -> Vec<Triangle> {
  indices
    .chunks_exact(3)
    .map(|c| Triangle {
      a: c[0],
      b: c[1],
      c: c[2],
    })
    .collect()
}

/// Parses a glTF (or GLB) document held in memory. Relative buffer URIs resolve against `base`.
pub fn load_gltf_from_slice(bytes: &[u8], base: Option<&Path>) -> Result<Model> {
  let gltf::Gltf { document, blob } = gltf::Gltf::from_slice(bytes)?;
  let buffers = gltf::import_buffers(&document, base, blob)?;
  Ok(from_gltf(&document, &buffers))
}

fn from_gltf(document: &gltf::Document, buffers: &[gltf::buffer::Data]) -> Model {
  let mut model = Model::default();

  load_gltf_materials(document, &mut model);
  let mesh_ranges = load_gltf_meshes(document, buffers, &mut model);
  load_gltf_hierarchy(document, &mesh_ranges, &mut model);

  model
}

/// External images keep their percent-decoded URI, embedded ones become `*<image index>`.
fn gltf_texture_path(texture: gltf::Texture) -> String {
  let image = texture.source();
  match image.source() {
    gltf::image::Source::Uri { uri, .. } if !uri.starts_with("data:") => {
      match urlencoding::decode(uri) {
        Ok(decoded) => decoded.into_owned(),
        Err(e) => {
          log::warn!("Texture URI {uri:?} is not valid percent-encoded UTF-8: {e}");
          uri.to_owned()
        }
      }
    }
    _ => format!("*{}", image.index()),
  }
}

fn load_gltf_materials(document: &gltf::Document, model: &mut Model) {
  let mut names = NameGenerator::new("material");

  for gltf_material in document.materials() {
    let pbr = gltf_material.pbr_metallic_roughness();
    let base_color = Vec4::from(pbr.base_color_factor());
    let [er, eg, eb] = gltf_material.emissive_factor();

    let mut material = Material {
      diffuse_color: base_color,
      emissive_color: Vec4::new(er, eg, eb, 1.0),
      opacity: base_color.w,
      name: names.or_generate(gltf_material.name()),
      ..Default::default()
    };

    let mut textures = Vec::new();
    if let Some(info) = pbr.base_color_texture() {
      let path = gltf_texture_path(info.texture());
      textures.push((TextureType::Diffuse, path.clone()));
      textures.push((TextureType::BaseColor, path));
    }
    if let Some(info) = pbr.metallic_roughness_texture() {
      textures.push((TextureType::Metalness, gltf_texture_path(info.texture())));
    }
    if let Some(normal) = gltf_material.normal_texture() {
      textures.push((TextureType::Normal, gltf_texture_path(normal.texture())));
    }
    if let Some(occlusion) = gltf_material.occlusion_texture() {
      textures.push((
        TextureType::AmbientOcclusion,
        gltf_texture_path(occlusion.texture()),
      ));
    }
    if let Some(info) = gltf_material.emissive_texture() {
      textures.push((TextureType::Emissive, gltf_texture_path(info.texture())));
    }

    for (ty, path) in textures {
      model.add_texture(&mut material, ty, &path);
    }

    model.materials.push(material);
  }
}

/// Every triangle primitive becomes one mesh. Returns, per glTF mesh, the range of
/// `model.meshes` its primitives landed in.
fn load_gltf_meshes(
  document: &gltf::Document,
  buffers: &[gltf::buffer::Data],
  model: &mut Model,
) -> Vec<Range<usize>> {
  let mut names = NameGenerator::new("mesh");
  let mut ranges = Vec::new();

  for gltf_mesh in document.meshes() {
    let start = model.meshes.len();

    for primitive in gltf_mesh.primitives() {
      if primitive.mode() != gltf::mesh::Mode::Triangles {
        log::warn!(
          "Skipping {:?} primitive in mesh {:?}",
          primitive.mode(),
          gltf_mesh.name()
        );
        continue;
      }

      let reader =
        primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));

      let position: Vec<Vec3> = reader
        .read_positions()
        .map(|it| it.map(Vec3::from).collect())
        .unwrap_or_default();
      let normal: Vec<Vec3> = reader
        .read_normals()
        .map(|it| it.map(Vec3::from).collect())
        .unwrap_or_default();
      let tangents: Vec<[f32; 4]> = reader
        .read_tangents()
        .map(|it| it.collect())
        .unwrap_or_default();

      let tangent: Vec<Vec3> = tangents
        .iter()
        .map(|&[x, y, z, _]| Vec3::new(x, y, z))
        .collect();
      // w holds the handedness of the tangent frame.
      let bitangent = if normal.len() == tangents.len() {
        normal
          .iter()
          .zip(&tangents)
          .map(|(n, &[x, y, z, w])| n.cross(Vec3::new(x, y, z)) * w)
          .collect()
      } else {
        Vec::new()
      };

      let texcoord = reader
        .read_tex_coords(0)
        .map(|tc| tc.into_f32().map(Vec2::from).collect())
        .unwrap_or_default();
      let color = reader
        .read_colors(0)
        .map(|c| c.into_rgba_f32().map(Vec4::from).collect())
        .unwrap_or_default();

      let indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..position.len() as u32).collect(),
      };

      model.meshes.push(Mesh {
        parent: None,
        material: primitive.material().index(),
        topology: triangles(&indices),
        vertex_info: VertexInfo {
          position,
          normal,
          tangent,
          bitangent,
          texcoord,
          color,
        },
        name: names.with_suffix(gltf_mesh.name()),
      });
    }

    ranges.push(start..model.meshes.len());
  }

  ranges
}

/// Walks the scene breadth first below a synthetic root, so `model.nodes` ends up in level order.
fn load_gltf_hierarchy(document: &gltf::Document, mesh_ranges: &[Range<usize>], model: &mut Model) {
  let mut names = NameGenerator::new("node");
  let scene = document.default_scene().or_else(|| document.scenes().next());

  model.nodes.push(Node {
    parent:         None,
    transformation: Mat4::IDENTITY,
    name:           names.or_generate(scene.as_ref().and_then(|s| s.name())),
  });

  let mut pending: VecDeque<(gltf::Node, usize)> = VecDeque::new();
  if let Some(scene) = &scene {
    pending.extend(scene.nodes().map(|node| (node, 0)));
  }

  while let Some((node, parent)) = pending.pop_front() {
    let index = model.nodes.len();

    if let Some(range) = node.mesh().and_then(|mesh| mesh_ranges.get(mesh.index())) {
      for mesh in &mut model.meshes[range.clone()] {
        mesh.parent = Some(index);
      }
    }

    pending.extend(node.children().map(|child| (child, index)));

    model.nodes.push(Node {
      parent:         Some(parent),
      transformation: Mat4::from_cols_array_2d(&node.transform().matrix()),
      name:           names.or_generate(node.name()),
    });
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const OBJ: &str = "\
mtllib scene.mtl
o Quad
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 0.25
usemtl Wood
f 1/1 2/2 3/3 4/4
o Tri
v 0 0 1
v 1 0 1
v 0 1 1
f 5 6 7
";

  const MTL: &str = "\
newmtl Wood
Kd 0.8 0.6 0.4
Ks 0.1 0.1 0.1
Ns 32
d 0.5
map_Kd textures\\wood.png
map_Bump textures/wood_n.png
";

  fn load_obj_fixture() -> Model {
    load_obj_from_reader(&mut OBJ.as_bytes(), |_| {
      tobj::load_mtl_buf(&mut MTL.as_bytes())
    })
    .unwrap()
  }

  #[test]
  fn obj_meshes_hang_off_a_single_root() {
    let model = load_obj_fixture();

    assert_eq!(model.nodes.len(), 1);
    assert_eq!(model.nodes[0].parent, None);
    assert_eq!(model.nodes[0].transformation, Mat4::IDENTITY);

    assert_eq!(model.meshes.len(), 2);
    assert_eq!(model.meshes[0].name, "mesh0: Quad");
    assert_eq!(model.meshes[1].name, "mesh1: Tri");
    assert!(model.meshes.iter().all(|m| m.parent == Some(0)));
  }

  #[test]
  fn obj_faces_are_triangulated() {
    let model = load_obj_fixture();
    let quad = &model.meshes[0];

    assert_eq!(quad.topology.len(), 2);
    assert_eq!(quad.vertex_info.position.len(), 4);
    assert_eq!(model.meshes[1].topology.len(), 1);
    assert_eq!(model.triangle_count(), 3);
    assert_eq!(model.vertex_count(), 7);
  }

  #[test]
  fn obj_texcoords_are_flipped_vertically() {
    let model = load_obj_fixture();
    let texcoords = &model.meshes[0].vertex_info.texcoord;

    assert_eq!(texcoords.len(), 4);
    assert!(texcoords.contains(&Vec2::new(0.0, 1.0)));
    assert!(texcoords.contains(&Vec2::new(0.0, 0.75)));
    assert!(model.meshes[1].vertex_info.texcoord.is_empty());
  }

  #[test]
  fn obj_materials_come_from_the_mtl() {
    let model = load_obj_fixture();

    assert_eq!(model.meshes[0].material, Some(0));
    let wood = &model.materials[0];
    assert_eq!(wood.name, "Wood");
    assert_eq!(wood.diffuse_color, Vec4::new(0.8, 0.6, 0.4, 1.0));
    assert_eq!(wood.specular_color, Vec4::new(0.1, 0.1, 0.1, 1.0));
    assert_eq!(wood.ambient_color, Vec4::ZERO);
    assert_eq!(wood.shininess, 32.0);
    assert_eq!(wood.opacity, 0.5);
    assert_eq!(
      wood.material_textures.get(&TextureType::Diffuse).map(String::as_str),
      Some("textures/wood.png")
    );
    assert_eq!(
      wood.material_textures.get(&TextureType::Normal).map(String::as_str),
      Some("textures/wood_n.png")
    );
    assert_eq!(
      model.textures.iter().cloned().collect::<Vec<_>>(),
      vec!["textures/wood.png".to_owned(), "textures/wood_n.png".to_owned()]
    );
    assert_eq!(model.primary_texture(), Some("textures/wood.png"));
  }

  #[test]
  fn obj_without_material_library_still_loads() {
    let model = load_obj_from_reader(&mut OBJ.as_bytes(), |_| {
      Err(tobj::LoadError::OpenFileFailed)
    })
    .unwrap();

    assert!(model.materials.is_empty());
    assert_eq!(model.meshes[0].material, None);
    assert_eq!(model.primary_texture(), None);
  }

  // One triangle: positions, u16 indices and texcoords packed into one buffer.
  const GLTF: &str = r#"{
    "asset": { "version": "2.0" },
    "scene": 0,
    "scenes": [{ "name": "Scene", "nodes": [0, 3] }],
    "nodes": [
      { "name": "parent", "translation": [0.0, 0.0, 5.0], "children": [1] },
      { "mesh": 0, "children": [2] },
      { "name": "leaf" },
      { "name": "sibling" }
    ],
    "meshes": [{
      "name": "Triangle",
      "primitives": [{
        "attributes": { "POSITION": 0, "TEXCOORD_0": 2 },
        "indices": 1,
        "material": 0
      }]
    }],
    "materials": [{
      "name": "Brick",
      "pbrMetallicRoughness": {
        "baseColorFactor": [0.5, 0.25, 1.0, 0.75],
        "baseColorTexture": { "index": 0 }
      },
      "normalTexture": { "index": 1 },
      "emissiveFactor": [0.1, 0.2, 0.3]
    }],
    "textures": [{ "source": 0 }, { "source": 1 }],
    "images": [
      { "uri": "textures\\brick.png" },
      { "bufferView": 2, "mimeType": "image/png" }
    ],
    "accessors": [
      { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
        "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] },
      { "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" },
      { "bufferView": 2, "componentType": 5126, "count": 3, "type": "VEC2" }
    ],
    "bufferViews": [
      { "buffer": 0, "byteOffset": 0, "byteLength": 36, "target": 34962 },
      { "buffer": 0, "byteOffset": 36, "byteLength": 6, "target": 34963 },
      { "buffer": 0, "byteOffset": 44, "byteLength": 24 }
    ],
    "buffers": [{
      "byteLength": 68,
      "uri": "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAAAAABAAIAAAAAAAAAAAAAAAAAgD8AAAAAAAAAAAAAgD8="
    }]
  }"#;

  fn load_gltf_fixture() -> Model {
    load_gltf_from_slice(GLTF.as_bytes(), None).unwrap()
  }

  #[test]
  fn gltf_nodes_are_in_level_order() {
    let model = load_gltf_fixture();
    let names: Vec<&str> = model.nodes.iter().map(|n| n.name.as_str()).collect();
    let parents: Vec<Option<usize>> = model.nodes.iter().map(|n| n.parent).collect();

    assert_eq!(names, ["Scene", "parent", "sibling", "node0", "leaf"]);
    assert_eq!(parents, [None, Some(0), Some(0), Some(1), Some(3)]);
    for (index, node) in model.nodes.iter().enumerate() {
      if let Some(parent) = node.parent {
        assert!(parent < index);
      }
    }
    assert_eq!(
      model.nodes[1].transformation,
      Mat4::from_translation(Vec3::new(0.0, 0.0, 5.0))
    );
  }

  #[test]
  fn gltf_primitives_become_meshes() {
    let model = load_gltf_fixture();

    assert_eq!(model.meshes.len(), 1);
    let mesh = &model.meshes[0];
    assert_eq!(mesh.name, "mesh0: Triangle");
    assert_eq!(mesh.parent, Some(3));
    assert_eq!(mesh.material, Some(0));
    assert_eq!(mesh.topology, vec![Triangle { a: 0, b: 1, c: 2 }]);
    assert_eq!(
      mesh.vertex_info.position,
      vec![
        Vec3::ZERO,
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(0.0, 1.0, 0.0)
      ]
    );
    assert_eq!(
      mesh.vertex_info.texcoord,
      vec![Vec2::ZERO, Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)]
    );
    assert!(mesh.vertex_info.normal.is_empty());
    assert!(mesh.vertex_info.bitangent.is_empty());
  }

  #[test]
  fn gltf_materials_and_textures() {
    let model = load_gltf_fixture();
    let brick = &model.materials[0];

    assert_eq!(brick.name, "Brick");
    assert_eq!(brick.diffuse_color, Vec4::new(0.5, 0.25, 1.0, 0.75));
    assert_eq!(brick.opacity, 0.75);
    assert_eq!(brick.emissive_color, Vec4::new(0.1, 0.2, 0.3, 1.0));
    assert_eq!(
      brick.material_textures.get(&TextureType::BaseColor).map(String::as_str),
      Some("textures/brick.png")
    );
    assert_eq!(
      brick.material_textures.get(&TextureType::Normal).map(String::as_str),
      Some("*1")
    );
    assert!(model.textures.contains("*1"));
    assert!(model.textures.contains("textures/brick.png"));
    assert_eq!(model.primary_texture(), Some("textures/brick.png"));
  }

  // A mesh instanced by two nodes, with a point primitive ahead of a non-indexed triangle that
  // carries normals and left-handed tangents.
  const GLTF_SHARED: &str = r#"{
    "asset": { "version": "2.0" },
    "scene": 0,
    "scenes": [{ "nodes": [0, 2] }],
    "nodes": [
      { "name": "outer", "children": [1] },
      { "name": "deep", "mesh": 0 },
      { "name": "shallow", "mesh": 0 }
    ],
    "meshes": [{
      "name": "Shared",
      "primitives": [
        { "attributes": { "POSITION": 0 }, "mode": 0 },
        {
          "attributes": { "POSITION": 0, "NORMAL": 1, "TANGENT": 2 },
          "material": 1
        }
      ]
    }],
    "materials": [
      { "name": "Packed", "pbrMetallicRoughness": { "baseColorTexture": { "index": 0 } } },
      { "name": "Loose", "pbrMetallicRoughness": { "baseColorTexture": { "index": 1 } } }
    ],
    "textures": [{ "source": 0 }, { "source": 1 }],
    "images": [
      { "bufferView": 0, "mimeType": "image/png" },
      { "uri": "my%20tex.png" }
    ],
    "accessors": [
      { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
        "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] },
      { "bufferView": 1, "componentType": 5126, "count": 3, "type": "VEC3" },
      { "bufferView": 2, "componentType": 5126, "count": 3, "type": "VEC4" }
    ],
    "bufferViews": [
      { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
      { "buffer": 0, "byteOffset": 36, "byteLength": 36 },
      { "buffer": 0, "byteOffset": 72, "byteLength": 48 }
    ],
    "buffers": [{
      "byteLength": 120,
      "uri": "data:application/octet-stream;base64,AAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAgD8AAAAAAAAAAAAAAAAAAIA/AAAAAAAAAAAAAIA/AAAAAAAAAAAAAIA/AACAPwAAAAAAAAAAAACAvwAAgD8AAAAAAAAAAAAAgL8AAIA/AAAAAAAAAAAAAIC/"
    }]
  }"#;

  fn load_shared_fixture() -> Model {
    load_gltf_from_slice(GLTF_SHARED.as_bytes(), None).unwrap()
  }

  #[test]
  fn gltf_non_triangle_primitives_are_skipped() {
    let model = load_shared_fixture();

    assert_eq!(model.meshes.len(), 1);
    let mesh = &model.meshes[0];
    assert_eq!(mesh.name, "mesh0: Shared");
    assert_eq!(mesh.material, Some(1));
    assert_eq!(mesh.topology, vec![Triangle { a: 0, b: 1, c: 2 }]);
  }

  #[test]
  fn gltf_tangents_carry_handedness_into_bitangents() {
    let model = load_shared_fixture();
    let info = &model.meshes[0].vertex_info;

    assert_eq!(info.normal, vec![Vec3::Z; 3]);
    assert_eq!(info.tangent, vec![Vec3::X; 3]);
    assert_eq!(info.bitangent, vec![Vec3::NEG_Y; 3]);
  }

  #[test]
  fn gltf_shared_mesh_belongs_to_the_last_node_in_level_order() {
    let model = load_shared_fixture();
    let names: Vec<&str> = model.nodes.iter().map(|n| n.name.as_str()).collect();

    assert_eq!(names, ["node0", "outer", "shallow", "deep"]);
    assert_eq!(model.meshes[0].parent, Some(3));
  }

  #[test]
  fn primary_texture_skips_embedded_images() {
    let model = load_shared_fixture();

    assert_eq!(
      model.materials[0]
        .material_textures
        .get(&TextureType::Diffuse)
        .map(String::as_str),
      Some("*0")
    );
    assert_eq!(model.primary_texture(), Some("my tex.png"));
    assert!(model.textures.contains("my tex.png"));
    assert!(!model.textures.iter().any(|t| t.contains('%')));
  }

  #[test]
  fn unknown_extensions_are_rejected() {
    assert!(matches!(
      load_model("scene.fbx"),
      Err(EngineError::UnsupportedModel(_))
    ));
  }

  #[test]
  fn generated_names_count_only_unnamed_objects() {
    let mut names = NameGenerator::new("node");
    assert_eq!(names.or_generate(Some("named")), "named");
    assert_eq!(names.or_generate(None), "node0");
    assert_eq!(names.or_generate(Some("")), "node1");

    let mut meshes = NameGenerator::new("mesh");
    assert_eq!(meshes.with_suffix(None), "mesh0");
    assert_eq!(meshes.with_suffix(Some("Body")), "mesh1: Body");
  }
}
