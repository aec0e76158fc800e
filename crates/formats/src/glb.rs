//! Template bounds from glTF assets.
//!
//! Only the JSON part is read: every `POSITION` accessor carries `min`/`max`,
//! which are pushed through the node hierarchy of the default scene. The
//! binary chunk is never touched.

use std::collections::BTreeMap;

use foundation::bounds::Aabb3;
use foundation::math::Vec3;
use scene::{Template, TemplateError};
use serde::Deserialize;
use thiserror::Error;

const GLB_MAGIC: u32 = 0x4654_6C67; // "glTF"
const CHUNK_JSON: u32 = 0x4E4F_534A; // "JSON"
const MAX_NODE_DEPTH: usize = 64;

#[derive(Debug, Error)]
pub enum GlbError {
    #[error("not a glTF asset")]
    NotGltf,
    #[error("unsupported glTF container version {0}")]
    UnsupportedVersion(u32),
    #[error("glTF container truncated")]
    Truncated,
    #[error("first GLB chunk is not JSON")]
    MissingJsonChunk,
    #[error("invalid glTF JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("glTF references missing {kind} {index}")]
    DanglingIndex { kind: &'static str, index: usize },
    #[error("node hierarchy too deep (cycle?)")]
    TooDeep,
    #[error("asset contains no positioned geometry")]
    NoGeometry,
    #[error(transparent)]
    Template(#[from] TemplateError),
}

#[derive(Debug, Default, Deserialize)]
struct Gltf {
    scene: Option<usize>,
    #[serde(default)]
    scenes: Vec<SceneDef>,
    #[serde(default)]
    nodes: Vec<Node>,
    #[serde(default)]
    meshes: Vec<Mesh>,
    #[serde(default)]
    accessors: Vec<Accessor>,
}

#[derive(Debug, Default, Deserialize)]
struct SceneDef {
    #[serde(default)]
    nodes: Vec<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct Node {
    #[serde(default)]
    children: Vec<usize>,
    mesh: Option<usize>,
    matrix: Option<[f64; 16]>,
    translation: Option<[f64; 3]>,
    rotation: Option<[f64; 4]>,
    scale: Option<[f64; 3]>,
}

#[derive(Debug, Default, Deserialize)]
struct Mesh {
    #[serde(default)]
    primitives: Vec<Primitive>,
}

#[derive(Debug, Default, Deserialize)]
struct Primitive {
    #[serde(default)]
    attributes: BTreeMap<String, usize>,
}

#[derive(Debug, Default, Deserialize)]
struct Accessor {
    min: Option<Vec<f64>>,
    max: Option<Vec<f64>>,
}

/// Column-major 4x4, as glTF stores it.
type Mat4 = [f64; 16];

const IDENTITY: Mat4 = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

fn mat_mul(a: &Mat4, b: &Mat4) -> Mat4 {
    let mut out = [0.0; 16];
    for col in 0..4 {
        for row in 0..4 {
            out[col * 4 + row] = (0..4).map(|k| a[k * 4 + row] * b[col * 4 + k]).sum();
        }
    }
    out
}

fn transform_point(m: &Mat4, p: Vec3) -> Vec3 {
    Vec3::new(
        m[0] * p.x + m[4] * p.y + m[8] * p.z + m[12],
        m[1] * p.x + m[5] * p.y + m[9] * p.z + m[13],
        m[2] * p.x + m[6] * p.y + m[10] * p.z + m[14],
    )
}

/// T * R * S
fn trs(t: [f64; 3], r: [f64; 4], s: [f64; 3]) -> Mat4 {
    let [x, y, z, w] = r;
    let (xx, yy, zz) = (x * x, y * y, z * z);
    let (xy, xz, yz) = (x * y, x * z, y * z);
    let (wx, wy, wz) = (w * x, w * y, w * z);
    [
        (1.0 - 2.0 * (yy + zz)) * s[0],
        2.0 * (xy + wz) * s[0],
        2.0 * (xz - wy) * s[0],
        0.0,
        2.0 * (xy - wz) * s[1],
        (1.0 - 2.0 * (xx + zz)) * s[1],
        2.0 * (yz + wx) * s[1],
        0.0,
        2.0 * (xz + wy) * s[2],
        2.0 * (yz - wx) * s[2],
        (1.0 - 2.0 * (xx + yy)) * s[2],
        0.0,
        t[0],
        t[1],
        t[2],
        1.0,
    ]
}

impl Node {
    fn local_matrix(&self) -> Mat4 {
        if let Some(m) = self.matrix {
            return m;
        }
        trs(
            self.translation.unwrap_or([0.0; 3]),
            self.rotation.unwrap_or([0.0, 0.0, 0.0, 1.0]),
            self.scale.unwrap_or([1.0; 3]),
        )
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> Result<u32, GlbError> {
    let raw = bytes.get(offset..offset + 4).ok_or(GlbError::Truncated)?;
    Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

/// Extract the JSON document from a `.glb` container, or pass `.gltf` JSON through.
fn json_chunk(bytes: &[u8]) -> Result<&[u8], GlbError> {
    let first = bytes.iter().find(|b| !b.is_ascii_whitespace());
    if first == Some(&b'{') {
        return Ok(bytes);
    }
    if read_u32(bytes, 0)? != GLB_MAGIC {
        return Err(GlbError::NotGltf);
    }
    let version = read_u32(bytes, 4)?;
    if version != 2 {
        return Err(GlbError::UnsupportedVersion(version));
    }
    let chunk_len = read_u32(bytes, 12)? as usize;
    if read_u32(bytes, 16)? != CHUNK_JSON {
        return Err(GlbError::MissingJsonChunk);
    }
    bytes.get(20..20 + chunk_len).ok_or(GlbError::Truncated)
}

struct BoundsWalker<'a> {
    gltf: &'a Gltf,
    bounds: Option<Aabb3>,
}

impl BoundsWalker<'_> {
    fn visit(&mut self, index: usize, parent: &Mat4, depth: usize) -> Result<(), GlbError> {
        if depth > MAX_NODE_DEPTH {
            return Err(GlbError::TooDeep);
        }
        let gltf = self.gltf;
        let node = gltf.nodes.get(index).ok_or(GlbError::DanglingIndex {
            kind: "node",
            index,
        })?;
        let world = mat_mul(parent, &node.local_matrix());

        if let Some(mesh_index) = node.mesh {
            let mesh = gltf.meshes.get(mesh_index).ok_or(GlbError::DanglingIndex {
                kind: "mesh",
                index: mesh_index,
            })?;
            for primitive in &mesh.primitives {
                let Some(&accessor_index) = primitive.attributes.get("POSITION") else {
                    continue;
                };
                let accessor = gltf.accessors.get(accessor_index).ok_or(GlbError::DanglingIndex {
                    kind: "accessor",
                    index: accessor_index,
                })?;
                let (Some(min), Some(max)) = (&accessor.min, &accessor.max) else {
                    continue;
                };
                if min.len() < 3 || max.len() < 3 {
                    continue;
                }
                let local = Aabb3::new([min[0], min[1], min[2]], [max[0], max[1], max[2]]);
                let corners = local.corners().map(|c| transform_point(&world, c));
                if let Some(b) = Aabb3::from_points(corners) {
                    self.bounds = Some(match self.bounds {
                        Some(acc) => acc.union(b),
                        None => b,
                    });
                }
            }
        }

        for &child in &node.children {
            self.visit(child, &world, depth + 1)?;
        }
        Ok(())
    }
}

fn root_nodes(gltf: &Gltf) -> Vec<usize> {
    if let Some(scene) = gltf.scenes.get(gltf.scene.unwrap_or(0)) {
        return scene.nodes.clone();
    }
    // No scenes: every node that nobody lists as a child is a root.
    let mut is_child = vec![false; gltf.nodes.len()];
    for node in &gltf.nodes {
        for &c in &node.children {
            if let Some(flag) = is_child.get_mut(c) {
                *flag = true;
            }
        }
    }
    (0..gltf.nodes.len()).filter(|&i| !is_child[i]).collect()
}

/// Model-space bounds of the default scene of a `.glb` or `.gltf` asset.
pub fn gltf_bounds(bytes: &[u8]) -> Result<Aabb3, GlbError> {
    let gltf: Gltf = serde_json::from_slice(json_chunk(bytes)?)?;
    let mut walker = BoundsWalker {
        gltf: &gltf,
        bounds: None,
    };
    for root in root_nodes(&gltf) {
        walker.visit(root, &IDENTITY, 0)?;
    }
    walker.bounds.ok_or(GlbError::NoGeometry)
}

/// Build the shared placement template from raw asset bytes.
pub fn template_from_gltf(name: impl Into<String>, bytes: &[u8]) -> Result<Template, GlbError> {
    let bounds = gltf_bounds(bytes)?;
    Ok(Template::new(name, bounds)?)
}

#[cfg(test)]
mod tests {
    use super::{GLB_MAGIC, GlbError, gltf_bounds, template_from_gltf};
    use serde_json::json;

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    fn glb(json: &serde_json::Value) -> Vec<u8> {
        let mut payload = serde_json::to_vec(json).expect("json");
        while payload.len() % 4 != 0 {
            payload.push(b' ');
        }
        let total = 12 + 8 + payload.len();
        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(&GLB_MAGIC.to_le_bytes());
        out.extend_from_slice(&2u32.to_le_bytes());
        out.extend_from_slice(&(total as u32).to_le_bytes());
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(b"JSON");
        out.extend_from_slice(&payload);
        out
    }

    fn tower(nodes: serde_json::Value) -> serde_json::Value {
        json!({
            "asset": { "version": "2.0" },
            "scene": 0,
            "scenes": [{ "nodes": [0] }],
            "nodes": nodes,
            "meshes": [{ "primitives": [{ "attributes": { "POSITION": 0, "NORMAL": 1 } }] }],
            "accessors": [
                { "min": [-2.0, 0.0, -2.0], "max": [2.0, 50.0, 2.0] },
                { "min": [-1.0, -1.0, -1.0], "max": [1.0, 1.0, 1.0] }
            ]
        })
    }

    #[test]
    fn bounds_from_position_accessor() {
        let bytes = glb(&tower(json!([{ "mesh": 0 }])));
        let bounds = gltf_bounds(&bytes).expect("bounds");
        assert_eq!(bounds.min, [-2.0, 0.0, -2.0]);
        assert_eq!(bounds.max, [2.0, 50.0, 2.0]);
    }

    #[test]
    fn node_scale_and_translation_apply() {
        let bytes = glb(&tower(json!([
            { "children": [1], "scale": [1.0, 2.0, 1.0] },
            { "mesh": 0, "translation": [0.0, 5.0, 0.0] }
        ])));
        let template = template_from_gltf("tower", &bytes).expect("template");
        // (0..50 + 5) * 2
        assert_close(template.metrics().reference_height, 100.0, 1e-9);
        assert_close(template.bounds().min[1], 10.0, 1e-9);
    }

    #[test]
    fn z_up_asset_rotated_to_y_up() {
        // Authored Z-up: 80 m tall along Z, rotated -90 deg about X.
        let h = std::f64::consts::FRAC_1_SQRT_2;
        let bytes = glb(&json!({
            "scenes": [{ "nodes": [0] }],
            "nodes": [{ "mesh": 0, "rotation": [-h, 0.0, 0.0, h] }],
            "meshes": [{ "primitives": [{ "attributes": { "POSITION": 0 } }] }],
            "accessors": [{ "min": [-1.0, -1.0, 0.0], "max": [1.0, 1.0, 80.0] }]
        }));
        let bounds = gltf_bounds(&bytes).expect("bounds");
        assert_close(bounds.height(), 80.0, 1e-9);
    }

    #[test]
    fn plain_gltf_json_is_accepted() {
        let bytes = serde_json::to_vec(&tower(json!([{ "mesh": 0 }]))).expect("json");
        assert_close(gltf_bounds(&bytes).expect("bounds").height(), 50.0, 1e-12);
    }

    #[test]
    fn rejects_garbage_and_empty_scenes() {
        assert!(matches!(gltf_bounds(b"PK\x03\x04rest"), Err(GlbError::NotGltf)));
        assert!(matches!(gltf_bounds(b"gl"), Err(GlbError::Truncated)));

        let empty = glb(&json!({ "scenes": [{ "nodes": [] }] }));
        assert!(matches!(gltf_bounds(&empty), Err(GlbError::NoGeometry)));

        let dangling = glb(&json!({ "scenes": [{ "nodes": [3] }] }));
        assert!(matches!(
            gltf_bounds(&dangling),
            Err(GlbError::DanglingIndex { kind: "node", index: 3 })
        ));
    }

    #[test]
    fn cyclic_hierarchy_is_rejected() {
        let bytes = glb(&json!({
            "scenes": [{ "nodes": [0] }],
            "nodes": [{ "children": [1] }, { "children": [0] }]
        }));
        assert!(matches!(gltf_bounds(&bytes), Err(GlbError::TooDeep)));
    }
}
