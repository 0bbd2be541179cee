//! Host-facing scene types: source meshes and their materials.
//!
//! These are the narrow interface through which a rendering engine hands
//! geometry to the view-map builder. Materials are shared with the host
//! renderer, hence `Arc<RwLock<_>>`.

use std::fmt;
use std::sync::{Arc, RwLock};

use nalgebra::{Matrix4, Point3};
use viewmap_geom::Culling;

/// A packed `0xRRGGBB` color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Color(pub u32);

impl Color {
    /// Create a color from a packed hex value; bits above 24 are dropped.
    #[must_use]
    pub const fn from_hex(hex: u32) -> Self {
        Self(hex & 0x00ff_ffff)
    }

    /// Create a color from 8-bit channels.
    #[must_use]
    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self(((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }

    /// Packed hex value.
    #[must_use]
    pub const fn hex(self) -> u32 {
        self.0
    }

    /// Channels as `(r, g, b)`.
    #[must_use]
    pub const fn rgb(self) -> (u8, u8, u8) {
        (
            ((self.0 >> 16) & 0xff) as u8,
            ((self.0 >> 8) & 0xff) as u8,
            (self.0 & 0xff) as u8,
        )
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06x}", self.0)
    }
}

/// Which side of a face a material renders, and therefore which ray hits
/// count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Side {
    /// Counter-clockwise side only.
    #[default]
    Front,
    /// Clockwise side only.
    Back,
    /// Both sides.
    Double,
}

impl Side {
    /// Ray culling mode for this side.
    #[must_use]
    pub fn culling(self) -> Culling {
        match self {
            Self::Front => Culling::Back,
            Self::Back => Culling::Front,
            Self::Double => Culling::None,
        }
    }
}

/// A surface material as seen by the view-map builder.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Material {
    /// Material name.
    pub name: String,
    /// Flat color, if the material has one.
    pub color: Option<Color>,
    /// Rendered side.
    pub side: Side,
}

impl Material {
    /// Create a front-sided material with a color.
    #[must_use]
    pub fn new(name: impl Into<String>, color: Color) -> Self {
        Self {
            name: name.into(),
            color: Some(color),
            side: Side::Front,
        }
    }

    /// Set the rendered side.
    #[must_use]
    pub fn with_side(mut self, side: Side) -> Self {
        self.side = side;
        self
    }

    /// Wrap into a shared handle.
    #[must_use]
    pub fn shared(self) -> SharedMaterial {
        Arc::new(RwLock::new(self))
    }
}

/// A material shared between the host renderer and the builder.
pub type SharedMaterial = Arc<RwLock<Material>>;

/// A contiguous range of triangles rendered with one material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MaterialGroup {
    /// First triangle of the range.
    pub start: usize,
    /// Number of triangles in the range.
    pub count: usize,
    /// Index into the mesh's material list.
    pub material_index: usize,
}

impl MaterialGroup {
    /// Whether `triangle` lies in this range.
    #[must_use]
    pub fn contains(&self, triangle: usize) -> bool {
        triangle >= self.start && triangle < self.start + self.count
    }
}

/// Resolves deformed (morph or skinned) positions for a source mesh.
pub trait MorphResolver: Send + Sync {
    /// Deformed positions, one per rest position, in mesh-local space.
    fn resolve(&self, rest: &[Point3<f64>]) -> Vec<Point3<f64>>;
}

/// A renderable triangle mesh supplied by the host scene.
#[derive(Clone)]
pub struct SourceMesh {
    /// Mesh name, used in logs and build info.
    pub name: String,
    /// Rest positions in mesh-local space.
    pub positions: Vec<Point3<f64>>,
    /// Triangles as indices into `positions`.
    pub faces: Vec<[u32; 3]>,
    /// Material ranges; empty means every face uses material 0.
    pub groups: Vec<MaterialGroup>,
    /// Materials referenced by `groups`.
    pub materials: Vec<SharedMaterial>,
    /// Local-to-world transform.
    pub world: Matrix4<f64>,
    /// Optional deformation resolver.
    pub morph: Option<Arc<dyn MorphResolver>>,
}

impl fmt::Debug for SourceMesh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceMesh")
            .field("name", &self.name)
            .field("positions", &self.positions.len())
            .field("faces", &self.faces.len())
            .field("groups", &self.groups)
            .field("materials", &self.materials.len())
            .field("morph", &self.morph.is_some())
            .finish_non_exhaustive()
    }
}

impl SourceMesh {
    /// Create a mesh with an identity transform and no material.
    #[must_use]
    pub fn new(name: impl Into<String>, positions: Vec<Point3<f64>>, faces: Vec<[u32; 3]>) -> Self {
        Self {
            name: name.into(),
            positions,
            faces,
            groups: Vec::new(),
            materials: Vec::new(),
            world: Matrix4::identity(),
            morph: None,
        }
    }

    /// Add a material; the first one is used when there are no groups.
    #[must_use]
    pub fn with_material(mut self, material: SharedMaterial) -> Self {
        self.materials.push(material);
        self
    }

    /// Set the material ranges.
    #[must_use]
    pub fn with_groups(mut self, groups: Vec<MaterialGroup>) -> Self {
        self.groups = groups;
        self
    }

    /// Set the local-to-world transform.
    #[must_use]
    pub fn with_world(mut self, world: Matrix4<f64>) -> Self {
        self.world = world;
        self
    }

    /// Set a deformation resolver.
    #[must_use]
    pub fn with_morph(mut self, morph: Arc<dyn MorphResolver>) -> Self {
        self.morph = Some(morph);
        self
    }

    /// Material used by a triangle.
    ///
    /// With groups, the group whose range holds the triangle decides;
    /// without groups, the first material applies.
    #[must_use]
    pub fn material_for_face(&self, triangle: usize) -> Option<&SharedMaterial> {
        if self.groups.is_empty() {
            return self.materials.first();
        }
        self.groups
            .iter()
            .find(|g| g.contains(triangle))
            .and_then(|g| self.materials.get(g.material_index))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_color_channels() {
        let c = Color::from_rgb(0x12, 0x34, 0x56);
        assert_eq!(c.hex(), 0x0012_3456);
        assert_eq!(c.rgb(), (0x12, 0x34, 0x56));
        assert_eq!(Color::from_hex(0xff55_5555), Color(0x0055_5555));
        assert_eq!(c.to_string(), "#123456");
    }

    #[test]
    fn test_side_culling() {
        assert_eq!(Side::Front.culling(), Culling::Back);
        assert_eq!(Side::Back.culling(), Culling::Front);
        assert_eq!(Side::Double.culling(), Culling::None);
    }

    #[test]
    fn test_material_for_face_groups() {
        let red = Material::new("red", Color(0xff0000)).shared();
        let blue = Material::new("blue", Color(0x0000ff)).shared();
        let mesh = SourceMesh::new("m", Vec::new(), Vec::new())
            .with_material(red)
            .with_material(blue)
            .with_groups(vec![
                MaterialGroup {
                    start: 0,
                    count: 2,
                    material_index: 0,
                },
                MaterialGroup {
                    start: 2,
                    count: 4,
                    material_index: 1,
                },
            ]);

        let color = |t| {
            mesh.material_for_face(t)
                .and_then(|m| m.read().unwrap().color)
        };
        assert_eq!(color(1), Some(Color(0xff0000)));
        assert_eq!(color(2), Some(Color(0x0000ff)));
        assert_eq!(color(5), Some(Color(0x0000ff)));
        assert_eq!(color(6), None);
    }

    #[test]
    fn test_material_for_face_single() {
        let mesh = SourceMesh::new("m", Vec::new(), Vec::new())
            .with_material(Material::new("grey", Color(0x808080)).shared());
        assert!(mesh.material_for_face(42).is_some());
        assert!(SourceMesh::new("bare", Vec::new(), Vec::new())
            .material_for_face(0)
            .is_none());
    }
}
