//! Bounding Volume Hierarchy over indexed triangles.
//!
//! The tree answers three kinds of queries used by the view-map pipeline:
//! box queries, ray candidate queries (slab test against node boxes) and
//! pairwise traversal of two trees living in different local spaces.
//! Triangle-exact tests are left to [`crate::intersect`].

use nalgebra::{Matrix4, Point3, Vector3};
use smallvec::SmallVec;

/// Axis-aligned bounding box for BVH nodes.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Aabb {
    /// Minimum corner of the bounding box.
    pub min: Point3<f64>,
    /// Maximum corner of the bounding box.
    pub max: Point3<f64>,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

impl Aabb {
    /// Create an empty (inverted) bounding box.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::MAX, f64::MAX, f64::MAX),
            max: Point3::new(f64::MIN, f64::MIN, f64::MIN),
        }
    }

    /// Create a bounding box from a triangle.
    #[must_use]
    pub fn from_triangle(v0: &Point3<f64>, v1: &Point3<f64>, v2: &Point3<f64>) -> Self {
        let mut bbox = Self::empty();
        bbox.expand_point(v0);
        bbox.expand_point(v1);
        bbox.expand_point(v2);
        bbox
    }

    /// Create a bounding box from min and max points.
    #[must_use]
    pub fn from_min_max(min: Point3<f64>, max: Point3<f64>) -> Self {
        Self { min, max }
    }

    /// Expand this bounding box to include another.
    pub fn expand(&mut self, other: &Self) {
        self.min = self.min.inf(&other.min);
        self.max = self.max.sup(&other.max);
    }

    /// Expand this bounding box to include a point.
    pub fn expand_point(&mut self, point: &Point3<f64>) {
        self.min = self.min.inf(point);
        self.max = self.max.sup(point);
    }

    /// Check if this bounding box intersects another, with tolerance.
    #[must_use]
    pub fn intersects(&self, other: &Self, tolerance: f64) -> bool {
        !(self.max.x + tolerance < other.min.x
            || other.max.x + tolerance < self.min.x
            || self.max.y + tolerance < other.min.y
            || other.max.y + tolerance < self.min.y
            || self.max.z + tolerance < other.min.z
            || other.max.z + tolerance < self.min.z)
    }

    /// Get the center of this bounding box.
    #[must_use]
    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    /// Get the index of the longest axis (0=X, 1=Y, 2=Z).
    #[must_use]
    pub fn longest_axis(&self) -> usize {
        let d = self.max - self.min;
        if d.x >= d.y && d.x >= d.z {
            0
        } else if d.y >= d.z {
            1
        } else {
            2
        }
    }

    /// Check if this bounding box is valid (non-empty).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    /// Pad this bounding box by a given amount in all directions.
    #[must_use]
    pub fn padded(&self, padding: f64) -> Self {
        let pad = Vector3::repeat(padding);
        Self {
            min: self.min - pad,
            max: self.max + pad,
        }
    }

    /// Get the surface area of this bounding box (zero when empty).
    #[must_use]
    pub fn surface_area(&self) -> f64 {
        if !self.is_valid() {
            return 0.0;
        }
        let d = self.max - self.min;
        2.0 * (d.x * d.y + d.y * d.z + d.z * d.x)
    }

    /// Bounding box of this box after an affine transform.
    ///
    /// All eight corners are transformed, so the result is conservative
    /// under rotation.
    #[must_use]
    pub fn transformed(&self, matrix: &Matrix4<f64>) -> Self {
        if !self.is_valid() {
            return *self;
        }
        let mut out = Self::empty();
        for i in 0..8 {
            let corner = Point3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            out.expand_point(&matrix.transform_point(&corner));
        }
        out
    }

    /// Slab test against a ray limited to `[0, max_t]`.
    ///
    /// `inv_dir` holds the component-wise reciprocal of the ray direction;
    /// infinite components are handled by IEEE arithmetic.
    #[must_use]
    pub fn hit_by_ray(&self, origin: &Point3<f64>, inv_dir: &Vector3<f64>, max_t: f64) -> bool {
        if !self.is_valid() {
            return false;
        }
        let mut t_near = 0.0_f64;
        let mut t_far = max_t;

        for axis in 0..3 {
            let lo = (self.min[axis] - origin[axis]) * inv_dir[axis];
            let hi = (self.max[axis] - origin[axis]) * inv_dir[axis];
            // 0 * inf yields NaN when the origin sits on a slab plane
            let (lo, hi) = if lo.is_nan() || hi.is_nan() {
                if origin[axis] < self.min[axis] || origin[axis] > self.max[axis] {
                    return false;
                }
                continue;
            } else if lo <= hi {
                (lo, hi)
            } else {
                (hi, lo)
            };
            t_near = t_near.max(lo);
            t_far = t_far.min(hi);
            if t_near > t_far {
                return false;
            }
        }
        true
    }
}

/// BVH node containing either leaf triangles or child nodes.
#[derive(Debug, Clone)]
pub enum BvhNode {
    /// Leaf node containing triangle indices.
    Leaf {
        /// Bounding box of all triangles in this leaf.
        bbox: Aabb,
        /// Triangle indices stored in this leaf.
        triangles: SmallVec<[u32; 8]>,
    },
    /// Internal node with two children.
    Internal {
        /// Bounding box of all triangles in this subtree.
        bbox: Aabb,
        /// Left child node.
        left: Box<Self>,
        /// Right child node.
        right: Box<Self>,
    },
}

impl BvhNode {
    /// Get the bounding box of this node.
    #[must_use]
    pub fn bbox(&self) -> &Aabb {
        match self {
            Self::Leaf { bbox, .. } | Self::Internal { bbox, .. } => bbox,
        }
    }
}

/// Bounding Volume Hierarchy for indexed triangle soups.
///
/// Triangles are referenced by their index into the `faces` slice the tree
/// was built from.
#[derive(Debug, Clone, Default)]
pub struct Bvh {
    root: Option<BvhNode>,
    triangle_count: usize,
}

impl Bvh {
    /// Build a BVH from positions and triangle faces.
    ///
    /// Faces referencing a missing position get an empty box and are never
    /// reported by queries.
    ///
    /// # Example
    ///
    /// ```
    /// use nalgebra::Point3;
    /// use viewmap_geom::bvh::Bvh;
    ///
    /// let positions = vec![
    ///     Point3::new(0.0, 0.0, 0.0),
    ///     Point3::new(1.0, 0.0, 0.0),
    ///     Point3::new(0.5, 1.0, 0.0),
    /// ];
    /// let bvh = Bvh::build(&positions, &[[0, 1, 2]], 1);
    /// assert_eq!(bvh.triangle_count(), 1);
    /// ```
    #[must_use]
    pub fn build(positions: &[Point3<f64>], faces: &[[u32; 3]], max_leaf_size: usize) -> Self {
        if faces.is_empty() {
            return Self::default();
        }

        let triangles: Vec<(u32, Aabb)> = faces
            .iter()
            .enumerate()
            .map(|(i, face)| (i as u32, face_bbox(positions, face)))
            .collect();

        let indices: Vec<usize> = (0..triangles.len()).collect();
        let root = Self::build_recursive(&triangles, indices, max_leaf_size.max(1));

        Self {
            root: Some(root),
            triangle_count: faces.len(),
        }
    }

    fn build_recursive(
        triangles: &[(u32, Aabb)],
        indices: Vec<usize>,
        max_leaf_size: usize,
    ) -> BvhNode {
        let mut bbox = Aabb::empty();
        for &i in &indices {
            bbox.expand(&triangles[i].1);
        }

        if indices.len() <= max_leaf_size {
            let triangle_indices: SmallVec<[u32; 8]> =
                indices.iter().map(|&i| triangles[i].0).collect();
            return BvhNode::Leaf {
                bbox,
                triangles: triangle_indices,
            };
        }

        // Median split along the longest axis
        let axis = bbox.longest_axis();
        let mut sorted = indices;
        sorted.sort_by(|&a, &b| {
            let va = triangles[a].1.center()[axis];
            let vb = triangles[b].1.center()[axis];
            va.partial_cmp(&vb).unwrap_or(std::cmp::Ordering::Equal)
        });

        let right_indices = sorted.split_off(sorted.len() / 2);
        let left = Self::build_recursive(triangles, sorted, max_leaf_size);
        let right = Self::build_recursive(triangles, right_indices, max_leaf_size);

        BvhNode::Internal {
            bbox,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Recompute node boxes from moved positions, keeping the tree topology.
    ///
    /// Only valid while the face list is the one the tree was built from.
    pub fn refit(&mut self, positions: &[Point3<f64>], faces: &[[u32; 3]]) {
        if let Some(root) = self.root.as_mut() {
            Self::refit_recursive(root, positions, faces);
        }
    }

    fn refit_recursive(node: &mut BvhNode, positions: &[Point3<f64>], faces: &[[u32; 3]]) -> Aabb {
        match node {
            BvhNode::Leaf { bbox, triangles } => {
                let mut fresh = Aabb::empty();
                for &t in triangles.iter() {
                    if let Some(face) = faces.get(t as usize) {
                        fresh.expand(&face_bbox(positions, face));
                    }
                }
                *bbox = fresh;
                fresh
            }
            BvhNode::Internal { bbox, left, right } => {
                let mut fresh = Self::refit_recursive(left, positions, faces);
                fresh.expand(&Self::refit_recursive(right, positions, faces));
                *bbox = fresh;
                fresh
            }
        }
    }

    /// Query the BVH for triangles that may intersect a bounding box.
    #[must_use]
    pub fn query(&self, query_bbox: &Aabb, tolerance: f64) -> Vec<u32> {
        let mut result = Vec::new();
        if let Some(ref root) = self.root {
            Self::query_recursive(root, query_bbox, tolerance, &mut result);
        }
        result
    }

    fn query_recursive(node: &BvhNode, query_bbox: &Aabb, tolerance: f64, result: &mut Vec<u32>) {
        if !node.bbox().intersects(query_bbox, tolerance) {
            return;
        }
        match node {
            BvhNode::Leaf { triangles, .. } => result.extend(triangles.iter().copied()),
            BvhNode::Internal { left, right, .. } => {
                Self::query_recursive(left, query_bbox, tolerance, result);
                Self::query_recursive(right, query_bbox, tolerance, result);
            }
        }
    }

    /// Triangles whose boxes are crossed by the ray `origin + t * direction`,
    /// `t` in `[0, max_t]`.
    #[must_use]
    pub fn query_ray(&self, origin: &Point3<f64>, direction: &Vector3<f64>, max_t: f64) -> Vec<u32> {
        let inv_dir = direction.map(|c| 1.0 / c);
        let mut result = Vec::new();
        if let Some(ref root) = self.root {
            Self::ray_recursive(root, origin, &inv_dir, max_t, &mut result);
        }
        result
    }

    fn ray_recursive(
        node: &BvhNode,
        origin: &Point3<f64>,
        inv_dir: &Vector3<f64>,
        max_t: f64,
        result: &mut Vec<u32>,
    ) {
        if !node.bbox().hit_by_ray(origin, inv_dir, max_t) {
            return;
        }
        match node {
            BvhNode::Leaf { triangles, .. } => result.extend(triangles.iter().copied()),
            BvhNode::Internal { left, right, .. } => {
                Self::ray_recursive(left, origin, inv_dir, max_t, result);
                Self::ray_recursive(right, origin, inv_dir, max_t, result);
            }
        }
    }

    /// Candidate triangle pairs between this tree and `other`.
    ///
    /// `other_to_self` maps `other`'s local space into this tree's space.
    /// Returns `(self_triangle, other_triangle)` pairs whose boxes overlap
    /// within `tolerance`.
    #[must_use]
    pub fn query_pairs(
        &self,
        other: &Self,
        other_to_self: &Matrix4<f64>,
        tolerance: f64,
    ) -> Vec<(u32, u32)> {
        let mut result = Vec::new();
        if let (Some(a), Some(b)) = (self.root.as_ref(), other.root.as_ref()) {
            Self::pairs_recursive(a, b, other_to_self, tolerance, &mut result);
        }
        result
    }

    fn pairs_recursive(
        a: &BvhNode,
        b: &BvhNode,
        b_to_a: &Matrix4<f64>,
        tolerance: f64,
        result: &mut Vec<(u32, u32)>,
    ) {
        let b_box = b.bbox().transformed(b_to_a);
        if !a.bbox().intersects(&b_box, tolerance) {
            return;
        }

        match (a, b) {
            (BvhNode::Leaf { triangles: ta, .. }, BvhNode::Leaf { triangles: tb, .. }) => {
                for &i in ta {
                    for &j in tb {
                        result.push((i, j));
                    }
                }
            }
            (BvhNode::Internal { left, right, .. }, BvhNode::Leaf { .. }) => {
                Self::pairs_recursive(left, b, b_to_a, tolerance, result);
                Self::pairs_recursive(right, b, b_to_a, tolerance, result);
            }
            (BvhNode::Leaf { .. }, BvhNode::Internal { left, right, .. }) => {
                Self::pairs_recursive(a, left, b_to_a, tolerance, result);
                Self::pairs_recursive(a, right, b_to_a, tolerance, result);
            }
            (
                BvhNode::Internal {
                    left: a_left,
                    right: a_right,
                    ..
                },
                BvhNode::Internal {
                    left: b_left,
                    right: b_right,
                    ..
                },
            ) => {
                // Descend into the larger box first
                if a.bbox().surface_area() >= b_box.surface_area() {
                    Self::pairs_recursive(a_left, b, b_to_a, tolerance, result);
                    Self::pairs_recursive(a_right, b, b_to_a, tolerance, result);
                } else {
                    Self::pairs_recursive(a, b_left, b_to_a, tolerance, result);
                    Self::pairs_recursive(a, b_right, b_to_a, tolerance, result);
                }
            }
        }
    }

    /// Get the total number of triangles in the BVH.
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.triangle_count
    }

    /// Check if the BVH is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Get the root bounding box of the BVH.
    #[must_use]
    pub fn root_bbox(&self) -> Option<&Aabb> {
        self.root.as_ref().map(BvhNode::bbox)
    }

    /// Get statistics about the BVH structure.
    #[must_use]
    pub fn stats(&self) -> BvhStats {
        let mut stats = BvhStats::default();
        if let Some(ref root) = self.root {
            Self::collect_stats(root, 0, &mut stats);
        }
        stats
    }

    fn collect_stats(node: &BvhNode, depth: usize, stats: &mut BvhStats) {
        stats.max_depth = stats.max_depth.max(depth);
        match node {
            BvhNode::Leaf { triangles, .. } => {
                stats.leaf_count += 1;
                stats.total_triangles_in_leaves += triangles.len();
            }
            BvhNode::Internal { left, right, .. } => {
                stats.internal_count += 1;
                Self::collect_stats(left, depth + 1, stats);
                Self::collect_stats(right, depth + 1, stats);
            }
        }
    }
}

fn face_bbox(positions: &[Point3<f64>], face: &[u32; 3]) -> Aabb {
    match (
        positions.get(face[0] as usize),
        positions.get(face[1] as usize),
        positions.get(face[2] as usize),
    ) {
        (Some(v0), Some(v1), Some(v2)) => Aabb::from_triangle(v0, v1, v2),
        _ => Aabb::empty(),
    }
}

/// Statistics about BVH structure.
#[derive(Debug, Default, Clone)]
pub struct BvhStats {
    /// Number of internal (branch) nodes.
    pub internal_count: usize,
    /// Number of leaf nodes.
    pub leaf_count: usize,
    /// Maximum depth of the tree.
    pub max_depth: usize,
    /// Total triangles stored across all leaves.
    pub total_triangles_in_leaves: usize,
}
