//! Perspective camera, render size and projection helpers.
//!
//! Image coordinates have their origin at the top-left corner with y
//! pointing down; normalized device coordinates (NDC) span `[-1, 1]` with y
//! pointing up.

use nalgebra::{Isometry3, Matrix4, Perspective3, Point2, Point3, Vector3};

/// A perspective camera.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PerspectiveCamera {
    /// Eye position in world space.
    pub position: Point3<f64>,
    /// Point the camera looks at.
    pub target: Point3<f64>,
    /// Up direction.
    pub up: Vector3<f64>,
    /// Vertical field of view, in degrees.
    pub fov_y: f64,
    /// Width over height.
    pub aspect: f64,
    /// Near clip distance.
    pub near: f64,
    /// Far clip distance.
    pub far: f64,
}

impl Default for PerspectiveCamera {
    fn default() -> Self {
        Self {
            position: Point3::new(0.0, 0.0, 1.0),
            target: Point3::origin(),
            up: Vector3::y(),
            fov_y: 50.0,
            aspect: 1.0,
            near: 0.1,
            far: 2000.0,
        }
    }
}

impl PerspectiveCamera {
    /// Create a camera at `position` looking at `target`.
    #[must_use]
    pub fn new(position: Point3<f64>, target: Point3<f64>) -> Self {
        Self {
            position,
            target,
            ..Self::default()
        }
    }

    /// Set the vertical field of view in degrees.
    #[must_use]
    pub fn with_fov(mut self, fov_y: f64) -> Self {
        self.fov_y = fov_y;
        self
    }

    /// Set the aspect ratio.
    #[must_use]
    pub fn with_aspect(mut self, aspect: f64) -> Self {
        self.aspect = aspect;
        self
    }

    /// Set the up direction.
    #[must_use]
    pub fn with_up(mut self, up: Vector3<f64>) -> Self {
        self.up = up;
        self
    }

    /// Set near and far clip distances.
    #[must_use]
    pub fn with_clip(mut self, near: f64, far: f64) -> Self {
        self.near = near;
        self.far = far;
        self
    }

    /// World-to-camera transform.
    #[must_use]
    pub fn view(&self) -> Isometry3<f64> {
        Isometry3::look_at_rh(&self.position, &self.target, &self.up)
    }

    /// Projection, with degenerate parameters replaced by usable ones.
    #[must_use]
    pub fn projection(&self) -> Perspective3<f64> {
        let aspect = if self.aspect.is_finite() && self.aspect > f64::EPSILON {
            self.aspect
        } else {
            1.0
        };
        let fov = self.fov_y.clamp(1e-3, 179.0).to_radians();
        let near = self.near.max(1e-6);
        let far = if self.far > near * (1.0 + 1e-6) {
            self.far
        } else {
            near * 2.0
        };
        Perspective3::new(aspect, fov, near, far)
    }
}

/// Output image size in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RenderSize {
    /// Width.
    pub w: f64,
    /// Height.
    pub h: f64,
}

impl Default for RenderSize {
    fn default() -> Self {
        Self { w: 500.0, h: 500.0 }
    }
}

impl RenderSize {
    /// Create a render size.
    #[must_use]
    pub fn new(w: f64, h: f64) -> Self {
        Self { w, h }
    }

    /// Whether both dimensions are finite and positive.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.w.is_finite() && self.h.is_finite() && self.w > 0.0 && self.h > 0.0
    }
}

/// Convert NDC to image coordinates.
#[must_use]
pub fn ndc_to_image(ndc: &Point2<f64>, size: &RenderSize) -> Point2<f64> {
    Point2::new((ndc.x + 1.0) / 2.0 * size.w, (1.0 - ndc.y) / 2.0 * size.h)
}

/// Convert image coordinates to NDC.
#[must_use]
pub fn image_to_ndc(image: &Point2<f64>, size: &RenderSize) -> Point2<f64> {
    Point2::new(2.0 / size.w * image.x - 1.0, 1.0 - 2.0 / size.h * image.y)
}

/// Camera snapshot with cached matrices, used for every projection during a
/// build.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projector {
    camera: PerspectiveCamera,
    size: RenderSize,
    view_projection: Matrix4<f64>,
    inverse_view_projection: Matrix4<f64>,
}

impl Default for Projector {
    fn default() -> Self {
        Self::new(&PerspectiveCamera::default(), RenderSize::default())
    }
}

impl Projector {
    /// Snapshot a camera and render size.
    #[must_use]
    pub fn new(camera: &PerspectiveCamera, size: RenderSize) -> Self {
        let view = camera.view();
        let projection = camera.projection();
        Self {
            camera: *camera,
            size,
            view_projection: projection.as_matrix() * view.to_homogeneous(),
            inverse_view_projection: view.inverse().to_homogeneous() * projection.inverse(),
        }
    }

    /// The camera snapshot.
    #[must_use]
    pub fn camera(&self) -> &PerspectiveCamera {
        &self.camera
    }

    /// Camera position in world space.
    #[must_use]
    pub fn camera_position(&self) -> Point3<f64> {
        self.camera.position
    }

    /// The render size.
    #[must_use]
    pub fn size(&self) -> RenderSize {
        self.size
    }

    /// Project a world point to NDC (z in `[-1, 1]` between the clip planes).
    #[must_use]
    pub fn project_ndc(&self, world: &Point3<f64>) -> Point3<f64> {
        self.view_projection.transform_point(world)
    }

    /// Project a world point to image coordinates.
    #[must_use]
    pub fn project(&self, world: &Point3<f64>) -> Point2<f64> {
        let ndc = self.project_ndc(world);
        ndc_to_image(&Point2::new(ndc.x, ndc.y), &self.size)
    }

    /// Convert NDC to image coordinates for this render size.
    #[must_use]
    pub fn ndc_to_image(&self, ndc: &Point2<f64>) -> Point2<f64> {
        ndc_to_image(ndc, &self.size)
    }

    /// Convert image coordinates to NDC for this render size.
    #[must_use]
    pub fn image_to_ndc(&self, image: &Point2<f64>) -> Point2<f64> {
        image_to_ndc(image, &self.size)
    }

    /// Ray from the camera through an NDC point, as `(origin, unit direction)`.
    #[must_use]
    pub fn ray_through_ndc(&self, ndc: &Point2<f64>) -> (Point3<f64>, Vector3<f64>) {
        let near = self
            .inverse_view_projection
            .transform_point(&Point3::new(ndc.x, ndc.y, -1.0));
        let far = self
            .inverse_view_projection
            .transform_point(&Point3::new(ndc.x, ndc.y, 1.0));
        let direction = (far - near)
            .try_normalize(f64::EPSILON)
            .unwrap_or_else(|| (self.camera.target - self.camera.position).normalize());
        (self.camera.position, direction)
    }
}
