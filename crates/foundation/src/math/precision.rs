//! Precision policies.
//!
//! CPU-side positions are `f64`. Anything handed to a renderer is expressed
//! relative to a high-precision camera origin and only then cast to `f32`.

use super::{Enu, LocalFrame, Vec3};

/// GPU-friendly, camera-relative position in `f32`.
pub type CameraRelativeF32 = [f32; 3];

/// Camera-relative precision model.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CameraRelative {
    /// ECEF meters.
    pub origin: Vec3,
}

impl CameraRelative {
    pub fn new(origin: Vec3) -> Self {
        Self { origin }
    }

    /// Camera-relative offset of a point expressed in an anchor's local frame.
    #[inline]
    pub fn local_to_f32(self, frame: &LocalFrame, local: Enu) -> CameraRelativeF32 {
        frame.camera_relative(local, self.origin)
    }
}
