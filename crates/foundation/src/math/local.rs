//! Local East-North-Up frames anchored at a geodetic origin.
//!
//! A [`LocalFrame`] is the anchor a placed object hangs off: geometry is kept
//! in meters relative to the frame origin, and only the origin carries
//! Earth-scale magnitudes. Offsets to a camera are formed from the origin
//! difference first, so the final `f32` values stay small.

use thiserror::Error;

use super::{Ecef, Geodetic, Vec3, geodetic_to_ecef};

/// Local East-North-Up coordinates (meters).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Enu {
    pub east: f64,
    pub north: f64,
    pub up: f64,
}

impl Enu {
    pub fn new(east: f64, north: f64, up: f64) -> Self {
        Self { east, north, up }
    }

    /// Map a Y-up model-space vector (x east, y up, z toward the viewer/south).
    pub fn from_y_up(v: Vec3) -> Self {
        Self::new(v.x, -v.z, v.y)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Error)]
pub enum CoordinateError {
    #[error("coordinate is not finite: lon={lon} lat={lat}")]
    NonFinite { lon: f64, lat: f64 },
    #[error("longitude {0} outside [-180, 180]")]
    LongitudeOutOfRange(f64),
    #[error("latitude {0} outside [-90, 90]")]
    LatitudeOutOfRange(f64),
}

/// Validate a WGS84 longitude/latitude pair in degrees.
pub fn validate_lon_lat(lon_deg: f64, lat_deg: f64) -> Result<(), CoordinateError> {
    if !lon_deg.is_finite() || !lat_deg.is_finite() {
        return Err(CoordinateError::NonFinite {
            lon: lon_deg,
            lat: lat_deg,
        });
    }
    if !(-180.0..=180.0).contains(&lon_deg) {
        return Err(CoordinateError::LongitudeOutOfRange(lon_deg));
    }
    if !(-90.0..=90.0).contains(&lat_deg) {
        return Err(CoordinateError::LatitudeOutOfRange(lat_deg));
    }
    Ok(())
}

/// Precision-stable local frame centered on a ground point.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LocalFrame {
    origin: Geodetic,
    origin_ecef: Ecef,
}

impl LocalFrame {
    pub fn new(lon_deg: f64, lat_deg: f64) -> Result<Self, CoordinateError> {
        validate_lon_lat(lon_deg, lat_deg)?;
        let origin = Geodetic::from_lon_lat_deg(lon_deg, lat_deg, 0.0);
        Ok(Self {
            origin,
            origin_ecef: geodetic_to_ecef(origin),
        })
    }

    pub fn origin_ecef(&self) -> Ecef {
        self.origin_ecef
    }

    /// `f32` offset of a local point from a high-precision camera origin.
    pub fn camera_relative(&self, enu: Enu, camera_origin: Vec3) -> [f32; 3] {
        let origin_delta = self.origin_ecef.as_vec3() - camera_origin;
        let d = origin_delta + enu_delta_to_ecef(enu, self.origin);
        [d.x as f32, d.y as f32, d.z as f32]
    }
}

fn enu_delta_to_ecef(enu: Enu, origin: Geodetic) -> Vec3 {
    let sin_lat = origin.lat_rad.sin();
    let cos_lat = origin.lat_rad.cos();
    let sin_lon = origin.lon_rad.sin();
    let cos_lon = origin.lon_rad.cos();

    let dx = -sin_lon * enu.east - sin_lat * cos_lon * enu.north + cos_lat * cos_lon * enu.up;
    let dy = cos_lon * enu.east - sin_lat * sin_lon * enu.north + cos_lat * sin_lon * enu.up;
    let dz = cos_lat * enu.north + sin_lat * enu.up;
    Vec3::new(dx, dy, dz)
}

#[cfg(test)]
mod tests {
    use super::{CoordinateError, Enu, LocalFrame, validate_lon_lat};
    use crate::math::{Geodetic, Vec3, geodetic_to_ecef};

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn rejects_out_of_range_and_non_finite() {
        assert_eq!(
            LocalFrame::new(200.0, 50.0).unwrap_err(),
            CoordinateError::LongitudeOutOfRange(200.0)
        );
        assert_eq!(
            LocalFrame::new(10.0, -90.5).unwrap_err(),
            CoordinateError::LatitudeOutOfRange(-90.5)
        );
        assert!(matches!(
            LocalFrame::new(f64::NAN, 0.0),
            Err(CoordinateError::NonFinite { .. })
        ));
        assert!(matches!(
            LocalFrame::new(0.0, f64::INFINITY),
            Err(CoordinateError::NonFinite { .. })
        ));
    }

    #[test]
    fn range_bounds_are_inclusive() {
        assert!(validate_lon_lat(-180.0, -90.0).is_ok());
        assert!(validate_lon_lat(180.0, 90.0).is_ok());
    }

    #[test]
    fn origin_is_the_ground_point() {
        let frame = LocalFrame::new(-73.5, 40.7).expect("valid frame");
        let expected = geodetic_to_ecef(Geodetic::from_lon_lat_deg(-73.5, 40.7, 0.0));
        assert_eq!(frame.origin_ecef(), expected);
    }

    #[test]
    fn local_axes_are_orthonormal() {
        let frame = LocalFrame::new(10.0, 50.0).expect("valid frame");
        let camera = frame.origin_ecef().as_vec3();
        let axes = [
            frame.camera_relative(Enu::new(1.0, 0.0, 0.0), camera),
            frame.camera_relative(Enu::new(0.0, 1.0, 0.0), camera),
            frame.camera_relative(Enu::new(0.0, 0.0, 1.0), camera),
        ];
        let dot = |a: [f32; 3], b: [f32; 3]| f64::from(a[0] * b[0] + a[1] * b[1] + a[2] * b[2]);
        for (i, a) in axes.iter().enumerate() {
            assert_close(dot(*a, *a), 1.0, 1e-6);
            for b in &axes[i + 1..] {
                assert_close(dot(*a, *b), 0.0, 1e-6);
            }
        }
    }

    #[test]
    fn camera_relative_keeps_small_offsets_exact() {
        let frame = LocalFrame::new(10.0, 50.0).expect("valid frame");
        let camera = frame.origin_ecef().as_vec3();
        // Directly above the origin: the offset is purely along the local up.
        let rel = frame.camera_relative(Enu::new(0.0, 0.0, 0.25), camera);
        let len = (rel[0] * rel[0] + rel[1] * rel[1] + rel[2] * rel[2]).sqrt();
        assert!((len - 0.25).abs() < 1e-6, "len {len}");

        let at_origin = frame.camera_relative(Enu::new(0.0, 0.0, 0.0), camera);
        assert_eq!(at_origin, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn y_up_model_axes_map_to_enu() {
        let enu = Enu::from_y_up(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(enu, Enu::new(1.0, -3.0, 2.0));
    }
}
