use crate::math::Vec3;

/// Axis-aligned bounding box in model space (meters, Y-up).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb3 {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Aabb3 {
    pub fn new(min: [f64; 3], max: [f64; 3]) -> Self {
        Aabb3 { min, max }
    }

    /// Smallest box containing every point, `None` for an empty iterator.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bounds = Aabb3::new(first.as_array(), first.as_array());
        for p in iter {
            bounds.extend(p);
        }
        Some(bounds)
    }

    pub fn extend(&mut self, p: Vec3) {
        let p = p.as_array();
        for axis in 0..3 {
            self.min[axis] = self.min[axis].min(p[axis]);
            self.max[axis] = self.max[axis].max(p[axis]);
        }
    }

    pub fn union(self, other: Aabb3) -> Aabb3 {
        let mut out = self;
        out.extend(Vec3::from_array(other.min));
        out.extend(Vec3::from_array(other.max));
        out
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let [x0, y0, z0] = self.min;
        let [x1, y1, z1] = self.max;
        [
            Vec3::new(x0, y0, z0),
            Vec3::new(x1, y0, z0),
            Vec3::new(x0, y1, z0),
            Vec3::new(x1, y1, z0),
            Vec3::new(x0, y0, z1),
            Vec3::new(x1, y0, z1),
            Vec3::new(x0, y1, z1),
            Vec3::new(x1, y1, z1),
        ]
    }

    /// Vertical extent along the Y axis.
    pub fn height(&self) -> f64 {
        self.max[1] - self.min[1]
    }
}

#[cfg(test)]
mod tests {
    use super::Aabb3;
    use crate::math::Vec3;

    #[test]
    fn from_points_covers_all_inputs() {
        let bounds = Aabb3::from_points([
            Vec3::new(1.0, -2.0, 0.5),
            Vec3::new(-3.0, 4.0, 0.0),
            Vec3::new(0.0, 0.0, 2.0),
        ])
        .expect("non-empty");
        assert_eq!(bounds.min, [-3.0, -2.0, 0.0]);
        assert_eq!(bounds.max, [1.0, 4.0, 2.0]);
        assert_eq!(bounds.height(), 6.0);
    }

    #[test]
    fn from_points_empty_is_none() {
        assert!(Aabb3::from_points(std::iter::empty()).is_none());
    }

    #[test]
    fn union_covers_both() {
        let a = Aabb3::new([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        let b = Aabb3::new([-1.0, 2.0, 0.0], [0.0, 3.0, 0.5]);
        let u = a.union(b);
        assert_eq!(u.min, [-1.0, 0.0, 0.0]);
        assert_eq!(u.max, [1.0, 3.0, 1.0]);
        assert_eq!(u.height(), 3.0);
    }
}
