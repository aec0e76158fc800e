use foundation::math::Vec3;

/// Local transform of an object inside its anchor frame (Y-up, meters).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub scale: Vec3,
}

impl Transform {
    pub fn uniform_scale(factor: f64) -> Self {
        Self {
            translation: Vec3::ZERO,
            scale: Vec3::splat(factor),
        }
    }

    pub fn apply(&self, p: Vec3) -> Vec3 {
        p.mul_elem(self.scale) + self.translation
    }
}

#[cfg(test)]
mod tests {
    use super::Transform;
    use foundation::math::Vec3;

    #[test]
    fn unit_scale_leaves_points_alone() {
        let p = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(Transform::uniform_scale(1.0).apply(p), p);
    }

    #[test]
    fn uniform_scale_scales_every_axis() {
        let t = Transform::uniform_scale(2.5);
        assert_eq!(t.apply(Vec3::new(1.0, 2.0, -4.0)), Vec3::new(2.5, 5.0, -10.0));
    }
}
