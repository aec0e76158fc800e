use foundation::bounds::Aabb3;
use foundation::math::Vec3;

use crate::components::Transform;

/// A positioned copy of a template, owned by the anchor it is attached to.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInstance {
    pub template: String,
    /// Unscaled template bounds in model space.
    pub local_bounds: Aabb3,
    pub transform: Transform,
}

impl ModelInstance {
    /// Bounds after applying the instance transform.
    pub fn bounds(&self) -> Aabb3 {
        let corners = self.local_bounds.corners().map(|c| self.transform.apply(c));
        Aabb3::from_points(corners).unwrap_or(self.local_bounds)
    }

    /// Vertical center of the scaled model relative to its anchor.
    pub fn center(&self) -> Vec3 {
        let b = self.bounds();
        (Vec3::from_array(b.min) + Vec3::from_array(b.max)) * 0.5
    }
}
