use foundation::bounds::Aabb3;
use thiserror::Error;

use crate::components::{ModelInstance, Transform};

/// Size information derived from the loaded template geometry.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TemplateMetrics {
    /// Vertical extent of the unscaled template, meters.
    pub reference_height: f64,
}

impl TemplateMetrics {
    /// Uniform scale that makes the template `height` meters tall.
    pub fn scale_for_height(&self, height: f64) -> f64 {
        height / self.reference_height
    }

    /// Inverse of [`Self::scale_for_height`].
    pub fn height_for_scale(&self, scale: f64) -> f64 {
        scale * self.reference_height
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TemplateError {
    #[error("template `{name}` has degenerate vertical extent {height}")]
    DegenerateBounds { name: String, height: f64 },
}

/// Immutable blueprint shared by every placement.
///
/// Instances are produced by [`Template::instantiate`] and own their data;
/// nothing links back to the template after cloning.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    name: String,
    bounds: Aabb3,
    metrics: TemplateMetrics,
}

impl Template {
    pub fn new(name: impl Into<String>, bounds: Aabb3) -> Result<Self, TemplateError> {
        let name = name.into();
        let height = bounds.height();
        if !height.is_finite() || height <= 0.0 {
            return Err(TemplateError::DegenerateBounds { name, height });
        }
        Ok(Self {
            name,
            bounds,
            metrics: TemplateMetrics {
                reference_height: height,
            },
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bounds(&self) -> Aabb3 {
        self.bounds
    }

    pub fn metrics(&self) -> TemplateMetrics {
        self.metrics
    }

    pub fn instantiate(&self, scale: f64) -> ModelInstance {
        ModelInstance {
            template: self.name.clone(),
            local_bounds: self.bounds,
            transform: Transform::uniform_scale(scale),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Template, TemplateError};
    use foundation::bounds::Aabb3;

    fn turbine() -> Template {
        Template::new("turbine", Aabb3::new([-20.0, 0.0, -5.0], [20.0, 100.0, 5.0]))
            .expect("valid template")
    }

    #[test]
    fn reference_height_comes_from_bounds() {
        assert_eq!(turbine().metrics().reference_height, 100.0);
    }

    #[test]
    fn scale_and_height_are_inverse() {
        let metrics = turbine().metrics();
        let scale = metrics.scale_for_height(120.0);
        assert_eq!(scale, 1.2);
        assert!((metrics.height_for_scale(scale) - 120.0).abs() < 1e-12);
    }

    #[test]
    fn flat_bounds_are_rejected() {
        let err = Template::new("flat", Aabb3::new([0.0, 1.0, 0.0], [1.0, 1.0, 1.0]))
            .expect_err("zero height");
        assert!(matches!(err, TemplateError::DegenerateBounds { .. }));
    }

    #[test]
    fn instances_are_independent_copies() {
        let template = turbine();
        let mut a = template.instantiate(2.0);
        let b = template.instantiate(2.0);
        a.transform.scale.y = 3.0;
        assert_eq!(b.transform.scale.y, 2.0);
        assert_eq!(template.instantiate(1.0).bounds().height(), 100.0);
    }
}
