use foundation::math::CoordinateError;
use scene::BindingError;
use thiserror::Error;

use crate::registry::PlacementId;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlacementError {
    #[error("invalid coordinate: {0}")]
    InvalidCoordinate(#[from] CoordinateError),
    #[error("invalid height {0}: must be a positive, finite number of meters")]
    InvalidHeight(f64),
    #[error("model still loading")]
    TemplateNotReady,
    #[error("no placement with id {0}")]
    NotFound(PlacementId),
    #[error("render binding rejected placement: {0}")]
    Binding(#[from] BindingError),
}
