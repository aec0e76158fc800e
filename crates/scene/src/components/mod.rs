pub mod model;
pub mod transform;

pub use model::*;
pub use transform::*;
