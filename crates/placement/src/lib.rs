pub mod context;
pub mod error;
pub mod events;
pub mod registry;

pub use context::*;
pub use error::*;
pub use events::*;
pub use registry::*;
