pub mod archive;
pub mod glb;
pub mod kml;

pub use archive::*;
pub use glb::*;
pub use kml::*;
