pub mod anchor;
pub mod binding;
pub mod components;
pub mod template;
pub mod view;
pub mod world;

pub use anchor::*;
pub use binding::*;
pub use template::*;
pub use view::*;
pub use world::*;
