use foundation::math::LocalFrame;
use thiserror::Error;

use crate::anchor::AnchorId;
use crate::components::ModelInstance;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    #[error("unknown {0}")]
    UnknownAnchor(AnchorId),
    #[error("{0} already has an object attached")]
    Occupied(AnchorId),
}

/// Contract between placement state and whatever draws it.
///
/// Every anchor is created for exactly one placement and released when the
/// placement goes away; implementations must not share anchors.
pub trait RenderBinding {
    fn create_anchor(&mut self, frame: LocalFrame) -> AnchorId;
    fn attach(&mut self, anchor: AnchorId, object: ModelInstance) -> Result<(), BindingError>;
    fn detach(&mut self, anchor: AnchorId) -> Option<ModelInstance>;
    /// Returns `false` if the anchor was not live.
    fn release_anchor(&mut self, anchor: AnchorId) -> bool;
    fn request_repaint(&mut self);
}
