use std::collections::BTreeMap;

use foundation::math::{CameraRelative, CameraRelativeF32, Enu, LocalFrame};

use crate::anchor::AnchorId;
use crate::binding::{BindingError, RenderBinding};
use crate::components::{ModelInstance, Transform};

#[derive(Debug, Clone)]
struct AnchorSlot {
    frame: LocalFrame,
    object: Option<ModelInstance>,
}

/// One attached object, ready to hand to a renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderItem {
    pub anchor: AnchorId,
    pub template: String,
    pub transform: Transform,
    /// Anchor origin relative to the camera.
    pub origin: CameraRelativeF32,
    /// Center of the scaled model relative to the camera.
    pub center: CameraRelativeF32,
}

/// In-memory scene: anchors keyed deterministically, at most one object each.
#[derive(Debug, Default)]
pub struct World {
    next_anchor: u64,
    anchors: BTreeMap<AnchorId, AnchorSlot>,
    pending_repaint: bool,
    repaints: u64,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }

    pub fn object_count(&self) -> usize {
        self.anchors.values().filter(|s| s.object.is_some()).count()
    }

    pub fn object(&self, anchor: AnchorId) -> Option<&ModelInstance> {
        self.anchors.get(&anchor).and_then(|s| s.object.as_ref())
    }

    /// Total repaint requests seen so far.
    pub fn repaint_count(&self) -> u64 {
        self.repaints
    }

    /// Consume the pending repaint flag.
    pub fn take_repaint(&mut self) -> bool {
        std::mem::take(&mut self.pending_repaint)
    }

    pub fn render_items(&self, camera: CameraRelative) -> Vec<RenderItem> {
        let mut out = Vec::new();
        for (anchor, slot) in &self.anchors {
            let Some(object) = &slot.object else { continue };
            let center = Enu::from_y_up(object.center());
            out.push(RenderItem {
                anchor: *anchor,
                template: object.template.clone(),
                transform: object.transform,
                origin: camera.local_to_f32(&slot.frame, Enu::new(0.0, 0.0, 0.0)),
                center: camera.local_to_f32(&slot.frame, center),
            });
        }
        out
    }
}

impl RenderBinding for World {
    fn create_anchor(&mut self, frame: LocalFrame) -> AnchorId {
        let id = AnchorId(self.next_anchor);
        self.next_anchor += 1;
        self.anchors.insert(
            id,
            AnchorSlot {
                frame,
                object: None,
            },
        );
        id
    }

    fn attach(&mut self, anchor: AnchorId, object: ModelInstance) -> Result<(), BindingError> {
        let slot = self
            .anchors
            .get_mut(&anchor)
            .ok_or(BindingError::UnknownAnchor(anchor))?;
        if slot.object.is_some() {
            return Err(BindingError::Occupied(anchor));
        }
        slot.object = Some(object);
        Ok(())
    }

    fn detach(&mut self, anchor: AnchorId) -> Option<ModelInstance> {
        self.anchors.get_mut(&anchor).and_then(|s| s.object.take())
    }

    fn release_anchor(&mut self, anchor: AnchorId) -> bool {
        self.anchors.remove(&anchor).is_some()
    }

    fn request_repaint(&mut self) {
        self.pending_repaint = true;
        self.repaints += 1;
    }
}
