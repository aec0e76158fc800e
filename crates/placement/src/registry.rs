use std::fmt;

use foundation::math::LocalFrame;
use scene::{AnchorId, CameraView, MapView, RenderBinding};
use tracing::{debug, warn};

use crate::context::TemplateContext;
use crate::error::PlacementError;
use crate::events::{EventBus, RegistryEvent};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlacementId(pub u64);

impl fmt::Display for PlacementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One placed template copy.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedInstance {
    pub id: PlacementId,
    pub longitude: f64,
    pub latitude: f64,
    /// Meters along the vertical axis.
    pub height: f64,
    pub anchor: AnchorId,
}

/// Authoritative, insertion-ordered set of placements.
///
/// `add` is the only way an instance comes into existence. Every live
/// instance owns exactly one anchor in the binding; both are created and
/// released together.
#[derive(Debug)]
pub struct PlacementRegistry<B: RenderBinding> {
    context: TemplateContext,
    binding: B,
    instances: Vec<PlacedInstance>,
    next_id: u64,
    events: EventBus,
}

impl<B: RenderBinding> PlacementRegistry<B> {
    pub fn new(context: TemplateContext, binding: B) -> Self {
        Self {
            context,
            binding,
            instances: Vec::new(),
            next_id: 1,
            events: EventBus::new(),
        }
    }

    pub fn add(
        &mut self,
        longitude: f64,
        latitude: f64,
        height: f64,
    ) -> Result<PlacedInstance, PlacementError> {
        let template = self
            .context
            .template()
            .ok_or(PlacementError::TemplateNotReady)?;
        if !height.is_finite() || height <= 0.0 {
            return Err(PlacementError::InvalidHeight(height));
        }
        let frame = LocalFrame::new(longitude, latitude)?;

        let scale = template.metrics().scale_for_height(height);
        if !scale.is_finite() || scale <= 0.0 {
            return Err(PlacementError::InvalidHeight(height));
        }
        let object = template.instantiate(scale);

        let anchor = self.binding.create_anchor(frame);
        if let Err(err) = self.binding.attach(anchor, object) {
            self.binding.release_anchor(anchor);
            return Err(err.into());
        }

        let id = PlacementId(self.next_id);
        self.next_id += 1;
        let instance = PlacedInstance {
            id,
            longitude,
            latitude,
            height,
            anchor,
        };
        self.instances.push(instance.clone());
        debug!("placed {id} at ({longitude}, {latitude}) height={height} scale={scale}");

        self.events.emit(RegistryEvent::Added(id));
        self.events.emit(RegistryEvent::ListChanged);
        self.binding.request_repaint();
        Ok(instance)
    }

    pub fn remove(&mut self, id: PlacementId) -> Result<PlacedInstance, PlacementError> {
        let idx = self
            .instances
            .iter()
            .position(|p| p.id == id)
            .ok_or(PlacementError::NotFound(id))?;
        let instance = self.instances.remove(idx);
        self.release(&instance);
        debug!("removed {id}");

        self.events.emit(RegistryEvent::Removed(id));
        self.events.emit(RegistryEvent::ListChanged);
        self.binding.request_repaint();
        Ok(instance)
    }

    /// Remove every placement. Ids keep counting up afterwards.
    pub fn clear(&mut self) -> usize {
        let removed = std::mem::take(&mut self.instances);
        for instance in &removed {
            self.release(instance);
        }
        debug!("cleared {} placements", removed.len());

        self.events.emit(RegistryEvent::Cleared {
            removed: removed.len(),
        });
        self.events.emit(RegistryEvent::ListChanged);
        self.binding.request_repaint();
        removed.len()
    }

    /// Snapshot in insertion order.
    pub fn list(&self) -> Vec<PlacedInstance> {
        self.instances.clone()
    }

    pub fn get(&self, id: PlacementId) -> Option<&PlacedInstance> {
        self.instances.iter().find(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Ease the map to a close-up of one placement.
    pub fn focus(
        &self,
        id: PlacementId,
        view: &mut impl MapView,
    ) -> Result<CameraView, PlacementError> {
        let instance = self.get(id).ok_or(PlacementError::NotFound(id))?;
        let camera = CameraView::inspect(instance.longitude, instance.latitude);
        view.set_view(camera);
        Ok(camera)
    }

    pub fn context(&self) -> &TemplateContext {
        &self.context
    }

    pub fn binding(&self) -> &B {
        &self.binding
    }

    pub fn binding_mut(&mut self) -> &mut B {
        &mut self.binding
    }

    pub fn events(&self) -> &[RegistryEvent] {
        self.events.events()
    }

    pub fn drain_events(&mut self) -> Vec<RegistryEvent> {
        self.events.drain()
    }

    fn release(&mut self, instance: &PlacedInstance) {
        if self.binding.detach(instance.anchor).is_none() {
            warn!("{} had no object attached to {}", instance.id, instance.anchor);
        }
        if !self.binding.release_anchor(instance.anchor) {
            warn!("{} referenced dead {}", instance.id, instance.anchor);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{PlacementId, PlacementRegistry};
    use crate::context::TemplateContext;
    use crate::error::PlacementError;
    use crate::events::RegistryEvent;
    use foundation::bounds::Aabb3;
    use foundation::math::CoordinateError;
    use scene::{RecordedView, Template, World};

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    fn ready_registry() -> PlacementRegistry<World> {
        let template = Template::new("turbine", Aabb3::new([-20.0, 0.0, -3.0], [20.0, 100.0, 3.0]))
            .expect("template");
        PlacementRegistry::new(TemplateContext::ready(template), World::new())
    }

    #[test]
    fn add_then_list_yields_the_new_instance() {
        let mut reg = ready_registry();
        let placed = reg.add(10.0, 50.0, 120.0).expect("add");

        let list = reg.list();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0], placed);
        assert_eq!(placed.id, PlacementId(1));
        assert_eq!(reg.binding().anchor_count(), 1);

        let object = reg.binding().object(placed.anchor).expect("attached");
        assert_close(object.transform.scale.x, 1.2, 1e-12);
        assert_close(object.transform.scale.y, 1.2, 1e-12);
        assert_close(object.transform.scale.z, 1.2, 1e-12);
        assert_close(object.bounds().height(), 120.0, 1e-9);
    }

    #[test]
    fn ids_are_never_reused() {
        let mut reg = ready_registry();
        let a = reg.add(10.0, 50.0, 100.0).expect("add");
        reg.remove(a.id).expect("remove");
        let b = reg.add(10.0, 50.0, 100.0).expect("add");
        reg.clear();
        let c = reg.add(10.0, 50.0, 100.0).expect("add");
        assert_eq!((a.id.0, b.id.0, c.id.0), (1, 2, 3));
    }

    #[test]
    fn out_of_range_longitude_is_rejected() {
        let mut reg = ready_registry();
        reg.add(10.0, 50.0, 100.0).expect("add");
        let err = reg.add(200.0, 50.0, 100.0).expect_err("invalid longitude");
        assert_eq!(
            err,
            PlacementError::InvalidCoordinate(CoordinateError::LongitudeOutOfRange(200.0))
        );
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.binding().anchor_count(), 1);
    }

    #[test]
    fn non_positive_or_non_finite_height_is_rejected() {
        let mut reg = ready_registry();
        for h in [-5.0, 0.0, f64::NAN, f64::INFINITY] {
            let err = reg.add(10.0, 50.0, h).expect_err("invalid height");
            assert!(matches!(err, PlacementError::InvalidHeight(_)));
        }
        assert!(reg.is_empty());
        assert_eq!(reg.binding().anchor_count(), 0);
    }

    #[test]
    fn add_before_template_is_ready_fails() {
        let ctx = TemplateContext::new();
        let mut reg = PlacementRegistry::new(ctx.clone(), World::new());
        assert_eq!(
            reg.add(10.0, 50.0, 100.0),
            Err(PlacementError::TemplateNotReady)
        );

        let template = Template::new("turbine", Aabb3::new([0.0, 0.0, 0.0], [1.0, 50.0, 1.0]))
            .expect("template");
        ctx.publish(template).expect("publish");
        let placed = reg.add(10.0, 50.0, 100.0).expect("add after load");
        let object = reg.binding().object(placed.anchor).expect("attached");
        assert_close(object.transform.scale.y, 2.0, 1e-12);
    }

    #[test]
    fn remove_twice_reports_not_found() {
        let mut reg = ready_registry();
        let a = reg.add(10.0, 50.0, 100.0).expect("add");
        reg.add(11.0, 51.0, 90.0).expect("add");

        reg.remove(a.id).expect("first remove");
        let before = reg.list();
        assert_eq!(reg.remove(a.id), Err(PlacementError::NotFound(a.id)));
        assert_eq!(reg.list(), before);
        assert_eq!(reg.binding().anchor_count(), 1);
    }

    #[test]
    fn remove_preserves_order_of_the_rest() {
        let mut reg = ready_registry();
        let ids: Vec<_> = (0..4)
            .map(|i| reg.add(10.0 + i as f64, 50.0, 100.0).expect("add").id)
            .collect();
        reg.remove(ids[1]).expect("remove");
        let remaining: Vec<_> = reg.list().iter().map(|p| p.id).collect();
        assert_eq!(remaining, vec![ids[0], ids[2], ids[3]]);
    }

    #[test]
    fn clear_releases_every_anchor() {
        let mut reg = ready_registry();
        for i in 0..3 {
            reg.add(10.0, 50.0 + i as f64, 100.0).expect("add");
        }
        assert_eq!(reg.clear(), 3);
        assert!(reg.is_empty());
        assert_eq!(reg.binding().anchor_count(), 0);
        assert_eq!(reg.binding().object_count(), 0);
    }

    #[test]
    fn focus_moves_the_camera_without_changing_state() {
        let mut reg = ready_registry();
        let placed = reg.add(10.0, 50.0, 100.0).expect("add");
        let mut view = RecordedView::new();

        let camera = reg.focus(placed.id, &mut view).expect("focus");
        assert_eq!(camera.center, [10.0, 50.0]);
        assert_eq!(view.history.len(), 1);
        assert_eq!(reg.len(), 1);

        assert_eq!(
            reg.focus(PlacementId(99), &mut view),
            Err(PlacementError::NotFound(PlacementId(99)))
        );
        assert_eq!(view.history.len(), 1);
    }

    #[test]
    fn list_is_a_detached_snapshot() {
        let mut reg = ready_registry();
        reg.add(10.0, 50.0, 100.0).expect("add");
        let snapshot = reg.list();
        reg.add(11.0, 50.0, 100.0).expect("add");
        assert_eq!(snapshot.len(), 1);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn mutations_emit_events_and_repaints() {
        let mut reg = ready_registry();
        let a = reg.add(10.0, 50.0, 100.0).expect("add");
        reg.remove(a.id).expect("remove");
        reg.clear();
        assert_eq!(
            reg.drain_events(),
            vec![
                RegistryEvent::Added(a.id),
                RegistryEvent::ListChanged,
                RegistryEvent::Removed(a.id),
                RegistryEvent::ListChanged,
                RegistryEvent::Cleared { removed: 0 },
                RegistryEvent::ListChanged,
            ]
        );
        assert_eq!(reg.binding().repaint_count(), 3);

        // Failed operations neither emit nor repaint.
        let _ = reg.add(10.0, 50.0, -1.0);
        assert!(reg.events().is_empty());
        assert_eq!(reg.binding().repaint_count(), 3);
    }
}
