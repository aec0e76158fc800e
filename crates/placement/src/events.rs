use crate::registry::PlacementId;

/// Notifications for the UI layer, drained after each operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    Added(PlacementId),
    Removed(PlacementId),
    Cleared { removed: usize },
    /// The listing should be rebuilt from `PlacementRegistry::list`.
    ListChanged,
}

#[derive(Debug, Default)]
pub struct EventBus {
    events: Vec<RegistryEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn emit(&mut self, event: RegistryEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[RegistryEvent] {
        &self.events
    }

    pub fn drain(&mut self) -> Vec<RegistryEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::{EventBus, RegistryEvent};
    use crate::registry::PlacementId;

    #[test]
    fn records_events_in_order() {
        let mut bus = EventBus::new();
        bus.emit(RegistryEvent::Added(PlacementId(1)));
        bus.emit(RegistryEvent::ListChanged);
        assert_eq!(
            bus.events(),
            &[RegistryEvent::Added(PlacementId(1)), RegistryEvent::ListChanged]
        );
    }

    #[test]
    fn drain_clears_events() {
        let mut bus = EventBus::new();
        bus.emit(RegistryEvent::ListChanged);
        let drained = bus.drain();
        assert_eq!(drained.len(), 1);
        assert!(bus.events().is_empty());
    }
}
