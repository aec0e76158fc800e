/// Animated camera target for the map view.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CameraView {
    /// `[lon_deg, lat_deg]`
    pub center: [f64; 2],
    pub zoom: f64,
    pub pitch: f64,
    pub bearing: f64,
    pub duration_ms: u32,
}

impl CameraView {
    pub const INSPECT_ZOOM: f64 = 15.0;
    pub const INSPECT_PITCH: f64 = 65.0;
    pub const INSPECT_BEARING: f64 = 30.0;
    pub const INSPECT_DURATION_MS: u32 = 1500;

    /// Close-up view used when focusing a single placement.
    pub fn inspect(lon_deg: f64, lat_deg: f64) -> Self {
        Self {
            center: [lon_deg, lat_deg],
            zoom: Self::INSPECT_ZOOM,
            pitch: Self::INSPECT_PITCH,
            bearing: Self::INSPECT_BEARING,
            duration_ms: Self::INSPECT_DURATION_MS,
        }
    }
}

/// Fire-and-forget camera control.
pub trait MapView {
    fn set_view(&mut self, view: CameraView);
}

/// Map view that remembers every command, for headless hosts and tests.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RecordedView {
    pub history: Vec<CameraView>,
}

impl RecordedView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<&CameraView> {
        self.history.last()
    }
}

impl MapView for RecordedView {
    fn set_view(&mut self, view: CameraView) {
        self.history.push(view);
    }
}
