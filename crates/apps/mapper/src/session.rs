use foundation::math::{CameraRelative, CoordinateError, LocalFrame};
use formats::{ArchiveCodec, ArchiveError, ExportOutcome, ImportReport, PlacementRecord};
use placement::{PlacedInstance, PlacementError, PlacementRegistry, TemplateContext};
use scene::{CameraView, RenderItem, World};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Registry plus codec for one loaded template.
pub struct Session {
    registry: PlacementRegistry<World>,
    codec: ArchiveCodec,
}

/// Outcome of replacing the registry contents with an archive.
#[derive(Debug, Default)]
pub struct ImportSummary {
    pub added: Vec<PlacedInstance>,
    /// Records that parsed but failed `add`, by document index.
    pub rejected: Vec<(usize, PlacementError)>,
    /// Records the codec could not parse.
    pub skipped: usize,
}

/// One line of the placement listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingRow {
    pub id: u64,
    pub longitude: f64,
    pub latitude: f64,
    pub height: f64,
}

impl From<&PlacedInstance> for ListingRow {
    fn from(p: &PlacedInstance) -> Self {
        Self {
            id: p.id.0,
            longitude: p.longitude,
            latitude: p.latitude,
            height: p.height,
        }
    }
}

impl Session {
    /// `context` must already hold the template. Records without a scale
    /// are imported at `fallback_height`.
    pub fn new(context: TemplateContext, fallback_height: f64) -> anyhow::Result<Self> {
        let metrics = context.metrics().ok_or(PlacementError::TemplateNotReady)?;
        let codec = ArchiveCodec::new(metrics)?.with_fallback_height(fallback_height)?;
        Ok(Self {
            registry: PlacementRegistry::new(context, World::new()),
            codec,
        })
    }

    pub fn registry(&self) -> &PlacementRegistry<World> {
        &self.registry
    }

    pub fn place(
        &mut self,
        longitude: f64,
        latitude: f64,
        height: f64,
    ) -> Result<PlacedInstance, PlacementError> {
        self.registry.add(longitude, latitude, height)
    }

    pub fn records(&self) -> Vec<PlacementRecord> {
        self.registry
            .list()
            .iter()
            .map(|p| PlacementRecord::new(p.longitude, p.latitude, p.height))
            .collect()
    }

    pub fn listing(&self) -> Vec<ListingRow> {
        self.registry.list().iter().map(ListingRow::from).collect()
    }

    pub fn export(&self, asset: Option<&[u8]>) -> Result<ExportOutcome, ArchiveError> {
        self.codec.serialize(&self.records(), asset)
    }

    /// Parses KMZ or plain KML without touching the registry.
    pub fn read_archive(&self, bytes: &[u8]) -> Result<ImportReport, ArchiveError> {
        self.codec.deserialize_any(bytes)
    }

    /// Clears the registry and adds every record of `report` through `add`.
    pub fn apply_import(&mut self, report: &ImportReport) -> ImportSummary {
        let cleared = self.registry.clear();
        let mut summary = ImportSummary {
            skipped: report.skipped_count(),
            ..ImportSummary::default()
        };
        for (index, record) in report.records().enumerate() {
            match self
                .registry
                .add(record.longitude, record.latitude, record.height)
            {
                Ok(instance) => summary.added.push(instance),
                Err(err) => {
                    warn!("record {index} ({}) not placed: {err}", record.label());
                    summary.rejected.push((index, err));
                }
            }
        }
        info!(
            "imported {} placements, replaced {cleared}, skipped {}, rejected {}",
            summary.added.len(),
            summary.skipped,
            summary.rejected.len()
        );
        summary
    }

    /// Draw list for a camera above `view`, or `None` when nothing changed
    /// since the last call.
    pub fn redraw(&mut self, view: &CameraView) -> Result<Option<Vec<RenderItem>>, CoordinateError> {
        let eye = LocalFrame::new(view.center[0], view.center[1])?;
        for event in self.registry.drain_events() {
            debug!("registry event {event:?}");
        }
        let world = self.registry.binding_mut();
        if !world.take_repaint() {
            return Ok(None);
        }
        Ok(Some(
            world.render_items(CameraRelative::new(eye.origin_ecef().as_vec3())),
        ))
    }

    /// Parses first, so a malformed archive leaves the registry untouched.
    pub fn import(&mut self, bytes: &[u8]) -> Result<ImportSummary, ArchiveError> {
        let report = self.read_archive(bytes)?;
        Ok(self.apply_import(&report))
    }
}
