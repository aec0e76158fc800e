//! KML placement documents.
//!
//! Two record shapes are understood:
//! - rich: `Placemark/Model` with `Location` and `Scale`; height is carried
//!   as a uniform scale relative to the template's reference height.
//! - minimal: `Placemark/Point/coordinates`; no height information.
//!
//! A record with a `Model` is always read as rich, even if it also carries a
//! `Point`.

use std::fmt;

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use scene::TemplateMetrics;
use thiserror::Error;
use tracing::warn;

pub const KML_NAMESPACE: &str = "http://www.opengis.net/kml/2.2";
pub const DOCUMENT_TITLE: &str = "Turbines";
/// Height assigned to minimal-dialect records.
pub const DEFAULT_FALLBACK_HEIGHT: f64 = 100.0;

/// Human-readable label for a placement of the given height.
pub fn height_label(height: f64) -> String {
    format!("Turbine {height} m")
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacementRecord {
    pub longitude: f64,
    pub latitude: f64,
    /// Meters.
    pub height: f64,
    pub name: Option<String>,
}

impl PlacementRecord {
    pub fn new(longitude: f64, latitude: f64, height: f64) -> Self {
        Self {
            longitude,
            latitude,
            height,
            name: None,
        }
    }

    pub fn label(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| height_label(self.height))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Dialect {
    Minimal,
    Rich,
}

/// How rich records reference and scale the shared model.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ModelRef<'a> {
    pub metrics: TemplateMetrics,
    pub href: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KmlError {
    #[error("malformed KML: {0}")]
    Xml(String),
    #[error("not a KML document (root element <{0}>)")]
    UnexpectedRoot(String),
    #[error("failed to write KML: {0}")]
    Write(String),
}

/// Why a single placemark could not be recovered.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("missing <{0}>")]
    Missing(&'static str),
    #[error("<{field}> is not a finite number: {value:?}")]
    InvalidNumber { field: &'static str, value: String },
    #[error("scale {0} must be positive")]
    NonPositiveScale(f64),
    #[error("no <Model> or <Point> geometry")]
    NoGeometry,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRecord {
    /// Position among all placemarks in the document.
    pub index: usize,
    pub name: Option<String>,
    pub reason: RecordError,
}

impl fmt::Display for SkippedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "malformed record {} ({name}): {}", self.index, self.reason),
            None => write!(f, "malformed record {}: {}", self.index, self.reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportedPlacement {
    pub record: PlacementRecord,
    pub dialect: Dialect,
}

/// Result of reading a document: recovered records in document order plus
/// everything that had to be skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    pub placements: Vec<ImportedPlacement>,
    pub skipped: Vec<SkippedRecord>,
}

impl ImportReport {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    pub fn records(&self) -> impl Iterator<Item = &PlacementRecord> {
        self.placements.iter().map(|p| &p.record)
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ReadOptions {
    pub metrics: TemplateMetrics,
    pub fallback_height: f64,
}

fn write_err(e: impl fmt::Display) -> KmlError {
    KmlError::Write(e.to_string())
}

struct KmlWriter {
    inner: Writer<Vec<u8>>,
}

impl KmlWriter {
    fn new() -> Self {
        Self {
            inner: Writer::new_with_indent(Vec::new(), b' ', 2),
        }
    }

    fn event(&mut self, event: Event<'_>) -> Result<(), KmlError> {
        self.inner.write_event(event).map_err(write_err)
    }

    fn open(&mut self, name: &str) -> Result<(), KmlError> {
        self.event(Event::Start(BytesStart::new(name)))
    }

    fn close(&mut self, name: &str) -> Result<(), KmlError> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    fn leaf(&mut self, name: &str, text: &str) -> Result<(), KmlError> {
        self.open(name)?;
        self.event(Event::Text(BytesText::new(text)))?;
        self.close(name)
    }

    fn number(&mut self, name: &str, v: f64) -> Result<(), KmlError> {
        // `Display` for f64 is the shortest string that parses back exactly.
        self.leaf(name, &v.to_string())
    }

    fn finish(self) -> Result<String, KmlError> {
        String::from_utf8(self.inner.into_inner()).map_err(write_err)
    }
}

/// Render placements as a KML document, rich when `model` is given.
pub fn write_document(
    records: &[PlacementRecord],
    model: Option<ModelRef<'_>>,
) -> Result<String, KmlError> {
    let mut w = KmlWriter::new();
    w.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    let mut root = BytesStart::new("kml");
    root.push_attribute(("xmlns", KML_NAMESPACE));
    w.event(Event::Start(root))?;
    w.open("Document")?;
    w.leaf("name", DOCUMENT_TITLE)?;

    for record in records {
        w.open("Placemark")?;
        w.leaf("name", &record.label())?;
        match model {
            Some(model) => write_model(&mut w, record, model)?,
            None => {
                w.open("Point")?;
                let coords = format!("{},{},0", record.longitude, record.latitude);
                w.leaf("coordinates", &coords)?;
                w.close("Point")?;
            }
        }
        w.close("Placemark")?;
    }

    w.close("Document")?;
    w.close("kml")?;
    w.finish()
}

fn write_model(w: &mut KmlWriter, record: &PlacementRecord, model: ModelRef<'_>) -> Result<(), KmlError> {
    let scale = model.metrics.scale_for_height(record.height);
    w.open("Model")?;
    w.leaf("altitudeMode", "relativeToGround")?;

    w.open("Location")?;
    w.number("longitude", record.longitude)?;
    w.number("latitude", record.latitude)?;
    // The model is centered vertically, so its middle sits at half height.
    w.number("altitude", record.height / 2.0)?;
    w.close("Location")?;

    w.open("Orientation")?;
    w.number("heading", 0.0)?;
    w.number("tilt", 0.0)?;
    w.number("roll", 0.0)?;
    w.close("Orientation")?;

    w.open("Scale")?;
    w.number("x", scale)?;
    w.number("y", scale)?;
    w.number("z", scale)?;
    w.close("Scale")?;

    w.open("Link")?;
    w.leaf("href", model.href)?;
    w.close("Link")?;
    w.close("Model")
}

#[derive(Debug, Default)]
struct PlacemarkDraft {
    name: Option<String>,
    has_model: bool,
    has_point: bool,
    longitude: Option<String>,
    latitude: Option<String>,
    scale_y: Option<String>,
    coordinates: Option<String>,
}

impl PlacemarkDraft {
    fn on_open(&mut self, element: &str) {
        match element {
            "Model" => self.has_model = true,
            "Point" => self.has_point = true,
            _ => {}
        }
    }

    fn on_text(&mut self, parent: &str, element: &str, text: &str) {
        let slot = match (parent, element) {
            ("Placemark", "name") => &mut self.name,
            ("Location", "longitude") => &mut self.longitude,
            ("Location", "latitude") => &mut self.latitude,
            ("Scale", "y") => &mut self.scale_y,
            ("Point", "coordinates") => &mut self.coordinates,
            _ => return,
        };
        slot.get_or_insert_with(String::new).push_str(text);
    }

    fn resolve(self, options: &ReadOptions) -> Result<ImportedPlacement, RecordError> {
        if self.has_model {
            let longitude = parse_number("longitude", self.longitude.as_deref())?;
            let latitude = parse_number("latitude", self.latitude.as_deref())?;
            let scale = parse_number("y", self.scale_y.as_deref())?;
            if scale <= 0.0 {
                return Err(RecordError::NonPositiveScale(scale));
            }
            return Ok(ImportedPlacement {
                record: PlacementRecord {
                    longitude,
                    latitude,
                    height: options.metrics.height_for_scale(scale),
                    name: self.name,
                },
                dialect: Dialect::Rich,
            });
        }

        if self.has_point {
            let coords = self.coordinates.as_deref().unwrap_or_default();
            // Only the first tuple counts; KML allows whitespace-separated lists.
            let first = coords.split_whitespace().next();
            let mut parts = first.unwrap_or_default().split(',');
            let longitude = parse_number("longitude", parts.next())?;
            let latitude = parse_number("latitude", parts.next())?;
            return Ok(ImportedPlacement {
                record: PlacementRecord {
                    longitude,
                    latitude,
                    height: options.fallback_height,
                    name: self.name,
                },
                dialect: Dialect::Minimal,
            });
        }

        Err(RecordError::NoGeometry)
    }
}

fn parse_number(field: &'static str, raw: Option<&str>) -> Result<f64, RecordError> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty());
    let raw = raw.ok_or(RecordError::Missing(field))?;
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(RecordError::InvalidNumber {
            field,
            value: raw.to_string(),
        }),
    }
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

/// Parse a KML document into placements.
///
/// Placemarks may sit at any depth (inside `Folder`s, nested documents).
/// Bad placemarks are collected in [`ImportReport::skipped`]; only a document
/// that is not well-formed KML fails as a whole.
pub fn read_document(text: &str, options: &ReadOptions) -> Result<ImportReport, KmlError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut report = ImportReport::default();
    let mut path: Vec<String> = Vec::new();
    let mut cursor = PlacemarkCursor::default();
    let mut index = 0usize;
    let mut seen_root = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| KmlError::Xml(format!("at byte {}: {e}", reader.buffer_position())))?;
        match event {
            Event::Start(e) => {
                let name = local_name(&e);
                check_root(&name, &mut seen_root)?;
                cursor.open(&name, path.len());
                path.push(name);
            }
            Event::Empty(e) => {
                let name = local_name(&e);
                check_root(&name, &mut seen_root)?;
                cursor.open(&name, path.len());
                if cursor.close(path.len()) {
                    finish_placemark(&mut cursor.draft, &mut index, options, &mut report);
                }
            }
            Event::End(_) => {
                path.pop();
                if cursor.close(path.len()) {
                    finish_placemark(&mut cursor.draft, &mut index, options, &mut report);
                }
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(|e| KmlError::Xml(e.to_string()))?;
                cursor.text(&path, &text);
            }
            Event::CData(c) => {
                let text = String::from_utf8_lossy(&c).into_owned();
                cursor.text(&path, &text);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_root {
        return Err(KmlError::Xml("document has no root element".to_string()));
    }
    if !path.is_empty() {
        return Err(KmlError::Xml(format!("unclosed <{}>", path.join("/"))));
    }
    Ok(report)
}

fn check_root(name: &str, seen_root: &mut bool) -> Result<(), KmlError> {
    if *seen_root {
        return Ok(());
    }
    if name != "kml" && name != "Document" {
        return Err(KmlError::UnexpectedRoot(name.to_string()));
    }
    *seen_root = true;
    Ok(())
}

/// The placemark being read. A placemark nested inside it is ignored, and
/// the record ends only when the element that opened it closes.
#[derive(Debug, Default)]
struct PlacemarkCursor {
    draft: Option<PlacemarkDraft>,
    /// Path depth of the open `<Placemark>`.
    depth: usize,
    nested: Option<usize>,
}

impl PlacemarkCursor {
    fn open(&mut self, name: &str, depth: usize) {
        if self.nested.is_some() {
            return;
        }
        if let Some(d) = &mut self.draft {
            if name == "Placemark" {
                self.nested = Some(depth);
            } else {
                d.on_open(name);
            }
        } else if name == "Placemark" {
            self.draft = Some(PlacemarkDraft::default());
            self.depth = depth;
        }
    }

    /// Called once the element at `depth` has closed; `true` when that
    /// element was the open placemark.
    fn close(&mut self, depth: usize) -> bool {
        if let Some(nested) = self.nested {
            if nested == depth {
                self.nested = None;
            }
            return false;
        }
        self.draft.is_some() && depth == self.depth
    }

    fn text(&mut self, path: &[String], text: &str) {
        if self.nested.is_some() {
            return;
        }
        let Some(d) = &mut self.draft else { return };
        let [.., parent, element] = path else { return };
        d.on_text(parent, element, text);
    }
}

fn finish_placemark(
    draft: &mut Option<PlacemarkDraft>,
    index: &mut usize,
    options: &ReadOptions,
    report: &mut ImportReport,
) {
    let Some(d) = draft.take() else { return };
    let name = d.name.clone();
    match d.resolve(options) {
        Ok(placement) => report.placements.push(placement),
        Err(reason) => {
            let skipped = SkippedRecord {
                index: *index,
                name,
                reason,
            };
            warn!("skipping {skipped}");
            report.skipped.push(skipped);
        }
    }
    *index += 1;
}
