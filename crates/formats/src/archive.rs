//! KMZ packaging: a zip holding the KML document and, optionally, the shared
//! model the rich records link to.

use std::io::{Cursor, Read, Write};

use scene::TemplateMetrics;
use thiserror::Error;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::kml::{
    DEFAULT_FALLBACK_HEIGHT, ImportReport, KmlError, ModelRef, PlacementRecord, ReadOptions,
    read_document, write_document,
};

/// Name of the KML entry written as the first file of every archive.
pub const DOCUMENT_ENTRY: &str = "doc.kml";
/// Fixed location of the embedded model, referenced by `Link/href`.
pub const MODEL_ASSET_PATH: &str = "models/model.glb";

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ArchiveError {
    #[error("malformed archive: {0}")]
    MalformedArchive(String),
    #[error("model asset unavailable from {location}: {reason}")]
    AssetUnavailable { location: String, reason: String },
    #[error("reference height {0} must be positive and finite")]
    InvalidReferenceHeight(f64),
    #[error("fallback height {0} must be positive and finite")]
    InvalidFallbackHeight(f64),
    #[error("record {index} has invalid height {height}")]
    InvalidHeight { index: usize, height: f64 },
    #[error("failed to build archive: {0}")]
    Build(String),
}

impl From<KmlError> for ArchiveError {
    fn from(err: KmlError) -> Self {
        match err {
            KmlError::Write(msg) => ArchiveError::Build(msg),
            other => ArchiveError::MalformedArchive(other.to_string()),
        }
    }
}

fn build_err(e: impl std::fmt::Display) -> ArchiveError {
    ArchiveError::Build(e.to_string())
}

fn malformed(e: impl std::fmt::Display) -> ArchiveError {
    ArchiveError::MalformedArchive(e.to_string())
}

fn deflated() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportOutcome {
    pub bytes: Vec<u8>,
    /// `false` means geometry-only placemarks were written.
    pub asset_embedded: bool,
    pub placemarks: usize,
}

/// Maps placement records to and from KMZ bytes.
///
/// Height has no field of its own in KML; it travels as the uniform model
/// scale `height / reference_height` and comes back as
/// `scale_y * reference_height`, both via [`TemplateMetrics`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ArchiveCodec {
    metrics: TemplateMetrics,
    fallback_height: f64,
}

impl ArchiveCodec {
    pub fn new(metrics: TemplateMetrics) -> Result<Self, ArchiveError> {
        let h = metrics.reference_height;
        if !h.is_finite() || h <= 0.0 {
            return Err(ArchiveError::InvalidReferenceHeight(h));
        }
        Ok(Self {
            metrics,
            fallback_height: DEFAULT_FALLBACK_HEIGHT,
        })
    }

    /// Height given to records that carry no scale.
    pub fn with_fallback_height(mut self, height: f64) -> Result<Self, ArchiveError> {
        if !height.is_finite() || height <= 0.0 {
            return Err(ArchiveError::InvalidFallbackHeight(height));
        }
        self.fallback_height = height;
        Ok(self)
    }

    /// Build a KMZ. With `asset` the records are rich and the asset is
    /// embedded at [`MODEL_ASSET_PATH`]; without it they are bare points.
    pub fn serialize(
        &self,
        records: &[PlacementRecord],
        asset: Option<&[u8]>,
    ) -> Result<ExportOutcome, ArchiveError> {
        for (index, record) in records.iter().enumerate() {
            if !record.height.is_finite() || record.height <= 0.0 {
                return Err(ArchiveError::InvalidHeight {
                    index,
                    height: record.height,
                });
            }
        }

        let model = asset.map(|_| ModelRef {
            metrics: self.metrics,
            href: MODEL_ASSET_PATH,
        });
        let document = write_document(records, model)?;

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file(DOCUMENT_ENTRY, deflated()).map_err(build_err)?;
        zip.write_all(document.as_bytes()).map_err(build_err)?;
        if let Some(asset) = asset {
            zip.start_file(MODEL_ASSET_PATH, deflated()).map_err(build_err)?;
            zip.write_all(asset).map_err(build_err)?;
        }
        let bytes = zip.finish().map_err(build_err)?.into_inner();

        info!(
            "exported {} placemarks ({} bytes, asset embedded: {})",
            records.len(),
            bytes.len(),
            asset.is_some()
        );
        Ok(ExportOutcome {
            bytes,
            asset_embedded: asset.is_some(),
            placemarks: records.len(),
        })
    }

    /// Read a KMZ: the first `*.kml` entry is the document.
    pub fn deserialize(&self, bytes: &[u8]) -> Result<ImportReport, ArchiveError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| ArchiveError::MalformedArchive(format!("not a zip container: {e}")))?;

        let mut document = None;
        for index in 0..archive.len() {
            let entry = archive.by_index(index).map_err(malformed)?;
            if entry.is_file() && entry.name().to_ascii_lowercase().ends_with(".kml") {
                document = Some((index, entry.name().to_string()));
                break;
            }
        }
        let (index, name) = document.ok_or_else(|| {
            ArchiveError::MalformedArchive("archive contains no .kml document".to_string())
        })?;
        debug!("reading KML document {name}");

        let mut entry = archive.by_index(index).map_err(malformed)?;
        let mut text = String::new();
        entry.read_to_string(&mut text).map_err(|e| {
            ArchiveError::MalformedArchive(format!("{name} is not readable UTF-8: {e}"))
        })?;
        self.deserialize_document(&text)
    }

    /// Read a bare KML document.
    pub fn deserialize_document(&self, text: &str) -> Result<ImportReport, ArchiveError> {
        let report = read_document(
            text,
            &ReadOptions {
                metrics: self.metrics,
                fallback_height: self.fallback_height,
            },
        )?;
        info!(
            "imported {} placemarks, skipped {}",
            report.placements.len(),
            report.skipped_count()
        );
        Ok(report)
    }

    /// Accept either a KMZ container or plain KML text.
    pub fn deserialize_any(&self, bytes: &[u8]) -> Result<ImportReport, ArchiveError> {
        if bytes.starts_with(ZIP_MAGIC) {
            return self.deserialize(bytes);
        }
        let text = std::str::from_utf8(bytes)
            .map_err(|e| ArchiveError::MalformedArchive(format!("not a KMZ or UTF-8 KML: {e}")))?;
        self.deserialize_document(text)
    }
}
