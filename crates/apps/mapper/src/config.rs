use std::path::Path;

use anyhow::{bail, Context};
use foundation::math::validate_lon_lat;
use scene::CameraView;
use serde::{Deserialize, Serialize};

/// Deployment defaults for the mapper.
///
/// Resolved from built-in defaults, then an optional JSON file, then
/// `MAPPER_*` environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// Map style URL handed to the map view.
    pub background: String,
    /// URL or path of the model template (GLB or glTF JSON).
    pub model: String,
    pub default_lon: f64,
    pub default_lat: f64,
    /// Meters.
    pub default_height: f64,
    pub default_zoom: f64,
    pub default_pitch: f64,
    pub default_bearing: f64,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            background: "https://demotiles.maplibre.org/style.json".to_string(),
            model: "assets/turbine.glb".to_string(),
            default_lon: 10.0,
            default_lat: 50.0,
            default_height: 120.0,
            default_zoom: 8.0,
            default_pitch: 65.0,
            default_bearing: 30.0,
        }
    }
}

impl MapperConfig {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parse config {}", path.display()))
    }

    /// Overrides fields from `lookup`, which maps variable names to values.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(value) = lookup("MAPPER_BACKGROUND") {
            self.background = value;
        }
        if let Some(value) = lookup("MAPPER_MODEL") {
            self.model = value;
        }
        let numbers = [
            ("MAPPER_DEFAULT_LON", &mut self.default_lon),
            ("MAPPER_DEFAULT_LAT", &mut self.default_lat),
            ("MAPPER_DEFAULT_HEIGHT", &mut self.default_height),
            ("MAPPER_DEFAULT_ZOOM", &mut self.default_zoom),
        ];
        for (key, field) in numbers {
            if let Some(value) = lookup(key) {
                *field = value
                    .trim()
                    .parse()
                    .with_context(|| format!("{key}={value:?} is not a number"))?;
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        validate_lon_lat(self.default_lon, self.default_lat).context("default coordinate")?;
        if !self.default_height.is_finite() || self.default_height <= 0.0 {
            bail!("default height must be positive, got {}", self.default_height);
        }
        if self.model.trim().is_empty() {
            bail!("model location is empty");
        }
        Ok(())
    }

    /// Camera the map opens with.
    pub fn initial_view(&self) -> CameraView {
        CameraView {
            center: [self.default_lon, self.default_lat],
            zoom: self.default_zoom,
            pitch: self.default_pitch,
            bearing: self.default_bearing,
            duration_ms: 0,
        }
    }
}
