use std::path::Path;

use anyhow::Context;
use formats::ArchiveError;
use scene::Template;
use tracing::{debug, info};

fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Reads `location` over HTTP(S) or from the local filesystem.
pub async fn fetch_bytes(http: &reqwest::Client, location: &str) -> anyhow::Result<Vec<u8>> {
    if is_remote(location) {
        debug!("GET {location}");
        let response = http
            .get(location)
            .send()
            .await
            .with_context(|| format!("request {location}"))?
            .error_for_status()
            .with_context(|| format!("fetch {location}"))?;
        let body = response
            .bytes()
            .await
            .with_context(|| format!("read body of {location}"))?;
        Ok(body.to_vec())
    } else {
        tokio::fs::read(location)
            .await
            .with_context(|| format!("read {location}"))
    }
}

fn template_name(location: &str) -> String {
    let trimmed = location.split(['?', '#']).next().unwrap_or(location);
    Path::new(trimmed)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("model")
        .to_string()
}

/// Loads the model and measures its reference height.
pub async fn load_template(http: &reqwest::Client, location: &str) -> anyhow::Result<Template> {
    let bytes = fetch_bytes(http, location).await?;
    let template = formats::template_from_gltf(template_name(location), &bytes)
        .with_context(|| format!("load model template from {location}"))?;
    info!(
        "template {} ready, reference height {:.3} m",
        template.name(),
        template.metrics().reference_height
    );
    Ok(template)
}

/// Fetches the asset to embed in an export.
pub async fn fetch_asset(http: &reqwest::Client, location: &str) -> Result<Vec<u8>, ArchiveError> {
    fetch_bytes(http, location)
        .await
        .map_err(|err| ArchiveError::AssetUnavailable {
            location: location.to_string(),
            reason: format!("{err:#}"),
        })
}
