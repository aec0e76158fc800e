mod config;
mod loader;
mod session;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use placement::{PlacementId, TemplateContext};
use scene::{CameraView, MapView};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::MapperConfig;
use crate::session::{ImportSummary, Session};

#[derive(Parser, Debug)]
#[command(author, version, about = "Place scaled 3D models on a map and exchange them as KMZ")]
struct Args {
    /// JSON file with deployment defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Place models and write them to a KMZ archive
    Export {
        /// Output archive
        #[arg(long)]
        out: PathBuf,

        /// Placement as lon,lat,height (repeatable; defaults from config)
        #[arg(long = "place", value_parser = parse_place, allow_hyphen_values = true)]
        places: Vec<Place>,

        /// Write geometry-only placemarks without embedding the model
        #[arg(long)]
        no_asset: bool,
    },

    /// Load a KMZ or KML archive into a fresh registry and list it
    Import {
        input: PathBuf,

        /// Print the listing as JSON
        #[arg(long)]
        json: bool,

        /// Fly the camera to this placement id after import
        #[arg(long)]
        focus: Option<u64>,
    },

    /// Import an archive and export it again with the model embedded
    Convert {
        input: PathBuf,
        output: PathBuf,
    },

    /// Print the effective configuration
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Place {
    lon: f64,
    lat: f64,
    height: f64,
}

fn parse_place(s: &str) -> Result<Place, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let [lon, lat, height] = parts.as_slice() else {
        return Err(format!("expected lon,lat,height, got {s:?}"));
    };
    let num = |v: &str| {
        v.parse::<f64>()
            .map_err(|_| format!("{v:?} is not a number"))
    };
    Ok(Place {
        lon: num(*lon)?,
        lat: num(*lat)?,
        height: num(*height)?,
    })
}

/// Camera sink for a headless run.
#[derive(Debug, Default)]
struct LoggedView;

impl MapView for LoggedView {
    fn set_view(&mut self, view: CameraView) {
        info!(
            "camera -> [{:.6}, {:.6}] zoom {} pitch {} bearing {} over {} ms",
            view.center[0], view.center[1], view.zoom, view.pitch, view.bearing, view.duration_ms
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = MapperConfig::load(args.config.as_deref())?;
    let http = reqwest::Client::new();

    match args.command {
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Command::Export {
            out,
            places,
            no_asset,
        } => {
            let mut session = start_session(&http, &config).await?;
            let places = if places.is_empty() {
                vec![Place {
                    lon: config.default_lon,
                    lat: config.default_lat,
                    height: config.default_height,
                }]
            } else {
                places
            };
            for place in places {
                let placed = session
                    .place(place.lon, place.lat, place.height)
                    .with_context(|| format!("place {place:?}"))?;
                info!("placed {} at ({}, {})", placed.id, placed.longitude, placed.latitude);
            }
            redraw(&mut session, &config)?;
            write_archive(&session, &http, &config, &out, !no_asset).await?;
        }
        Command::Import { input, json, focus } => {
            let (session, bytes) = tokio::join!(
                start_session(&http, &config),
                tokio::fs::read(&input)
            );
            let mut session = session?;
            let bytes = bytes.with_context(|| format!("read {}", input.display()))?;
            let summary = session
                .import(&bytes)
                .with_context(|| format!("import {}", input.display()))?;
            redraw(&mut session, &config)?;
            print_listing(&session, &summary, json)?;
            if let Some(id) = focus {
                let camera = session
                    .registry()
                    .focus(PlacementId(id), &mut LoggedView)?;
                eprintln!(
                    "focused #{id} at [{:.6}, {:.6}]",
                    camera.center[0], camera.center[1]
                );
            }
        }
        Command::Convert { input, output } => {
            let mut session = start_session(&http, &config).await?;
            let bytes = tokio::fs::read(&input)
                .await
                .with_context(|| format!("read {}", input.display()))?;
            let summary = session
                .import(&bytes)
                .with_context(|| format!("import {}", input.display()))?;
            report_problems(&summary);
            write_archive(&session, &http, &config, &output, true).await?;
        }
    }

    Ok(())
}

fn redraw(session: &mut Session, config: &MapperConfig) -> anyhow::Result<()> {
    if let Some(items) = session.redraw(&config.initial_view())? {
        for item in &items {
            debug!(
                "draw {} on {} at {:?} (scale {})",
                item.template, item.anchor, item.center, item.transform.scale.y
            );
        }
        let world = session.registry().binding();
        debug!(
            "frame {}: drew {} of {} objects on {} anchors",
            world.repaint_count(),
            items.len(),
            world.object_count(),
            world.anchor_count()
        );
    }
    Ok(())
}

/// Loads the template, publishes it, and opens the map at the default view.
async fn start_session(http: &reqwest::Client, config: &MapperConfig) -> anyhow::Result<Session> {
    let context = TemplateContext::new();
    let template = loader::load_template(http, &config.model).await?;
    if context.publish(template).is_err() {
        warn!("template was already published");
    }
    LoggedView.set_view(config.initial_view());
    Session::new(context, config.default_height)
}

async fn write_archive(
    session: &Session,
    http: &reqwest::Client,
    config: &MapperConfig,
    out: &Path,
    embed: bool,
) -> anyhow::Result<()> {
    let asset = if embed {
        match loader::fetch_asset(http, &config.model).await {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                warn!("{err}; exporting geometry-only placemarks");
                None
            }
        }
    } else {
        None
    };

    let outcome = session.export(asset.as_deref())?;
    tokio::fs::write(out, &outcome.bytes)
        .await
        .with_context(|| format!("write {}", out.display()))?;
    eprintln!(
        "wrote {} placemarks to {}{}",
        outcome.placemarks,
        out.display(),
        if outcome.asset_embedded {
            ""
        } else {
            " (model not embedded)"
        }
    );
    Ok(())
}

fn report_problems(summary: &ImportSummary) {
    eprintln!("imported {} placement(s)", summary.added.len());
    if summary.skipped > 0 {
        eprintln!("skipped {} malformed record(s)", summary.skipped);
    }
    for (index, err) in &summary.rejected {
        eprintln!("record {index} not placed: {err}");
    }
}

fn print_listing(session: &Session, summary: &ImportSummary, json: bool) -> anyhow::Result<()> {
    let rows = session.listing();
    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        for row in &rows {
            println!(
                "#{}\t{:.6}\t{:.6}\t{} m",
                row.id, row.longitude, row.latitude, row.height
            );
        }
    }
    report_problems(summary);
    Ok(())
}
