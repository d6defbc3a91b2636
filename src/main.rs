use anyhow::{ensure, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

mod cache;
mod render;
mod source;

use album::{AlbumStore, MemoryAlbum};
use cache::Cache;
use photoviz::{EngineConfig, TileEngine, TileFetch};
use source::HttpTileSource;

const DEFAULT_TILE_URL: &str =
    "https://tile.openstreetmap.jp/styles/maptiler-basic-ja/{z}/{x}/{y}@2x.png";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the cache directory for fetched base tiles
    #[arg(short, long, default_value = ".cache")]
    cache_dir: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Composite an album onto map tiles and write them as PNGs
    Render {
        /// Path to the album manifest (JSON)
        #[arg(short, long)]
        manifest: PathBuf,

        /// Path to the output directory
        #[arg(short, long, default_value = "tiles")]
        output_dir: PathBuf,

        /// Lowest zoom level to render
        #[arg(long, default_value_t = 13)]
        min_zoom: u8,

        /// Highest zoom level to render
        #[arg(long, default_value_t = 13)]
        max_zoom: u8,

        /// Free-text label query; empty renders the whole album
        #[arg(short, long, default_value = "")]
        query: String,

        /// Base tile URL template with {z}/{x}/{y} placeholders
        #[arg(long, default_value = DEFAULT_TILE_URL)]
        tile_url: String,

        /// Skip the base map and render thumbnails on a blank background
        #[arg(long)]
        no_basemap: bool,

        /// Device-pixel multiplier for tile surfaces
        #[arg(long, default_value_t = 2)]
        scale: u32,
    },

    /// Clear the base tile cache
    ClearCache,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger
    env_logger::init();

    // Parse command line arguments
    let cli = Cli::parse();

    let cache = Cache::new(&cli.cache_dir).context("Failed to create cache")?;

    match cli.command {
        Commands::Render {
            manifest,
            output_dir,
            min_zoom,
            max_zoom,
            query,
            tile_url,
            no_basemap,
            scale,
        } => {
            ensure!(min_zoom <= max_zoom, "min-zoom must not exceed max-zoom");

            // Load the manifest into the album store and snapshot it.
            let photos = album::manifest::load_album(&manifest)
                .context("Failed to load album manifest")?;
            let mut store = MemoryAlbum::new();
            for photo in photos {
                store.put(photo).context("Failed to store photo")?;
            }
            let snapshot = store.get_all();
            info!("Album holds {} photos", snapshot.len());

            let source: Option<Arc<dyn TileFetch>> = if no_basemap {
                None
            } else {
                Some(Arc::new(
                    HttpTileSource::new(tile_url, Some(cache))
                        .context("Failed to create tile source")?,
                ))
            };
            let engine = TileEngine::new(EngineConfig {
                source,
                scale,
                ..Default::default()
            });

            let stats = render::render_album(
                &engine,
                &snapshot,
                &query,
                min_zoom..=max_zoom,
                &output_dir,
            )
            .await
            .context("Failed to render album")?;

            info!(
                "Done: {} tiles rendered, {} failed, output in {}",
                stats.rendered,
                stats.failed,
                output_dir.display()
            );
        }

        Commands::ClearCache => {
            info!("Clearing cache");
            cache.clear().context("Failed to clear cache")?;
            info!("Cache cleared");
        }
    }

    Ok(())
}
