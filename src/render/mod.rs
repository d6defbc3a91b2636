use std::fs;
use std::ops::RangeInclusive;
use std::path::Path;
use std::sync::Arc;

use album::Photo;
use anyhow::{Context, Result};
use log::{info, warn};
use photoviz::{LatLng, MapEvent, TileCoord, TileEngine, WebMercator, TILE_SIZE};

/// Outcome of a batch render.
#[derive(Debug, Default)]
pub struct RenderStats {
    pub rendered: usize,
    pub failed: usize,
}

/// Tile index range covering every photo at a zoom level, or None for
/// an empty album.
pub fn tile_range(photos: &[Photo], zoom: u8) -> Option<(TileCoord, TileCoord)> {
    let projector = WebMercator;
    let max_index = TileCoord::max_index(zoom);
    let mut range: Option<(u32, u32, u32, u32)> = None;

    for photo in photos {
        let point = projector.project(LatLng::new(photo.latitude, photo.longitude), zoom);
        let tx = ((point.x / TILE_SIZE as f64).floor() as i64).clamp(0, max_index as i64) as u32;
        let ty = ((point.y / TILE_SIZE as f64).floor() as i64).clamp(0, max_index as i64) as u32;
        range = Some(match range {
            None => (tx, ty, tx, ty),
            Some((min_x, min_y, max_x, max_y)) => (
                min_x.min(tx),
                min_y.min(ty),
                max_x.max(tx),
                max_y.max(ty),
            ),
        });
    }

    range.map(|(min_x, min_y, max_x, max_y)| {
        (
            TileCoord {
                x: min_x,
                y: min_y,
                z: zoom,
            },
            TileCoord {
                x: max_x,
                y: max_y,
                z: zoom,
            },
        )
    })
}

/// Render every tile covering the album at each zoom level and write
/// the composites as `{z}/{x}_{y}.png` under the output directory.
pub async fn render_album(
    engine: &TileEngine,
    photos: &[Photo],
    query: &str,
    zooms: RangeInclusive<u8>,
    output_dir: &Path,
) -> Result<RenderStats> {
    engine.redraw_all(photos.to_vec(), query).await;

    let mut stats = RenderStats::default();
    for zoom in zooms {
        let Some((min, max)) = tile_range(photos, zoom) else {
            info!("Album is empty, nothing to render at zoom {}", zoom);
            continue;
        };
        info!(
            "Rendering zoom {}: x {}..={}, y {}..={}",
            zoom, min.x, max.x, min.y, max.y
        );

        let zoom_dir = output_dir.join(zoom.to_string());
        fs::create_dir_all(&zoom_dir).context("Failed to create zoom level directory")?;

        // Tiles draw as overlapping async tasks; completions arrive on
        // the channel in whatever order the fetches finish.
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        for y in min.y..=max.y {
            for x in min.x..=max.x {
                let tx = tx.clone();
                engine.create_tile(TileCoord { x, y, z: zoom }, move |result, surface| {
                    tx.send((result, Arc::clone(surface))).ok();
                });
            }
        }
        drop(tx);

        while let Some((result, surface)) = rx.recv().await {
            let coord = surface.coord();
            match result {
                Ok(()) => {
                    let path = zoom_dir.join(format!("{}_{}.png", coord.x, coord.y));
                    let pixels = surface
                        .snapshot()
                        .context("Failed to read rendered surface")?;
                    pixels
                        .save(&path)
                        .with_context(|| format!("Failed to save tile to {:?}", path))?;
                    stats.rendered += 1;
                }
                Err(err) => {
                    warn!("tile {:?} failed: {}", coord, err);
                    stats.failed += 1;
                }
            }
            engine.handle(MapEvent::TileUnloaded(surface.id()));
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use image::{DynamicImage, Rgba, RgbaImage};
    use photoviz::EngineConfig;
    use std::io::Cursor;

    fn photo(id: &str, lat: f64, lng: f64) -> Photo {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            8,
            8,
            Rgba([0xff, 0, 0, 0xff]),
        ));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
            .unwrap();
        Photo::new(
            id,
            bytes,
            lat,
            lng,
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            vec!["beach".to_string()],
        )
    }

    #[test]
    fn tile_range_covers_all_photos() {
        // Tokyo and Sydney span a large share of the world at z1.
        let photos = vec![
            photo("tokyo.jpg", 35.6586, 139.7454),
            photo("sydney.jpg", -33.8568, 151.2153),
        ];
        let (min, max) = tile_range(&photos, 1).unwrap();
        assert_eq!((min.x, min.y), (1, 0));
        assert_eq!((max.x, max.y), (1, 1));

        assert!(tile_range(&[], 1).is_none());
    }

    #[tokio::test]
    async fn renders_a_png_pyramid() {
        let engine = TileEngine::new(EngineConfig {
            scale: 1,
            ..Default::default()
        });
        let out = tempfile::tempdir().unwrap();
        let photos = vec![photo("p.jpg", 0.0, 0.0)];

        let stats = render_album(&engine, &photos, "", 0..=1, out.path())
            .await
            .unwrap();
        assert_eq!(stats.rendered, 2);
        assert_eq!(stats.failed, 0);

        // (0, 0) lies in tile (0,0) at z0 and tile (1,1) at z1.
        assert!(out.path().join("0").join("0_0.png").exists());
        assert!(out.path().join("1").join("1_1.png").exists());

        let tile = image::open(out.path().join("0").join("0_0.png"))
            .unwrap()
            .to_rgba8();
        assert_eq!(*tile.get_pixel(128, 128), Rgba([0xff, 0, 0, 0xff]));
    }
}
