//! Tile compositing: fetches the base map raster, draws each cell's
//! top-ranked thumbnail and count badge into an off-screen buffer, and
//! returns the buffer together with the cell grid computed for it.
//!
//! The compositor never touches a tile surface; publishing the buffer
//! is the lifecycle manager's job so that draws for unmounted surfaces
//! can be dropped wholesale.

use std::sync::Arc;

use album::Photo;
use async_trait::async_trait;
use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::imageops::FilterType;
use image::{imageops, Rgba, RgbaImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use log::warn;
use thiserror::Error;

use crate::geo::{Projector, TileCoord};
use crate::partition::{partition, CellGrid};
use crate::{GRID_SIZE, TILE_SIZE};

const BADGE_BG: Rgba<u8> = Rgba([0x18, 0x18, 0x18, 0xff]);
const BADGE_FG: Rgba<u8> = Rgba([0xff, 0xff, 0xff, 0xff]);
const GLYPH_EDGE: u32 = 8;

/// A draw failed for one tile. Sibling tiles are unaffected.
#[derive(Error, Debug)]
pub enum DrawError {
    #[error("failed to decode raster image: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("drawing surface unavailable")]
    SurfaceUnavailable,
}

/// Base-tile fetch failure. Never fatal: the tile renders thumbnails
/// on a blank background instead.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("tile request failed with status {0}")]
    Status(u16),

    #[error("tile request failed: {0}")]
    Transport(String),
}

/// Source of base map rasters, keyed by tile coordinate.
#[async_trait]
pub trait TileFetch: Send + Sync {
    async fn fetch(&self, coord: TileCoord) -> Result<Vec<u8>, FetchError>;
}

/// A finished off-screen composite, ready for an atomic blit.
pub struct ComposedTile {
    pub pixels: RgbaImage,
    pub grid: CellGrid,
}

/// Draws composite tiles: base map raster under per-cell thumbnails
/// under count badges, in that order.
#[derive(Clone)]
pub struct Compositor {
    source: Option<Arc<dyn TileFetch>>,
    projector: Arc<dyn Projector>,
    scale: u32,
}

impl Compositor {
    pub fn new(
        source: Option<Arc<dyn TileFetch>>,
        projector: Arc<dyn Projector>,
        scale: u32,
    ) -> Self {
        Self {
            source,
            projector,
            scale: scale.max(1),
        }
    }

    /// Surface edge in device pixels.
    pub fn surface_size(&self) -> u32 {
        TILE_SIZE * self.scale
    }

    /// Composite one tile for the given album snapshot and query.
    ///
    /// Undecodable bytes (base raster or thumbnail) fail the whole
    /// draw; an unreachable base raster only degrades the tile to
    /// thumbnails on a blank background.
    pub async fn compose(
        &self,
        coord: TileCoord,
        photos: &[Photo],
        query: &str,
    ) -> Result<ComposedTile, DrawError> {
        let size = self.surface_size();
        let mut buffer = RgbaImage::new(size, size);

        if let Some(source) = &self.source {
            match source.fetch(coord).await {
                Ok(bytes) => {
                    let base = image::load_from_memory(&bytes)?
                        .resize_exact(size, size, FilterType::Triangle)
                        .to_rgba8();
                    imageops::overlay(&mut buffer, &base, 0, 0);
                }
                Err(err) => {
                    warn!("no base raster for tile {coord:?}: {err}");
                }
            }
        }

        let grid = partition(coord, photos, query, self.projector.as_ref());

        for (row, col, cell) in grid.iter() {
            let Some(top) = cell.photos.first() else {
                continue;
            };
            let (x0, y0, w, h) = cell_rect(size, row, col);

            let thumb = image::load_from_memory(&top.image)?;
            let side = thumb.width().min(thumb.height());
            let thumb = thumb
                .crop_imm(
                    (thumb.width() - side) / 2,
                    (thumb.height() - side) / 2,
                    side,
                    side,
                )
                .resize_exact(w, h, FilterType::Triangle)
                .to_rgba8();
            imageops::overlay(&mut buffer, &thumb, x0 as i64, y0 as i64);

            if cell.photos.len() >= 2 {
                draw_count_badge(&mut buffer, x0, y0, w, cell.photos.len(), self.scale);
            }
        }

        Ok(ComposedTile {
            pixels: buffer,
            grid,
        })
    }
}

/// Device-pixel rectangle of a cell: (x, y, width, height).
pub(crate) fn cell_rect(surface_size: u32, row: usize, col: usize) -> (u32, u32, u32, u32) {
    let n = GRID_SIZE;
    let col = col as u32;
    let row = row as u32;
    let x0 = surface_size * col / n;
    let y0 = surface_size * row / n;
    let x1 = surface_size * (col + 1) / n;
    let y1 = surface_size * (row + 1) / n;
    (x0, y0, x1 - x0, y1 - y0)
}

/// Opaque chip in the cell's top-right corner showing the bucket size.
fn draw_count_badge(buffer: &mut RgbaImage, cell_x: u32, cell_y: u32, cell_w: u32, count: usize, scale: u32) {
    let text = count.to_string();
    let glyph = GLYPH_EDGE * scale;
    let text_w = glyph * text.len() as u32;
    let chip_w = (text_w + 8 * scale).min(cell_w);
    let chip_h = 16 * scale;
    let chip_x = cell_x + cell_w - chip_w;

    draw_filled_rect_mut(
        buffer,
        Rect::at(chip_x as i32, cell_y as i32).of_size(chip_w, chip_h),
        BADGE_BG,
    );

    // Digits right-aligned inside the chip, vertically centered.
    let mut pen_x = (cell_x + cell_w).saturating_sub(4 * scale + text_w);
    let pen_y = cell_y + (chip_h - glyph) / 2;
    for ch in text.chars() {
        draw_glyph(buffer, ch, pen_x, pen_y, scale);
        pen_x += glyph;
    }
}

/// Blit one bitmap-font glyph, scaled by integer replication.
fn draw_glyph(buffer: &mut RgbaImage, ch: char, x: u32, y: u32, scale: u32) {
    let Some(rows) = BASIC_FONTS.get(ch) else {
        return;
    };
    for (row, bits) in rows.iter().enumerate() {
        for bit in 0..8u32 {
            if bits & (1 << bit) == 0 {
                continue;
            }
            draw_filled_rect_mut(
                buffer,
                Rect::at(
                    (x + bit * scale) as i32,
                    (y + row as u32 * scale) as i32,
                )
                .of_size(scale, scale),
                BADGE_FG,
            );
        }
    }
}
