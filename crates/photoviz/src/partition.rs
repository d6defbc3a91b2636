//! Tile partitioning: cuts one tile into a GRID_SIZE × GRID_SIZE grid
//! of geographic cells and buckets photos into them.

use album::Photo;

use crate::geo::{GeoBounds, Point, Projector, TileCoord};
use crate::search::rank;
use crate::{GRID_SIZE, TILE_SIZE};

/// One grid cell: its geographic bounds and the ranked photo bucket.
#[derive(Clone, Debug)]
pub struct Cell {
    pub bounds: GeoBounds,
    pub photos: Vec<Photo>,
}

/// The full grid for one tile, row-major.
#[derive(Clone, Debug)]
pub struct CellGrid {
    cells: Vec<Cell>,
}

impl CellGrid {
    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        &self.cells[row * GRID_SIZE as usize + col]
    }

    /// Iterate cells with their (row, col) position.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &Cell)> {
        let n = GRID_SIZE as usize;
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, cell)| (i / n, i % n, cell))
    }

    /// Look up the cell under a pointer position given in css-pixel
    /// offsets relative to the tile. None if outside the tile.
    pub fn cell_at(&self, px: f64, py: f64) -> Option<&Cell> {
        let tile = TILE_SIZE as f64;
        if !(0.0..tile).contains(&px) || !(0.0..tile).contains(&py) {
            return None;
        }
        let col = (px / tile * GRID_SIZE as f64).floor() as usize;
        let row = (py / tile * GRID_SIZE as f64).floor() as usize;
        Some(self.cell(row, col))
    }
}

/// Partition a tile into its cell grid: each cell's bounds come from
/// unprojecting the corners of its pixel-space sub-rectangle, its
/// bucket from filtering the album by containment and ranking the
/// survivors against the query. Draws nothing.
pub fn partition(
    coord: TileCoord,
    photos: &[Photo],
    query: &str,
    projector: &dyn Projector,
) -> CellGrid {
    let n = GRID_SIZE as usize;
    let max_index = TileCoord::max_index(coord.z);
    let mut cells = Vec::with_capacity(n * n);

    for row in 0..n {
        for col in 0..n {
            let x0 = (coord.x as f64 + col as f64 / n as f64) * TILE_SIZE as f64;
            let y0 = (coord.y as f64 + row as f64 / n as f64) * TILE_SIZE as f64;
            let x1 = (coord.x as f64 + (col as f64 + 1.0) / n as f64) * TILE_SIZE as f64;
            let y1 = (coord.y as f64 + (row as f64 + 1.0) / n as f64) * TILE_SIZE as f64;

            let nw = projector.unproject(Point::new(x0, y0), coord.z);
            let se = projector.unproject(Point::new(x1, y1), coord.z);
            let bounds = GeoBounds {
                south: se.lat,
                west: nw.lng,
                north: nw.lat,
                east: se.lng,
            };

            // Cells on the outermost map edge own their north/east
            // boundary; everywhere else the adjacent cell claims it.
            let closed_north = coord.y == 0 && row == 0;
            let closed_east = coord.x == max_index && col == n - 1;

            let in_cell: Vec<Photo> = photos
                .iter()
                .filter(|p| {
                    bounds.contains_with_edges(
                        p.latitude,
                        p.longitude,
                        closed_north,
                        closed_east,
                    )
                })
                .cloned()
                .collect();

            cells.push(Cell {
                bounds,
                photos: rank(&in_cell, query),
            });
        }
    }

    CellGrid { cells }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{LatLng, WebMercator};
    use chrono::{TimeZone, Utc};

    fn photo_at(id: &str, lat: f64, lng: f64, hour: u32) -> Photo {
        Photo::new(
            id,
            Vec::new(),
            lat,
            lng,
            Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap(),
            vec!["beach".to_string()],
        )
    }

    /// The cells of any tile cover its full geographic extent: probe
    /// points spread over the tile land in exactly one cell each.
    #[test]
    fn cells_cover_tile_without_gaps_or_overlaps() {
        let projector = WebMercator;
        let coords = [
            TileCoord { x: 0, y: 0, z: 0 },
            TileCoord { x: 1, y: 0, z: 1 },
            TileCoord { x: 7274, y: 3225, z: 13 },
            TileCoord { x: 0, y: 3, z: 2 },
            TileCoord { x: 3, y: 3, z: 2 },
        ];
        for coord in coords {
            let grid = partition(coord, &[], "", &projector);
            let max_index = TileCoord::max_index(coord.z);

            // Probe a lattice of points inside the tile, including its
            // corners and edge midpoints.
            for i in 0..=6 {
                for j in 0..=6 {
                    let px = (coord.x as f64 + i as f64 / 6.0) * TILE_SIZE as f64;
                    let py = (coord.y as f64 + j as f64 / 6.0) * TILE_SIZE as f64;
                    let LatLng { lat, lng } = projector.unproject(Point::new(px, py), coord.z);

                    let hits = grid
                        .iter()
                        .filter(|(row, col, cell)| {
                            cell.bounds.contains_with_edges(
                                lat,
                                lng,
                                coord.y == 0 && *row == 0,
                                coord.x == max_index && *col == GRID_SIZE as usize - 1,
                            )
                        })
                        .count();

                    // Points on the tile's north/east boundary belong to
                    // the adjacent tile unless the map ends there.
                    let off_tile = (j == 0 && coord.y != 0)
                        || (i == 6 && coord.x != max_index);
                    let expected = if off_tile { 0 } else { 1 };
                    assert_eq!(
                        hits, expected,
                        "tile {coord:?} probe ({i},{j}) hit {hits} cells"
                    );
                }
            }
        }
    }

    #[test]
    fn photos_bucket_into_the_containing_cell() {
        let projector = WebMercator;
        let coord = TileCoord { x: 2, y: 1, z: 2 };
        let grid = partition(coord, &[], "", &projector);

        // Synthesize one photo at the center of every cell, then
        // re-partition and check each landed exactly where expected.
        let mut photos = Vec::new();
        for (row, col, cell) in grid.iter() {
            let lat = (cell.bounds.south + cell.bounds.north) / 2.0;
            let lng = (cell.bounds.west + cell.bounds.east) / 2.0;
            photos.push(photo_at(&format!("{row}-{col}.jpg"), lat, lng, 12));
        }

        let grid = partition(coord, &photos, "", &projector);
        let mut seen = 0;
        for (row, col, cell) in grid.iter() {
            assert_eq!(cell.photos.len(), 1, "cell ({row},{col})");
            assert_eq!(cell.photos[0].id, format!("{row}-{col}.jpg"));
            for photo in &cell.photos {
                assert!(cell.bounds.contains(photo.latitude, photo.longitude));
            }
            seen += cell.photos.len();
        }
        assert_eq!(seen, photos.len());
    }

    #[test]
    fn boundary_photo_lands_in_exactly_one_cell() {
        let projector = WebMercator;
        let coord = TileCoord { x: 1, y: 1, z: 2 };
        let empty = partition(coord, &[], "", &projector);

        // Place a photo exactly on the shared edge between cells (1,0)
        // and (1,1); the half-open convention assigns it to (1,1),
        // whose west edge it is.
        let edge = empty.cell(1, 1).bounds;
        let lat = (edge.south + edge.north) / 2.0;
        let photo = photo_at("edge.jpg", lat, edge.west, 12);

        let grid = partition(coord, &[photo], "", &projector);
        let holders: Vec<(usize, usize)> = grid
            .iter()
            .filter(|(_, _, cell)| !cell.photos.is_empty())
            .map(|(row, col, _)| (row, col))
            .collect();
        assert_eq!(holders, vec![(1, 1)]);
    }

    #[test]
    fn buckets_are_ranked_newest_first_for_empty_query() {
        let projector = WebMercator;
        let coord = TileCoord { x: 0, y: 0, z: 0 };
        let grid = partition(coord, &[], "", &projector);
        let bounds = grid.cell(1, 1).bounds;
        let lat = (bounds.south + bounds.north) / 2.0;
        let lng = (bounds.west + bounds.east) / 2.0;

        let photos = vec![
            photo_at("earlier.jpg", lat, lng, 8),
            photo_at("later.jpg", lat, lng, 20),
        ];
        let grid = partition(coord, &photos, "", &projector);
        let bucket = &grid.cell(1, 1).photos;
        assert_eq!(bucket[0].id, "later.jpg");
        assert_eq!(bucket[1].id, "earlier.jpg");
    }

    #[test]
    fn cell_at_maps_pixel_offsets() {
        let projector = WebMercator;
        let coord = TileCoord { x: 0, y: 0, z: 1 };
        let grid = partition(coord, &[], "", &projector);

        let cell_edge = TILE_SIZE as f64 / GRID_SIZE as f64;
        let mid = grid.cell_at(cell_edge * 1.5, cell_edge * 2.5).unwrap();
        assert_eq!(mid.bounds, grid.cell(2, 1).bounds);

        assert!(grid.cell_at(-1.0, 10.0).is_none());
        assert!(grid.cell_at(10.0, TILE_SIZE as f64).is_none());
    }
}
