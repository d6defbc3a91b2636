//! Tile engine for rendering a geotagged photo album on a web-mercator
//! map: partitions each tile into a grid of geographic cells, buckets
//! and ranks photos per cell, composites thumbnails and count badges
//! onto tile surfaces, and resolves clicks back to photo buckets.

pub mod compose;
pub mod geo;
pub mod lifecycle;
pub mod partition;
pub mod search;

/// Cells per tile edge; every tile carries GRID_SIZE² cells.
pub const GRID_SIZE: u32 = 3;

/// Logical tile edge in css pixels. Surfaces are `TILE_SIZE * scale`
/// device pixels square.
pub const TILE_SIZE: u32 = 256;

pub use compose::{ComposedTile, Compositor, DrawError, FetchError, TileFetch};
pub use geo::{GeoBounds, LatLng, Point, Projector, TileCoord, WebMercator};
pub use lifecycle::{
    DoneCallback, EngineConfig, MapEvent, SurfaceId, TileCreator, TileEngine, TileSurface,
};
pub use partition::{partition, Cell, CellGrid};
