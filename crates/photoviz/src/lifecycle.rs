//! Tile lifecycle: tracks mounted tile surfaces, drives redraws when
//! the album snapshot or query changes, publishes finished composites
//! onto surfaces, and resolves pointer clicks against the published
//! cell grids.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use album::Photo;
use image::RgbaImage;
use log::warn;
use uuid::Uuid;

use crate::compose::{ComposedTile, Compositor, DrawError, TileFetch};
use crate::geo::{Projector, TileCoord, WebMercator};
use crate::partition::CellGrid;

/// Identity of one tile surface, used to key the grid side table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SurfaceId(Uuid);

impl SurfaceId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Render target for one tile: a square device-pixel buffer. The
/// visible pixels only ever change through a whole-buffer blit in
/// [`TileEngine`], so partially-drawn states are never observable.
pub struct TileSurface {
    id: SurfaceId,
    coord: TileCoord,
    pixels: Mutex<RgbaImage>,
}

impl TileSurface {
    pub fn new(coord: TileCoord, size: u32) -> Self {
        Self {
            id: SurfaceId::new(),
            coord,
            pixels: Mutex::new(RgbaImage::new(size, size)),
        }
    }

    pub fn id(&self) -> SurfaceId {
        self.id
    }

    pub fn coord(&self) -> TileCoord {
        self.coord
    }

    /// Copy of the currently visible pixels.
    pub fn snapshot(&self) -> Result<RgbaImage, DrawError> {
        Ok(self
            .pixels
            .lock()
            .map_err(|_| DrawError::SurfaceUnavailable)?
            .clone())
    }
}

/// Map-host events the engine consumes.
pub enum MapEvent {
    /// A surface the host constructed itself became visible.
    TileLoaded(Arc<TileSurface>),
    /// The tile was evicted from view; its surface must not be touched
    /// by any draw still in flight.
    TileUnloaded(SurfaceId),
    /// A pan/zoom gesture started; clicks are ignored until the
    /// deferred clear after [`MapEvent::MoveEnd`].
    MoveStart,
    MoveEnd,
}

/// Boxed form of the `done` callback, for use through `dyn TileCreator`.
pub type DoneCallback = Box<dyn FnOnce(Result<(), DrawError>, &Arc<TileSurface>) + Send>;

/// The tile-layer capability a map host drives: hand out a surface
/// synchronously, report the draw outcome later.
pub trait TileCreator {
    fn create_tile(&self, coord: TileCoord, done: DoneCallback) -> Arc<TileSurface>;
}

pub struct EngineConfig {
    /// Base map raster source; None renders thumbnails on a blank
    /// background.
    pub source: Option<Arc<dyn TileFetch>>,
    pub projector: Arc<dyn Projector>,
    /// Device-pixel-ratio style multiplier for surface and badge
    /// dimensions.
    pub scale: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            source: None,
            projector: Arc::new(WebMercator),
            scale: 2,
        }
    }
}

#[derive(Default)]
struct AlbumSnapshot {
    photos: Arc<Vec<Photo>>,
    query: String,
}

struct EngineShared {
    mounted: Mutex<HashMap<SurfaceId, Arc<TileSurface>>>,
    /// Side table: last published cell grid per surface. Written only
    /// during a guarded publish, dropped on unmount.
    grids: Mutex<HashMap<SurfaceId, CellGrid>>,
    snapshot: Mutex<AlbumSnapshot>,
    panning: AtomicBool,
}

/// The tile engine: owns the mounted-surface set and drives
/// [`Compositor`] draws against the current album snapshot.
#[derive(Clone)]
pub struct TileEngine {
    compositor: Compositor,
    shared: Arc<EngineShared>,
}

impl TileEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            compositor: Compositor::new(config.source, config.projector, config.scale),
            shared: Arc::new(EngineShared {
                mounted: Mutex::new(HashMap::new()),
                grids: Mutex::new(HashMap::new()),
                snapshot: Mutex::new(AlbumSnapshot::default()),
                panning: AtomicBool::new(false),
            }),
        }
    }

    /// Tile-layer protocol: synchronously create and mount a surface
    /// for a requested tile, draw it asynchronously, and invoke `done`
    /// with the outcome. A failed draw marks only this tile.
    pub fn create_tile<F>(&self, coord: TileCoord, done: F) -> Arc<TileSurface>
    where
        F: FnOnce(Result<(), DrawError>, &Arc<TileSurface>) + Send + 'static,
    {
        let surface = Arc::new(TileSurface::new(coord, self.compositor.surface_size()));
        self.notify_tile_mounted(Arc::clone(&surface));

        let engine = self.clone();
        let task_surface = Arc::clone(&surface);
        tokio::spawn(async move {
            let result = engine.draw_surface(&task_surface).await;
            if let Err(err) = &result {
                warn!("draw failed for tile {:?}: {err}", task_surface.coord());
            }
            done(result, &task_surface);
        });

        surface
    }

    pub fn handle(&self, event: MapEvent) {
        match event {
            MapEvent::TileLoaded(surface) => self.notify_tile_mounted(surface),
            MapEvent::TileUnloaded(id) => self.notify_tile_unmounted(id),
            MapEvent::MoveStart => self.shared.panning.store(true, Ordering::SeqCst),
            MapEvent::MoveEnd => {
                // Deferred one-tick clear: the click delivered together
                // with the drag release still sees the gesture as
                // active and is ignored.
                let shared = Arc::clone(&self.shared);
                tokio::spawn(async move {
                    tokio::task::yield_now().await;
                    shared.panning.store(false, Ordering::SeqCst);
                });
            }
        }
    }

    pub fn notify_tile_mounted(&self, surface: Arc<TileSurface>) {
        if let Ok(mut mounted) = self.shared.mounted.lock() {
            mounted.insert(surface.id(), surface);
        }
    }

    pub fn notify_tile_unmounted(&self, id: SurfaceId) {
        if let Ok(mut mounted) = self.shared.mounted.lock() {
            mounted.remove(&id);
        }
        if let Ok(mut grids) = self.shared.grids.lock() {
            grids.remove(&id);
        }
    }

    fn is_mounted(&self, id: SurfaceId) -> bool {
        self.shared
            .mounted
            .lock()
            .map(|mounted| mounted.contains_key(&id))
            .unwrap_or(false)
    }

    /// Replace the album snapshot and redraw every mounted surface.
    /// Surfaces unmounted while the redraw is in flight are skipped
    /// silently. Callers invoke this after any collection or query
    /// change; the engine never watches the store itself.
    pub async fn redraw_all(&self, photos: Vec<Photo>, query: &str) {
        if let Ok(mut snapshot) = self.shared.snapshot.lock() {
            snapshot.photos = Arc::new(photos);
            snapshot.query = query.to_string();
        }

        let surfaces: Vec<Arc<TileSurface>> = match self.shared.mounted.lock() {
            Ok(mounted) => mounted.values().cloned().collect(),
            Err(_) => return,
        };
        for surface in surfaces {
            if !self.is_mounted(surface.id()) {
                continue;
            }
            if let Err(err) = self.draw_surface(&surface).await {
                warn!("redraw failed for tile {:?}: {err}", surface.coord());
            }
        }
    }

    /// Compose the surface's tile against the current snapshot and
    /// publish the result. Draws whose surface is unmounted by the
    /// time the composite is ready are dropped without touching it.
    pub async fn draw_surface(&self, surface: &Arc<TileSurface>) -> Result<(), DrawError> {
        let (photos, query) = {
            let snapshot = self
                .shared
                .snapshot
                .lock()
                .map_err(|_| DrawError::SurfaceUnavailable)?;
            (Arc::clone(&snapshot.photos), snapshot.query.clone())
        };

        if !self.is_mounted(surface.id()) {
            return Ok(());
        }
        let composed = self
            .compositor
            .compose(surface.coord(), &photos, &query)
            .await?;
        self.publish(surface, composed)
    }

    /// The single point where surfaces change: grid attach and
    /// whole-buffer blit, performed only if the surface is still
    /// mounted, under the registry lock.
    fn publish(&self, surface: &Arc<TileSurface>, composed: ComposedTile) -> Result<(), DrawError> {
        let mounted = self
            .shared
            .mounted
            .lock()
            .map_err(|_| DrawError::SurfaceUnavailable)?;
        if !mounted.contains_key(&surface.id()) {
            return Ok(());
        }

        let mut grids = self
            .shared
            .grids
            .lock()
            .map_err(|_| DrawError::SurfaceUnavailable)?;
        let mut pixels = surface
            .pixels
            .lock()
            .map_err(|_| DrawError::SurfaceUnavailable)?;
        *pixels = composed.pixels;
        grids.insert(surface.id(), composed.grid);
        Ok(())
    }

    /// Resolve a pointer position (css-pixel offsets within the tile)
    /// to the clicked cell's photo bucket, in draw-time order. None
    /// while a pan gesture is active or before the surface has a
    /// published grid; an empty bucket means the caller does nothing,
    /// one photo opens directly, several present a group.
    pub fn resolve_click(
        &self,
        surface: &TileSurface,
        px: f64,
        py: f64,
    ) -> Option<Vec<Photo>> {
        if self.shared.panning.load(Ordering::SeqCst) {
            return None;
        }
        let grids = self.shared.grids.lock().ok()?;
        let grid = grids.get(&surface.id())?;
        let cell = grid.cell_at(px, py)?;
        Some(cell.photos.clone())
    }
}

impl TileCreator for TileEngine {
    fn create_tile(&self, coord: TileCoord, done: DoneCallback) -> Arc<TileSurface> {
        TileEngine::create_tile(self, coord, move |result, surface| done(result, surface))
    }
}
