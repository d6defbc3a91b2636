use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

pub mod manifest;

/// One geotagged photo. Immutable once constructed; the engine only
/// ever reads photos, it never mutates them.
#[derive(Clone, Debug)]
pub struct Photo {
    /// Unique, stable identifier (the source file name).
    pub id: String,
    /// Encoded raster bytes (JPEG/PNG/...), decoded on demand.
    pub image: Arc<Vec<u8>>,
    pub latitude: f64,
    pub longitude: f64,
    pub captured_at: DateTime<Utc>,
    /// Content labels, possibly empty.
    pub labels: Vec<String>,
}

impl Photo {
    pub fn new(
        id: impl Into<String>,
        image: Vec<u8>,
        latitude: f64,
        longitude: f64,
        captured_at: DateTime<Utc>,
        labels: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            image: Arc::new(image),
            latitude,
            longitude,
            captured_at,
            labels,
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("photo id must not be empty")]
    EmptyId,
}

/// Storage seam for the photo collection. The engine never subscribes to
/// change notifications; callers take a snapshot with `get_all` and
/// explicitly trigger a redraw after mutating the store.
pub trait AlbumStore {
    fn get_all(&self) -> Vec<Photo>;
    fn put(&mut self, photo: Photo) -> Result<(), StoreError>;
}

/// In-memory album, keyed by photo id. Insertion order is preserved;
/// putting an existing id replaces that photo in place.
#[derive(Default)]
pub struct MemoryAlbum {
    photos: Vec<Photo>,
}

impl MemoryAlbum {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }
}

impl AlbumStore for MemoryAlbum {
    fn get_all(&self) -> Vec<Photo> {
        self.photos.clone()
    }

    fn put(&mut self, photo: Photo) -> Result<(), StoreError> {
        if photo.id.is_empty() {
            return Err(StoreError::EmptyId);
        }
        match self.photos.iter_mut().find(|p| p.id == photo.id) {
            Some(existing) => *existing = photo,
            None => self.photos.push(photo),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn photo(id: &str, lat: f64) -> Photo {
        Photo::new(
            id,
            vec![1, 2, 3],
            lat,
            139.7,
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            vec!["beach".to_string()],
        )
    }

    #[test]
    fn put_appends_and_replaces_by_id() {
        let mut store = MemoryAlbum::new();
        store.put(photo("a.jpg", 35.0)).unwrap();
        store.put(photo("b.jpg", 36.0)).unwrap();
        store.put(photo("a.jpg", 37.0)).unwrap();

        let all = store.get_all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, "a.jpg");
        assert_eq!(all[0].latitude, 37.0);
        assert_eq!(all[1].id, "b.jpg");
    }

    #[test]
    fn put_rejects_empty_id() {
        let mut store = MemoryAlbum::new();
        assert!(store.put(photo("", 35.0)).is_err());
    }
}
