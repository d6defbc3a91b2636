//! JSON album manifest: a flat array of photo entries whose image paths
//! are resolved relative to the manifest file.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::info;
use serde::Deserialize;
use thiserror::Error;

use crate::Photo;

#[derive(Deserialize, Debug)]
pub struct ManifestEntry {
    /// Image file path, relative to the manifest unless absolute.
    pub path: PathBuf,
    pub latitude: f64,
    pub longitude: f64,
    pub captured_at: DateTime<Utc>,
    #[serde(default)]
    pub labels: Vec<String>,
}

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse manifest: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("manifest entry has no file name: {0}")]
    MissingFileName(PathBuf),
}

/// Load an album from a manifest file, reading every referenced image
/// into memory. The photo id is the image file name.
pub fn load_album(manifest_path: &Path) -> Result<Vec<Photo>, ManifestError> {
    let raw = fs::read_to_string(manifest_path).map_err(|source| ManifestError::Io {
        path: manifest_path.to_path_buf(),
        source,
    })?;
    let entries: Vec<ManifestEntry> = serde_json::from_str(&raw)?;
    let base = manifest_path.parent().unwrap_or_else(|| Path::new("."));

    let mut photos = Vec::with_capacity(entries.len());
    for entry in entries {
        let image_path = if entry.path.is_absolute() {
            entry.path.clone()
        } else {
            base.join(&entry.path)
        };
        let id = entry
            .path
            .file_name()
            .ok_or_else(|| ManifestError::MissingFileName(entry.path.clone()))?
            .to_string_lossy()
            .into_owned();
        let image = fs::read(&image_path).map_err(|source| ManifestError::Io {
            path: image_path.clone(),
            source,
        })?;
        photos.push(Photo::new(
            id,
            image,
            entry.latitude,
            entry.longitude,
            entry.captured_at,
            entry.labels,
        ));
    }

    info!("Loaded {} photos from {}", photos.len(), manifest_path.display());
    Ok(photos)
}
