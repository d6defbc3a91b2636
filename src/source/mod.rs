use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, warn};
use photoviz::{FetchError, TileCoord, TileFetch};

use crate::cache::Cache;

/// HTTP base-tile source: fills `{z}`/`{x}`/`{y}` into a URL template
/// and fetches the raster, with an optional disk cache in front.
///
/// Failures never fail a draw; the engine degrades the affected tile
/// to thumbnails on a blank background.
pub struct HttpTileSource {
    client: reqwest::Client,
    template: String,
    cache: Option<Cache>,
}

impl HttpTileSource {
    pub fn new(template: String, cache: Option<Cache>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            template,
            cache,
        })
    }

    fn url_for(&self, coord: TileCoord) -> String {
        self.template
            .replace("{z}", &coord.z.to_string())
            .replace("{x}", &coord.x.to_string())
            .replace("{y}", &coord.y.to_string())
    }
}

#[async_trait]
impl TileFetch for HttpTileSource {
    async fn fetch(&self, coord: TileCoord) -> Result<Vec<u8>, FetchError> {
        let url = self.url_for(coord);

        if let Some(cache) = &self.cache {
            if let Some(bytes) = cache.get(&url) {
                debug!("cache hit for {}", url);
                return Ok(bytes);
            }
        }

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| FetchError::Transport(err.to_string()))?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|err| FetchError::Transport(err.to_string()))?
            .to_vec();

        if let Some(cache) = &self.cache {
            if let Err(err) = cache.put(&url, &bytes) {
                warn!("failed to cache tile {}: {:#}", url, err);
            }
        }

        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_the_url_template() {
        let source = HttpTileSource::new(
            "https://tiles.example/{z}/{x}/{y}@2x.png".to_string(),
            None,
        )
        .unwrap();
        let url = source.url_for(TileCoord {
            x: 7274,
            y: 3225,
            z: 13,
        });
        assert_eq!(url, "https://tiles.example/13/7274/3225@2x.png");
    }

    #[tokio::test]
    async fn serves_cached_bytes_without_touching_the_network() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::new(dir.path()).unwrap();
        cache
            .put("https://tiles.invalid/1/0/0.png", b"cached-raster")
            .unwrap();

        // The host is unreachable; only the cache can satisfy this.
        let source = HttpTileSource::new(
            "https://tiles.invalid/{z}/{x}/{y}.png".to_string(),
            Some(cache),
        )
        .unwrap();
        let bytes = source
            .fetch(TileCoord { x: 0, y: 0, z: 1 })
            .await
            .unwrap();
        assert_eq!(bytes, b"cached-raster");
    }
}
