//! libcurl-backed [`SpectatorApi`]. Each request runs on a blocking thread.

use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::{cache_buster, ChunkInfo, Endpoint, GameMetaData, SpectatorApi};
use crate::retry::FetchError;
use crate::segment::SegmentKind;

#[derive(Debug, Clone)]
pub struct CurlSpectator {
    endpoint: Endpoint,
    timeout: Duration,
}

impl CurlSpectator {
    pub fn new(endpoint: Endpoint, timeout: Duration) -> Self {
        CurlSpectator { endpoint, timeout }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    async fn get(&self, url: String) -> Result<Bytes, FetchError> {
        let timeout = self.timeout;
        tokio::task::spawn_blocking(move || blocking_get(&url, timeout))
            .await
            .map_err(|e| FetchError::Task(e.to_string()))?
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T, FetchError> {
        let body = self.get(url).await?;
        if body.is_empty() {
            return Err(FetchError::NotReady);
        }
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl SpectatorApi for CurlSpectator {
    async fn version(&self) -> Result<String, FetchError> {
        let body = self.get(self.endpoint.version_url()).await?;
        Ok(String::from_utf8_lossy(&body).trim().to_string())
    }

    async fn game_meta_data(&self) -> Result<GameMetaData, FetchError> {
        self.get_json(self.endpoint.game_meta_data_url()).await
    }

    async fn last_chunk_info(&self) -> Result<ChunkInfo, FetchError> {
        self.get_json(self.endpoint.last_chunk_info_url()).await
    }

    async fn segment(&self, kind: SegmentKind, id: u32) -> Result<Bytes, FetchError> {
        let body = self
            .get(self.endpoint.segment_url(kind, id, cache_buster()))
            .await?;
        if body.is_empty() {
            return Err(FetchError::NotReady);
        }
        Ok(body)
    }
}

/// One GET. Anything but HTTP 200 is an error.
fn blocking_get(url: &str, timeout: Duration) -> Result<Bytes, FetchError> {
    let mut body = Vec::new();

    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.follow_location(true)?;
    easy.max_redirections(5)?;
    easy.connect_timeout(timeout)?;
    easy.timeout(timeout)?;

    {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()?;
    }

    let code = easy.response_code()?;
    if code != 200 {
        return Err(FetchError::Http(code));
    }
    Ok(Bytes::from(body))
}
