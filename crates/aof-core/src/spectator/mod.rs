//! Spectator service client.
//!
//! The capture machine only talks to [`SpectatorApi`]; [`CurlSpectator`] is
//! the libcurl-backed implementation used against the real service.

mod curl_client;
#[cfg(test)]
pub(crate) mod fake;
mod types;

pub use curl_client::CurlSpectator;
pub use types::{ChunkInfo, GameKey, GameMetaData};

use async_trait::async_trait;
use bytes::Bytes;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::AofConfig;
use crate::region::Region;
use crate::retry::FetchError;
use crate::segment::SegmentKind;

/// Path prefix shared by every spectator endpoint.
pub const CONSUMER_PATH: &str = "observer-mode/rest/consumer/";

/// Requests for one match on one spectator host.
#[async_trait]
pub trait SpectatorApi: Send + Sync {
    /// Version string of the service.
    async fn version(&self) -> Result<String, FetchError>;

    async fn game_meta_data(&self) -> Result<GameMetaData, FetchError>;

    async fn last_chunk_info(&self) -> Result<ChunkInfo, FetchError>;

    /// Raw keyframe or chunk. An empty 200 response is [`FetchError::NotReady`].
    async fn segment(&self, kind: SegmentKind, id: u32) -> Result<Bytes, FetchError>;
}

/// URL builder for one match. Fixed at capture creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base_url: String,
    platform: String,
    match_id: u64,
}

impl Endpoint {
    pub fn new(base_url: &str, platform: &str, match_id: u64) -> Self {
        let mut base_url = base_url.trim().to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Endpoint {
            base_url,
            platform: platform.to_string(),
            match_id,
        }
    }

    /// Endpoint for `region`, honouring a configured base URL override.
    pub fn for_region(region: &Region, match_id: u64, cfg: &AofConfig) -> Self {
        match cfg.spectator_override(region.id) {
            Some(url) => Endpoint::new(url, region.platform, match_id),
            None => Endpoint::new(&region.base_url(), region.platform, match_id),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn version_url(&self) -> String {
        format!("{}{}version", self.base_url, CONSUMER_PATH)
    }

    pub fn game_meta_data_url(&self) -> String {
        self.object_url("getGameMetaData", 0)
    }

    pub fn last_chunk_info_url(&self) -> String {
        self.object_url("getLastChunkInfo", 0)
    }

    /// Segment URL with the cache-busting `rito` parameter set to `token`.
    pub fn segment_url(&self, kind: SegmentKind, id: u32, token: u128) -> String {
        format!("{}?rito={}", self.object_url(kind.endpoint(), id), token)
    }

    fn object_url(&self, endpoint: &str, id: u32) -> String {
        format!(
            "{}{}{}/{}/{}/{}/token",
            self.base_url, CONSUMER_PATH, endpoint, self.platform, self.match_id, id
        )
    }
}

/// Milliseconds since the epoch; used as the cache-busting token.
pub(crate) fn cache_buster() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
