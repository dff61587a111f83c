//! JSON documents exchanged with the spectator service.
//!
//! The same types are parsed from the remote service during capture and
//! rendered by the playback server, so unknown fields are tolerated and every
//! field has a default.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameKey {
    pub game_id: u64,
    pub platform_id: String,
}

/// `getGameMetaData` response.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameMetaData {
    pub game_key: GameKey,
    pub game_server_address: String,
    pub port: u16,
    pub encryption_key: String,
    pub chunk_time_interval: u32,
    pub start_time: String,
    pub game_ended: bool,
    pub last_chunk_id: i64,
    pub last_key_frame_id: i64,
    pub end_startup_chunk_id: i64,
    pub delay_time: u32,
    pub pending_available_chunk_info: Vec<serde_json::Value>,
    pub pending_available_key_frame_info: Vec<serde_json::Value>,
    pub key_frame_time_interval: u32,
    pub decoded_encryption_key: String,
    /// Zero or negative until the match has left its loading screen.
    pub start_game_chunk_id: i64,
    pub game_length: u64,
    pub client_added_lag: u32,
    pub client_back_fetching_enabled: bool,
    pub client_back_fetching_freq: u32,
    pub interest_score: i64,
    pub featured_game: bool,
    pub create_time: String,
    pub end_game_chunk_id: i64,
    pub end_game_key_frame_id: i64,
}

impl GameMetaData {
    pub fn has_started(&self) -> bool {
        self.start_game_chunk_id > 0
    }
}

/// `getLastChunkInfo` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChunkInfo {
    pub chunk_id: i64,
    pub available_since: u32,
    /// Milliseconds until the next chunk is published.
    pub next_available_chunk: u32,
    pub key_frame_id: i64,
    pub next_chunk_id: i64,
    pub end_startup_chunk_id: i64,
    pub start_game_chunk_id: i64,
    /// Last chunk of the match, or 0 / -1 while it is still running.
    pub end_game_chunk_id: i64,
    pub duration: u32,
}
