//! Spectator-shaped routes. Nothing here answers with an error status: a
//! missing replay or segment is an empty body, which the client tolerates.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::ReplayState;
use crate::container::MatchContainer;
use crate::segment::SegmentKind;
use crate::spectator::{ChunkInfo, GameKey, GameMetaData, CONSUMER_PATH};

/// Version string the game client expects from the service.
pub const PLAYBACK_VERSION: &str = "1.82.102";

/// Delay reported while the client is still inside the startup chunks.
const STARTUP_PACE_MS: u32 = 30000;
/// Delay reported once the startup boundary is passed.
const FAST_PACE_MS: u32 = 1000;

type SegmentPath = Path<(String, String, String)>;

pub fn router(state: Arc<ReplayState>) -> Router {
    let api = Router::new()
        .route("/version", get(version))
        .route(
            "/getGameMetaData/{platform}/{match_id}/{since}/token",
            get(meta_data),
        )
        .route(
            "/getLastChunkInfo/{platform}/{match_id}/{since}/token",
            get(last_chunk_info),
        )
        .route(
            "/getGameDataChunk/{platform}/{match_id}/{id}/token",
            get(game_data_chunk),
        )
        .route("/getKeyFrame/{platform}/{match_id}/{id}/token", get(key_frame));

    let prefix = format!("/{}", CONSUMER_PATH.trim_end_matches('/'));
    Router::new()
        .nest(&prefix, api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn version() -> &'static str {
    PLAYBACK_VERSION
}

async fn meta_data(State(state): State<Arc<ReplayState>>) -> Json<GameMetaData> {
    Json(game_meta_data(state.active().as_deref()))
}

async fn last_chunk_info(State(state): State<Arc<ReplayState>>) -> Json<ChunkInfo> {
    Json(chunk_info(state.cursor(), state.active().as_deref()))
}

async fn game_data_chunk(
    State(state): State<Arc<ReplayState>>,
    Path((_, _, id)): SegmentPath,
) -> impl IntoResponse {
    let id = id.parse::<u32>().ok();
    if let Some(id) = id {
        state.requested_chunk(id);
    }
    segment_response(&state, SegmentKind::Chunk, id)
}

async fn key_frame(
    State(state): State<Arc<ReplayState>>,
    Path((_, _, id)): SegmentPath,
) -> impl IntoResponse {
    segment_response(&state, SegmentKind::Keyframe, id.parse::<u32>().ok())
}

fn segment_response(state: &ReplayState, kind: SegmentKind, id: Option<u32>) -> impl IntoResponse {
    let data = id
        .and_then(|id| u16::try_from(id).ok())
        .zip(state.active())
        .and_then(|(id, c)| c.segments(kind).get(id).cloned())
        .unwrap_or_else(Bytes::new);
    if data.is_empty() {
        tracing::debug!(%kind, ?id, "segment not in replay");
    }
    ([(header::CONTENT_TYPE, "application/octet-stream")], data)
}

/// Metadata document for the active replay. The boundaries come from the
/// container; everything else is the fixed shape the client accepts.
pub fn game_meta_data(replay: Option<&MatchContainer>) -> GameMetaData {
    let (startup_end, match_start) = replay
        .map(|c| (c.startup_end_chunk_id, c.match_start_chunk_id))
        .unwrap_or((1, 1));
    GameMetaData {
        game_key: GameKey {
            game_id: 0,
            platform_id: "aof".to_string(),
        },
        chunk_time_interval: 30000,
        start_time: "???".to_string(),
        game_ended: true,
        last_chunk_id: 1,
        last_key_frame_id: 1,
        end_startup_chunk_id: i64::from(startup_end),
        delay_time: 150000,
        key_frame_time_interval: 60000,
        start_game_chunk_id: i64::from(match_start),
        client_added_lag: 30000,
        client_back_fetching_freq: 1000,
        create_time: "???".to_string(),
        end_game_chunk_id: -1,
        end_game_key_frame_id: -1,
        ..Default::default()
    }
}

/// Chunk info derived from the cursor: the client is told the chunk it will
/// ask for next is the newest one available.
pub fn chunk_info(cursor: u32, replay: Option<&MatchContainer>) -> ChunkInfo {
    let (startup_end, match_start, end_game) = replay
        .map(|c| {
            (
                i64::from(c.startup_end_chunk_id),
                i64::from(c.match_start_chunk_id),
                c.final_chunk_id().map_or(0, i64::from),
            )
        })
        .unwrap_or((0, 0, 0));
    let cursor = i64::from(cursor);
    ChunkInfo {
        chunk_id: cursor,
        available_since: 30000,
        next_available_chunk: if cursor == startup_end {
            STARTUP_PACE_MS
        } else {
            FAST_PACE_MS
        },
        key_frame_id: ((cursor - match_start).div_euclid(2) + 1).max(0),
        next_chunk_id: 0,
        end_startup_chunk_id: startup_end,
        start_game_chunk_id: match_start,
        end_game_chunk_id: end_game,
        duration: 30000,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{ClientVersion, SegmentCollection};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    const BASE: &str = "/observer-mode/rest/consumer";

    fn replay() -> MatchContainer {
        MatchContainer {
            version: 12,
            region_id: 1,
            match_id: 42,
            client_version: ClientVersion::new(6, 2, 1),
            key: Bytes::from_static(&[1, 2, 3]),
            complete: true,
            startup_end_chunk_id: 1,
            match_start_chunk_id: 2,
            players: vec![],
            keyframes: [(1, Bytes::from_static(b"KF1"))].into_iter().collect(),
            chunks: [
                (1, Bytes::from_static(b"one")),
                (2, Bytes::from_static(b"two")),
                (3, Bytes::from_static(b"three")),
            ]
            .into_iter()
            .collect(),
        }
    }

    fn loaded() -> Arc<ReplayState> {
        let state = Arc::new(ReplayState::new());
        state.load(Arc::new(replay()));
        state
    }

    async fn get(state: &Arc<ReplayState>, path: &str) -> (StatusCode, Bytes) {
        let resp = router(Arc::clone(state))
            .oneshot(Request::get(format!("{BASE}{path}")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        (status, resp.into_body().collect().await.unwrap().to_bytes())
    }

    async fn get_json(state: &Arc<ReplayState>, path: &str) -> serde_json::Value {
        let (status, body) = get(state, path).await;
        assert_eq!(status, StatusCode::OK);
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn version_constant() {
        let (status, body) = get(&loaded(), "/version").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_ref(), b"1.82.102");
    }

    #[tokio::test]
    async fn chunk_request_advances_cursor() {
        let state = loaded();
        let (status, body) = get(&state, "/getGameDataChunk/EUW1/42/2/token").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_ref(), b"two");
        assert_eq!(state.cursor(), 3);

        let info = get_json(&state, "/getLastChunkInfo/EUW1/42/0/token").await;
        assert_eq!(info["chunkId"], 3);
        assert_eq!(info["endGameChunkId"], 3);
        assert_eq!(info["keyFrameId"], 1);
        assert_eq!(info["nextAvailableChunk"], 1000);
    }

    #[tokio::test]
    async fn missing_chunk_is_empty_and_still_advances() {
        let state = loaded();
        let (status, body) = get(&state, "/getGameDataChunk/EUW1/42/9/token?rito=123").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());
        assert_eq!(state.cursor(), 10);
    }

    #[tokio::test]
    async fn keyframes_do_not_move_cursor() {
        let state = loaded();
        let (_, body) = get(&state, "/getKeyFrame/EUW1/42/1/token").await;
        assert_eq!(body.as_ref(), b"KF1");
        let (status, body) = get(&state, "/getKeyFrame/EUW1/42/2/token").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());
        assert_eq!(state.cursor(), 1);
    }

    #[tokio::test]
    async fn metadata_draws_boundaries_from_replay() {
        let m = get_json(&loaded(), "/getGameMetaData/EUW1/42/0/token").await;
        assert_eq!(m["startGameChunkId"], 2);
        assert_eq!(m["endStartupChunkId"], 1);
        assert_eq!(m["gameEnded"], true);
        assert_eq!(m["gameKey"]["platformId"], "aof");
        assert_eq!(m["endGameChunkId"], -1);
    }

    #[tokio::test]
    async fn no_replay_loaded_is_not_an_error() {
        let state = Arc::new(ReplayState::new());
        let (status, body) = get(&state, "/getGameDataChunk/EUW1/42/1/token").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());
        let info = get_json(&state, "/getLastChunkInfo/EUW1/42/0/token").await;
        assert_eq!(info["chunkId"], 2);
    }

    #[tokio::test]
    async fn non_numeric_id_gets_empty_body() {
        let state = loaded();
        let (status, body) = get(&state, "/getGameDataChunk/EUW1/42/abc/token").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());
        assert_eq!(state.cursor(), 1);
    }

    #[test]
    fn chunk_info_pacing_and_keyframes() {
        let mut c = replay();
        c.startup_end_chunk_id = 2;
        c.match_start_chunk_id = 4;
        let at = |cursor| chunk_info(cursor, Some(&c));
        assert_eq!(at(2).next_available_chunk, 30000);
        assert_eq!(at(3).next_available_chunk, 1000);
        // floor((1 - 4) / 2) + 1 = -1, clamped
        assert_eq!(at(1).key_frame_id, 0);
        assert_eq!(at(3).key_frame_id, 0);
        assert_eq!(at(4).key_frame_id, 1);
        assert_eq!(at(7).key_frame_id, 2);
        assert_eq!(at(8).key_frame_id, 3);
    }

    #[test]
    fn chunk_info_without_chunks() {
        let mut c = replay();
        c.chunks = SegmentCollection::new();
        assert_eq!(chunk_info(1, Some(&c)).end_game_chunk_id, 0);
    }
}
