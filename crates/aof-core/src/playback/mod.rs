//! Local spectator service serving a loaded container.
//!
//! One listener per process on an OS-assigned loopback port. Replays are
//! swapped with [`PlaybackServer::load_replay`] without restarting it. The
//! only mutable state is the playback cursor: the id of the chunk the client
//! is expected to ask for next.

mod routes;

pub use routes::{chunk_info, game_meta_data, router, PLAYBACK_VERSION};

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::container::MatchContainer;
use crate::region::Region;

/// Active replay plus the playback cursor.
#[derive(Debug)]
pub struct ReplayState {
    replay: RwLock<Option<Arc<MatchContainer>>>,
    cursor: AtomicU32,
}

impl Default for ReplayState {
    fn default() -> Self {
        ReplayState {
            replay: RwLock::new(None),
            cursor: AtomicU32::new(1),
        }
    }
}

impl ReplayState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `container` the active replay and rewinds the cursor.
    pub fn load(&self, container: Arc<MatchContainer>) {
        *self.replay.write().unwrap_or_else(|e| e.into_inner()) = Some(container);
        self.reset();
    }

    pub fn reset(&self) {
        self.cursor.store(1, Ordering::SeqCst);
    }

    pub fn cursor(&self) -> u32 {
        self.cursor.load(Ordering::SeqCst)
    }

    pub fn active(&self) -> Option<Arc<MatchContainer>> {
        self.replay
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// The client asked for `chunk_id`; it will want the one after next.
    pub(crate) fn requested_chunk(&self, chunk_id: u32) {
        self.cursor.store(chunk_id.saturating_add(1), Ordering::SeqCst);
    }
}

/// The running HTTP listener.
pub struct PlaybackServer {
    addr: SocketAddr,
    state: Arc<ReplayState>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<std::io::Result<()>>,
}

impl PlaybackServer {
    /// Binds `host` on an OS-assigned port and starts serving.
    pub async fn start(host: &str) -> Result<Self> {
        let listener = TcpListener::bind((host, 0))
            .await
            .with_context(|| format!("failed to bind playback server on {host}"))?;
        let addr = listener.local_addr()?;
        let state = Arc::new(ReplayState::new());
        let app = router(Arc::clone(&state));
        let (tx, rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = rx.await;
                })
                .await
        });
        tracing::info!("playback server listening on {}", addr);
        Ok(PlaybackServer {
            addr,
            state,
            shutdown: Some(tx),
            task,
        })
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn state(&self) -> &Arc<ReplayState> {
        &self.state
    }

    pub fn load_replay(&self, container: MatchContainer) {
        tracing::info!(
            region = container.region_id,
            match_id = container.match_id,
            chunks = container.chunks.len(),
            keyframes = container.keyframes.len(),
            "replay loaded"
        );
        self.state.load(Arc::new(container));
    }

    /// Rewinds to the first chunk before the client starts a session.
    pub fn reset_replay(&self) {
        self.state.reset();
    }

    /// Argument that points the game client at this server, or `None` when
    /// the container's region is unknown.
    pub fn launch_argument(&self, container: &MatchContainer) -> Option<String> {
        let region = Region::by_id(container.region_id)?;
        Some(format!(
            "spectator {}:{} {} {} {}",
            self.host(),
            self.port(),
            container.key_base64(),
            container.match_id,
            region.short_name
        ))
    }

    /// Stops accepting connections and waits for open ones to finish.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.task
            .await
            .context("playback server task panicked")?
            .context("playback server failed")?;
        tracing::info!("playback server stopped");
        Ok(())
    }
}
