//! Registry of running captures, keyed by `(region, match)`.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::error::CaptureError;
use super::machine::CaptureDriver;
use super::run::run_capture;
use super::{CaptureRequest, CaptureStatus, MatchCapture};
use crate::config::AofConfig;
use crate::downloader::DownloadContext;
use crate::spectator::{CurlSpectator, Endpoint, SpectatorApi};
use crate::storage::SegmentCache;

/// Terminal result of a capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Container written to `path`; `complete` is false if any segment was lost.
    Done { path: PathBuf, complete: bool },
    /// Abandoned after too many failed polls.
    Canceled { meta_errors: u32 },
}

/// Resolved settings shared by every capture.
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub config: AofConfig,
    pub cache: SegmentCache,
    pub replay_dir: PathBuf,
}

impl CaptureSettings {
    /// Resolves cache and replay directories from `config`, creating the cache.
    pub fn from_config(config: AofConfig) -> Result<Self> {
        let cache_dir = config.cache_dir()?;
        let cache = SegmentCache::open(&cache_dir)
            .with_context(|| format!("failed to open segment cache {}", cache_dir.display()))?;
        let replay_dir = config.replay_dir()?;
        Ok(CaptureSettings {
            config,
            cache,
            replay_dir,
        })
    }
}

type CaptureKey = (u8, u64);

/// Starts captures and tracks the live ones. Cheap to clone.
#[derive(Clone)]
pub struct CaptureRegistry {
    settings: Arc<CaptureSettings>,
    captures: Arc<Mutex<HashMap<CaptureKey, watch::Receiver<CaptureStatus>>>>,
}

impl CaptureRegistry {
    pub fn new(settings: CaptureSettings) -> Self {
        CaptureRegistry {
            settings: Arc::new(settings),
            captures: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CaptureKey, watch::Receiver<CaptureStatus>>> {
        self.captures.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Starts capturing from the region's spectator host (or its configured override).
    pub fn start(&self, req: &CaptureRequest) -> Result<CaptureHandle, CaptureError> {
        let capture = MatchCapture::new(req)?;
        let endpoint = Endpoint::for_region(capture.region(), capture.match_id(), &self.settings.config);
        tracing::info!(
            region = capture.region().short_name,
            match_id = capture.match_id(),
            base_url = endpoint.base_url(),
            "starting capture"
        );
        let timeout = self.settings.config.retry().request_timeout();
        let api = Arc::new(CurlSpectator::new(endpoint, timeout));
        self.start_with_api(capture, api)
    }

    /// Starts a capture against `api`. Refuses a match that is already running.
    pub fn start_with_api(
        &self,
        capture: MatchCapture,
        api: Arc<dyn SpectatorApi>,
    ) -> Result<CaptureHandle, CaptureError> {
        let region_id = capture.region().id;
        let match_id = capture.match_id();
        let key = (region_id, match_id);

        let (tx, rx) = watch::channel(capture.status());
        {
            let mut captures = self.lock();
            if captures.contains_key(&key) {
                return Err(CaptureError::AlreadyRunning { region_id, match_id });
            }
            captures.insert(key, rx.clone());
        }

        let cfg = &self.settings.config;
        let downloads = Arc::new(DownloadContext {
            api: Arc::clone(&api),
            cache: self.settings.cache.clone(),
            policy: cfg.retry().policy(),
            region_id,
            match_id,
            progress: Arc::clone(capture.progress()),
        });
        let mut driver = CaptureDriver::new(capture, api, downloads, cfg.capture());

        let settings = Arc::clone(&self.settings);
        let captures = Arc::clone(&self.captures);
        let task = tokio::spawn(async move {
            let result = run_capture(&mut driver, &settings.cache, &settings.replay_dir, Some(&tx)).await;
            captures
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&key);
            if let Err(e) = &result {
                tracing::error!(region_id, match_id, "capture failed: {:#}", e);
            }
            result
        });

        Ok(CaptureHandle {
            region_id,
            match_id,
            status: rx,
            task,
        })
    }

    pub fn is_running(&self, region_id: u8, match_id: u64) -> bool {
        self.lock().contains_key(&(region_id, match_id))
    }

    /// Status of every running capture, ordered by region then match.
    pub fn status(&self) -> Vec<CaptureStatus> {
        let mut out: Vec<CaptureStatus> = self.lock().values().map(|rx| rx.borrow().clone()).collect();
        out.sort_by_key(|s| (s.region_id, s.match_id));
        out
    }
}

/// Handle to one started capture.
pub struct CaptureHandle {
    region_id: u8,
    match_id: u64,
    status: watch::Receiver<CaptureStatus>,
    task: JoinHandle<Result<CaptureOutcome>>,
}

impl CaptureHandle {
    pub fn region_id(&self) -> u8 {
        self.region_id
    }

    pub fn match_id(&self) -> u64 {
        self.match_id
    }

    pub fn status(&self) -> CaptureStatus {
        self.status.borrow().clone()
    }

    /// Subscribe to status updates (one per poll).
    pub fn watch(&self) -> watch::Receiver<CaptureStatus> {
        self.status.clone()
    }

    /// Waits for the capture to reach `Done` or `Canceled`.
    pub async fn outcome(self) -> Result<CaptureOutcome> {
        self.task.await.context("capture task panicked")?
    }
}
