//! Ordered start-up stages.
//!
//! Each stage gets the shared [`Startup`] context and returns a `Result`; the
//! first failure stops the run and is reported with the stage's name.

use anyhow::Context;
use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

use crate::capture::CaptureSettings;
use crate::config::{self, AofConfig};
use crate::playback::PlaybackServer;
use crate::storage::SegmentCache;

#[derive(Debug, Error)]
#[error("start-up stage `{stage}` failed")]
pub struct PipelineError {
    pub stage: &'static str,
    #[source]
    pub source: anyhow::Error,
}

/// What the stages build up.
#[derive(Default)]
pub struct Startup {
    pub config: AofConfig,
    pub replay_dir: Option<PathBuf>,
    pub cache: Option<SegmentCache>,
    pub server: Option<PlaybackServer>,
}

impl Startup {
    /// Capture settings from the prepared directories.
    pub fn capture_settings(&self) -> anyhow::Result<CaptureSettings> {
        Ok(CaptureSettings {
            config: self.config.clone(),
            cache: self.cache.clone().context("segment cache not prepared")?,
            replay_dir: self.replay_dir.clone().context("replay dir not prepared")?,
        })
    }
}

#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, ctx: &mut Startup) -> anyhow::Result<()>;
}

#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Runs the stages in order, stopping at the first error.
    pub async fn run(&self, ctx: &mut Startup) -> Result<(), PipelineError> {
        for stage in &self.stages {
            let name = stage.name();
            tracing::debug!(stage = name, "running start-up stage");
            stage
                .run(ctx)
                .await
                .map_err(|source| PipelineError { stage: name, source })?;
        }
        Ok(())
    }

    /// Config, directories.
    pub fn for_capture() -> Self {
        Pipeline::new().stage(LoadConfig::Xdg).stage(PrepareDirs)
    }

    /// Config, directories, playback server.
    pub fn for_playback() -> Self {
        Pipeline::for_capture().stage(StartPlayback)
    }
}

/// Where the configuration comes from.
pub enum LoadConfig {
    /// `$XDG_CONFIG_HOME/aof/config.toml`, created with defaults if missing.
    Xdg,
    /// An already-built configuration.
    Given(AofConfig),
}

#[async_trait]
impl Stage for LoadConfig {
    fn name(&self) -> &'static str {
        "load config"
    }

    async fn run(&self, ctx: &mut Startup) -> anyhow::Result<()> {
        ctx.config = match self {
            LoadConfig::Xdg => config::load_or_init()?,
            LoadConfig::Given(cfg) => {
                cfg.validate()?;
                cfg.clone()
            }
        };
        Ok(())
    }
}

/// Creates the replay directory and opens the segment cache.
pub struct PrepareDirs;

#[async_trait]
impl Stage for PrepareDirs {
    fn name(&self) -> &'static str {
        "prepare directories"
    }

    async fn run(&self, ctx: &mut Startup) -> anyhow::Result<()> {
        let replay_dir = ctx.config.replay_dir()?;
        tokio::fs::create_dir_all(&replay_dir)
            .await
            .with_context(|| format!("failed to create {}", replay_dir.display()))?;
        let cache_dir = ctx.config.cache_dir()?;
        let cache = SegmentCache::open(&cache_dir)
            .with_context(|| format!("failed to open {}", cache_dir.display()))?;
        ctx.replay_dir = Some(replay_dir);
        ctx.cache = Some(cache);
        Ok(())
    }
}

/// Binds the playback server on the configured host.
pub struct StartPlayback;

#[async_trait]
impl Stage for StartPlayback {
    fn name(&self) -> &'static str {
        "start playback server"
    }

    async fn run(&self, ctx: &mut Startup) -> anyhow::Result<()> {
        let server = PlaybackServer::start(ctx.config.playback_host()).await?;
        ctx.server = Some(server);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &std::path::Path) -> AofConfig {
        AofConfig {
            replay_dir: Some(dir.join("replays")),
            cache_dir: Some(dir.join("cache")),
            ..Default::default()
        }
    }

    #[test]
    fn playback_pipeline_order() {
        assert_eq!(
            Pipeline::for_playback().names(),
            vec!["load config", "prepare directories", "start playback server"]
        );
    }

    #[tokio::test]
    async fn stages_fill_context() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new()
            .stage(LoadConfig::Given(config_in(dir.path())))
            .stage(PrepareDirs)
            .stage(StartPlayback);
        let mut ctx = Startup::default();
        pipeline.run(&mut ctx).await.unwrap();
        assert!(dir.path().join("replays").is_dir());
        assert!(dir.path().join("cache").is_dir());
        let settings = ctx.capture_settings().unwrap();
        assert_eq!(settings.replay_dir, dir.path().join("replays"));
        let server = ctx.server.take().unwrap();
        assert_eq!(server.host(), "127.0.0.1");
        server.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn first_failure_names_stage_and_stops() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("replays");
        std::fs::write(&blocker, b"").unwrap();
        let pipeline = Pipeline::new()
            .stage(LoadConfig::Given(config_in(dir.path())))
            .stage(PrepareDirs)
            .stage(StartPlayback);
        let mut ctx = Startup::default();
        let err = pipeline.run(&mut ctx).await.unwrap_err();
        assert_eq!(err.stage, "prepare directories");
        assert!(ctx.server.is_none());
        assert!(err.to_string().contains("prepare directories"));
    }

    #[test]
    fn capture_settings_need_prepared_dirs() {
        assert!(Startup::default().capture_settings().is_err());
    }
}
