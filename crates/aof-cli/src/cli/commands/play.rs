//! `aof play` – serve a container to the game client.

use anyhow::{Context, Result};
use aof_core::container;
use aof_core::pipeline::{Pipeline, Startup};
use std::path::Path;

pub async fn run_play(path: &Path) -> Result<()> {
    let decoded = container::load(path)?;
    for w in &decoded.warnings {
        eprintln!("warning: {w}");
    }
    let replay = decoded.container;

    let mut startup = Startup::default();
    Pipeline::for_playback().run(&mut startup).await?;
    let server = startup
        .server
        .take()
        .context("playback server was not started")?;

    let Some(argument) = server.launch_argument(&replay) else {
        server.shutdown().await?;
        anyhow::bail!(
            "container {} names unknown region {}",
            path.display(),
            replay.region_id
        );
    };
    server.load_replay(replay);
    server.reset_replay();

    println!("Serving {} on {}:{}", path.display(), server.host(), server.port());
    println!("Launch the game client with:");
    println!("  {argument}");
    println!("Press Ctrl-C to stop.");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    server.shutdown().await
}
