//! `aof record` – capture one match to a container.

use anyhow::{bail, Context, Result};
use aof_core::capture::{CaptureOutcome, CaptureRegistry, CaptureRequest, CaptureState, CaptureStatus};
use aof_core::container::PlayerRecord;
use aof_core::pipeline::{Pipeline, Startup};
use aof_core::region::Region;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct RecordArgs {
    pub region: String,
    pub match_id: u64,
    pub client_version: String,
    pub key: String,
    pub roster: Option<PathBuf>,
    pub json: bool,
}

pub async fn run_record(args: RecordArgs) -> Result<()> {
    let region = Region::parse(&args.region)
        .with_context(|| format!("unknown region {:?}; see `aof regions`", args.region))?;
    let roster = match &args.roster {
        Some(path) => load_roster(path)?,
        None => Vec::new(),
    };

    let mut startup = Startup::default();
    Pipeline::for_capture().run(&mut startup).await?;
    let registry = CaptureRegistry::new(startup.capture_settings()?);

    let handle = registry.start(&CaptureRequest {
        region_id: region.id,
        match_id: args.match_id,
        client_version: args.client_version,
        key: args.key,
        roster,
    })?;
    println!("Recording {}-{} ...", region.short_name, args.match_id);

    let mut status = handle.watch();
    let json = args.json;
    let printer = tokio::spawn(async move {
        let mut last = None;
        while status.changed().await.is_ok() {
            let s = status.borrow_and_update().clone();
            let line = progress_line(&s, json);
            if last.as_ref() != Some(&line) {
                println!("{line}");
                last = Some(line);
            }
        }
    });

    let outcome = tokio::select! {
        outcome = handle.outcome() => outcome,
        _ = tokio::signal::ctrl_c() => Err(anyhow::anyhow!("interrupted; no container written")),
    };
    printer.abort();

    match outcome? {
        CaptureOutcome::Done { path, complete } => {
            println!("Saved {}", path.display());
            if !complete {
                println!("Some segments could not be downloaded; the replay has gaps.");
            }
        }
        CaptureOutcome::Canceled { meta_errors } => {
            bail!("capture canceled after {} failed spectator requests", meta_errors)
        }
    }
    Ok(())
}

fn progress_line(s: &CaptureStatus, json: bool) -> String {
    if json {
        if let Ok(line) = serde_json::to_string(s) {
            return line;
        }
    }
    format!(
        "{:<14} keyframes {:>3}  chunks {:>3}  in flight {:>2}  failed {}",
        s.state.to_string(),
        s.downloaded_keyframes,
        s.downloaded_chunks,
        s.in_flight,
        s.failed
    )
}

fn load_roster(path: &Path) -> Result<Vec<PlayerRecord>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read roster {}", path.display()))?;
    let roster = serde_json::from_str(&data)
        .with_context(|| format!("invalid roster {}", path.display()))?;
    Ok(roster)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roster_file_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.json");
        std::fs::write(
            &path,
            r#"[{"id":1,"name":"A","team":100,"leagueId":2,"leagueRank":3,"championId":4,"abilityDId":5,"abilityFId":6}]"#,
        )
        .unwrap();
        let roster = load_roster(&path).unwrap();
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].champion_id, 4);
    }

    fn status() -> CaptureStatus {
        CaptureStatus {
            region_id: 1,
            match_id: 42,
            state: CaptureState::AwaitingStart,
            last_keyframe_id: 2,
            last_chunk_id: 5,
            downloaded_keyframes: 2,
            downloaded_chunks: 4,
            failed: 0,
            in_flight: 1,
            meta_errors: 0,
        }
    }

    #[test]
    fn progress_line_as_json() {
        let line = progress_line(&status(), true);
        let v: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(v["state"], "awaiting_start");
        assert_eq!(v["matchId"], 42);
        assert_eq!(v["downloadedChunks"], 4);
        assert_eq!(v["inFlight"], 1);
    }

    #[test]
    fn progress_line_as_text() {
        let line = progress_line(&status(), false);
        assert!(line.starts_with("awaiting start"));
        assert!(line.contains("chunks   4"));
    }

    #[test]
    fn bad_roster_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.json");
        std::fs::write(&path, "{").unwrap();
        let err = load_roster(&path).unwrap_err();
        assert!(format!("{err:#}").contains("roster.json"));
    }
}
