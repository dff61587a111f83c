//! `aof inspect` – print what a container holds.

use anyhow::Result;
use aof_core::checksum;
use aof_core::container::{self, Decoded, SegmentCollection};
use aof_core::region::Region;
use serde_json::{json, Value};
use std::path::Path;

pub fn run_inspect(path: &Path, json: bool) -> Result<()> {
    let decoded = container::load(path)?;
    let sha256 = checksum::sha256_path(path)?;
    let report = report(&decoded, &sha256);
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_text(path, &report);
    }
    Ok(())
}

fn segments(c: &SegmentCollection) -> Value {
    json!({
        "count": c.len(),
        "first": c.first_id(),
        "last": c.last_id(),
        "bytes": c.total_bytes(),
        "sequential": c.is_sequential(),
    })
}

pub(crate) fn report(decoded: &Decoded, sha256: &str) -> Value {
    let c = &decoded.container;
    json!({
        "version": c.version,
        "region": Region::by_id(c.region_id).map(|r| r.short_name),
        "regionId": c.region_id,
        "matchId": c.match_id,
        "clientVersion": c.client_version.to_string(),
        "key": c.key_base64(),
        "complete": c.complete,
        "startupEndChunkId": c.startup_end_chunk_id,
        "matchStartChunkId": c.match_start_chunk_id,
        "finalChunkId": c.final_chunk_id(),
        "players": c.players,
        "keyframes": segments(&c.keyframes),
        "chunks": segments(&c.chunks),
        "warnings": decoded.warnings.iter().map(|w| w.to_string()).collect::<Vec<_>>(),
        "sha256": sha256,
    })
}

fn print_text(path: &Path, r: &Value) {
    let region = r["region"].as_str().unwrap_or("?");
    println!("{}", path.display());
    println!("  format version   {}", r["version"]);
    println!("  match            {}-{} (region id {})", region, r["matchId"], r["regionId"]);
    println!("  client version   {}", r["clientVersion"].as_str().unwrap_or(""));
    println!("  key              {}", r["key"].as_str().unwrap_or(""));
    println!("  complete         {}", r["complete"]);
    println!(
        "  boundaries       startup ends at {}, match starts at {}, final chunk {}",
        r["startupEndChunkId"], r["matchStartChunkId"], r["finalChunkId"]
    );
    for kind in ["keyframes", "chunks"] {
        let s = &r[kind];
        println!(
            "  {:<16} {} ({} bytes, ids {}..={}{})",
            kind,
            s["count"],
            s["bytes"],
            s["first"],
            s["last"],
            if s["sequential"] == true { "" } else { ", with gaps" }
        );
    }
    if let Some(players) = r["players"].as_array() {
        println!("  players          {}", players.len());
        for p in players {
            println!(
                "    team {:>3}  {:<24} champion {}",
                p["team"],
                p["name"].as_str().unwrap_or(""),
                p["championId"]
            );
        }
    }
    if let Some(warnings) = r["warnings"].as_array() {
        for w in warnings {
            println!("  warning          {}", w.as_str().unwrap_or(""));
        }
    }
    println!("  sha256           {}", r["sha256"].as_str().unwrap_or(""));
}
