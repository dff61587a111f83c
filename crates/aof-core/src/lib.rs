//! Live match capture from a spectator service, the `.aof` replay container,
//! and a local playback server that replays containers to the game client.

pub mod capture;
pub mod checksum;
pub mod config;
pub mod container;
pub mod downloader;
pub mod logging;
pub mod pipeline;
pub mod playback;
pub mod region;
pub mod retry;
pub mod segment;
pub mod spectator;
pub mod storage;
