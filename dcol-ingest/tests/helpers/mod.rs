//! Test Helper Utilities
//!
//! Shared utilities for dcol-ingest integration tests

#![allow(dead_code)]

pub mod audio_generator;
pub mod file_server;

pub use audio_generator::{
    generate_flac_bytes, generate_silent_mp3_bytes, generate_wav_bytes, AudioConfig,
    MP3_FRAME_SAMPLES, MP3_SAMPLE_RATE,
};
pub use file_server::{ServedFile, TestFileServer};

use dcol_ingest::{Collector, IngestConfig};
use std::sync::Arc;
use tempfile::TempDir;

/// Collector rooted in a fresh temp dir; keep the `TempDir` alive for the test
pub fn test_collector() -> (TempDir, Arc<Collector>) {
    let temp_dir = TempDir::new().unwrap();
    let collector = Collector::new(IngestConfig::for_root(temp_dir.path())).unwrap();
    (temp_dir, Arc::new(collector))
}
