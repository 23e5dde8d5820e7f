//! FLAC and MP3 inputs through detection, normalization and the full pipeline

mod helpers;

use dcol_ingest::fetcher::{detect_format, AudioFormat};
use dcol_ingest::models::{ConversationRequest, ConversationStatus};
use dcol_ingest::normalizer::{Normalizer, TARGET_SAMPLE_RATE};
use helpers::{
    generate_flac_bytes, generate_silent_mp3_bytes, test_collector, AudioConfig, ServedFile,
    TestFileServer, MP3_FRAME_SAMPLES, MP3_SAMPLE_RATE,
};
use std::io::Cursor;

const MP3_FRAMES: usize = 20;

fn mp3_seconds(frames: usize) -> f64 {
    (frames * MP3_FRAME_SAMPLES) as f64 / MP3_SAMPLE_RATE as f64
}

/// Format, frame count and peak amplitude of a canonical WAV
fn inspect(wav: &[u8]) -> (hound::WavSpec, u32, i16) {
    let mut reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
    let spec = reader.spec();
    let frames = reader.duration();
    let peak = reader
        .samples::<i16>()
        .map(|s| s.unwrap().saturating_abs())
        .max()
        .unwrap_or(0);
    (spec, frames, peak)
}

fn assert_canonical(spec: &hound::WavSpec) {
    assert_eq!(spec.sample_rate, TARGET_SAMPLE_RATE);
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(spec.sample_format, hound::SampleFormat::Int);
}

#[test]
fn test_sniffs_flac_and_mp3_signatures() {
    let flac = generate_flac_bytes(&AudioConfig::seconds(0.25));
    let mp3 = generate_silent_mp3_bytes(4);

    assert_eq!(AudioFormat::sniff(&flac), Some(AudioFormat::Flac));
    assert_eq!(AudioFormat::sniff(&mp3), Some(AudioFormat::Mp3));
    assert_eq!(
        detect_format(Some("application/octet-stream"), &flac).unwrap(),
        AudioFormat::Flac
    );
    assert_eq!(detect_format(None, &mp3).unwrap(), AudioFormat::Mp3);
}

#[test]
fn test_normalize_stereo_flac() {
    let input = generate_flac_bytes(&AudioConfig::default());
    let normalized = Normalizer::new()
        .normalize(input, Some(AudioFormat::Flac))
        .unwrap();

    let (spec, frames, peak) = inspect(&normalized.wav_bytes);
    assert_canonical(&spec);
    assert_eq!(frames, 16_000);
    assert!((normalized.duration_seconds - 1.0).abs() < 1e-9);
    assert_eq!(normalized.source_sample_rate, 44_100);
    assert_eq!(normalized.source_channels, 2);
    // 30% tone survives decode and resample
    assert!(peak > 5_000, "peak {} too low", peak);
}

#[test]
fn test_normalize_mono_flac_without_hint() {
    let input = generate_flac_bytes(&AudioConfig {
        duration_seconds: 0.5,
        sample_rate: 22_050,
        channels: 1,
        frequency: 300.0,
    });
    let normalized = Normalizer::new().normalize(input, None).unwrap();

    let (spec, frames, _) = inspect(&normalized.wav_bytes);
    assert_canonical(&spec);
    assert_eq!(frames, 8_000);
    assert!((normalized.duration_seconds - 0.5).abs() < 1e-9);
    assert_eq!(normalized.source_channels, 1);
}

#[test]
fn test_normalize_mp3() {
    let input = generate_silent_mp3_bytes(MP3_FRAMES);
    let normalized = Normalizer::new()
        .normalize(input, Some(AudioFormat::Mp3))
        .unwrap();

    let (spec, frames, _) = inspect(&normalized.wav_bytes);
    assert_canonical(&spec);
    assert_eq!(normalized.source_sample_rate, MP3_SAMPLE_RATE);

    // Within one frame of the encoded length, whatever the decoder trims
    let expected = mp3_seconds(MP3_FRAMES);
    assert!(
        (normalized.duration_seconds - expected).abs() <= mp3_seconds(1) + 1e-9,
        "duration {} vs {}",
        normalized.duration_seconds,
        expected
    );
    let expected_frames = normalized.duration_seconds * TARGET_SAMPLE_RATE as f64;
    assert!((frames as f64 - expected_frames).abs() <= 1.0);
}

#[tokio::test]
async fn test_dual_acquisition_of_flac_and_sniffed_mp3() {
    let server = TestFileServer::start(vec![
        ServedFile::new(
            "agent.flac",
            Some("audio/flac"),
            generate_flac_bytes(&AudioConfig::seconds(1.0)),
        ),
        ServedFile::new(
            "customer.mp3",
            Some("application/octet-stream"),
            generate_silent_mp3_bytes(MP3_FRAMES),
        ),
    ])
    .await;
    let (temp_dir, collector) = test_collector();

    let outcome = collector
        .acquire_conversation(ConversationRequest {
            conversation_id: "mixed".to_string(),
            agent_url: server.url("agent.flac"),
            customer_url: Some(server.url("customer.mp3")),
            timeout: None,
        })
        .await;

    assert_eq!(outcome.status, ConversationStatus::Success);
    assert!(outcome.metadata_tracked());

    for label in ["agent", "customer"] {
        let path = temp_dir.path().join("audio").join(format!("mixed_{}.wav", label));
        let (spec, _, _) = inspect(&std::fs::read(&path).unwrap());
        assert_canonical(&spec);
    }

    let agent = outcome.unit("agent").unwrap().unit().unwrap();
    assert!((agent.duration_seconds - 1.0).abs() < 1e-9);
    let customer = outcome.unit("customer").unwrap().unit().unwrap();
    assert!((customer.duration_seconds - mp3_seconds(MP3_FRAMES)).abs() <= mp3_seconds(1) + 1e-9);

    let record = collector.metadata().get("mixed").await.unwrap();
    assert_eq!(record.units.len(), 2);
    assert_eq!(record.totals, record.computed_totals());
}
