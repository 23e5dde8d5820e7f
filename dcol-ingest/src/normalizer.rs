//! Audio normalization to the canonical storage format
//!
//! Decodes any supported input with symphonia, downmixes to mono by averaging
//! channels, resamples to 16 kHz with rubato and encodes 16-bit PCM WAV with
//! hound. Duration is measured on the decoded signal at its original rate.
//!
//! The same input bytes always produce the same output bytes: the polynomial
//! resampler has no adaptive state and quantization is round-to-nearest.

use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use crate::error::ConversionError;
use crate::fetcher::AudioFormat;

/// Canonical sample rate of every stored file
pub const TARGET_SAMPLE_RATE: u32 = 16_000;
/// Canonical channel count of every stored file
pub const TARGET_CHANNELS: u16 = 1;
/// Canonical bit depth of every stored file
pub const TARGET_BITS_PER_SAMPLE: u16 = 16;

/// Output of [`Normalizer::normalize`]
#[derive(Debug, Clone)]
pub struct NormalizedAudio {
    /// Canonical WAV file contents
    pub wav_bytes: Vec<u8>,
    /// Decoded frames / original sample rate
    pub duration_seconds: f64,
    pub source_sample_rate: u32,
    pub source_channels: usize,
}

/// Decoded mono signal at its original rate
#[derive(Debug, Clone)]
struct DecodedMono {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: usize,
}

/// Converts arbitrary input audio to 16 kHz mono 16-bit PCM WAV
#[derive(Debug, Clone)]
pub struct Normalizer {
    target_sample_rate: u32,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            target_sample_rate: TARGET_SAMPLE_RATE,
        }
    }
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode, downmix, resample and re-encode one unit
    ///
    /// `declared` is only a format hint; the container contents decide.
    pub fn normalize(
        &self,
        raw: Vec<u8>,
        declared: Option<AudioFormat>,
    ) -> Result<NormalizedAudio, ConversionError> {
        let decoded = decode_to_mono(raw, declared)?;

        if decoded.samples.is_empty() {
            return Err(ConversionError::ZeroLength);
        }

        let duration_seconds = decoded.samples.len() as f64 / decoded.sample_rate as f64;

        let resampled = resample_mono(&decoded.samples, decoded.sample_rate, self.target_sample_rate)?;
        let wav_bytes = encode_wav(&resampled, self.target_sample_rate)?;

        debug!(
            source_rate = decoded.sample_rate,
            source_channels = decoded.channels,
            frames = decoded.samples.len(),
            output_frames = resampled.len(),
            duration_seconds,
            "Normalized audio"
        );

        Ok(NormalizedAudio {
            wav_bytes,
            duration_seconds,
            source_sample_rate: decoded.sample_rate,
            source_channels: decoded.channels,
        })
    }
}

fn decode_to_mono(raw: Vec<u8>, declared: Option<AudioFormat>) -> Result<DecodedMono, ConversionError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(raw)), Default::default());

    let mut hint = Hint::new();
    if let Some(format) = declared {
        hint.with_extension(format.extension());
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| ConversionError::UndecodableInput(format!("Failed to detect format: {}", e)))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| ConversionError::UndecodableInput("No audio track found".to_string()))?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| ConversionError::UndecodableInput(format!("Failed to create decoder: {}", e)))?;

    let mut sample_rate = codec_params.sample_rate;
    let mut channels = codec_params.channels.map(|c| c.count()).unwrap_or(0);
    let mut mono = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) if mono.is_empty() => {
                return Err(ConversionError::UndecodableInput(format!(
                    "Failed to read packet: {}",
                    e
                )));
            }
            Err(e) => {
                // Truncated tail after valid audio: keep what decoded
                warn!("Stopping at unreadable packet: {}", e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("Skipping corrupt packet: {}", e);
                continue;
            }
            Err(e) => {
                return Err(ConversionError::UndecodableInput(format!(
                    "Decoder failure: {}",
                    e
                )));
            }
        };

        let spec = *decoded.spec();
        sample_rate.get_or_insert(spec.rate);
        channels = spec.channels.count();

        if decoded.frames() == 0 {
            continue;
        }

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        downmix_into(buffer.samples(), channels, &mut mono);
    }

    let sample_rate = sample_rate
        .filter(|rate| *rate > 0)
        .ok_or_else(|| ConversionError::UndecodableInput("Sample rate not found".to_string()))?;

    Ok(DecodedMono {
        samples: mono,
        sample_rate,
        channels,
    })
}

/// Average interleaved frames into mono
fn downmix_into(interleaved: &[f32], channels: usize, out: &mut Vec<f32>) {
    if channels <= 1 {
        out.extend_from_slice(interleaved);
        return;
    }

    out.extend(
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32),
    );
}

/// Resample a mono signal; returns a copy when rates already match
fn resample_mono(input: &[f32], input_rate: u32, output_rate: u32) -> Result<Vec<f32>, ConversionError> {
    if input_rate == output_rate || input.is_empty() {
        return Ok(input.to_vec());
    }

    let ratio = output_rate as f64 / input_rate as f64;
    let expected_frames = (input.len() as f64 * ratio).round() as usize;

    let mut resampler = FastFixedIn::<f32>::new(ratio, 1.0, PolynomialDegree::Septic, input.len(), 1)
        .map_err(|e| ConversionError::UndecodableInput(format!("Failed to create resampler: {}", e)))?;

    let delay = resampler.output_delay();
    let planar_input = vec![input.to_vec()];

    let mut output = resampler
        .process(&planar_input, None)
        .map_err(|e| ConversionError::UndecodableInput(format!("Resampling failed: {}", e)))?
        .remove(0);

    // Flush the filter tail so the delayed final samples are not lost
    let tail = resampler
        .process_partial(None::<&[Vec<f32>]>, None)
        .map_err(|e| ConversionError::UndecodableInput(format!("Resampler flush failed: {}", e)))?
        .remove(0);
    output.extend(tail);

    let start = delay.min(output.len());
    let mut aligned: Vec<f32> = output.split_off(start);
    aligned.resize(expected_frames, 0.0);

    debug!(
        "Resampled {} frames ({} Hz) to {} frames ({} Hz)",
        input.len(),
        input_rate,
        aligned.len(),
        output_rate
    );

    Ok(aligned)
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

/// Encode mono f32 samples as 16-bit PCM WAV
fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, ConversionError> {
    let spec = hound::WavSpec {
        channels: TARGET_CHANNELS,
        sample_rate,
        bits_per_sample: TARGET_BITS_PER_SAMPLE,
        sample_format: hound::SampleFormat::Int,
    };

    let mut bytes = Vec::with_capacity(44 + samples.len() * 2);
    {
        let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec)
            .map_err(|e| ConversionError::UndecodableInput(format!("WAV encode failed: {}", e)))?;
        for &sample in samples {
            writer
                .write_sample(to_i16(sample))
                .map_err(|e| ConversionError::UndecodableInput(format!("WAV encode failed: {}", e)))?;
        }
        writer
            .finalize()
            .map_err(|e| ConversionError::UndecodableInput(format!("WAV finalize failed: {}", e)))?;
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(sample_rate: u32, channels: u16, frames: usize, value: i16) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut bytes = Vec::new();
        {
            let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec).unwrap();
            for _ in 0..frames {
                for _ in 0..channels {
                    writer.write_sample(value).unwrap();
                }
            }
            writer.finalize().unwrap();
        }
        bytes
    }

    fn read_spec(bytes: &[u8]) -> (hound::WavSpec, u32) {
        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        (reader.spec(), reader.duration())
    }

    #[test]
    fn test_downmix_averages_channels() {
        let mut out = Vec::new();
        downmix_into(&[0.5, -0.5, 1.0, 0.0], 2, &mut out);
        assert_eq!(out, vec![0.0, 0.5]);
    }

    #[test]
    fn test_downmix_mono_passthrough() {
        let mut out = Vec::new();
        downmix_into(&[0.1, 0.2, 0.3], 1, &mut out);
        assert_eq!(out, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_to_i16_clamps() {
        assert_eq!(to_i16(2.0), i16::MAX);
        assert_eq!(to_i16(-2.0), -i16::MAX);
        assert_eq!(to_i16(0.0), 0);
    }

    #[test]
    fn test_resample_same_rate_is_copy() {
        let input = vec![0.1, 0.2, 0.3];
        assert_eq!(resample_mono(&input, 16_000, 16_000).unwrap(), input);
    }

    #[test]
    fn test_resample_length_matches_ratio() {
        let input = vec![0.25f32; 44_100];
        let output = resample_mono(&input, 44_100, 16_000).unwrap();
        assert_eq!(output.len(), 16_000);
    }

    #[test]
    fn test_normalize_stereo_44k_to_canonical() {
        let input = wav_bytes(44_100, 2, 44_100, 8_000);
        let normalized = Normalizer::new()
            .normalize(input, Some(AudioFormat::Wav))
            .unwrap();

        let (spec, frames) = read_spec(&normalized.wav_bytes);
        assert_eq!(spec.sample_rate, TARGET_SAMPLE_RATE);
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(spec.sample_format, hound::SampleFormat::Int);
        assert_eq!(frames, 16_000);
        assert!((normalized.duration_seconds - 1.0).abs() < 1e-9);
        assert_eq!(normalized.source_sample_rate, 44_100);
        assert_eq!(normalized.source_channels, 2);
    }

    #[test]
    fn test_duration_uses_original_rate() {
        // 2.5 s at 8 kHz
        let input = wav_bytes(8_000, 1, 20_000, 1_000);
        let normalized = Normalizer::new().normalize(input, None).unwrap();
        assert!((normalized.duration_seconds - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let input = wav_bytes(22_050, 2, 5_000, 4_000);
        let first = Normalizer::new().normalize(input.clone(), None).unwrap();
        let second = Normalizer::new().normalize(input, None).unwrap();
        assert_eq!(first.wav_bytes, second.wav_bytes);
        assert_eq!(first.duration_seconds, second.duration_seconds);
    }

    #[test]
    fn test_garbage_is_undecodable() {
        let err = Normalizer::new()
            .normalize(b"definitely not audio".to_vec(), Some(AudioFormat::Mp3))
            .unwrap_err();
        assert!(matches!(err, ConversionError::UndecodableInput(_)));
    }

    #[test]
    fn test_empty_wav_is_zero_length() {
        let input = wav_bytes(16_000, 1, 0, 0);
        let err = Normalizer::new().normalize(input, Some(AudioFormat::Wav)).unwrap_err();
        assert!(matches!(err, ConversionError::ZeroLength));
    }
}
