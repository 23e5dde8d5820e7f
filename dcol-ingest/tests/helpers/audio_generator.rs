//! In-memory audio fixtures
//!
//! WAV through hound. FLAC and MP3 are written directly: FLAC with verbatim
//! subframes carrying the same tone, MP3 as silent Layer III frames whose
//! zeroed side info needs no Huffman data.

use std::io::Cursor;

/// Shape of a generated tone
#[derive(Debug, Clone)]
pub struct AudioConfig {
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub frequency: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            duration_seconds: 1.0,
            sample_rate: 44100,
            channels: 2,
            frequency: 440.0,
        }
    }
}

impl AudioConfig {
    pub fn seconds(duration_seconds: f64) -> Self {
        Self {
            duration_seconds,
            ..Self::default()
        }
    }
}

/// Fixed FLAC block size; the final block may be shorter
const FLAC_BLOCK_SIZE: usize = 4096;

/// MPEG-1 Layer III, 64 kbit/s, 44.1 kHz, stereo, no CRC
const MP3_FRAME_HEADER: [u8; 4] = [0xFF, 0xFB, 0x50, 0x00];
/// 144 * 64000 / 44100 bytes, header included, no padding slot
const MP3_FRAME_LEN: usize = 208;
pub const MP3_SAMPLE_RATE: u32 = 44_100;
pub const MP3_FRAME_SAMPLES: usize = 1152;

/// One 16-bit sample per frame of a sine tone at 30% amplitude
fn tone_samples(config: &AudioConfig) -> Vec<i16> {
    let frames = (config.duration_seconds * config.sample_rate as f64).round() as usize;
    (0..frames)
        .map(|i| {
            let t = i as f32 / config.sample_rate as f32;
            (0.3 * (2.0 * std::f32::consts::PI * config.frequency * t).sin() * i16::MAX as f32)
                as i16
        })
        .collect()
}

/// 16-bit PCM WAV holding a sine tone at 30% amplitude
pub fn generate_wav_bytes(config: &AudioConfig) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: config.channels,
        sample_rate: config.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut bytes = Vec::new();
    {
        let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec).unwrap();

        for sample in tone_samples(config) {
            for _ in 0..config.channels {
                writer.write_sample(sample).unwrap();
            }
        }
        writer.finalize().unwrap();
    }
    bytes
}

/// 16-bit FLAC holding the same tone as [`generate_wav_bytes`]
pub fn generate_flac_bytes(config: &AudioConfig) -> Vec<u8> {
    let samples = tone_samples(config);
    let channels = config.channels as u8;

    let mut out = b"fLaC".to_vec();

    // STREAMINFO, flagged as the last metadata block
    out.push(0x80);
    out.extend_from_slice(&34u32.to_be_bytes()[1..]);
    out.extend_from_slice(&(FLAC_BLOCK_SIZE as u16).to_be_bytes());
    out.extend_from_slice(&(FLAC_BLOCK_SIZE as u16).to_be_bytes());
    out.extend_from_slice(&[0; 6]);
    // rate:20 | channels-1:3 | bits-1:5 | total samples:36
    let packed = (u64::from(config.sample_rate) << 44)
        | (u64::from(channels - 1) << 41)
        | (15u64 << 36)
        | samples.len() as u64;
    out.extend_from_slice(&packed.to_be_bytes());
    // MD5 left unset
    out.extend_from_slice(&[0; 16]);

    for (number, block) in samples.chunks(FLAC_BLOCK_SIZE).enumerate() {
        let start = out.len();
        let full_block = block.len() == FLAC_BLOCK_SIZE;
        let block_code: u8 = if full_block { 0xC } else { 0x7 };

        out.extend_from_slice(&[
            0xFF,
            0xF8,
            (block_code << 4) | flac_rate_code(config.sample_rate),
            ((channels - 1) << 4) | (0x4 << 1),
        ]);
        push_utf8_number(&mut out, number as u32);
        if !full_block {
            out.extend_from_slice(&((block.len() - 1) as u16).to_be_bytes());
        }
        let header_crc = crc8(&out[start..]);
        out.push(header_crc);

        for _ in 0..channels {
            // Verbatim subframe, no wasted bits
            out.push(0x02);
            for sample in block {
                out.extend_from_slice(&sample.to_be_bytes());
            }
        }

        let frame_crc = crc16(&out[start..]);
        out.extend_from_slice(&frame_crc.to_be_bytes());
    }

    out
}

/// `frames` silent MP3 frames, [`MP3_FRAME_SAMPLES`] samples each
pub fn generate_silent_mp3_bytes(frames: usize) -> Vec<u8> {
    let mut frame = vec![0u8; MP3_FRAME_LEN];
    frame[..4].copy_from_slice(&MP3_FRAME_HEADER);
    frame.repeat(frames)
}

fn flac_rate_code(sample_rate: u32) -> u8 {
    match sample_rate {
        8_000 => 0x4,
        16_000 => 0x5,
        22_050 => 0x6,
        24_000 => 0x7,
        32_000 => 0x8,
        44_100 => 0x9,
        48_000 => 0xA,
        // Taken from STREAMINFO
        _ => 0x0,
    }
}

fn push_utf8_number(out: &mut Vec<u8>, value: u32) {
    match value {
        0..=0x7F => out.push(value as u8),
        0x80..=0x7FF => out.extend_from_slice(&[0xC0 | (value >> 6) as u8, 0x80 | (value & 0x3F) as u8]),
        _ => out.extend_from_slice(&[
            0xE0 | (value >> 12) as u8,
            0x80 | ((value >> 6) & 0x3F) as u8,
            0x80 | (value & 0x3F) as u8,
        ]),
    }
}

/// CRC-8, polynomial 0x07
fn crc8(bytes: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in bytes {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 { (crc << 1) ^ 0x07 } else { crc << 1 };
        }
    }
    crc
}

/// CRC-16, polynomial 0x8005
fn crc16(bytes: &[u8]) -> u16 {
    let mut crc = 0u16;
    for &byte in bytes {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 { (crc << 1) ^ 0x8005 } else { crc << 1 };
        }
    }
    crc
}
