use anyhow::{bail, Result};
use base64::Engine;

/// Sample rate the realtime speech protocol runs at, both directions.
pub const SAMPLE_RATE: u32 = 24_000;

/// All audio on the wire is mono.
pub const CHANNELS: u16 = 1;

/// Quantize one float sample to 16-bit signed PCM.
///
/// The sample is clamped to [-1.0, 1.0], then scaled by 32767 on the
/// positive side and 32768 on the negative side so both extremes land
/// exactly on the i16 range. Round-trip error stays within one
/// quantization step.
pub fn quantize_sample(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0).round() as i16
    } else {
        (s * 32767.0).round() as i16
    }
}

/// Convert a float frame to 16-bit PCM.
pub fn quantize_frame(samples: &[f32]) -> Vec<i16> {
    samples.iter().copied().map(quantize_sample).collect()
}

/// Convert 16-bit PCM back to normalized float samples.
pub fn dequantize_frame(pcm: &[i16]) -> Vec<f32> {
    pcm.iter().map(|&s| s as f32 / 32768.0).collect()
}

/// Encode a float frame as the transport representation: 16-bit
/// little-endian PCM, base64.
pub fn encode_wire_frame(samples: &[f32]) -> String {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        bytes.extend_from_slice(&quantize_sample(*sample).to_le_bytes());
    }
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Decode a transport frame back to normalized float samples.
pub fn decode_wire_frame(encoded: &str) -> Result<Vec<f32>> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| anyhow::anyhow!("invalid base64 audio payload: {}", e))?;

    if bytes.len() % 2 != 0 {
        bail!("PCM payload has odd byte length: {}", bytes.len());
    }

    let mut samples = Vec::with_capacity(bytes.len() / 2);
    for chunk in bytes.chunks_exact(2) {
        let value = i16::from_le_bytes([chunk[0], chunk[1]]);
        samples.push(value as f32 / 32768.0);
    }

    Ok(samples)
}
