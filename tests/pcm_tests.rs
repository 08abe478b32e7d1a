// Tests for the PCM quantization and wire encoding used on both audio
// pipelines. The provider protocol is 16-bit little-endian PCM at 24 kHz,
// base64 on the wire.

use prepvoice::audio::pcm;

/// One quantization step of the 16-bit scheme.
const STEP: f32 = 1.0 / 32768.0;

#[test]
fn test_round_trip_stays_within_one_quantization_step() {
    let boundaries = [-1.0f32, -0.5, -0.25, 0.0, 0.25, 0.5, 0.9999, 1.0];

    let pcm16 = pcm::quantize_frame(&boundaries);
    let decoded = pcm::dequantize_frame(&pcm16);

    for (original, restored) in boundaries.iter().zip(decoded.iter()) {
        let error = (original - restored).abs();
        assert!(
            error <= STEP + f32::EPSILON,
            "sample {} decoded to {} (error {} > one step)",
            original,
            restored,
            error
        );
    }
}

#[test]
fn test_extremes_map_to_the_i16_range() {
    assert_eq!(pcm::quantize_sample(1.0), i16::MAX);
    assert_eq!(pcm::quantize_sample(-1.0), i16::MIN);
    assert_eq!(pcm::quantize_sample(0.0), 0);
}

#[test]
fn test_out_of_range_samples_clamp_instead_of_wrapping() {
    assert_eq!(pcm::quantize_sample(1.5), pcm::quantize_sample(1.0));
    assert_eq!(pcm::quantize_sample(-2.0), pcm::quantize_sample(-1.0));
    assert_eq!(pcm::quantize_sample(100.0), i16::MAX);
    assert_eq!(pcm::quantize_sample(-100.0), i16::MIN);
}

#[test]
fn test_wire_frame_round_trips() {
    let samples = vec![0.0f32, 0.1, -0.1, 0.5, -0.5, 0.9999, -1.0, 1.0];

    let encoded = pcm::encode_wire_frame(&samples);
    let decoded = pcm::decode_wire_frame(&encoded).expect("valid frame");

    assert_eq!(decoded.len(), samples.len());
    for (original, restored) in samples.iter().zip(decoded.iter()) {
        assert!((original - restored).abs() <= STEP + f32::EPSILON);
    }
}

#[test]
fn test_decode_rejects_garbage() {
    assert!(pcm::decode_wire_frame("not base64!!!").is_err());

    // Three bytes cannot be 16-bit samples.
    use base64::Engine;
    let odd = base64::engine::general_purpose::STANDARD.encode([1u8, 2, 3]);
    assert!(pcm::decode_wire_frame(&odd).is_err());
}

#[test]
fn test_decode_handles_empty_payload() {
    let decoded = pcm::decode_wire_frame("").expect("empty frame is valid");
    assert!(decoded.is_empty());
}
