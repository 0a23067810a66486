//! Embedded alarm chime.
//!
//! The chime is synthesized once on first use: two short decaying tones
//! (A5 then E6) as 16-bit mono PCM wrapped in a WAV container, so the
//! regular decoder can play it like any file.

use std::f32::consts::TAU;
use std::sync::LazyLock;

const SAMPLE_RATE: u32 = 22_050;
const TONE_SECONDS: f32 = 0.35;
const TONES_HZ: [f32; 2] = [880.0, 1318.5];
const AMPLITUDE: f32 = 0.4;

static CHIME: LazyLock<Vec<u8>> = LazyLock::new(build_chime);

/// Returns the chime as a complete WAV file.
#[must_use]
pub fn embedded_chime() -> &'static [u8] {
    &CHIME
}

fn build_chime() -> Vec<u8> {
    let samples_per_tone = (SAMPLE_RATE as f32 * TONE_SECONDS) as usize;

    let samples: Vec<i16> = TONES_HZ
        .iter()
        .flat_map(|&freq| {
            (0..samples_per_tone).map(move |i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                let envelope = (-6.0 * t / TONE_SECONDS).exp();
                let value = (TAU * freq * t).sin() * envelope * AMPLITUDE;
                (value * f32::from(i16::MAX)) as i16
            })
        })
        .collect();

    wav_bytes(&samples)
}

fn wav_bytes(samples: &[i16]) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let byte_rate = SAMPLE_RATE * 2;

    let mut out = Vec::with_capacity(44 + samples.len() * 2);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&1u16.to_le_bytes()); // mono
    out.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes()); // block align
    out.extend_from_slice(&16u16.to_le_bytes()); // bits per sample

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
    out
}
