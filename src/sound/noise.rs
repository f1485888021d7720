//! Procedural ambient noise.
//!
//! Each tag maps to a fixed synthesis algorithm fed by a random source, so
//! the character is deterministic while the samples are not. Buffers are
//! always 2 seconds of mono audio and are looped natively by the scheduler.
//!
//! | Tag      | Algorithm                                                   |
//! |----------|-------------------------------------------------------------|
//! | `white`  | uniform random amplitude                                    |
//! | `brown`  | one-pole low-pass filtered random walk                      |
//! | `rain`   | lightly smoothed white noise with decaying droplet bursts   |
//! | `ocean`  | brown noise under a swell envelope of one period per buffer |
//! | `forest` | soft pink noise with short windowed bird chirps             |
//! | `cafe`   | brown murmur with sparse, fast-decaying cup clinks          |

use std::f32::consts::{PI, TAU};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::buffer::AudioBuffer;

/// Sample rate of generated buffers.
pub const NOISE_SAMPLE_RATE: u32 = 44_100;
/// Length of generated buffers in seconds.
pub const NOISE_SECONDS: u32 = 2;

const NOISE_LEN: usize = (NOISE_SAMPLE_RATE * NOISE_SECONDS) as usize;

/// Noise flavours understood by the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseKind {
    White,
    Brown,
    Rain,
    Ocean,
    Forest,
    Cafe,
}

impl NoiseKind {
    pub const ALL: [NoiseKind; 6] = [
        NoiseKind::White,
        NoiseKind::Brown,
        NoiseKind::Rain,
        NoiseKind::Ocean,
        NoiseKind::Forest,
        NoiseKind::Cafe,
    ];

    /// Parses a locator tag; unknown tags yield `None`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "white" | "white_noise" => Some(Self::White),
            "brown" | "brown_noise" => Some(Self::Brown),
            "rain" => Some(Self::Rain),
            "ocean" => Some(Self::Ocean),
            "forest" => Some(Self::Forest),
            "cafe" => Some(Self::Cafe),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::White => "white",
            Self::Brown => "brown",
            Self::Rain => "rain",
            Self::Ocean => "ocean",
            Self::Forest => "forest",
            Self::Cafe => "cafe",
        }
    }
}

/// Synthesizes fixed-length ambient waveforms.
#[derive(Debug)]
pub struct NoiseGenerator<R = StdRng> {
    rng: R,
}

impl NoiseGenerator<StdRng> {
    /// A generator seeded from OS entropy.
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    /// A reproducible generator, mainly for tests.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> NoiseGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Generates a 2-second mono buffer for `tag`.
    ///
    /// Unknown tags produce silence rather than an error.
    pub fn generate(&mut self, tag: &str) -> AudioBuffer {
        let samples = match NoiseKind::from_tag(tag) {
            Some(kind) => self.synthesize(kind),
            None => {
                tracing::debug!("Unknown noise tag '{}', generating silence", tag);
                vec![0.0; NOISE_LEN]
            }
        };
        AudioBuffer::new(1, NOISE_SAMPLE_RATE, samples)
    }

    fn synthesize(&mut self, kind: NoiseKind) -> Vec<f32> {
        let mut samples = match kind {
            NoiseKind::White => self.white(),
            NoiseKind::Brown => self.brown(),
            NoiseKind::Rain => self.rain(),
            NoiseKind::Ocean => self.ocean(),
            NoiseKind::Forest => self.forest(),
            NoiseKind::Cafe => self.cafe(),
        };
        for s in &mut samples {
            *s = s.clamp(-1.0, 1.0);
        }
        samples
    }

    fn sample(&mut self) -> f32 {
        self.rng.gen_range(-1.0..1.0)
    }

    fn white(&mut self) -> Vec<f32> {
        (0..NOISE_LEN).map(|_| self.sample()).collect()
    }

    fn brown(&mut self) -> Vec<f32> {
        let mut last = 0.0f32;
        (0..NOISE_LEN)
            .map(|_| {
                last = (last + 0.02 * self.sample()) / 1.02;
                last * 3.5
            })
            .collect()
    }

    fn rain(&mut self) -> Vec<f32> {
        let mut prev = 0.0f32;
        let mut drop_env = 0.0f32;
        (0..NOISE_LEN)
            .map(|_| {
                let w = self.sample();
                prev = 0.6 * w + 0.4 * prev;
                if self.rng.gen_bool(0.000_8) {
                    drop_env = self.rng.gen_range(0.4..1.0);
                }
                drop_env *= 0.995;
                prev * 0.25 + w * drop_env * 0.5
            })
            .collect()
    }

    fn ocean(&mut self) -> Vec<f32> {
        let brown = self.brown();
        brown
            .into_iter()
            .enumerate()
            .map(|(i, s)| {
                let t = i as f32 / NOISE_LEN as f32;
                // One swell per buffer keeps the loop point at the quiet trough.
                let swell = 0.15 + 0.85 * (0.5 - 0.5 * (TAU * t).cos());
                s * swell
            })
            .collect()
    }

    fn forest(&mut self) -> Vec<f32> {
        let (mut b0, mut b1, mut b2) = (0.0f32, 0.0f32, 0.0f32);
        let mut samples: Vec<f32> = (0..NOISE_LEN)
            .map(|_| {
                let w = self.sample();
                b0 = 0.997_65 * b0 + w * 0.099_046;
                b1 = 0.963 * b1 + w * 0.296_516_4;
                b2 = 0.57 * b2 + w * 1.052_691_3;
                (b0 + b1 + b2 + w * 0.184_8) * 0.06
            })
            .collect();

        let chirp_len = (NOISE_SAMPLE_RATE as usize * 80) / 1000;
        let chirps = self.rng.gen_range(2..5);
        for _ in 0..chirps {
            let start = self.rng.gen_range(0..NOISE_LEN - chirp_len);
            let freq = self.rng.gen_range(2_000.0f32..4_000.0);
            let sweep = self.rng.gen_range(0.9f32..1.2);
            for n in 0..chirp_len {
                let pos = n as f32 / chirp_len as f32;
                let window = (PI * pos).sin();
                let f = freq * (1.0 + (sweep - 1.0) * pos);
                let phase = TAU * f * n as f32 / NOISE_SAMPLE_RATE as f32;
                samples[start + n] += phase.sin() * window * 0.2;
            }
        }
        samples
    }

    fn cafe(&mut self) -> Vec<f32> {
        let mut samples: Vec<f32> = self.brown().into_iter().map(|s| s * 0.6).collect();

        let clink_len = (NOISE_SAMPLE_RATE as usize * 150) / 1000;
        let clinks = self.rng.gen_range(1..4);
        for _ in 0..clinks {
            let start = self.rng.gen_range(0..NOISE_LEN - clink_len);
            let freq = self.rng.gen_range(3_000.0f32..5_000.0);
            for n in 0..clink_len {
                let t = n as f32 / NOISE_SAMPLE_RATE as f32;
                let env = (-t * 40.0).exp();
                samples[start + n] += (TAU * freq * t).sin() * env * 0.15;
            }
        }
        samples
    }
}
