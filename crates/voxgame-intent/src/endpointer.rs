use serde::Deserialize;
use voxgame_core::types::BYTES_PER_SAMPLE;

/// Energy windows per second of audio.
const WINDOWS_PER_SECOND: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// RMS level, on a 0.0 to 1.0 scale, that counts as speech.
    pub silence_threshold: f32,
    /// Quiet time after speech that closes the utterance.
    pub trailing_silence_ms: u64,
    /// Hard cap on an utterance, measured from the first speech.
    pub max_utterance_ms: u64,
    /// Audio kept from before the first speech.
    pub preroll_ms: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            silence_threshold: 0.015,
            trailing_silence_ms: 800,
            max_utterance_ms: 10_000,
            preroll_ms: 300,
        }
    }
}

/// Finds the end of a single spoken utterance in mono 16-bit PCM and keeps
/// its audio. Silence before the first speech is trimmed to the pre-roll.
#[derive(Debug)]
pub struct Endpointer {
    config: EndpointConfig,
    sample_rate: u32,
    audio: Vec<u8>,
    heard_speech: bool,
    utterance_ms: u64,
    silence_ms: u64,
    ended: bool,
}

impl Endpointer {
    pub fn new(config: EndpointConfig, sample_rate: u32) -> Self {
        Self {
            config,
            sample_rate: sample_rate.max(WINDOWS_PER_SECOND),
            audio: Vec::new(),
            heard_speech: false,
            utterance_ms: 0,
            silence_ms: 0,
            ended: false,
        }
    }

    pub fn heard_speech(&self) -> bool {
        self.heard_speech
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn audio(&self) -> &[u8] {
        &self.audio
    }

    pub fn into_audio(self) -> Vec<u8> {
        self.audio
    }

    /// Feed one chunk. Returns `true` once the utterance is over; audio
    /// pushed after that is ignored.
    pub fn push(&mut self, chunk: &[u8]) -> bool {
        if self.ended {
            return true;
        }
        let window_bytes = self.window_bytes();
        let window_ms = 1000 / u64::from(WINDOWS_PER_SECOND);

        for window in chunk.chunks(window_bytes) {
            let loud = rms(window) >= self.config.silence_threshold;
            let ms = window_ms * window.len() as u64 / window_bytes as u64;
            self.audio.extend_from_slice(window);

            if !self.heard_speech {
                if !loud {
                    self.trim_preroll();
                    continue;
                }
                self.heard_speech = true;
            }

            self.utterance_ms += ms;
            if loud {
                self.silence_ms = 0;
            } else {
                self.silence_ms += ms;
            }
            if self.silence_ms >= self.config.trailing_silence_ms
                || self.utterance_ms >= self.config.max_utterance_ms
            {
                self.ended = true;
                return true;
            }
        }
        false
    }

    fn window_bytes(&self) -> usize {
        (self.sample_rate / WINDOWS_PER_SECOND) as usize * BYTES_PER_SAMPLE
    }

    fn trim_preroll(&mut self) {
        let keep = self.config.preroll_ms as usize * self.sample_rate as usize / 1000
            * BYTES_PER_SAMPLE;
        if self.audio.len() > keep {
            let excess = self.audio.len() - keep;
            self.audio.drain(..excess);
        }
    }
}

/// Root mean square of little-endian 16-bit samples, scaled to 0.0..=1.0.
pub fn rms(pcm: &[u8]) -> f32 {
    let samples = pcm.len() / BYTES_PER_SAMPLE;
    if samples == 0 {
        return 0.0;
    }
    let sum: f64 = pcm
        .chunks_exact(BYTES_PER_SAMPLE)
        .map(|b| {
            let s = f64::from(i16::from_le_bytes([b[0], b[1]])) / f64::from(i16::MAX);
            s * s
        })
        .sum();
    (sum / samples as f64).sqrt() as f32
}
