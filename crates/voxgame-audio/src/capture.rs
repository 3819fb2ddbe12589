use crate::queue::ChunkProducer;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Observer, Producer};
use ringbuf::{HeapCons, HeapProd};
use voxgame_core::types::BYTES_PER_SAMPLE;
use voxgame_core::{AudioChunk, AudioError};

// ── PcmFramer ─────────────────────────────────────────────────

/// Turns arbitrarily sized callback buffers into fixed-size mono 16-bit PCM
/// chunks. Works in place: no per-callback buffers are grown.
pub struct PcmFramer {
    producer: HeapProd<i16>,
    consumer: HeapCons<i16>,
    chunk_size: usize,
    frame: Vec<i16>,
}

impl PcmFramer {
    pub fn new(chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        let (producer, consumer) = crate::create_ring_buffer(chunk_size);
        Self {
            producer,
            consumer,
            chunk_size,
            frame: vec![0; chunk_size],
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Samples waiting for a full chunk.
    pub fn pending(&self) -> usize {
        self.consumer.occupied_len()
    }

    /// Feed interleaved samples, down-mixing to mono. Every completed chunk
    /// is handed to `emit` as soon as its last frame arrives.
    pub fn push<T>(&mut self, data: &[T], channels: u16, mut emit: impl FnMut(AudioChunk))
    where
        T: Sample,
        f32: FromSample<T>,
    {
        let channels = usize::from(channels.max(1));
        for frame in data.chunks(channels) {
            let sum: f32 = frame.iter().copied().map(|s| s.to_sample::<f32>()).sum();
            // The ring holds one chunk and is drained whenever it fills.
            let _ = self.producer.try_push(to_pcm16(sum / frame.len() as f32));
            if self.producer.is_full() {
                let n = self.consumer.pop_slice(&mut self.frame);
                emit(pcm16_to_bytes(&self.frame[..n]));
            }
        }
    }
}

fn to_pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16
}

/// Little-endian byte encoding expected by LINEAR16.
pub fn pcm16_to_bytes(samples: &[i16]) -> AudioChunk {
    let mut bytes = Vec::with_capacity(samples.len() * BYTES_PER_SAMPLE);
    for s in samples {
        bytes.extend_from_slice(&s.to_le_bytes());
    }
    bytes
}

// ── CaptureNode ───────────────────────────────────────────────

/// A running input stream feeding a chunk queue. Dropping it stops capture.
/// A platform stream error closes the queue with the error recorded.
pub struct CaptureNode {
    stream: Stream,
}

impl CaptureNode {
    pub fn new(
        device: &Device,
        config: &StreamConfig,
        sample_format: SampleFormat,
        producer: ChunkProducer,
        chunk_size: usize,
    ) -> Result<Self, AudioError> {
        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(device, config, producer, chunk_size),
            SampleFormat::I16 => build_stream::<i16>(device, config, producer, chunk_size),
            SampleFormat::U16 => build_stream::<u16>(device, config, producer, chunk_size),
            SampleFormat::I32 => build_stream::<i32>(device, config, producer, chunk_size),
            other => Err(AudioError::StreamBuild(format!(
                "unsupported sample format: {other:?}"
            ))),
        }?;

        stream
            .play()
            .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?;

        Ok(Self { stream })
    }

    pub fn stop(self) {
        if let Err(e) = self.stream.pause() {
            tracing::debug!("capture stream pause failed: {}", e);
        }
    }
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    producer: ChunkProducer,
    chunk_size: usize,
) -> Result<Stream, AudioError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = config.channels;
    let mut framer = PcmFramer::new(chunk_size);
    let failures = producer.clone();

    let err_callback = move |err: cpal::StreamError| {
        tracing::error!("capture stream error: {}", err);
        failures.fail(AudioError::StreamError(err.to_string()));
    };

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                framer.push(data, channels, |chunk| {
                    // Closed queue means the source is shutting down.
                    let _ = producer.push(chunk);
                });
            },
            err_callback,
            None,
        )
        .map_err(|e| AudioError::StreamBuild(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framer_holds_partial_chunk() {
        let mut framer = PcmFramer::new(4);
        let mut emitted = Vec::new();
        framer.push(&[0.0f32, 0.0, 0.0], 1, |c| emitted.push(c));
        assert!(emitted.is_empty());
        assert_eq!(framer.pending(), 3);
    }

    #[test]
    fn test_framer_emits_fixed_size_chunks() {
        let mut framer = PcmFramer::new(2);
        let mut emitted = Vec::new();
        framer.push(&[0.0f32; 5], 1, |c| emitted.push(c));
        assert_eq!(emitted.len(), 2);
        for chunk in &emitted {
            assert_eq!(chunk.len(), 2 * BYTES_PER_SAMPLE);
        }
        assert_eq!(framer.pending(), 1);
    }

    #[test]
    fn test_framer_converts_to_little_endian_pcm16() {
        let mut framer = PcmFramer::new(3);
        let mut emitted = Vec::new();
        framer.push(&[1.0f32, -1.0, 0.0], 1, |c| emitted.push(c));
        assert_eq!(emitted.len(), 1);
        let expected: Vec<u8> = [i16::MAX, -i16::MAX, 0]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        assert_eq!(emitted[0], expected);
    }

    #[test]
    fn test_framer_clamps_out_of_range() {
        let mut framer = PcmFramer::new(2);
        let mut emitted = Vec::new();
        framer.push(&[2.0f32, -3.0], 1, |c| emitted.push(c));
        assert_eq!(emitted[0], pcm16_to_bytes(&[i16::MAX, -i16::MAX]));
    }

    #[test]
    fn test_framer_downmixes_stereo() {
        let mut framer = PcmFramer::new(2);
        let mut emitted = Vec::new();
        // Two stereo frames: (1.0, 0.0) and (-0.5, -0.5)
        framer.push(&[1.0f32, 0.0, -0.5, -0.5], 2, |c| emitted.push(c));
        assert_eq!(emitted.len(), 1);
        assert_eq!(
            emitted[0],
            pcm16_to_bytes(&[to_pcm16(0.5), to_pcm16(-0.5)])
        );
    }

    #[test]
    fn test_framer_accepts_integer_samples() {
        let mut framer = PcmFramer::new(2);
        let mut emitted = Vec::new();
        framer.push(&[i16::MIN, 0i16], 1, |c| emitted.push(c));
        assert_eq!(emitted[0], pcm16_to_bytes(&[-i16::MAX, 0]));
    }

    #[test]
    fn test_framer_splits_large_callback_without_loss() {
        let mut framer = PcmFramer::new(2);
        let mut emitted = Vec::new();
        // Nine frames in one callback: four full chunks plus one left over.
        let sample = |i: u8| f32::from(i) / 10.0;
        let data: Vec<f32> = (1..=9).map(sample).collect();
        framer.push(&data, 1, |c| emitted.push(c));

        assert_eq!(emitted.len(), 4);
        assert_eq!(framer.pending(), 1);
        assert_eq!(emitted[0], pcm16_to_bytes(&[to_pcm16(sample(1)), to_pcm16(sample(2))]));
        assert_eq!(emitted[3], pcm16_to_bytes(&[to_pcm16(sample(7)), to_pcm16(sample(8))]));

        framer.push(&[sample(10)], 1, |c| emitted.push(c));
        assert_eq!(emitted.len(), 5);
        assert_eq!(emitted[4], pcm16_to_bytes(&[to_pcm16(sample(9)), to_pcm16(sample(10))]));
        assert_eq!(framer.pending(), 0);
    }

    #[test]
    fn test_pcm16_to_bytes_empty() {
        assert!(pcm16_to_bytes(&[]).is_empty());
    }
}
