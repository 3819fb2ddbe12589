use crate::capture::CaptureNode;
use crate::device::{select_input_format, DeviceManager};
use crate::queue::{ChunkQueue, Chunks};
use cpal::traits::DeviceTrait;
use cpal::Device;
use voxgame_core::AudioError;

/// A microphone feeding a [`ChunkQueue`].
///
/// The capture stream is not `Send` on every platform, so the source stays
/// on the thread that opened it; other threads work through [`queue`](Self::queue).
pub struct AudioSource {
    queue: ChunkQueue,
    capture: Option<CaptureNode>,
    device_name: String,
}

impl AudioSource {
    /// Open `device_name` (or `"default"`) at `sample_rate`, delivering
    /// `chunk_size`-frame chunks.
    pub fn open(device_name: &str, sample_rate: u32, chunk_size: usize) -> Result<Self, AudioError> {
        let manager = DeviceManager::new();
        let device = manager
            .get_input_device(device_name)
            .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?;
        Self::open_device(&device, sample_rate, chunk_size)
    }

    pub fn open_device(device: &Device, sample_rate: u32, chunk_size: usize) -> Result<Self, AudioError> {
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
        let format = select_input_format(device, sample_rate)?;
        let queue = ChunkQueue::new();

        let capture = CaptureNode::new(
            device,
            &format.config,
            format.sample_format,
            queue.producer(),
            chunk_size,
        )
        .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?;

        tracing::info!(
            device = %device_name,
            sample_rate,
            channels = format.config.channels,
            sample_format = ?format.sample_format,
            chunk_size,
            "audio source opened"
        );

        Ok(Self {
            queue,
            capture: Some(capture),
            device_name,
        })
    }

    /// Shared handle to the captured chunks.
    pub fn queue(&self) -> ChunkQueue {
        self.queue.clone()
    }

    pub fn chunks(&self) -> Chunks {
        self.queue.chunks()
    }

    pub fn pause(&self) {
        self.queue.pause();
    }

    pub fn resume(&self) {
        self.queue.resume();
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn is_open(&self) -> bool {
        self.capture.is_some()
    }

    /// The stream error that ended capture, if the device failed.
    pub fn failure(&self) -> Option<AudioError> {
        self.queue.failure()
    }

    /// Stop capture, release the device and end every chunk sequence.
    pub fn close(&mut self) {
        if let Some(capture) = self.capture.take() {
            capture.stop();
            tracing::info!(device = %self.device_name, "audio source closed");
        }
        self.queue.close();
    }
}

impl Drop for AudioSource {
    fn drop(&mut self) {
        self.close();
    }
}
