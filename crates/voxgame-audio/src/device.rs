use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host, SampleFormat, SampleRate, StreamConfig, SupportedStreamConfigRange};
use voxgame_core::AudioError;

pub struct DeviceManager {
    host: Host,
}

impl DeviceManager {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    pub fn list_input_devices(&self) -> Result<Vec<(String, Device)>, AudioError> {
        let devices = self
            .host
            .input_devices()
            .map_err(|e| AudioError::DeviceEnumeration(e.to_string()))?;

        let mut result = Vec::new();
        for device in devices {
            let name = device
                .name()
                .unwrap_or_else(|_| "unknown".to_string());
            result.push((name, device));
        }
        Ok(result)
    }

    pub fn get_input_device(&self, name: &str) -> Result<Device, AudioError> {
        if name == "default" {
            return self
                .host
                .default_input_device()
                .ok_or_else(|| AudioError::DeviceNotFound("no default input device".to_string()));
        }

        let devices = self.list_input_devices()?;
        for (dev_name, device) in devices {
            if dev_name == name {
                return Ok(device);
            }
        }
        Err(AudioError::DeviceNotFound(format!(
            "input device not found: {}",
            name
        )))
    }
}

impl Default for DeviceManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Stream settings chosen for a capture device.
#[derive(Debug, Clone)]
pub struct CaptureFormat {
    pub config: StreamConfig,
    pub sample_format: SampleFormat,
}

/// Pick an input configuration that runs at exactly `sample_rate`.
pub fn select_input_format(device: &Device, sample_rate: u32) -> Result<CaptureFormat, AudioError> {
    let ranges: Vec<SupportedStreamConfigRange> = device
        .supported_input_configs()
        .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?
        .collect();

    let range = best_range(&ranges, sample_rate).ok_or_else(|| {
        AudioError::DeviceUnavailable(format!(
            "no input configuration supports {} Hz",
            sample_rate
        ))
    })?;

    let supported = range.clone().with_sample_rate(SampleRate(sample_rate));
    Ok(CaptureFormat {
        sample_format: supported.sample_format(),
        config: supported.config(),
    })
}

/// Prefer mono, then float samples, among the capturable ranges covering
/// `sample_rate`.
fn best_range(
    ranges: &[SupportedStreamConfigRange],
    sample_rate: u32,
) -> Option<&SupportedStreamConfigRange> {
    ranges
        .iter()
        .filter(|r| {
            r.min_sample_rate() <= SampleRate(sample_rate)
                && r.max_sample_rate() >= SampleRate(sample_rate)
                && matches!(
                    r.sample_format(),
                    SampleFormat::F32 | SampleFormat::I16 | SampleFormat::U16 | SampleFormat::I32
                )
        })
        .min_by_key(|r| {
            (
                r.channels() != 1,
                r.sample_format() != SampleFormat::F32,
                r.channels(),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpal::SupportedBufferSize;

    fn range(channels: u16, min: u32, max: u32, format: SampleFormat) -> SupportedStreamConfigRange {
        SupportedStreamConfigRange::new(
            channels,
            SampleRate(min),
            SampleRate(max),
            SupportedBufferSize::Unknown,
            format,
        )
    }

    #[test]
    fn test_best_range_prefers_mono() {
        let ranges = vec![
            range(2, 8000, 48000, SampleFormat::F32),
            range(1, 8000, 48000, SampleFormat::I16),
        ];
        let best = best_range(&ranges, 16000).unwrap();
        assert_eq!(best.channels(), 1);
    }

    #[test]
    fn test_best_range_prefers_float_among_mono() {
        let ranges = vec![
            range(1, 8000, 48000, SampleFormat::I16),
            range(1, 8000, 48000, SampleFormat::F32),
        ];
        let best = best_range(&ranges, 16000).unwrap();
        assert_eq!(best.sample_format(), SampleFormat::F32);
    }

    #[test]
    fn test_best_range_requires_sample_rate() {
        let ranges = vec![range(1, 44100, 48000, SampleFormat::F32)];
        assert!(best_range(&ranges, 16000).is_none());
    }

    #[test]
    fn test_best_range_skips_uncapturable_formats() {
        let ranges = vec![
            range(1, 8000, 48000, SampleFormat::U8),
            range(2, 8000, 48000, SampleFormat::I16),
        ];
        let best = best_range(&ranges, 16000).unwrap();
        assert_eq!(best.sample_format(), SampleFormat::I16);
        assert!(best_range(&ranges[..1], 16000).is_none());
    }

    #[test]
    fn test_best_range_falls_back_to_stereo() {
        let ranges = vec![
            range(1, 44100, 44100, SampleFormat::F32),
            range(2, 16000, 16000, SampleFormat::I16),
        ];
        let best = best_range(&ranges, 16000).unwrap();
        assert_eq!(best.channels(), 2);
    }

    #[test]
    #[ignore] // Requires audio hardware
    fn test_device_enumeration() {
        let manager = DeviceManager::new();
        let inputs = manager.list_input_devices().unwrap();
        println!("Input devices: {}", inputs.len());
        for (name, _) in &inputs {
            println!("  - {}", name);
        }
    }
}
