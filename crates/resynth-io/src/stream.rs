//! Real-time host via cpal.
//!
//! [`CpalHost`] opens an output stream (plus an input stream for live mode),
//! moves the [`AudioCallback`] into the output closure and blocks until the
//! [`StopHandle`] is raised. Live input reaches the output closure through a
//! lock-free sample queue that is pre-filled with silence.
//!
//! When the streams are dropped the callback travels back to the calling
//! thread, where `teardown` runs outside the audio thread.

use crate::host::{AudioBlock, AudioCallback, HostConfig, StopHandle};
use crate::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Host};
use crossbeam_channel::{Sender, bounded};
use std::time::Duration;

/// Input queue depth in blocks.
const INPUT_QUEUE_BLOCKS: usize = 16;

/// How often the blocking `run` loop checks the stop flag.
const STOP_POLL: Duration = Duration::from_millis(50);

/// Extract device name via `description()` (cpal 0.17+).
pub(crate) fn device_name(device: &Device) -> std::result::Result<String, cpal::DeviceNameError> {
    device.description().map(|d| d.name().to_string())
}

/// Audio device information.
#[derive(Debug, Clone)]
pub struct AudioDevice {
    /// Human-readable device name.
    pub name: String,
    /// Whether the device supports audio input.
    pub is_input: bool,
    /// Whether the device supports audio output.
    pub is_output: bool,
    /// Default sample rate in Hz.
    pub default_sample_rate: u32,
}

/// Real-time stream configuration.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Sample rate in Hz; the output device's default when `None`.
    pub sample_rate: Option<u32>,
    /// Frames per callback block.
    pub block_size: u32,
    /// Input device name or index (default device if `None`).
    pub input_device: Option<String>,
    /// Output device name or index (default device if `None`).
    pub output_device: Option<String>,
    /// Output channel count; the output device's default when `None`.
    pub output_channels: Option<u16>,
    /// Open an input stream and feed it to the callback.
    pub live_input: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: None,
            block_size: 256,
            input_device: None,
            output_device: None,
            output_channels: None,
            live_input: false,
        }
    }
}

/// List all available audio devices.
pub fn list_devices() -> Result<Vec<AudioDevice>> {
    let host = cpal::default_host();
    let mut devices = Vec::new();

    if let Ok(inputs) = host.input_devices() {
        for device in inputs {
            if let Ok(name) = device_name(&device) {
                let sample_rate = device
                    .default_input_config()
                    .map(|c| c.sample_rate())
                    .unwrap_or(48000);
                devices.push(AudioDevice {
                    name,
                    is_input: true,
                    is_output: device.default_output_config().is_ok(),
                    default_sample_rate: sample_rate,
                });
            }
        }
    }

    if let Ok(outputs) = host.output_devices() {
        for device in outputs {
            let Ok(name) = device_name(&device) else {
                continue;
            };
            if devices.iter().any(|d| d.name == name) {
                continue;
            }
            let sample_rate = device
                .default_output_config()
                .map(|c| c.sample_rate())
                .unwrap_or(48000);
            devices.push(AudioDevice {
                name,
                is_input: false,
                is_output: true,
                default_sample_rate: sample_rate,
            });
        }
    }

    Ok(devices)
}

/// Default input and output devices, if any.
pub fn default_device() -> Result<(Option<AudioDevice>, Option<AudioDevice>)> {
    let host = cpal::default_host();

    let input = host.default_input_device().and_then(|d| {
        device_name(&d).ok().map(|name| AudioDevice {
            name,
            is_input: true,
            is_output: false,
            default_sample_rate: d
                .default_input_config()
                .map(|c| c.sample_rate())
                .unwrap_or(48000),
        })
    });

    let output = host.default_output_device().and_then(|d| {
        device_name(&d).ok().map(|name| AudioDevice {
            name,
            is_input: false,
            is_output: true,
            default_sample_rate: d
                .default_output_config()
                .map(|c| c.sample_rate())
                .unwrap_or(48000),
        })
    });

    Ok((input, output))
}

/// Real-time host driving an [`AudioCallback`] from cpal streams.
pub struct CpalHost {
    input_device: Option<Device>,
    output_device: Device,
    host_config: HostConfig,
}

impl CpalHost {
    /// Resolve devices and stream parameters.
    pub fn new(config: &StreamConfig) -> Result<Self> {
        let host = cpal::default_host();

        let output_device = match &config.output_device {
            Some(name) => find_output_device(&host, name)?,
            None => host.default_output_device().ok_or(Error::NoDevice)?,
        };
        let output_default = output_device
            .default_output_config()
            .map_err(|e| Error::Stream(e.to_string()))?;

        let input_device = if config.live_input {
            Some(match &config.input_device {
                Some(name) => find_input_device(&host, name)?,
                None => host.default_input_device().ok_or(Error::NoDevice)?,
            })
        } else {
            None
        };
        let input_channels = match &input_device {
            Some(device) => device
                .default_input_config()
                .map(|c| usize::from(c.channels()))
                .unwrap_or(1),
            None => 0,
        };

        let host_config = HostConfig {
            sample_rate: config.sample_rate.unwrap_or(output_default.sample_rate()),
            input_channels,
            output_channels: usize::from(
                config.output_channels.unwrap_or(output_default.channels()),
            ),
            block_size: config.block_size.max(1) as usize,
        };

        tracing::info!(
            host = host.id().name(),
            output = device_name(&output_device).unwrap_or_default(),
            input = input_device
                .as_ref()
                .and_then(|d| device_name(d).ok())
                .unwrap_or_default(),
            sample_rate = host_config.sample_rate,
            block_size = host_config.block_size,
            "cpal host ready"
        );

        Ok(Self {
            input_device,
            output_device,
            host_config,
        })
    }

    /// Parameters the callback will be initialized with.
    pub fn host_config(&self) -> HostConfig {
        self.host_config
    }

    /// Run `callback` until `stop` is raised. Blocks the calling thread.
    ///
    /// Returns the callback after `teardown` has run.
    pub fn run<C: AudioCallback + 'static>(&self, mut callback: C, stop: &StopHandle) -> Result<C> {
        let config = self.host_config;
        if !callback.init(&config) {
            let reason = callback
                .init_failure()
                .unwrap_or_else(|| "callback rejected the host configuration".to_string());
            return Err(Error::InitFailed(reason));
        }

        let block_size = config.block_size;
        let in_ch = config.input_channels;
        let out_ch = config.output_channels;

        let (sample_tx, sample_rx) = bounded::<f32>((block_size * in_ch.max(1) * INPUT_QUEUE_BLOCKS).max(1));
        let mut input_stream = None;
        if let Some(device) = &self.input_device {
            // Two blocks of latency so the output side never starts empty
            for _ in 0..block_size * in_ch * 2 {
                let _ = sample_tx.try_send(0.0);
            }
            let stream_config = cpal::StreamConfig {
                channels: in_ch as u16,
                sample_rate: config.sample_rate,
                buffer_size: cpal::BufferSize::Fixed(block_size as u32),
            };
            let stream = device
                .build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        for &sample in data {
                            let _ = sample_tx.try_send(sample);
                        }
                    },
                    |err| tracing::error!(error = %err, "input stream error"),
                    None,
                )
                .map_err(|e| Error::Stream(e.to_string()))?;
            input_stream = Some(stream);
        }

        let (return_tx, return_rx) = bounded::<C>(1);
        let mut guard = ReturnOnDrop {
            callback: Some(callback),
            tx: return_tx,
        };
        let mut input = vec![0.0f32; block_size * in_ch];
        let audio_stop = stop.clone();

        let stream_config = cpal::StreamConfig {
            channels: out_ch as u16,
            sample_rate: config.sample_rate,
            buffer_size: cpal::BufferSize::Fixed(block_size as u32),
        };
        let output_stream = self
            .output_device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    data.fill(0.0);
                    let Some(callback) = guard.callback.as_mut() else {
                        return;
                    };
                    for chunk in data.chunks_mut(block_size * out_ch) {
                        if audio_stop.is_stop_requested() {
                            return;
                        }
                        let frames = chunk.len() / out_ch;
                        let input = &mut input[..frames * in_ch];
                        for sample in input.iter_mut() {
                            *sample = sample_rx.try_recv().unwrap_or(0.0);
                        }
                        let mut block = AudioBlock::new(input, in_ch, chunk, out_ch, &audio_stop);
                        callback.process(&mut block);
                    }
                },
                |err| tracing::error!(error = %err, "output stream error"),
                None,
            )
            .map_err(|e| Error::Stream(e.to_string()))?;

        if let Some(stream) = &input_stream {
            stream.play().map_err(|e| Error::Stream(e.to_string()))?;
        }
        output_stream
            .play()
            .map_err(|e| Error::Stream(e.to_string()))?;
        tracing::info!("audio running");

        while !stop.is_stop_requested() {
            std::thread::sleep(STOP_POLL);
        }

        drop(output_stream);
        drop(input_stream);
        let mut callback = return_rx
            .recv_timeout(Duration::from_secs(1))
            .map_err(|_| Error::Stream("audio callback was not released by the stream".to_string()))?;
        callback.teardown();
        tracing::info!("audio stopped");
        Ok(callback)
    }
}

/// Hands the callback back to the controlling thread when the stream closure
/// is dropped.
struct ReturnOnDrop<C> {
    callback: Option<C>,
    tx: Sender<C>,
}

impl<C> Drop for ReturnOnDrop<C> {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            let _ = self.tx.try_send(callback);
        }
    }
}

/// Find an input device by exact name, partial name, or index.
fn find_input_device(host: &Host, name_or_index: &str) -> Result<Device> {
    let devices: Vec<_> = host
        .input_devices()
        .map_err(|e| Error::Stream(e.to_string()))?
        .collect();
    find_device_from_list(&devices, name_or_index, "input")
}

/// Find an output device by exact name, partial name, or index.
fn find_output_device(host: &Host, name_or_index: &str) -> Result<Device> {
    let devices: Vec<_> = host
        .output_devices()
        .map_err(|e| Error::Stream(e.to_string()))?
        .collect();
    find_device_from_list(&devices, name_or_index, "output")
}

/// Find a device from a list by index, exact name, or case-insensitive
/// partial match.
fn find_device_from_list(devices: &[Device], name_or_index: &str, kind: &str) -> Result<Device> {
    if let Ok(index) = name_or_index.parse::<usize>() {
        return devices.get(index).cloned().ok_or_else(|| {
            Error::DeviceNotFound(format!(
                "{kind} device index {index} (only {} devices available)",
                devices.len()
            ))
        });
    }

    if let Some(device) = devices
        .iter()
        .find(|d| device_name(d).is_ok_and(|n| n == name_or_index))
    {
        return Ok(device.clone());
    }

    let search = name_or_index.to_lowercase();
    let matches: Vec<(&Device, String)> = devices
        .iter()
        .filter_map(|d| {
            device_name(d)
                .ok()
                .filter(|name| name.to_lowercase().contains(&search))
                .map(|name| (d, name))
        })
        .collect();

    match matches.as_slice() {
        [] => Err(Error::DeviceNotFound(format!(
            "no {kind} device matching '{name_or_index}'"
        ))),
        [(device, _)] => Ok((*device).clone()),
        [(device, first), ..] => {
            let names: Vec<_> = matches.iter().map(|(_, n)| n.as_str()).collect();
            tracing::warn!(
                search = name_or_index,
                kind,
                ?names,
                "multiple devices match, using {first}"
            );
            Ok((*device).clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_devices() {
        // Device availability depends on the system; only check it doesn't fail
        assert!(list_devices().is_ok());
    }

    #[test]
    fn test_default_device() {
        assert!(default_device().is_ok());
    }

    #[test]
    fn test_find_in_empty_list() {
        assert!(matches!(
            find_device_from_list(&[], "0", "output"),
            Err(Error::DeviceNotFound(msg)) if msg.contains("only 0 devices")
        ));
        assert!(matches!(
            find_device_from_list(&[], "USB", "input"),
            Err(Error::DeviceNotFound(msg)) if msg.contains("'USB'")
        ));
    }

    #[test]
    fn test_callback_returned_on_drop() {
        let (tx, rx) = bounded::<u32>(1);
        let guard = ReturnOnDrop {
            callback: Some(7),
            tx,
        };
        drop(guard);
        assert_eq!(rx.try_recv(), Ok(7));
    }

    #[test]
    fn test_stream_config_default() {
        let config = StreamConfig::default();
        assert!(!config.live_input);
        assert_eq!(config.block_size, 256);
        assert!(config.sample_rate.is_none());
    }
}
