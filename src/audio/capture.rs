use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use crossbeam_channel::{Receiver, Sender};
use log::{info, warn};
use std::time::Duration;

/// Boundary contract for audio input: fill `block` with mono samples
/// normalized to [-1, 1].
///
/// Returns `Ok(true)` when real samples were delivered, `Ok(false)` when the
/// source had nothing (the block is then zero-filled). Sources never deliver
/// partial blocks; shortfalls are zero-filled before returning. Errors are
/// reserved for unrecoverable source failures, not transient dropouts.
pub trait SampleSource {
    fn fill_block(&mut self, block: &mut [f32]) -> Result<bool>;
}

/// Live input capture via the default (or named) cpal input device.
///
/// The stream callback downmixes to mono and hands samples to the frame
/// loop through a channel; `fill_block` drains that channel with a bounded
/// wait so the frame loop never blocks indefinitely.
pub struct CpalSource {
    #[allow(dead_code)]
    stream: Stream,
    receiver: Receiver<Vec<f32>>,
    pending: Vec<f32>,
    timeout: Duration,
}

impl CpalSource {
    pub fn new(device_name: Option<&str>) -> Result<Self> {
        let host = cpal::default_host();

        let device = match device_name {
            Some(name) => host
                .input_devices()?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| anyhow!("Input device '{}' not found", name))?,
            None => host
                .default_input_device()
                .ok_or_else(|| anyhow!("No input device available"))?,
        };

        let config = device
            .default_input_config()
            .map_err(|e| anyhow!("Failed to get default input config: {}", e))?;

        info!(
            "Capture device: {}",
            device.name().unwrap_or_else(|_| "unnamed".to_string())
        );

        let (sender, receiver) = crossbeam_channel::unbounded();
        let stream = Self::open_stream(&device, &config.into(), sender)?;
        stream.play()?;

        Ok(Self {
            stream,
            receiver,
            pending: Vec::new(),
            timeout: Duration::from_millis(100),
        })
    }

    /// List input device names for `--list-devices`.
    pub fn device_names() -> Result<Vec<String>> {
        let host = cpal::default_host();
        Ok(host
            .input_devices()?
            .filter_map(|d| d.name().ok())
            .collect())
    }

    fn open_stream(
        device: &Device,
        config: &StreamConfig,
        sender: Sender<Vec<f32>>,
    ) -> Result<Stream> {
        let channels = config.channels as usize;
        info!(
            "Opening {}-channel capture stream at {} Hz",
            channels, config.sample_rate.0
        );

        let stream = device.build_input_stream(
            config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let downmixed: Vec<f32> = if channels == 1 {
                    data.to_vec()
                } else {
                    data.chunks(channels)
                        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                        .collect()
                };

                // A send failure means the frame loop is gone; nothing to
                // do with the block but drop it.
                let _ = sender.send(downmixed);
            },
            |err| {
                warn!("Capture stream error: {}", err);
            },
            None,
        )?;

        Ok(stream)
    }
}

impl SampleSource for CpalSource {
    fn fill_block(&mut self, block: &mut [f32]) -> Result<bool> {
        // Drain without blocking first, then wait briefly if still short.
        while self.pending.len() < block.len() {
            match self.receiver.try_recv() {
                Ok(chunk) => self.pending.extend(chunk),
                Err(_) => break,
            }
        }
        if self.pending.len() < block.len() {
            match self.receiver.recv_timeout(self.timeout) {
                Ok(chunk) => self.pending.extend(chunk),
                Err(_) => {
                    // Capture timeout is "no new data", not an error.
                    block.fill(0.0);
                    self.pending.clear();
                    return Ok(false);
                }
            }
        }

        let have = self.pending.len().min(block.len());
        block[..have].copy_from_slice(&self.pending[..have]);
        block[have..].fill(0.0);
        self.pending.drain(..have);
        Ok(true)
    }
}

/// Fallback source that delivers silence forever. Used when running without
/// an input device and as a test double.
pub struct SilenceSource;

impl SampleSource for SilenceSource {
    fn fill_block(&mut self, block: &mut [f32]) -> Result<bool> {
        block.fill(0.0);
        Ok(false)
    }
}
