//! Microphone and speaker backed by the host's audio devices.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::capture::{AudioTrack, MediaSource};
use crate::playback::{AudioChunk, AudioSink};
use crate::utils::audio::resample;
use crate::utils::stream::{InputStream, OutputStream};

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Captures from an input device. A fresh stream is opened per acquisition.
#[derive(Debug, Clone)]
pub struct CpalMicrophone {
    device: Option<String>,
    capacity: usize,
}

impl CpalMicrophone {
    pub fn new() -> Self {
        Self {
            device: None,
            capacity: 1024,
        }
    }

    pub fn with_device(mut self, name: &str) -> Self {
        self.device = Some(name.to_string());
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}

impl Default for CpalMicrophone {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaSource for CpalMicrophone {
    async fn acquire(&self) -> anyhow::Result<Box<dyn AudioTrack>> {
        let device = self.device.clone();
        let capacity = self.capacity;
        let stream =
            tokio::task::spawn_blocking(move || InputStream::open(device.as_deref(), capacity))
                .await??;
        Ok(Box::new(CpalTrack { stream }))
    }
}

struct CpalTrack {
    stream: InputStream,
}

impl AudioTrack for CpalTrack {
    fn id(&self) -> &str {
        self.stream.name()
    }

    fn sample_rate(&self) -> u32 {
        self.stream.sample_rate()
    }

    fn take_frames(&mut self) -> Option<mpsc::Receiver<Vec<f32>>> {
        self.stream.take_frames()
    }

    fn stop(&mut self) {
        self.stream.stop();
    }
}

/// Plays decoded chunks on an output device, resampled to its rate.
pub struct CpalSpeaker {
    output: Mutex<OutputStream>,
    sample_rate: u32,
}

impl CpalSpeaker {
    pub fn open(device: Option<&str>) -> anyhow::Result<Self> {
        let output = OutputStream::open(device)?;
        let sample_rate = output.sample_rate();
        Ok(Self {
            output: Mutex::new(output),
            sample_rate,
        })
    }

    fn push(&self, samples: &[f32]) -> anyhow::Result<usize> {
        let mut output = self
            .output
            .lock()
            .map_err(|_| anyhow::anyhow!("output stream lock poisoned"))?;
        Ok(output.push(samples))
    }

    fn queued(&self) -> anyhow::Result<usize> {
        let output = self
            .output
            .lock()
            .map_err(|_| anyhow::anyhow!("output stream lock poisoned"))?;
        Ok(output.queued())
    }
}

#[async_trait]
impl AudioSink for CpalSpeaker {
    async fn play(&self, chunk: AudioChunk) -> anyhow::Result<()> {
        let samples = resample(
            chunk.samples(),
            chunk.sample_rate() as f64,
            self.sample_rate as f64,
        )?;

        let mut offset = 0;
        while offset < samples.len() {
            offset += self.push(&samples[offset..])?;
            if offset < samples.len() {
                tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
            }
        }

        while self.queued()? > 0 {
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }
        Ok(())
    }

    fn close(&self) {
        match self.output.lock() {
            Ok(mut output) => output.stop(),
            Err(_) => tracing::error!("output stream lock poisoned"),
        }
    }
}
