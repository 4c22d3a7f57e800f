//! Input and output streams on dedicated threads.
//!
//! A `cpal::Stream` is not `Send`, so each stream is built and kept alive on a
//! thread of its own; the handles here only carry channels and can move
//! between tasks freely.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FrameCount, StreamConfig};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::HeapProd;
use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;
use tokio::sync::mpsc;

use crate::audio::{downmix, shared_buffer};
use crate::device::{get_or_default_input, get_or_default_output};

pub const INPUT_CHUNK_SIZE: usize = 1024;
pub const OUTPUT_CHUNK_SIZE: usize = 1024;
pub const OUTPUT_LATENCY_MS: usize = 1000;

struct StreamThread {
    stop: Option<std_mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl StreamThread {
    /// Runs `build` on a new thread and keeps what it returns alive until stopped.
    fn spawn<S, T, F>(build: F) -> anyhow::Result<(Self, T)>
    where
        F: FnOnce() -> anyhow::Result<(S, T)> + Send + 'static,
        T: Send + 'static,
    {
        let (ready_tx, ready_rx) = std_mpsc::channel::<anyhow::Result<T>>();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();

        let thread = std::thread::spawn(move || {
            let stream = match build() {
                Ok((stream, ready)) => {
                    let _ = ready_tx.send(Ok(ready));
                    stream
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            // Either a stop signal or the handle being dropped ends the stream.
            let _ = stop_rx.recv();
            drop(stream);
        });

        let ready = ready_rx
            .recv()
            .map_err(|_| anyhow::anyhow!("stream thread exited during setup"))??;
        Ok((
            Self {
                stop: Some(stop_tx),
                thread: Some(thread),
            },
            ready,
        ))
    }

    fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("stream thread panicked");
            }
        }
    }
}

impl Drop for StreamThread {
    fn drop(&mut self) {
        self.stop();
    }
}

/// A running microphone stream delivering mono frames.
pub struct InputStream {
    name: String,
    sample_rate: u32,
    frames: Option<mpsc::Receiver<Vec<f32>>>,
    thread: StreamThread,
}

impl InputStream {
    /// Opens `device_name` (or the default input) and starts capturing. Blocks
    /// until the device is running.
    pub fn open(device_name: Option<&str>, capacity: usize) -> anyhow::Result<Self> {
        let (frames_tx, frames_rx) = mpsc::channel(capacity.max(1));
        let device_name = device_name.map(str::to_string);

        let (thread, (name, sample_rate)) =
            StreamThread::spawn(move || build_input(device_name.as_deref(), frames_tx))?;
        tracing::info!("input: device={:?}, sample_rate={}", name, sample_rate);

        Ok(Self {
            name,
            sample_rate,
            frames: Some(frames_rx),
            thread,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn take_frames(&mut self) -> Option<mpsc::Receiver<Vec<f32>>> {
        self.frames.take()
    }

    /// Stops the stream and releases the device. Idempotent.
    pub fn stop(&mut self) {
        self.thread.stop();
    }
}

fn build_input(
    device_name: Option<&str>,
    frames: mpsc::Sender<Vec<f32>>,
) -> anyhow::Result<(cpal::Stream, (String, u32))> {
    let device = get_or_default_input(device_name)?;
    let name = device.name()?;
    let default_config = device.default_input_config()?;

    let config = StreamConfig {
        channels: default_config.channels(),
        sample_rate: default_config.sample_rate(),
        buffer_size: cpal::BufferSize::Fixed(FrameCount::from(INPUT_CHUNK_SIZE as u32)),
    };
    let channel_count = config.channels as usize;

    let input_data_fn = move |data: &[f32], _: &cpal::InputCallbackInfo| {
        if let Err(e) = frames.try_send(downmix(data, channel_count)) {
            tracing::warn!("dropping input frame: {}", e);
        }
    };
    let stream = device.build_input_stream(
        &config,
        input_data_fn,
        move |err| tracing::error!("an error occurred on input stream: {}", err),
        None,
    )?;
    stream.play()?;

    Ok((stream, (name, config.sample_rate.0)))
}

/// A running speaker stream fed through a ring buffer.
pub struct OutputStream {
    name: String,
    sample_rate: u32,
    producer: HeapProd<f32>,
    thread: StreamThread,
}

impl OutputStream {
    /// Opens `device_name` (or the default output) and starts playing silence.
    pub fn open(device_name: Option<&str>) -> anyhow::Result<Self> {
        let device_name = device_name.map(str::to_string);

        let (thread, (name, sample_rate, producer)) =
            StreamThread::spawn(move || build_output(device_name.as_deref()))?;
        tracing::info!("output: device={:?}, sample_rate={}", name, sample_rate);

        Ok(Self {
            name,
            sample_rate,
            producer,
            thread,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Queues as many samples as fit and returns how many did.
    pub fn push(&mut self, samples: &[f32]) -> usize {
        self.producer.push_slice(samples)
    }

    /// Samples queued but not yet handed to the device.
    pub fn queued(&self) -> usize {
        self.producer.occupied_len()
    }

    pub fn stop(&mut self) {
        self.thread.stop();
    }
}

fn build_output(
    device_name: Option<&str>,
) -> anyhow::Result<(cpal::Stream, (String, u32, HeapProd<f32>))> {
    let device = get_or_default_output(device_name)?;
    let name = device.name()?;
    let default_config = device.default_output_config()?;

    let config = StreamConfig {
        channels: default_config.channels(),
        sample_rate: default_config.sample_rate(),
        buffer_size: cpal::BufferSize::Fixed(FrameCount::from(OUTPUT_CHUNK_SIZE as u32)),
    };
    let channel_count = (config.channels as usize).max(1);
    let sample_rate = config.sample_rate.0;

    let buffer = shared_buffer(sample_rate as usize * OUTPUT_LATENCY_MS / 1000);
    let (producer, mut consumer) = buffer.split();

    // Same sample on every channel; silence when the buffer runs dry.
    let output_data_fn = move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
        for frame in data.chunks_mut(channel_count) {
            let sample = consumer.try_pop().unwrap_or(0.0);
            frame.fill(sample);
        }
    };
    let stream = device.build_output_stream(
        &config,
        output_data_fn,
        move |err| tracing::error!("an error occurred on output stream: {}", err),
        None,
    )?;
    stream.play()?;

    Ok((stream, (name, sample_rate, producer)))
}
