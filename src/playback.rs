use async_trait::async_trait;
use base64::Engine;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::client::Stats;
use crate::error::{Error, Result};
use crate::types::audio::PCM16_SAMPLE_RATE;

/// One decoded unit of synthesized speech, mono f32 samples.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioChunk {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Decodes a base64 PCM16 little-endian frame as sent on the event channel.
    pub fn decode(frame: &str) -> Result<Self> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(frame)
            .map_err(|e| Error::Decode(e.to_string()))?;

        if bytes.is_empty() {
            return Err(Error::Decode("empty audio frame".to_string()));
        }
        if bytes.len() % 2 != 0 {
            return Err(Error::Decode(format!(
                "PCM16 frame has odd length {}",
                bytes.len()
            )));
        }

        let samples = bytes
            .chunks_exact(2)
            .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]) as f32 / 32768.0)
            .collect();
        Ok(Self::new(samples, PCM16_SAMPLE_RATE))
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

/// Audio output.
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Plays one chunk, resolving once it has finished playing.
    async fn play(&self, chunk: AudioChunk) -> anyhow::Result<()>;

    /// Releases the output context.
    fn close(&self) {}
}

/// Serializes playback of decoded chunks in arrival order.
///
/// Cloning yields another handle onto the same queue.
#[derive(Clone)]
pub struct PlaybackQueue {
    tx: mpsc::UnboundedSender<AudioChunk>,
    pending: Arc<AtomicUsize>,
    stats: Arc<Mutex<Stats>>,
}

/// Owns the task that drains a [`PlaybackQueue`] into its sink.
pub struct PlaybackWorker {
    handle: JoinHandle<()>,
    sink: Arc<dyn AudioSink>,
}

/// Starts an idle queue playing into `sink`.
pub(crate) fn spawn(
    sink: Arc<dyn AudioSink>,
    stats: Arc<Mutex<Stats>>,
) -> (PlaybackQueue, PlaybackWorker) {
    let (tx, mut rx) = mpsc::unbounded_channel::<AudioChunk>();
    let pending = Arc::new(AtomicUsize::new(0));

    let worker_sink = sink.clone();
    let worker_pending = pending.clone();
    let worker_stats = stats.clone();
    let handle = tokio::spawn(async move {
        while let Some(chunk) = rx.recv().await {
            let samples = chunk.samples().len();
            let played = worker_sink.play(chunk).await;

            if let Ok(mut stats_guard) = worker_stats.lock() {
                match &played {
                    Ok(()) => stats_guard.record_chunk_played(),
                    Err(_) => stats_guard.record_chunk_skipped(),
                }
            }
            if let Err(e) = played {
                tracing::error!("failed to play audio chunk of {} samples: {}", samples, e);
            }

            if worker_pending.fetch_sub(1, Ordering::SeqCst) == 1 {
                tracing::debug!("playback queue drained");
            }
        }
    });

    (
        PlaybackQueue { tx, pending, stats },
        PlaybackWorker { handle, sink },
    )
}

impl PlaybackQueue {
    /// Decodes `frame` and appends it to the queue. A frame that fails to decode
    /// is skipped; the queue keeps playing.
    pub fn enqueue(&self, frame: &str) -> Result<()> {
        let chunk = match AudioChunk::decode(frame) {
            Ok(chunk) => chunk,
            Err(e) => {
                if let Ok(mut stats_guard) = self.stats.lock() {
                    stats_guard.record_chunk_skipped();
                }
                return Err(e);
            }
        };

        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(chunk).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            tracing::debug!("playback queue is shut down, dropping chunk");
        }
        Ok(())
    }

    /// Chunks queued or playing.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }
}

impl PlaybackWorker {
    /// Stops playback and releases the sink.
    pub fn shutdown(self) {
        self.handle.abort();
        self.sink.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{encode_pcm16, RecordingSink};

    fn frame(samples: usize) -> String {
        encode_pcm16(&vec![0.25; samples])
    }

    #[test]
    fn test_decode_pcm16() {
        let frame = base64::engine::general_purpose::STANDARD
            .encode([0x00, 0x40, 0x00, 0xc0, 0xff, 0x7f]);
        let chunk = AudioChunk::decode(&frame).unwrap();
        assert_eq!(chunk.sample_rate(), 24_000);
        assert_eq!(chunk.samples(), &[0.5, -0.5, 32767.0 / 32768.0]);
    }

    #[test]
    fn test_decode_rejects_bad_frames() {
        assert!(matches!(AudioChunk::decode("not base64!"), Err(Error::Decode(_))));
        assert!(matches!(AudioChunk::decode(""), Err(Error::Decode(_))));
        let odd = base64::engine::general_purpose::STANDARD.encode([1u8, 2, 3]);
        assert!(matches!(AudioChunk::decode(&odd), Err(Error::Decode(_))));
    }

    #[test]
    fn test_duration() {
        assert_eq!(AudioChunk::new(vec![0.0; 2400], 24_000).duration(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunks_play_in_order_without_overlap() {
        let (sink, mut played) = RecordingSink::new();
        let stats = Arc::new(Mutex::new(Stats::new()));
        let (queue, worker) = spawn(sink.clone(), stats.clone());

        // 100ms, 200ms, 50ms
        queue.enqueue(&frame(2400)).unwrap();
        queue.enqueue(&frame(4800)).unwrap();
        queue.enqueue(&frame(1200)).unwrap();
        assert!(!queue.is_idle());

        let mut records = Vec::new();
        for _ in 0..3 {
            records.push(played.recv().await.unwrap());
        }

        let order: Vec<usize> = records.iter().map(|r| r.samples).collect();
        assert_eq!(order, vec![2400, 4800, 1200]);
        for pair in records.windows(2) {
            assert!(pair[0].ended <= pair[1].started, "chunks overlapped");
        }
        for record in &records {
            assert!(record.ended > record.started);
        }

        tokio::task::yield_now().await;
        assert!(queue.is_idle());
        assert_eq!(stats.lock().unwrap().chunks_played(), 3);
        worker.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_undecodable_chunk_is_skipped() {
        let (sink, mut played) = RecordingSink::new();
        let stats = Arc::new(Mutex::new(Stats::new()));
        let (queue, worker) = spawn(sink, stats.clone());

        queue.enqueue(&frame(240)).unwrap();
        assert!(matches!(queue.enqueue("%%%"), Err(Error::Decode(_))));
        queue.enqueue(&frame(480)).unwrap();

        assert_eq!(played.recv().await.unwrap().samples, 240);
        assert_eq!(played.recv().await.unwrap().samples, 480);
        assert_eq!(stats.lock().unwrap().chunks_skipped(), 1);
        worker.shutdown();
    }

    #[tokio::test]
    async fn test_shutdown_closes_sink_once() {
        let (sink, _played) = RecordingSink::new();
        let (queue, worker) = spawn(sink.clone(), Arc::new(Mutex::new(Stats::new())));

        worker.shutdown();
        assert_eq!(sink.closes(), 1);

        tokio::task::yield_now().await;
        queue.enqueue(&frame(240)).unwrap();
    }
}
