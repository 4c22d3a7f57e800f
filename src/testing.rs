//! In-process fakes for the runtime seams, counting every release hook.

use async_trait::async_trait;
use base64::Engine;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::capture::{AudioTrack, MediaSource};
use crate::dispatcher::SessionHandlers;
use crate::playback::{AudioChunk, AudioSink};
use crate::state::ConnectionState;
use crate::transport::{
    ChannelState, PeerConnection, PeerConnectionFactory, PeerState, TrackSender, TransportEvent,
    TransportRx,
};

pub(crate) fn encode_pcm16(samples: &[f32]) -> String {
    let bytes: Vec<u8> = samples
        .iter()
        .flat_map(|s| ((s.clamp(-1.0, 1.0) * 32767.0) as i16).to_le_bytes())
        .collect();
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

pub(crate) struct FakePeer {
    events: Mutex<Option<mpsc::Sender<TransportEvent>>>,
    channel: Mutex<ChannelState>,
    sent: Mutex<Vec<String>>,
    connect_on_answer: bool,
    tracks_added: AtomicUsize,
    tracks_removed: AtomicUsize,
    channel_closes: AtomicUsize,
    closes: AtomicUsize,
}

impl FakePeer {
    pub(crate) fn new() -> Arc<Self> {
        Self::with_events(None, true)
    }

    fn with_events(
        events: Option<mpsc::Sender<TransportEvent>>,
        connect_on_answer: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(events),
            channel: Mutex::new(ChannelState::Connecting),
            sent: Mutex::new(Vec::new()),
            connect_on_answer,
            tracks_added: AtomicUsize::new(0),
            tracks_removed: AtomicUsize::new(0),
            channel_closes: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
        })
    }

    /// Delivers a transport event as if the runtime had raised it.
    pub(crate) fn push(&self, event: TransportEvent) {
        if let Some(tx) = self.events.lock().unwrap().as_ref() {
            let _ = tx.try_send(event);
        }
    }

    pub(crate) fn set_channel_state(&self, state: ChannelState) {
        *self.channel.lock().unwrap() = state;
    }

    pub(crate) fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn tracks_added(&self) -> usize {
        self.tracks_added.load(Ordering::SeqCst)
    }

    pub(crate) fn tracks_removed(&self) -> usize {
        self.tracks_removed.load(Ordering::SeqCst)
    }

    pub(crate) fn channel_closes(&self) -> usize {
        self.channel_closes.load(Ordering::SeqCst)
    }

    pub(crate) fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PeerConnection for FakePeer {
    async fn create_offer(&self) -> anyhow::Result<String> {
        Ok("v=0 fake-offer".to_string())
    }

    async fn apply_answer(&self, sdp: &str) -> anyhow::Result<()> {
        anyhow::ensure!(sdp.starts_with("v=0"), "not an SDP answer");
        if self.connect_on_answer {
            self.set_channel_state(ChannelState::Open);
            self.push(TransportEvent::ChannelOpened);
            self.push(TransportEvent::PeerStateChanged(PeerState::Connected));
        }
        Ok(())
    }

    fn channel_state(&self) -> ChannelState {
        *self.channel.lock().unwrap()
    }

    fn send(&self, text: &str) -> anyhow::Result<()> {
        anyhow::ensure!(self.channel_state() == ChannelState::Open, "channel not open");
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn add_track(&self, track: &mut dyn AudioTrack) -> anyhow::Result<TrackSender> {
        anyhow::ensure!(track.take_frames().is_some(), "track already attached");
        self.tracks_added.fetch_add(1, Ordering::SeqCst);
        Ok(TrackSender(track.id().to_string()))
    }

    fn remove_track(&self, _sender: TrackSender) -> anyhow::Result<()> {
        self.tracks_removed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close_channel(&self) {
        self.channel_closes.fetch_add(1, Ordering::SeqCst);
        self.set_channel_state(ChannelState::Closed);
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

pub(crate) struct FakeFactory {
    peers: Mutex<Vec<Arc<FakePeer>>>,
    connect_on_answer: bool,
}

impl FakeFactory {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            peers: Mutex::new(Vec::new()),
            connect_on_answer: true,
        })
    }

    /// Peers never reach the connected state.
    pub(crate) fn stalled() -> Arc<Self> {
        Arc::new(Self {
            peers: Mutex::new(Vec::new()),
            connect_on_answer: false,
        })
    }

    pub(crate) fn created(&self) -> usize {
        self.peers.lock().unwrap().len()
    }

    pub(crate) fn last(&self) -> Arc<FakePeer> {
        self.peers.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl PeerConnectionFactory for FakeFactory {
    async fn create(
        &self,
        _label: &str,
        capacity: usize,
    ) -> anyhow::Result<(Arc<dyn PeerConnection>, TransportRx)> {
        let (tx, rx) = mpsc::channel(capacity);
        let peer = FakePeer::with_events(Some(tx), self.connect_on_answer);
        self.peers.lock().unwrap().push(peer.clone());
        let peer: Arc<dyn PeerConnection> = peer;
        Ok((peer, rx))
    }
}

pub(crate) struct FakeTrack {
    id: String,
    frames: Option<mpsc::Receiver<Vec<f32>>>,
    stops: Arc<AtomicUsize>,
}

impl AudioTrack for FakeTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn sample_rate(&self) -> u32 {
        48_000
    }

    fn take_frames(&mut self) -> Option<mpsc::Receiver<Vec<f32>>> {
        self.frames.take()
    }

    fn stop(&mut self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub(crate) struct FakeMedia {
    deny: AtomicBool,
    acquired: AtomicUsize,
    stops: Arc<AtomicUsize>,
}

impl FakeMedia {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn deny(&self) {
        self.deny.store(true, Ordering::SeqCst);
    }

    pub(crate) fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaSource for FakeMedia {
    async fn acquire(&self) -> anyhow::Result<Box<dyn AudioTrack>> {
        anyhow::ensure!(!self.deny.load(Ordering::SeqCst), "permission denied");
        let n = self.acquired.fetch_add(1, Ordering::SeqCst);
        let (_tx, rx) = mpsc::channel(1);
        Ok(Box::new(FakeTrack {
            id: format!("mic-{}", n),
            frames: Some(rx),
            stops: self.stops.clone(),
        }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    State(ConnectionState, Option<String>),
    Transcript(String),
    Response(String),
}

pub(crate) struct RecordingHandlers {
    calls: Mutex<Vec<Call>>,
    tx: mpsc::UnboundedSender<Call>,
}

impl RecordingHandlers {
    pub(crate) fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Call>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handlers = Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            tx,
        });
        (handlers, rx)
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call.clone());
        let _ = self.tx.send(call);
    }
}

impl SessionHandlers for RecordingHandlers {
    fn on_state_change(&self, state: ConnectionState, detail: Option<&str>) {
        self.record(Call::State(state, detail.map(str::to_string)));
    }

    fn on_transcript_delta(&self, text: &str) {
        self.record(Call::Transcript(text.to_string()));
    }

    fn on_response_complete(&self, text: &str) {
        self.record(Call::Response(text.to_string()));
    }
}

#[derive(Debug, Clone)]
pub(crate) struct PlayRecord {
    pub(crate) samples: usize,
    pub(crate) started: Instant,
    pub(crate) ended: Instant,
}

/// Plays each chunk by sleeping for its duration.
pub(crate) struct RecordingSink {
    tx: mpsc::UnboundedSender<PlayRecord>,
    closes: AtomicUsize,
}

impl RecordingSink {
    pub(crate) fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<PlayRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = Arc::new(Self {
            tx,
            closes: AtomicUsize::new(0),
        });
        (sink, rx)
    }

    pub(crate) fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioSink for RecordingSink {
    async fn play(&self, chunk: AudioChunk) -> anyhow::Result<()> {
        let started = Instant::now();
        tokio::time::sleep(chunk.duration()).await;
        let _ = self.tx.send(PlayRecord {
            samples: chunk.samples().len(),
            started,
            ended: Instant::now(),
        });
        Ok(())
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}
