use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::client::Stats;
use crate::playback::PlaybackQueue;
use crate::state::{ConnectionState, Transitions};
use crate::transport::{PeerConnection, PeerState, TransportEvent, TransportRx};
use crate::types::events::client::SessionUpdateEvent;
use crate::types::{ClientEvent, ServerEvent, SessionConfig};

/// Callbacks through which a session reports to its owner.
///
/// Invoked from the dispatch task, in the order inbound events arrive. None
/// fire once the session has been released; releasing waits for a callback
/// already in progress, so callbacks must not close the client themselves.
pub trait SessionHandlers: Send + Sync {
    fn on_state_change(&self, state: ConnectionState, detail: Option<&str>);

    /// One incremental fragment of the assistant's spoken transcript.
    fn on_transcript_delta(&self, text: &str);

    /// The full text of a finished response.
    fn on_response_complete(&self, text: &str);
}

/// Closed when the owning session is released. Held for the whole handling
/// of one event.
#[derive(Clone, Default)]
pub(crate) struct ReleaseGate(Arc<Mutex<bool>>);

impl ReleaseGate {
    pub(crate) fn close(&self) {
        *self.lock() = true;
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Applies transport events and inbound messages for one session, strictly in
/// arrival order.
pub(crate) struct Dispatcher {
    peer: Arc<dyn PeerConnection>,
    transitions: Transitions,
    session: SessionConfig,
    playback: Option<PlaybackQueue>,
    stats: Arc<Mutex<Stats>>,
    gate: ReleaseGate,
    connected: bool,
    channel_open: bool,
    configured: bool,
}

impl Dispatcher {
    pub(crate) fn new(
        peer: Arc<dyn PeerConnection>,
        transitions: Transitions,
        session: SessionConfig,
        playback: Option<PlaybackQueue>,
        stats: Arc<Mutex<Stats>>,
        gate: ReleaseGate,
    ) -> Self {
        Self {
            peer,
            transitions,
            session,
            playback,
            stats,
            gate,
            connected: false,
            channel_open: false,
            configured: false,
        }
    }

    pub(crate) async fn run(mut self, mut events: TransportRx) {
        while let Some(event) = events.recv().await {
            self.handle(event);
        }
        tracing::debug!("transport event stream ended");
    }

    pub(crate) fn handle(&mut self, event: TransportEvent) {
        let gate = self.gate.clone();
        let released = gate.lock();
        if *released {
            tracing::debug!("session released, dropping transport event");
            return;
        }
        self.dispatch(event);
    }

    fn dispatch(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::PeerStateChanged(PeerState::Connected) => {
                self.connected = true;
                self.configure_if_ready();
                self.transitions.apply(ConnectionState::Ready, None);
            }
            TransportEvent::PeerStateChanged(
                state @ (PeerState::Disconnected | PeerState::Failed | PeerState::Closed),
            ) => {
                self.connected = false;
                let detail = format!("peer connection {}", state.as_str());
                tracing::warn!("{}", detail);
                self.transitions.apply(ConnectionState::Disconnected, Some(&detail));
            }
            TransportEvent::PeerStateChanged(state) => {
                tracing::debug!("peer connection state: {}", state.as_str());
            }
            TransportEvent::ChannelOpened => {
                tracing::debug!("event channel open");
                self.channel_open = true;
                self.configure_if_ready();
            }
            TransportEvent::ChannelClosed => {
                self.channel_open = false;
                self.transitions
                    .apply(ConnectionState::Disconnected, Some("event channel closed"));
            }
            TransportEvent::ChannelError(message) => {
                tracing::error!("event channel error: {}", message);
                self.transitions.apply(ConnectionState::Error, Some(&message));
            }
            TransportEvent::ChannelMessage(text) => self.handle_message(&text),
            TransportEvent::RemoteAudioTrack { id } => {
                tracing::info!("remote audio track {} attached", id);
            }
        }
    }

    fn handle_message(&mut self, text: &str) {
        self.record(Stats::record_message);

        let event = match serde_json::from_str::<ServerEvent>(text) {
            Ok(event) => event,
            Err(e) => {
                tracing::error!("failed to deserialize event: {}, text=> {:?}", e, text);
                self.record(Stats::record_malformed);
                return;
            }
        };
        tracing::debug!("received message: {}", event.kind());

        let state = self.transitions.current();
        match event {
            ServerEvent::SessionCreated(_) | ServerEvent::SessionUpdated(_) => {}
            ServerEvent::Error(e) => {
                tracing::warn!(
                    "remote error: {} (type={}, code={})",
                    e.error().message(),
                    e.error().error_type().unwrap_or("none"),
                    e.error().code().unwrap_or("none")
                );
            }
            ServerEvent::Unknown => {
                self.record(Stats::record_ignored);
            }
            _ if !state.is_active() => {
                tracing::warn!("ignoring {} while {}", event.kind(), state);
                self.record(Stats::record_ignored);
            }
            ServerEvent::InputAudioBufferSpeechStarted(_) => {
                self.transitions.apply(ConnectionState::Listening, None);
            }
            ServerEvent::InputAudioBufferSpeechStopped(_) => {
                self.transitions.apply(ConnectionState::Processing, None);
            }
            ServerEvent::ResponseAudioTranscriptDelta(delta) => {
                if let Some(text) = delta.text() {
                    self.transitions.handlers().on_transcript_delta(text);
                }
            }
            ServerEvent::ResponseAudioStarted(_) => {
                self.transitions.apply(ConnectionState::Speaking, None);
            }
            ServerEvent::ResponseAudioDelta(delta) => match (&self.playback, delta.audio()) {
                (Some(playback), Some(frame)) => {
                    if let Err(e) = playback.enqueue(frame) {
                        tracing::warn!("skipping audio chunk: {}", e);
                    }
                }
                (None, _) => tracing::trace!("no audio sink, dropping audio delta"),
                (_, None) => tracing::warn!("audio delta without audio"),
            },
            ServerEvent::ResponseAudioStopped(_) => {
                self.transitions.apply(ConnectionState::Ready, None);
            }
            ServerEvent::ResponseDone(done) => {
                self.transitions.apply(ConnectionState::Ready, None);
                self.record(Stats::record_response);
                if let Some(text) = done.text() {
                    self.transitions.handlers().on_response_complete(text);
                }
            }
        }
    }

    /// Sends `session.update` once the transport is connected and the channel
    /// is open, whichever happens last.
    fn configure_if_ready(&mut self) {
        if self.configured || !self.connected || !self.channel_open {
            return;
        }

        let event = ClientEvent::SessionUpdate(SessionUpdateEvent::new(self.session.clone()));
        let text = match serde_json::to_string(&event) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("failed to serialize event: {}", e);
                return;
            }
        };
        match self.peer.send(&text) {
            Ok(()) => {
                self.configured = true;
                tracing::info!(
                    "session configured, voice={}, transcription={}",
                    self.session.voice(),
                    self.session.transcribe_model()
                );
            }
            Err(e) => tracing::error!("failed to send session.update: {}", e),
        }
    }

    fn record(&self, update: fn(&mut Stats)) {
        if let Ok(mut stats_guard) = self.stats.lock() {
            update(&mut stats_guard);
        } else {
            tracing::error!("failed to update stats");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{encode_pcm16, Call, FakePeer, RecordingHandlers, RecordingSink};
    use crate::transport::ChannelState;
    use tokio::sync::watch;

    struct Harness {
        dispatcher: Dispatcher,
        peer: Arc<FakePeer>,
        handlers: Arc<RecordingHandlers>,
        state: Arc<watch::Sender<ConnectionState>>,
        stats: Arc<Mutex<Stats>>,
        gate: ReleaseGate,
    }

    fn harness(initial: ConnectionState, playback: Option<PlaybackQueue>) -> Harness {
        let peer = FakePeer::new();
        let (handlers, _rx) = RecordingHandlers::new();
        let state = Arc::new(watch::channel(initial).0);
        let stats = Arc::new(Mutex::new(Stats::new()));
        let session = crate::client::Config::new().session_config();
        let gate = ReleaseGate::default();
        let dispatcher = Dispatcher::new(
            peer.clone(),
            Transitions::new(state.clone(), handlers.clone()),
            session,
            playback,
            stats.clone(),
            gate.clone(),
        );
        Harness {
            dispatcher,
            peer,
            handlers,
            state,
            stats,
            gate,
        }
    }

    fn message(json: serde_json::Value) -> TransportEvent {
        TransportEvent::ChannelMessage(json.to_string())
    }

    #[test]
    fn test_conversation_cycle() {
        let mut h = harness(ConnectionState::Ready, None);
        for kind in [
            "input_audio_buffer.speech_started",
            "input_audio_buffer.speech_stopped",
            "response.audio.started",
            "response.audio.stopped",
        ] {
            h.dispatcher.handle(message(serde_json::json!({ "type": kind })));
        }

        assert_eq!(*h.state.borrow(), ConnectionState::Ready);
        assert_eq!(
            h.handlers.calls(),
            vec![
                Call::State(ConnectionState::Listening, None),
                Call::State(ConnectionState::Processing, None),
                Call::State(ConnectionState::Speaking, None),
                Call::State(ConnectionState::Ready, None),
            ]
        );
    }

    #[test]
    fn test_transcript_and_response() {
        let mut h = harness(ConnectionState::Processing, None);
        h.dispatcher.handle(message(serde_json::json!({
            "type": "response.audio_transcript.delta",
            "delta": { "text": "hi " }
        })));
        h.dispatcher.handle(message(serde_json::json!({
            "type": "response.done",
            "response": { "text": "hi there" }
        })));

        assert_eq!(
            h.handlers.calls(),
            vec![
                Call::Transcript("hi ".to_string()),
                Call::State(ConnectionState::Ready, None),
                Call::Response("hi there".to_string()),
            ]
        );
        assert_eq!(h.stats.lock().unwrap().responses_completed(), 1);
    }

    #[test]
    fn test_malformed_and_unknown_messages_are_dropped() {
        let mut h = harness(ConnectionState::Ready, None);
        h.dispatcher.handle(TransportEvent::ChannelMessage("{not json".to_string()));
        h.dispatcher.handle(TransportEvent::ChannelMessage(r#"{"delta":{}}"#.to_string()));
        h.dispatcher.handle(message(serde_json::json!({ "type": "rate_limits.updated" })));

        assert_eq!(*h.state.borrow(), ConnectionState::Ready);
        assert!(h.handlers.calls().is_empty());

        let stats = h.stats.lock().unwrap();
        assert_eq!(stats.messages_received(), 3);
        assert_eq!(stats.messages_malformed(), 2);
        assert_eq!(stats.messages_ignored(), 1);
    }

    #[test]
    fn test_conversation_events_ignored_before_ready() {
        let mut h = harness(ConnectionState::Connecting, None);
        h.dispatcher.handle(message(serde_json::json!({
            "type": "input_audio_buffer.speech_started"
        })));
        h.dispatcher.handle(message(serde_json::json!({
            "type": "response.done",
            "response": { "text": "early" }
        })));

        assert_eq!(*h.state.borrow(), ConnectionState::Connecting);
        assert!(h.handlers.calls().is_empty());
    }

    #[test]
    fn test_session_update_sent_once_when_connected_and_open() {
        let mut h = harness(ConnectionState::Connecting, None);
        h.peer.set_channel_state(ChannelState::Open);

        h.dispatcher.handle(TransportEvent::ChannelOpened);
        assert!(h.peer.sent().is_empty());

        h.dispatcher.handle(TransportEvent::PeerStateChanged(PeerState::Connected));
        h.dispatcher.handle(TransportEvent::PeerStateChanged(PeerState::Connected));
        h.dispatcher.handle(TransportEvent::ChannelOpened);

        let sent = h.peer.sent();
        assert_eq!(sent.len(), 1);
        let json: serde_json::Value = serde_json::from_str(&sent[0]).unwrap();
        assert_eq!(json["type"], "session.update");
        assert_eq!(json["session"]["voice"], "sage");
        assert_eq!(json["session"]["transcribe_model"], "gpt-4o-mini-transcribe");

        assert_eq!(*h.state.borrow(), ConnectionState::Ready);
        assert_eq!(h.handlers.calls(), vec![Call::State(ConnectionState::Ready, None)]);
    }

    #[test]
    fn test_transport_loss_disconnects() {
        let mut h = harness(ConnectionState::Speaking, None);
        h.dispatcher.handle(TransportEvent::PeerStateChanged(PeerState::Failed));
        h.dispatcher.handle(message(serde_json::json!({
            "type": "response.audio.stopped"
        })));

        assert_eq!(*h.state.borrow(), ConnectionState::Disconnected);
        assert_eq!(
            h.handlers.calls(),
            vec![Call::State(
                ConnectionState::Disconnected,
                Some("peer connection failed".to_string())
            )]
        );
    }

    #[test]
    fn test_channel_closed_disconnects() {
        let mut h = harness(ConnectionState::Ready, None);
        h.dispatcher.handle(TransportEvent::ChannelOpened);
        h.dispatcher.handle(TransportEvent::ChannelClosed);
        h.dispatcher.handle(TransportEvent::PeerStateChanged(PeerState::Connected));
        h.dispatcher.handle(message(serde_json::json!({
            "type": "input_audio_buffer.speech_started"
        })));

        assert_eq!(*h.state.borrow(), ConnectionState::Disconnected);
        assert!(h.peer.sent().is_empty());
        assert_eq!(
            h.handlers.calls(),
            vec![Call::State(
                ConnectionState::Disconnected,
                Some("event channel closed".to_string())
            )]
        );
    }

    #[test]
    fn test_no_callbacks_after_release() {
        let mut h = harness(ConnectionState::Processing, None);
        h.gate.close();
        h.dispatcher.handle(message(serde_json::json!({
            "type": "response.audio_transcript.delta",
            "delta": { "text": "late " }
        })));
        h.dispatcher.handle(message(serde_json::json!({
            "type": "response.done",
            "response": { "text": "late reply" }
        })));
        h.dispatcher.handle(TransportEvent::ChannelError("gone".to_string()));

        assert_eq!(*h.state.borrow(), ConnectionState::Processing);
        assert!(h.handlers.calls().is_empty());
        assert_eq!(h.stats.lock().unwrap().messages_received(), 0);
    }

    #[test]
    fn test_channel_error_moves_to_error() {
        let mut h = harness(ConnectionState::Ready, None);
        h.dispatcher.handle(TransportEvent::ChannelError("sctp failure".to_string()));
        assert_eq!(
            h.handlers.calls(),
            vec![Call::State(ConnectionState::Error, Some("sctp failure".to_string()))]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_audio_delta_reaches_playback() {
        let (sink, mut played) = RecordingSink::new();
        let stats = Arc::new(Mutex::new(Stats::new()));
        let (queue, worker) = crate::playback::spawn(sink, stats);
        let mut h = harness(ConnectionState::Speaking, Some(queue));

        h.dispatcher.handle(message(serde_json::json!({
            "type": "response.audio.delta",
            "delta": { "audio": encode_pcm16(&[0.1; 480]) }
        })));
        h.dispatcher.handle(message(serde_json::json!({
            "type": "response.audio.delta",
            "delta": { "audio": "***" }
        })));

        assert_eq!(played.recv().await.unwrap().samples, 480);
        assert_eq!(*h.state.borrow(), ConnectionState::Speaking);
        worker.shutdown();
    }
}
