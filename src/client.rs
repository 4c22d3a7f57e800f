use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::capture::{Capture, MediaSource};
use crate::credential::{
    Clock, Credential, CredentialProvider, HttpTokenSource, SystemClock, TokenSource,
};
use crate::dispatcher::{Dispatcher, ReleaseGate, SessionHandlers};
use crate::error::{Error, Result};
use crate::playback::{self, AudioSink, PlaybackQueue, PlaybackWorker};
use crate::state::{ConnectionState, Transitions};
use crate::transport::{ChannelState, PeerConnection, PeerConnectionFactory, EVENT_CHANNEL_LABEL};
use crate::types;

mod config;
mod consts;
mod stats;
mod utils;

pub use config::{Config, ConfigBuilder};
pub use stats::Stats;

/// Everything one open session holds. Released exactly once.
struct ActiveSession {
    peer: Arc<dyn PeerConnection>,
    transitions: Transitions,
    capture: Option<Capture>,
    dispatch: JoinHandle<()>,
    gate: ReleaseGate,
    queue: Option<PlaybackQueue>,
    playback: Option<PlaybackWorker>,
}

impl ActiveSession {
    fn release(self) {
        // No transitions or callbacks from the dispatcher past this point.
        self.gate.close();
        self.dispatch.abort();
        if let Some(capture) = self.capture {
            capture.stop(self.peer.as_ref());
        }
        self.peer.close_channel();
        self.peer.close();
        if let Some(playback) = self.playback {
            playback.shutdown();
        }
        tracing::debug!("session resources released");
    }
}

/// The realtime voice session adapter. Holds at most one session at a time.
pub struct Client {
    config: Config,
    http: reqwest::Client,
    clock: Arc<dyn Clock>,
    peers: Arc<dyn PeerConnectionFactory>,
    media: Arc<dyn MediaSource>,
    sink: Option<Arc<dyn AudioSink>>,
    state: Arc<watch::Sender<ConnectionState>>,
    handlers: Option<Arc<dyn SessionHandlers>>,
    session: Option<ActiveSession>,
    stats: Arc<Mutex<Stats>>,
}

impl Client {
    pub fn new(
        config: Config,
        peers: Arc<dyn PeerConnectionFactory>,
        media: Arc<dyn MediaSource>,
    ) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            clock: Arc::new(SystemClock),
            peers,
            media,
            sink: None,
            state: Arc::new(watch::channel(ConnectionState::Idle).0),
            handlers: None,
            session: None,
            stats: Arc::new(Mutex::new(Stats::new())),
        }
    }

    /// Plays `response.audio.delta` frames received on the event channel.
    /// Without a sink those frames are dropped.
    pub fn with_audio_sink(mut self, sink: Arc<dyn AudioSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn stats(&self) -> Stats {
        match self.stats.lock() {
            Ok(stats_guard) => stats_guard.clone(),
            Err(_) => {
                tracing::error!("failed to get stats");
                Stats::default()
            }
        }
    }

    pub fn is_listening(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.capture.is_some())
    }

    /// Whether synthesized audio is queued or playing.
    pub fn is_playing(&self) -> bool {
        self.session
            .as_ref()
            .and_then(|session| session.queue.as_ref())
            .is_some_and(|queue| !queue.is_idle())
    }

    /// Fetches a credential through `provider` and opens a session with it.
    pub async fn initialize<S: TokenSource>(
        &mut self,
        provider: &CredentialProvider<S>,
        handlers: Arc<dyn SessionHandlers>,
    ) -> Result<()> {
        self.release_ended_session();
        if self.session.is_some() {
            return Err(Error::AlreadyOpen);
        }

        let transitions = self.adopt(handlers.clone());
        transitions.apply(ConnectionState::Connecting, None);

        let credential = match provider.get_credential().await {
            Ok(credential) => credential,
            Err(e) => return Err(fail(&transitions, e)),
        };
        self.open(&credential, handlers).await
    }

    /// Negotiates a session with the remote endpoint. Resolves once the
    /// transport is connected, or with the failure that left the adapter in
    /// the error state.
    pub async fn open(
        &mut self,
        credential: &Credential,
        handlers: Arc<dyn SessionHandlers>,
    ) -> Result<()> {
        self.release_ended_session();
        if self.session.is_some() {
            return Err(Error::AlreadyOpen);
        }

        let transitions = self.adopt(handlers);
        transitions.apply(ConnectionState::Connecting, None);

        let now = self.clock.now();
        if !credential.is_usable_at(now) {
            return Err(fail(
                &transitions,
                Error::CredentialExpired {
                    expires_at: credential.expires_at(),
                    now,
                },
            ));
        }

        let timeout = self.config.negotiation_timeout();
        let deadline = tokio::time::Instant::now() + timeout;

        let created = tokio::time::timeout_at(
            deadline,
            self.peers
                .create(EVENT_CHANNEL_LABEL, self.config.channel_capacity()),
        )
        .await;
        let (peer, events) = match created {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => {
                return Err(fail(
                    &transitions,
                    Error::Negotiation(format!("failed to create peer connection: {}", e)),
                ))
            }
            Err(_) => return Err(fail(&transitions, timed_out(timeout))),
        };

        let (queue, worker) = match &self.sink {
            Some(sink) => {
                let (queue, worker) = playback::spawn(sink.clone(), self.stats.clone());
                (Some(queue), Some(worker))
            }
            None => (None, None),
        };

        let mut state_rx = self.state.subscribe();
        let gate = ReleaseGate::default();
        let dispatcher = Dispatcher::new(
            peer.clone(),
            transitions.clone(),
            self.config.session_config(),
            queue.clone(),
            self.stats.clone(),
            gate.clone(),
        );
        let dispatch = tokio::spawn(dispatcher.run(events));

        self.session = Some(ActiveSession {
            peer: peer.clone(),
            transitions: transitions.clone(),
            capture: None,
            dispatch,
            gate,
            queue,
            playback: worker,
        });

        let established = tokio::time::timeout_at(
            deadline,
            self.establish(peer.as_ref(), credential, &mut state_rx),
        )
        .await;

        match established {
            Ok(Ok(())) => {
                tracing::info!("session open, model={}", self.config.model());
                Ok(())
            }
            Ok(Err(e)) => {
                self.release_session();
                Err(fail(&transitions, e))
            }
            Err(_) => {
                self.release_session();
                Err(fail(&transitions, timed_out(timeout)))
            }
        }
    }

    async fn establish(
        &self,
        peer: &dyn PeerConnection,
        credential: &Credential,
        state_rx: &mut watch::Receiver<ConnectionState>,
    ) -> Result<()> {
        let offer = peer
            .create_offer()
            .await
            .map_err(|e| Error::Negotiation(format!("failed to create offer: {}", e)))?;

        let answer = utils::exchange_offer(&self.http, &self.config, credential, &offer).await?;

        peer.apply_answer(&answer)
            .await
            .map_err(|e| Error::Negotiation(format!("failed to apply answer: {}", e)))?;
        tracing::debug!("remote answer applied, waiting for transport");

        let state = *state_rx
            .wait_for(|state| *state != ConnectionState::Connecting)
            .await
            .map_err(|_| Error::Negotiation("session state channel closed".to_string()))?;

        if state.is_active() {
            Ok(())
        } else {
            Err(Error::Negotiation(format!("transport ended in state {}", state)))
        }
    }

    /// Tears the session down and moves to `closed`. Safe from any state; every
    /// resource is released exactly once no matter how often this is called.
    pub fn close_connection(&mut self) {
        let transitions = self.transitions();
        self.release_session();

        match transitions {
            Some(transitions) => {
                transitions.apply(ConnectionState::Closed, None);
            }
            None => {
                self.state.send_if_modified(|state| {
                    let changed = *state != ConnectionState::Closed;
                    *state = ConnectionState::Closed;
                    changed
                });
            }
        }
    }

    /// Closes the current session, if any, and opens a new one with the same
    /// handlers. Never happens on its own.
    pub async fn reconnect(&mut self, credential: &Credential) -> Result<()> {
        let handlers = self.handlers.clone().ok_or(Error::NotConnected)?;
        tracing::info!("reconnecting");
        self.close_connection();
        self.open(credential, handlers).await
    }

    /// Acquires the microphone and attaches it to the session. Returns
    /// `Ok(false)` if a track is already attached.
    pub async fn start_listening(&mut self) -> Result<bool> {
        let session = self.session.as_mut().ok_or(Error::NotConnected)?;
        if !session.transitions.current().is_active() {
            return Err(Error::NotConnected);
        }
        if session.capture.is_some() {
            return Ok(false);
        }

        let capture = Capture::start(self.media.as_ref(), session.peer.as_ref()).await?;
        session.capture = Some(capture);
        Ok(true)
    }

    /// Detaches and releases the microphone. Returns `false` if nothing was attached.
    pub fn stop_listening(&mut self) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        match session.capture.take() {
            Some(capture) => {
                capture.stop(session.peer.as_ref());
                true
            }
            None => false,
        }
    }

    /// Sends a typed user message. Returns `false` when the event channel is not
    /// open; the state is left to the events that follow.
    pub fn send_text_message(&self, text: &str) -> bool {
        let event = types::ClientEvent::TextMessage(
            types::events::client::TextMessageEvent::new(text),
        );
        match self.send_client_event(&event) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("text message not sent: {}", e);
                false
            }
        }
    }

    fn send_client_event(&self, event: &types::ClientEvent) -> Result<()> {
        let session = self.session.as_ref().ok_or(Error::ChannelSend)?;
        if session.peer.channel_state() != ChannelState::Open
            || !session.transitions.current().is_active()
        {
            return Err(Error::ChannelSend);
        }

        let text = serde_json::to_string(event).map_err(|e| {
            tracing::error!("failed to serialize event: {}", e);
            Error::ChannelSend
        })?;
        session.peer.send(&text).map_err(|e| {
            tracing::error!("failed to send message: {}", e);
            Error::ChannelSend
        })
    }

    fn adopt(&mut self, handlers: Arc<dyn SessionHandlers>) -> Transitions {
        self.handlers = Some(handlers.clone());
        Transitions::new(self.state.clone(), handlers)
    }

    fn transitions(&self) -> Option<Transitions> {
        match &self.session {
            Some(session) => Some(session.transitions.clone()),
            None => self
                .handlers
                .clone()
                .map(|handlers| Transitions::new(self.state.clone(), handlers)),
        }
    }

    /// Drops a session the transport has already ended, so a new one can open.
    fn release_ended_session(&mut self) {
        let ended = self
            .session
            .as_ref()
            .is_some_and(|session| session.transitions.current().is_terminal());
        if ended {
            tracing::info!("releasing ended session, state={}", self.state());
            self.release_session();
        }
    }

    fn release_session(&mut self) {
        if let Some(session) = self.session.take() {
            session.release();
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.release_session();
    }
}

fn fail(transitions: &Transitions, error: Error) -> Error {
    tracing::error!("{}", error);
    transitions.apply(ConnectionState::Error, Some(&error.to_string()));
    error
}

fn timed_out(timeout: std::time::Duration) -> Error {
    Error::Negotiation(format!("timed out after {:?}", timeout))
}

/// Builds a client from `config`, fetches a credential from its credential
/// endpoint and opens a session.
pub async fn connect(
    config: Config,
    peers: Arc<dyn PeerConnectionFactory>,
    media: Arc<dyn MediaSource>,
    handlers: Arc<dyn SessionHandlers>,
) -> Result<Client> {
    let provider = CredentialProvider::new(HttpTokenSource::new(config.credential_endpoint()));
    let mut client = Client::new(config, peers, media);
    client.initialize(&provider, handlers).await?;
    Ok(client)
}
