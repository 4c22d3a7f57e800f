//! The WebRTC primitives the adapter drives.
//!
//! A runtime supplies these (a browser binding, a native WebRTC stack, ...).
//! The adapter only relies on the contract below: one event channel, one
//! receive-capable audio transceiver, and transport events delivered in order
//! on a single channel.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::capture::AudioTrack;

/// Label of the event channel the remote endpoint expects.
pub const EVENT_CHANNEL_LABEL: &str = "oai-events";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl PeerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeerState::New => "new",
            PeerState::Connecting => "connecting",
            PeerState::Connected => "connected",
            PeerState::Disconnected => "disconnected",
            PeerState::Failed => "failed",
            PeerState::Closed => "closed",
        }
    }
}

/// Ready state of the event channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Open,
    Closing,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    PeerStateChanged(PeerState),
    ChannelOpened,
    ChannelClosed,
    ChannelError(String),
    /// One text frame received on the event channel.
    ChannelMessage(String),
    RemoteAudioTrack { id: String },
}

pub type TransportRx = mpsc::Receiver<TransportEvent>;

/// Handle for an outbound track attached to a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackSender(pub String);

#[async_trait]
pub trait PeerConnectionFactory: Send + Sync {
    /// Creates a connection with one receive-capable audio transceiver and one
    /// event channel named `label`. Transport events for the connection arrive
    /// in order on the returned receiver.
    async fn create(
        &self,
        label: &str,
        capacity: usize,
    ) -> anyhow::Result<(Arc<dyn PeerConnection>, TransportRx)>;
}

#[async_trait]
pub trait PeerConnection: Send + Sync {
    /// Creates an offer, installs it as the local description and returns its SDP.
    async fn create_offer(&self) -> anyhow::Result<String>;

    /// Installs the remote answer SDP.
    async fn apply_answer(&self, sdp: &str) -> anyhow::Result<()>;

    fn channel_state(&self) -> ChannelState;

    /// Sends one text frame on the event channel.
    fn send(&self, text: &str) -> anyhow::Result<()>;

    fn add_track(&self, track: &mut dyn AudioTrack) -> anyhow::Result<TrackSender>;

    fn remove_track(&self, sender: TrackSender) -> anyhow::Result<()>;

    fn close_channel(&self);

    fn close(&self);
}
