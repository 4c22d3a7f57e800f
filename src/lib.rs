mod capture;
mod client;
mod credential;
mod dispatcher;
mod error;
mod playback;
mod state;
mod transport;

#[cfg(feature = "utils")]
pub mod native;

#[cfg(test)]
mod testing;

pub use portal_realtime_types as types;
pub use capture::{AudioTrack, MediaSource};
pub use client::{connect, Client, Config, ConfigBuilder, Stats};
pub use credential::{
    Clock, Credential, CredentialProvider, HttpTokenSource, SystemClock, TokenSource,
    REFRESH_MARGIN_SECS,
};
pub use dispatcher::SessionHandlers;
pub use error::{Error, Result};
pub use playback::{AudioChunk, AudioSink};
pub use state::ConnectionState;
pub use transport::{
    ChannelState, PeerConnection, PeerConnectionFactory, PeerState, TrackSender, TransportEvent,
    TransportRx, EVENT_CHANNEL_LABEL,
};

#[cfg(feature = "utils")]
pub use portal_realtime_utils as utils;
