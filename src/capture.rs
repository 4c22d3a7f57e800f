use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::transport::{PeerConnection, TrackSender};

/// A live microphone track.
pub trait AudioTrack: Send + Sync {
    fn id(&self) -> &str;

    fn sample_rate(&self) -> u32;

    /// Hands the captured mono frames to whoever sends them. Yields `Some` once.
    fn take_frames(&mut self) -> Option<mpsc::Receiver<Vec<f32>>>;

    /// Stops capture and releases the underlying device.
    fn stop(&mut self);
}

/// Grants access to an input device.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn acquire(&self) -> anyhow::Result<Box<dyn AudioTrack>>;
}

/// The microphone track currently attached to a session.
pub(crate) struct Capture {
    track: Box<dyn AudioTrack>,
    sender: TrackSender,
}

impl Capture {
    pub(crate) async fn start(media: &dyn MediaSource, peer: &dyn PeerConnection) -> Result<Self> {
        let mut track = media
            .acquire()
            .await
            .map_err(|e| Error::MicrophoneAccess(e.to_string()))?;

        match peer.add_track(track.as_mut()) {
            Ok(sender) => {
                tracing::info!(
                    "microphone track {} attached ({} Hz)",
                    track.id(),
                    track.sample_rate()
                );
                Ok(Self { track, sender })
            }
            Err(e) => {
                track.stop();
                Err(Error::MicrophoneAccess(format!("failed to attach audio track: {}", e)))
            }
        }
    }

    /// Detaches the track and releases the device. Consumes the capture so
    /// neither can happen twice.
    pub(crate) fn stop(mut self, peer: &dyn PeerConnection) {
        self.track.stop();
        if let Err(e) = peer.remove_track(self.sender) {
            tracing::warn!("failed to remove audio sender: {}", e);
        }
        tracing::info!("microphone track {} released", self.track.id());
    }
}
