/// Failures surfaced by the voice session adapter.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to fetch credential: {0}")]
    CredentialFetch(String),
    #[error("credential response is malformed: {0}")]
    CredentialFormat(String),
    #[error("credential expires too soon to be used (expires_at={expires_at}, now={now})")]
    CredentialExpired { expires_at: u64, now: u64 },
    #[error("negotiation failed: {0}")]
    Negotiation(String),
    #[error("microphone unavailable: {0}")]
    MicrophoneAccess(String),
    #[error("event channel is not open")]
    ChannelSend,
    #[error("failed to decode audio frame: {0}")]
    Decode(String),
    #[error("a session is already open")]
    AlreadyOpen,
    #[error("not connected")]
    NotConnected,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
