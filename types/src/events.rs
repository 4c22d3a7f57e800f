pub mod client;
pub mod server;

use client::*;
use server::*;

/// Messages sent on the event channel.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate(SessionUpdateEvent),
    #[serde(rename = "text.message")]
    TextMessage(TextMessageEvent),
}

/// Messages received on the event channel.
///
/// Kinds this crate does not know about deserialize to [`ServerEvent::Unknown`].
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "error")]
    Error(ErrorEvent),
    #[serde(rename = "session.created")]
    SessionCreated(SessionCreatedEvent),
    #[serde(rename = "session.updated")]
    SessionUpdated(SessionUpdatedEvent),
    #[serde(rename = "input_audio_buffer.speech_started")]
    InputAudioBufferSpeechStarted(InputAudioBufferSpeechStartedEvent),
    #[serde(rename = "input_audio_buffer.speech_stopped")]
    InputAudioBufferSpeechStopped(InputAudioBufferSpeechStoppedEvent),
    #[serde(rename = "response.audio_transcript.delta")]
    ResponseAudioTranscriptDelta(ResponseAudioTranscriptDeltaEvent),
    #[serde(rename = "response.audio.started")]
    ResponseAudioStarted(ResponseAudioStartedEvent),
    #[serde(rename = "response.audio.delta")]
    ResponseAudioDelta(ResponseAudioDeltaEvent),
    #[serde(rename = "response.audio.stopped")]
    ResponseAudioStopped(ResponseAudioStoppedEvent),
    #[serde(rename = "response.done")]
    ResponseDone(ResponseDoneEvent),
    #[serde(other)]
    Unknown,
}

impl ServerEvent {
    /// The wire discriminator of this event.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::Error(_) => "error",
            ServerEvent::SessionCreated(_) => "session.created",
            ServerEvent::SessionUpdated(_) => "session.updated",
            ServerEvent::InputAudioBufferSpeechStarted(_) => "input_audio_buffer.speech_started",
            ServerEvent::InputAudioBufferSpeechStopped(_) => "input_audio_buffer.speech_stopped",
            ServerEvent::ResponseAudioTranscriptDelta(_) => "response.audio_transcript.delta",
            ServerEvent::ResponseAudioStarted(_) => "response.audio.started",
            ServerEvent::ResponseAudioDelta(_) => "response.audio.delta",
            ServerEvent::ResponseAudioStopped(_) => "response.audio.stopped",
            ServerEvent::ResponseDone(_) => "response.done",
            ServerEvent::Unknown => "unknown",
        }
    }
}
