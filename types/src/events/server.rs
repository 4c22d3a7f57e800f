use crate::audio::Base64EncodedAudioBytes;

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ErrorDetails {
    #[serde(rename = "type", default)]
    error_type: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: String,
}

impl ErrorDetails {
    pub fn error_type(&self) -> Option<&str> {
        self.error_type.as_deref()
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// `error` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ErrorEvent {
    #[serde(default)]
    event_id: Option<String>,
    #[serde(default)]
    error: ErrorDetails,
}

impl ErrorEvent {
    pub fn event_id(&self) -> Option<&str> {
        self.event_id.as_deref()
    }

    pub fn error(&self) -> &ErrorDetails {
        &self.error
    }
}

/// `session.created` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SessionCreatedEvent {
    #[serde(default)]
    event_id: Option<String>,
    /// The session resource, kept opaque
    #[serde(default)]
    session: serde_json::Value,
}

impl SessionCreatedEvent {
    pub fn event_id(&self) -> Option<&str> {
        self.event_id.as_deref()
    }

    pub fn session(&self) -> &serde_json::Value {
        &self.session
    }
}

/// `session.updated` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SessionUpdatedEvent {
    #[serde(default)]
    event_id: Option<String>,
    #[serde(default)]
    session: serde_json::Value,
}

impl SessionUpdatedEvent {
    pub fn event_id(&self) -> Option<&str> {
        self.event_id.as_deref()
    }

    pub fn session(&self) -> &serde_json::Value {
        &self.session
    }
}

/// `input_audio_buffer.speech_started` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct InputAudioBufferSpeechStartedEvent {
    #[serde(default)]
    event_id: Option<String>,
    /// Milliseconds since the session started when speech was detected
    #[serde(default)]
    audio_start_ms: Option<i64>,
}

impl InputAudioBufferSpeechStartedEvent {
    pub fn event_id(&self) -> Option<&str> {
        self.event_id.as_deref()
    }

    pub fn audio_start_ms(&self) -> Option<i64> {
        self.audio_start_ms
    }
}

/// `input_audio_buffer.speech_stopped` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct InputAudioBufferSpeechStoppedEvent {
    #[serde(default)]
    event_id: Option<String>,
    /// Milliseconds since the session started when speech stopped
    #[serde(default)]
    audio_end_ms: Option<i64>,
}

impl InputAudioBufferSpeechStoppedEvent {
    pub fn event_id(&self) -> Option<&str> {
        self.event_id.as_deref()
    }

    pub fn audio_end_ms(&self) -> Option<i64> {
        self.audio_end_ms
    }
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct TranscriptDelta {
    #[serde(default)]
    text: Option<String>,
}

/// `response.audio_transcript.delta` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ResponseAudioTranscriptDeltaEvent {
    #[serde(default)]
    event_id: Option<String>,
    #[serde(default)]
    delta: Option<TranscriptDelta>,
}

impl ResponseAudioTranscriptDeltaEvent {
    pub fn event_id(&self) -> Option<&str> {
        self.event_id.as_deref()
    }

    /// The transcript fragment, if the message carried one.
    pub fn text(&self) -> Option<&str> {
        self.delta.as_ref().and_then(|d| d.text.as_deref())
    }
}

/// `response.audio.started` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ResponseAudioStartedEvent {
    #[serde(default)]
    event_id: Option<String>,
}

impl ResponseAudioStartedEvent {
    pub fn event_id(&self) -> Option<&str> {
        self.event_id.as_deref()
    }
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct AudioDelta {
    #[serde(default)]
    audio: Option<Base64EncodedAudioBytes>,
}

/// `response.audio.delta` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ResponseAudioDeltaEvent {
    #[serde(default)]
    event_id: Option<String>,
    #[serde(default)]
    delta: Option<AudioDelta>,
}

impl ResponseAudioDeltaEvent {
    pub fn event_id(&self) -> Option<&str> {
        self.event_id.as_deref()
    }

    /// The base64 PCM16 frame, if the message carried one.
    pub fn audio(&self) -> Option<&str> {
        self.delta.as_ref().and_then(|d| d.audio.as_deref())
    }
}

/// `response.audio.stopped` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ResponseAudioStoppedEvent {
    #[serde(default)]
    event_id: Option<String>,
}

impl ResponseAudioStoppedEvent {
    pub fn event_id(&self) -> Option<&str> {
        self.event_id.as_deref()
    }
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ResponseResource {
    #[serde(default)]
    text: Option<String>,
}

/// `response.done` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ResponseDoneEvent {
    #[serde(default)]
    event_id: Option<String>,
    #[serde(default)]
    response: Option<ResponseResource>,
}

impl ResponseDoneEvent {
    pub fn event_id(&self) -> Option<&str> {
        self.event_id.as_deref()
    }

    /// The full response text, if the message carried one.
    pub fn text(&self) -> Option<&str> {
        self.response.as_ref().and_then(|r| r.text.as_deref())
    }
}
