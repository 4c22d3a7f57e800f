use crate::audio::{TranscriptionModel, Voice};

/// Session configuration carried by a `session.update` event.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SessionConfig {
    /// The voice the model uses to respond.
    voice: Voice,

    /// The model used to transcribe input audio.
    transcribe_model: TranscriptionModel,

    /// System instruction describing the assistant's behaviour and tone.
    system_instruction: String,
}

impl SessionConfig {
    pub fn new(
        voice: Voice,
        transcribe_model: TranscriptionModel,
        system_instruction: &str,
    ) -> Self {
        Self {
            voice,
            transcribe_model,
            system_instruction: system_instruction.to_string(),
        }
    }

    pub fn voice(&self) -> &Voice {
        &self.voice
    }

    pub fn transcribe_model(&self) -> &TranscriptionModel {
        &self.transcribe_model
    }

    pub fn system_instruction(&self) -> &str {
        &self.system_instruction
    }
}
