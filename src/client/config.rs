use std::time::Duration;

use crate::client::consts::{
    BASE_URL, DEFAULT_CAPACITY, DEFAULT_CREDENTIAL_ENDPOINT, DEFAULT_INSTRUCTIONS, DEFAULT_MODEL,
    DEFAULT_NEGOTIATION_TIMEOUT,
};
use crate::types::audio::{TranscriptionModel, Voice};
use crate::types::SessionConfig;

#[derive(Debug, Clone)]
pub struct Config {
    base_url: String,
    model: String,
    voice: Voice,
    transcription_model: TranscriptionModel,
    instructions: String,
    credential_endpoint: String,
    negotiation_timeout: Duration,
    channel_capacity: usize,
}

pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.config.base_url = base_url.to_string();
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.config.model = model.to_string();
        self
    }

    pub fn with_voice(mut self, voice: Voice) -> Self {
        self.config.voice = voice;
        self
    }

    pub fn with_transcription_model(mut self, model: TranscriptionModel) -> Self {
        self.config.transcription_model = model;
        self
    }

    pub fn with_instructions(mut self, instructions: &str) -> Self {
        self.config.instructions = instructions.to_string();
        self
    }

    pub fn with_credential_endpoint(mut self, endpoint: &str) -> Self {
        self.config.credential_endpoint = endpoint.to_string();
        self
    }

    pub fn with_negotiation_timeout(mut self, timeout: Duration) -> Self {
        self.config.negotiation_timeout = timeout;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity.max(1);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            // Voice and transcription model are fixed per adapter.
            voice: Voice::Sage,
            transcription_model: TranscriptionModel::Gpt4oMiniTranscribe,
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            credential_endpoint: DEFAULT_CREDENTIAL_ENDPOINT.to_string(),
            negotiation_timeout: DEFAULT_NEGOTIATION_TIMEOUT,
            channel_capacity: DEFAULT_CAPACITY,
        }
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn voice(&self) -> &Voice {
        &self.voice
    }

    pub fn transcription_model(&self) -> &TranscriptionModel {
        &self.transcription_model
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn credential_endpoint(&self) -> &str {
        &self.credential_endpoint
    }

    pub fn negotiation_timeout(&self) -> Duration {
        self.negotiation_timeout
    }

    pub fn channel_capacity(&self) -> usize {
        self.channel_capacity
    }

    /// The payload of the `session.update` event sent once the session is up.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::new(
            self.voice.clone(),
            self.transcription_model.clone(),
            &self.instructions,
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::new();
        assert_eq!(config.base_url(), "https://api.openai.com/v1/realtime");
        assert_eq!(config.model(), "gpt-4o-mini");
        assert_eq!(config.voice(), &Voice::Sage);
        assert_eq!(config.transcription_model().as_str(), "gpt-4o-mini-transcribe");
        assert_eq!(config.negotiation_timeout(), Duration::from_secs(15));
        assert_eq!(config.channel_capacity(), 1024);
    }

    #[test]
    fn test_builder_overrides() {
        let config = Config::builder()
            .with_base_url("http://localhost:9000/realtime")
            .with_voice(Voice::Alloy)
            .with_instructions("be brief")
            .with_channel_capacity(0)
            .build();
        assert_eq!(config.base_url(), "http://localhost:9000/realtime");
        assert_eq!(config.channel_capacity(), 1);

        let session = config.session_config();
        assert_eq!(session.voice(), &Voice::Alloy);
        assert_eq!(session.system_instruction(), "be brief");
    }
}
