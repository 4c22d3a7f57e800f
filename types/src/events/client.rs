use crate::session::SessionConfig;

/// `session.update` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SessionUpdateEvent {
    /// The session configuration to apply
    session: SessionConfig,
}

impl SessionUpdateEvent {
    pub fn new(session: SessionConfig) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &SessionConfig {
        &self.session
    }
}

/// `text.message` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TextMessageEvent {
    /// The user's typed message
    text: String,
}

impl TextMessageEvent {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}
