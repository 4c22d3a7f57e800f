use std::time::Duration;

pub const BASE_URL: &str = "https://api.openai.com/v1/realtime";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_CREDENTIAL_ENDPOINT: &str = "http://localhost:3000/api/ephemeral-key";

pub const DEFAULT_INSTRUCTIONS: &str = "You are the voice assistant for this portal. \
Speak in a warm, friendly and concise tone. Answer questions about the product clearly, \
keep replies short enough to be spoken comfortably, and ask a follow-up question when \
the request is ambiguous.";

pub const DEFAULT_NEGOTIATION_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_CAPACITY: usize = 1024;

pub const AUTHORIZATION_HEADER: &str = "Authorization";
pub const CONTENT_TYPE_HEADER: &str = "Content-Type";
pub const SDP_CONTENT_TYPE: &str = "application/sdp";
