mod consts;

pub use consts::*;

/// Audio data encoded as base64
pub type Base64EncodedAudioBytes = String;

/// Sample rate of the PCM16 mono audio carried on the event channel.
pub const PCM16_SAMPLE_RATE: u32 = 24_000;
