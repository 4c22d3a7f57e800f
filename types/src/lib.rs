pub mod audio;
pub mod ephemeral;
pub mod events;
pub mod session;

pub use ephemeral::EphemeralKeyResponse;
pub use events::{ClientEvent, ServerEvent};
pub use session::SessionConfig;
