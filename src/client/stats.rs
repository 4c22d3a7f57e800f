/// Running counters for one client, across sessions.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Stats {
    messages_received: u64,
    messages_ignored: u64,
    messages_malformed: u64,
    responses_completed: u64,
    chunks_played: u64,
    chunks_skipped: u64,
}

impl Stats {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_message(&mut self) {
        self.messages_received += 1;
    }

    pub(crate) fn record_ignored(&mut self) {
        self.messages_ignored += 1;
    }

    pub(crate) fn record_malformed(&mut self) {
        self.messages_malformed += 1;
    }

    pub(crate) fn record_response(&mut self) {
        self.responses_completed += 1;
    }

    pub(crate) fn record_chunk_played(&mut self) {
        self.chunks_played += 1;
    }

    pub(crate) fn record_chunk_skipped(&mut self) {
        self.chunks_skipped += 1;
    }

    /// Inbound event channel messages, including ignored and malformed ones.
    pub fn messages_received(&self) -> u64 {
        self.messages_received
    }

    pub fn messages_ignored(&self) -> u64 {
        self.messages_ignored
    }

    pub fn messages_malformed(&self) -> u64 {
        self.messages_malformed
    }

    pub fn responses_completed(&self) -> u64 {
        self.responses_completed
    }

    pub fn chunks_played(&self) -> u64 {
        self.chunks_played
    }

    pub fn chunks_skipped(&self) -> u64 {
        self.chunks_skipped
    }
}
