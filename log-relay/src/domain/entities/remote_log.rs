use serde_json::Value;

/// One relayed message, already parsed from its JSON-encoded string form
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteLogEntry {
    payload: Value,
}

impl RemoteLogEntry {
    pub fn new(payload: Value) -> Self {
        RemoteLogEntry { payload }
    }

    /// Parse one raw element of the remote sequence.
    ///
    /// Returns `None` for payloads longer than `max_chars` or that are not
    /// well-formed JSON; callers drop those entries instead of failing.
    pub fn parse(raw: &str, max_chars: usize) -> Option<Self> {
        if raw.chars().count() > max_chars {
            return None;
        }
        serde_json::from_str(raw).ok().map(RemoteLogEntry::new)
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn into_payload(self) -> Value {
        self.payload
    }
}

/// The ordered entries returned by one successful retrieval
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteLog {
    pub entries: Vec<RemoteLogEntry>,
    /// Raw elements discarded as oversized or malformed
    pub dropped: usize,
}

impl RemoteLog {
    pub fn new(entries: Vec<RemoteLogEntry>) -> Self {
        RemoteLog {
            entries,
            dropped: 0,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
