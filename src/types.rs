use serde::Serialize;

/// One fetched record: identifier plus its flat symbol string.
/// Case is kept exactly as the repository returned it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRecord {
    pub id: String,
    pub sequence: String,
}

impl SequenceRecord {
    #[must_use]
    pub fn new(id: impl Into<String>, sequence: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sequence: sequence.into(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

/// A located occurrence of a pattern. Half-open span `[start, end)` in bytes,
/// which for nucleotide alphabets is also the symbol offset. Non-ASCII input
/// gives byte spans, not character counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchRecord {
    pub start: usize,
    pub end: usize,
    #[serde(rename = "match")]
    pub text: String,
}

impl MatchRecord {
    #[must_use]
    pub fn new(start: usize, end: usize, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }
}

/// How the batch path obtained its cached artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Download {
    /// A file for this identifier already existed; no request was made.
    Cached,
    /// Fetched from the repository and written to the cache.
    Fetched { bytes: u64 },
}
