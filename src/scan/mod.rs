pub mod fasta;

use std::borrow::Cow;

use regex::{Regex, RegexBuilder};
use tracing::debug;

use crate::error::NucError;
use crate::types::MatchRecord;

pub use fasta::flatten_fasta;

/// How a pattern string is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanOptions {
    pub ignore_case: bool,
    /// Match the pattern text verbatim; regex metacharacters lose their meaning.
    pub literal: bool,
}

/// A compiled pattern, reusable across sequences.
#[derive(Debug, Clone)]
pub struct Scanner {
    pattern: String,
    regex: Regex,
}

impl Scanner {
    pub fn compile(pattern: &str, options: ScanOptions) -> Result<Self, NucError> {
        let source: Cow<'_, str> = if options.literal {
            Cow::Owned(regex_syntax::escape(pattern))
        } else {
            Cow::Borrowed(pattern)
        };

        let regex = RegexBuilder::new(&source)
            .case_insensitive(options.ignore_case)
            .build()
            .map_err(|e| NucError::Pattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// The pattern as the caller wrote it.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Leftmost-first, non-overlapping scan: each search resumes at the end
    /// of the previous match. Zero-length matches carry no symbols and are
    /// dropped, so every record has `end > start`.
    #[must_use]
    pub fn scan(&self, text: &str) -> Vec<MatchRecord> {
        let matches: Vec<MatchRecord> = self
            .regex
            .find_iter(text)
            .filter(|m| !m.is_empty())
            .map(|m| MatchRecord::new(m.start(), m.end(), m.as_str()))
            .collect();
        debug!(
            pattern = %self.pattern,
            len = text.len(),
            matches = matches.len(),
            "scan complete"
        );
        matches
    }
}

/// Compile `pattern` with default options and scan `text` once.
pub fn scan(text: &str, pattern: &str) -> Result<Vec<MatchRecord>, NucError> {
    Ok(Scanner::compile(pattern, ScanOptions::default())?.scan(text))
}
