use std::io;
use std::path::Path;

use tracing::{debug, error, warn};

use crate::cache::{self, SequenceCache};
use crate::error::NucError;
use crate::fetch::{Fetcher, Retriever, tseq};
use crate::format;
use crate::progress::Progress;
use crate::scan::{Scanner, fasta};
use crate::types::{Download, MatchRecord};

/// Result of one command-line search.
#[derive(Debug)]
pub struct BatchOutcome {
    pub download: Download,
    pub matches: Vec<MatchRecord>,
}

/// Download-if-absent, then scan the cached artifact.
///
/// The pattern is compiled by the caller, so a bad pattern fails before any
/// network traffic.
pub fn run<R: Retriever>(
    fetcher: &Fetcher<R>,
    cache: &dyn SequenceCache,
    id: &str,
    scanner: &Scanner,
    progress: &Progress,
) -> Result<BatchOutcome, NucError> {
    let id = cache::validate_id(id)?;
    let download = fetcher.download(id, cache, progress)?;

    let bytes = cache.get(id)?.ok_or_else(|| NucError::Cache {
        path: cache::file_name(id).into(),
        source: io::Error::new(io::ErrorKind::NotFound, "cache entry vanished after download"),
    })?;

    let sequence = decode_artifact(&bytes)?;
    debug!(id, len = sequence.len(), "loaded cached sequence");

    Ok(BatchOutcome {
        download,
        matches: scanner.scan(&sequence),
    })
}

/// What the command line prints for one run, and how it exits.
/// `stdout` carries results only; notices and errors go to `stderr`.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Report {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    pub exit_code: i32,
}

/// Turn the result of [`run`] into output lines. When the run failed and no
/// cache file exists for `id`, the missing-file line follows the error,
/// whatever went wrong.
pub fn report(
    result: Result<BatchOutcome, NucError>,
    id: &str,
    pattern: &str,
    cache: &dyn SequenceCache,
    cache_path: &Path,
    json: bool,
) -> Report {
    let mut out = Report::default();
    match result {
        Ok(outcome) => {
            out.stderr.push(match outcome.download {
                Download::Cached => format::cached_notice(cache_path),
                Download::Fetched { bytes } => format::saved_notice(id, cache_path, bytes),
            });
            if json {
                match serde_json::to_string_pretty(&outcome.matches) {
                    Ok(text) => out.stdout.push(text),
                    Err(e) => {
                        error!(error = %e, "failed to encode matches");
                        out.stderr.push(format!("failed to encode matches as JSON: {e}"));
                        out.exit_code = 1;
                    }
                }
            } else {
                out.stdout.push(format::render_matches(pattern, &outcome.matches));
            }
        }
        Err(e) => {
            out.stderr.push(e.to_string());
            out.exit_code = e.exit_code();
            let present = cache::validate_id(id).is_ok() && cache.has(id);
            if !present {
                out.stdout.push(format::missing_cache_line(id));
            }
        }
    }
    out
}

/// Turn a cached artifact into a flat symbol string. FASTA is the normal
/// content; a TSeq XML document is accepted too.
pub fn decode_artifact(bytes: &[u8]) -> Result<String, NucError> {
    let first = bytes.iter().find(|b| !b.is_ascii_whitespace());
    if first == Some(&b'<') {
        return tseq::extract_sequence(bytes);
    }

    let text = std::str::from_utf8(bytes).map_err(|e| NucError::Parse {
        reason: format!("cached file is not UTF-8: {e}"),
    })?;
    let headers = fasta::header_count(text);
    if headers > 1 {
        warn!(headers, "cached file holds several records; scanning them concatenated");
    }
    Ok(fasta::flatten_fasta(text))
}
