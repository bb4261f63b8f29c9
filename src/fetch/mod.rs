pub mod tseq;

use std::fmt;
use std::io::{self, Read};
use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::Client;
use tracing::{debug, info};

use crate::cache::{self, SequenceCache};
use crate::config::EutilsConfig;
use crate::error::NucError;
use crate::progress::Progress;
use crate::types::{Download, SequenceRecord};

/// Both request modes ask for FASTA content.
const RETTYPE: &str = "fasta";

/// Response encoding requested from efetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetMode {
    /// TSeq XML; parsed in memory by [`Fetcher::fetch`].
    Xml,
    /// Plain FASTA; streamed to the cache by [`Fetcher::download`].
    Text,
}

impl RetMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Xml => "xml",
            Self::Text => "text",
        }
    }
}

/// Parameters of a single efetch call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EfetchQuery {
    pub db: String,
    pub id: String,
    pub retmode: RetMode,
}

impl EfetchQuery {
    /// Query-string pairs in the order efetch documents them.
    #[must_use]
    pub fn params(&self) -> [(&'static str, &str); 4] {
        [
            ("db", self.db.as_str()),
            ("id", self.id.as_str()),
            ("rettype", RETTYPE),
            ("retmode", self.retmode.as_str()),
        ]
    }
}

impl fmt::Display for EfetchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.params().iter().enumerate() {
            if i > 0 {
                f.write_str("&")?;
            }
            write!(f, "{key}={value}")?;
        }
        Ok(())
    }
}

/// What came back from the retrieval service, before any interpretation.
pub struct RetrievalResponse {
    pub status: u16,
    /// Declared `Content-Length`, if the service sent one.
    pub content_length: Option<u64>,
    pub body: Box<dyn Read + Send>,
}

impl RetrievalResponse {
    /// Convenience for in-memory bodies.
    #[must_use]
    pub fn from_bytes(status: u16, body: impl Into<Vec<u8>>) -> Self {
        let body = body.into();
        Self {
            status,
            content_length: Some(body.len() as u64),
            body: Box::new(std::io::Cursor::new(body)),
        }
    }
}

/// The external document-retrieval service. Implementations only transport;
/// status handling and parsing stay in [`Fetcher`].
pub trait Retriever: Send + Sync {
    fn retrieve(&self, query: &EfetchQuery) -> Result<RetrievalResponse, NucError>;
}

impl<R: Retriever + ?Sized> Retriever for Arc<R> {
    fn retrieve(&self, query: &EfetchQuery) -> Result<RetrievalResponse, NucError> {
        (**self).retrieve(query)
    }
}

impl<R: Retriever + ?Sized> Retriever for &R {
    fn retrieve(&self, query: &EfetchQuery) -> Result<RetrievalResponse, NucError> {
        (**self).retrieve(query)
    }
}

/// NCBI E-utilities over HTTPS, blocking.
pub struct HttpRetriever {
    client: Client,
    base_url: String,
}

impl HttpRetriever {
    pub fn new(config: &EutilsConfig) -> Result<Self, NucError> {
        let timeout = (config.timeout_secs > 0).then(|| Duration::from_secs(config.timeout_secs));
        let client = Client::builder()
            .user_agent(concat!("nucsearch/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| NucError::Transport {
                url: config.base_url.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }
}

impl Retriever for HttpRetriever {
    fn retrieve(&self, query: &EfetchQuery) -> Result<RetrievalResponse, NucError> {
        debug!(url = %self.base_url, %query, "efetch request");
        let response = self
            .client
            .get(&self.base_url)
            .query(&query.params())
            .send()
            .map_err(|e| NucError::Transport {
                url: self.base_url.clone(),
                reason: e.to_string(),
            })?;

        Ok(RetrievalResponse {
            status: response.status().as_u16(),
            content_length: response.content_length(),
            body: Box::new(response),
        })
    }
}

/// Turns identifiers into sequence records via a [`Retriever`].
pub struct Fetcher<R> {
    retriever: R,
    database: String,
}

impl<R: Retriever> Fetcher<R> {
    pub fn new(retriever: R, database: impl Into<String>) -> Self {
        Self {
            retriever,
            database: database.into(),
        }
    }

    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }

    #[must_use]
    pub fn query(&self, id: &str, retmode: RetMode) -> EfetchQuery {
        EfetchQuery {
            db: self.database.clone(),
            id: id.to_string(),
            retmode,
        }
    }

    /// Live fetch: request TSeq XML and pull out the sequence text.
    pub fn fetch(&self, id: &str) -> Result<SequenceRecord, NucError> {
        let query = self.query(id, RetMode::Xml);
        info!(id, db = %self.database, "fetching sequence");

        let mut response = self.retriever.retrieve(&query)?;
        ensure_success(response.status)?;

        let mut body = Vec::new();
        response
            .body
            .read_to_end(&mut body)
            .map_err(|e| NucError::Transport {
                url: query.to_string(),
                reason: e.to_string(),
            })?;

        let sequence = tseq::extract_sequence(&body)?;
        debug!(id, len = sequence.len(), "parsed sequence");
        Ok(SequenceRecord::new(id, sequence))
    }

    /// Make sure `cache` holds a FASTA artifact for `id`. An existing entry
    /// is reused without contacting the service.
    pub fn download(
        &self,
        id: &str,
        cache: &dyn SequenceCache,
        progress: &Progress,
    ) -> Result<Download, NucError> {
        if cache.has(id) {
            info!(id, "cache entry present, skipping download");
            return Ok(Download::Cached);
        }

        let query = self.query(id, RetMode::Text);
        info!(id, db = %self.database, "downloading sequence");

        let response = self.retriever.retrieve(&query)?;
        ensure_success(response.status)?;

        let bar = progress.bar(&cache::file_name(id), response.content_length);
        let mut reader = BodyReader::new(bar.wrap_read(response.body));
        let written = cache.put_reader(id, &mut reader);
        bar.finish_and_clear();

        // A broken body surfaces through the cache write; report it as transport.
        if let Some(reason) = reader.failure {
            return Err(NucError::Transport {
                url: query.to_string(),
                reason,
            });
        }
        let bytes = written?;
        info!(id, bytes, "download complete");
        Ok(Download::Fetched { bytes })
    }
}

/// Response body that remembers its first read failure, so a network error
/// can be told apart from a failed cache write.
struct BodyReader<R> {
    inner: R,
    failure: Option<String>,
}

impl<R: Read> BodyReader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            failure: None,
        }
    }
}

impl<R: Read> Read for BodyReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf).inspect_err(|e| {
            if e.kind() != io::ErrorKind::Interrupted && self.failure.is_none() {
                self.failure = Some(e.to_string());
            }
        })
    }
}

fn ensure_success(status: u16) -> Result<(), NucError> {
    if (200..300).contains(&status) {
        Ok(())
    } else {
        Err(NucError::Fetch { status })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::DiskCache;
    use crate::error::ErrorKind;
    use std::sync::Mutex;

    /// Replays canned responses and records every query it sees.
    struct Canned {
        status: u16,
        body: &'static str,
        seen: Mutex<Vec<EfetchQuery>>,
    }

    impl Canned {
        fn new(status: u16, body: &'static str) -> Self {
            Self {
                status,
                body,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<EfetchQuery> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl Retriever for Canned {
        fn retrieve(&self, query: &EfetchQuery) -> Result<RetrievalResponse, NucError> {
            self.seen.lock().unwrap().push(query.clone());
            Ok(RetrievalResponse::from_bytes(self.status, self.body))
        }
    }

    const TSEQ: &str = r#"<?xml version="1.0"?>
        <TSeqSet>
            <TSeq>
                <TSeq_sequence>AGCTAGCTAGCTAGCT</TSeq_sequence>
            </TSeq>
        </TSeqSet>"#;

    #[test]
    fn fetch_returns_sequence_text_exactly() {
        let fetcher = Fetcher::new(Canned::new(200, TSEQ), "nucleotide");
        let record = fetcher.fetch("123456").unwrap();
        assert_eq!(record.id, "123456");
        assert_eq!(record.sequence, "AGCTAGCTAGCTAGCT");
    }

    #[test]
    fn fetch_requests_xml_fasta_from_configured_database() {
        let retriever = Canned::new(200, TSEQ);
        let fetcher = Fetcher::new(&retriever, "nuccore");
        fetcher.fetch("123456").unwrap();

        let calls = retriever.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].params(),
            [
                ("db", "nuccore"),
                ("id", "123456"),
                ("rettype", "fasta"),
                ("retmode", "xml"),
            ]
        );
        assert_eq!(
            calls[0].to_string(),
            "db=nuccore&id=123456&rettype=fasta&retmode=xml"
        );
    }

    #[test]
    fn non_success_status_is_fetch_error_with_code() {
        let fetcher = Fetcher::new(Canned::new(404, ""), "nucleotide");
        let err = fetcher.fetch("123456").unwrap_err();
        assert!(matches!(err, NucError::Fetch { status: 404 }));
        assert!(err.to_string().contains("404"), "{err}");
        assert!(err.to_string().contains("Failed to fetch data"), "{err}");
    }

    #[test]
    fn malformed_body_is_parse_error() {
        let fetcher = Fetcher::new(Canned::new(200, "<invalid_xml>"), "nucleotide");
        let err = fetcher.fetch("123456").unwrap_err();
        assert!(matches!(err, NucError::Parse { .. }), "{err}");
        assert!(err.to_string().contains("Failed to parse the XML response"));
    }

    #[test]
    fn download_streams_text_mode_into_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        let retriever = Canned::new(200, ">gi|1 test\nAATCGA\nAGCT\n");
        let fetcher = Fetcher::new(&retriever, "nucleotide");

        let outcome = fetcher
            .download("1", &cache, &Progress::hidden())
            .unwrap();
        assert_eq!(outcome, Download::Fetched { bytes: 23 });
        assert_eq!(retriever.calls()[0].retmode, RetMode::Text);
        assert_eq!(
            cache.get("1").unwrap().as_deref(),
            Some(&b">gi|1 test\nAATCGA\nAGCT\n"[..])
        );
    }

    #[test]
    fn download_skips_request_when_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        cache.put("1", b">old\nACGT\n").unwrap();
        let retriever = Canned::new(500, "");
        let fetcher = Fetcher::new(&retriever, "nucleotide");

        let outcome = fetcher
            .download("1", &cache, &Progress::hidden())
            .unwrap();
        assert_eq!(outcome, Download::Cached);
        assert!(retriever.calls().is_empty());
        assert_eq!(cache.get("1").unwrap().as_deref(), Some(&b">old\nACGT\n"[..]));
    }

    /// Answers 200, then fails partway through the body.
    struct Stalling;

    struct StallingBody {
        sent: bool,
    }

    impl Read for StallingBody {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.sent {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "body read timed out"));
            }
            self.sent = true;
            let chunk = b">gi|1\nAATC";
            buf[..chunk.len()].copy_from_slice(chunk);
            Ok(chunk.len())
        }
    }

    impl Retriever for Stalling {
        fn retrieve(&self, _: &EfetchQuery) -> Result<RetrievalResponse, NucError> {
            Ok(RetrievalResponse {
                status: 200,
                content_length: Some(4096),
                body: Box::new(StallingBody { sent: false }),
            })
        }
    }

    #[test]
    fn interrupted_body_is_transport_error_and_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        let fetcher = Fetcher::new(Stalling, "nucleotide");

        let err = fetcher
            .download("1", &cache, &Progress::hidden())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Fetch);
        assert!(matches!(err, NucError::Transport { .. }), "{err}");
        assert!(err.to_string().contains("timed out"), "{err}");
        assert!(!cache.has("1"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn failed_download_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        let fetcher = Fetcher::new(Canned::new(503, "busy"), "nucleotide");

        let err = fetcher
            .download("1", &cache, &Progress::hidden())
            .unwrap_err();
        assert!(matches!(err, NucError::Fetch { status: 503 }));
        assert!(!cache.has("1"));
    }
}
