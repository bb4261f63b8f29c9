#![warn(clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions, // Rust naming conventions
    clippy::missing_errors_doc,      // error variants are self-describing
    clippy::missing_panics_doc,      // same
    clippy::must_use_candidate,      // builders and accessors
)]

pub mod batch;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod format;
pub mod paginate;
pub mod progress;
pub mod scan;
pub mod server;
pub mod types;

use error::NucError;
use fetch::{Fetcher, Retriever};
use scan::{ScanOptions, Scanner};
use types::MatchRecord;

/// The live pipeline: validate → compile pattern → fetch → scan.
/// No cache is involved; the batch path adds one in [`batch::run`].
pub fn run<R: Retriever>(
    fetcher: &Fetcher<R>,
    id: &str,
    pattern: &str,
    options: ScanOptions,
) -> Result<Vec<MatchRecord>, NucError> {
    let id = cache::validate_id(id)?;
    let scanner = Scanner::compile(pattern, options)?;
    let record = fetcher.fetch(id)?;
    Ok(scanner.scan(&record.sequence))
}
