/// FASTA record marker. Lines starting with it are headers, never sequence.
pub const HEADER_MARKER: char = '>';

/// Flatten FASTA text into one symbol string: header lines are dropped and
/// every other line is concatenated with all whitespace removed.
///
/// Best-effort: any number of headers and blank lines are tolerated, so a
/// multi-record file yields its records concatenated.
#[must_use]
pub fn flatten_fasta(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines().filter(|l| !l.starts_with(HEADER_MARKER)) {
        out.extend(line.chars().filter(|c| !c.is_whitespace()));
    }
    out
}

/// Number of header lines, used to flag multi-record input.
#[must_use]
pub fn header_count(text: &str) -> usize {
    text.lines().filter(|l| l.starts_with(HEADER_MARKER)).count()
}
