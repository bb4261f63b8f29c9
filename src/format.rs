use std::fmt::Write;
use std::path::Path;

use crate::types::MatchRecord;

/// `Pattern '<match>' found at position <start> to <end>`
#[must_use]
pub fn match_line(m: &MatchRecord) -> String {
    format!(
        "Pattern '{}' found at position {} to {}",
        m.text, m.start, m.end
    )
}

/// One line per match, or the not-found line when there are none.
#[must_use]
pub fn render_matches(pattern: &str, matches: &[MatchRecord]) -> String {
    if matches.is_empty() {
        return not_found_line(pattern);
    }
    let mut out = String::with_capacity(matches.len() * 48);
    for (i, m) in matches.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = write!(out, "{}", match_line(m));
    }
    out
}

#[must_use]
pub fn not_found_line(pattern: &str) -> String {
    format!("Pattern '{pattern}' not found in the sequence.")
}

/// Printed when a download failed and no cached file exists to scan.
#[must_use]
pub fn missing_cache_line(id: &str) -> String {
    format!("File for nucleotide ID {id} does not exist after download attempt.")
}

#[must_use]
pub fn cached_notice(path: &Path) -> String {
    format!("File {} already exists. Skipping download.", path.display())
}

#[must_use]
pub fn saved_notice(id: &str, path: &Path, bytes: u64) -> String {
    format!(
        "Sequence for nucleotide ID {id} saved to {} ({})",
        path.display(),
        format_size(bytes)
    )
}

/// Service payload when the scan came back empty.
#[must_use]
pub fn no_matches_message(pattern: &str) -> String {
    format!("No matches found for pattern: {pattern}")
}

/// Human-readable byte count, integer math only.
fn format_size(bytes: u64) -> String {
    match bytes {
        b if b < 1024 => format!("{b}B"),
        b if b < 1024 * 1024 => format!("{}KB", b / 1024),
        b => format!(
            "{}.{}MB",
            b / (1024 * 1024),
            (b % (1024 * 1024)) * 10 / (1024 * 1024)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn match_lines_in_order() {
        let matches = vec![
            MatchRecord::new(0, 6, "AATCGA"),
            MatchRecord::new(10, 16, "AATCGA"),
        ];
        assert_eq!(
            render_matches("AATCGA", &matches),
            "Pattern 'AATCGA' found at position 0 to 6\n\
             Pattern 'AATCGA' found at position 10 to 16"
        );
    }

    #[test]
    fn empty_set_renders_not_found() {
        assert_eq!(
            render_matches("AATCGA", &[]),
            "Pattern 'AATCGA' not found in the sequence."
        );
    }

    #[test]
    fn notices_name_the_file() {
        let path = PathBuf::from("cache/224589800.fasta");
        assert_eq!(
            cached_notice(&path),
            "File cache/224589800.fasta already exists. Skipping download."
        );
        assert_eq!(
            saved_notice("224589800", &path, 2048),
            "Sequence for nucleotide ID 224589800 saved to cache/224589800.fasta (2KB)"
        );
        assert_eq!(
            missing_cache_line("224589800"),
            "File for nucleotide ID 224589800 does not exist after download attempt."
        );
    }

    #[test]
    fn format_size_units() {
        assert_eq!(format_size(512), "512B");
        assert_eq!(format_size(4096), "4KB");
        assert_eq!(format_size(3 * 1024 * 1024 + 512 * 1024), "3.5MB");
    }
}
