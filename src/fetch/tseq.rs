//! TSeq XML (`rettype=fasta&retmode=xml`) decoding.
//!
//! Only one field matters: the text of the first `TSeq_sequence` element,
//! wherever it sits. The whole document is still read to the end so that a
//! truncated or ill-formed response is reported instead of half-trusted.

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::NucError;

const SEQUENCE_TAG: &[u8] = b"TSeq_sequence";

fn parse_error(reason: impl Into<String>) -> NucError {
    NucError::Parse {
        reason: reason.into(),
    }
}

/// Extract the flat sequence from a TSeq document. Whitespace inside the
/// element is dropped; an empty element yields an empty sequence.
pub fn extract_sequence(body: &[u8]) -> Result<String, NucError> {
    let text = std::str::from_utf8(body)
        .map_err(|e| parse_error(format!("response is not UTF-8: {e}")))?;

    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut depth = 0usize;
    let mut seen_root = false;
    // (depth of the open TSeq_sequence, text collected so far)
    let mut capture: Option<(usize, String)> = None;
    let mut sequence: Option<String> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            parse_error(format!("at byte {}: {e}", reader.buffer_position()))
        })?;

        match event {
            Event::Start(e) => {
                if depth == 0 && seen_root {
                    return Err(parse_error("multiple root elements"));
                }
                seen_root = true;
                depth += 1;
                if sequence.is_none()
                    && capture.is_none()
                    && e.local_name().as_ref() == SEQUENCE_TAG
                {
                    capture = Some((depth, String::new()));
                }
            }
            Event::Empty(e) => {
                if depth == 0 && seen_root {
                    return Err(parse_error("multiple root elements"));
                }
                seen_root = true;
                if sequence.is_none()
                    && capture.is_none()
                    && e.local_name().as_ref() == SEQUENCE_TAG
                {
                    sequence = Some(String::new());
                }
            }
            Event::End(_) => {
                if let Some((open_at, _)) = &capture {
                    if *open_at == depth {
                        sequence = capture.take().map(|(_, s)| s);
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Event::Text(t) => {
                if depth == 0 {
                    return Err(parse_error("text outside the root element"));
                }
                if let Some((_, buf)) = capture.as_mut() {
                    let unescaped = t
                        .unescape()
                        .map_err(|e| parse_error(format!("bad entity in sequence: {e}")))?;
                    push_symbols(buf, &unescaped);
                }
            }
            Event::CData(c) => {
                if let Some((_, buf)) = capture.as_mut() {
                    let raw = std::str::from_utf8(&c)
                        .map_err(|e| parse_error(format!("CDATA is not UTF-8: {e}")))?;
                    push_symbols(buf, raw);
                }
            }
            Event::Eof => break,
            // declarations, comments, processing instructions, doctype
            _ => {}
        }
    }

    if !seen_root {
        return Err(parse_error("empty document"));
    }
    if depth != 0 {
        return Err(parse_error("unexpected end of document: unclosed element"));
    }
    sequence.ok_or_else(|| parse_error("no TSeq_sequence element in response"))
}

fn push_symbols(buf: &mut String, text: &str) {
    buf.extend(text.chars().filter(|c| !c.is_whitespace()));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(doc: &str) -> String {
        extract_sequence(doc.as_bytes()).unwrap()
    }

    fn parse_err(doc: &str) -> String {
        match extract_sequence(doc.as_bytes()) {
            Err(NucError::Parse { reason }) => reason,
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn nested_sequence_is_found() {
        let doc = r#"<?xml version="1.0" encoding="UTF-8" ?>
<!DOCTYPE TSeqSet PUBLIC "-//NCBI//NCBI TSeq/EN" "https://www.ncbi.nlm.nih.gov/dtd/NCBI_TSeq.dtd">
<TSeqSet>
<TSeq>
  <TSeq_seqtype value="nucleotide"/>
  <TSeq_gi>30271926</TSeq_gi>
  <TSeq_accver>AY279184.1</TSeq_accver>
  <TSeq_orgname>Homo sapiens</TSeq_orgname>
  <TSeq_defline>Homo sapiens partial sequence</TSeq_defline>
  <TSeq_length>16</TSeq_length>
  <TSeq_sequence>AATCGAAGCTAATCGA</TSeq_sequence>
</TSeq>
</TSeqSet>"#;
        assert_eq!(ok(doc), "AATCGAAGCTAATCGA");
    }

    #[test]
    fn case_is_preserved() {
        assert_eq!(
            ok("<TSeq><TSeq_sequence>acgtNNACGT</TSeq_sequence></TSeq>"),
            "acgtNNACGT"
        );
    }

    #[test]
    fn wrapped_sequence_text_is_flattened() {
        let doc = "<TSeq><TSeq_sequence>\n  AATC\n  GA\n</TSeq_sequence></TSeq>";
        assert_eq!(ok(doc), "AATCGA");
    }

    #[test]
    fn first_sequence_wins() {
        let doc = "<TSeqSet><TSeq><TSeq_sequence>AAA</TSeq_sequence></TSeq>\
                   <TSeq><TSeq_sequence>CCC</TSeq_sequence></TSeq></TSeqSet>";
        assert_eq!(ok(doc), "AAA");
    }

    #[test]
    fn empty_element_is_empty_sequence() {
        assert_eq!(ok("<TSeq><TSeq_sequence/></TSeq>"), "");
        assert_eq!(ok("<TSeq><TSeq_sequence></TSeq_sequence></TSeq>"), "");
    }

    #[test]
    fn unclosed_root_is_malformed() {
        parse_err("<invalid_xml>");
        parse_err("<TSeqSet><TSeq><TSeq_sequence>ACGT</TSeq_sequence>");
    }

    #[test]
    fn mismatched_end_tag_is_malformed() {
        parse_err("<TSeq><TSeq_sequence>ACGT</TSeq></TSeq_sequence>");
    }

    #[test]
    fn empty_body_is_malformed() {
        assert_eq!(parse_err(""), "empty document");
        assert_eq!(parse_err("   \n"), "empty document");
    }

    #[test]
    fn error_page_text_is_malformed() {
        parse_err("Service unavailable");
    }

    #[test]
    fn missing_field_is_parse_error() {
        let reason = parse_err("<TSeqSet><TSeq><TSeq_gi>1</TSeq_gi></TSeq></TSeqSet>");
        assert!(reason.contains("TSeq_sequence"), "{reason}");
    }

    #[test]
    fn invalid_utf8_is_parse_error() {
        let err = extract_sequence(&[0x3c, 0x61, 0x3e, 0xff, 0x3c, 0x2f, 0x61, 0x3e]).unwrap_err();
        assert!(matches!(err, NucError::Parse { .. }));
    }
}
