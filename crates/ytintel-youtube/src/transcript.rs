//! Timed-text transcript parsing.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::YoutubeError;

/// Parse a `<transcript><text start=".." dur="..">…</text></transcript>` body
/// into its non-empty text segments, in document order.
///
/// Timed text double-escapes entities (`&amp;#39;`), so a second pass turns
/// the common leftovers back into characters.
///
/// # Errors
///
/// Returns [`YoutubeError::Xml`] for malformed XML.
pub fn parse_timedtext(xml: &str) -> Result<Vec<String>, YoutubeError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut in_text = false;
    let mut current = String::new();
    let mut segments = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"text" => {
                in_text = true;
                current.clear();
            }
            Ok(Event::Text(e)) if in_text => {
                let text = e.unescape().unwrap_or_default();
                current.push_str(&text);
            }
            Ok(Event::CData(e)) if in_text => {
                current.push_str(&String::from_utf8_lossy(e.as_ref()));
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"text" => {
                in_text = false;
                let segment = decode_leftover_entities(current.trim());
                if !segment.is_empty() {
                    segments.push(segment);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(YoutubeError::Xml(e)),
            _ => {}
        }
    }

    Ok(segments)
}

fn decode_leftover_entities(text: &str) -> String {
    text.replace("&#39;", "'")
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
        .replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_segments_in_order() {
        let xml = r#"<?xml version="1.0" encoding="utf-8" ?>
<transcript>
  <text start="0.5" dur="2.1">welcome back</text>
  <text start="2.6" dur="3.0">today we bake bread</text>
</transcript>"#;
        let segments = parse_timedtext(xml).unwrap();
        assert_eq!(segments, vec!["welcome back", "today we bake bread"]);
    }

    #[test]
    fn decodes_double_escaped_entities() {
        let xml = r#"<transcript><text start="0" dur="1">it&amp;#39;s &amp;quot;fine&amp;quot;</text></transcript>"#;
        let segments = parse_timedtext(xml).unwrap();
        assert_eq!(segments, vec![r#"it's "fine""#]);
    }

    #[test]
    fn skips_empty_segments() {
        let xml = r#"<transcript><text start="0" dur="1">  </text><text start="1" dur="1">ok</text></transcript>"#;
        assert_eq!(parse_timedtext(xml).unwrap(), vec!["ok"]);
    }

    #[test]
    fn empty_document_has_no_segments() {
        assert!(parse_timedtext("").unwrap().is_empty());
    }

    #[test]
    fn mismatched_tags_are_an_error() {
        assert!(parse_timedtext("<transcript><text>a</transcript>").is_err());
    }
}
