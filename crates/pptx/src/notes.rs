//! Speaker-notes text extraction and rewriting.
//!
//! A notes slide carries several placeholders (slide image, slide
//! number, notes body); only the shape whose `p:ph` type is `body`
//! holds the speaker notes. Extraction joins its paragraphs with `\n`
//! and renders `a:br` as `\n`. Rewriting replaces the body's paragraphs
//! with a single paragraph, turning `\n` back into `a:br`, and leaves
//! the other placeholders untouched.

use crate::xml::{attr_value, local_name};
use deck_core::{Error, Result};
use quick_xml::escape::escape;
use quick_xml::events::{BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io::Cursor;

/// Extract the notes body text from a notes-slide part.
///
/// Returns `None` when the part has no body placeholder.
pub fn extract_notes_text(xml: &str) -> Result<Option<String>> {
    let mut reader = Reader::from_str(xml);

    let mut in_sp = false;
    let mut sp_is_body = false;
    let mut in_tx = false;
    let mut in_p = false;
    let mut in_t = false;
    let mut found_body = false;
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();

    loop {
        match reader
            .read_event()
            .map_err(|e| Error::XmlError(format!("Error parsing notes slide: {}", e)))?
        {
            Event::Start(ref e) => match local_name(e.name().as_ref()) {
                b"sp" => {
                    in_sp = true;
                    sp_is_body = false;
                }
                b"ph" if in_sp => {
                    if attr_value(e, b"type").as_deref() == Some("body") {
                        sp_is_body = true;
                    }
                }
                b"txBody" if in_sp && sp_is_body => {
                    in_tx = true;
                    found_body = true;
                }
                b"p" if in_tx => {
                    in_p = true;
                    current.clear();
                }
                b"t" if in_p => {
                    in_t = true;
                }
                _ => {}
            },
            Event::Empty(ref e) => match local_name(e.name().as_ref()) {
                b"ph" if in_sp => {
                    if attr_value(e, b"type").as_deref() == Some("body") {
                        sp_is_body = true;
                    }
                }
                b"br" if in_p => {
                    current.push('\n');
                }
                _ => {}
            },
            Event::Text(ref e) => {
                if in_t {
                    let text = e
                        .unescape()
                        .map_err(|e| Error::XmlError(format!("Bad notes text: {}", e)))?;
                    current.push_str(&text);
                }
            }
            Event::End(ref e) => match local_name(e.name().as_ref()) {
                b"t" => in_t = false,
                b"p" if in_p => {
                    paragraphs.push(std::mem::take(&mut current));
                    in_p = false;
                }
                b"txBody" if in_tx => in_tx = false,
                b"sp" => {
                    in_sp = false;
                    sp_is_body = false;
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if found_body {
        Ok(Some(paragraphs.join("\n")))
    } else {
        Ok(None)
    }
}

/// Rewrite the notes body of a notes-slide part to hold `text` as a
/// single paragraph (`\n` becomes `a:br`). Body-level properties and
/// the other placeholders are copied through unchanged. A part without
/// a body placeholder comes back unmodified.
pub fn replace_notes_body(xml: &str, text: &str) -> Result<String> {
    let err = |e: &dyn std::fmt::Display| Error::XmlError(format!("Error rewriting notes: {}", e));

    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    let mut in_sp = false;
    let mut sp_is_body = false;
    let mut in_body_tx = false;
    let mut skip_p = 0usize;
    let mut replaced = false;

    loop {
        let event = reader.read_event().map_err(|e| err(&e))?;
        match event {
            Event::Start(ref e) => {
                let ln = local_name(e.name().as_ref()).to_vec();
                if skip_p > 0 {
                    if ln == b"p" {
                        skip_p += 1;
                    }
                    continue;
                }
                match ln.as_slice() {
                    b"sp" => {
                        in_sp = true;
                        sp_is_body = false;
                    }
                    b"ph" if in_sp => {
                        if attr_value(e, b"type").as_deref() == Some("body") {
                            sp_is_body = true;
                        }
                    }
                    b"txBody" if in_sp && sp_is_body => {
                        in_body_tx = true;
                    }
                    b"p" if in_body_tx => {
                        skip_p = 1;
                        continue;
                    }
                    _ => {}
                }
                writer.write_event(event).map_err(|e| err(&e))?;
            }
            Event::Empty(ref e) => {
                let ln = local_name(e.name().as_ref()).to_vec();
                if skip_p > 0 {
                    continue;
                }
                match ln.as_slice() {
                    b"ph" if in_sp => {
                        if attr_value(e, b"type").as_deref() == Some("body") {
                            sp_is_body = true;
                        }
                    }
                    b"p" if in_body_tx => continue,
                    _ => {}
                }
                writer.write_event(event).map_err(|e| err(&e))?;
            }
            Event::End(ref e) => {
                let ln = local_name(e.name().as_ref()).to_vec();
                if skip_p > 0 {
                    if ln == b"p" {
                        skip_p -= 1;
                    }
                    continue;
                }
                match ln.as_slice() {
                    b"sp" => {
                        in_sp = false;
                        sp_is_body = false;
                    }
                    b"txBody" if in_body_tx => {
                        writer
                            .write_event(Event::Text(BytesText::from_escaped(
                                notes_paragraph_xml(text),
                            )))
                            .map_err(|e| err(&e))?;
                        in_body_tx = false;
                        replaced = true;
                    }
                    _ => {}
                }
                writer.write_event(event).map_err(|e| err(&e))?;
            }
            Event::Eof => break,
            other => {
                if skip_p == 0 {
                    writer.write_event(other).map_err(|e| err(&e))?;
                }
            }
        }
    }

    if !replaced {
        log::debug!("Notes part has no body placeholder; left unchanged");
        return Ok(xml.to_string());
    }

    String::from_utf8(writer.into_inner().into_inner())
        .map_err(|e| Error::XmlError(format!("Rewritten notes are not UTF-8: {}", e)))
}

/// Serialize `text` as one DrawingML paragraph, newlines as breaks.
fn notes_paragraph_xml(text: &str) -> String {
    let mut xml = String::from("<a:p>");
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            xml.push_str("<a:br/>");
        }
        if !line.is_empty() {
            xml.push_str("<a:r><a:t>");
            xml.push_str(&escape(line));
            xml.push_str("</a:t></a:r>");
        }
    }
    xml.push_str("</a:p>");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOTES: &str = r#"<p:notes><p:cSld><p:spTree>
<p:sp><p:nvSpPr><p:cNvPr id="2" name="Slide Image Placeholder 1"/><p:nvPr><p:ph type="sldImg"/></p:nvPr></p:nvSpPr></p:sp>
<p:sp><p:nvSpPr><p:cNvPr id="3" name="Notes Placeholder 2"/><p:nvPr><p:ph type="body" idx="1"/></p:nvPr></p:nvSpPr>
<p:txBody><a:bodyPr/><a:lstStyle/><a:p><a:r><a:t>First line </a:t></a:r><a:r><a:t>{"tags": ["draft"]}</a:t></a:r></a:p><a:p><a:r><a:t>Second line</a:t></a:r></a:p></p:txBody></p:sp>
<p:sp><p:nvSpPr><p:cNvPr id="4" name="Slide Number Placeholder 3"/><p:nvPr><p:ph type="sldNum" idx="10"/></p:nvPr></p:nvSpPr>
<p:txBody><a:bodyPr/><a:p><a:fld id="{X}" type="slidenum"><a:t>7</a:t></a:fld></a:p></p:txBody></p:sp>
</p:spTree></p:cSld></p:notes>"#;

    #[test]
    fn test_extract_notes_text_joins_runs_and_paragraphs() {
        let text = extract_notes_text(NOTES).unwrap().unwrap();
        assert_eq!(text, "First line {\"tags\": [\"draft\"]}\nSecond line");
    }

    #[test]
    fn test_extract_notes_text_ignores_other_placeholders() {
        let text = extract_notes_text(NOTES).unwrap().unwrap();
        assert!(!text.contains('7'));
    }

    #[test]
    fn test_extract_notes_text_break_becomes_newline() {
        let xml = r#"<p:notes><p:sp><p:nvSpPr><p:nvPr><p:ph type="body"/></p:nvPr></p:nvSpPr>
<p:txBody><a:p><a:r><a:t>a</a:t></a:r><a:br/><a:r><a:t>b</a:t></a:r></a:p></p:txBody></p:sp></p:notes>"#;
        assert_eq!(extract_notes_text(xml).unwrap().unwrap(), "a\nb");
    }

    #[test]
    fn test_extract_notes_text_no_body() {
        let xml = r#"<p:notes><p:sp><p:nvSpPr><p:nvPr><p:ph type="sldImg"/></p:nvPr></p:nvSpPr></p:sp></p:notes>"#;
        assert!(extract_notes_text(xml).unwrap().is_none());
    }

    #[test]
    fn test_replace_notes_body() {
        let out = replace_notes_body(NOTES, "First line \nSecond line").unwrap();
        assert!(out.contains("<a:r><a:t>First line </a:t></a:r><a:br/><a:r><a:t>Second line</a:t></a:r>"));
        assert!(!out.contains("tags"));
        // bodyPr and the slide-number field survive
        assert!(out.contains("<a:bodyPr/>"));
        assert!(out.contains("slidenum"));
        // And the rewrite round-trips through extraction
        assert_eq!(
            extract_notes_text(&out).unwrap().unwrap(),
            "First line \nSecond line"
        );
    }

    #[test]
    fn test_replace_notes_body_escapes_markup() {
        let out = replace_notes_body(NOTES, "a < b & c").unwrap();
        assert!(out.contains("a &lt; b &amp; c"));
    }

    #[test]
    fn test_replace_notes_body_without_body_is_identity() {
        let xml = r#"<p:notes><p:sp><p:nvSpPr><p:nvPr><p:ph type="sldImg"/></p:nvPr></p:nvSpPr></p:sp></p:notes>"#;
        assert_eq!(replace_notes_body(xml, "x").unwrap(), xml);
    }

    #[test]
    fn test_notes_paragraph_xml_empty_lines() {
        assert_eq!(notes_paragraph_xml(""), "<a:p></a:p>");
        assert_eq!(notes_paragraph_xml("a\n\nb"),
            "<a:p><a:r><a:t>a</a:t></a:r><a:br/><a:br/><a:r><a:t>b</a:t></a:r></a:p>");
    }
}
