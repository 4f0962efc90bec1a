//! Streaming XML rewrite helpers for PPTX parts.
//!
//! All rewriting copies the event stream through a `Writer`, so parts
//! the tool does not touch come out structurally identical.

use deck_core::{Error, Result};
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io::Cursor;

/// Extract the local name from a potentially namespaced XML element name.
pub fn local_name(name: &[u8]) -> &[u8] {
    if let Some(pos) = name.iter().position(|&b| b == b':') {
        &name[pos + 1..]
    } else {
        name
    }
}

/// Read an attribute value as a string, if present.
pub fn attr_value(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).to_string())
}

fn xml_err(context: &str, e: impl std::fmt::Display) -> Error {
    Error::XmlError(format!("{}: {}", context, e))
}

fn finish(writer: Writer<Cursor<Vec<u8>>>) -> Result<String> {
    String::from_utf8(writer.into_inner().into_inner())
        .map_err(|e| Error::XmlError(format!("Rewritten part is not UTF-8: {}", e)))
}

/// Copy `xml` through, dropping every element whose local name is
/// `local` and for which `drop` returns true (children included).
pub fn filter_elements<F>(xml: &str, local: &[u8], drop: F) -> Result<String>
where
    F: Fn(&BytesStart) -> bool,
{
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut skip_depth = 0usize;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| xml_err("Error filtering part", e))?;
        match event {
            Event::Start(ref e) => {
                if skip_depth > 0 {
                    if local_name(e.name().as_ref()) == local {
                        skip_depth += 1;
                    }
                    continue;
                }
                if local_name(e.name().as_ref()) == local && drop(e) {
                    skip_depth = 1;
                    continue;
                }
                writer
                    .write_event(event)
                    .map_err(|e| xml_err("Error writing part", e))?;
            }
            Event::End(ref e) => {
                if skip_depth > 0 {
                    if local_name(e.name().as_ref()) == local {
                        skip_depth -= 1;
                    }
                    continue;
                }
                writer
                    .write_event(event)
                    .map_err(|e| xml_err("Error writing part", e))?;
            }
            Event::Empty(ref e) => {
                if skip_depth > 0 {
                    continue;
                }
                if local_name(e.name().as_ref()) == local && drop(e) {
                    continue;
                }
                writer
                    .write_event(event)
                    .map_err(|e| xml_err("Error writing part", e))?;
            }
            Event::Eof => break,
            other => {
                if skip_depth == 0 {
                    writer
                        .write_event(other)
                        .map_err(|e| xml_err("Error writing part", e))?;
                }
            }
        }
    }

    finish(writer)
}

/// Copy `xml` through, injecting the raw fragment `child` as the last
/// child of the first element whose local name is `parent`. A
/// self-closing parent is expanded into an open/close pair.
pub fn append_child(xml: &str, parent: &[u8], child: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    let mut injected = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| xml_err("Error rewriting part", e))?;
        match event {
            Event::End(ref e) if !injected && local_name(e.name().as_ref()) == parent => {
                injected = true;
                writer
                    .write_event(Event::Text(BytesText::from_escaped(child)))
                    .map_err(|e| xml_err("Error writing part", e))?;
                writer
                    .write_event(event)
                    .map_err(|e| xml_err("Error writing part", e))?;
            }
            Event::Empty(ref e) if !injected && local_name(e.name().as_ref()) == parent => {
                injected = true;
                let name = e.name().as_ref().to_vec();
                writer
                    .write_event(Event::Start(e.to_owned()))
                    .map_err(|e| xml_err("Error writing part", e))?;
                writer
                    .write_event(Event::Text(BytesText::from_escaped(child)))
                    .map_err(|e| xml_err("Error writing part", e))?;
                writer
                    .write_event(Event::End(quick_xml::events::BytesEnd::new(
                        String::from_utf8_lossy(&name).to_string(),
                    )))
                    .map_err(|e| xml_err("Error writing part", e))?;
            }
            Event::Eof => break,
            other => {
                writer
                    .write_event(other)
                    .map_err(|e| xml_err("Error writing part", e))?;
            }
        }
    }

    if !injected {
        return Err(Error::XmlError(format!(
            "No <{}> element found to append into",
            String::from_utf8_lossy(parent)
        )));
    }

    finish(writer)
}

/// Position and size of a shape in EMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub x: i64,
    pub y: i64,
    pub cx: i64,
    pub cy: i64,
}

/// What a placeholder lookup found on a slide.
#[derive(Debug, Clone, Default)]
pub struct PlaceholderLookup {
    /// Whether a shape with the requested name exists at all.
    pub found: bool,
    /// The shape's transform, when present on the slide itself.
    pub frame: Option<Frame>,
    /// The placeholder `idx`, for layout fallback.
    pub ph_idx: Option<String>,
    /// Highest `cNvPr` shape id seen anywhere on the slide.
    pub max_shape_id: u64,
}

/// Scan a slide part for the shape named `placeholder_name`.
///
/// Also tracks the highest shape id on the slide so a new picture can
/// be given a non-clashing one.
pub fn find_placeholder(slide_xml: &str, placeholder_name: &str) -> Result<PlaceholderLookup> {
    let mut reader = Reader::from_str(slide_xml);

    let mut lookup = PlaceholderLookup::default();
    let mut in_sp = false;
    let mut sp_name: Option<String> = None;
    let mut sp_idx: Option<String> = None;
    let mut sp_off: Option<(i64, i64)> = None;
    let mut sp_ext: Option<(i64, i64)> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| xml_err("Error scanning slide", e))?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                match local_name(e.name().as_ref()) {
                    b"sp" => {
                        in_sp = true;
                        sp_name = None;
                        sp_idx = None;
                        sp_off = None;
                        sp_ext = None;
                    }
                    b"cNvPr" => {
                        if let Some(id) = attr_value(e, b"id").and_then(|v| v.parse::<u64>().ok())
                        {
                            lookup.max_shape_id = lookup.max_shape_id.max(id);
                        }
                        if in_sp && sp_name.is_none() {
                            sp_name = attr_value(e, b"name");
                        }
                    }
                    b"ph" if in_sp => {
                        sp_idx = attr_value(e, b"idx");
                    }
                    b"off" if in_sp => {
                        let x = attr_value(e, b"x").and_then(|v| v.parse().ok());
                        let y = attr_value(e, b"y").and_then(|v| v.parse().ok());
                        if let (Some(x), Some(y)) = (x, y) {
                            sp_off = Some((x, y));
                        }
                    }
                    b"ext" if in_sp => {
                        let cx = attr_value(e, b"cx").and_then(|v| v.parse().ok());
                        let cy = attr_value(e, b"cy").and_then(|v| v.parse().ok());
                        if let (Some(cx), Some(cy)) = (cx, cy) {
                            sp_ext = Some((cx, cy));
                        }
                    }
                    _ => {}
                }
            }
            Event::End(ref e) if local_name(e.name().as_ref()) == b"sp" => {
                if in_sp && !lookup.found && sp_name.as_deref() == Some(placeholder_name) {
                    lookup.found = true;
                    lookup.ph_idx = sp_idx.take();
                    if let (Some((x, y)), Some((cx, cy))) = (sp_off, sp_ext) {
                        lookup.frame = Some(Frame { x, y, cx, cy });
                    }
                }
                in_sp = false;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(lookup)
}

/// Find the transform of the placeholder with the given `idx` in a
/// slide layout part. Used when the slide inherits its placeholder
/// geometry from the layout.
pub fn find_layout_frame(layout_xml: &str, ph_idx: &str) -> Result<Option<Frame>> {
    let mut reader = Reader::from_str(layout_xml);

    let mut in_sp = false;
    let mut sp_idx: Option<String> = None;
    let mut sp_off: Option<(i64, i64)> = None;
    let mut sp_ext: Option<(i64, i64)> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| xml_err("Error scanning layout", e))?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => match local_name(e.name().as_ref()) {
                b"sp" => {
                    in_sp = true;
                    sp_idx = None;
                    sp_off = None;
                    sp_ext = None;
                }
                b"ph" if in_sp => {
                    sp_idx = attr_value(e, b"idx");
                }
                b"off" if in_sp => {
                    let x = attr_value(e, b"x").and_then(|v| v.parse().ok());
                    let y = attr_value(e, b"y").and_then(|v| v.parse().ok());
                    if let (Some(x), Some(y)) = (x, y) {
                        sp_off = Some((x, y));
                    }
                }
                b"ext" if in_sp => {
                    let cx = attr_value(e, b"cx").and_then(|v| v.parse().ok());
                    let cy = attr_value(e, b"cy").and_then(|v| v.parse().ok());
                    if let (Some(cx), Some(cy)) = (cx, cy) {
                        sp_ext = Some((cx, cy));
                    }
                }
                _ => {}
            },
            Event::End(ref e) if local_name(e.name().as_ref()) == b"sp" => {
                if in_sp && sp_idx.as_deref() == Some(ph_idx) {
                    if let (Some((x, y)), Some((cx, cy))) = (sp_off, sp_ext) {
                        return Ok(Some(Frame { x, y, cx, cy }));
                    }
                }
                in_sp = false;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(None)
}
