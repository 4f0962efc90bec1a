//! In-memory PPTX deck with slide removal, notes rewriting, and logo
//! placement, applied when the deck is saved.

use crate::notes;
use crate::rels::{next_rel_id, parse_relationships, rels_path_for, resolve_target, Relationship};
use crate::xml::{self, attr_value, local_name, Frame};
use deck_core::{Error, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::io::{Read, Seek, Write};
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
const PRESENTATION_PART: &str = "ppt/presentation.xml";
const PRESENTATION_RELS_PART: &str = "ppt/_rels/presentation.xml.rels";

const SLIDE_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";
const NOTES_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/notesSlide";
const LAYOUT_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout";
const IMAGE_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

/// One slide of the deck, in presentation order.
#[derive(Debug, Clone, Serialize)]
pub struct Slide {
    /// 1-based position in the slide list.
    pub number: usize,

    /// Relationship id in the presentation relationships.
    pub rel_id: String,

    /// Archive path of the slide part.
    pub path: String,

    /// Archive path of the notes-slide part, if the slide has notes.
    pub notes_path: Option<String>,

    /// Speaker-notes body text, if the slide has notes.
    pub notes_text: Option<String>,
}

/// A logo image ready for placement: encoded PNG bytes plus the pixel
/// dimensions the placement math scales from.
#[derive(Debug, Clone)]
pub struct Logo {
    pub png_data: Vec<u8>,
    pub width_px: u32,
    pub height_px: u32,
}

/// An opened PPTX archive with pending edits.
///
/// All parts are held in memory; edits are recorded against slide
/// numbers and applied in one pass by [`PptxDeck::save`].
pub struct PptxDeck {
    entries: Vec<(String, Vec<u8>)>,
    slides: Vec<Slide>,
    removed: BTreeSet<usize>,
    notes_rewrites: BTreeMap<usize, String>,
    logo: Option<(Logo, String)>,
}

impl PptxDeck {
    /// Open a deck from a reader over a `.pptx` archive.
    pub fn open<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive = ZipArchive::new(reader)
            .map_err(|e| Error::ZipError(format!("Failed to open ZIP: {}", e)))?;

        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut file = archive
                .by_index(i)
                .map_err(|e| Error::ZipError(format!("Failed to read archive entry: {}", e)))?;
            if file.is_dir() {
                continue;
            }
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            entries.push((file.name().to_string(), data));
        }

        let mut deck = Self {
            entries,
            slides: Vec::new(),
            removed: BTreeSet::new(),
            notes_rewrites: BTreeMap::new(),
            logo: None,
        };
        deck.load_slides()?;
        Ok(deck)
    }

    /// The slides in presentation order.
    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    /// Mark a slide for removal. The slide part, its relationships, its
    /// notes part, and its entries in the presentation structures are
    /// all dropped at save time.
    pub fn remove_slide(&mut self, number: usize) -> Result<()> {
        self.slide(number)?;
        self.removed.insert(number);
        Ok(())
    }

    /// Replace a slide's notes body text at save time.
    pub fn replace_notes_text(&mut self, number: usize, text: &str) -> Result<()> {
        let slide = self.slide(number)?;
        if slide.notes_path.is_none() {
            return Err(Error::MissingPart(format!(
                "notes slide for slide {}",
                number
            )));
        }
        self.notes_rewrites.insert(number, text.to_string());
        Ok(())
    }

    /// Place `logo` over the placeholder named `placeholder_name` on
    /// every kept slide that has one. Placement keeps the placeholder's
    /// offset and height; width follows the logo's aspect ratio.
    pub fn set_logo(&mut self, logo: Logo, placeholder_name: &str) {
        self.logo = Some((logo, placeholder_name.to_string()));
    }

    /// Write the deck with all pending edits applied.
    pub fn save<W: Write + Seek>(&self, writer: W) -> Result<()> {
        let removed_parts = self.removed_parts();
        let removed_rel_ids: BTreeSet<&str> = self
            .slides
            .iter()
            .filter(|s| self.removed.contains(&s.number))
            .map(|s| s.rel_id.as_str())
            .collect();
        let removed_part_names: BTreeSet<String> =
            removed_parts.iter().map(|p| format!("/{}", p)).collect();

        let notes_by_path: BTreeMap<&str, &str> = self
            .notes_rewrites
            .iter()
            .filter(|(number, _)| !self.removed.contains(number))
            .filter_map(|(number, text)| {
                let slide = self.slides.iter().find(|s| s.number == *number)?;
                Some((slide.notes_path.as_deref()?, text.as_str()))
            })
            .collect();

        let plan = self.plan_logo()?;

        let mut zip = ZipWriter::new(writer);
        let options = FileOptions::default();

        for (name, data) in &self.entries {
            if removed_parts.contains(name) {
                continue;
            }

            let rewritten: Option<String> = if name == CONTENT_TYPES_PART {
                let mut out = xml::filter_elements(self.entry_str(name)?, b"Override", |e| {
                    attr_value(e, b"PartName")
                        .map(|p| removed_part_names.contains(&p))
                        .unwrap_or(false)
                })?;
                if plan.is_some() && !has_png_default(&out)? {
                    out = xml::append_child(
                        &out,
                        b"Types",
                        r#"<Default Extension="png" ContentType="image/png"/>"#,
                    )?;
                }
                Some(out)
            } else if name == PRESENTATION_PART {
                Some(xml::filter_elements(self.entry_str(name)?, b"sldId", |e| {
                    attr_value(e, b"r:id")
                        .map(|id| removed_rel_ids.contains(id.as_str()))
                        .unwrap_or(false)
                })?)
            } else if name == PRESENTATION_RELS_PART {
                Some(xml::filter_elements(
                    self.entry_str(name)?,
                    b"Relationship",
                    |e| {
                        attr_value(e, b"Id")
                            .map(|id| removed_rel_ids.contains(id.as_str()))
                            .unwrap_or(false)
                    },
                )?)
            } else if let Some(text) = notes_by_path.get(name.as_str()) {
                Some(notes::replace_notes_body(self.entry_str(name)?, text)?)
            } else if let Some(plan) = &plan {
                if let Some(pic) = plan.pic_by_slide.get(name.as_str()) {
                    Some(xml::append_child(self.entry_str(name)?, b"spTree", pic)?)
                } else if let Some(rel) = plan.rels_additions.get(name.as_str()) {
                    Some(xml::append_child(
                        self.entry_str(name)?,
                        b"Relationships",
                        rel,
                    )?)
                } else {
                    None
                }
            } else {
                None
            };

            zip.start_file(name.as_str(), options)
                .map_err(|e| Error::ZipError(format!("Failed to start entry {}: {}", name, e)))?;
            match rewritten {
                Some(text) => zip.write_all(text.as_bytes())?,
                None => zip.write_all(data)?,
            }
        }

        if let Some(plan) = &plan {
            zip.start_file(plan.media_path.as_str(), options)
                .map_err(|e| Error::ZipError(format!("Failed to add logo media: {}", e)))?;
            zip.write_all(&plan.media_data)?;

            for (path, content) in &plan.new_rels_parts {
                zip.start_file(path.as_str(), options).map_err(|e| {
                    Error::ZipError(format!("Failed to add rels part {}: {}", path, e))
                })?;
                zip.write_all(content.as_bytes())?;
            }
        }

        zip.finish()
            .map_err(|e| Error::ZipError(format!("Failed to finish archive: {}", e)))?;
        Ok(())
    }

    fn slide(&self, number: usize) -> Result<&Slide> {
        self.slides
            .iter()
            .find(|s| s.number == number)
            .ok_or(Error::SlideNotFound(number))
    }

    fn entry(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d.as_slice())
    }

    fn entry_str(&self, name: &str) -> Result<&str> {
        let data = self
            .entry(name)
            .ok_or_else(|| Error::MissingPart(name.to_string()))?;
        std::str::from_utf8(data)
            .map_err(|e| Error::XmlError(format!("Part {} is not UTF-8: {}", name, e)))
    }

    fn load_slides(&mut self) -> Result<()> {
        let rels = parse_relationships(self.entry_str(PRESENTATION_RELS_PART)?)?;
        let order = slide_rel_ids(self.entry_str(PRESENTATION_PART)?)?;

        let mut slides = Vec::with_capacity(order.len());
        for (idx, rel_id) in order.iter().enumerate() {
            let rel = rels
                .iter()
                .find(|r| &r.id == rel_id && r.rel_type == SLIDE_REL_TYPE)
                .ok_or_else(|| {
                    Error::XmlError(format!("Slide id {} has no slide relationship", rel_id))
                })?;
            let path = resolve_target("ppt", &rel.target);
            if self.entry(&path).is_none() {
                return Err(Error::MissingPart(path));
            }

            let (notes_path, notes_text) = self.load_notes(&path)?;

            slides.push(Slide {
                number: idx + 1,
                rel_id: rel_id.clone(),
                path,
                notes_path,
                notes_text,
            });
        }

        self.slides = slides;
        Ok(())
    }

    fn load_notes(&self, slide_path: &str) -> Result<(Option<String>, Option<String>)> {
        let Some(rels) = self.slide_rels(slide_path)? else {
            return Ok((None, None));
        };
        let Some(rel) = rels.iter().find(|r| r.rel_type == NOTES_REL_TYPE) else {
            return Ok((None, None));
        };

        let base_dir = slide_path.rsplit_once('/').map(|(d, _)| d).unwrap_or("");
        let notes_path = resolve_target(base_dir, &rel.target);
        let text = notes::extract_notes_text(self.entry_str(&notes_path)?)?.unwrap_or_default();
        Ok((Some(notes_path), Some(text)))
    }

    fn slide_rels(&self, slide_path: &str) -> Result<Option<Vec<Relationship>>> {
        match self.entry(&rels_path_for(slide_path)) {
            Some(_) => {
                let xml = self.entry_str(&rels_path_for(slide_path))?;
                Ok(Some(parse_relationships(xml)?))
            }
            None => Ok(None),
        }
    }

    fn removed_parts(&self) -> BTreeSet<String> {
        let mut parts = BTreeSet::new();
        for slide in self
            .slides
            .iter()
            .filter(|s| self.removed.contains(&s.number))
        {
            parts.insert(slide.path.clone());
            parts.insert(rels_path_for(&slide.path));
            if let Some(notes_path) = &slide.notes_path {
                parts.insert(notes_path.clone());
                parts.insert(rels_path_for(notes_path));
            }
        }
        parts.retain(|p| self.entry(p).is_some());
        parts
    }

    /// Work out, per kept slide, the picture element and relationship
    /// the logo needs, plus the media part to add.
    fn plan_logo(&self) -> Result<Option<LogoPlan>> {
        let Some((logo, placeholder_name)) = &self.logo else {
            return Ok(None);
        };
        if logo.width_px == 0 || logo.height_px == 0 {
            log::warn!("Logo image has no pixels; skipping logo placement");
            return Ok(None);
        }

        let media_path = self.next_media_path();
        let media_file = media_path.rsplit_once('/').map(|(_, f)| f).unwrap_or("");

        let mut plan = LogoPlan {
            media_path: media_path.clone(),
            media_data: logo.png_data.clone(),
            pic_by_slide: BTreeMap::new(),
            rels_additions: BTreeMap::new(),
            new_rels_parts: BTreeMap::new(),
        };

        for slide in self
            .slides
            .iter()
            .filter(|s| !self.removed.contains(&s.number))
        {
            let slide_xml = self.entry_str(&slide.path)?;
            let lookup = xml::find_placeholder(slide_xml, placeholder_name)?;
            if !lookup.found {
                log::debug!(
                    "Slide {}: no shape named '{}', skipping logo",
                    slide.number,
                    placeholder_name
                );
                continue;
            }

            let frame = match (lookup.frame, &lookup.ph_idx) {
                (Some(frame), _) => Some(frame),
                (None, Some(idx)) => self.layout_frame_for(&slide.path, idx)?,
                (None, None) => None,
            };
            let Some(frame) = frame else {
                log::warn!(
                    "Slide {}: placeholder '{}' has no position on slide or layout, skipping logo",
                    slide.number,
                    placeholder_name
                );
                continue;
            };

            let target = format!("../media/{}", media_file);
            let rel_id = match self.entry(&rels_path_for(&slide.path)) {
                Some(_) => {
                    let rels = self.slide_rels(&slide.path)?.unwrap_or_default();
                    let rel_id = next_rel_id(&rels);
                    plan.rels_additions.insert(
                        rels_path_for(&slide.path),
                        relationship_xml(&rel_id, IMAGE_REL_TYPE, &target),
                    );
                    rel_id
                }
                None => {
                    let rel_id = "rId1".to_string();
                    plan.new_rels_parts.insert(
                        rels_path_for(&slide.path),
                        rels_document(&relationship_xml(&rel_id, IMAGE_REL_TYPE, &target)),
                    );
                    rel_id
                }
            };

            // Keep the placeholder height, scale width from the logo's
            // aspect ratio.
            let cx =
                (frame.cy as i128 * logo.width_px as i128 / logo.height_px as i128) as i64;
            let pic = pic_xml(lookup.max_shape_id + 1, &rel_id, &frame, cx);
            plan.pic_by_slide.insert(slide.path.clone(), pic);
        }

        Ok(Some(plan))
    }

    fn layout_frame_for(&self, slide_path: &str, ph_idx: &str) -> Result<Option<Frame>> {
        let Some(rels) = self.slide_rels(slide_path)? else {
            return Ok(None);
        };
        let Some(rel) = rels.iter().find(|r| r.rel_type == LAYOUT_REL_TYPE) else {
            return Ok(None);
        };
        let base_dir = slide_path.rsplit_once('/').map(|(d, _)| d).unwrap_or("");
        let layout_path = resolve_target(base_dir, &rel.target);
        xml::find_layout_frame(self.entry_str(&layout_path)?, ph_idx)
    }

    fn next_media_path(&self) -> String {
        let max = self
            .entries
            .iter()
            .filter_map(|(name, _)| name.strip_prefix("ppt/media/image"))
            .filter_map(|rest| rest.split('.').next())
            .filter_map(|digits| digits.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        format!("ppt/media/image{}.png", max + 1)
    }
}

struct LogoPlan {
    media_path: String,
    media_data: Vec<u8>,
    /// Slide part path -> `<p:pic>` fragment to append to its shape tree.
    pic_by_slide: BTreeMap<String, String>,
    /// Rels part path -> `<Relationship>` fragment to append.
    rels_additions: BTreeMap<String, String>,
    /// Rels parts created from scratch for slides that had none.
    new_rels_parts: BTreeMap<String, String>,
}

/// Collect the `r:id` of every `p:sldId` in presentation.xml, in
/// document order. This is the authoritative slide order.
fn slide_rel_ids(presentation_xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(presentation_xml);
    let mut ids = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if local_name(e.name().as_ref()) == b"sldId" =>
            {
                if let Some(id) = attr_value(e, b"r:id") {
                    ids.push(id);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!(
                    "Error parsing presentation.xml: {}",
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(ids)
}

fn has_png_default(content_types_xml: &str) -> Result<bool> {
    let mut reader = Reader::from_str(content_types_xml);
    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.name().as_ref() == b"Default" =>
            {
                if attr_value(e, b"Extension").as_deref() == Some("png") {
                    return Ok(true);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!(
                    "Error parsing content types: {}",
                    e
                )));
            }
            _ => {}
        }
    }
    Ok(false)
}

fn relationship_xml(id: &str, rel_type: &str, target: &str) -> String {
    format!(
        r#"<Relationship Id="{}" Type="{}" Target="{}"/>"#,
        id, rel_type, target
    )
}

fn rels_document(body: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">{}</Relationships>",
        body
    )
}

fn pic_xml(shape_id: u64, rel_id: &str, frame: &Frame, cx: i64) -> String {
    format!(
        concat!(
            "<p:pic><p:nvPicPr><p:cNvPr id=\"{id}\" name=\"Logo Picture {id}\"/>",
            "<p:cNvPicPr><a:picLocks noChangeAspect=\"1\"/></p:cNvPicPr><p:nvPr/></p:nvPicPr>",
            "<p:blipFill><a:blip r:embed=\"{rid}\"/><a:stretch><a:fillRect/></a:stretch></p:blipFill>",
            "<p:spPr><a:xfrm><a:off x=\"{x}\" y=\"{y}\"/><a:ext cx=\"{cx}\" cy=\"{cy}\"/></a:xfrm>",
            "<a:prstGeom prst=\"rect\"><a:avLst/></a:prstGeom></p:spPr></p:pic>"
        ),
        id = shape_id,
        rid = rel_id,
        x = frame.x,
        y = frame.y,
        cx = cx,
        cy = frame.cy,
    )
}
