//! PPTX adapter.
//!
//! Every slide becomes a section: its title placeholder is the heading and
//! the remaining shapes follow in document order. Slides without a title
//! are headed `Slide N`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;

use super::ooxml::{attr, read_core_properties, ListBuilder, Package};
use super::ExtractContext;
use crate::detect::DocumentFormat;
use crate::error::Result;
use crate::model::{Block, Document, TextRun};

fn slide_part_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^ppt/slides/slide(\d+)\.xml$").expect("valid slide part regex"))
}

/// Extracts structure from PowerPoint presentations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PptxAdapter;

impl PptxAdapter {
    /// Extract a document from PPTX bytes.
    pub fn extract(
        &self,
        data: &[u8],
        filename: &Path,
        ctx: &mut ExtractContext<'_>,
    ) -> Result<Document> {
        let mut package = Package::open(data)?;
        let slides = slide_parts(&package.part_names());
        log::debug!("PPTX {}: {} slides", filename.display(), slides.len());

        let mut document = Document::new(filename, DocumentFormat::Pptx);
        read_core_properties(&mut package, &mut document.metadata);
        document.metadata.set("slide_count", slides.len());

        let mut image_count = 0;
        for (index, part) in slides.iter().enumerate() {
            let number = index + 1;
            let Some(xml) = package.read_string(part)? else {
                continue;
            };
            let slide = parse_slide(&xml)?;
            let relationships = package.relationships(part)?;

            let heading = match slide.title {
                Some((text, centered)) => {
                    let level = if centered && index == 0 { 1 } else { 2 };
                    Block::heading(level, text)
                }
                None => Block::heading(2, format!("Slide {}", number)),
            };
            document.push(heading);

            for item in slide.items {
                match item {
                    SlideItem::Block(block) => document.push(block),
                    SlideItem::Picture { rel_id, alt } => {
                        image_count += 1;
                        let alt = alt.unwrap_or_else(|| format!("Slide {} image {}", number, image_count));
                        if let Some(block) = load_picture(&mut package, &relationships, &rel_id, &alt, ctx) {
                            document.push(block);
                        }
                    }
                }
            }
        }

        Ok(document)
    }
}

/// Slide part names in numeric order.
fn slide_parts(names: &[String]) -> Vec<String> {
    let mut slides: Vec<(u32, String)> = names
        .iter()
        .filter_map(|name| {
            let caps = slide_part_regex().captures(name)?;
            let number = caps[1].parse().ok()?;
            Some((number, name.clone()))
        })
        .collect();
    slides.sort_by_key(|(number, _)| *number);
    slides.into_iter().map(|(_, name)| name).collect()
}

fn load_picture(
    package: &mut Package<'_>,
    relationships: &HashMap<String, String>,
    rel_id: &str,
    alt: &str,
    ctx: &mut ExtractContext<'_>,
) -> Option<Block> {
    if !ctx.images_enabled() {
        return None;
    }
    let Some(part) = relationships.get(rel_id) else {
        return ctx.image_placeholder(alt, &format!("unknown relationship {}", rel_id));
    };
    match package.read_bytes(part) {
        Ok(Some(bytes)) => {
            let ext = part.rsplit_once('.').map(|(_, ext)| ext);
            ctx.store_image(&bytes, ext, alt)
        }
        Ok(None) => ctx.image_placeholder(alt, &format!("missing part {}", part)),
        Err(e) => ctx.image_placeholder(alt, &e.to_string()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShapeKind {
    Title,
    CenteredTitle,
    Body,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Bullet {
    #[default]
    Inherited,
    None,
    Char,
    AutoNum,
}

#[derive(Debug, Default)]
struct SlideParagraph {
    level: usize,
    bullet: Bullet,
    runs: Vec<TextRun>,
}

impl SlideParagraph {
    fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

#[derive(Debug)]
enum SlideItem {
    Block(Block),
    Picture { rel_id: String, alt: Option<String> },
}

#[derive(Debug, Default)]
struct Slide {
    /// Title text and whether it came from a centered title placeholder
    title: Option<(String, bool)>,
    items: Vec<SlideItem>,
}

#[derive(Debug, Default)]
struct TableState {
    rows: Vec<Vec<String>>,
    row: Vec<String>,
    cell: Vec<String>,
}

/// Walks one slide part.
#[derive(Default)]
struct SlideWalker {
    slide: Slide,
    shape: Option<(ShapeKind, Vec<SlideParagraph>)>,
    paragraph: Option<SlideParagraph>,
    run: Option<TextRun>,
    in_text: bool,
    in_run_props: bool,
    table: Option<TableState>,
    picture_alt: Option<Option<String>>,
}

impl SlideWalker {
    fn start(&mut self, e: &BytesStart<'_>, empty: bool) {
        match e.local_name().as_ref() {
            b"sp" if !empty => self.shape = Some((ShapeKind::Other, Vec::new())),
            b"ph" => {
                if let Some((kind, _)) = self.shape.as_mut() {
                    *kind = match attr(e, b"type").as_deref() {
                        Some("title") => ShapeKind::Title,
                        Some("ctrTitle") => ShapeKind::CenteredTitle,
                        Some("body") | Some("obj") | None => ShapeKind::Body,
                        Some(_) => ShapeKind::Other,
                    };
                }
            }
            b"pic" if !empty => self.picture_alt = Some(None),
            b"cNvPr" => {
                if let Some(alt) = self.picture_alt.as_mut() {
                    *alt = attr(e, b"descr").filter(|s| !s.trim().is_empty());
                }
            }
            b"blip" => {
                if let (Some(alt), Some(rel_id)) = (self.picture_alt.as_mut(), attr(e, b"embed")) {
                    self.slide.items.push(SlideItem::Picture {
                        rel_id,
                        alt: alt.take(),
                    });
                }
            }
            b"tbl" if !empty => self.table = Some(TableState::default()),
            b"tr" if !empty => {
                if let Some(table) = self.table.as_mut() {
                    table.row.clear();
                }
            }
            b"tc" => {
                if let Some(table) = self.table.as_mut() {
                    table.cell.clear();
                    if empty {
                        table.row.push(String::new());
                    }
                }
            }
            b"p" => {
                self.paragraph = Some(SlideParagraph::default());
                if empty {
                    self.end(b"p");
                }
            }
            b"pPr" => {
                if let Some(p) = self.paragraph.as_mut() {
                    p.level = attr(e, b"lvl").and_then(|v| v.parse().ok()).unwrap_or(0);
                }
            }
            b"buNone" => self.set_bullet(Bullet::None),
            b"buChar" | b"buBlip" => self.set_bullet(Bullet::Char),
            b"buAutoNum" => self.set_bullet(Bullet::AutoNum),
            b"r" if !empty => self.run = Some(TextRun::default()),
            b"rPr" => {
                if let Some(run) = self.run.as_mut() {
                    run.bold = attr(e, b"b").is_some_and(|v| v == "1" || v == "true");
                    run.italic = attr(e, b"i").is_some_and(|v| v == "1" || v == "true");
                }
                self.in_run_props = !empty;
            }
            b"t" if !empty => self.in_text = true,
            b"br" => {
                if let Some(p) = self.paragraph.as_mut() {
                    p.runs.push(TextRun::plain(" "));
                }
            }
            _ => {}
        }
    }

    fn set_bullet(&mut self, bullet: Bullet) {
        // Bullet properties on run level or list styles do not apply
        if self.in_run_props {
            return;
        }
        if let Some(p) = self.paragraph.as_mut() {
            p.bullet = bullet;
        }
    }

    fn end(&mut self, local_name: &[u8]) {
        match local_name {
            b"t" => self.in_text = false,
            b"rPr" => self.in_run_props = false,
            b"r" => {
                if let (Some(run), Some(p)) = (self.run.take(), self.paragraph.as_mut()) {
                    if !run.text.is_empty() {
                        p.runs.push(run);
                    }
                }
            }
            b"p" => {
                let Some(p) = self.paragraph.take() else { return };
                if let Some(table) = self.table.as_mut() {
                    let text = p.text();
                    if !text.trim().is_empty() {
                        table.cell.push(text.trim().to_string());
                    }
                } else if let Some((_, paragraphs)) = self.shape.as_mut() {
                    paragraphs.push(p);
                }
            }
            b"tc" => {
                if let Some(table) = self.table.as_mut() {
                    let text = table.cell.join(" ");
                    table.row.push(text);
                }
            }
            b"tr" => {
                if let Some(table) = self.table.as_mut() {
                    let row = std::mem::take(&mut table.row);
                    if !row.is_empty() {
                        table.rows.push(row);
                    }
                }
            }
            b"tbl" => {
                if let Some(table) = self.table.take() {
                    if table.rows.iter().flatten().any(|c| !c.is_empty()) {
                        self.slide.items.push(SlideItem::Block(Block::table(table.rows)));
                    }
                }
            }
            b"pic" => self.picture_alt = None,
            b"sp" => {
                if let Some((kind, paragraphs)) = self.shape.take() {
                    self.finish_shape(kind, paragraphs);
                }
            }
            _ => {}
        }
    }

    fn finish_shape(&mut self, kind: ShapeKind, paragraphs: Vec<SlideParagraph>) {
        match kind {
            ShapeKind::Title | ShapeKind::CenteredTitle => {
                let text = paragraphs
                    .iter()
                    .map(|p| p.text().trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ");
                if text.is_empty() {
                    return;
                }
                if self.slide.title.is_none() {
                    self.slide.title = Some((text, kind == ShapeKind::CenteredTitle));
                } else {
                    self.slide.items.push(SlideItem::Block(Block::paragraph(text)));
                }
            }
            ShapeKind::Body | ShapeKind::Other => {
                let mut lists = ListBuilder::default();
                for p in paragraphs {
                    if p.text().trim().is_empty() {
                        continue;
                    }
                    let list = match p.bullet {
                        Bullet::None => None,
                        Bullet::AutoNum => Some(true),
                        Bullet::Char => Some(false),
                        Bullet::Inherited if kind == ShapeKind::Body => Some(false),
                        Bullet::Inherited => None,
                    };
                    match list {
                        Some(ordered) => lists.push(p.level, ordered, Block::paragraph_runs(p.runs)),
                        None => {
                            if let Some(list) = lists.finish() {
                                self.slide.items.push(SlideItem::Block(list));
                            }
                            self.slide
                                .items
                                .push(SlideItem::Block(Block::paragraph_runs(p.runs)));
                        }
                    }
                }
                if let Some(list) = lists.finish() {
                    self.slide.items.push(SlideItem::Block(list));
                }
            }
        }
    }
}

fn parse_slide(xml: &str) -> Result<Slide> {
    let mut walker = SlideWalker::default();
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => walker.start(&e, false),
            Event::Empty(e) => walker.start(&e, true),
            Event::End(e) => walker.end(e.local_name().as_ref()),
            Event::Text(t) if walker.in_text => {
                let text = t.unescape()?;
                if let Some(run) = walker.run.as_mut() {
                    run.text.push_str(&text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(walker.slide)
}
