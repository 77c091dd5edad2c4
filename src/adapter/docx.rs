//! DOCX adapter.

use std::collections::HashMap;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::ooxml::{attr, is_off, read_core_properties, ListBuilder, Package};
use super::ExtractContext;
use crate::detect::DocumentFormat;
use crate::error::{Error, Result};
use crate::model::{Block, Document, TextRun};

const DOCUMENT_PART: &str = "word/document.xml";

/// Extracts structure from Word documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DocxAdapter;

impl DocxAdapter {
    /// Extract a document from DOCX bytes.
    pub fn extract(
        &self,
        data: &[u8],
        filename: &Path,
        ctx: &mut ExtractContext<'_>,
    ) -> Result<Document> {
        let mut package = Package::open(data)?;
        let body = package.read_string(DOCUMENT_PART)?.ok_or_else(|| {
            Error::SourceUnreadable(format!("missing {} in package", DOCUMENT_PART))
        })?;

        let styles = match package.read_string("word/styles.xml")? {
            Some(xml) => parse_styles(&xml),
            None => HashMap::new(),
        };
        let numbering = match package.read_string("word/numbering.xml")? {
            Some(xml) => Numbering::parse(&xml),
            None => Numbering::default(),
        };
        let relationships = package.relationships(DOCUMENT_PART)?;
        log::debug!(
            "DOCX {}: {} styles, {} relationships",
            filename.display(),
            styles.len(),
            relationships.len()
        );

        let mut document = Document::new(filename, DocumentFormat::Docx);
        read_core_properties(&mut package, &mut document.metadata);

        let items = walk_body(&body, &styles, &numbering)?;
        let mut lists = ListBuilder::default();
        let mut image_count = 0;
        for item in items {
            if !matches!(item, BodyItem::ListItem { .. }) {
                if let Some(list) = lists.finish() {
                    document.push(list);
                }
            }
            match item {
                BodyItem::Block(block) => document.push(block),
                BodyItem::ListItem {
                    level,
                    ordered,
                    block,
                } => lists.push(level, ordered, block),
                BodyItem::Image { rel_id, alt } => {
                    image_count += 1;
                    let alt = alt.unwrap_or_else(|| format!("Image {}", image_count));
                    if let Some(block) = load_image(&mut package, &relationships, &rel_id, &alt, ctx) {
                        document.push(block);
                    }
                }
            }
        }
        if let Some(list) = lists.finish() {
            document.push(list);
        }

        Ok(document)
    }
}

fn load_image(
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

/// What a paragraph style means structurally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StyleRole {
    Heading(u8),
    List { ordered: bool },
}

/// Map a style name (or id) to its role.
fn style_role(name: &str) -> Option<StyleRole> {
    let lower = name.to_ascii_lowercase();
    let compact: String = lower.chars().filter(|c| !c.is_whitespace()).collect();
    if compact == "title" {
        return Some(StyleRole::Heading(1));
    }
    if let Some(level) = compact.strip_prefix("heading") {
        return match level.parse::<u8>() {
            Ok(n) if n >= 1 => Some(StyleRole::Heading(n.min(6))),
            _ => None,
        };
    }
    if compact.starts_with("listbullet") {
        return Some(StyleRole::List { ordered: false });
    }
    if compact.starts_with("listnumber") {
        return Some(StyleRole::List { ordered: true });
    }
    None
}

/// Resolve style ids to roles through their display names.
fn parse_styles(xml: &str) -> HashMap<String, StyleRole> {
    let mut roles = HashMap::new();
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut current_id: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"style" => {
                current_id = attr(&e, b"styleId");
            }
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"name" => {
                if let (Some(id), Some(name)) = (current_id.as_ref(), attr(&e, b"val")) {
                    if let Some(role) = style_role(&name) {
                        roles.insert(id.clone(), role);
                    }
                }
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"style" => current_id = None,
            Ok(Event::Eof) => break,
            Err(e) => {
                log::warn!("Malformed styles.xml, ignoring remaining styles: {}", e);
                break;
            }
            _ => {}
        }
        buf.clear();
    }
    roles
}

/// Numbering definitions: which `(numId, ilvl)` pairs are bullets.
#[derive(Debug, Default)]
struct Numbering {
    num_to_abstract: HashMap<String, String>,
    formats: HashMap<(String, u8), String>,
}

impl Numbering {
    fn parse(xml: &str) -> Self {
        let mut numbering = Numbering::default();
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);
        let mut buf = Vec::new();
        let mut abstract_id: Option<String> = None;
        let mut level: Option<u8> = None;
        let mut num_id: Option<String> = None;

        loop {
            let event = match reader.read_event_into(&mut buf) {
                Ok(event) => event,
                Err(e) => {
                    log::warn!("Malformed numbering.xml: {}", e);
                    break;
                }
            };
            match event {
                Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                    b"abstractNum" => abstract_id = attr(&e, b"abstractNumId"),
                    b"lvl" => level = attr(&e, b"ilvl").and_then(|v| v.parse().ok()),
                    b"numFmt" => {
                        if let (Some(id), Some(lvl), Some(fmt)) =
                            (abstract_id.as_ref(), level, attr(&e, b"val"))
                        {
                            numbering.formats.insert((id.clone(), lvl), fmt);
                        }
                    }
                    b"num" => num_id = attr(&e, b"numId"),
                    b"abstractNumId" => {
                        if let (Some(num), Some(target)) = (num_id.as_ref(), attr(&e, b"val")) {
                            numbering.num_to_abstract.insert(num.clone(), target);
                        }
                    }
                    _ => {}
                },
                Event::End(e) => match e.local_name().as_ref() {
                    b"abstractNum" => abstract_id = None,
                    b"lvl" => level = None,
                    b"num" => num_id = None,
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
        numbering
    }

    /// Ordered unless the level is defined as a bullet.
    fn is_ordered(&self, num_id: &str, level: u8) -> bool {
        self.num_to_abstract
            .get(num_id)
            .and_then(|abs| self.formats.get(&(abs.clone(), level)))
            .map(|fmt| fmt != "bullet" && fmt != "none")
            .unwrap_or(false)
    }
}

/// A top-level item of the document body.
#[derive(Debug, Clone, PartialEq)]
enum BodyItem {
    Block(Block),
    ListItem {
        level: usize,
        ordered: bool,
        block: Block,
    },
    Image {
        rel_id: String,
        alt: Option<String>,
    },
}

#[derive(Debug, Default)]
struct ParagraphState {
    style: Option<String>,
    num_id: Option<String>,
    ilvl: u8,
    runs: Vec<TextRun>,
}

impl ParagraphState {
    fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

#[derive(Debug, Default)]
struct TableState {
    rows: Vec<Vec<String>>,
    row: Vec<String>,
    cell: Vec<String>,
    span: usize,
}

#[derive(Debug, Default)]
struct RunState {
    bold: bool,
    italic: bool,
    text: String,
}

/// Walks `word/document.xml` into body items.
struct BodyWalker<'a> {
    styles: &'a HashMap<String, StyleRole>,
    numbering: &'a Numbering,
    items: Vec<BodyItem>,
    paragraph: Option<ParagraphState>,
    run: Option<RunState>,
    tables: Vec<TableState>,
    in_text: bool,
    in_run_props: bool,
    pending_images: Vec<BodyItem>,
    drawing_alt: Option<String>,
}

impl<'a> BodyWalker<'a> {
    fn new(styles: &'a HashMap<String, StyleRole>, numbering: &'a Numbering) -> Self {
        Self {
            styles,
            numbering,
            items: Vec::new(),
            paragraph: None,
            run: None,
            tables: Vec::new(),
            in_text: false,
            in_run_props: false,
            pending_images: Vec::new(),
            drawing_alt: None,
        }
    }

    fn start(&mut self, e: &BytesStart<'_>, empty: bool) {
        match e.local_name().as_ref() {
            b"p" => self.paragraph = Some(ParagraphState::default()),
            b"pStyle" => {
                if let Some(p) = self.paragraph.as_mut() {
                    p.style = attr(e, b"val");
                }
            }
            b"numId" => {
                if let Some(p) = self.paragraph.as_mut() {
                    p.num_id = attr(e, b"val").filter(|v| v != "0");
                }
            }
            b"ilvl" => {
                if let Some(p) = self.paragraph.as_mut() {
                    p.ilvl = attr(e, b"val").and_then(|v| v.parse().ok()).unwrap_or(0);
                }
            }
            b"r" if !empty => self.run = Some(RunState::default()),
            b"rPr" if !empty => self.in_run_props = true,
            b"b" if self.in_run_props => {
                if let Some(run) = self.run.as_mut() {
                    run.bold = !is_off(e);
                }
            }
            b"i" if self.in_run_props => {
                if let Some(run) = self.run.as_mut() {
                    run.italic = !is_off(e);
                }
            }
            b"t" if !empty => self.in_text = true,
            b"tab" | b"br" | b"cr" => self.push_text(" "),
            b"docPr" => {
                self.drawing_alt = attr(e, b"descr")
                    .filter(|s| !s.trim().is_empty())
                    .or_else(|| attr(e, b"title").filter(|s| !s.trim().is_empty()));
            }
            b"blip" => {
                if let Some(rel_id) = attr(e, b"embed") {
                    self.pending_images.push(BodyItem::Image {
                        rel_id,
                        alt: self.drawing_alt.take(),
                    });
                }
            }
            b"tbl" if !empty => self.tables.push(TableState::default()),
            b"tr" if !empty => {
                if let Some(table) = self.tables.last_mut() {
                    table.row.clear();
                }
            }
            b"tc" if !empty => {
                if let Some(table) = self.tables.last_mut() {
                    table.cell.clear();
                    table.span = 1;
                }
            }
            b"gridSpan" => {
                if let Some(table) = self.tables.last_mut() {
                    table.span = attr(e, b"val").and_then(|v| v.parse().ok()).unwrap_or(1).max(1);
                }
            }
            _ => {}
        }
    }

    fn end(&mut self, local_name: &[u8]) {
        match local_name {
            b"t" => self.in_text = false,
            b"rPr" => self.in_run_props = false,
            b"r" => {
                if let (Some(run), Some(p)) = (self.run.take(), self.paragraph.as_mut()) {
                    if !run.text.is_empty() {
                        p.runs.push(TextRun::new(run.text, run.bold, run.italic));
                    }
                }
            }
            b"p" => {
                if let Some(p) = self.paragraph.take() {
                    self.finish_paragraph(p);
                }
            }
            b"tc" => {
                if let Some(table) = self.tables.last_mut() {
                    let text = table.cell.join(" ");
                    table.row.push(text);
                    for _ in 1..table.span {
                        table.row.push(String::new());
                    }
                    table.cell.clear();
                }
            }
            b"tr" => {
                if let Some(table) = self.tables.last_mut() {
                    let row = std::mem::take(&mut table.row);
                    if !row.is_empty() {
                        table.rows.push(row);
                    }
                }
            }
            b"tbl" => {
                if let Some(table) = self.tables.pop() {
                    self.finish_table(table);
                }
            }
            _ => {}
        }
    }

    fn push_text(&mut self, text: &str) {
        if let Some(run) = self.run.as_mut() {
            run.text.push_str(text);
        }
    }

    fn finish_paragraph(&mut self, p: ParagraphState) {
        if let Some(table) = self.tables.last_mut() {
            let text = p.text();
            let text = text.trim();
            if !text.is_empty() {
                table.cell.push(text.to_string());
            }
            return;
        }

        let role = p.style.as_deref().and_then(|id| {
            self.styles
                .get(id)
                .copied()
                .or_else(|| style_role(id))
        });

        let text = p.text();
        if !text.trim().is_empty() {
            let item = match (role, p.num_id.as_deref()) {
                (Some(StyleRole::Heading(level)), _) => {
                    BodyItem::Block(Block::heading(level, text.trim()))
                }
                (_, Some(num_id)) => BodyItem::ListItem {
                    level: usize::from(p.ilvl),
                    ordered: self.numbering.is_ordered(num_id, p.ilvl),
                    block: Block::paragraph_runs(p.runs),
                },
                (Some(StyleRole::List { ordered }), None) => BodyItem::ListItem {
                    level: usize::from(p.ilvl),
                    ordered,
                    block: Block::paragraph_runs(p.runs),
                },
                (None, None) => BodyItem::Block(Block::paragraph_runs(p.runs)),
            };
            self.items.push(item);
        }
        self.items.append(&mut self.pending_images);
    }

    fn finish_table(&mut self, table: TableState) {
        if let Some(outer) = self.tables.last_mut() {
            // Nested tables flatten into the enclosing cell
            let text = table
                .rows
                .iter()
                .flatten()
                .filter(|c| !c.is_empty())
                .cloned()
                .collect::<Vec<_>>()
                .join(" ");
            if !text.is_empty() {
                outer.cell.push(text);
            }
            return;
        }
        if !table.rows.is_empty() {
            self.items.push(BodyItem::Block(Block::table(table.rows)));
        }
        self.items.append(&mut self.pending_images);
    }
}

fn walk_body(xml: &str, styles: &HashMap<String, StyleRole>, numbering: &Numbering) -> Result<Vec<BodyItem>> {
    let mut walker = BodyWalker::new(styles, numbering);
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => walker.start(&e, false),
            Event::Empty(e) => {
                walker.start(&e, true);
                let name = e.local_name();
                // Self-closing paragraphs still end
                if name.as_ref() == b"p" {
                    walker.end(b"p");
                }
            }
            Event::End(e) => walker.end(e.local_name().as_ref()),
            Event::Text(t) if walker.in_text => {
                let text = t.unescape()?;
                walker.push_text(&text);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(walker.items)
}

#[cfg(test)]
mod tests {
    use super::super::ooxml::test_support::{build_package, CORE_XML};
    use super::*;
    use crate::assets::AssetPipeline;
    use crate::options::ConversionOptions;

    const STYLES: &str = r#"<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:style w:type="paragraph" w:styleId="Heading2"><w:name w:val="heading 2"/></w:style>
  <w:style w:type="paragraph" w:styleId="Title"><w:name w:val="Title"/></w:style>
  <w:style w:type="paragraph" w:styleId="ListBullet"><w:name w:val="List Bullet"/></w:style>
  <w:style w:type="paragraph" w:styleId="Custom1"><w:name w:val="heading 3"/></w:style>
</w:styles>"#;

    const NUMBERING: &str = r#"<w:numbering xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:abstractNum w:abstractNumId="0">
    <w:lvl w:ilvl="0"><w:numFmt w:val="decimal"/></w:lvl>
    <w:lvl w:ilvl="1"><w:numFmt w:val="bullet"/></w:lvl>
  </w:abstractNum>
  <w:num w:numId="5"><w:abstractNumId w:val="0"/></w:num>
</w:numbering>"#;

    fn docx(body: &str, extra: &[(&str, &[u8])]) -> Vec<u8> {
        let document = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing"><w:body>{}</w:body></w:document>"#,
            body
        );
        let mut parts: Vec<(&str, &[u8])> = vec![
            ("word/document.xml", document.as_bytes()),
            ("word/styles.xml", STYLES.as_bytes()),
            ("word/numbering.xml", NUMBERING.as_bytes()),
        ];
        parts.extend_from_slice(extra);
        build_package(&parts)
    }

    fn para(style: &str, text: &str) -> String {
        format!(
            r#"<w:p><w:pPr><w:pStyle w:val="{}"/></w:pPr><w:r><w:t>{}</w:t></w:r></w:p>"#,
            style, text
        )
    }

    fn extract(data: &[u8]) -> Document {
        let options = ConversionOptions::default();
        let mut ctx = ExtractContext::without_assets(&options);
        DocxAdapter
            .extract(data, Path::new("report.docx"), &mut ctx)
            .unwrap()
    }

    fn blocks(doc: &Document) -> Vec<Block> {
        doc.blocks().cloned().collect()
    }

    #[test]
    fn test_heading_styles() {
        let body = format!(
            "{}{}{}",
            para("Title", "Report"),
            para("Heading2", "Background"),
            para("Custom1", "Details")
        );
        let doc = extract(&docx(&body, &[]));
        assert_eq!(
            blocks(&doc),
            vec![
                Block::heading(1, "Report"),
                Block::heading(2, "Background"),
                Block::heading(3, "Details"),
            ]
        );
    }

    #[test]
    fn test_style_id_fallback_without_styles_part() {
        let document = format!(
            r#"<w:document xmlns:w="w"><w:body>{}</w:body></w:document>"#,
            para("Heading4", "Deep")
        );
        let data = build_package(&[("word/document.xml", document.as_bytes())]);
        assert_eq!(blocks(&extract(&data)), vec![Block::heading(4, "Deep")]);
    }

    #[test]
    fn test_run_emphasis_honours_val() {
        let body = r#"<w:p>
<w:r><w:rPr><w:b/></w:rPr><w:t>Bold</w:t></w:r>
<w:r><w:rPr><w:b w:val="0"/><w:i/></w:rPr><w:t xml:space="preserve"> italic</w:t></w:r>
<w:r><w:rPr><w:i w:val="false"/></w:rPr><w:t xml:space="preserve"> plain</w:t></w:r>
</w:p>"#;
        let doc = extract(&docx(body, &[]));
        assert_eq!(
            blocks(&doc),
            vec![Block::paragraph_runs(vec![
                TextRun::new("Bold", true, false),
                TextRun::new(" italic", false, true),
                TextRun::new(" plain", false, false),
            ])]
        );
    }

    #[test]
    fn test_numbered_list_nesting() {
        let item = |level: u8, text: &str| {
            format!(
                r#"<w:p><w:pPr><w:numPr><w:ilvl w:val="{}"/><w:numId w:val="5"/></w:numPr></w:pPr><w:r><w:t>{}</w:t></w:r></w:p>"#,
                level, text
            )
        };
        let body = format!(
            "{}{}{}{}",
            item(0, "First"),
            item(1, "Sub"),
            item(0, "Second"),
            para("Normal", "After")
        );
        let doc = extract(&docx(&body, &[]));
        assert_eq!(
            blocks(&doc),
            vec![
                Block::list(
                    true,
                    vec![
                        Block::paragraph("First"),
                        Block::list(false, vec![Block::paragraph("Sub")]),
                        Block::paragraph("Second"),
                    ]
                ),
                Block::paragraph("After"),
            ]
        );
    }

    #[test]
    fn test_list_bullet_style() {
        let body = format!("{}{}", para("ListBullet", "one"), para("ListBullet", "two"));
        let doc = extract(&docx(&body, &[]));
        assert_eq!(
            blocks(&doc),
            vec![Block::list(
                false,
                vec![Block::paragraph("one"), Block::paragraph("two")]
            )]
        );
    }

    #[test]
    fn test_table_with_grid_span() {
        let cell = |text: &str| format!("<w:tc><w:p><w:r><w:t>{}</w:t></w:r></w:p></w:tc>", text);
        let body = format!(
            "<w:tbl><w:tr>{}{}{}</w:tr><w:tr><w:tc><w:tcPr><w:gridSpan w:val=\"2\"/></w:tcPr><w:p><w:r><w:t>Wide</w:t></w:r></w:p></w:tc>{}</w:tr></w:tbl>",
            cell("A"),
            cell("B"),
            cell("C"),
            cell("D")
        );
        let doc = extract(&docx(&body, &[]));
        assert_eq!(
            blocks(&doc),
            vec![Block::table(vec![
                vec!["A".into(), "B".into(), "C".into()],
                vec!["Wide".into(), String::new(), "D".into()],
            ])]
        );
    }

    #[test]
    fn test_core_properties_metadata() {
        let body = para("Normal", "Text");
        let doc = extract(&docx(&body, &[("docProps/core.xml", CORE_XML.as_bytes())]));
        assert_eq!(doc.metadata.get_str("author"), Some("Jane Doe"));
        assert_eq!(doc.metadata.get_str("title"), Some("Annual Report"));
    }

    #[test]
    fn test_missing_document_part() {
        let data = build_package(&[("word/styles.xml", STYLES.as_bytes())]);
        let options = ConversionOptions::default();
        let mut ctx = ExtractContext::without_assets(&options);
        let err = DocxAdapter
            .extract(&data, Path::new("x.docx"), &mut ctx)
            .unwrap_err();
        assert!(matches!(err, Error::SourceUnreadable(_)));
    }

    #[test]
    fn test_drawing_written_to_assets() {
        let mut png = Vec::new();
        image::DynamicImage::new_rgb8(4, 3)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let rels = br#"<Relationships><Relationship Id="rId9" Type="image" Target="media/image1.png"/></Relationships>"#;
        let body = r#"<w:p><w:r><w:drawing><wp:inline><wp:docPr id="1" name="Picture 1" descr="Sales chart"/><a:graphic><a:graphicData><pic:pic xmlns:pic="p"><pic:blipFill><a:blip r:embed="rId9"/></pic:blipFill></pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing></w:r></w:p>"#;
        let data = docx(
            body,
            &[
                ("word/_rels/document.xml.rels", rels),
                ("word/media/image1.png", &png),
            ],
        );

        let dir = tempfile::tempdir().unwrap();
        let options = ConversionOptions::default();
        let mut ctx = ExtractContext::new(&options, AssetPipeline::new(dir.path(), "report", &options));
        let doc = DocxAdapter
            .extract(&data, Path::new("report.docx"), &mut ctx)
            .unwrap();

        assert_eq!(
            blocks(&doc),
            vec![Block::image("assets/report-1.png", "Sales chart", Some(4), Some(3))]
        );
        assert!(dir.path().join("assets/report-1.png").exists());
    }

    #[test]
    fn test_style_role() {
        assert_eq!(style_role("heading 1"), Some(StyleRole::Heading(1)));
        assert_eq!(style_role("Heading 9"), Some(StyleRole::Heading(6)));
        assert_eq!(style_role("List Number 2"), Some(StyleRole::List { ordered: true }));
        assert_eq!(style_role("Normal"), None);
        assert_eq!(style_role("Heading"), None);
    }
}
