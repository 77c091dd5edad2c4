//! Shared OOXML package plumbing: part access, relationships, core
//! properties and list nesting.

use std::collections::HashMap;
use std::io::{Cursor, Read};

use chrono::{DateTime, NaiveDateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::Result;
use crate::model::{Block, Metadata};

/// An opened OOXML zip package.
pub(crate) struct Package<'a> {
    archive: ZipArchive<Cursor<&'a [u8]>>,
}

impl<'a> Package<'a> {
    /// Open a package from bytes.
    pub fn open(data: &'a [u8]) -> Result<Self> {
        Ok(Self {
            archive: ZipArchive::new(Cursor::new(data))?,
        })
    }

    /// Read a part, `None` if the package has no such part.
    pub fn read_bytes(&mut self, name: &str) -> Result<Option<Vec<u8>>> {
        let mut file = match self.archive.by_name(name) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut buf = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut buf)?;
        Ok(Some(buf))
    }

    /// Read a part as text.
    pub fn read_string(&mut self, name: &str) -> Result<Option<String>> {
        Ok(self
            .read_bytes(name)?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    /// Names of all parts.
    pub fn part_names(&self) -> Vec<String> {
        self.archive.file_names().map(str::to_string).collect()
    }

    /// Relationships of `part`, keyed by id, with targets resolved to part
    /// names.
    pub fn relationships(&mut self, part: &str) -> Result<HashMap<String, String>> {
        let Some(xml) = self.read_string(&rels_path(part))? else {
            return Ok(HashMap::new());
        };
        let base = part.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
        Ok(parse_relationships(&xml)?
            .into_iter()
            .map(|(id, target)| (id, resolve_target(base, &target)))
            .collect())
    }
}

/// `word/document.xml` -> `word/_rels/document.xml.rels`.
pub(crate) fn rels_path(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

/// Resolve a relationship target against the directory of its source part.
pub(crate) fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut parts: Vec<&str> = base_dir.split('/').filter(|p| !p.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// Parse a `.rels` part into id -> raw target.
pub(crate) fn parse_relationships(xml: &str) -> Result<HashMap<String, String>> {
    let mut relationships = HashMap::new();
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                // External targets (hyperlinks) are not package parts
                if attr(&e, b"TargetMode").as_deref() == Some("External") {
                    continue;
                }
                if let (Some(id), Some(target)) = (attr(&e, b"Id"), attr(&e, b"Target")) {
                    relationships.insert(id, target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(relationships)
}

/// Attribute value by local name.
pub(crate) fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

/// Whether a toggle property (`<w:b w:val="0"/>`) is switched off.
pub(crate) fn is_off(e: &BytesStart<'_>) -> bool {
    matches!(attr(e, b"val").as_deref(), Some("0" | "false" | "off"))
}

/// Read `docProps/core.xml` into `metadata`.
///
/// Missing or malformed properties are ignored.
pub(crate) fn read_core_properties(package: &mut Package<'_>, metadata: &mut Metadata) {
    let xml = match package.read_string("docProps/core.xml") {
        Ok(Some(xml)) => xml,
        Ok(None) => return,
        Err(e) => {
            log::debug!("Unreadable core properties: {}", e);
            return;
        }
    };

    let mut reader = Reader::from_str(&xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut current: Option<&'static str> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                current = match e.local_name().as_ref() {
                    b"title" => Some("title"),
                    b"creator" => Some("author"),
                    b"subject" => Some("subject"),
                    b"keywords" => Some("keywords"),
                    b"description" => Some("description"),
                    b"created" => Some("created"),
                    b"modified" => Some("modified"),
                    _ => None,
                };
            }
            Ok(Event::Text(t)) => {
                let Some(key) = current else { continue };
                let Ok(text) = t.unescape() else { continue };
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                match key {
                    "created" | "modified" => {
                        if let Some(date) = parse_w3c_date(text) {
                            metadata.set(key, date);
                        }
                    }
                    _ => metadata.set(key, text),
                }
            }
            Ok(Event::End(_)) => current = None,
            Ok(Event::Eof) => break,
            Err(e) => {
                log::debug!("Malformed core properties: {}", e);
                break;
            }
            _ => {}
        }
        buf.clear();
    }
}

/// Parse a W3CDTF timestamp (`2024-01-15T10:30:00Z`).
pub(crate) fn parse_w3c_date(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

/// Builds nested `List` blocks from a sequence of leveled items.
#[derive(Debug, Default)]
pub(crate) struct ListBuilder {
    frames: Vec<(bool, Vec<Block>)>,
}

impl ListBuilder {
    /// Add an item at `level` (0 = outermost).
    pub fn push(&mut self, level: usize, ordered: bool, item: Block) {
        while self.frames.len() > level + 1 {
            self.close_frame();
        }
        while self.frames.len() < level + 1 {
            self.frames.push((ordered, Vec::new()));
        }
        if let Some((_, items)) = self.frames.last_mut() {
            items.push(item);
        }
    }

    /// Close every open level and return the outermost list.
    pub fn finish(&mut self) -> Option<Block> {
        while self.frames.len() > 1 {
            self.close_frame();
        }
        self.frames
            .pop()
            .map(|(ordered, items)| Block::list(ordered, items))
    }

    fn close_frame(&mut self) {
        if let Some((ordered, items)) = self.frames.pop() {
            let nested = Block::list(ordered, items);
            if let Some((_, parent)) = self.frames.last_mut() {
                parent.push(nested);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::io::{Cursor, Write};

    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    /// Zip `(name, content)` parts into a package.
    pub fn build_package(parts: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for (name, content) in parts {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    pub const CORE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <dc:title>Annual Report</dc:title>
  <dc:creator>Jane Doe</dc:creator>
  <dcterms:created xsi:type="dcterms:W3CDTF">2024-01-15T10:30:00Z</dcterms:created>
  <dcterms:modified xsi:type="dcterms:W3CDTF">2024-02-01T08:00:00Z</dcterms:modified>
</cp:coreProperties>"#;
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::model::MetaValue;
    use chrono::Datelike;

    #[test]
    fn test_rels_path() {
        assert_eq!(rels_path("word/document.xml"), "word/_rels/document.xml.rels");
        assert_eq!(
            rels_path("ppt/slides/slide3.xml"),
            "ppt/slides/_rels/slide3.xml.rels"
        );
    }

    #[test]
    fn test_resolve_target() {
        assert_eq!(resolve_target("word", "media/image1.png"), "word/media/image1.png");
        assert_eq!(
            resolve_target("ppt/slides", "../media/image2.jpeg"),
            "ppt/media/image2.jpeg"
        );
        assert_eq!(resolve_target("ppt/slides", "/ppt/media/a.png"), "ppt/media/a.png");
    }

    #[test]
    fn test_relationships_skip_external() {
        let xml = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="image" Target="media/image1.png"/>
  <Relationship Id="rId2" Type="hyperlink" Target="https://example.com" TargetMode="External"/>
</Relationships>"#;
        let rels = parse_relationships(xml).unwrap();
        assert_eq!(rels.len(), 1);
        assert_eq!(rels["rId1"], "media/image1.png");
    }

    #[test]
    fn test_package_relationships_resolved() {
        let rels = br#"<Relationships><Relationship Id="rId7" Target="../media/image1.png"/></Relationships>"#;
        let data = build_package(&[("ppt/slides/_rels/slide1.xml.rels", rels)]);
        let mut package = Package::open(&data).unwrap();
        let map = package.relationships("ppt/slides/slide1.xml").unwrap();
        assert_eq!(map["rId7"], "ppt/media/image1.png");
        assert!(package.relationships("ppt/slides/slide2.xml").unwrap().is_empty());
    }

    #[test]
    fn test_missing_part_is_none() {
        let data = build_package(&[("a.xml", b"<a/>")]);
        let mut package = Package::open(&data).unwrap();
        assert!(package.read_bytes("b.xml").unwrap().is_none());
        assert_eq!(package.read_string("a.xml").unwrap().as_deref(), Some("<a/>"));
    }

    #[test]
    fn test_not_a_zip() {
        assert!(Package::open(b"plain text").is_err());
    }

    #[test]
    fn test_core_properties() {
        let data = build_package(&[("docProps/core.xml", CORE_XML.as_bytes())]);
        let mut package = Package::open(&data).unwrap();
        let mut metadata = Metadata::new();
        read_core_properties(&mut package, &mut metadata);

        assert_eq!(metadata.get_str("title"), Some("Annual Report"));
        assert_eq!(metadata.get_str("author"), Some("Jane Doe"));
        match metadata.get("created") {
            Some(MetaValue::DateTime(dt)) => assert_eq!(dt.month(), 1),
            other => panic!("unexpected created value: {:?}", other),
        }
        assert!(metadata.contains("modified"));
    }

    #[test]
    fn test_w3c_date_without_zone() {
        let date = parse_w3c_date("2023-06-30T12:00:00").unwrap();
        assert_eq!(date.year(), 2023);
        assert!(parse_w3c_date("yesterday").is_none());
    }

    #[test]
    fn test_list_builder_nesting() {
        let mut builder = ListBuilder::default();
        builder.push(0, false, Block::paragraph("a"));
        builder.push(1, true, Block::paragraph("a.1"));
        builder.push(1, true, Block::paragraph("a.2"));
        builder.push(0, false, Block::paragraph("b"));

        let list = builder.finish().unwrap();
        assert_eq!(
            list,
            Block::list(
                false,
                vec![
                    Block::paragraph("a"),
                    Block::list(true, vec![Block::paragraph("a.1"), Block::paragraph("a.2")]),
                    Block::paragraph("b"),
                ]
            )
        );
        assert!(builder.finish().is_none());
    }

    #[test]
    fn test_list_builder_closes_deep_levels() {
        let mut builder = ListBuilder::default();
        builder.push(0, true, Block::paragraph("one"));
        builder.push(2, true, Block::paragraph("deep"));
        let list = builder.finish().unwrap();
        match list {
            Block::List { items, .. } => {
                assert_eq!(items.len(), 2);
                assert!(matches!(items[1], Block::List { .. }));
            }
            other => panic!("expected list, got {:?}", other),
        }
    }
}
