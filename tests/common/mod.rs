//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::io::{Cursor, Write};

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Text drawn at `(x, y)` in PDF user space. `F1` is Helvetica, `F2` is
/// Helvetica-Bold.
pub fn text(font: &str, size: i64, x: i64, y: i64, content: &str) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![font.into(), Object::Integer(size)]),
        Operation::new("Td", vec![Object::Integer(x), Object::Integer(y)]),
        Operation::new("Tj", vec![Object::string_literal(content)]),
        Operation::new("ET", vec![]),
    ]
}

/// A stroked line segment.
pub fn line(x0: i64, y0: i64, x1: i64, y1: i64) -> Vec<Operation> {
    vec![
        Operation::new("m", vec![Object::Integer(x0), Object::Integer(y0)]),
        Operation::new("l", vec![Object::Integer(x1), Object::Integer(y1)]),
        Operation::new("S", vec![]),
    ]
}

/// A ruled grid with the given column and row rule positions.
pub fn grid(xs: &[i64], ys: &[i64]) -> Vec<Operation> {
    let (left, right) = (xs[0], xs[xs.len() - 1]);
    let (bottom, top) = (ys[ys.len() - 1], ys[0]);
    let mut ops = Vec::new();
    for &y in ys {
        ops.extend(line(left, y, right, y));
    }
    for &x in xs {
        ops.extend(line(x, bottom, x, top));
    }
    ops
}

/// Build a PDF of Letter-sized pages from content operations.
pub fn build_pdf(pages: &[Vec<Operation>]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let regular = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let bold = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
    });

    let mut kids: Vec<Object> = Vec::new();
    for operations in pages {
        let content = Content {
            operations: operations.clone(),
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => regular, "F2" => bold },
            },
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ],
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

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

/// A paragraph with a style id.
pub fn docx_para(style: &str, content: &str) -> String {
    format!(
        r#"<w:p><w:pPr><w:pStyle w:val="{}"/></w:pPr><w:r><w:t>{}</w:t></w:r></w:p>"#,
        style, content
    )
}

/// A minimal DOCX with the given body XML.
pub fn build_docx(body: &str) -> Vec<u8> {
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><w:body>{}</w:body></w:document>"#,
        body
    );
    build_package(&[("word/document.xml", document.as_bytes())])
}

/// A slide with a title placeholder and a body placeholder of bullets.
pub fn pptx_slide(title: &str, bullets: &[&str]) -> String {
    let paragraphs: String = bullets
        .iter()
        .map(|b| format!("<a:p><a:r><a:t>{}</a:t></a:r></a:p>", b))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><p:cSld><p:spTree><p:sp><p:nvSpPr><p:cNvPr id="2" name="Title"/><p:cNvSpPr/><p:nvPr><p:ph type="title"/></p:nvPr></p:nvSpPr><p:txBody><a:bodyPr/><a:p><a:r><a:t>{}</a:t></a:r></a:p></p:txBody></p:sp><p:sp><p:nvSpPr><p:cNvPr id="3" name="Body"/><p:cNvSpPr/><p:nvPr><p:ph idx="1"/></p:nvPr></p:nvSpPr><p:txBody><a:bodyPr/>{}</p:txBody></p:sp></p:spTree></p:cSld></p:sld>"#,
        title, paragraphs
    )
}

/// A PPTX package from slide XML documents, numbered from 1.
pub fn build_pptx(slides: &[String]) -> Vec<u8> {
    let names: Vec<String> = (1..=slides.len())
        .map(|i| format!("ppt/slides/slide{}.xml", i))
        .collect();
    let parts: Vec<(&str, &[u8])> = names
        .iter()
        .zip(slides)
        .map(|(n, s)| (n.as_str(), s.as_bytes()))
        .collect();
    build_package(&parts)
}
