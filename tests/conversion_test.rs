//! End-to-end conversion tests over in-memory fixtures.

mod common;

use std::fs;

use common::{build_docx, build_pdf, build_pptx, docx_para, grid, pptx_slide, text};
use undoc::{
    convert, convert_bytes, parse_bytes, Block, ConversionOptions, DocumentFormat, ErrorKind,
    TableDetectionMethod, WarningKind,
};

fn tables(doc: &undoc::Document) -> Vec<(u32, Vec<Vec<String>>)> {
    doc.elements
        .iter()
        .filter_map(|e| match &e.block {
            Block::Table { rows } => Some((e.position.map(|p| p.page).unwrap_or(0), rows.clone())),
            _ => None,
        })
        .collect()
}

fn body_lines(x: i64, top: i64, count: i64, line: &str) -> Vec<lopdf::content::Operation> {
    (0..count)
        .flat_map(|i| text("F1", 12, x, top - i * 14, line))
        .collect()
}

#[test]
fn test_pdf_headings_and_frontmatter() {
    common::init_logger();
    let mut ops = text("F1", 24, 72, 720, "Annual Report");
    ops.extend(body_lines(
        72,
        680,
        8,
        "This line of body text carries the bulk of the characters.",
    ));
    let pdf = build_pdf(&[ops]);
    let dir = tempfile::tempdir().unwrap();

    let result = convert_bytes(&pdf, "annual.pdf", dir.path(), &ConversionOptions::default());
    assert!(result.success, "{:?}", result.error);

    let written = fs::read_to_string(dir.path().join("annual.md")).unwrap();
    assert!(written.contains("\n# Annual Report\n"));
    assert_eq!(result.metadata.get_str("title"), Some("Annual Report"));
    assert_eq!(result.metadata.get_str("original_format"), Some("pdf"));
    assert_eq!(result.metadata.get_str("source_file"), Some("annual.pdf"));
    assert_eq!(result.stats.heading_count, 1);
    assert!(result.stats.paragraph_count >= 1);
}

#[test]
fn test_pdf_two_columns_read_in_order() {
    let mut ops = Vec::new();
    for i in 0..6 {
        let y = 700 - i * 12;
        ops.extend(text("F1", 8, 72, y, "alpha beta gamma delta epsilon zeta eta"));
        ops.extend(text("F1", 8, 320, y, "one two three four five six seven"));
    }
    let pdf = build_pdf(&[ops]);
    let dir = tempfile::tempdir().unwrap();

    let result = convert_bytes(&pdf, "columns.pdf", dir.path(), &ConversionOptions::default());
    assert!(result.success, "{:?}", result.error);
    let written = fs::read_to_string(result.target_path.unwrap()).unwrap();

    let begin = written.find("<!-- column 1 begin -->").unwrap();
    let left = written.find("alpha").unwrap();
    let right = written.find("one two").unwrap();
    let end = written.find("<!-- column 2 end -->").unwrap();
    assert!(begin < left && left < right && right < end);
    assert!(written
        .lines()
        .all(|line| !(line.contains("alpha") && line.contains("seven"))));
}

#[test]
fn test_pdf_single_column_has_no_markers() {
    let pdf = build_pdf(&[body_lines(72, 700, 6, "Plain single column text on the page.")]);
    let doc = parse_bytes(&pdf, "single.pdf", &ConversionOptions::default()).unwrap();
    assert!(doc.blocks().all(|b| !matches!(b, Block::Comment { .. })));
}

#[test]
fn test_pdf_duplicate_table_emitted_once() {
    let first = body_lines(72, 700, 3, "Introductory text before the data page.");

    let mut second = grid(&[100, 200, 300, 400], &[700, 680, 660, 640]);
    let cells = [["Name", "Age", "City"], ["Alice", "30", "Paris"], ["Bob", "25", "Rome"]];
    for (r, row) in cells.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            second.extend(text("F1", 10, 110 + c as i64 * 100, 686 - r as i64 * 20, cell));
        }
    }
    let pdf = build_pdf(&[first, second]);

    let doc = parse_bytes(&pdf, "data.pdf", &ConversionOptions::default()).unwrap();
    let found = tables(&doc);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].0, 2);
    assert_eq!(found[0].1[0], vec!["Name", "Age", "City"]);
    assert_eq!(found[0].1.len(), 3);
}

#[test]
fn test_pdf_heuristic_tab_delimited_table() {
    let mut ops = Vec::new();
    let rows = [["Name", "Age", "City"], ["Alice", "30", "Paris"], ["Bob", "25", "Rome"]];
    for (r, row) in rows.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            ops.extend(text("F1", 10, 72 + c as i64 * 120, 700 - r as i64 * 14, cell));
        }
    }
    let pdf = build_pdf(&[ops]);
    let options = ConversionOptions::default().with_table_method(TableDetectionMethod::Heuristic);

    let doc = parse_bytes(&pdf, "people.pdf", &options).unwrap();
    let found = tables(&doc);
    assert_eq!(found.len(), 1);
    assert!(found[0].1.iter().all(|row| row.len() == 3));
    assert_eq!(found[0].1[0], vec!["Name", "Age", "City"]);
}

#[test]
fn test_pdf_without_text_needs_ocr() {
    let pdf = build_pdf(&[grid(&[100, 300], &[700, 500])]);
    let dir = tempfile::tempdir().unwrap();

    let result = convert_bytes(&pdf, "scan.pdf", dir.path(), &ConversionOptions::default());
    assert!(result.success);
    assert!(result
        .warnings
        .iter()
        .any(|w| w.kind == WarningKind::ExtractionDegraded { ocr_required: true }));
    assert_eq!(result.metadata.get_str("title"), Some("scan"));
}

#[test]
fn test_docx_heading_two_renders_as_h2() {
    let body = format!(
        "{}{}{}",
        docx_para("Heading1", "Handbook"),
        docx_para("Heading2", "Background"),
        docx_para("Normal", "Some context for the reader.")
    );
    let docx = build_docx(&body);
    let dir = tempfile::tempdir().unwrap();

    let result = convert_bytes(&docx, "handbook.docx", dir.path(), &ConversionOptions::default());
    assert!(result.success, "{:?}", result.error);
    let written = fs::read_to_string(dir.path().join("handbook.md")).unwrap();
    assert!(written.contains("\n## Background\n"));
    assert!(written.contains("Some context for the reader."));
    assert_eq!(result.metadata.get_str("original_format"), Some("docx"));
}

#[test]
fn test_pptx_slides_to_sections() {
    let slides = vec![
        pptx_slide("Roadmap", &["Ship the parser", "Write the docs"]),
        pptx_slide("Risks", &["Hiring"]),
    ];
    let pptx = build_pptx(&slides);
    let dir = tempfile::tempdir().unwrap();

    let result = convert_bytes(&pptx, "plan.pptx", dir.path(), &ConversionOptions::default());
    assert!(result.success, "{:?}", result.error);
    let written = fs::read_to_string(dir.path().join("plan.md")).unwrap();
    assert!(written.contains("# Roadmap\n\n- Ship the parser\n- Write the docs\n"));
    assert!(written.contains("# Risks\n\n- Hiring\n"));
    assert_eq!(result.stats.list_item_count, 3);
}

#[test]
fn test_html_file_with_local_image() {
    let dir = tempfile::tempdir().unwrap();
    let png = {
        let img = image::RgbImage::from_pixel(4, 4, image::Rgb([200, 10, 10]));
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    };
    fs::write(dir.path().join("chart.png"), png).unwrap();
    let source = dir.path().join("post.html");
    fs::write(
        &source,
        "<html><body><article><h1>Post</h1><p>Intro.</p><img src=\"chart.png\" alt=\"Chart\"></article></body></html>",
    )
    .unwrap();

    let out = dir.path().join("out");
    let result = convert(&source, &out, &ConversionOptions::default());
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.stats.image_count, 1);

    let written = fs::read_to_string(out.join("post.md")).unwrap();
    let link = written.lines().find(|l| l.starts_with("![Chart](")).unwrap();
    let path = link.trim_start_matches("![Chart](").trim_end_matches(')');
    assert!(path.starts_with("assets/"));
    assert!(out.join(path).exists());
}

#[test]
fn test_disallowed_extension() {
    let dir = tempfile::tempdir().unwrap();
    let mut options = ConversionOptions::default();
    options.allowed_extensions = vec!["pdf".to_string()];

    let result = convert_bytes(b"<p>hi</p>", "page.html", dir.path(), &options);
    assert!(!result.success);
    assert_eq!(result.error_kind, Some(ErrorKind::UnsupportedFormat));
}

#[test]
fn test_corrupt_package() {
    let dir = tempfile::tempdir().unwrap();
    let mut data = b"PK\x03\x04".to_vec();
    data.extend_from_slice(&[0u8; 64]);

    let result = convert_bytes(&data, "broken.docx", dir.path(), &ConversionOptions::default());
    assert!(!result.success);
    assert!(result.error.is_some());
    assert!(!dir.path().join("broken.md").exists());
}

#[test]
fn test_parse_bytes_reports_format() {
    let doc = parse_bytes(
        &build_docx(&docx_para("Normal", "Hello")),
        "note.docx",
        &ConversionOptions::default(),
    )
    .unwrap();
    assert_eq!(doc.format, DocumentFormat::Docx);
    assert_eq!(doc.blocks().cloned().collect::<Vec<_>>(), vec![Block::paragraph("Hello")]);
}
