//! Properties of the structure fixer over rendered documents.

use undoc::render::to_markdown;
use undoc::{
    fix, Block, CapitalizationMode, ConversionOptions, Document, DocumentFormat, FixContext, Frontmatter,
    MarkdownDocument, StructureFixer,
};

const SAMPLES: &[&str] = &[
    "### Findings\nWrapped\nline.\n• one\n• two\n\n\n\n##### Deep\n\ntext\n",
    "Intro text.\n\n## A\n\n#### B\n\n###### C\n\n## D\n* x\n  * y\n* z\n",
    "| a | b |\n| --- | --- |\n| 1 | 2 |\n![fig](assets/f-1.png)\n# Title\n\n\n\n\nEnd.\n",
    "```\n#   not a heading\n\n\n\n```\nItems:\n1) first\n2) second\n\nAfter list.\n",
    "",
];

fn heading_levels(body: &str) -> Vec<u8> {
    let mut in_fence = false;
    let mut levels = Vec::new();
    for line in body.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        let hashes = line.chars().take_while(|&c| c == '#').count();
        if (1..=6).contains(&hashes) && line[hashes..].starts_with(' ') {
            levels.push(hashes as u8);
        }
    }
    levels
}

fn run(raw: &str, options: &ConversionOptions) -> MarkdownDocument {
    let ctx = FixContext::new(options).with_format(DocumentFormat::Pdf);
    fix(MarkdownDocument::new(Frontmatter::new(), raw), &ctx).document
}

#[test]
fn test_second_run_changes_nothing() {
    let mut options = ConversionOptions::default();
    options.create_missing_sections = true;
    options.required_sections = vec!["Summary".to_string(), "References".to_string()];
    let ctx = FixContext::new(&options).with_format(DocumentFormat::Docx);

    for raw in SAMPLES {
        let first = fix(MarkdownDocument::new(Frontmatter::new(), *raw), &ctx);
        let second = fix(first.document.clone(), &ctx);
        assert!(second.is_unchanged(), "{:?} -> {:?}", raw, second.descriptions());
        assert_eq!(second.document, first.document);
    }
}

#[test]
fn test_inserted_sections_stable_under_title_case() {
    let options = ConversionOptions::default()
        .with_capitalization(CapitalizationMode::Title)
        .with_required_sections(["summary of results"])
        .with_missing_sections(true);
    let ctx = FixContext::new(&options).with_format(DocumentFormat::Pdf);

    let first = fix(MarkdownDocument::new(Frontmatter::new(), "# Report\n\nText.\n"), &ctx);
    assert!(first.document.body.contains("## Summary of Results"));
    let second = fix(first.document.clone(), &ctx);
    assert!(second.is_unchanged(), "{:?}", second.descriptions());
    assert_eq!(second.document, first.document);
}

#[test]
fn test_heading_invariant() {
    for (top, max) in [(1u8, 6u8), (2, 4), (1, 2)] {
        let options = ConversionOptions::default().with_heading_levels(top, max);
        for raw in SAMPLES {
            let doc = run(raw, &options);
            let levels = heading_levels(&doc.body);
            if levels.is_empty() {
                continue;
            }
            assert_eq!(*levels.iter().min().unwrap(), top, "{}", doc.body);
            assert!(*levels.iter().max().unwrap() <= max, "{}", doc.body);
            assert!(levels[0] <= top + 1);
            for pair in levels.windows(2) {
                assert!(pair[1] <= pair[0] + 1, "{:?} in {}", levels, doc.body);
            }
        }
    }
}

#[test]
fn test_no_runs_of_blank_lines() {
    let options = ConversionOptions::default();
    for raw in SAMPLES {
        let doc = run(raw, &options);
        let text = doc.to_string();
        let mut in_fence = false;
        let mut blanks = 0;
        for line in text.lines() {
            if line.trim_start().starts_with("```") {
                in_fence = !in_fence;
            }
            if !in_fence && line.trim().is_empty() {
                blanks += 1;
                assert!(blanks < 2, "two blank lines in a row in:\n{}", text);
            } else {
                blanks = 0;
            }
        }
    }
}

#[test]
fn test_blocks_surrounded_by_one_blank_line() {
    let doc = run(SAMPLES[2], &ConversionOptions::default());
    let lines: Vec<&str> = doc.body.lines().collect();
    let image = lines.iter().position(|l| l.starts_with("![fig]")).unwrap();
    assert_eq!(lines[image - 1], "");
    assert_eq!(lines[image + 1], "");

    let list_doc = run(SAMPLES[3], &ConversionOptions::default());
    let lines: Vec<&str> = list_doc.body.lines().collect();
    let first_item = lines.iter().position(|l| l.starts_with("1) ")).unwrap();
    assert_eq!(lines[first_item - 1], "");
    assert_eq!(lines[first_item - 2], "Items:");
    let last_item = lines.iter().position(|l| l.starts_with("2) ")).unwrap();
    assert_eq!(lines[last_item + 1], "");
    assert_eq!(lines[last_item + 2], "After list.");
}

#[test]
fn test_frontmatter_completeness() {
    let options = ConversionOptions::default();
    for raw in SAMPLES {
        let doc = run(raw, &options);
        let title = doc.frontmatter.get_str("title").unwrap();
        assert!(!title.trim().is_empty());
        assert_eq!(doc.frontmatter.get_str("original_format"), Some("pdf"));
        assert!(doc.to_string().starts_with("---\ntitle: "));
    }
}

#[test]
fn test_table_renders_rows_and_separator() {
    let rows: Vec<Vec<String>> = (0..4)
        .map(|r| (0..3).map(|c| format!("r{}c{}", r, c)).collect())
        .collect();
    let mut doc = Document::new("grid.xlsx", DocumentFormat::Xlsx);
    doc.push(Block::table(rows));

    let options = ConversionOptions::default();
    let rendered = to_markdown(&doc, &options);
    let ctx = FixContext::new(&options).with_format(DocumentFormat::Xlsx);
    let fixed = StructureFixer::new().fix(rendered, &ctx).document;

    let table: Vec<&str> = fixed.body.lines().filter(|l| l.starts_with('|')).collect();
    assert_eq!(table.len(), 5);
    assert_eq!(table[1], "| --- | --- | --- |");
    assert!(table.iter().all(|l| l.matches(" | ").count() == 2));
    assert_eq!(table[4], "| r3c0 | r3c1 | r3c2 |");
}

#[test]
fn test_missing_sections_follow_order() {
    let options = ConversionOptions::default()
        .with_required_sections(["Introduction", "Method", "Results"])
        .with_section_order(["Introduction", "Method", "Results"])
        .with_missing_sections(true);

    let doc = run("# Paper\n\n## Introduction\n\nWhy.\n\n## Results\n\nWhat.\n", &options);
    let intro = doc.body.find("## Introduction").unwrap();
    let method = doc.body.find("## Method").unwrap();
    let results = doc.body.find("## Results").unwrap();
    assert!(intro < method && method < results);
    assert!(doc.body.contains(&options.section_placeholder));
}
