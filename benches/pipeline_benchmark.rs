//! Benchmarks for the render and fix pipeline.
//!
//! Run with: cargo bench
//!
//! These benchmarks use synthetic documents, so no fixtures are needed.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use undoc::render::to_markdown;
use undoc::{
    fix, Block, ConversionOptions, Document, DocumentFormat, FixContext, Frontmatter,
    MarkdownDocument, TextRun,
};

/// Creates a document with `sections` headed sections of mixed content.
fn create_test_document(sections: usize) -> Document {
    let mut doc = Document::new("bench.pdf", DocumentFormat::Pdf);
    doc.push(Block::heading(2, "Benchmark Report"));
    for i in 0..sections {
        doc.push(Block::heading(4, format!("section {} of the report", i + 1)));
        doc.push(Block::paragraph_runs(vec![
            TextRun::plain("Benchmark text with "),
            TextRun::bold("emphasis"),
            TextRun::plain(" that runs long enough to resemble a real paragraph. Dr. Smith wrote it."),
        ]));
        doc.push(Block::list(
            false,
            vec![
                Block::paragraph("First point"),
                Block::list(true, vec![Block::paragraph("Nested point")]),
                Block::paragraph("Second point"),
            ],
        ));
        doc.push(Block::table(vec![
            vec!["Metric".into(), "Value".into()],
            vec!["Rows".into(), format!("{}", i)],
        ]));
    }
    doc
}

/// Creates a raw Markdown body that every fixer pass has work on.
fn create_raw_markdown(sections: usize) -> String {
    let mut body = String::from("### Raw Report\n");
    for i in 0..sections {
        body.push_str(&format!("\n\n\n###### part {}\nwrapped\nparagraph line.\n• a\n• b\n", i));
    }
    body
}

/// Benchmark rendering the document model.
fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");
    let options = ConversionOptions::default();

    for sections in [1, 10, 100].iter() {
        let doc = create_test_document(*sections);
        group.bench_function(format!("{}_sections", sections), |b| {
            b.iter(|| to_markdown(black_box(&doc), &options));
        });
    }

    group.finish();
}

/// Benchmark the structure fixer on rendered and raw input.
fn bench_fix(c: &mut Criterion) {
    let mut group = c.benchmark_group("fix");
    let mut options = ConversionOptions::default().with_required_sections(["Summary"])
        .with_missing_sections(true);
    options.sentence_per_line = true;
    let ctx = FixContext::new(&options).with_format(DocumentFormat::Pdf);

    for sections in [1, 10, 100].iter() {
        let rendered = to_markdown(&create_test_document(*sections), &options);
        group.bench_function(format!("rendered_{}_sections", sections), |b| {
            b.iter(|| fix(black_box(rendered.clone()), &ctx));
        });

        let raw = MarkdownDocument::new(Frontmatter::new(), create_raw_markdown(*sections));
        group.bench_function(format!("raw_{}_sections", sections), |b| {
            b.iter(|| fix(black_box(raw.clone()), &ctx));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_render, bench_fix);
criterion_main!(benches);
