//! Page layout analysis.
//!
//! Turns the spans of one page into positioned blocks: column detection,
//! line grouping, heading detection and block assembly. Coordinates use a
//! top-left origin, so reading order is ascending y.

use std::sync::OnceLock;

use regex::Regex;

use super::content::{is_spaceless_script_char, FontSpan};
use super::font_profile::FontProfile;
use crate::model::{BBox, Block, Element, Position, TextRun};
use crate::options::PdfOptions;

/// Baseline tolerance for spans on one line, as a fraction of font size.
const LINE_TOLERANCE: f32 = 0.3;

/// Inter-span gap (fraction of font size) rendered as a tab by
/// [`TextLine::text_with_tabs`].
const TAB_GAP: f32 = 1.0;

/// Largest share of spans allowed to cross a column boundary.
const MAX_STRADDLE_RATIO: f32 = 0.1;

/// Line spacing used when a page has fewer than two lines.
const DEFAULT_LINE_SPACING: f32 = 12.0;

/// Page column classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnLayout {
    /// One text column
    SingleColumn,
    /// Two columns
    DoubleColumn,
    /// Three or more columns
    MultiColumn,
}

/// Result of column detection for one page.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDetection {
    /// Layout class
    pub layout: ColumnLayout,
    /// Column boundaries (gap centres), left to right
    pub boundaries: Vec<f32>,
}

impl ColumnDetection {
    fn single() -> Self {
        Self {
            layout: ColumnLayout::SingleColumn,
            boundaries: Vec::new(),
        }
    }

    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.boundaries.len() + 1
    }

    /// Zero-based column index of an x coordinate.
    pub fn column_of(&self, x: f32) -> usize {
        self.boundaries.iter().filter(|b| x >= **b).count()
    }
}

/// Detect columns from the distribution of span x-midpoints.
///
/// The page width is split into `column_buckets` buckets. An interior run of
/// empty buckets at least `column_gap_ratio` of the page wide is a gap;
/// empty runs touching the page edges are margins. A gap crossed by more
/// than a tenth of the spans is discarded.
pub fn detect_columns(spans: &[FontSpan], page_width: f32, options: &PdfOptions) -> ColumnDetection {
    let buckets = options.column_buckets.max(3);
    if spans.is_empty() || page_width <= 0.0 {
        return ColumnDetection::single();
    }

    let bucket_width = page_width / buckets as f32;
    let mut counts = vec![0usize; buckets];
    for span in spans {
        let idx = (span.bbox.x_mid() / bucket_width).floor();
        let idx = (idx.max(0.0) as usize).min(buckets - 1);
        counts[idx] += 1;
    }

    let (Some(first), Some(last)) = (
        counts.iter().position(|&c| c > 0),
        counts.iter().rposition(|&c| c > 0),
    ) else {
        return ColumnDetection::single();
    };

    let min_gap = options.column_gap_ratio * page_width;
    let mut boundaries = Vec::new();
    let mut run_start: Option<usize> = None;
    for (i, &count) in counts.iter().enumerate().take(last + 1).skip(first) {
        match (count, run_start) {
            (0, None) => run_start = Some(i),
            (0, Some(_)) => {}
            (_, Some(start)) => {
                let run_width = (i - start) as f32 * bucket_width;
                if run_width + f32::EPSILON >= min_gap {
                    boundaries.push((start + i) as f32 / 2.0 * bucket_width);
                }
                run_start = None;
            }
            (_, None) => {}
        }
    }

    // Wide spans crossing a gap (a long line under a short heading) mean the
    // empty buckets are not a gutter
    let max_straddling = spans.len() as f32 * MAX_STRADDLE_RATIO;
    boundaries.retain(|&b| {
        let straddling = spans
            .iter()
            .filter(|s| s.bbox.x0 < b && s.bbox.x1 > b)
            .count();
        straddling as f32 <= max_straddling
    });

    let layout = match boundaries.len() {
        0 => ColumnLayout::SingleColumn,
        1 => ColumnLayout::DoubleColumn,
        _ => ColumnLayout::MultiColumn,
    };
    ColumnDetection { layout, boundaries }
}

/// Spans sharing a baseline.
#[derive(Debug, Clone)]
pub struct TextLine {
    /// Spans sorted by x
    pub spans: Vec<FontSpan>,
    /// Union of span boxes
    pub bbox: BBox,
    /// Baseline of the first span
    pub baseline: f32,
    /// Character-weighted font size
    pub font_size: f32,
    /// Heading level, when classified as a heading
    pub heading_level: Option<u8>,
}

impl TextLine {
    /// Build a line from spans.
    pub fn from_spans(mut spans: Vec<FontSpan>) -> Self {
        spans.sort_by(|a, b| a.x().total_cmp(&b.x()));

        let bbox = spans
            .iter()
            .map(|s| s.bbox)
            .reduce(|a, b| a.union(&b))
            .unwrap_or_default();
        let total_chars: usize = spans.iter().map(|s| s.text.len()).sum();
        let font_size = if total_chars > 0 {
            spans
                .iter()
                .map(|s| s.size * s.text.len() as f32)
                .sum::<f32>()
                / total_chars as f32
        } else {
            spans.first().map(|s| s.size).unwrap_or(0.0)
        };
        let baseline = spans.first().map(|s| s.baseline).unwrap_or(0.0);

        Self {
            spans,
            bbox,
            baseline,
            font_size,
            heading_level: None,
        }
    }

    /// Left edge.
    pub fn x(&self) -> f32 {
        self.bbox.x0
    }

    /// Whether the line was classified as a heading.
    pub fn is_heading(&self) -> bool {
        self.heading_level.is_some()
    }

    /// Combined text with spaces inserted at visible gaps.
    pub fn text(&self) -> String {
        self.runs().into_iter().map(|r| r.text).collect()
    }

    /// Combined text with tabs at large gaps, for delimiter detection.
    pub fn text_with_tabs(&self) -> String {
        let mut out = String::new();
        for (i, span) in self.spans.iter().enumerate() {
            if i > 0 {
                let prev = &self.spans[i - 1];
                let gap = span.x() - (prev.x() + prev.width());
                if gap > span.size * TAB_GAP {
                    out.push('\t');
                } else if needs_space(prev, span) {
                    out.push(' ');
                }
            }
            out.push_str(span.text.trim_matches('\t'));
        }
        out
    }

    /// Styled runs, one per span, with gap spaces folded into the
    /// preceding run.
    pub fn runs(&self) -> Vec<TextRun> {
        let mut runs: Vec<TextRun> = Vec::with_capacity(self.spans.len());
        for (i, span) in self.spans.iter().enumerate() {
            if i > 0 && needs_space(&self.spans[i - 1], span) {
                if let Some(last) = runs.last_mut() {
                    last.text.push(' ');
                }
            }
            match runs.last_mut() {
                Some(last) if last.bold == span.bold && last.italic == span.italic => {
                    last.text.push_str(&span.text)
                }
                _ => runs.push(TextRun::new(span.text.clone(), span.bold, span.italic)),
            }
        }
        runs
    }

    /// Span carrying the most characters.
    pub fn dominant_span(&self) -> Option<&FontSpan> {
        self.spans.iter().max_by_key(|s| s.char_count())
    }

    /// Check if the line is predominantly bold.
    pub fn is_bold(&self) -> bool {
        let bold_chars: usize = self
            .spans
            .iter()
            .filter(|s| s.bold)
            .map(|s| s.text.len())
            .sum();
        let total_chars: usize = self.spans.iter().map(|s| s.text.len()).sum();
        total_chars > 0 && bold_chars as f32 / total_chars as f32 > 0.5
    }
}

/// Whether a space belongs between two adjacent spans.
///
/// For CJK characters, no space is inserted between adjacent characters.
fn needs_space(prev: &FontSpan, span: &FontSpan) -> bool {
    let gap = span.x() - (prev.x() + prev.width());

    let char_count = span.text.chars().count();
    let avg_char_width = if char_count > 0 && span.width() > 0.0 {
        span.width() / char_count as f32
    } else {
        span.size * 0.5
    };
    if gap <= avg_char_width * 0.2 {
        return false;
    }

    let prev_is_cjk = prev
        .text
        .chars()
        .last()
        .map(is_spaceless_script_char)
        .unwrap_or(false);
    let curr_is_cjk = span
        .text
        .chars()
        .next()
        .map(is_spaceless_script_char)
        .unwrap_or(false);
    if prev_is_cjk && curr_is_cjk {
        return false;
    }

    let prev_ends_with_space = prev.text.ends_with(' ') || prev.text.ends_with('\u{00A0}');
    let curr_starts_with_space = span.text.starts_with(' ') || span.text.starts_with('\u{00A0}');
    !prev_ends_with_space && !curr_starts_with_space
}

/// Group spans into lines by baseline, top to bottom.
pub fn group_lines(mut spans: Vec<FontSpan>) -> Vec<TextLine> {
    spans.sort_by(|a, b| {
        a.baseline
            .total_cmp(&b.baseline)
            .then_with(|| a.x().total_cmp(&b.x()))
    });

    let mut lines = Vec::new();
    let mut current: Vec<FontSpan> = Vec::new();
    let mut current_y: Option<f32> = None;

    for span in spans {
        let tolerance = span.size * LINE_TOLERANCE;
        match current_y {
            Some(y) if (span.baseline - y).abs() <= tolerance => current.push(span),
            _ => {
                if !current.is_empty() {
                    lines.push(TextLine::from_spans(std::mem::take(&mut current)));
                }
                current_y = Some(span.baseline);
                current.push(span);
            }
        }
    }
    if !current.is_empty() {
        lines.push(TextLine::from_spans(current));
    }
    lines
}

/// Check if text is a bullet marker (•, -, etc.).
pub(crate) fn is_bullet_marker(text: &str) -> bool {
    matches!(
        text.trim(),
        "-" | "–" | "—" | "•" | "·" | "*" | "○" | "▪" | "◦" | "▸" | "▹" | "►" | "■" | "●" | "※"
            | "□" | "◆" | "◇" | "▶" | "▷" | "☞" | "➤" | "➜"
    )
}

/// Check if text is a number-style list marker (1., 2), a., etc.).
pub(crate) fn is_number_marker(text: &str) -> bool {
    let cleaned: String = text.trim().chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return false;
    }

    if let Some(pos) = cleaned.find(|c: char| !c.is_ascii_digit()) {
        let (prefix, suffix) = cleaned.split_at(pos);
        if !prefix.is_empty() && (suffix == "." || suffix == ")") {
            return true;
        }
    }

    if cleaned.parse::<u32>().is_ok() {
        return true;
    }

    let chars: Vec<char> = cleaned.chars().collect();
    chars.len() == 2 && chars[0].is_alphabetic() && (chars[1] == '.' || chars[1] == ')')
}

fn ordered_marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\(?(\d{1,3}|[a-z])[.)]\s+(\S.*)$").expect("valid list marker regex")
    })
}

/// Split a leading list marker off a line.
///
/// Returns `(ordered, rest)`. Glyph bullets may touch the text; ASCII
/// markers need a following space.
pub fn split_list_marker(text: &str) -> Option<(bool, &str)> {
    let trimmed = text.trim_start();
    let first = trimmed.chars().next()?;

    let glyph_bullet = matches!(
        first,
        '•' | '◦' | '▪' | '●' | '○' | '■' | '□' | '►' | '▸' | '▶' | '‣' | '➤' | '·'
    );
    let ascii_bullet = matches!(first, '-' | '*' | '–' | '+');
    if glyph_bullet || ascii_bullet {
        let rest = &trimmed[first.len_utf8()..];
        if ascii_bullet && !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let rest = rest.trim_start();
        return (!rest.is_empty()).then_some((false, rest));
    }

    let caps = ordered_marker_regex().captures(trimmed)?;
    caps.get(2).map(|m| (true, m.as_str()))
}

/// Assembles positioned blocks for one page.
#[derive(Debug)]
pub struct LayoutAnalyzer<'a> {
    profile: &'a FontProfile,
    options: &'a PdfOptions,
}

impl<'a> LayoutAnalyzer<'a> {
    /// Create an analyzer backed by a document font profile.
    pub fn new(profile: &'a FontProfile, options: &'a PdfOptions) -> Self {
        Self { profile, options }
    }

    /// Lay out a page.
    ///
    /// `placed` holds already-positioned elements (tables, images) that are
    /// interleaved with the text by their top edge.
    pub fn layout_page(
        &self,
        page: u32,
        page_width: f32,
        spans: Vec<FontSpan>,
        placed: Vec<Element>,
    ) -> Vec<Element> {
        let detection = detect_columns(&spans, page_width, self.options);
        log::debug!(
            "Page {}: {:?}, boundaries {:?}",
            page,
            detection.layout,
            detection.boundaries
        );

        if detection.layout == ColumnLayout::SingleColumn {
            return self.assemble(page, None, spans, placed);
        }

        let count = detection.column_count();
        let mut column_spans: Vec<Vec<FontSpan>> = vec![Vec::new(); count];
        for span in spans {
            column_spans[detection.column_of(span.bbox.x_mid())].push(span);
        }
        let mut column_placed: Vec<Vec<Element>> = vec![Vec::new(); count];
        for element in placed {
            let x = element.position.map(|p| p.bbox.x_mid()).unwrap_or(0.0);
            column_placed[detection.column_of(x)].push(element);
        }

        let mut elements = Vec::new();
        for (index, (spans, placed)) in column_spans.into_iter().zip(column_placed).enumerate() {
            let column = self.assemble(page, Some(index), spans, placed);
            if column.is_empty() {
                continue;
            }
            elements.push(Element::new(Block::comment(format!(
                "column {} begin",
                index + 1
            ))));
            elements.extend(column);
            elements.push(Element::new(Block::comment(format!("column {} end", index + 1))));
        }
        elements
    }

    /// Assemble one column (or a whole single-column page).
    fn assemble(
        &self,
        page: u32,
        column: Option<usize>,
        spans: Vec<FontSpan>,
        placed: Vec<Element>,
    ) -> Vec<Element> {
        let mut lines = group_lines(spans);
        self.detect_headings(&mut lines);

        let mut elements = self.group_blocks(page, column, lines);
        elements.extend(placed.into_iter().map(|mut element| {
            if let (Some(position), Some(index)) = (element.position.as_mut(), column) {
                position.column = Some(index);
            }
            element
        }));
        elements.sort_by(|a, b| a.top().total_cmp(&b.top()));
        elements
    }

    /// Classify lines against the font profile.
    fn detect_headings(&self, lines: &mut [TextLine]) {
        for line in lines.iter_mut() {
            let text = line.text();
            let text = text.trim();
            if text.chars().count() > self.options.max_heading_chars
                || !text.chars().any(char::is_alphanumeric)
                || split_list_marker(text).is_some()
            {
                continue;
            }
            if let Some(span) = line.dominant_span() {
                line.heading_level = self.profile.heading_level(&span.font, span.size, span.bold);
            }
        }
    }

    /// Group lines into heading, paragraph and list blocks.
    fn group_blocks(&self, page: u32, column: Option<usize>, lines: Vec<TextLine>) -> Vec<Element> {
        let avg_spacing = avg_line_spacing(&lines);
        let mut groups: Vec<Vec<TextLine>> = Vec::new();

        for line in lines {
            let starts_group = match groups.last().and_then(|g| g.last()) {
                Some(prev) => {
                    should_break_block(prev, &line, avg_spacing)
                        || split_list_marker(&line.text()).is_some()
                }
                None => true,
            };
            if starts_group {
                groups.push(vec![line]);
            } else if let Some(group) = groups.last_mut() {
                group.push(line);
            }
        }

        let position = |bbox: BBox| {
            let position = Position::new(page, bbox);
            match column {
                Some(index) => position.in_column(index),
                None => position,
            }
        };

        let mut elements: Vec<Element> = Vec::new();
        // Open list: (ordered, items, bbox)
        let mut list: Option<(bool, Vec<Block>, BBox)> = None;

        for group in groups {
            let bbox = group
                .iter()
                .map(|l| l.bbox)
                .reduce(|a, b| a.union(&b))
                .unwrap_or_default();

            if let Some(level) = group.first().and_then(|l| l.heading_level) {
                flush_list(&mut list, &mut elements, &position);
                let text = join_lines(&group);
                elements.push(Element::at(Block::heading(level, text.trim()), position(bbox)));
                continue;
            }

            let first_text = group.first().map(|l| l.text()).unwrap_or_default();
            if let Some((ordered, _)) = split_list_marker(&first_text) {
                let mut runs = paragraph_runs(&group);
                strip_marker(&mut runs);
                let item = Block::paragraph_runs(runs);
                match list.as_mut() {
                    Some((list_ordered, items, list_bbox)) if *list_ordered == ordered => {
                        items.push(item);
                        *list_bbox = list_bbox.union(&bbox);
                    }
                    _ => {
                        flush_list(&mut list, &mut elements, &position);
                        list = Some((ordered, vec![item], bbox));
                    }
                }
                continue;
            }

            flush_list(&mut list, &mut elements, &position);
            elements.push(Element::at(
                Block::paragraph_runs(paragraph_runs(&group)),
                position(bbox),
            ));
        }
        flush_list(&mut list, &mut elements, &position);
        elements
    }
}

fn flush_list(
    list: &mut Option<(bool, Vec<Block>, BBox)>,
    elements: &mut Vec<Element>,
    position: &impl Fn(BBox) -> Position,
) {
    if let Some((ordered, items, bbox)) = list.take() {
        elements.push(Element::at(Block::list(ordered, items), position(bbox)));
    }
}

/// Remove the list marker from the start of the first run.
fn strip_marker(runs: &mut [TextRun]) {
    if let Some(first) = runs.first_mut() {
        if let Some((_, rest)) = split_list_marker(&first.text) {
            first.text = rest.to_string();
        }
    }
}

fn join_lines(lines: &[TextLine]) -> String {
    lines
        .iter()
        .map(|l| l.text().trim().to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Runs of a multi-line block; lines are joined with a space, and words
/// hyphenated across a line break are rejoined.
fn paragraph_runs(lines: &[TextLine]) -> Vec<TextRun> {
    let mut runs: Vec<TextRun> = Vec::new();
    for line in lines {
        let mut line_runs = line.runs();
        let starts_lower = line_runs
            .first()
            .and_then(|r| r.text.trim_start().chars().next())
            .map(char::is_lowercase)
            .unwrap_or(false);

        if let Some(last) = runs.last_mut() {
            let trimmed_len = last.text.trim_end().len();
            last.text.truncate(trimmed_len);
            let hyphenated = last.text.ends_with('-')
                && last
                    .text
                    .chars()
                    .rev()
                    .nth(1)
                    .map(char::is_alphabetic)
                    .unwrap_or(false);
            if hyphenated && starts_lower {
                last.text.pop();
            } else {
                last.text.push(' ');
            }
            if let Some(first) = line_runs.first_mut() {
                first.text = first.text.trim_start().to_string();
            }
        }

        for run in line_runs.drain(..) {
            match runs.last_mut() {
                Some(last) if last.same_style(&run) => last.text.push_str(&run.text),
                _ => runs.push(run),
            }
        }
    }
    if let Some(last) = runs.last_mut() {
        let trimmed_len = last.text.trim_end().len();
        last.text.truncate(trimmed_len);
    }
    if let Some(first) = runs.first_mut() {
        first.text = first.text.trim_start().to_string();
    }
    runs.retain(|r| !r.text.is_empty());
    runs
}

/// Calculate average line spacing.
fn avg_line_spacing(lines: &[TextLine]) -> f32 {
    let spacings: Vec<f32> = lines
        .windows(2)
        .map(|w| (w[1].baseline - w[0].baseline).abs())
        .filter(|s| *s > 0.1)
        .collect();

    if spacings.is_empty() {
        return DEFAULT_LINE_SPACING;
    }
    spacings.iter().sum::<f32>() / spacings.len() as f32
}

/// Determine if a new block should start.
fn should_break_block(prev: &TextLine, curr: &TextLine, avg_spacing: f32) -> bool {
    // Headings stand alone
    if curr.is_heading() || prev.is_heading() {
        return true;
    }

    let spacing = (curr.baseline - prev.baseline).abs();
    if spacing > avg_spacing * 1.5 {
        return true;
    }

    if (prev.font_size - curr.font_size).abs() > 1.0 {
        return true;
    }

    // Indentation change
    (prev.x() - curr.x()).abs() > 20.0
}
