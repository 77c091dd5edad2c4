//! Content stream walking.
//!
//! A page's content stream is interpreted just far enough to recover three
//! things: positioned text spans with their font, axis-aligned ruling lines
//! (for lattice tables), and the placement of image XObjects. All output
//! coordinates are page space with the origin at the top-left corner.

use std::collections::BTreeMap;

use lopdf::content::Content;
use lopdf::{Dictionary, Document as LopdfDocument, Object, ObjectId, Stream};
use unicode_normalization::UnicodeNormalization;

use crate::error::{Error, Result};
use crate::model::BBox;

/// US Letter, used when a page has no usable MediaBox.
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Average glyph advance as a fraction of the font size.
const AVG_CHAR_WIDTH: f32 = 0.5;

/// TJ adjustment (thousandths of an em) treated as a word space.
const TJ_SPACE_THRESHOLD: f32 = 200.0;

/// Filled rectangles thinner than this are drawn rules.
const RULE_THICKNESS: f32 = 2.0;

/// Slope tolerance for horizontal/vertical segments.
const AXIS_TOLERANCE: f32 = 1.0;

/// Resource dictionaries inherit through at most this many `Parent` hops.
const MAX_INHERIT_DEPTH: usize = 32;

const LIGATURES: &[(char, &str)] = &[
    ('\u{FB00}', "ff"),
    ('\u{FB01}', "fi"),
    ('\u{FB02}', "fl"),
    ('\u{FB03}', "ffi"),
    ('\u{FB04}', "ffl"),
    ('\u{FB05}', "st"),
    ('\u{FB06}', "st"),
];

/// A run of text drawn with a single font at a single size.
#[derive(Debug, Clone, PartialEq)]
pub struct FontSpan {
    /// Decoded, NFC-normalized text
    pub text: String,
    /// Base font name without subset prefix (e.g. "Helvetica-Bold")
    pub font: String,
    /// Effective font size in points
    pub size: f32,
    /// Bold, inferred from the font name
    pub bold: bool,
    /// Italic, inferred from the font name
    pub italic: bool,
    /// Approximate glyph box
    pub bbox: BBox,
    /// Baseline y (top-left origin)
    pub baseline: f32,
    /// Page number (1-indexed)
    pub page: u32,
}

impl FontSpan {
    /// Create a span whose box is estimated from the baseline and size.
    pub fn new(
        text: impl Into<String>,
        font: impl Into<String>,
        size: f32,
        x: f32,
        baseline: f32,
        width: f32,
        page: u32,
    ) -> Self {
        let font = font.into();
        let (bold, italic) = style_from_font_name(&font);
        Self {
            text: text.into(),
            font,
            size,
            bold,
            italic,
            // Ascender ~0.8em above the baseline, descender ~0.2em below
            bbox: BBox::new(x, baseline - size * 0.8, x + width, baseline + size * 0.2),
            baseline,
            page,
        }
    }

    /// Left edge.
    pub fn x(&self) -> f32 {
        self.bbox.x0
    }

    /// Estimated width.
    pub fn width(&self) -> f32 {
        self.bbox.width()
    }

    /// Number of visible characters.
    pub fn char_count(&self) -> usize {
        self.text.chars().filter(|c| !c.is_whitespace()).count()
    }

    /// Font size rounded to 0.1pt, as an integer key.
    pub fn size_key(&self) -> i32 {
        size_key(self.size)
    }
}

/// Round a font size to 0.1pt and return it as an integer key.
pub fn size_key(size: f32) -> i32 {
    (size * 10.0).round() as i32
}

/// Infer bold and italic flags from a font name.
pub fn style_from_font_name(name: &str) -> (bool, bool) {
    let lower = name.to_lowercase();
    let bold = lower.contains("bold") || lower.contains("black") || lower.contains("heavy");
    let italic = lower.contains("italic") || lower.contains("oblique");
    (bold, italic)
}

/// An axis-aligned line segment drawn on the page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ruling {
    /// Start x
    pub x0: f32,
    /// Start y
    pub y0: f32,
    /// End x
    pub x1: f32,
    /// End y
    pub y1: f32,
}

impl Ruling {
    /// Create a ruling with ordered endpoints.
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    /// Horizontal rule.
    pub fn horizontal(y: f32, x0: f32, x1: f32) -> Self {
        Self::new(x0, y, x1, y)
    }

    /// Vertical rule.
    pub fn vertical(x: f32, y0: f32, y1: f32) -> Self {
        Self::new(x, y0, x, y1)
    }

    /// Whether the segment runs left to right.
    pub fn is_horizontal(&self) -> bool {
        self.y1 - self.y0 <= AXIS_TOLERANCE && self.x1 - self.x0 > AXIS_TOLERANCE
    }

    /// Whether the segment runs top to bottom.
    pub fn is_vertical(&self) -> bool {
        self.x1 - self.x0 <= AXIS_TOLERANCE && self.y1 - self.y0 > AXIS_TOLERANCE
    }
}

/// An XObject drawn with `Do`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePlacement {
    /// Resource name in the page's XObject dictionary
    pub name: String,
    /// Area covered on the page
    pub bbox: BBox,
}

/// Everything recovered from one page's content stream.
#[derive(Debug, Clone, Default)]
pub struct PageContent {
    /// Page number (1-indexed)
    pub page: u32,
    /// Page width in points
    pub width: f32,
    /// Page height in points
    pub height: f32,
    /// Text spans in drawing order
    pub spans: Vec<FontSpan>,
    /// Horizontal and vertical rules
    pub rulings: Vec<Ruling>,
    /// XObject placements
    pub images: Vec<ImagePlacement>,
}

impl PageContent {
    /// Create an empty page.
    pub fn new(page: u32, width: f32, height: f32) -> Self {
        Self {
            page,
            width,
            height,
            ..Default::default()
        }
    }

    /// Whether the page carries any visible text.
    pub fn has_text(&self) -> bool {
        self.spans.iter().any(|s| !s.text.trim().is_empty())
    }
}

/// Walk one page and collect its spans, rulings and image placements.
pub fn extract_page(doc: &LopdfDocument, page_num: u32, page_id: ObjectId) -> Result<PageContent> {
    let media_box = media_box(doc, page_id);
    let data = page_content(doc, page_id)?;
    let content = Content::decode(&data)
        .map_err(|e| Error::PdfParse(format!("page {}: {}", page_num, e)))?;

    let walker = ContentWalker::new(doc, page_fonts(doc, page_id), page_num, media_box);
    let page = walker.run(&content);
    log::debug!(
        "Page {}: {} spans, {} rulings, {} placements",
        page_num,
        page.spans.len(),
        page.rulings.len(),
        page.images.len()
    );
    Ok(page)
}

/// Look up an inheritable page attribute, following `Parent` links.
fn inherited<'a>(doc: &'a LopdfDocument, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut dict = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_INHERIT_DEPTH {
        if let Ok(value) = dict.get(key) {
            return Some(resolve(doc, value));
        }
        let parent = dict.get(b"Parent").ok()?.as_reference().ok()?;
        dict = doc.get_dictionary(parent).ok()?;
    }
    None
}

/// Follow a reference, returning the object itself otherwise.
pub(crate) fn resolve<'a>(doc: &'a LopdfDocument, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

/// Resolve an object to a dictionary (a stream yields its dictionary).
pub(crate) fn resolve_dict<'a>(doc: &'a LopdfDocument, obj: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, obj) {
        Object::Dictionary(dict) => Some(dict),
        Object::Stream(stream) => Some(&stream.dict),
        _ => None,
    }
}

/// Page MediaBox as `[x0, y0, x1, y1]`.
pub fn media_box(doc: &LopdfDocument, page_id: ObjectId) -> [f32; 4] {
    let values: Option<Vec<f32>> = inherited(doc, page_id, b"MediaBox")
        .and_then(|obj| obj.as_array().ok())
        .map(|arr| arr.iter().filter_map(|o| number(resolve(doc, o))).collect());
    match values {
        Some(v) if v.len() >= 4 && v[2] != v[0] && v[3] != v[1] => [
            v[0].min(v[2]),
            v[1].min(v[3]),
            v[0].max(v[2]),
            v[1].max(v[3]),
        ],
        _ => DEFAULT_MEDIA_BOX,
    }
}

fn page_resources(doc: &LopdfDocument, page_id: ObjectId) -> Option<&Dictionary> {
    inherited(doc, page_id, b"Resources").and_then(|obj| resolve_dict(doc, obj))
}

/// Font dictionaries of a page keyed by resource name.
fn page_fonts(doc: &LopdfDocument, page_id: ObjectId) -> BTreeMap<Vec<u8>, &Dictionary> {
    let mut fonts = BTreeMap::new();
    let font_dict = page_resources(doc, page_id)
        .and_then(|res| res.get(b"Font").ok())
        .and_then(|obj| resolve_dict(doc, obj));
    if let Some(font_dict) = font_dict {
        for (name, obj) in font_dict.iter() {
            if let Some(font) = resolve_dict(doc, obj) {
                fonts.insert(name.clone(), font);
            }
        }
    }
    fonts
}

/// Find an XObject stream by resource name.
pub fn page_xobject<'a>(doc: &'a LopdfDocument, page_id: ObjectId, name: &str) -> Option<&'a Stream> {
    let xobjects = page_resources(doc, page_id)
        .and_then(|res| res.get(b"XObject").ok())
        .and_then(|obj| resolve_dict(doc, obj))?;
    let obj = xobjects.get(name.as_bytes()).ok()?;
    match resolve(doc, obj) {
        Object::Stream(stream) => Some(stream),
        _ => None,
    }
}

/// Concatenated, decompressed content streams of a page.
fn page_content(doc: &LopdfDocument, page_id: ObjectId) -> Result<Vec<u8>> {
    let page_dict = doc.get_dictionary(page_id)?;
    let contents = match page_dict.get(b"Contents") {
        Ok(obj) => resolve(doc, obj),
        // A page without content is blank, not broken
        Err(_) => return Ok(Vec::new()),
    };

    match contents {
        Object::Stream(stream) => stream_data(stream),
        Object::Array(arr) => {
            let mut content = Vec::new();
            for obj in arr {
                if let Object::Stream(stream) = resolve(doc, obj) {
                    match stream_data(stream) {
                        Ok(data) => {
                            content.extend_from_slice(&data);
                            content.push(b' ');
                        }
                        Err(e) => log::warn!("Skipping undecodable content stream: {}", e),
                    }
                }
            }
            Ok(content)
        }
        _ => Err(Error::PdfParse("Invalid content stream".to_string())),
    }
}

fn stream_data(stream: &Stream) -> Result<Vec<u8>> {
    if stream.dict.get(b"Filter").is_ok() {
        stream
            .decompressed_content()
            .map_err(|e| Error::PdfParse(e.to_string()))
    } else {
        Ok(stream.content.clone())
    }
}

/// Affine transform `[a b c d e f]` in PDF row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Matrix {
    const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    fn translation(tx: f32, ty: f32) -> Self {
        Matrix {
            e: tx,
            f: ty,
            ..Matrix::IDENTITY
        }
    }

    fn from_operands(operands: &[Object]) -> Option<Self> {
        if operands.len() < 6 {
            return None;
        }
        let v: Vec<f32> = operands[..6].iter().filter_map(number).collect();
        (v.len() == 6).then(|| Matrix {
            a: v[0],
            b: v[1],
            c: v[2],
            d: v[3],
            e: v[4],
            f: v[5],
        })
    }

    /// `self` applied first, then `other`.
    fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x * self.a + y * self.c + self.e,
            x * self.b + y * self.d + self.f,
        )
    }

    fn horizontal_scale(&self) -> f32 {
        (self.a * self.a + self.b * self.b).sqrt()
    }

    fn vertical_scale(&self) -> f32 {
        (self.c * self.c + self.d * self.d).sqrt()
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    font_key: Vec<u8>,
    font_name: String,
    font_size: f32,
    leading: f32,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            font_key: Vec::new(),
            font_name: String::new(),
            font_size: 12.0,
            leading: 0.0,
        }
    }
}

type Point = (f32, f32);

struct ContentWalker<'a> {
    doc: &'a LopdfDocument,
    fonts: BTreeMap<Vec<u8>, &'a Dictionary>,
    media_box: [f32; 4],
    page: PageContent,
    gs: GraphicsState,
    stack: Vec<GraphicsState>,
    tm: Matrix,
    tlm: Matrix,
    path: Vec<(Point, Point)>,
    current: Option<Point>,
    subpath_start: Option<Point>,
}

impl<'a> ContentWalker<'a> {
    fn new(
        doc: &'a LopdfDocument,
        fonts: BTreeMap<Vec<u8>, &'a Dictionary>,
        page_num: u32,
        media_box: [f32; 4],
    ) -> Self {
        let width = media_box[2] - media_box[0];
        let height = media_box[3] - media_box[1];
        Self {
            doc,
            fonts,
            media_box,
            page: PageContent::new(page_num, width, height),
            gs: GraphicsState::default(),
            stack: Vec::new(),
            tm: Matrix::IDENTITY,
            tlm: Matrix::IDENTITY,
            path: Vec::new(),
            current: None,
            subpath_start: None,
        }
    }

    fn run(mut self, content: &Content) -> PageContent {
        for op in &content.operations {
            let operands = op.operands.as_slice();
            match op.operator.as_str() {
                "q" => self.stack.push(self.gs.clone()),
                "Q" => {
                    if let Some(gs) = self.stack.pop() {
                        self.gs = gs;
                    }
                }
                "cm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        self.gs.ctm = m.then(&self.gs.ctm);
                    }
                }
                "BT" => {
                    self.tm = Matrix::IDENTITY;
                    self.tlm = Matrix::IDENTITY;
                }
                "ET" => {}
                "Tf" => self.set_font(operands),
                "TL" => {
                    if let Some(leading) = operands.first().and_then(number) {
                        self.gs.leading = leading;
                    }
                }
                "Td" | "TD" => {
                    let tx = operands.first().and_then(number).unwrap_or(0.0);
                    let ty = operands.get(1).and_then(number).unwrap_or(0.0);
                    if op.operator == "TD" {
                        self.gs.leading = -ty;
                    }
                    self.move_line(tx, ty);
                }
                "Tm" => {
                    if let Some(m) = Matrix::from_operands(operands) {
                        self.tm = m;
                        self.tlm = m;
                    }
                }
                "T*" => self.next_line(),
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        self.show_string(bytes);
                    }
                }
                "'" => {
                    self.next_line();
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        self.show_string(bytes);
                    }
                }
                "\"" => {
                    self.next_line();
                    if let Some(Object::String(bytes, _)) = operands.get(2) {
                        self.show_string(bytes);
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(items)) = operands.first() {
                        self.show_array(items);
                    }
                }
                "m" => {
                    if let Some(p) = self.point(operands) {
                        self.current = Some(p);
                        self.subpath_start = Some(p);
                    }
                }
                "l" => {
                    if let (Some(from), Some(to)) = (self.current, self.point(operands)) {
                        self.path.push((from, to));
                        self.current = Some(to);
                    }
                }
                "re" => self.rectangle(operands),
                "h" => {
                    if let (Some(from), Some(to)) = (self.current, self.subpath_start) {
                        if from != to {
                            self.path.push((from, to));
                        }
                        self.current = Some(to);
                    }
                }
                "S" | "s" | "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" => self.commit_path(),
                "n" => self.clear_path(),
                "Do" => {
                    if let Some(Object::Name(name)) = operands.first() {
                        self.place_xobject(name);
                    }
                }
                _ => {}
            }
        }
        self.page
    }

    fn set_font(&mut self, operands: &[Object]) {
        if operands.len() < 2 {
            return;
        }
        if let Object::Name(key) = &operands[0] {
            self.gs.font_name = self
                .fonts
                .get(key)
                .and_then(|font| font.get(b"BaseFont").ok())
                .and_then(|o| o.as_name().ok())
                .map(|n| strip_subset_prefix(&String::from_utf8_lossy(n)))
                .unwrap_or_else(|| String::from_utf8_lossy(key).to_string());
            self.gs.font_key = key.clone();
        }
        self.gs.font_size = number(&operands[1]).unwrap_or(12.0);
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.tlm = Matrix::translation(tx, ty).then(&self.tlm);
        self.tm = self.tlm;
    }

    fn next_line(&mut self) {
        let leading = if self.gs.leading != 0.0 {
            self.gs.leading
        } else {
            self.gs.font_size * 1.2
        };
        self.move_line(0.0, -leading);
    }

    fn decode(&self, bytes: &[u8]) -> String {
        let text = self
            .fonts
            .get(&self.gs.font_key)
            .and_then(|font| font.get_font_encoding(self.doc).ok())
            .and_then(|enc| LopdfDocument::decode_text(&enc, bytes).ok())
            .unwrap_or_else(|| decode_text_simple(bytes));
        normalize_text(&text)
    }

    fn show_string(&mut self, bytes: &[u8]) {
        let text = self.decode(bytes);
        let advance = text.chars().count() as f32 * AVG_CHAR_WIDTH * self.gs.font_size;
        self.emit(text, advance);
    }

    fn show_array(&mut self, items: &[Object]) {
        let mut combined = String::new();
        let mut advance = 0.0;
        for item in items {
            match item {
                Object::String(bytes, _) => {
                    let text = self.decode(bytes);
                    advance += text.chars().count() as f32 * AVG_CHAR_WIDTH * self.gs.font_size;
                    combined.push_str(&text);
                }
                other => {
                    let Some(n) = number(other) else { continue };
                    // Negative adjustments move the next glyph right
                    let adjustment = -n;
                    advance += adjustment / 1000.0 * self.gs.font_size;
                    if adjustment > TJ_SPACE_THRESHOLD
                        && !combined.is_empty()
                        && !combined.ends_with(' ')
                        && !combined.ends_with('\u{00A0}')
                    {
                        if let Some(c) = combined.chars().last() {
                            if !is_spaceless_script_char(c) {
                                combined.push(' ');
                            }
                        }
                    }
                }
            }
        }
        self.emit(combined, advance);
    }

    fn emit(&mut self, text: String, advance: f32) {
        let trm = self.tm.then(&self.gs.ctm);
        let (x, y) = trm.apply(0.0, 0.0);
        let size = self.gs.font_size * trm.vertical_scale();
        let width = advance * trm.horizontal_scale();

        if !text.trim().is_empty() && size > 0.0 {
            let (px, py) = self.to_page(x, y);
            self.page.spans.push(FontSpan::new(
                text,
                self.gs.font_name.clone(),
                size,
                px,
                py,
                width.max(0.0),
                self.page.page,
            ));
        }
        self.tm = Matrix::translation(advance, 0.0).then(&self.tm);
    }

    fn point(&self, operands: &[Object]) -> Option<Point> {
        let x = operands.first().and_then(number)?;
        let y = operands.get(1).and_then(number)?;
        Some(self.gs.ctm.apply(x, y))
    }

    fn rectangle(&mut self, operands: &[Object]) {
        let values: Vec<f32> = operands.iter().take(4).filter_map(number).collect();
        let &[x, y, w, h] = values.as_slice() else {
            return;
        };
        let ctm = self.gs.ctm;

        if h.abs() <= RULE_THICKNESS && w.abs() > RULE_THICKNESS {
            let mid = y + h / 2.0;
            self.path.push((ctm.apply(x, mid), ctm.apply(x + w, mid)));
        } else if w.abs() <= RULE_THICKNESS && h.abs() > RULE_THICKNESS {
            let mid = x + w / 2.0;
            self.path.push((ctm.apply(mid, y), ctm.apply(mid, y + h)));
        } else {
            let corners = [
                ctm.apply(x, y),
                ctm.apply(x + w, y),
                ctm.apply(x + w, y + h),
                ctm.apply(x, y + h),
            ];
            for i in 0..4 {
                self.path.push((corners[i], corners[(i + 1) % 4]));
            }
        }
        let origin = ctm.apply(x, y);
        self.current = Some(origin);
        self.subpath_start = Some(origin);
    }

    fn commit_path(&mut self) {
        for ((x0, y0), (x1, y1)) in std::mem::take(&mut self.path) {
            let (px0, py0) = self.to_page(x0, y0);
            let (px1, py1) = self.to_page(x1, y1);
            let ruling = Ruling::new(px0, py0, px1, py1);
            if ruling.is_horizontal() || ruling.is_vertical() {
                self.page.rulings.push(ruling);
            }
        }
        self.clear_path();
    }

    fn clear_path(&mut self) {
        self.path.clear();
        self.current = None;
        self.subpath_start = None;
    }

    fn place_xobject(&mut self, name: &[u8]) {
        let ctm = self.gs.ctm;
        let corners = [
            ctm.apply(0.0, 0.0),
            ctm.apply(1.0, 0.0),
            ctm.apply(0.0, 1.0),
            ctm.apply(1.0, 1.0),
        ];
        let xs = corners.iter().map(|c| c.0);
        let ys = corners.iter().map(|c| c.1);
        let (min_x, max_x) = xs.fold((f32::MAX, f32::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)));
        let (min_y, max_y) = ys.fold((f32::MAX, f32::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)));

        let (x0, y0) = self.to_page(min_x, max_y);
        let (x1, y1) = self.to_page(max_x, min_y);
        self.page.images.push(ImagePlacement {
            name: String::from_utf8_lossy(name).to_string(),
            bbox: BBox::new(x0, y0, x1, y1),
        });
    }

    /// User space to page space (top-left origin).
    fn to_page(&self, x: f32, y: f32) -> Point {
        (x - self.media_box[0], self.media_box[3] - y)
    }
}

/// Helper to extract a number from a PDF object.
pub(crate) fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Drop the `ABCDEF+` subset tag from embedded font names.
fn strip_subset_prefix(name: &str) -> String {
    match name.split_once('+') {
        Some((tag, rest)) if tag.len() == 6 && tag.chars().all(|c| c.is_ascii_uppercase()) => {
            rest.to_string()
        }
        _ => name.to_string(),
    }
}

/// NFC-normalize, expand typographic ligatures and drop private-use and
/// control characters.
pub fn normalize_text(text: &str) -> String {
    let composed: String = text.nfc().collect();
    let mut out = String::with_capacity(composed.len());
    for c in composed.chars() {
        if let Some((_, expanded)) = LIGATURES.iter().find(|(lig, _)| *lig == c) {
            out.push_str(expanded);
            continue;
        }
        let code = c as u32;
        let private_use = (0xE000..=0xF8FF).contains(&code)
            || (0xF0000..=0xFFFFD).contains(&code)
            || (0x100000..=0x10FFFD).contains(&code);
        if private_use || (c.is_control() && c != '\t') {
            continue;
        }
        out.push(c);
    }
    out
}

/// Whether a character belongs to a script written without word spaces.
///
/// Chinese and Japanese don't use spaces between words, but Korean does.
pub fn is_spaceless_script_char(c: char) -> bool {
    let code = c as u32;

    // CJK Unified Ideographs and extensions
    (0x4E00..=0x9FFF).contains(&code)
    || (0x3400..=0x4DBF).contains(&code)
    || (0x20000..=0x2A6DF).contains(&code)
    || (0x2A700..=0x2B73F).contains(&code)
    || (0x2B740..=0x2B81F).contains(&code)
    || (0x2B820..=0x2CEAF).contains(&code)
    || (0x2CEB0..=0x2EBEF).contains(&code)
    // Hiragana
    || (0x3040..=0x309F).contains(&code)
    // Katakana
    || (0x30A0..=0x30FF).contains(&code)
    // CJK Symbols and Punctuation
    || (0x3000..=0x303F).contains(&code)
}

/// Simple text decoding fallback when no encoding is available.
pub fn decode_text_simple(bytes: &[u8]) -> String {
    // UTF-16BE with BOM
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&utf16);
    }

    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }

    // Latin-1
    bytes.iter().map(|&b| b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::test_support::{build_pdf, PageSpec};
    use lopdf::content::Operation;

    fn first_page(bytes: &[u8]) -> PageContent {
        let doc = LopdfDocument::load_mem(bytes).unwrap();
        let (num, id) = doc.get_pages().into_iter().next().unwrap();
        extract_page(&doc, num, id).unwrap()
    }

    #[test]
    fn test_text_position_top_left() {
        let pdf = build_pdf(&[PageSpec::new(vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), Object::Integer(12)]),
            Operation::new("Td", vec![Object::Integer(72), Object::Integer(700)]),
            Operation::new("Tj", vec![Object::string_literal("Hello")]),
            Operation::new("ET", vec![]),
        ])]);
        let page = first_page(&pdf);

        assert_eq!(page.spans.len(), 1);
        let span = &page.spans[0];
        assert_eq!(span.text, "Hello");
        assert_eq!(span.font, "Helvetica");
        assert!((span.x() - 72.0).abs() < 0.01);
        assert!((span.baseline - 92.0).abs() < 0.01);
        assert!((span.size - 12.0).abs() < 0.01);
        assert!((span.width() - 30.0).abs() < 0.01);
    }

    #[test]
    fn test_ctm_scales_text() {
        let pdf = build_pdf(&[PageSpec::new(vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Integer(2),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(2),
                    Object::Integer(10),
                    Object::Integer(20),
                ],
            ),
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), Object::Integer(10)]),
            Operation::new("Td", vec![Object::Integer(5), Object::Integer(5)]),
            Operation::new("Tj", vec![Object::string_literal("Big")]),
            Operation::new("ET", vec![]),
            Operation::new("Q", vec![]),
        ])]);
        let page = first_page(&pdf);

        let span = &page.spans[0];
        assert!((span.size - 20.0).abs() < 0.01);
        assert!((span.x() - 20.0).abs() < 0.01);
        assert!((span.baseline - (792.0 - 30.0)).abs() < 0.01);
    }

    #[test]
    fn test_tj_array_inserts_word_space() {
        let pdf = build_pdf(&[PageSpec::new(vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), Object::Integer(12)]),
            Operation::new(
                "TJ",
                vec![Object::Array(vec![
                    Object::string_literal("Hello"),
                    Object::Integer(-300),
                    Object::string_literal("World"),
                ])],
            ),
            Operation::new("ET", vec![]),
        ])]);
        let page = first_page(&pdf);
        assert_eq!(page.spans[0].text, "Hello World");
    }

    #[test]
    fn test_rulings_from_rect_and_lines() {
        let pdf = build_pdf(&[PageSpec::new(vec![
            Operation::new(
                "re",
                vec![
                    Object::Integer(100),
                    Object::Integer(500),
                    Object::Integer(200),
                    Object::Integer(100),
                ],
            ),
            Operation::new("S", vec![]),
            Operation::new("m", vec![Object::Integer(100), Object::Integer(450)]),
            Operation::new("l", vec![Object::Integer(300), Object::Integer(450)]),
            Operation::new("S", vec![]),
            // Diagonal segments are not rulings
            Operation::new("m", vec![Object::Integer(0), Object::Integer(0)]),
            Operation::new("l", vec![Object::Integer(50), Object::Integer(50)]),
            Operation::new("S", vec![]),
        ])]);
        let page = first_page(&pdf);

        assert_eq!(page.rulings.len(), 5);
        let horizontal = page.rulings.iter().filter(|r| r.is_horizontal()).count();
        let vertical = page.rulings.iter().filter(|r| r.is_vertical()).count();
        assert_eq!(horizontal, 3);
        assert_eq!(vertical, 2);
        assert!(page
            .rulings
            .iter()
            .any(|r| r.is_horizontal() && (r.y0 - (792.0 - 450.0)).abs() < 0.01));
    }

    #[test]
    fn test_xobject_placement() {
        let pdf = build_pdf(&[PageSpec::new(vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Integer(200),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(100),
                    Object::Integer(50),
                    Object::Integer(600),
                ],
            ),
            Operation::new("Do", vec!["Im1".into()]),
            Operation::new("Q", vec![]),
        ])]);
        let page = first_page(&pdf);

        assert_eq!(page.images.len(), 1);
        let placement = &page.images[0];
        assert_eq!(placement.name, "Im1");
        assert_eq!(placement.bbox, BBox::new(50.0, 92.0, 250.0, 192.0));
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("\u{FB01}nal e\u{0301}"), "final \u{e9}");
        assert_eq!(normalize_text("a\u{E000}b\u{0007}"), "ab");
    }

    #[test]
    fn test_style_from_font_name() {
        assert_eq!(style_from_font_name("Helvetica-Bold"), (true, false));
        assert_eq!(style_from_font_name("Helvetica-Oblique"), (false, true));
        assert_eq!(style_from_font_name("Times-BoldItalic"), (true, true));
        assert_eq!(strip_subset_prefix("ABCDEF+Arial-Black"), "Arial-Black");
        assert_eq!(strip_subset_prefix("Arial+Extra"), "Arial+Extra");
    }

    #[test]
    fn test_decode_text_simple() {
        assert_eq!(decode_text_simple(b"Hello"), "Hello");
        assert_eq!(decode_text_simple(&[0x48, 0x65, 0x6C, 0x6C, 0xE9]), "Hell\u{e9}");
        assert_eq!(decode_text_simple(&[0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69]), "Hi");
    }

    #[test]
    fn test_matrix_then() {
        let scale = Matrix {
            a: 2.0,
            d: 2.0,
            ..Matrix::IDENTITY
        };
        let shift = Matrix::translation(10.0, 5.0);
        assert_eq!(scale.then(&shift).apply(1.0, 1.0), (12.0, 7.0));
        assert_eq!(shift.then(&scale).apply(1.0, 1.0), (22.0, 12.0));
    }
}
