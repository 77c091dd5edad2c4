//! Lattice strategy: tables from ruling-line grids.

use super::{TableCandidate, TableMethod, TableStrategy};
use crate::model::BBox;
use crate::pdf::content::{FontSpan, PageContent, Ruling};
use crate::pdf::layout::group_lines;

/// Default snapping tolerance in points.
const DEFAULT_TOLERANCE: f32 = 3.0;

/// Detects tables drawn with horizontal and vertical rules.
///
/// Rules that touch each other are clustered; each cluster with at least two
/// rules in each direction is read as a grid whose distinct y and x
/// positions are the row and column edges.
#[derive(Debug, Clone)]
pub struct LatticeStrategy {
    tolerance: f32,
}

impl Default for LatticeStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl LatticeStrategy {
    /// Create a strategy with the default snapping tolerance.
    pub fn new() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    /// Create a strategy with a custom snapping tolerance.
    pub fn with_tolerance(tolerance: f32) -> Self {
        Self { tolerance }
    }

    fn grid(&self, page: &PageContent, horizontals: &[Ruling], verticals: &[Ruling]) -> Option<TableCandidate> {
        let rows_y = snap_positions(horizontals.iter().map(|r| r.y0), self.tolerance);
        let cols_x = snap_positions(verticals.iter().map(|r| r.x0), self.tolerance);
        if rows_y.len() < 2 || cols_x.len() < 2 {
            return None;
        }

        let mut present = 0;
        for &y in &rows_y {
            for &x in &cols_x {
                let has_h = horizontals
                    .iter()
                    .any(|h| (h.y0 - y).abs() <= self.tolerance && spans_value(h.x0, h.x1, x, self.tolerance));
                let has_v = verticals
                    .iter()
                    .any(|v| (v.x0 - x).abs() <= self.tolerance && spans_value(v.y0, v.y1, y, self.tolerance));
                if has_h && has_v {
                    present += 1;
                }
            }
        }
        let confidence = present as f32 / (rows_y.len() * cols_x.len()) as f32;

        let mut rows: Vec<Vec<String>> = Vec::with_capacity(rows_y.len() - 1);
        for band in rows_y.windows(2) {
            let row: Vec<String> = cols_x
                .windows(2)
                .map(|cell| {
                    let cell_box = BBox::new(cell[0], band[0], cell[1], band[1]);
                    cell_text(&page.spans, &cell_box)
                })
                .collect();
            if row.iter().any(|c| !c.is_empty()) {
                rows.push(row);
            }
        }
        if rows.is_empty() {
            return None;
        }

        let bbox = BBox::new(
            cols_x[0],
            rows_y[0],
            cols_x[cols_x.len() - 1],
            rows_y[rows_y.len() - 1],
        );
        log::debug!(
            "Lattice: page {} grid {}x{} at {:?}, confidence {:.2}",
            page.page,
            rows_y.len() - 1,
            cols_x.len() - 1,
            bbox,
            confidence
        );

        Some(TableCandidate {
            page: page.page,
            bbox,
            rows,
            confidence,
            method: TableMethod::Lattice,
        })
    }
}

impl TableStrategy for LatticeStrategy {
    fn method(&self) -> TableMethod {
        TableMethod::Lattice
    }

    fn detect(&self, page: &PageContent) -> Vec<TableCandidate> {
        let horizontals = merge_collinear(
            page.rulings.iter().filter(|r| r.is_horizontal()).copied().collect(),
            true,
            self.tolerance,
        );
        let verticals = merge_collinear(
            page.rulings.iter().filter(|r| r.is_vertical()).copied().collect(),
            false,
            self.tolerance,
        );
        if horizontals.len() < 2 || verticals.len() < 2 {
            return Vec::new();
        }

        // Union-find over all segments; horizontals first
        let offset = horizontals.len();
        let mut clusters = DisjointSet::new(offset + verticals.len());
        for (i, h) in horizontals.iter().enumerate() {
            for (j, v) in verticals.iter().enumerate() {
                if intersects(h, v, self.tolerance) {
                    clusters.union(i, offset + j);
                }
            }
        }

        let mut groups: Vec<(usize, Vec<Ruling>, Vec<Ruling>)> = Vec::new();
        for (i, h) in horizontals.iter().enumerate() {
            let root = clusters.find(i);
            match groups.iter_mut().find(|(r, _, _)| *r == root) {
                Some((_, hs, _)) => hs.push(*h),
                None => groups.push((root, vec![*h], Vec::new())),
            }
        }
        for (j, v) in verticals.iter().enumerate() {
            let root = clusters.find(offset + j);
            if let Some((_, _, vs)) = groups.iter_mut().find(|(r, _, _)| *r == root) {
                vs.push(*v);
            }
        }

        groups
            .into_iter()
            .filter(|(_, hs, vs)| hs.len() >= 2 && vs.len() >= 2)
            .filter_map(|(_, hs, vs)| self.grid(page, &hs, &vs))
            .collect()
    }
}

/// Join segments on the same line whose ends touch.
fn merge_collinear(mut rulings: Vec<Ruling>, horizontal: bool, tolerance: f32) -> Vec<Ruling> {
    let key = |r: &Ruling| if horizontal { (r.y0, r.x0) } else { (r.x0, r.y0) };
    rulings.sort_by(|a, b| {
        let (a0, a1) = key(a);
        let (b0, b1) = key(b);
        a0.total_cmp(&b0).then_with(|| a1.total_cmp(&b1))
    });

    let mut merged: Vec<Ruling> = Vec::new();
    for ruling in rulings {
        if let Some(last) = merged.last_mut() {
            let joined = if horizontal {
                (ruling.y0 - last.y0).abs() <= tolerance && ruling.x0 <= last.x1 + tolerance
            } else {
                (ruling.x0 - last.x0).abs() <= tolerance && ruling.y0 <= last.y1 + tolerance
            };
            if joined {
                last.x1 = last.x1.max(ruling.x1);
                last.y1 = last.y1.max(ruling.y1);
                continue;
            }
        }
        merged.push(ruling);
    }
    merged
}

fn intersects(h: &Ruling, v: &Ruling, tolerance: f32) -> bool {
    spans_value(h.x0, h.x1, v.x0, tolerance) && spans_value(v.y0, v.y1, h.y0, tolerance)
}

fn spans_value(start: f32, end: f32, value: f32, tolerance: f32) -> bool {
    value >= start - tolerance && value <= end + tolerance
}

/// Sorted distinct positions; values within `tolerance` collapse to their
/// mean.
fn snap_positions(values: impl Iterator<Item = f32>, tolerance: f32) -> Vec<f32> {
    let mut values: Vec<f32> = values.collect();
    values.sort_by(f32::total_cmp);

    let mut groups: Vec<Vec<f32>> = Vec::new();
    for value in values {
        match groups.last_mut() {
            Some(group) if group.last().is_some_and(|last| value - last <= tolerance) => {
                group.push(value)
            }
            _ => groups.push(vec![value]),
        }
    }
    groups
        .into_iter()
        .map(|g| g.iter().sum::<f32>() / g.len() as f32)
        .collect()
}

/// Text of the spans whose centre lies in the cell.
fn cell_text(spans: &[FontSpan], cell: &BBox) -> String {
    let inside: Vec<FontSpan> = spans
        .iter()
        .filter(|s| cell.contains_point(s.bbox.x_mid(), s.bbox.y_mid(), 0.0))
        .cloned()
        .collect();
    group_lines(inside)
        .iter()
        .map(|line| line.text().trim().to_string())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Minimal union-find.
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}
