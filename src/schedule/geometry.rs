//! Geometric reconciliation of detection boxes and OCR regions
//!
//! Matches OCR fragments into detection boxes by containment, derives the
//! day-of-week offset from a box's horizontal grid position, and counts
//! neighbors for the crowding heuristic.

use crate::vision::{DetectionBox, OcrRegion, Rect};

/// Horizontal layout of the day columns on the grid.
#[derive(Debug, Clone, Copy)]
pub struct GridLayout {
    /// Left edge of the first day column (working pixels).
    pub left: f32,
    /// Width of one day column (working pixels).
    pub column_width: f32,
    /// Column index the TimeBase date sits in.
    pub anchor_column: i32,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            left: 120.0,
            column_width: 720.0,
            anchor_column: 1,
        }
    }
}

impl GridLayout {
    /// Raw signed column offset of a box relative to the anchor column.
    pub fn raw_offset(&self, rect: &Rect) -> i32 {
        let (cx, _) = rect.center();
        let column = ((cx - self.left) / self.column_width).floor() as i32;
        column - self.anchor_column
    }
}

/// All OCR regions whose rectangle lies fully inside `rect`, in recognition
/// order. The returned list is an owned per-box copy; the source pool is
/// never mutated.
pub fn regions_within(rect: &Rect, pool: &[OcrRegion]) -> Vec<OcrRegion> {
    pool.iter()
        .filter(|region| rect.contains(&region.rect))
        .cloned()
        .collect()
}

/// Fold a raw column offset into a day delta.
///
/// The fold is asymmetric on purpose: `o >= 0` maps to `o - 1`, `o < 0`
/// maps to `(-o) + 3`, tied to how the 4-column grid wraps around its
/// anchor. Preserved as-is from the grid layout this model was trained on.
pub fn fold_raw_offset(o: i32) -> i32 {
    if o >= 0 {
        o - 1
    } else {
        -o + 3
    }
}

/// Day delta of a box from the TimeBase date.
pub fn day_offset(rect: &Rect, grid: &GridLayout) -> i32 {
    fold_raw_offset(grid.raw_offset(rect))
}

/// Number of boxes (the box itself included) whose centers fall within
/// `radius` of this box's center. More than `crowd_limit` of these suggests
/// a simultaneous/group broadcast pattern.
pub fn nearby_count(rect: &Rect, all: &[DetectionBox], radius: f32) -> usize {
    all.iter()
        .filter(|other| rect.center_distance(&other.rect) <= radius)
        .count()
}
