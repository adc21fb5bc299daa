//! Vision layer
//!
//! Detection-model and OCR collaborator contracts plus the geometric value
//! types shared across the pipeline. The production implementations are
//! [`detector::GridDetector`] (ONNX Runtime) and [`ocr::RemoteOcr`] (HTTP
//! gateway); tests substitute in-process fakes through the traits.

pub mod detector;
pub mod header;
pub mod ocr;

use anyhow::Result;
use async_trait::async_trait;
use image::RgbImage;

pub use detector::GridDetector;
pub use ocr::RemoteOcr;

/// Working resolution the whole pipeline operates in. Source images are
/// normalized to this size before inference, and every rectangle in the
/// system is expressed in these pixel coordinates.
pub const WORK_WIDTH: u32 = 3000;
/// See [`WORK_WIDTH`].
pub const WORK_HEIGHT: u32 = 2000;

/// Axis-aligned rectangle in working-resolution pixel coordinates.
///
/// Invariant: `x_top < x_bottom` and `y_top < y_bottom`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x_top: f32,
    pub y_top: f32,
    pub x_bottom: f32,
    pub y_bottom: f32,
}

impl Rect {
    pub fn new(x_top: f32, y_top: f32, x_bottom: f32, y_bottom: f32) -> Self {
        debug_assert!(x_top < x_bottom && y_top < y_bottom);
        Self {
            x_top,
            y_top,
            x_bottom,
            y_bottom,
        }
    }

    pub fn width(&self) -> f32 {
        self.x_bottom - self.x_top
    }

    pub fn height(&self) -> f32 {
        self.y_bottom - self.y_top
    }

    /// Center point of the rectangle.
    pub fn center(&self) -> (f32, f32) {
        (
            (self.x_top + self.x_bottom) / 2.0,
            (self.y_top + self.y_bottom) / 2.0,
        )
    }

    /// True when `other` lies fully inside `self`.
    ///
    /// Full containment is the edge policy for matching OCR fragments to
    /// detection boxes: grid cells share border lines, and an overlap test
    /// would leak a neighbor's text across them.
    pub fn contains(&self, other: &Rect) -> bool {
        other.x_top >= self.x_top
            && other.y_top >= self.y_top
            && other.x_bottom <= self.x_bottom
            && other.y_bottom <= self.y_bottom
    }

    /// True when the two rectangles share any area.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x_top < other.x_bottom
            && other.x_top < self.x_bottom
            && self.y_top < other.y_bottom
            && other.y_top < self.y_bottom
    }

    /// Euclidean distance between the centers of two rectangles.
    pub fn center_distance(&self, other: &Rect) -> f32 {
        let (ax, ay) = self.center();
        let (bx, by) = other.center();
        ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt()
    }
}

/// Closed set of category tags the detection model predicts for a grid slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotLabel {
    Ava,
    Bella,
    Diana,
    Eileen,
    Group,
    /// Anything the model was trained to reject (logos, legends, decorations).
    Other,
}

impl SlotLabel {
    /// Map a model class name onto the closed label set. Unknown names fold
    /// into [`SlotLabel::Other`].
    pub fn from_class_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "ava" | "向晚" => SlotLabel::Ava,
            "bella" | "贝拉" => SlotLabel::Bella,
            "diana" | "嘉然" => SlotLabel::Diana,
            "eileen" | "乃琳" => SlotLabel::Eileen,
            "group" | "团播" => SlotLabel::Group,
            _ => SlotLabel::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SlotLabel::Ava => "Ava",
            SlotLabel::Bella => "Bella",
            SlotLabel::Diana => "Diana",
            SlotLabel::Eileen => "Eileen",
            SlotLabel::Group => "Group",
            SlotLabel::Other => "Other",
        }
    }
}

impl std::fmt::Display for SlotLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One model-predicted region of the schedule grid.
///
/// Created once per inference call and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct DetectionBox {
    pub label: SlotLabel,
    /// Confidence in `[0, 1]`.
    pub score: f32,
    pub rect: Rect,
}

/// One OCR-recognized text fragment.
///
/// `text` may carry leading/trailing whitespace; consumers trim before
/// matching. The recognized list itself is never mutated, field extraction
/// works on per-box copies.
#[derive(Debug, Clone)]
pub struct OcrRegion {
    pub text: String,
    pub rect: Rect,
}

/// Detection-model collaborator: predicts slot boxes on a normalized image.
#[async_trait]
pub trait Detector: Send + Sync {
    async fn detect(&self, image: &RgbImage) -> Result<Vec<DetectionBox>>;
}

/// OCR collaborator: recognizes text fragments on encoded image bytes.
#[async_trait]
pub trait OcrClient: Send + Sync {
    async fn recognize(&self, image_jpeg: &[u8]) -> Result<Vec<OcrRegion>>;
}
