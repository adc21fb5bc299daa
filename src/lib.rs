//! gridcal - Schedule-grid image to calendar events
//!
//! Reads a photographed weekly schedule grid, detects the slot boxes with an
//! ONNX model, recognizes their text through a remote OCR gateway, reconciles
//! geometry and text into event drafts, checks them against a Feishu calendar
//! and submits the ones that fit, then renders an annotated review image.

pub mod calendar;
pub mod config;
pub mod pipeline;
pub mod schedule;
pub mod vision;

pub use pipeline::{BoxOutcome, Pipeline, ProcessingResult};
