//! Pipeline orchestration
//!
//! Drives one full run over a schedule image: detection and OCR launched
//! together, header confirmation, then a strictly sequential per-box pass
//! of geometry matching, field extraction, slot resolution, conflict
//! checking, and draft submission, finished by result aggregation and
//! rendering.
//!
//! Per-box remote calls are serialized behind an explicit gate: the
//! external calendar API is rate limited, so overlapping calls are a
//! correctness bug here, not a tuning choice.

pub mod render;
pub mod report;

use anyhow::{Context, Result};
use chrono::{Datelike, Local};
use image::RgbImage;
use std::io::Cursor;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::calendar::{
    CalendarEventDraft, CalendarStore, ConflictChecker, EventDraftBuilder, IdentityTable,
};
use crate::config::AppConfig;
use crate::schedule::{geometry, FieldPool, GridLayout, SlotInput, SlotResolver, SlotSkip, TimeBase};
use crate::vision::{header, DetectionBox, Detector, OcrClient, OcrRegion, WORK_HEIGHT, WORK_WIDTH};

pub use render::ResultRenderer;
pub use report::RichText;

/// Why one box produced no event. Box-level conditions never escalate to
/// run-level failure.
#[derive(Debug, Error)]
pub enum BoxSkip {
    #[error("no time text found, box skipped")]
    TimeNotFound,
    #[error("no topic naming a member found, box skipped")]
    TopicNotFound,
    #[error("unsupported category '{0}', box skipped")]
    UnsupportedCategory(String),
    #[error("identity configuration incomplete: {0}")]
    MissingIdentity(String),
    #[error("schedule conflict, '{0}' not created")]
    Conflict(String),
    #[error("remote call failed: {0}")]
    Remote(String),
}

/// Outcome of one box's processing.
#[derive(Debug)]
pub struct BoxOutcome {
    pub detection: DetectionBox,
    pub success: bool,
    /// Warnings and errors in the order they occurred.
    pub errors: Vec<RichText>,
    pub draft: Option<CalendarEventDraft>,
    pub event_id: Option<String>,
}

/// Aggregate result of one run.
#[derive(Debug)]
pub struct ProcessingResult {
    /// Boxes that survived the confidence filter.
    pub total_detected: usize,
    pub successful_count: usize,
    pub outcomes: Vec<BoxOutcome>,
    /// Run-level notes (for example an off-spec input size).
    pub warnings: Vec<RichText>,
    pub annotated_jpeg: Vec<u8>,
}

/// One-image-per-invocation orchestrator.
pub struct Pipeline {
    detector: Arc<dyn Detector>,
    ocr: Arc<dyn OcrClient>,
    store: Arc<dyn CalendarStore>,
    identities: IdentityTable,
    resolver: SlotResolver,
    grid: GridLayout,
    conflict: ConflictChecker,
    renderer: ResultRenderer,
    score_threshold: f32,
    crowd_limit: usize,
    crowd_radius: f32,
    /// Serializes all per-box remote work; see module docs.
    remote_gate: Mutex<()>,
}

impl Pipeline {
    pub fn new(
        config: &AppConfig,
        detector: Arc<dyn Detector>,
        ocr: Arc<dyn OcrClient>,
        store: Arc<dyn CalendarStore>,
    ) -> Self {
        let p = &config.pipeline;
        Self {
            detector,
            ocr,
            store,
            identities: IdentityTable::from_config(&config.calendar),
            resolver: SlotResolver {
                default_duration_min: p.default_duration_min,
                crowded_duration_min: p.crowded_duration_min,
                lead_in_min: p.lead_in_min,
            },
            grid: GridLayout {
                left: p.grid_left_px,
                column_width: p.column_width_px,
                anchor_column: p.anchor_column,
            },
            conflict: ConflictChecker::new(p.conflict_margin_min),
            renderer: ResultRenderer::new(&config.render),
            score_threshold: p.score_threshold,
            crowd_limit: p.crowd_limit,
            crowd_radius: p.crowd_radius_px,
            remote_gate: Mutex::new(()),
        }
    }

    /// Process one schedule image end to end. Pre-box failures (decode,
    /// detection, OCR, header confirmation) abort the run; everything after
    /// that is isolated per box.
    pub async fn run(&self, image_bytes: &[u8]) -> Result<ProcessingResult> {
        let mut warnings = Vec::new();

        let source = image::load_from_memory(image_bytes)
            .context("Failed to decode schedule image")?
            .to_rgb8();
        if source.width() != WORK_WIDTH || source.height() != WORK_HEIGHT {
            warn!(
                "off-spec input size {}x{}, normalizing",
                source.width(),
                source.height()
            );
            warnings.push(
                RichText::new()
                    .text("input is ")
                    .bold(format!("{}x{}", source.width(), source.height()))
                    .text(format!(
                        ", expected {WORK_WIDTH}x{WORK_HEIGHT}; analysis may degrade"
                    )),
            );
        }
        let normalized = normalize(&source);
        let normalized_jpeg = encode_jpeg(&normalized)?;

        // Detection and OCR are independent; launch together, await both.
        info!("running detection model and OCR");
        let (boxes, regions) = tokio::join!(
            self.detector.detect(&normalized),
            self.ocr.recognize(&normalized_jpeg)
        );
        let boxes = boxes.context("detection model failed")?;
        let regions = regions.context("OCR failed")?;
        info!("{} boxes predicted, {} OCR regions", boxes.len(), regions.len());

        let timebase = header::confirm_and_anchor(
            &regions,
            WORK_WIDTH,
            WORK_HEIGHT,
            Local::now().year(),
        )?;

        let accepted: Vec<DetectionBox> = boxes
            .into_iter()
            .filter(|b| b.score >= self.score_threshold)
            .collect();
        debug!(
            "{} boxes above confidence threshold {}",
            accepted.len(),
            self.score_threshold
        );

        // Strictly sequential: box i+1's remote work must not start before
        // box i's has finished.
        let mut outcomes = Vec::with_capacity(accepted.len());
        for (index, detection) in accepted.iter().enumerate() {
            let outcome = self
                .process_box(index, detection, &accepted, &regions, &timebase)
                .await;
            outcomes.push(outcome);
        }

        let successful_count = outcomes.iter().filter(|o| o.success).count();
        let verdicts: Vec<(DetectionBox, bool)> = outcomes
            .iter()
            .map(|o| (o.detection.clone(), o.success))
            .collect();
        let annotated_jpeg = self.renderer.annotate(&normalized, &verdicts)?;

        info!(
            "run complete: {}/{} events created",
            successful_count,
            accepted.len()
        );
        Ok(ProcessingResult {
            total_detected: accepted.len(),
            successful_count,
            outcomes,
            warnings,
            annotated_jpeg,
        })
    }

    async fn process_box(
        &self,
        index: usize,
        detection: &DetectionBox,
        all_boxes: &[DetectionBox],
        regions: &[OcrRegion],
        timebase: &TimeBase,
    ) -> BoxOutcome {
        let mut errors = Vec::new();
        let tagline = format!("box {}", index + 1);

        // Per-box working pool: an owned copy, consumed field by field.
        let mut pool = FieldPool::new(geometry::regions_within(&detection.rect, regions));
        debug!("{tagline}: {} regions in pool", pool.len());

        let Some(time) = pool.extract_time() else {
            return self.skipped(detection, errors, &tagline, BoxSkip::TimeNotFound);
        };

        let tag = pool.extract_tag();
        if tag.is_none() {
            warn!("{tagline}: no category tag");
            errors.push(
                RichText::new()
                    .text(format!("{tagline}: "))
                    .text("category tag not found, continuing without one"),
            );
        }

        let Some(topic) = pool.extract_topic() else {
            return self.skipped(detection, errors, &tagline, BoxSkip::TopicNotFound);
        };

        let offset = geometry::day_offset(&detection.rect, &self.grid);
        let crowded =
            geometry::nearby_count(&detection.rect, all_boxes, self.crowd_radius) > self.crowd_limit;
        let mut description = pool.into_description();
        if let Some(tag) = tag {
            description = if description.is_empty() {
                tag.to_string()
            } else {
                format!("{tag}\n{description}")
            };
        }

        let input = SlotInput {
            label: detection.label,
            time,
            date: timebase.day(offset),
            mask: topic.mask,
            crowded,
            title: topic.title,
            description,
        };
        let draft = match self.resolver.resolve(&input, &self.identities) {
            Ok(Ok(draft)) => draft,
            Ok(Err(SlotSkip::UnsupportedCategory)) => {
                return self.skipped(
                    detection,
                    errors,
                    &tagline,
                    BoxSkip::UnsupportedCategory(detection.label.to_string()),
                );
            }
            // The resolver only fails on an identity-table gap; no remote
            // call has happened yet.
            Err(e) => {
                return self.skipped(
                    detection,
                    errors,
                    &tagline,
                    BoxSkip::MissingIdentity(e.to_string()),
                );
            }
        };

        // All remote work for this box happens under the gate.
        let _serialized = self.remote_gate.lock().await;

        match self.conflict.has_conflict(self.store.as_ref(), &draft).await {
            Ok(false) => {}
            Ok(true) => {
                return self.skipped(
                    detection,
                    errors,
                    &tagline,
                    BoxSkip::Conflict(draft.summary.clone()),
                );
            }
            Err(e) => {
                return self.skipped(detection, errors, &tagline, BoxSkip::Remote(e.to_string()));
            }
        }

        let builder = EventDraftBuilder::new(self.store.as_ref(), &self.identities);
        match builder.submit(&draft).await {
            Ok(event_id) => {
                info!("{tagline}: event {event_id} created ('{}')", draft.summary);
                BoxOutcome {
                    detection: detection.clone(),
                    success: true,
                    errors,
                    draft: Some(draft),
                    event_id: Some(event_id),
                }
            }
            Err(e) => {
                warn!("{tagline}: submission failed: {e}");
                errors.push(
                    RichText::new()
                        .text(format!("{tagline}: "))
                        .bold(e.to_string()),
                );
                BoxOutcome {
                    detection: detection.clone(),
                    success: false,
                    errors,
                    draft: Some(draft),
                    event_id: None,
                }
            }
        }
    }

    fn skipped(
        &self,
        detection: &DetectionBox,
        mut errors: Vec<RichText>,
        tagline: &str,
        skip: BoxSkip,
    ) -> BoxOutcome {
        warn!("{tagline}: {skip}");
        errors.push(
            RichText::new()
                .text(format!("{tagline}: "))
                .bold(skip.to_string()),
        );
        BoxOutcome {
            detection: detection.clone(),
            success: false,
            errors,
            draft: None,
            event_id: None,
        }
    }
}

/// Normalize a source image to the working resolution.
fn normalize(source: &RgbImage) -> RgbImage {
    if source.width() == WORK_WIDTH && source.height() == WORK_HEIGHT {
        source.clone()
    } else {
        image::imageops::resize(
            source,
            WORK_WIDTH,
            WORK_HEIGHT,
            image::imageops::FilterType::Triangle,
        )
    }
}

fn encode_jpeg(image: &RgbImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Jpeg)
        .context("Failed to encode normalized image")?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_passthrough_and_resize() {
        let exact = RgbImage::new(WORK_WIDTH, WORK_HEIGHT);
        assert_eq!(normalize(&exact).dimensions(), (WORK_WIDTH, WORK_HEIGHT));

        let small = RgbImage::new(300, 200);
        assert_eq!(normalize(&small).dimensions(), (WORK_WIDTH, WORK_HEIGHT));
    }

    #[test]
    fn test_skip_messages_name_their_cause() {
        assert!(BoxSkip::TimeNotFound.to_string().contains("time"));
        assert!(BoxSkip::TopicNotFound.to_string().contains("topic"));
        assert!(BoxSkip::Conflict("【向晚单播】向晚直播".to_string())
            .to_string()
            .contains("向晚"));

        // A configuration gap must not read like a remote failure.
        let msg = BoxSkip::MissingIdentity("no identity mapping configured for ava".to_string())
            .to_string();
        assert!(msg.contains("identity"));
        assert!(!msg.contains("remote"));
    }
}
