//! Header confirmation and TimeBase derivation
//!
//! The grid carries a title block in its upper half: a confirmation phrase
//! proving the image is this week's schedule, and a date row anchoring the
//! day columns. Both are read from the already-recognized OCR regions, no
//! second OCR pass.

use anyhow::{bail, Result};
use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

use crate::schedule::TimeBase;
use crate::vision::{OcrRegion, Rect};

/// Phrase that confirms the image is a weekly schedule grid.
pub const CONFIRMATION_PHRASE: &str = "本周日程表";

/// Header window, as fractions of the working resolution.
const HEADER_X: f32 = 0.50;
const HEADER_Y: f32 = 0.08;
const HEADER_W: f32 = 0.267;
const HEADER_H: f32 = 0.085;

fn date_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:(\d{4})年)?(\d{1,2})月(\d{1,2})日").expect("valid date pattern")
    })
}

/// The header window rectangle for a given image size.
pub fn header_window(width: u32, height: u32) -> Rect {
    let (w, h) = (width as f32, height as f32);
    Rect::new(
        HEADER_X * w,
        HEADER_Y * h,
        (HEADER_X + HEADER_W) * w,
        (HEADER_Y + HEADER_H) * h,
    )
}

/// Confirm the header phrase and derive the anchor date.
///
/// `fallback_year` fills in dates written without a year (the common case
/// on the grid); callers pass the current wall-clock year.
pub fn confirm_and_anchor(
    regions: &[OcrRegion],
    width: u32,
    height: u32,
    fallback_year: i32,
) -> Result<TimeBase> {
    let window = header_window(width, height);
    let header: Vec<&OcrRegion> = regions
        .iter()
        .filter(|r| window.overlaps(&r.rect))
        .collect();
    debug!("{} OCR regions in header window", header.len());

    if !header
        .iter()
        .any(|r| r.text.contains(CONFIRMATION_PHRASE))
    {
        bail!("image not confirmed as a weekly schedule (header phrase missing)");
    }

    for region in &header {
        if let Some(caps) = date_pattern().captures(region.text.trim()) {
            let year = caps
                .get(1)
                .map(|y| y.as_str().parse().unwrap_or(fallback_year))
                .unwrap_or(fallback_year);
            let month: u32 = caps[2].parse()?;
            let day: u32 = caps[3].parse()?;
            let Some(date) = NaiveDate::from_ymd_opt(year, month, day) else {
                bail!("header date {year}-{month}-{day} is not a real date");
            };
            debug!("anchor date {date} from '{}'", region.text.trim());
            return Ok(TimeBase::new(date));
        }
    }
    bail!("no anchor date found in the header area");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::{WORK_HEIGHT, WORK_WIDTH};

    fn header_region(text: &str) -> OcrRegion {
        // Safely inside the header window at 3000x2000.
        OcrRegion {
            text: text.to_string(),
            rect: Rect::new(1550.0, 180.0, 2200.0, 300.0),
        }
    }

    #[test]
    fn test_confirmed_header_with_dated_row() {
        let regions = vec![
            header_region("A-SOUL 本周日程表"),
            header_region("2024年5月1日"),
        ];
        let base = confirm_and_anchor(&regions, WORK_WIDTH, WORK_HEIGHT, 2099).unwrap();
        assert_eq!(base.date, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
    }

    #[test]
    fn test_yearless_date_uses_fallback() {
        let regions = vec![header_region("本周日程表"), header_region("5月1日起")];
        let base = confirm_and_anchor(&regions, WORK_WIDTH, WORK_HEIGHT, 2024).unwrap();
        assert_eq!(base.date, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
    }

    #[test]
    fn test_missing_phrase_aborts() {
        let regions = vec![header_region("新衣装发布会"), header_region("5月1日")];
        let err = confirm_and_anchor(&regions, WORK_WIDTH, WORK_HEIGHT, 2024).unwrap_err();
        assert!(err.to_string().contains("not confirmed"));
    }

    #[test]
    fn test_phrase_outside_window_does_not_count() {
        let regions = vec![OcrRegion {
            text: "本周日程表".to_string(),
            rect: Rect::new(100.0, 1500.0, 600.0, 1600.0),
        }];
        assert!(confirm_and_anchor(&regions, WORK_WIDTH, WORK_HEIGHT, 2024).is_err());
    }

    #[test]
    fn test_missing_date_aborts() {
        let regions = vec![header_region("本周日程表")];
        let err = confirm_and_anchor(&regions, WORK_WIDTH, WORK_HEIGHT, 2024).unwrap_err();
        assert!(err.to_string().contains("anchor date"));
    }
}
