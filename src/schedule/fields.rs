//! Consume-once field extraction
//!
//! Works on a per-box working pool copied out of the geometry matcher. Each
//! extractor removes the region it matched so the same fragment can never
//! satisfy two different fields; whatever is left over becomes the draft
//! description.

use chrono::NaiveTime;

use crate::schedule::members::MemberMask;
use crate::vision::OcrRegion;

/// Category substrings the grid legend uses. A fragment containing one of
/// these is the slot's category tag.
pub const CATEGORY_TAGS: &[&str] = &["日常", "游戏", "歌回", "杂谈", "联动", "电台", "舞台"];

/// Topic extracted from a working pool.
#[derive(Debug, Clone)]
pub struct Topic {
    pub mask: MemberMask,
    /// Raw (trimmed) text of the matched region.
    pub title: String,
}

/// Per-box working pool of OCR regions.
///
/// Owned copy, mutation never leaks back into the shared OCR result.
#[derive(Debug)]
pub struct FieldPool {
    regions: Vec<OcrRegion>,
}

impl FieldPool {
    pub fn new(regions: Vec<OcrRegion>) -> Self {
        Self { regions }
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// First region whose trimmed text is exactly `HH:mm` (ASCII or
    /// full-width colon). The matched region is consumed.
    pub fn extract_time(&mut self) -> Option<NaiveTime> {
        let idx = self
            .regions
            .iter()
            .position(|r| parse_slot_time(r.text.trim()).is_some())?;
        let region = self.regions.remove(idx);
        parse_slot_time(region.text.trim())
    }

    /// First region containing a known category substring. The matched
    /// region is consumed; the returned tag is the vocabulary word, not the
    /// full fragment.
    pub fn extract_tag(&mut self) -> Option<&'static str> {
        for (idx, region) in self.regions.iter().enumerate() {
            let text = region.text.trim();
            if let Some(tag) = CATEGORY_TAGS.iter().find(|tag| text.contains(*tag)) {
                let tag = *tag;
                self.regions.remove(idx);
                return Some(tag);
            }
        }
        None
    }

    /// First region whose text yields a non-default membership mask. Regions
    /// that fall back to the all-members mask are skipped, not consumed.
    pub fn extract_topic(&mut self) -> Option<Topic> {
        for (idx, region) in self.regions.iter().enumerate() {
            let text = region.text.trim();
            let mask = MemberMask::from_text(text);
            if !mask.is_default() {
                let title = text.to_string();
                self.regions.remove(idx);
                return Some(Topic { mask, title });
            }
        }
        None
    }

    /// Concatenate whatever the extractors did not consume, in pool order.
    pub fn into_description(self) -> String {
        self.regions
            .iter()
            .map(|r| r.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Parse `HH:mm` with either colon form. Exact match only: any extra
/// character disqualifies the fragment.
fn parse_slot_time(text: &str) -> Option<NaiveTime> {
    let (hours, minutes) = text.split_once(':').or_else(|| text.split_once('：'))?;
    if hours.len() != 2 || minutes.len() != 2 {
        return None;
    }
    let h: u32 = hours.parse().ok()?;
    let m: u32 = minutes.parse().ok()?;
    NaiveTime::from_hms_opt(h, m, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::Rect;

    fn pool(texts: &[&str]) -> FieldPool {
        let regions = texts
            .iter()
            .enumerate()
            .map(|(i, t)| OcrRegion {
                text: t.to_string(),
                rect: Rect::new(0.0, i as f32 * 10.0, 100.0, i as f32 * 10.0 + 8.0),
            })
            .collect();
        FieldPool::new(regions)
    }

    #[test]
    fn test_time_exact_match_only() {
        assert!(parse_slot_time("19:30").is_some());
        assert!(parse_slot_time("19：30").is_some());
        assert!(parse_slot_time("7:30pm").is_none());
        assert!(parse_slot_time("9:30").is_none());
        assert!(parse_slot_time("19:30开始").is_none());
    }

    #[test]
    fn test_time_trims_before_matching() {
        let mut p = pool(&["19:30 "]);
        let time = p.extract_time().unwrap();
        assert_eq!(time, NaiveTime::from_hms_opt(19, 30, 0).unwrap());
    }

    #[test]
    fn test_time_rejects_out_of_range() {
        assert!(parse_slot_time("25:00").is_none());
        assert!(parse_slot_time("19:61").is_none());
    }

    #[test]
    fn test_consume_once() {
        // A region that matched the time must not be visible to later
        // extractors on the same box.
        let mut p = pool(&["19:30", "向晚日常直播"]);
        assert!(p.extract_time().is_some());
        assert_eq!(p.len(), 1);

        // The remaining region contains both a tag and a topic; tag
        // extraction consumes it, so the topic scan comes up empty.
        assert_eq!(p.extract_tag(), Some("日常"));
        assert!(p.extract_topic().is_none());
        assert!(p.is_empty());
    }

    #[test]
    fn test_topic_skips_default_mask() {
        let mut p = pool(&["特别纪念回", "向晚直播"]);
        let topic = p.extract_topic().unwrap();
        assert_eq!(topic.title, "向晚直播");
        // The default-mask region was skipped, not consumed.
        assert_eq!(p.len(), 1);
    }

    #[test]
    fn test_missing_tag_is_not_fatal() {
        let mut p = pool(&["21:00", "贝拉晚安电台直播"]);
        assert!(p.extract_time().is_some());
        // "电台" is in the vocabulary, consumed as the tag...
        assert_eq!(p.extract_tag(), Some("电台"));
        // ...leaving no topic region at all.
        assert!(p.extract_topic().is_none());
    }

    #[test]
    fn test_leftovers_become_description() {
        let mut p = pool(&["19:30", " 嘉然直播 ", "特别来宾", "敬请期待"]);
        p.extract_time();
        p.extract_topic();
        assert_eq!(p.into_description(), "特别来宾\n敬请期待");
    }

    #[test]
    fn test_empty_pool_yields_nothing() {
        let mut p = pool(&[]);
        assert!(p.extract_time().is_none());
        assert!(p.extract_tag().is_none());
        assert!(p.extract_topic().is_none());
    }
}
