//! Schedule slot resolution
//!
//! Turns an extracted time-of-day plus day offset, membership mask, and the
//! crowding heuristic into a concrete start/end pair, attendee list, and
//! color, assembled into a [`CalendarEventDraft`].

use anyhow::{bail, Result};
use chrono::{Duration, NaiveDate, NaiveTime};

use crate::calendar::{CalendarEventDraft, CalendarIdentity, IdentityTable};
use crate::schedule::members::{compose_summary, MemberMask};
use crate::vision::SlotLabel;

/// Default reminder, minutes before start.
const REMINDER_MINUTES: i32 = 5;

/// Why a slot produced no draft. These are expected outcomes, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotSkip {
    /// Label was the "other/unclassified" category.
    UnsupportedCategory,
}

/// Extracted inputs for one slot.
#[derive(Debug, Clone)]
pub struct SlotInput {
    pub label: SlotLabel,
    pub time: NaiveTime,
    /// Resolved calendar date (TimeBase plus folded day offset).
    pub date: NaiveDate,
    pub mask: MemberMask,
    /// Crowding heuristic verdict for this box.
    pub crowded: bool,
    /// Raw topic text, becomes the summary body.
    pub title: String,
    /// Unconsumed pool text.
    pub description: String,
}

/// Resolver parameters. All durations in minutes.
#[derive(Debug, Clone)]
pub struct SlotResolver {
    pub default_duration_min: i64,
    pub crowded_duration_min: i64,
    pub lead_in_min: i64,
}

impl Default for SlotResolver {
    fn default() -> Self {
        Self {
            default_duration_min: 180,
            crowded_duration_min: 60,
            lead_in_min: 10,
        }
    }
}

impl SlotResolver {
    /// Resolve one slot into a draft, or a skip verdict for slots that are
    /// recognized but not schedulable. Rules apply in order, first match
    /// wins; the two fixed presets ignore the duration parameters entirely.
    pub fn resolve(
        &self,
        input: &SlotInput,
        identities: &IdentityTable,
    ) -> Result<std::result::Result<CalendarEventDraft, SlotSkip>> {
        if input.label == SlotLabel::Other {
            return Ok(Err(SlotSkip::UnsupportedCategory));
        }

        let (start_time, end_time) = if input.time == NaiveTime::from_hms_opt(19, 30, 0).unwrap() {
            // First fixed slot preset.
            (
                NaiveTime::from_hms_opt(19, 20, 0).unwrap(),
                NaiveTime::from_hms_opt(21, 10, 0).unwrap(),
            )
        } else if input.time == NaiveTime::from_hms_opt(21, 0, 0).unwrap() {
            // Second fixed slot preset.
            (
                NaiveTime::from_hms_opt(20, 50, 0).unwrap(),
                NaiveTime::from_hms_opt(22, 40, 0).unwrap(),
            )
        } else {
            let duration = if input.crowded {
                Duration::minutes(self.crowded_duration_min)
            } else {
                Duration::minutes(self.default_duration_min)
            };
            let start = input.time - Duration::minutes(self.lead_in_min);
            (start, start + duration)
        };

        let start = input.date.and_time(start_time);
        let mut end = input.date.and_time(end_time);
        if end <= start {
            // Late slot spilling past midnight.
            end += Duration::days(1);
        }

        let attendees = self.attendees_for(input.mask, identities)?;

        Ok(Ok(CalendarEventDraft {
            summary: compose_summary(input.mask, &input.title),
            description: input.description.clone(),
            start,
            end,
            color: input.mask.event_color(),
            attendees,
            reminder_minutes: vec![REMINDER_MINUTES],
        }))
    }

    /// Group-kind masks invite the group chat alone; member masks invite one
    /// user per set bit plus the team chat.
    fn attendees_for(
        &self,
        mask: MemberMask,
        identities: &IdentityTable,
    ) -> Result<Vec<CalendarIdentity>> {
        if mask.is_group() {
            return Ok(vec![CalendarIdentity::Chat(
                identities.group_chat_id.clone(),
            )]);
        }

        let mut attendees = Vec::new();
        for member in mask.members() {
            let Some(open_id) = identities.member_open_id(member) else {
                bail!("no identity mapping configured for {}", member.key());
            };
            attendees.push(CalendarIdentity::User(open_id.to_string()));
        }
        attendees.push(CalendarIdentity::Chat(identities.team_chat_id.clone()));
        Ok(attendees)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CalendarConfig;
    use crate::schedule::members::DEFAULT_EVENT_COLOR;

    fn identities() -> IdentityTable {
        let mut config = CalendarConfig::default();
        for key in ["ava", "bella", "diana", "eileen"] {
            config
                .member_open_ids
                .insert(key.to_string(), format!("ou_{key}"));
        }
        config.team_chat_id = "oc_team".to_string();
        config.group_chat_id = "oc_group".to_string();
        IdentityTable::from_config(&config)
    }

    fn input(time: (u32, u32), mask_text: &str) -> SlotInput {
        SlotInput {
            label: SlotLabel::Ava,
            time: NaiveTime::from_hms_opt(time.0, time.1, 0).unwrap(),
            date: NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
            mask: MemberMask::from_text(mask_text),
            crowded: false,
            title: mask_text.to_string(),
            description: String::new(),
        }
    }

    #[test]
    fn test_first_fixed_slot_ignores_duration_params() {
        // Deliberately absurd duration parameters; the preset must win.
        let resolver = SlotResolver {
            default_duration_min: 1,
            crowded_duration_min: 1,
            lead_in_min: 1,
        };
        let draft = resolver
            .resolve(&input((19, 30), "向晚直播"), &identities())
            .unwrap()
            .unwrap();
        assert_eq!(
            draft.start,
            NaiveDate::from_ymd_opt(2024, 5, 2)
                .unwrap()
                .and_hms_opt(19, 20, 0)
                .unwrap()
        );
        assert_eq!(
            draft.end,
            NaiveDate::from_ymd_opt(2024, 5, 2)
                .unwrap()
                .and_hms_opt(21, 10, 0)
                .unwrap()
        );
    }

    #[test]
    fn test_second_fixed_slot() {
        let draft = SlotResolver::default()
            .resolve(&input((21, 0), "贝拉直播"), &identities())
            .unwrap()
            .unwrap();
        assert_eq!(draft.start.time(), NaiveTime::from_hms_opt(20, 50, 0).unwrap());
        assert_eq!(draft.end.time(), NaiveTime::from_hms_opt(22, 40, 0).unwrap());
    }

    #[test]
    fn test_free_slot_uses_default_duration_and_lead_in() {
        let draft = SlotResolver::default()
            .resolve(&input((15, 0), "嘉然直播"), &identities())
            .unwrap()
            .unwrap();
        assert_eq!(draft.start.time(), NaiveTime::from_hms_opt(14, 50, 0).unwrap());
        assert_eq!(draft.end.time(), NaiveTime::from_hms_opt(17, 50, 0).unwrap());
    }

    #[test]
    fn test_crowded_slot_shortens_duration() {
        let mut slot = input((15, 0), "嘉然直播");
        slot.crowded = true;
        let draft = SlotResolver::default()
            .resolve(&slot, &identities())
            .unwrap()
            .unwrap();
        assert_eq!(draft.end.time(), NaiveTime::from_hms_opt(15, 50, 0).unwrap());
    }

    #[test]
    fn test_other_label_is_soft_skip() {
        let mut slot = input((19, 30), "向晚直播");
        slot.label = SlotLabel::Other;
        let out = SlotResolver::default()
            .resolve(&slot, &identities())
            .unwrap();
        assert_eq!(out.unwrap_err(), SlotSkip::UnsupportedCategory);
    }

    #[test]
    fn test_member_attendees_plus_team() {
        let draft = SlotResolver::default()
            .resolve(&input((19, 30), "向晚直播"), &identities())
            .unwrap()
            .unwrap();
        assert_eq!(
            draft.attendees,
            vec![
                CalendarIdentity::User("ou_ava".to_string()),
                CalendarIdentity::Chat("oc_team".to_string()),
            ]
        );
        assert_ne!(draft.color, DEFAULT_EVENT_COLOR);
    }

    #[test]
    fn test_group_mask_invites_group_chat_only() {
        let draft = SlotResolver::default()
            .resolve(&input((19, 30), "夜谈"), &identities())
            .unwrap()
            .unwrap();
        assert_eq!(
            draft.attendees,
            vec![CalendarIdentity::Chat("oc_group".to_string())]
        );
        assert_eq!(draft.color, DEFAULT_EVENT_COLOR);
    }

    #[test]
    fn test_missing_identity_mapping_errors() {
        let table = IdentityTable::from_config(&CalendarConfig::default());
        let err = SlotResolver::default()
            .resolve(&input((19, 30), "向晚直播"), &table)
            .unwrap_err();
        assert!(err.to_string().contains("identity mapping"));
    }

    #[test]
    fn test_late_slot_spills_past_midnight() {
        let draft = SlotResolver::default()
            .resolve(&input((23, 0), "乃琳直播"), &identities())
            .unwrap()
            .unwrap();
        assert!(draft.start < draft.end);
        assert_eq!(draft.end.date(), draft.start.date() + Duration::days(1));
    }
}
