//! Calendar store layer
//!
//! The [`CalendarStore`] trait is the only surface the pipeline talks to;
//! [`feishu::FeishuCalendar`] is the production implementation and tests use
//! in-process fakes. Times cross this boundary as naive schedule-local
//! values; implementations own the conversion to their wire format.

pub mod conflict;
pub mod draft;
pub mod feishu;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;

use crate::config::CalendarConfig;
use crate::schedule::members::Member;

pub use conflict::ConflictChecker;
pub use draft::{EventDraftBuilder, SubmitError};
pub use feishu::FeishuCalendar;

/// External identity reference, either a user or a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarIdentity {
    User(String),
    Chat(String),
}

/// A calendar-event draft ready for submission.
///
/// Invariant: `start < end`. Submitted exactly once; the persisted
/// counterpart lives only in the external store.
#[derive(Debug, Clone)]
pub struct CalendarEventDraft {
    pub summary: String,
    pub description: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub color: i32,
    pub attendees: Vec<CalendarIdentity>,
    pub reminder_minutes: Vec<i32>,
}

/// An event that already exists in the external store.
#[derive(Debug, Clone)]
pub struct CalendarEvent {
    pub event_id: String,
    pub summary: Option<String>,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// One attendee row of a stored event.
#[derive(Debug, Clone)]
pub struct Attendee {
    /// Store-assigned row id, the handle removal needs.
    pub attendee_id: String,
    /// Open id for user attendees.
    pub user_id: Option<String>,
    /// Chat id for chat attendees.
    pub chat_id: Option<String>,
}

/// Remote calendar store contract.
///
/// Implementations must filter out cancelled events from `list_events`.
#[async_trait]
pub trait CalendarStore: Send + Sync {
    async fn list_events(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<CalendarEvent>>;

    async fn create_event(&self, draft: &CalendarEventDraft) -> Result<CalendarEvent>;

    async fn delete_event(&self, event_id: &str) -> Result<()>;

    async fn add_attendees(&self, event_id: &str, ids: &[CalendarIdentity]) -> Result<()>;

    async fn list_attendees(&self, event_id: &str) -> Result<Vec<Attendee>>;

    async fn remove_attendee(&self, event_id: &str, attendee_id: &str) -> Result<()>;
}

/// Fixed mapping from symbolic member/group names to external calendar
/// identities, supplied by configuration.
#[derive(Debug, Clone)]
pub struct IdentityTable {
    members: BTreeMap<&'static str, String>,
    pub team_chat_id: String,
    pub group_chat_id: String,
    pub bot_open_id: String,
}

impl IdentityTable {
    pub fn from_config(config: &CalendarConfig) -> Self {
        let members = Member::ALL
            .into_iter()
            .filter_map(|m| {
                config
                    .member_open_ids
                    .get(m.key())
                    .map(|id| (m.key(), id.clone()))
            })
            .collect();
        Self {
            members,
            team_chat_id: config.team_chat_id.clone(),
            group_chat_id: config.group_chat_id.clone(),
            bot_open_id: config.bot_open_id.clone(),
        }
    }

    pub fn member_open_id(&self, member: Member) -> Option<&str> {
        self.members.get(member.key()).map(String::as_str)
    }
}
