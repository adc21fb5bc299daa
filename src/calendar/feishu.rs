//! Feishu open-platform calendar client
//!
//! Implements [`CalendarStore`] over the calendar v4 HTTP API with tenant
//! access token exchange. Schedule-local times are converted to epoch
//! seconds using the configured UTC offset at this boundary and nowhere
//! else.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::calendar::{Attendee, CalendarEvent, CalendarEventDraft, CalendarIdentity, CalendarStore};
use crate::config::CalendarConfig;

/// Refresh slack: a token within this many seconds of expiry is renewed.
const TOKEN_SLACK_SECS: i64 = 100;

struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Calendar v4 client.
pub struct FeishuCalendar {
    http: reqwest::Client,
    base_url: String,
    app_id: String,
    app_secret: String,
    calendar_id: String,
    offset: FixedOffset,
    token: Mutex<Option<CachedToken>>,
}

impl FeishuCalendar {
    pub fn new(config: &CalendarConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;
        let offset = FixedOffset::east_opt(config.utc_offset_hours * 3600)
            .context("Invalid UTC offset")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            app_id: config.app_id.clone(),
            app_secret: config.app_secret.clone(),
            calendar_id: config.calendar_id.clone(),
            offset,
            token: Mutex::new(None),
        })
    }

    fn events_url(&self) -> String {
        format!(
            "{}/calendar/v4/calendars/{}/events",
            self.base_url, self.calendar_id
        )
    }

    /// Schedule-local time to epoch seconds, as a decimal string per the
    /// wire format.
    fn to_timestamp(&self, t: NaiveDateTime) -> String {
        let local = t.and_local_timezone(self.offset).unwrap();
        local.timestamp().to_string()
    }

    fn from_timestamp(&self, ts: &str) -> Result<NaiveDateTime> {
        let secs: i64 = ts.parse().with_context(|| format!("bad timestamp '{ts}'"))?;
        let utc = DateTime::<Utc>::from_timestamp(secs, 0)
            .with_context(|| format!("timestamp '{ts}' out of range"))?;
        Ok(utc.with_timezone(&self.offset).naive_local())
    }

    /// Current tenant access token, refreshed on demand.
    async fn access_token(&self) -> Result<String> {
        let mut guard = self.token.lock().await;
        if let Some(cached) = guard.as_ref() {
            if cached.expires_at - Utc::now() > Duration::seconds(TOKEN_SLACK_SECS) {
                return Ok(cached.token.clone());
            }
        }

        debug!("refreshing tenant access token");
        let resp: TokenResponse = self
            .http
            .post(format!(
                "{}/auth/v3/tenant_access_token/internal",
                self.base_url
            ))
            .json(&json!({
                "app_id": self.app_id,
                "app_secret": self.app_secret,
            }))
            .send()
            .await
            .context("token request failed")?
            .json()
            .await
            .context("token response malformed")?;
        if resp.code != 0 {
            bail!("token exchange rejected ({}): {}", resp.code, resp.msg);
        }

        let token = resp.tenant_access_token;
        *guard = Some(CachedToken {
            token: token.clone(),
            expires_at: Utc::now() + Duration::seconds(resp.expire),
        });
        Ok(token)
    }

    /// POST a JSON body and decode the enveloped response.
    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        body: serde_json::Value,
    ) -> Result<T> {
        let token = self.access_token().await?;
        let resp = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("POST {url} failed"))?;
        decode_envelope(resp).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let token = self.access_token().await?;
        let resp = self
            .http
            .get(url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?;
        decode_envelope(resp).await
    }
}

/// Decode the `{code, msg, data}` envelope every endpoint shares; a nonzero
/// code is a remote-side rejection.
async fn decode_envelope<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    let envelope: Envelope<T> = resp
        .json()
        .await
        .with_context(|| format!("undecodable response (HTTP {status})"))?;
    if envelope.code != 0 {
        bail!("calendar API error ({}): {}", envelope.code, envelope.msg);
    }
    envelope.data.context("calendar API returned no data")
}

#[async_trait]
impl CalendarStore for FeishuCalendar {
    async fn list_events(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<CalendarEvent>> {
        let data: EventListData = self
            .get_json(
                &format!("{}/", self.events_url()),
                &[
                    ("start_time", self.to_timestamp(start)),
                    ("end_time", self.to_timestamp(end)),
                ],
            )
            .await?;

        // Cancelled events stay listed remotely; they must not count
        // against new drafts.
        data.items
            .into_iter()
            .filter(|item| item.status.as_deref() != Some("cancelled"))
            .map(|item| {
                Ok(CalendarEvent {
                    start: self.from_timestamp(&item.start_time.timestamp)?,
                    end: self.from_timestamp(&item.end_time.timestamp)?,
                    event_id: item.event_id,
                    summary: item.summary,
                })
            })
            .collect()
    }

    async fn create_event(&self, draft: &CalendarEventDraft) -> Result<CalendarEvent> {
        let reminders: Vec<_> = draft
            .reminder_minutes
            .iter()
            .map(|m| json!({ "minutes": m }))
            .collect();
        let body = json!({
            "summary": draft.summary,
            "description": draft.description,
            "start_time": { "timestamp": self.to_timestamp(draft.start) },
            "end_time": { "timestamp": self.to_timestamp(draft.end) },
            "visibility": "public",
            "attendee_ability": "can_modify_event",
            "color": draft.color,
            "reminders": reminders,
        });

        let data: EventData = self.post_json(&format!("{}/", self.events_url()), body).await?;
        info!("calendar event {} created", data.event.event_id);
        Ok(CalendarEvent {
            start: self.from_timestamp(&data.event.start_time.timestamp)?,
            end: self.from_timestamp(&data.event.end_time.timestamp)?,
            event_id: data.event.event_id,
            summary: data.event.summary,
        })
    }

    async fn delete_event(&self, event_id: &str) -> Result<()> {
        let token = self.access_token().await?;
        let url = format!("{}/{}", self.events_url(), event_id);
        let resp = self
            .http
            .delete(&url)
            .bearer_auth(token)
            .query(&[("need_notification", "false")])
            .send()
            .await
            .with_context(|| format!("DELETE {url} failed"))?;
        let envelope: Envelope<serde_json::Value> =
            resp.json().await.context("undecodable delete response")?;
        if envelope.code != 0 {
            bail!("event delete rejected ({}): {}", envelope.code, envelope.msg);
        }
        Ok(())
    }

    async fn add_attendees(&self, event_id: &str, ids: &[CalendarIdentity]) -> Result<()> {
        let attendees: Vec<_> = ids
            .iter()
            .map(|id| match id {
                CalendarIdentity::User(open_id) => json!({ "type": "user", "user_id": open_id }),
                CalendarIdentity::Chat(chat_id) => json!({ "type": "chat", "chat_id": chat_id }),
            })
            .collect();
        let body = json!({ "attendees": attendees, "need_notification": false });
        let _: serde_json::Value = self
            .post_json(&format!("{}/{}/attendees", self.events_url(), event_id), body)
            .await?;
        Ok(())
    }

    async fn list_attendees(&self, event_id: &str) -> Result<Vec<Attendee>> {
        let data: AttendeesData = self
            .get_json(
                &format!("{}/{}/attendees", self.events_url(), event_id),
                &[],
            )
            .await?;
        Ok(data
            .items
            .into_iter()
            .map(|item| Attendee {
                attendee_id: item.attendee_id,
                user_id: item.user_id,
                chat_id: item.chat_id,
            })
            .collect())
    }

    async fn remove_attendee(&self, event_id: &str, attendee_id: &str) -> Result<()> {
        let body = json!({
            "attendee_ids": [attendee_id],
            "need_notification": false,
        });
        let _: serde_json::Value = self
            .post_json(
                &format!("{}/{}/attendees/batch_delete", self.events_url(), event_id),
                body,
            )
            .await?;
        Ok(())
    }
}

// Wire types.

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i32,
    #[serde(default)]
    msg: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    code: i32,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    tenant_access_token: String,
    #[serde(default)]
    expire: i64,
}

#[derive(Debug, Deserialize)]
struct EventTime {
    timestamp: String,
}

#[derive(Debug, Deserialize)]
struct WireEvent {
    event_id: String,
    summary: Option<String>,
    start_time: EventTime,
    end_time: EventTime,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventData {
    event: WireEvent,
}

#[derive(Debug, Deserialize)]
struct EventListData {
    #[serde(default)]
    items: Vec<WireEvent>,
}

#[derive(Debug, Deserialize)]
struct WireAttendee {
    attendee_id: String,
    user_id: Option<String>,
    chat_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AttendeesData {
    #[serde(default)]
    items: Vec<WireAttendee>,
}
