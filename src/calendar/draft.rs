//! Draft submission and attendee reconciliation
//!
//! The remote API has no "create as organizer without self-attendance", so
//! submission is a three-step dance: create the event, add the attendee list
//! plus the bot's own identity, then look the roster up and remove the bot.
//! If a post-create step fails, a compensating delete is attempted; only
//! when that also fails does the event stay leaked in the store.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::calendar::{CalendarEventDraft, CalendarIdentity, CalendarStore, IdentityTable};

/// Submission failure modes.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("event creation failed: {0}")]
    Create(String),

    /// Attendee reconciliation failed and the compensating delete worked:
    /// the store is clean again.
    #[error("attendee sync failed for '{summary}', event rolled back: {reason}")]
    RolledBack { summary: String, reason: String },

    /// Attendee reconciliation failed and so did the delete: the event is
    /// committed remotely with a wrong attendee list. No further retries.
    #[error("event {event_id} ('{summary}') left partially committed: {reason}")]
    PartialCommit {
        event_id: String,
        summary: String,
        reason: String,
    },
}

/// Assembles and submits drafts against a [`CalendarStore`].
pub struct EventDraftBuilder<'a> {
    store: &'a dyn CalendarStore,
    identities: &'a IdentityTable,
}

impl<'a> EventDraftBuilder<'a> {
    pub fn new(store: &'a dyn CalendarStore, identities: &'a IdentityTable) -> Self {
        Self { store, identities }
    }

    /// Submit a draft and reconcile its attendee list. Returns the committed
    /// event id.
    pub async fn submit(&self, draft: &CalendarEventDraft) -> Result<String, SubmitError> {
        let created = self
            .store
            .create_event(draft)
            .await
            .map_err(|e| SubmitError::Create(e.to_string()))?;
        info!("created event {} ('{}')", created.event_id, draft.summary);

        match self.reconcile_attendees(&created.event_id, draft).await {
            Ok(()) => Ok(created.event_id),
            Err(reason) => {
                warn!(
                    "attendee sync failed for event {}: {reason}; attempting rollback",
                    created.event_id
                );
                match self.store.delete_event(&created.event_id).await {
                    Ok(()) => Err(SubmitError::RolledBack {
                        summary: draft.summary.clone(),
                        reason,
                    }),
                    Err(delete_err) => Err(SubmitError::PartialCommit {
                        event_id: created.event_id,
                        summary: draft.summary.clone(),
                        reason: format!("{reason}; rollback also failed: {delete_err}"),
                    }),
                }
            }
        }
    }

    /// Add attendees plus the bot itself, then remove the bot once the
    /// roster confirms it.
    async fn reconcile_attendees(
        &self,
        event_id: &str,
        draft: &CalendarEventDraft,
    ) -> Result<(), String> {
        let mut to_add = draft.attendees.clone();
        to_add.push(CalendarIdentity::User(self.identities.bot_open_id.clone()));

        self.store
            .add_attendees(event_id, &to_add)
            .await
            .map_err(|e| format!("add attendees: {e}"))?;

        let roster = self
            .store
            .list_attendees(event_id)
            .await
            .map_err(|e| format!("list attendees: {e}"))?;

        let bot_row = roster
            .iter()
            .find(|a| a.user_id.as_deref() == Some(self.identities.bot_open_id.as_str()));
        match bot_row {
            Some(row) => {
                self.store
                    .remove_attendee(event_id, &row.attendee_id)
                    .await
                    .map_err(|e| format!("remove self: {e}"))?;
                debug!("removed bot identity from event {event_id}");
                Ok(())
            }
            None => {
                // Not present in the roster; nothing to remove.
                debug!("bot identity not found on event {event_id} roster");
                Ok(())
            }
        }
    }
}
