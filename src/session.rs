use std::{collections::HashSet, sync::Arc};

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::{
    delivery::{Notifier, ReminderMessageType},
    models::{
        reminder::{NewReminder, Reminder, ReminderId, ReminderUpdate, ValidationError},
        user::User,
    },
    scheduling::{Clock, ReminderScheduler, ScheduleError, next_occurrence},
    sms::{SmsError, SmsRequester},
    storage::{ReminderStore, local_cache::LocalCache, remote::RemoteCollection},
};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("import file is not valid JSON: {0}")]
    Json(#[source] serde_json::Error),

    #[error("import file must contain a JSON array of reminders")]
    NotAnArray,

    #[error("entry {index} is not a reminder object")]
    NotAnObject { index: usize },

    #[error("entry {index} is not a valid reminder: {source}")]
    InvalidReminder {
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("reminder id {0} appears more than once")]
    DuplicateId(ReminderId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub file_name: String,
    pub contents: String,
}

/// Process-wide collaborators a session is built from.
pub struct SessionDependencies {
    pub local_cache: Arc<dyn LocalCache>,
    pub remote: Option<Arc<dyn RemoteCollection>>,
    pub clock: Arc<dyn Clock>,
    pub notifier: Arc<Notifier>,
    pub sms: SmsRequester,
}

/// Everything that belongs to one signed-in user: the reminder list and the
/// tasks armed for it. Built on sign-in and consumed on sign-out.
pub struct Session {
    user: User,
    store: Arc<ReminderStore>,
    scheduler: ReminderScheduler,
    notifier: Arc<Notifier>,
    sms: SmsRequester,
    clock: Arc<dyn Clock>,
}

impl Session {
    pub async fn sign_in(user: User, dependencies: SessionDependencies) -> Self {
        let SessionDependencies {
            local_cache,
            remote,
            clock,
            notifier,
            sms,
        } = dependencies;

        let store = Arc::new(ReminderStore::new(
            user.id.clone(),
            local_cache,
            remote,
            Arc::clone(&clock),
        ));
        store.load().await;

        let scheduler = ReminderScheduler::new(
            Arc::clone(&store),
            Arc::clone(&notifier),
            sms.clone(),
            Arc::clone(&clock),
        );
        let armed = scheduler.init_scheduling().await;

        log::info!(
            "Signed in. [user_id = {}, kind = {:?}, armed = {}]",
            user.id,
            user.kind,
            armed
        );

        Self {
            user,
            store,
            scheduler,
            notifier,
            sms,
            clock,
        }
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn scheduler(&self) -> &ReminderScheduler {
        &self.scheduler
    }

    /// Reminders in store order, oldest first.
    pub async fn reminders(&self) -> Vec<Reminder> {
        self.store.list().await
    }

    pub async fn reminders_newest_first(&self) -> Vec<Reminder> {
        let mut reminders = self.store.list().await;
        reminders.reverse();
        reminders
    }

    pub async fn add_reminder(
        &self,
        new_reminder: NewReminder,
    ) -> Result<Reminder, ValidationError> {
        let reminder = self.store.add(new_reminder).await?;
        self.arm(&reminder).await;

        if reminder.send_sms {
            match self.sms_target(&reminder) {
                Ok(target) => {
                    self.sms.request(&reminder, target);
                }
                Err(error) => log::warn!(
                    "Could not compute SMS time. [reminder_id = {}, error = {}]",
                    reminder.id,
                    error
                ),
            }
        }

        Ok(reminder)
    }

    /// Returns `None` when no reminder has the given id.
    pub async fn edit_reminder(&self, id: ReminderId, update: ReminderUpdate) -> Option<Reminder> {
        let updated = self.store.update(id, update).await?;
        self.arm(&updated).await;
        Some(updated)
    }

    pub async fn delete_reminder(&self, id: ReminderId) -> Option<Reminder> {
        self.scheduler.cancel(id).await;
        let removed = self.store.remove(id).await?;
        self.notifier
            .notify(&removed, ReminderMessageType::Removed)
            .await;
        Some(removed)
    }

    pub async fn export(&self) -> Result<ExportFile, serde_json::Error> {
        let reminders = self.store.list().await;
        Ok(ExportFile {
            file_name: format!("{}-meditrack-reminders.json", self.user.id),
            contents: serde_json::to_string_pretty(&reminders)?,
        })
    }

    /// Replaces the whole list with the reminders in `contents` and re-arms
    /// everything. Nothing changes unless every entry is acceptable.
    pub async fn import(&self, contents: &str) -> Result<usize, ImportError> {
        let reminders = parse_import(contents)?;
        let count = reminders.len();

        self.store.replace_all(reminders).await;
        let armed = self.scheduler.init_scheduling().await;

        log::info!(
            "Imported reminders. [user_id = {}, count = {}, armed = {}]",
            self.user.id,
            count,
            armed
        );

        Ok(count)
    }

    pub async fn send_sms_now(&self, phone: &str, message: &str) -> Result<(), SmsError> {
        self.sms.send_now(phone.trim(), message).await
    }

    pub async fn sign_out(self) {
        self.scheduler.cancel_all().await;
        self.store.flush().await;
        log::info!("Signed out. [user_id = {}]", self.user.id);
    }

    async fn arm(&self, reminder: &Reminder) {
        if let Err(error) = self.scheduler.arm(reminder).await {
            log::warn!(
                "Reminder saved but not scheduled. [reminder_id = {}, error = {}]",
                reminder.id,
                error
            );
        }
    }

    fn sms_target(&self, reminder: &Reminder) -> Result<DateTime<Utc>, ScheduleError> {
        let fire_at = reminder.fire_time()?;
        Ok(next_occurrence(fire_at.time(), self.clock.now())?.to_utc())
    }
}

fn parse_import(contents: &str) -> Result<Vec<Reminder>, ImportError> {
    let value: Value = serde_json::from_str(contents).map_err(ImportError::Json)?;
    let Value::Array(entries) = value else {
        return Err(ImportError::NotAnArray);
    };

    let mut seen = HashSet::with_capacity(entries.len());
    let mut reminders = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        if !entry.is_object() {
            return Err(ImportError::NotAnObject { index });
        }

        let reminder: Reminder = serde_json::from_value(entry)
            .map_err(|source| ImportError::InvalidReminder { index, source })?;
        if !seen.insert(reminder.id) {
            return Err(ImportError::DuplicateId(reminder.id));
        }
        reminders.push(reminder);
    }

    Ok(reminders)
}
