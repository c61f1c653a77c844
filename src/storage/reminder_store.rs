use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{
    models::{
        reminder::{NewReminder, Reminder, ReminderId, ReminderUpdate, ValidationError},
        user::UserId,
    },
    scheduling::Clock,
};

use super::{local_cache::LocalCache, remote::RemoteCollection, remote_writer::RemoteWriter};

/// The signed-in user's reminder list.
///
/// Every mutation is written to the local cache before returning and then
/// mirrored to the remote collection, if one is configured, in the background
/// and in mutation order. Remote failures are logged and never undo a local change. On load the
/// remote copy wins whenever it can be read.
pub struct ReminderStore {
    user_id: UserId,
    reminders: RwLock<Vec<Reminder>>,
    local: Arc<dyn LocalCache>,
    remote: Option<Arc<dyn RemoteCollection>>,
    clock: Arc<dyn Clock>,
    remote_writer: Option<RemoteWriter>,
}

impl ReminderStore {
    pub fn new(
        user_id: impl Into<UserId>,
        local: Arc<dyn LocalCache>,
        remote: Option<Arc<dyn RemoteCollection>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let user_id = user_id.into();
        let remote_writer = remote
            .clone()
            .map(|remote| RemoteWriter::start(remote, user_id.clone()));

        Self {
            user_id,
            reminders: RwLock::new(Vec::new()),
            local,
            remote,
            clock,
            remote_writer,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub async fn load(&self) -> Vec<Reminder> {
        let loaded = match self.load_remote().await {
            Some(remote_reminders) => {
                self.persist_local(&remote_reminders);
                remote_reminders
            }
            None => self.load_local(),
        };

        log::info!(
            "Loaded reminders. [user_id = {}, count = {}]",
            self.user_id,
            loaded.len()
        );

        *self.reminders.write().await = loaded.clone();
        loaded
    }

    pub async fn add(&self, new_reminder: NewReminder) -> Result<Reminder, ValidationError> {
        new_reminder.validate()?;

        let mut reminders = self.reminders.write().await;
        let id = next_id(&reminders, self.clock.now().timestamp_millis())
            .ok_or(ValidationError::IdsExhausted)?;
        let reminder = new_reminder.into_reminder(id);
        reminders.push(reminder.clone());
        self.persist_local(&reminders);
        drop(reminders);

        log::info!(
            "Added reminder. [user_id = {}, reminder_id = {}]",
            self.user_id,
            id
        );

        if let Some(writer) = &self.remote_writer {
            writer.set(reminder.clone());
        }

        Ok(reminder)
    }

    /// Returns `None` when no reminder has the given id.
    pub async fn update(&self, id: ReminderId, update: ReminderUpdate) -> Option<Reminder> {
        let mut reminders = self.reminders.write().await;
        let reminder = reminders.iter_mut().find(|r| r.id == id)?;
        update.apply_to(reminder);
        let updated = reminder.clone();
        self.persist_local(&reminders);
        drop(reminders);

        log::info!(
            "Updated reminder. [user_id = {}, reminder_id = {}]",
            self.user_id,
            id
        );

        if let Some(writer) = &self.remote_writer {
            writer.set(updated.clone());
        }

        Some(updated)
    }

    pub async fn remove(&self, id: ReminderId) -> Option<Reminder> {
        let mut reminders = self.reminders.write().await;
        let position = reminders.iter().position(|r| r.id == id);
        let removed = position.map(|index| reminders.remove(index));
        self.persist_local(&reminders);
        drop(reminders);

        log::info!(
            "Removed reminder. [user_id = {}, reminder_id = {}, existed = {}]",
            self.user_id,
            id,
            removed.is_some()
        );

        if let Some(writer) = &self.remote_writer {
            writer.delete(id);
        }

        removed
    }

    pub async fn replace_all(&self, new_reminders: Vec<Reminder>) {
        let mut reminders = self.reminders.write().await;
        *reminders = new_reminders;
        self.persist_local(&reminders);
        let stored = reminders.clone();
        drop(reminders);

        log::info!(
            "Replaced reminder list. [user_id = {}, count = {}]",
            self.user_id,
            stored.len()
        );

        if let Some(writer) = &self.remote_writer {
            writer.batch_set(stored);
        }
    }

    pub async fn list(&self) -> Vec<Reminder> {
        self.reminders.read().await.clone()
    }

    pub async fn get(&self, id: ReminderId) -> Option<Reminder> {
        self.reminders
            .read()
            .await
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }

    /// Waits until every background remote write issued so far has finished.
    pub async fn flush(&self) {
        if let Some(writer) = &self.remote_writer {
            writer.flush().await;
        }
    }

    async fn load_remote(&self) -> Option<Vec<Reminder>> {
        let remote = self.remote.as_ref()?;
        match remote.get_all(&self.user_id).await {
            Ok(reminders) => Some(reminders),
            Err(error) => {
                log::warn!(
                    "Could not load remote reminders, using local cache. \
                     [user_id = {}, error = {}]",
                    self.user_id,
                    error
                );
                None
            }
        }
    }

    fn load_local(&self) -> Vec<Reminder> {
        self.local.read(&self.user_id).unwrap_or_else(|error| {
            log::error!(
                "Could not read local reminder cache. [user_id = {}, error = {}]",
                self.user_id,
                error
            );
            Vec::new()
        })
    }

    fn persist_local(&self, reminders: &[Reminder]) {
        if let Err(error) = self.local.write(&self.user_id, reminders) {
            log::error!(
                "Could not write local reminder cache. [user_id = {}, error = {}]",
                self.user_id,
                error
            );
        }
    }
}

/// Ids come from the creation timestamp, bumped past existing ids so they
/// stay unique even for reminders created within the same millisecond.
/// `None` once the largest existing id is `ReminderId::MAX`.
fn next_id(existing: &[Reminder], now_millis: i64) -> Option<ReminderId> {
    match existing.iter().map(|r| r.id).max() {
        Some(max) => Some(now_millis.max(max.checked_add(1)?)),
        None => Some(now_millis),
    }
}
