mod channels;
mod worker;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::reminder::Reminder;

pub use channels::{SoundChannel, SystemNotificationChannel, ToastChannel, toast_text};
pub use worker::{
    NOTIFICATION_TITLE, NotificationWorker, NotificationWorkerHandle, SystemNotification,
};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ReminderMessageType {
    Fired,
    SmsScheduled,
    SmsUnavailable,
    /// The reminder was deleted; anything still shown for it is stale.
    Removed,
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("notification permission not granted")]
    PermissionDenied,

    #[error("sound playback disabled")]
    SoundDisabled,

    #[error("notification worker is not running")]
    WorkerGone,

    #[error("toast display is closed")]
    DisplayClosed,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait ReminderDeliveryChannel: Send + Sync + 'static {
    async fn send_reminder_notification(
        &self,
        reminder: &Reminder,
        message: ReminderMessageType,
    ) -> anyhow::Result<()>;
}

/// Fans a message out to every delivery channel. A failing channel never
/// stops the others.
#[derive(Default)]
pub struct Notifier {
    channels: Vec<Arc<dyn ReminderDeliveryChannel>>,
}

impl Notifier {
    pub fn new(channels: Vec<Arc<dyn ReminderDeliveryChannel>>) -> Self {
        Self { channels }
    }

    pub async fn notify(&self, reminder: &Reminder, message: ReminderMessageType) {
        for channel in &self.channels {
            if let Err(error) = channel.send_reminder_notification(reminder, message).await {
                log::debug!(
                    "Notification effect failed. [reminder_id = {}, message = {:?}, error = {}]",
                    reminder.id,
                    message,
                    error
                );
            }
        }
    }
}
