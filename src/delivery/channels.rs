use std::io::Write;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::models::reminder::Reminder;

use super::{
    NotificationError, NotificationWorkerHandle, ReminderDeliveryChannel, ReminderMessageType,
    SystemNotification,
};

/// `None` for messages that have no toast.
pub fn toast_text(reminder: &Reminder, message: ReminderMessageType) -> Option<String> {
    let text = match message {
        ReminderMessageType::Fired => format!("🔔 Time to take: {}", reminder.medicine_name),
        ReminderMessageType::SmsScheduled => "SMS scheduled (via server)".to_owned(),
        ReminderMessageType::SmsUnavailable => {
            "SMS scheduling not configured (server missing)".to_owned()
        }
        ReminderMessageType::Removed => return None,
    };
    Some(text)
}

/// In-app toast messages, handed to whatever display surface drains the
/// receiving end.
pub struct ToastChannel {
    display: mpsc::UnboundedSender<String>,
}

impl ToastChannel {
    pub fn create() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (display, receiver) = mpsc::unbounded_channel();
        (Self { display }, receiver)
    }
}

#[async_trait]
impl ReminderDeliveryChannel for ToastChannel {
    async fn send_reminder_notification(
        &self,
        reminder: &Reminder,
        message: ReminderMessageType,
    ) -> anyhow::Result<()> {
        let Some(text) = toast_text(reminder, message) else {
            return Ok(());
        };

        self.display
            .send(text)
            .map_err(|_| NotificationError::DisplayClosed)?;
        Ok(())
    }
}

/// Audible cue for fired reminders: the terminal bell.
pub struct SoundChannel {
    enabled: bool,
}

impl SoundChannel {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

#[async_trait]
impl ReminderDeliveryChannel for SoundChannel {
    async fn send_reminder_notification(
        &self,
        _reminder: &Reminder,
        message: ReminderMessageType,
    ) -> anyhow::Result<()> {
        if message != ReminderMessageType::Fired {
            return Ok(());
        }
        if !self.enabled {
            return Err(NotificationError::SoundDisabled.into());
        }

        let mut stderr = std::io::stderr().lock();
        stderr
            .write_all(b"\x07")
            .and_then(|_| stderr.flush())
            .map_err(NotificationError::from)?;
        Ok(())
    }
}

/// OS-level notifications, presented by the notification worker.
pub struct SystemNotificationChannel {
    permission_granted: bool,
    worker: NotificationWorkerHandle,
}

impl SystemNotificationChannel {
    pub fn new(permission_granted: bool, worker: NotificationWorkerHandle) -> Self {
        Self {
            permission_granted,
            worker,
        }
    }
}

#[async_trait]
impl ReminderDeliveryChannel for SystemNotificationChannel {
    async fn send_reminder_notification(
        &self,
        reminder: &Reminder,
        message: ReminderMessageType,
    ) -> anyhow::Result<()> {
        match message {
            ReminderMessageType::Fired if !self.permission_granted => {
                Err(NotificationError::PermissionDenied.into())
            }
            ReminderMessageType::Fired => {
                self.worker
                    .show(SystemNotification::for_reminder(reminder))?;
                Ok(())
            }
            ReminderMessageType::Removed => {
                self.worker.dismiss(reminder.id.to_string())?;
                Ok(())
            }
            ReminderMessageType::SmsScheduled | ReminderMessageType::SmsUnavailable => Ok(()),
        }
    }
}
