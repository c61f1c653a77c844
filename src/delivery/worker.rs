use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

use crate::models::reminder::Reminder;

use super::NotificationError;

pub const NOTIFICATION_TITLE: &str = "💊 Medicine Reminder";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemNotification {
    pub title: String,
    pub body: String,
    /// Notifications sharing a tag replace each other instead of stacking.
    pub tag: String,
}

impl SystemNotification {
    pub fn for_reminder(reminder: &Reminder) -> Self {
        Self {
            title: NOTIFICATION_TITLE.to_owned(),
            body: reminder.medicine_name.clone(),
            tag: reminder.id.to_string(),
        }
    }
}

#[derive(Debug)]
enum WorkerMessage {
    Show(SystemNotification),
    Dismiss(String),
    Displayed(oneshot::Sender<Vec<SystemNotification>>),
}

#[derive(Clone)]
pub struct NotificationWorkerHandle(mpsc::UnboundedSender<WorkerMessage>);

impl NotificationWorkerHandle {
    pub fn show(&self, notification: SystemNotification) -> Result<(), NotificationError> {
        self.send(WorkerMessage::Show(notification))
    }

    pub fn dismiss(&self, tag: impl Into<String>) -> Result<(), NotificationError> {
        self.send(WorkerMessage::Dismiss(tag.into()))
    }

    pub async fn displayed(&self) -> Result<Vec<SystemNotification>, NotificationError> {
        let (tx, rx) = oneshot::channel();
        self.send(WorkerMessage::Displayed(tx))?;
        rx.await.map_err(|_| NotificationError::WorkerGone)
    }

    fn send(&self, message: WorkerMessage) -> Result<(), NotificationError> {
        self.0
            .send(message)
            .map_err(|_| NotificationError::WorkerGone)
    }
}

/// Background task presenting OS-level notifications, detached from the
/// session that requests them.
pub struct NotificationWorker {
    task: JoinHandle<()>,
    handle: NotificationWorkerHandle,
}

impl NotificationWorker {
    pub fn start() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_worker(receiver));

        Self {
            task,
            handle: NotificationWorkerHandle(sender),
        }
    }

    pub fn handle(&self) -> NotificationWorkerHandle {
        self.handle.clone()
    }

    pub fn shutdown(self) {
        self.task.abort();
    }
}

async fn run_worker(mut receiver: mpsc::UnboundedReceiver<WorkerMessage>) {
    let mut displayed: Vec<SystemNotification> = Vec::new();

    while let Some(message) = receiver.recv().await {
        match message {
            WorkerMessage::Show(notification) => {
                log::info!(
                    "[NOTIFICATION] {}: {} [tag = {}]",
                    notification.title,
                    notification.body,
                    notification.tag
                );
                match displayed.iter_mut().find(|n| n.tag == notification.tag) {
                    Some(existing) => *existing = notification,
                    None => displayed.push(notification),
                }
            }
            WorkerMessage::Dismiss(tag) => displayed.retain(|n| n.tag != tag),
            WorkerMessage::Displayed(reply) => {
                let _ = reply.send(displayed.clone());
            }
        }
    }

    log::info!("Notification worker shutting down");
}
