use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::models::{
    reminder::{Reminder, ReminderId},
    user::UserId,
};

use super::remote::{RemoteCollection, RemoteError};

#[derive(Debug)]
enum RemoteWrite {
    Set(Reminder),
    Delete(ReminderId),
    BatchSet(Vec<Reminder>),
    Flush(oneshot::Sender<()>),
}

/// Mirrors local mutations to the remote collection one at a time, in the
/// order they were made.
pub(super) struct RemoteWriter(mpsc::UnboundedSender<RemoteWrite>);

impl RemoteWriter {
    /// Spawns the writer task. It exits once the writer is dropped and the
    /// queue has drained.
    pub fn start(remote: Arc<dyn RemoteCollection>, user_id: UserId) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(remote, user_id, receiver));
        Self(sender)
    }

    pub fn set(&self, reminder: Reminder) {
        self.send(RemoteWrite::Set(reminder));
    }

    pub fn delete(&self, id: ReminderId) {
        self.send(RemoteWrite::Delete(id));
    }

    pub fn batch_set(&self, reminders: Vec<Reminder>) {
        self.send(RemoteWrite::BatchSet(reminders));
    }

    /// Resolves once every write queued before this call has been attempted.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        self.send(RemoteWrite::Flush(tx));
        let _ = rx.await;
    }

    fn send(&self, write: RemoteWrite) {
        if self.0.send(write).is_err() {
            log::error!("Remote writer is not running, dropping write");
        }
    }
}

async fn run_writer(
    remote: Arc<dyn RemoteCollection>,
    user_id: UserId,
    mut receiver: mpsc::UnboundedReceiver<RemoteWrite>,
) {
    while let Some(write) = receiver.recv().await {
        let (operation, result): (&str, Result<(), RemoteError>) = match write {
            RemoteWrite::Set(reminder) => ("set", remote.set_one(&user_id, &reminder).await),
            RemoteWrite::Delete(id) => ("delete", remote.delete_one(&user_id, id).await),
            RemoteWrite::BatchSet(reminders) => {
                ("batch set", remote.batch_set(&user_id, &reminders).await)
            }
            RemoteWrite::Flush(reply) => {
                let _ = reply.send(());
                continue;
            }
        };

        if let Err(error) = result {
            log::warn!(
                "Remote {} failed, keeping local copy. [user_id = {}, error = {}]",
                operation,
                user_id,
                error
            );
        }
    }

    log::debug!("Remote writer shutting down. [user_id = {}]", user_id);
}
