use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use tokio::{sync::RwLock, task::JoinHandle, time};
use tokio_util::sync::CancellationToken;

use crate::{
    delivery::{Notifier, ReminderMessageType},
    models::reminder::{Recurrence, Reminder, ReminderId},
    sms::SmsRequester,
    storage::ReminderStore,
};

use super::{
    Clock,
    target_delay::{ScheduleError, get_target_delay, next_occurrence},
};

const CANCEL_TIMEOUT: Duration = Duration::from_secs(5);
const WEEKLY_INTERVAL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

pub struct ScheduledTask {
    task_handle: JoinHandle<()>,
    cancellation_token: CancellationToken,
    generation: u64,
}

impl ScheduledTask {
    pub async fn cancel(self, timeout: Duration) {
        self.cancellation_token.cancel();
        let cancel_with_timeout = time::timeout(timeout, self.task_handle);
        let _ = cancel_with_timeout.await;
    }

    fn is_live(&self) -> bool {
        !self.task_handle.is_finished()
    }
}

type ScheduledTaskStore = RwLock<HashMap<ReminderId, ScheduledTask>>;

/// Everything a running reminder task needs when it fires.
struct FireContext {
    store: Arc<ReminderStore>,
    notifier: Arc<Notifier>,
    sms: SmsRequester,
    clock: Arc<dyn Clock>,
}

/// Keeps at most one armed task per reminder. A task sleeps until the
/// reminder's next fire time, notifies, and then either retires the reminder
/// or goes back to sleep according to its recurrence.
pub struct ReminderScheduler {
    tasks: Arc<ScheduledTaskStore>,
    context: Arc<FireContext>,
    shutdown: CancellationToken,
    next_generation: AtomicU64,
}

impl ReminderScheduler {
    pub fn new(
        store: Arc<ReminderStore>,
        notifier: Arc<Notifier>,
        sms: SmsRequester,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
            context: Arc::new(FireContext {
                store,
                notifier,
                sms,
                clock,
            }),
            shutdown: CancellationToken::new(),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Arms `reminder`, replacing any task already armed for its id. The old
    /// task is cancelled even when the reminder turns out to be unschedulable.
    pub async fn arm(&self, reminder: &Reminder) -> Result<Duration, ScheduleError> {
        self.cancel(reminder.id).await;

        let fire_at = reminder.fire_time()?;
        let delay = get_target_delay(fire_at.time(), self.context.clock.now())?
            .to_std()
            .map_err(|_| ScheduleError::OutOfRange)?;

        let mut tasks = self.tasks.write().await;
        let task = self.spawn_reminder_task(reminder.clone(), delay);
        if let Some(previous) = tasks.insert(reminder.id, task) {
            previous.cancellation_token.cancel();
        }

        Ok(delay)
    }

    /// Returns whether a task was armed for `id`.
    pub async fn cancel(&self, id: ReminderId) -> bool {
        let task = self.tasks.write().await.remove(&id);
        match task {
            Some(task) => {
                log::debug!("Cancelling reminder task. [reminder_id = {id}]");
                task.cancel(CANCEL_TIMEOUT).await;
                true
            }
            None => false,
        }
    }

    pub async fn cancel_all(&self) {
        let tasks: Vec<_> = self.tasks.write().await.drain().map(|(_, task)| task).collect();
        if !tasks.is_empty() {
            log::info!("Cancelling {} reminder tasks", tasks.len());
        }

        for task in tasks {
            task.cancel(CANCEL_TIMEOUT).await;
        }
    }

    /// Cancels every task and arms every reminder currently in the store.
    /// Unschedulable reminders are skipped. Returns how many were armed.
    pub async fn init_scheduling(&self) -> usize {
        self.cancel_all().await;

        let mut armed = 0;
        for reminder in self.context.store.list().await {
            match self.arm(&reminder).await {
                Ok(_) => armed += 1,
                Err(error) => log::warn!(
                    "Skipping unschedulable reminder. [reminder_id = {}, error = {}]",
                    reminder.id,
                    error
                ),
            }
        }

        armed
    }

    pub async fn is_armed(&self, id: ReminderId) -> bool {
        self.tasks
            .read()
            .await
            .get(&id)
            .is_some_and(ScheduledTask::is_live)
    }

    pub async fn armed_count(&self) -> usize {
        self.tasks
            .read()
            .await
            .values()
            .filter(|task| task.is_live())
            .count()
    }

    fn spawn_reminder_task(&self, reminder: Reminder, delay: Duration) -> ScheduledTask {
        let cancellation_token = self.shutdown.child_token();
        let task_cancellation_token = cancellation_token.clone();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let context = Arc::clone(&self.context);
        let tasks = Arc::clone(&self.tasks);
        let id = reminder.id;

        let task_handle = tokio::spawn(async move {
            run_reminder(reminder, delay, &context, task_cancellation_token).await;

            let mut tasks = tasks.write().await;
            if tasks.get(&id).is_some_and(|task| task.generation == generation) {
                tasks.remove(&id);
            }
        });

        ScheduledTask {
            task_handle,
            cancellation_token,
            generation,
        }
    }
}

impl Drop for ReminderScheduler {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn run_reminder(
    reminder: Reminder,
    first_delay: Duration,
    context: &FireContext,
    cancellation_token: CancellationToken,
) {
    let id = reminder.id;
    let mut delay = first_delay;

    loop {
        log::info!("[SCHEDULE] Sleeping for {:?} delay. ReminderId {}", delay, id);

        tokio::select! {
            biased;
            _ = cancellation_token.cancelled() => {
                log::debug!("Task for reminder was cancelled. [reminder_id = {id}]");
                return;
            }
            _ = time::sleep(delay) => {}
        }

        fire(&reminder, context).await;

        delay = match reminder.recurrence_policy() {
            Recurrence::Once => {
                context.store.remove(id).await;
                log::info!("[RETIRED] One-off reminder fired. ReminderId {}", id);
                return;
            }
            Recurrence::Daily => match next_daily_delay(&reminder, context) {
                Ok(delay) => delay,
                Err(error) => {
                    log::error!(
                        "Could not re-arm daily reminder. [reminder_id = {}, error = {}]",
                        id,
                        error
                    );
                    return;
                }
            },
            Recurrence::Weekly => WEEKLY_INTERVAL,
        };
    }
}

async fn fire(reminder: &Reminder, context: &FireContext) {
    log::info!(
        "[FIRE] Reminder is due. [reminder_id = {}, medicine = {}]",
        reminder.id,
        reminder.medicine_name
    );

    context
        .notifier
        .notify(reminder, ReminderMessageType::Fired)
        .await;

    if reminder.send_sms {
        match reminder
            .fire_time()
            .map_err(ScheduleError::from)
            .and_then(|fire_at| next_occurrence(fire_at.time(), context.clock.now()))
        {
            Ok(target) => {
                context.sms.request(reminder, target.to_utc());
            }
            Err(error) => log::warn!(
                "Could not compute SMS time. [reminder_id = {}, error = {}]",
                reminder.id,
                error
            ),
        }
    }
}

fn next_daily_delay(
    reminder: &Reminder,
    context: &FireContext,
) -> Result<Duration, ScheduleError> {
    let fire_at = reminder.fire_time()?;
    get_target_delay(fire_at.time(), context.clock.now())?
        .to_std()
        .map_err(|_| ScheduleError::OutOfRange)
}

#[cfg(test)]
mod tests;
