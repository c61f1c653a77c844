use std::{sync::Arc, time::Duration};

use chrono::{DateTime, NaiveTime};
use chrono_tz::Tz;
use proptest::prelude::*;
use test_strategy::proptest;

use crate::{
    delivery::{Notifier, ReminderDeliveryChannel, ReminderMessageType},
    models::reminder::{FireTimeError, Recurrence, Reminder},
    sms::SmsRequester,
    storage::{ReminderStore, local_cache::InMemoryLocalCache},
    test_utils::{FailingChannel, PausedClock, RecordingChannel, at, new_reminder, reminder},
};

use super::*;

const HOUR: Duration = Duration::from_secs(60 * 60);
const DAY: Duration = Duration::from_secs(24 * 60 * 60);
const MARGIN: Duration = Duration::from_secs(1);

struct TestContext {
    store: Arc<ReminderStore>,
    scheduler: ReminderScheduler,
    recording: RecordingChannel,
}

impl TestContext {
    fn starting_at(now: DateTime<Tz>) -> Self {
        Self::with_channels(now, vec![])
    }

    /// `extra` channels are notified before the recording one.
    fn with_channels(now: DateTime<Tz>, extra: Vec<Arc<dyn ReminderDeliveryChannel>>) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(PausedClock::new(now));
        let recording = RecordingChannel::default();
        let mut channels = extra;
        channels.push(Arc::new(recording.clone()));
        let notifier = Arc::new(Notifier::new(channels));
        let store = Arc::new(ReminderStore::new(
            "alice",
            Arc::new(InMemoryLocalCache::new()),
            None,
            Arc::clone(&clock),
        ));
        let sms = SmsRequester::new(None, Arc::clone(&notifier));
        let scheduler = ReminderScheduler::new(Arc::clone(&store), notifier, sms, clock);

        Self {
            store,
            scheduler,
            recording,
        }
    }

    async fn add(&self, medicine: &str, time: &str, recurrence: Recurrence) -> Reminder {
        self.store
            .add(new_reminder(medicine, time, recurrence))
            .await
            .unwrap()
    }
}

fn saturday_morning() -> DateTime<Tz> {
    at(chrono_tz::UTC, 2025, 5, 31, 9, 0)
}

fn time_strategy() -> impl Strategy<Value = NaiveTime> {
    (0u32..24, 0u32..60).prop_map(|(h, m)| NaiveTime::from_hms_opt(h, m, 0).unwrap())
}

fn tokio_ct(
    future: impl std::future::Future<Output = Result<(), TestCaseError>>,
) -> Result<(), TestCaseError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .unwrap()
        .block_on(future)
}

#[proptest(async = tokio_ct)]
async fn one_off_proptest(#[strategy(time_strategy())] time: NaiveTime) {
    let ctx = TestContext::starting_at(saturday_morning());
    let reminder = ctx
        .add("Aspirin", &time.format("%H:%M").to_string(), Recurrence::Once)
        .await;

    let delay = ctx.scheduler.arm(&reminder).await.unwrap();
    prop_assert!(delay > Duration::ZERO && delay <= DAY, "delay = {:?}", delay);

    tokio::time::sleep(delay + MARGIN).await;

    prop_assert_eq!(
        ctx.recording.messages(),
        vec![(reminder.id, ReminderMessageType::Fired)]
    );
    prop_assert!(ctx.store.get(reminder.id).await.is_none());
}

#[proptest(async = tokio_ct)]
async fn cancelling_proptest(#[strategy(time_strategy())] time: NaiveTime) {
    let ctx = TestContext::starting_at(saturday_morning());
    let reminder = ctx
        .add("Aspirin", &time.format("%H:%M").to_string(), Recurrence::Daily)
        .await;
    let delay = ctx.scheduler.arm(&reminder).await.unwrap();

    ctx.scheduler.cancel(reminder.id).await;
    tokio::time::sleep(delay + DAY).await;

    prop_assert!(ctx.recording.messages().is_empty());
    prop_assert!(ctx.store.get(reminder.id).await.is_some());
}

#[tokio::test(start_paused = true)]
async fn arm_returns_delay_until_next_occurrence() {
    let ctx = TestContext::starting_at(saturday_morning());
    let aspirin = ctx.add("Aspirin", "08:00", Recurrence::Daily).await;

    let delay = ctx.scheduler.arm(&aspirin).await.unwrap();

    assert_eq!(delay, 23 * HOUR);
    assert!(ctx.scheduler.is_armed(aspirin.id).await);
}

#[tokio::test(start_paused = true)]
async fn one_off_reminder_fires_once_and_is_retired() {
    let ctx = TestContext::starting_at(saturday_morning());
    let aspirin = ctx.add("Aspirin", "08:00", Recurrence::Once).await;
    ctx.scheduler.arm(&aspirin).await.unwrap();

    tokio::time::sleep(23 * HOUR - MARGIN).await;
    assert!(ctx.recording.messages().is_empty());

    tokio::time::sleep(2 * MARGIN).await;
    assert_eq!(
        ctx.recording.messages(),
        vec![(aspirin.id, ReminderMessageType::Fired)]
    );
    assert!(ctx.store.get(aspirin.id).await.is_none());
    assert!(!ctx.scheduler.is_armed(aspirin.id).await);

    tokio::time::sleep(3 * DAY).await;
    assert_eq!(ctx.recording.count(ReminderMessageType::Fired), 1);
}

#[tokio::test(start_paused = true)]
async fn cancelled_reminder_never_fires() {
    let ctx = TestContext::starting_at(saturday_morning());
    let aspirin = ctx.add("Aspirin", "10:00", Recurrence::Daily).await;
    ctx.scheduler.arm(&aspirin).await.unwrap();

    assert!(ctx.scheduler.cancel(aspirin.id).await);
    tokio::time::sleep(2 * DAY).await;

    assert!(ctx.recording.messages().is_empty());
    assert!(!ctx.scheduler.cancel(aspirin.id).await);
}

#[tokio::test(start_paused = true)]
async fn rearming_replaces_previous_task() {
    let ctx = TestContext::starting_at(saturday_morning());
    let mut aspirin = ctx.add("Aspirin", "10:00", Recurrence::Once).await;
    ctx.scheduler.arm(&aspirin).await.unwrap();

    aspirin.time = Some("11:00".to_owned());
    let delay = ctx.scheduler.arm(&aspirin).await.unwrap();
    assert_eq!(delay, 2 * HOUR);
    assert_eq!(ctx.scheduler.armed_count().await, 1);

    tokio::time::sleep(HOUR + MARGIN).await;
    assert!(ctx.recording.messages().is_empty());

    tokio::time::sleep(HOUR).await;
    assert_eq!(ctx.recording.count(ReminderMessageType::Fired), 1);
}

#[tokio::test(start_paused = true)]
async fn rearming_with_invalid_time_still_cancels() {
    let ctx = TestContext::starting_at(saturday_morning());
    let mut aspirin = ctx.add("Aspirin", "10:00", Recurrence::Daily).await;
    ctx.scheduler.arm(&aspirin).await.unwrap();

    aspirin.time = Some("25:99".to_owned());
    let result = ctx.scheduler.arm(&aspirin).await;

    assert!(matches!(
        result,
        Err(ScheduleError::InvalidTime(FireTimeError::Malformed(_)))
    ));
    tokio::time::sleep(2 * DAY).await;
    assert!(ctx.recording.messages().is_empty());
}

#[tokio::test(start_paused = true)]
async fn init_scheduling_twice_keeps_one_task_per_reminder() {
    let ctx = TestContext::starting_at(saturday_morning());
    let aspirin = ctx.add("Aspirin", "08:00", Recurrence::Daily).await;
    let metformin = ctx.add("Metformin", "10:00", Recurrence::Once).await;

    assert_eq!(ctx.scheduler.init_scheduling().await, 2);
    assert_eq!(ctx.scheduler.init_scheduling().await, 2);
    assert_eq!(ctx.scheduler.armed_count().await, 2);

    tokio::time::sleep(HOUR + MARGIN).await;
    assert_eq!(
        ctx.recording.messages(),
        vec![(metformin.id, ReminderMessageType::Fired)]
    );

    tokio::time::sleep(22 * HOUR).await;
    assert_eq!(
        ctx.recording.messages(),
        vec![
            (metformin.id, ReminderMessageType::Fired),
            (aspirin.id, ReminderMessageType::Fired)
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn daily_reminder_fires_again_next_day() {
    let ctx = TestContext::starting_at(saturday_morning());
    let aspirin = ctx.add("Aspirin", "08:00", Recurrence::Daily).await;
    ctx.scheduler.arm(&aspirin).await.unwrap();

    tokio::time::sleep(23 * HOUR + MARGIN).await;
    assert_eq!(ctx.recording.count(ReminderMessageType::Fired), 1);

    tokio::time::sleep(DAY - 2 * MARGIN).await;
    assert_eq!(ctx.recording.count(ReminderMessageType::Fired), 1);

    tokio::time::sleep(2 * MARGIN).await;
    assert_eq!(ctx.recording.count(ReminderMessageType::Fired), 2);
    assert!(ctx.store.get(aspirin.id).await.is_some());
    assert!(ctx.scheduler.is_armed(aspirin.id).await);
}

#[tokio::test(start_paused = true)]
async fn weekly_reminder_waits_a_week_after_first_fire() {
    let monday = at(chrono_tz::UTC, 2025, 6, 2, 10, 0);
    let ctx = TestContext::starting_at(monday);
    let vitamin = ctx.add("Vitamin C", "10:00", Recurrence::Weekly).await;

    let delay = ctx.scheduler.arm(&vitamin).await.unwrap();
    assert_eq!(delay, DAY);

    tokio::time::sleep(DAY + MARGIN).await;
    assert_eq!(ctx.recording.count(ReminderMessageType::Fired), 1);

    tokio::time::sleep(6 * DAY).await;
    assert_eq!(ctx.recording.count(ReminderMessageType::Fired), 1);

    tokio::time::sleep(DAY).await;
    assert_eq!(ctx.recording.count(ReminderMessageType::Fired), 2);
}

#[tokio::test(start_paused = true)]
async fn reminders_without_usable_time_are_skipped() {
    let ctx = TestContext::starting_at(saturday_morning());
    let imported: Reminder = serde_json::from_str(r#"{"id":1,"medicine":"X"}"#).unwrap();
    let malformed = reminder(2, "Ibuprofen", "later", Recurrence::Daily);
    ctx.store
        .replace_all(vec![
            imported.clone(),
            malformed,
            reminder(3, "Aspirin", "08:00", Recurrence::Daily),
        ])
        .await;

    assert_eq!(ctx.scheduler.init_scheduling().await, 1);
    assert_eq!(
        ctx.scheduler.arm(&imported).await,
        Err(ScheduleError::InvalidTime(FireTimeError::Missing))
    );
    assert!(!ctx.scheduler.is_armed(1).await);
    assert!(!ctx.scheduler.is_armed(2).await);
    assert!(ctx.scheduler.is_armed(3).await);
    assert_eq!(ctx.store.list().await.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn failing_channel_does_not_break_recurrence() {
    let ctx = TestContext::with_channels(saturday_morning(), vec![Arc::new(FailingChannel)]);
    let aspirin = ctx.add("Aspirin", "08:00", Recurrence::Daily).await;
    ctx.scheduler.arm(&aspirin).await.unwrap();

    tokio::time::sleep(23 * HOUR + DAY + MARGIN).await;

    assert_eq!(ctx.recording.count(ReminderMessageType::Fired), 2);
}

#[tokio::test(start_paused = true)]
async fn fired_sms_reminder_without_backend_reports_unavailable() {
    let ctx = TestContext::starting_at(saturday_morning());
    let mut request = new_reminder("Aspirin", "10:00", Recurrence::Once);
    request.send_sms = true;
    request.phone = "+15550100".to_owned();
    let aspirin = ctx.store.add(request).await.unwrap();
    ctx.scheduler.arm(&aspirin).await.unwrap();

    tokio::time::sleep(HOUR + MARGIN).await;

    assert_eq!(ctx.recording.count(ReminderMessageType::Fired), 1);
    assert_eq!(ctx.recording.count(ReminderMessageType::SmsUnavailable), 1);
}

#[tokio::test(start_paused = true)]
async fn dropping_scheduler_stops_all_tasks() {
    let ctx = TestContext::starting_at(saturday_morning());
    let aspirin = ctx.add("Aspirin", "10:00", Recurrence::Daily).await;
    ctx.scheduler.arm(&aspirin).await.unwrap();
    let recording = ctx.recording.clone();

    drop(ctx);
    tokio::time::sleep(2 * DAY).await;

    assert!(recording.messages().is_empty());
}
