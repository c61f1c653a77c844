use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeDelta, TimeZone};
use chrono_tz::Tz;

use crate::{
    delivery::{ReminderDeliveryChannel, ReminderMessageType},
    models::reminder::{NewReminder, Recurrence, Reminder, ReminderId},
    scheduling::Clock,
};

pub fn at(tz: Tz, y: i32, m: u32, d: u32, hour: u32, minute: u32) -> DateTime<Tz> {
    let naive = NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap();
    tz.from_local_datetime(&naive).single().unwrap()
}

/// Clock frozen at a single moment.
pub struct FixedClock(pub DateTime<Tz>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Tz> {
        self.0
    }
}

/// Clock that starts at `base` and advances together with tokio's (possibly
/// paused) timer.
pub struct PausedClock {
    base: DateTime<Tz>,
    started: tokio::time::Instant,
}

impl PausedClock {
    pub fn new(base: DateTime<Tz>) -> Self {
        Self {
            base,
            started: tokio::time::Instant::now(),
        }
    }
}

impl Clock for PausedClock {
    fn now(&self) -> DateTime<Tz> {
        self.base + TimeDelta::from_std(self.started.elapsed()).unwrap()
    }
}

pub type ReceivedMessages = Arc<Mutex<Vec<(ReminderId, ReminderMessageType)>>>;

#[derive(Clone, Default)]
pub struct RecordingChannel {
    pub received_messages: ReceivedMessages,
}

impl RecordingChannel {
    pub fn messages(&self) -> Vec<(ReminderId, ReminderMessageType)> {
        self.received_messages.lock().unwrap().clone()
    }

    pub fn count(&self, message: ReminderMessageType) -> usize {
        self.messages().iter().filter(|(_, m)| *m == message).count()
    }
}

#[async_trait]
impl ReminderDeliveryChannel for RecordingChannel {
    async fn send_reminder_notification(
        &self,
        reminder: &Reminder,
        message: ReminderMessageType,
    ) -> anyhow::Result<()> {
        self.received_messages
            .lock()
            .unwrap()
            .push((reminder.id, message));
        Ok(())
    }
}

pub struct FailingChannel;

#[async_trait]
impl ReminderDeliveryChannel for FailingChannel {
    async fn send_reminder_notification(
        &self,
        _reminder: &Reminder,
        _message: ReminderMessageType,
    ) -> anyhow::Result<()> {
        anyhow::bail!("autoplay blocked")
    }
}

pub fn new_reminder(medicine: &str, time: &str, recurrence: Recurrence) -> NewReminder {
    NewReminder {
        medicine_name: medicine.to_owned(),
        time: time.to_owned(),
        recurrence,
        send_sms: false,
        phone: String::new(),
    }
}

pub fn reminder(id: ReminderId, medicine: &str, time: &str, recurrence: Recurrence) -> Reminder {
    new_reminder(medicine, time, recurrence).into_reminder(id)
}
