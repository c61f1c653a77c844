use std::{fmt, str::FromStr};

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

pub type ReminderId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
    Once,
    Daily,
    Weekly,
}

/// Stored values other than daily and weekly read as `Once`, matching how
/// such reminders fire.
impl<'de> Deserialize<'de> for Recurrence {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(value.parse::<Recurrence>().unwrap_or_else(|error| {
            log::warn!("Reading recurrence as once. [error = {}]", error);
            Recurrence::Once
        }))
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Recurrence::Once => "once",
            Recurrence::Daily => "daily",
            Recurrence::Weekly => "weekly",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown recurrence {0:?}, expected once, daily or weekly")]
pub struct ParseRecurrenceError(String);

impl FromStr for Recurrence {
    type Err = ParseRecurrenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "once" => Ok(Recurrence::Once),
            "daily" => Ok(Recurrence::Daily),
            "weekly" => Ok(Recurrence::Weekly),
            _ => Err(ParseRecurrenceError(s.to_owned())),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FireTimeError {
    #[error("reminder has no time set")]
    Missing,

    #[error("invalid time of day {0:?}, expected HH:MM")]
    Malformed(String),
}

/// Time of day a reminder fires at, truncated to whole minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderFireTime(NaiveTime);

impl ReminderFireTime {
    pub fn new(inner: NaiveTime) -> Self {
        let normalized_time =
            NaiveTime::from_hms_opt(inner.hour(), inner.minute(), 0).expect("Will never fail.");
        Self(normalized_time)
    }

    pub fn parse(value: &str) -> Result<Self, FireTimeError> {
        let value = value.trim();
        NaiveTime::parse_from_str(value, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
            .map(Self::new)
            .map_err(|_| FireTimeError::Malformed(value.to_owned()))
    }

    pub fn time(&self) -> &NaiveTime {
        &self.0
    }

    pub fn into_time(self) -> NaiveTime {
        self.0
    }
}

impl fmt::Display for ReminderFireTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

/// A persisted reminder, in the shape it has in the local cache, the remote
/// collection and export files.
///
/// `time` and `recurrence` are kept as they were stored so that imported data
/// survives an export unchanged; they are interpreted when the reminder is
/// scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub id: ReminderId,
    #[serde(rename = "medicine", default)]
    pub medicine_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<Recurrence>,
    #[serde(default)]
    pub send_sms: bool,
    #[serde(default)]
    pub phone: String,
}

impl Reminder {
    pub fn fire_time(&self) -> Result<ReminderFireTime, FireTimeError> {
        match self.time.as_deref() {
            Some(time) => ReminderFireTime::parse(time),
            None => Err(FireTimeError::Missing),
        }
    }

    /// Reminders without a stored recurrence behave as one-off reminders.
    pub fn recurrence_policy(&self) -> Recurrence {
        self.recurrence.unwrap_or(Recurrence::Once)
    }

    /// Phone number to text, if SMS delivery is requested and possible.
    pub fn sms_phone(&self) -> Option<&str> {
        let phone = self.phone.trim();
        (self.send_sms && !phone.is_empty()).then_some(phone)
    }
}

impl fmt::Display for Reminder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let time = self.time.as_deref().unwrap_or("--:--");
        write!(
            f,
            "({}) 💊 {} {} • {}",
            self.id,
            self.medicine_name,
            time,
            self.recurrence_policy()
        )?;
        if let Some(phone) = self.sms_phone() {
            write!(f, " • SMS {phone}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("⚠️ Please enter medicine and time")]
    MissingMedicineOrTime,

    #[error("⚠️ {0}")]
    InvalidTime(#[from] FireTimeError),

    #[error("Enter phone number to send SMS")]
    MissingPhone,

    #[error("⚠️ No reminder id left, remove a reminder with a very large id first")]
    IdsExhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReminder {
    pub medicine_name: String,
    pub time: String,
    pub recurrence: Recurrence,
    pub send_sms: bool,
    pub phone: String,
}

impl NewReminder {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.medicine_name.trim().is_empty() || self.time.trim().is_empty() {
            return Err(ValidationError::MissingMedicineOrTime);
        }
        ReminderFireTime::parse(&self.time)?;
        if self.send_sms && self.phone.trim().is_empty() {
            return Err(ValidationError::MissingPhone);
        }

        Ok(())
    }

    pub fn into_reminder(self, id: ReminderId) -> Reminder {
        Reminder {
            id,
            medicine_name: self.medicine_name.trim().to_owned(),
            time: Some(self.time.trim().to_owned()),
            recurrence: Some(self.recurrence),
            send_sms: self.send_sms,
            phone: self.phone.trim().to_owned(),
        }
    }
}

/// Partial edit of a reminder; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReminderUpdate {
    pub medicine_name: Option<String>,
    pub time: Option<String>,
    pub recurrence: Option<Recurrence>,
    pub send_sms: Option<bool>,
    pub phone: Option<String>,
}

impl ReminderUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply_to(self, reminder: &mut Reminder) {
        if let Some(medicine_name) = self.medicine_name.filter(|name| !name.trim().is_empty()) {
            reminder.medicine_name = medicine_name.trim().to_owned();
        }
        if let Some(time) = self.time.filter(|time| !time.trim().is_empty()) {
            reminder.time = Some(time.trim().to_owned());
        }
        if let Some(recurrence) = self.recurrence {
            reminder.recurrence = Some(recurrence);
        }
        if let Some(send_sms) = self.send_sms {
            reminder.send_sms = send_sms;
        }
        if let Some(phone) = self.phone {
            reminder.phone = phone.trim().to_owned();
        }
    }
}
