use chrono::{DateTime, LocalResult, NaiveDateTime, NaiveTime, TimeDelta, TimeZone};
use chrono_tz::Tz;
use thiserror::Error;

use crate::models::reminder::FireTimeError;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error(transparent)]
    InvalidTime(#[from] FireTimeError),

    #[error("local time {0} does not exist in the configured time zone")]
    NonexistentLocalTime(NaiveDateTime),

    #[error("next fire time is out of the supported date range")]
    OutOfRange,
}

/// Next moment strictly after `now` whose local time of day is `fire_at`.
pub fn next_occurrence(
    fire_at: &NaiveTime,
    now: DateTime<Tz>,
) -> Result<DateTime<Tz>, ScheduleError> {
    let timezone = now.timezone();
    let today = now.date_naive();

    let candidate = resolve_local(&timezone, today.and_time(*fire_at))?;
    if candidate > now {
        return Ok(candidate);
    }

    let tomorrow = today.succ_opt().ok_or(ScheduleError::OutOfRange)?;
    resolve_local(&timezone, tomorrow.and_time(*fire_at))
}

pub fn get_target_delay(
    fire_at: &NaiveTime,
    now: DateTime<Tz>,
) -> Result<TimeDelta, ScheduleError> {
    Ok(next_occurrence(fire_at, now)? - now)
}

/// Ambiguous local times (clocks turned back) take the earlier instant; times
/// skipped by a DST jump are moved forward by an hour.
fn resolve_local(timezone: &Tz, local: NaiveDateTime) -> Result<DateTime<Tz>, ScheduleError> {
    match timezone.from_local_datetime(&local) {
        LocalResult::Single(datetime) => Ok(datetime),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest),
        LocalResult::None => local
            .checked_add_signed(TimeDelta::hours(1))
            .and_then(|shifted| timezone.from_local_datetime(&shifted).earliest())
            .ok_or(ScheduleError::NonexistentLocalTime(local)),
    }
}
