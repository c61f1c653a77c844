mod clock;
mod scheduler;
mod target_delay;

pub use clock::{Clock, SystemClock};
pub use scheduler::{ReminderScheduler, ScheduledTask};
pub use target_delay::{ScheduleError, get_target_delay, next_occurrence};
