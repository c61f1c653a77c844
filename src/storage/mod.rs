pub mod local_cache;
pub mod remote;
mod reminder_store;
mod remote_writer;

pub use reminder_store::ReminderStore;
