pub mod appsettings;
pub mod cli;
pub mod delivery;
pub mod models;
pub mod scheduling;
pub mod session;
pub mod sms;
pub mod storage;

#[cfg(test)]
mod test_utils;
