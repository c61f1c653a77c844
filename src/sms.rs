use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::{
    delivery::{Notifier, ReminderMessageType},
    models::reminder::{Reminder, ReminderId},
};

pub const SCHEDULE_SMS_PATH: &str = "/api/schedule-sms";
pub const SEND_SMS_NOW_PATH: &str = "/api/send-sms-now";

#[derive(Debug, Error)]
pub enum SmsError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("SMS backend responded with {0}")]
    Status(StatusCode),

    #[error("no SMS backend configured")]
    NotConfigured,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SmsScheduleRequest {
    pub phone: String,
    pub message: String,
    pub datetime: String,
    pub id: ReminderId,
}

impl SmsScheduleRequest {
    pub fn new(id: ReminderId, phone: &str, medicine_name: &str, target: DateTime<Utc>) -> Self {
        Self {
            phone: phone.to_owned(),
            message: format!("Time to take {medicine_name}"),
            datetime: target.to_rfc3339_opts(SecondsFormat::Millis, true),
            id,
        }
    }
}

#[derive(Serialize)]
struct SendSmsNowRequest<'a> {
    phone: &'a str,
    message: &'a str,
}

#[async_trait]
pub trait SmsDispatcher: Send + Sync + 'static {
    async fn schedule_sms(&self, request: &SmsScheduleRequest) -> Result<(), SmsError>;
    async fn send_sms_now(&self, phone: &str, message: &str) -> Result<(), SmsError>;
}

pub struct HttpSmsDispatcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSmsDispatcher {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SmsError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { client, base_url }
    }

    async fn post_json<T: Serialize + Sync>(&self, path: &str, body: &T) -> Result<(), SmsError> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(SmsError::Status(status))
        }
    }
}

#[async_trait]
impl SmsDispatcher for HttpSmsDispatcher {
    async fn schedule_sms(&self, request: &SmsScheduleRequest) -> Result<(), SmsError> {
        self.post_json(SCHEDULE_SMS_PATH, request).await
    }

    async fn send_sms_now(&self, phone: &str, message: &str) -> Result<(), SmsError> {
        self.post_json(SEND_SMS_NOW_PATH, &SendSmsNowRequest { phone, message })
            .await
    }
}

/// Issues SMS requests in the background and reports the outcome to the user
/// through the notifier. A missing or failing backend is never an error for
/// the caller.
#[derive(Clone)]
pub struct SmsRequester {
    dispatcher: Option<Arc<dyn SmsDispatcher>>,
    notifier: Arc<Notifier>,
}

impl SmsRequester {
    pub fn new(dispatcher: Option<Arc<dyn SmsDispatcher>>, notifier: Arc<Notifier>) -> Self {
        Self {
            dispatcher,
            notifier,
        }
    }

    pub fn request(&self, reminder: &Reminder, target: DateTime<Utc>) -> Option<JoinHandle<()>> {
        let Some(phone) = reminder.sms_phone() else {
            log::warn!(
                "SMS requested without a phone number. [reminder_id = {}]",
                reminder.id
            );
            return None;
        };

        let request = SmsScheduleRequest::new(reminder.id, phone, &reminder.medicine_name, target);
        let dispatcher = self.dispatcher.clone();
        let notifier = Arc::clone(&self.notifier);
        let reminder = reminder.clone();

        Some(tokio::spawn(async move {
            let result = match dispatcher {
                Some(dispatcher) => dispatcher.schedule_sms(&request).await,
                None => Err(SmsError::NotConfigured),
            };

            let outcome = match result {
                Ok(()) => {
                    log::info!(
                        "[SMS] Scheduled SMS. [reminder_id = {}, datetime = {}]",
                        request.id,
                        request.datetime
                    );
                    ReminderMessageType::SmsScheduled
                }
                Err(error) => {
                    log::warn!(
                        "[SMS] Could not schedule SMS. [reminder_id = {}, error = {}]",
                        request.id,
                        error
                    );
                    ReminderMessageType::SmsUnavailable
                }
            };

            notifier.notify(&reminder, outcome).await;
        }))
    }

    pub async fn send_now(&self, phone: &str, message: &str) -> Result<(), SmsError> {
        let dispatcher = self.dispatcher.as_ref().ok_or(SmsError::NotConfigured)?;
        dispatcher.send_sms_now(phone, message).await?;
        log::info!("[SMS] Sent SMS immediately.");
        Ok(())
    }
}
