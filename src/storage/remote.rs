use std::{
    collections::{BTreeMap, HashMap},
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::models::{
    reminder::{Reminder, ReminderId},
    user::UserId,
};

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("remote collection responded with {0}")]
    Status(StatusCode),

    #[error("remote collection unavailable")]
    Unavailable,

    #[error("remote base url {0:?} cannot hold a collection path")]
    InvalidBaseUrl(String),

    #[error("user id {0:?} is not a valid path segment")]
    InvalidUserId(String),
}

/// Per-user collection of reminder documents keyed by reminder id.
#[async_trait]
pub trait RemoteCollection: Send + Sync + 'static {
    async fn get_all(&self, user_id: &str) -> Result<Vec<Reminder>, RemoteError>;
    async fn set_one(&self, user_id: &str, reminder: &Reminder) -> Result<(), RemoteError>;
    async fn delete_one(&self, user_id: &str, id: ReminderId) -> Result<(), RemoteError>;
    async fn batch_set(&self, user_id: &str, reminders: &[Reminder]) -> Result<(), RemoteError>;
}

/// Document store client speaking a plain REST layout:
/// `{base}/users/{uid}/reminders[/{id}]`.
///
/// The user id is always a single percent-encoded path segment.
pub struct HttpRemoteCollection {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRemoteCollection {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn collection_url(&self, user_id: &str) -> Result<Url, RemoteError> {
        self.url_for(user_id, None)
    }

    fn document_url(&self, user_id: &str, id: ReminderId) -> Result<Url, RemoteError> {
        self.url_for(user_id, Some(id))
    }

    fn url_for(&self, user_id: &str, id: Option<ReminderId>) -> Result<Url, RemoteError> {
        if matches!(user_id, "" | "." | "..") {
            return Err(RemoteError::InvalidUserId(user_id.to_owned()));
        }

        let invalid_base = || RemoteError::InvalidBaseUrl(self.base_url.clone());
        let mut url = Url::parse(&self.base_url).map_err(|_| invalid_base())?;
        {
            let mut segments = url.path_segments_mut().map_err(|()| invalid_base())?;
            segments
                .pop_if_empty()
                .extend(["users", user_id, "reminders"]);
            if let Some(id) = id {
                segments.push(&id.to_string());
            }
        }

        Ok(url)
    }
}

fn check_status(response: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(RemoteError::Status(status))
    }
}

#[async_trait]
impl RemoteCollection for HttpRemoteCollection {
    async fn get_all(&self, user_id: &str) -> Result<Vec<Reminder>, RemoteError> {
        let response = self
            .client
            .get(self.collection_url(user_id)?)
            .send()
            .await?;

        Ok(check_status(response)?.json().await?)
    }

    async fn set_one(&self, user_id: &str, reminder: &Reminder) -> Result<(), RemoteError> {
        let response = self
            .client
            .put(self.document_url(user_id, reminder.id)?)
            .json(reminder)
            .send()
            .await?;

        check_status(response)?;
        Ok(())
    }

    async fn delete_one(&self, user_id: &str, id: ReminderId) -> Result<(), RemoteError> {
        let response = self
            .client
            .delete(self.document_url(user_id, id)?)
            .send()
            .await?;

        check_status(response)?;
        Ok(())
    }

    async fn batch_set(&self, user_id: &str, reminders: &[Reminder]) -> Result<(), RemoteError> {
        let response = self
            .client
            .put(self.collection_url(user_id)?)
            .json(reminders)
            .send()
            .await?;

        check_status(response)?;
        Ok(())
    }
}

/// Remote collection kept in process memory. Can be switched offline to
/// make every call fail.
#[derive(Default)]
pub struct InMemoryRemoteCollection {
    users: RwLock<HashMap<UserId, BTreeMap<ReminderId, Reminder>>>,
    offline: AtomicBool,
}

impl InMemoryRemoteCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Relaxed);
    }

    pub async fn documents(&self, user_id: &str) -> Vec<Reminder> {
        self.users
            .read()
            .await
            .get(user_id)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default()
    }

    fn ensure_online(&self) -> Result<(), RemoteError> {
        if self.offline.load(Ordering::Relaxed) {
            Err(RemoteError::Unavailable)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteCollection for InMemoryRemoteCollection {
    async fn get_all(&self, user_id: &str) -> Result<Vec<Reminder>, RemoteError> {
        self.ensure_online()?;
        Ok(self.documents(user_id).await)
    }

    async fn set_one(&self, user_id: &str, reminder: &Reminder) -> Result<(), RemoteError> {
        self.ensure_online()?;
        self.users
            .write()
            .await
            .entry(user_id.to_owned())
            .or_default()
            .insert(reminder.id, reminder.clone());

        Ok(())
    }

    async fn delete_one(&self, user_id: &str, id: ReminderId) -> Result<(), RemoteError> {
        self.ensure_online()?;
        if let Some(docs) = self.users.write().await.get_mut(user_id) {
            docs.remove(&id);
        }

        Ok(())
    }

    async fn batch_set(&self, user_id: &str, reminders: &[Reminder]) -> Result<(), RemoteError> {
        self.ensure_online()?;
        let mut users = self.users.write().await;
        let docs = users.entry(user_id.to_owned()).or_default();
        for reminder in reminders {
            docs.insert(reminder.id, reminder.clone());
        }

        Ok(())
    }
}
