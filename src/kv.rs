//! Remote key-value snapshot storage.
//!
//! Talks to a simple KV server over HTTP: `GET /register` hands out an API
//! token at construction, then snapshots are stored as four JSON blobs under
//! the keys `tasks`, `epics`, `subtasks` and `history` via
//! `POST /save/{key}` and `GET /load/{key}`. Keys the server has never seen
//! load as empty collections, so a fresh server behaves like a fresh file.

use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::error::StoreError;
use crate::store::{Snapshot, SnapshotStore};

/// Minimal client for the KV server's three-endpoint protocol.
pub struct KvClient {
    base_url: String,
    api_token: String,
    agent: ureq::Agent,
}

impl KvClient {
    /// Register with the server and obtain an API token.
    pub fn connect(base_url: &str) -> Result<Self, StoreError> {
        let agent = ureq::agent();
        let base_url = base_url.trim_end_matches('/').to_string();
        let api_token = agent
            .get(&format!("{base_url}/register"))
            .call()
            .map_err(|e| StoreError::Http(Box::new(e)))?
            .into_string()?;
        info!(%base_url, "registered with kv server");
        Ok(KvClient {
            base_url,
            api_token,
            agent,
        })
    }

    pub fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.agent
            .post(&format!(
                "{}/save/{}?API_TOKEN={}",
                self.base_url, key, self.api_token
            ))
            .send_string(value)
            .map_err(|e| StoreError::Http(Box::new(e)))?;
        debug!(key, bytes = value.len(), "kv blob saved");
        Ok(())
    }

    /// Fetch a blob; `None` when the server does not know the key.
    pub fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        let url = format!(
            "{}/load/{}?API_TOKEN={}",
            self.base_url, key, self.api_token
        );
        match self.agent.get(&url).call() {
            Ok(response) => Ok(Some(response.into_string()?)),
            Err(ureq::Error::Status(404, _)) => Ok(None),
            Err(e) => Err(StoreError::Http(Box::new(e))),
        }
    }
}

/// Snapshot store backed by a remote KV server.
pub struct KvStore {
    client: KvClient,
}

impl KvStore {
    pub fn connect(base_url: &str) -> Result<Self, StoreError> {
        Ok(KvStore {
            client: KvClient::connect(base_url)?,
        })
    }

    fn fetch<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, StoreError> {
        match self.client.load(key)? {
            Some(body) if !body.trim().is_empty() => Ok(serde_json::from_str(&body)?),
            _ => Ok(Vec::new()),
        }
    }
}

impl SnapshotStore for KvStore {
    fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        self.client
            .put("tasks", &serde_json::to_string(&snapshot.tasks)?)?;
        self.client
            .put("epics", &serde_json::to_string(&snapshot.epics)?)?;
        self.client
            .put("subtasks", &serde_json::to_string(&snapshot.subtasks)?)?;
        self.client
            .put("history", &serde_json::to_string(&snapshot.history_ids)?)?;
        Ok(())
    }

    fn load(&self) -> Result<Snapshot, StoreError> {
        Ok(Snapshot {
            tasks: self.fetch("tasks")?,
            epics: self.fetch("epics")?,
            subtasks: self.fetch("subtasks")?,
            history_ids: match self.client.load("history")? {
                Some(body) if !body.trim().is_empty() => serde_json::from_str(&body)?,
                _ => Vec::new(),
            },
        })
    }
}
