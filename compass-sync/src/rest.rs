//! REST implementation of [`RemoteStore`].
//!
//! Speaks the PostgREST dialect used by managed row backends:
//! `POST /rest/v1/{table}` to insert, `PATCH` / `DELETE
//! /rest/v1/{table}?id=eq.{id}` to update or delete, with
//! `Prefer: return=representation` so every call echoes the affected rows.

use crate::remote::{RemoteError, RemoteResult, RemoteStore};
use async_trait::async_trait;
use compass_types::Record;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use std::time::Duration;
use tracing::debug;

/// Connection settings for the REST store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RestStoreConfig {
    /// Project base URL, e.g. `https://xyz.example.co`.
    pub base_url: String,
    /// Public API key sent as `apikey`.
    pub api_key: String,
    /// User access token; falls back to the API key when absent.
    pub access_token: Option<String>,
    /// Per-request timeout (ms).
    pub timeout_ms: u64,
    /// Primary key column used to address rows.
    pub id_column: String,
}

impl Default for RestStoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:54321".to_string(),
            api_key: String::new(),
            access_token: None,
            timeout_ms: 30_000,
            id_column: "id".to_string(),
        }
    }
}

/// Remote store reached over HTTP.
pub struct RestRemoteStore {
    config: RestStoreConfig,
    access_token: RwLock<Option<String>>,
    client: Client,
}

impl RestRemoteStore {
    /// Creates a new REST store.
    pub fn new(config: RestStoreConfig) -> RemoteResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| RemoteError::Other(format!("failed to create HTTP client: {e}")))?;
        let access_token = RwLock::new(config.access_token.clone());
        Ok(Self {
            config,
            access_token,
            client,
        })
    }

    /// Replaces the user access token sent on subsequent requests. `None`
    /// falls back to the API key.
    pub fn set_access_token(&self, token: Option<String>) {
        debug!("Access token {}", if token.is_some() { "updated" } else { "cleared" });
        *self.access_token.write().unwrap_or_else(|e| e.into_inner()) = token;
    }

    /// Returns the configuration it was built with. The access token in it
    /// is the initial one.
    pub fn config(&self) -> &RestStoreConfig {
        &self.config
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.config.base_url.trim_end_matches('/'), table)
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        let token = self
            .access_token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .unwrap_or_else(|| self.config.api_key.clone());
        self.client
            .request(method, self.table_url(table))
            .header("apikey", &self.config.api_key)
            .bearer_auth(token)
            .header("Prefer", "return=representation")
    }

    fn row_filter(&self, id: &str) -> [(String, String); 1] {
        [(self.config.id_column.clone(), format!("eq.{id}"))]
    }

    /// Sends a request. `None` means the store answered without a body.
    async fn send(&self, op: &str, request: RequestBuilder) -> RemoteResult<Option<Vec<Record>>> {
        let response = request.send().await.map_err(classify_transport)?;
        let status = response.status();
        debug!("{} -> {}", op, status);
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(classify_status(status, message));
        }
        read_rows(response).await
    }
}

async fn read_rows(response: Response) -> RemoteResult<Option<Vec<Record>>> {
    let body = response
        .bytes()
        .await
        .map_err(|e| RemoteError::Network(format!("failed to read response: {e}")))?;
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    match serde_json::from_slice::<serde_json::Value>(&body) {
        Ok(serde_json::Value::Array(rows)) => Ok(Some(
            rows.into_iter()
                .filter_map(|v| match v {
                    serde_json::Value::Object(map) => Some(map),
                    _ => None,
                })
                .collect(),
        )),
        Ok(serde_json::Value::Object(row)) => Ok(Some(vec![row])),
        Ok(other) => Err(RemoteError::Other(format!("unexpected response body: {other}"))),
        Err(e) => Err(RemoteError::Other(format!("failed to parse response: {e}"))),
    }
}

/// Maps a transport failure to a remote error.
fn classify_transport(e: reqwest::Error) -> RemoteError {
    if e.is_timeout() {
        RemoteError::Timeout
    } else if e.is_connect() || e.is_request() {
        RemoteError::Network(e.to_string())
    } else {
        RemoteError::Other(e.to_string())
    }
}

/// Maps a non-success HTTP status to a remote error.
fn classify_status(status: StatusCode, message: String) -> RemoteError {
    let code = status.as_u16();
    match status {
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            RemoteError::Unavailable { status: code, message }
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            RemoteError::Unauthorized { status: code, message }
        }
        StatusCode::NOT_FOUND => RemoteError::NotFound(message),
        s if s.is_server_error() => RemoteError::Unavailable { status: code, message },
        s if s.is_client_error() => RemoteError::Rejected { status: code, message },
        _ => RemoteError::Other(format!("unexpected status {code}: {message}")),
    }
}

#[async_trait]
impl RemoteStore for RestRemoteStore {
    async fn insert(&self, table: &str, record: &Record) -> RemoteResult<Record> {
        let request = self.request(Method::POST, table).json(record);
        // Any 2xx means the row was stored, even without a representation.
        match self.send("insert", request).await?.and_then(|rows| rows.into_iter().next()) {
            Some(row) => Ok(row),
            None => {
                debug!("Insert into {} returned no row, echoing the submitted record", table);
                Ok(record.clone())
            }
        }
    }

    async fn update(&self, table: &str, id: &str, changes: &Record) -> RemoteResult<Record> {
        let request = self
            .request(Method::PATCH, table)
            .query(&self.row_filter(id))
            .json(changes);
        match self.send("update", request).await? {
            Some(rows) => rows
                .into_iter()
                .next()
                .ok_or_else(|| RemoteError::NotFound(format!("{table}/{id}"))),
            None => {
                let mut echoed = changes.clone();
                echoed.insert(self.config.id_column.clone(), id.into());
                Ok(echoed)
            }
        }
    }

    async fn delete(&self, table: &str, id: &str) -> RemoteResult<()> {
        let request = self
            .request(Method::DELETE, table)
            .query(&self.row_filter(id));
        match self.send("delete", request).await? {
            Some(rows) if rows.is_empty() => Err(RemoteError::NotFound(format!("{table}/{id}"))),
            _ => Ok(()),
        }
    }
}
