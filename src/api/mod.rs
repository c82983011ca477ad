use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::entity::EntityDescriptor;
use crate::query;
use crate::session::{Session, User};
use crate::stats::{DashboardStats, DASHBOARD_PATH};

/// Validation messages keyed by field name, as returned by the backend on
/// a rejected create or update. Messages that belong to no field are kept
/// under [`FieldErrors::GENERAL`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub const GENERAL: &'static str = "non_field_errors";

    pub fn from_body(body: &Value) -> Self {
        let mut out = BTreeMap::new();
        match body {
            Value::Object(map) => {
                for (key, value) in map {
                    let key = if key == "detail" || key == "error" {
                        Self::GENERAL.to_string()
                    } else {
                        key.clone()
                    };
                    let messages = collect_messages(value);
                    if !messages.is_empty() {
                        out.entry(key).or_insert_with(Vec::new).extend(messages);
                    }
                }
            }
            other => {
                let messages = collect_messages(other);
                if !messages.is_empty() {
                    out.insert(Self::GENERAL.to_string(), messages);
                }
            }
        }
        Self(out)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn field(&self, name: &str) -> &[String] {
        self.0.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }
}

fn collect_messages(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items.iter().flat_map(collect_messages).collect(),
        Value::Object(map) => map
            .iter()
            .flat_map(|(k, v)| {
                collect_messages(v)
                    .into_iter()
                    .map(move |m| format!("{k}: {m}"))
            })
            .collect(),
        Value::Null => vec![],
        other => vec![other.to_string()],
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in self.0.iter() {
            if !first {
                f.write_str("; ")?;
            }
            first = false;
            write!(f, "{}: {}", field, messages.join(", "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("validation failed: {0}")]
    Validation(FieldErrors),

    #[error("record not found: {url}")]
    NotFound { url: String },

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("unexpected response body from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid request url: {message}")]
    InvalidUrl { message: String },

    #[error("{message}")]
    Rejected { message: String },
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    #[serde(default)]
    success: bool,
    token: Option<String>,
    user: Option<User>,
    error: Option<String>,
}

/// Single-record operations and authentication. List reads go through the
/// controller; after a mutation the caller refreshes the list.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
        }
    }

    fn url(&self, path: &str) -> Result<reqwest::Url, ApiError> {
        query::build_url(&self.base_url, path, &[])
            .map_err(|message| ApiError::InvalidUrl { message })
    }

    pub async fn get_record(&self, descriptor: &EntityDescriptor, id: &str) -> Result<Value, ApiError> {
        let url = self.url(&descriptor.detail_path(id))?;
        let req = self.client.get(url.clone());
        send_json(req, url).await
    }

    pub async fn create_record(
        &self,
        descriptor: &EntityDescriptor,
        body: &Value,
    ) -> Result<Value, ApiError> {
        let url = self.url(&descriptor.endpoint)?;
        let req = self.client.post(url.clone()).json(body);
        send_json(req, url).await
    }

    pub async fn update_record(
        &self,
        descriptor: &EntityDescriptor,
        id: &str,
        body: &Value,
    ) -> Result<Value, ApiError> {
        let url = self.url(&descriptor.detail_path(id))?;
        let req = self.client.put(url.clone()).json(body);
        send_json(req, url).await
    }

    pub async fn delete_record(&self, descriptor: &EntityDescriptor, id: &str) -> Result<(), ApiError> {
        let url = self.url(&descriptor.detail_path(id))?;
        let req = self.client.delete(url.clone());
        send_json(req, url).await.map(|_| ())
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Session, ApiError> {
        let url = self.url("api/auth/login/")?;
        let req = self
            .client
            .post(url.clone())
            .json(&json!({ "username": username, "password": password }));
        let resp = req.send().await.map_err(|source| ApiError::Transport {
            url: url.to_string(),
            source,
        })?;
        let ok = resp.status().is_success();
        let body = resp.bytes().await.map_err(|source| ApiError::Transport {
            url: url.to_string(),
            source,
        })?;
        let auth: AuthResponse =
            serde_json::from_slice(&body).map_err(|source| ApiError::Decode {
                url: url.to_string(),
                source,
            })?;
        match (ok && auth.success, auth.token, auth.user) {
            (true, Some(token), Some(user)) => Ok(Session::new(token, user)),
            _ => Err(ApiError::Rejected {
                message: auth.error.unwrap_or_else(|| "Login failed".to_string()),
            }),
        }
    }

    /// Tell the backend to drop the token. The client must have been built
    /// with the session being closed.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let url = self.url("api/auth/logout/")?;
        let req = self.client.post(url.clone());
        send_json(req, url).await.map(|_| ())
    }

    /// Totals and grouped counts from the analytics dashboard.
    pub async fn dashboard(&self) -> Result<DashboardStats, ApiError> {
        let url = self.url(DASHBOARD_PATH)?;
        let req = self.client.get(url.clone());
        let body = send_json(req, url.clone()).await?;
        decode_dashboard(url.as_str(), body)
    }
}

fn decode_dashboard(url: &str, body: Value) -> Result<DashboardStats, ApiError> {
    serde_json::from_value(body).map_err(|source| ApiError::Decode {
        url: url.to_string(),
        source,
    })
}

async fn send_json(req: reqwest::RequestBuilder, url: reqwest::Url) -> Result<Value, ApiError> {
    let url_str = url.to_string();
    log::debug!("{url_str}");
    let resp = req.send().await.map_err(|source| ApiError::Transport {
        url: url_str.clone(),
        source,
    })?;
    let status = resp.status();
    let body = resp.bytes().await.map_err(|source| ApiError::Transport {
        url: url_str.clone(),
        source,
    })?;
    check_response(&url_str, status.as_u16(), &body)
}

fn check_response(url: &str, status: u16, body: &[u8]) -> Result<Value, ApiError> {
    match status {
        204 => Ok(Value::Null),
        200..=299 if body.is_empty() => Ok(Value::Null),
        200..=299 => serde_json::from_slice(body).map_err(|source| ApiError::Decode {
            url: url.to_string(),
            source,
        }),
        404 => Err(ApiError::NotFound {
            url: url.to_string(),
        }),
        400 => {
            let parsed = serde_json::from_slice::<Value>(body).unwrap_or(Value::Null);
            let errors = FieldErrors::from_body(&parsed);
            if errors.is_empty() {
                Err(ApiError::Status {
                    url: url.to_string(),
                    status,
                })
            } else {
                Err(ApiError::Validation(errors))
            }
        }
        _ => Err(ApiError::Status {
            url: url.to_string(),
            status,
        }),
    }
}
