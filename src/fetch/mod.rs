mod response;

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::entity::EntityDescriptor;
use crate::query::{self, ListQuery};
use crate::session::Session;

pub use response::{normalize, Page};

const USER_AGENT: &str = concat!("hmslist/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

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
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to build HTTP client: {source}")]
    Build {
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to setup proxy: {proxy}: {source}")]
    ProxySetup {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("session token cannot be sent as a header")]
    InvalidToken,
}

#[derive(Clone, Debug)]
pub struct ClientOptions {
    pub timeout_seconds: u64,
    pub proxy: Option<String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: 10,
            proxy: None,
        }
    }
}

/// HTTP client shared by list fetches and record mutations. The session
/// token, when present, is attached to every request.
pub fn build_client(options: &ClientOptions, session: &Session) -> Result<reqwest::Client, ClientError> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::USER_AGENT,
        reqwest::header::HeaderValue::from_static(USER_AGENT),
    );
    headers.insert(
        reqwest::header::ACCEPT,
        reqwest::header::HeaderValue::from_static("application/json"),
    );
    if let Some(value) = session.authorization_header() {
        let mut value =
            reqwest::header::HeaderValue::from_str(&value).map_err(|_| ClientError::InvalidToken)?;
        value.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, value);
    }

    let mut builder = reqwest::Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(options.timeout_seconds.max(1)));
    if let Some(proxy) = options.proxy.as_deref().filter(|p| !p.trim().is_empty()) {
        let p = reqwest::Proxy::all(proxy).map_err(|source| ClientError::ProxySetup {
            proxy: proxy.to_string(),
            source,
        })?;
        builder = builder.proxy(p);
    }
    builder.build().map_err(|source| ClientError::Build { source })
}

/// Source of list pages. The returned future owns everything it needs so
/// the controller can run it on its own task.
pub trait ListFetcher<T>: Send + Sync + 'static {
    fn fetch(
        &self,
        descriptor: &EntityDescriptor,
        query: &ListQuery,
    ) -> BoxFuture<'static, Result<Page<T>, FetchError>>;
}

impl<T, F> ListFetcher<T> for Arc<F>
where
    F: ListFetcher<T>,
{
    fn fetch(
        &self,
        descriptor: &EntityDescriptor,
        query: &ListQuery,
    ) -> BoxFuture<'static, Result<Page<T>, FetchError>> {
        (**self).fetch(descriptor, query)
    }
}

#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl<T> ListFetcher<T> for HttpFetcher
where
    T: DeserializeOwned + Send + 'static,
{
    fn fetch(
        &self,
        descriptor: &EntityDescriptor,
        query: &ListQuery,
    ) -> BoxFuture<'static, Result<Page<T>, FetchError>> {
        let client = self.client.clone();
        let url = query::build_url(
            &self.base_url,
            &descriptor.endpoint,
            &query.params(descriptor),
        );
        async move {
            let url = url.map_err(|message| FetchError::InvalidUrl { message })?;
            get_page(&client, url).await
        }
        .boxed()
    }
}

pub async fn get_page<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: reqwest::Url,
) -> Result<Page<T>, FetchError> {
    let url_str = url.to_string();
    log::debug!("GET {url_str}");
    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|source| FetchError::Transport {
            url: url_str.clone(),
            source,
        })?;
    let status = resp.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url_str,
            status: status.as_u16(),
        });
    }
    let body = resp.bytes().await.map_err(|source| FetchError::Transport {
        url: url_str.clone(),
        source,
    })?;
    normalize(&body).map_err(|source| FetchError::Decode {
        url: url_str,
        source,
    })
}
