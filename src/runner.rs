use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::api::ApiClient;
use crate::controller::{ControllerError, ControllerOptions, ListController, ListState};
use crate::debounce::DEFAULT_DEBOUNCE;
use crate::entity::{EntityDescriptor, EntityKind};
use crate::fetch::{self, ClientError, ClientOptions, HttpFetcher};
use crate::pagination::DEFAULT_PAGE_SIZE;
use crate::query::{self, MAX_PAGE_SIZE};
use crate::session::Session;

#[derive(Clone, Debug)]
pub struct Options {
    pub base_url: String,
    pub timeout_seconds: u64,
    pub proxy: Option<String>,
    pub page_size: usize,
    pub debounce: Duration,
    pub session: Session,
    pub entity: EntityKind,
    pub search: String,
    pub filters: BTreeMap<String, String>,
    pub page: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            base_url: crate::config::DEFAULT_BASE_URL.to_string(),
            timeout_seconds: 10,
            proxy: None,
            page_size: DEFAULT_PAGE_SIZE,
            debounce: DEFAULT_DEBOUNCE,
            session: Session::default(),
            entity: EntityKind::Persons,
            search: String::new(),
            filters: BTreeMap::new(),
            page: 1,
        }
    }
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("invalid base URL: {url}")]
    InvalidUrl { url: String },

    #[error("invalid page size {value}, expected 1..={max}")]
    InvalidPageSize { value: usize, max: usize },

    #[error("invalid page {value}, expected a positive integer")]
    InvalidPage { value: usize },

    #[error("{entity} cannot be filtered by '{key}' (available: {available})")]
    UnknownFilter {
        entity: String,
        key: String,
        available: String,
    },

    #[error("invalid value '{value}' for filter '{key}' (expected one of: {expected})")]
    InvalidFilterValue {
        key: String,
        value: String,
        expected: String,
    },

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Controller(#[from] ControllerError),
}

/// Wires configuration into the list controller and the record API for one
/// entity.
#[derive(Clone, Debug)]
pub struct Runner {
    options: Options,
    descriptor: EntityDescriptor,
    client: reqwest::Client,
}

impl Runner {
    pub fn new(mut options: Options) -> Result<Self, RunnerError> {
        let base = options.base_url.trim();
        match reqwest::Url::parse(base) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            _ => {
                return Err(RunnerError::InvalidUrl {
                    url: options.base_url.clone(),
                })
            }
        }
        if options.page_size == 0 || options.page_size > MAX_PAGE_SIZE {
            return Err(RunnerError::InvalidPageSize {
                value: options.page_size,
                max: MAX_PAGE_SIZE,
            });
        }
        if options.page == 0 {
            return Err(RunnerError::InvalidPage { value: options.page });
        }
        let descriptor = options.entity.descriptor();
        options.filters = canonical_filters(&descriptor, &options.filters)?;

        let client = fetch::build_client(
            &ClientOptions {
                timeout_seconds: options.timeout_seconds,
                proxy: options.proxy.clone(),
            },
            &options.session,
        )?;
        Ok(Self {
            options,
            descriptor,
            client,
        })
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn descriptor(&self) -> &EntityDescriptor {
        &self.descriptor
    }

    /// Controller seeded with the configured search, filters and page. The
    /// initial search skips the debounce since it did not come from typing.
    pub fn controller(&self) -> ListController<Value> {
        let fetcher = HttpFetcher::new(self.client.clone(), &self.options.base_url);
        ListController::spawn(
            self.descriptor.clone(),
            fetcher,
            ControllerOptions {
                page_size: self.options.page_size,
                debounce: self.options.debounce,
                initial_search: self.options.search.clone(),
                initial_filters: self.options.filters.clone(),
                initial_page: self.options.page,
            },
        )
    }

    /// One page of the list, once the first fetch has settled.
    pub async fn list(&self) -> Result<ListState<Value>, RunnerError> {
        let controller = self.controller();
        let state = controller.settle().await?;
        controller.shutdown().await;
        Ok(state)
    }

    pub fn api(&self) -> ApiClient {
        ApiClient::new(self.client.clone(), &self.options.base_url)
    }

    /// URL of the current query, for display.
    pub fn list_url(&self) -> String {
        let q = query::ListQuery {
            search: self.options.search.trim().to_string(),
            filters: self.options.filters.clone(),
            page: self.options.page,
            page_size: self.options.page_size,
        };
        match query::build_url(
            &self.options.base_url,
            &self.descriptor.endpoint,
            &q.params(&self.descriptor),
        ) {
            Ok(url) => url.to_string(),
            Err(_) => self.options.base_url.clone(),
        }
    }
}

/// Filters rewritten to the spelling the backend stores. `all` and empty
/// values pass through untouched; the query drops them.
fn canonical_filters(
    descriptor: &EntityDescriptor,
    filters: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, String>, RunnerError> {
    let mut out = BTreeMap::new();
    for (key, value) in filters {
        let Some(def) = descriptor.find_filter(key) else {
            return Err(RunnerError::UnknownFilter {
                entity: descriptor.name.clone(),
                key: key.clone(),
                available: descriptor.filter_keys().join(", "),
            });
        };
        if query::is_unconstrained(value) {
            out.insert(key.clone(), value.clone());
            continue;
        }
        let canonical = def
            .canonical(value)
            .ok_or_else(|| RunnerError::InvalidFilterValue {
                key: key.clone(),
                value: value.trim().to_string(),
                expected: def.values.join(", "),
            })?;
        out.insert(key.clone(), canonical.to_string());
    }
    Ok(out)
}
