//! Search / filter / pagination controller for one entity list.
//!
//! [`ListController::spawn`] starts a task that owns the list state. The
//! handle sends commands to it and reads published [`ListState`] snapshots.
//! Search input is debounced; a change of the debounced search or of any
//! filter sends the list back to page 1 before the next fetch is built.
//! Every fetch is tagged with a generation and only the newest generation
//! may update the state, so a slow early response never overwrites a newer
//! one. Dropping the handle stops the task, its pending debounce and its
//! in-flight fetches.

mod state;

use std::collections::BTreeMap;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle, JoinSet};

use crate::debounce::{Debouncer, DEFAULT_DEBOUNCE};
use crate::entity::EntityDescriptor;
use crate::fetch::{FetchError, ListFetcher, Page};
use crate::pagination::DEFAULT_PAGE_SIZE;
use crate::query::is_unconstrained;

pub use state::ListState;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("list controller for {entity} has shut down")]
    Closed { entity: String },

    #[error("{entity} cannot be filtered by '{key}' (available: {available})")]
    UnknownFilter {
        entity: String,
        key: String,
        available: String,
    },

    #[error("'{value}' is not a valid {key} (expected one of: {expected})")]
    InvalidFilterValue {
        key: String,
        value: String,
        expected: String,
    },
}

#[derive(Clone, Debug)]
pub struct ControllerOptions {
    pub page_size: usize,
    pub debounce: Duration,
    pub initial_search: String,
    pub initial_filters: BTreeMap<String, String>,
    pub initial_page: usize,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            debounce: DEFAULT_DEBOUNCE,
            initial_search: String::new(),
            initial_filters: BTreeMap::new(),
            initial_page: 1,
        }
    }
}

#[derive(Debug)]
enum Command {
    Search(String),
    Filter { key: String, value: Option<String> },
    GoToPage(usize),
    NextPage,
    PreviousPage,
    Refresh,
    Sync(oneshot::Sender<()>),
}

type FetchOutcome<T> = (u64, Result<Page<T>, FetchError>);

pub struct ListController<T> {
    descriptor: EntityDescriptor,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ListState<T>>,
    task: Option<JoinHandle<()>>,
}

impl<T> ListController<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Start the controller and its first fetch. Must be called from within
    /// a tokio runtime.
    pub fn spawn<F>(descriptor: EntityDescriptor, fetcher: F, options: ControllerOptions) -> Self
    where
        F: ListFetcher<T>,
    {
        let mut state = ListState::new(&descriptor.name, options.page_size.max(1));
        state.search_term = options.initial_search;
        state.debounced_search_term = state.search_term.clone();
        state.filters = options
            .initial_filters
            .into_iter()
            .filter(|(_, v)| !is_unconstrained(v))
            .map(|(k, v)| {
                let v = match descriptor.find_filter(&k).and_then(|d| d.canonical(&v)) {
                    Some(c) => c.to_string(),
                    None => v.trim().to_string(),
                };
                (k, v)
            })
            .collect();
        state.current_page = options.initial_page.max(1);

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(state.clone());

        let task = ControllerTask {
            descriptor: descriptor.clone(),
            fetcher,
            commands: command_rx,
            publisher: state_tx,
            state,
            debouncer: Debouncer::new(options.debounce),
            inflight: JoinSet::new(),
            generation: 0,
        };
        let handle = tokio::spawn(task.run());

        Self {
            descriptor,
            commands: command_tx,
            state: state_rx,
            task: Some(handle),
        }
    }

    pub fn descriptor(&self) -> &EntityDescriptor {
        &self.descriptor
    }

    /// Latest published snapshot.
    pub fn state(&self) -> ListState<T> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ListState<T>> {
        self.state.clone()
    }

    /// Raw search box input. The query only follows once input has been
    /// quiet for the debounce interval.
    pub fn set_search(&self, term: impl Into<String>) -> Result<(), ControllerError> {
        self.send(Command::Search(term.into()))
    }

    /// Select a filter value; `None`, an empty string or `all` removes it.
    pub fn set_filter(&self, key: &str, value: Option<&str>) -> Result<(), ControllerError> {
        let def = self
            .descriptor
            .find_filter(key)
            .ok_or_else(|| ControllerError::UnknownFilter {
                entity: self.descriptor.name.clone(),
                key: key.to_string(),
                available: self.descriptor.filter_keys().join(", "),
            })?;
        let value = match value.filter(|v| !is_unconstrained(v)) {
            Some(v) => Some(
                def.canonical(v)
                    .ok_or_else(|| ControllerError::InvalidFilterValue {
                        key: key.to_string(),
                        value: v.trim().to_string(),
                        expected: def.values.join(", "),
                    })?
                    .to_string(),
            ),
            None => None,
        };
        self.send(Command::Filter {
            key: key.to_string(),
            value,
        })
    }

    pub fn clear_filter(&self, key: &str) -> Result<(), ControllerError> {
        self.set_filter(key, None)
    }

    pub fn go_to_page(&self, page: usize) -> Result<(), ControllerError> {
        self.send(Command::GoToPage(page))
    }

    pub fn next_page(&self) -> Result<(), ControllerError> {
        self.send(Command::NextPage)
    }

    pub fn previous_page(&self) -> Result<(), ControllerError> {
        self.send(Command::PreviousPage)
    }

    /// Re-issue the current query, e.g. after a record was changed.
    pub fn refresh(&self) -> Result<(), ControllerError> {
        self.send(Command::Refresh)
    }

    /// Wait until every command sent so far has been handled and the list
    /// is idle, then return that snapshot.
    pub async fn settle(&self) -> Result<ListState<T>, ControllerError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.send(Command::Sync(ack_tx))?;
        ack_rx.await.map_err(|_| self.closed())?;
        let mut rx = self.state.clone();
        let snapshot = rx
            .wait_for(|s| s.is_idle())
            .await
            .map_err(|_| self.closed())?;
        Ok(snapshot.clone())
    }

    /// Stop the controller. Pending debounce and in-flight fetches are
    /// dropped without touching the state again.
    pub async fn shutdown(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }

    fn send(&self, command: Command) -> Result<(), ControllerError> {
        self.commands.send(command).map_err(|_| self.closed())
    }

    fn closed(&self) -> ControllerError {
        ControllerError::Closed {
            entity: self.descriptor.name.clone(),
        }
    }
}

impl<T> Drop for ListController<T> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct ControllerTask<T, F> {
    descriptor: EntityDescriptor,
    fetcher: F,
    commands: mpsc::UnboundedReceiver<Command>,
    publisher: watch::Sender<ListState<T>>,
    state: ListState<T>,
    debouncer: Debouncer<String>,
    inflight: JoinSet<FetchOutcome<T>>,
    generation: u64,
}

impl<T, F> ControllerTask<T, F>
where
    T: Clone + Send + Sync + 'static,
    F: ListFetcher<T>,
{
    async fn run(mut self) {
        self.issue_fetch();
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                term = self.debouncer.ready(), if self.debouncer.is_pending() => {
                    self.commit_search(term);
                }
                Some(joined) = self.inflight.join_next(), if !self.inflight.is_empty() => {
                    self.complete(joined);
                }
            }
        }
        log::debug!("{} controller stopped", self.descriptor.name);
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Search(term) => {
                self.state.search_term = term.clone();
                self.state.search_pending = true;
                self.debouncer.push(term);
                self.publish();
            }
            Command::Filter { key, value } => {
                if self.state.filters.get(&key) == value.as_ref() {
                    return;
                }
                match value {
                    Some(value) => {
                        self.state.filters.insert(key, value);
                    }
                    None => {
                        self.state.filters.remove(&key);
                    }
                }
                self.reset_to_first_page();
                self.issue_fetch();
            }
            Command::GoToPage(page) => {
                let target = self.state.pagination().go_to(page);
                self.move_to(target);
            }
            Command::NextPage => {
                let target = self.state.pagination().next();
                self.move_to(target);
            }
            Command::PreviousPage => {
                let target = self.state.pagination().previous();
                self.move_to(target);
            }
            Command::Refresh => self.issue_fetch(),
            Command::Sync(ack) => {
                let _ = ack.send(());
            }
        }
    }

    fn move_to(&mut self, target: Option<usize>) {
        if let Some(page) = target {
            self.state.current_page = page;
            self.issue_fetch();
        }
    }

    fn commit_search(&mut self, term: String) {
        self.state.search_pending = false;
        // The term is kept as typed; `ListQuery::params` trims it.
        let unchanged = term.trim() == self.state.debounced_search_term.trim();
        self.state.debounced_search_term = term;
        if unchanged {
            self.publish();
            return;
        }
        self.reset_to_first_page();
        self.issue_fetch();
    }

    /// The old page count belongs to the previous query. Until the reset
    /// fetch lands there is only page 1, so page moves are no-ops.
    fn reset_to_first_page(&mut self) {
        self.state.current_page = 1;
        self.state.total_pages = 1;
    }

    fn issue_fetch(&mut self) {
        self.generation += 1;
        let generation = self.generation;
        let query = self.state.query();
        log::debug!(
            "fetching {} (generation {generation}): {:?}",
            self.descriptor.name,
            query.params(&self.descriptor)
        );
        let request = self.fetcher.fetch(&self.descriptor, &query);
        self.inflight
            .spawn(async move { (generation, request.await) });
        self.state.loading = true;
        self.state.fetches_issued = generation;
        self.publish();
    }

    fn complete(&mut self, joined: Result<FetchOutcome<T>, JoinError>) {
        let (generation, result) = match joined {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("{} fetch task failed: {e}", self.descriptor.name);
                if self.inflight.is_empty() && self.state.loading {
                    self.state.loading = false;
                    self.state.error = Some(self.descriptor.fetch_error_message());
                    self.publish();
                }
                return;
            }
        };
        if generation != self.generation {
            log::debug!(
                "discarding stale {} response (generation {generation}, latest {})",
                self.descriptor.name,
                self.generation
            );
            return;
        }

        self.state.loading = false;
        match result {
            Ok(page) => {
                self.state.total_pages = page.total_pages(self.state.page_size);
                self.state.total_count = page.total_count;
                self.state.paginated = page.paginated;
                self.state.items = page.items;
                self.state.error = None;
            }
            Err(e) => {
                log::warn!("{} list fetch failed: {e}", self.descriptor.name);
                self.state.error = Some(self.descriptor.fetch_error_message());
            }
        }
        self.publish();
    }

    fn publish(&self) {
        self.publisher.send_replace(self.state.clone());
    }
}
