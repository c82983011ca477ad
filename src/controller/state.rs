use std::collections::BTreeMap;

use serde::Serialize;

use crate::pagination::Pagination;
use crate::query::ListQuery;

/// Snapshot of one list controller, as published to renderers.
#[derive(Clone, Debug, Serialize)]
pub struct ListState<T> {
    pub entity: String,
    pub search_term: String,
    pub debounced_search_term: String,
    pub search_pending: bool,
    pub filters: BTreeMap<String, String>,
    pub current_page: usize,
    pub page_size: usize,
    pub items: Vec<T>,
    pub total_count: usize,
    pub total_pages: usize,
    pub paginated: bool,
    pub loading: bool,
    pub error: Option<String>,
    pub fetches_issued: u64,
}

impl<T> ListState<T> {
    pub fn new(entity: &str, page_size: usize) -> Self {
        Self {
            entity: entity.to_string(),
            search_term: String::new(),
            debounced_search_term: String::new(),
            search_pending: false,
            filters: BTreeMap::new(),
            current_page: 1,
            page_size,
            items: Vec::new(),
            total_count: 0,
            total_pages: 1,
            paginated: true,
            loading: false,
            error: None,
            fetches_issued: 0,
        }
    }

    pub fn query(&self) -> ListQuery {
        ListQuery {
            search: self.debounced_search_term.clone(),
            filters: self.filters.clone(),
            page: self.current_page,
            page_size: self.page_size,
        }
    }

    pub fn pagination(&self) -> Pagination {
        Pagination::new(
            self.current_page,
            self.total_pages,
            self.total_count,
            self.page_size,
        )
    }

    /// No fetch in flight and no search waiting on the debounce timer.
    pub fn is_idle(&self) -> bool {
        !self.loading && !self.search_pending
    }

    pub fn is_empty_result(&self) -> bool {
        self.error.is_none() && !self.loading && self.items.is_empty()
    }

    pub fn active_filter_count(&self) -> usize {
        self.filters.len()
    }
}
