use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::pagination;

/// The two list shapes the backend produces: a paginated envelope, or a
/// bare array when pagination is switched off for the endpoint.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListResponse<T> {
    Paginated {
        #[serde(default)]
        count: Option<usize>,
        results: Vec<T>,
    },
    Bare(Vec<T>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: usize,
    pub paginated: bool,
}

impl<T> Page<T> {
    pub fn total_pages(&self, page_size: usize) -> usize {
        if self.paginated {
            pagination::total_pages(self.total_count, page_size)
        } else {
            1
        }
    }
}

impl<T> ListResponse<T> {
    fn into_page(self) -> Page<T> {
        match self {
            ListResponse::Paginated { count, results } => {
                let total_count = count.unwrap_or(results.len());
                Page {
                    items: results,
                    total_count,
                    paginated: true,
                }
            }
            ListResponse::Bare(items) => Page {
                total_count: items.len(),
                items,
                paginated: false,
            },
        }
    }
}

pub fn normalize<T: DeserializeOwned>(body: &[u8]) -> Result<Page<T>, serde_json::Error> {
    serde_json::from_slice::<ListResponse<T>>(body).map(ListResponse::into_page)
}
