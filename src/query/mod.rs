use std::collections::BTreeMap;

use crate::entity::{EntityDescriptor, ALL_SENTINEL};

/// Page size the backend paginator uses when no `page_size` is sent.
pub const SERVER_PAGE_SIZE: usize = 20;
/// Upper bound the backend accepts for `page_size`.
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub search: String,
    pub filters: BTreeMap<String, String>,
    pub page: usize,
    pub page_size: usize,
}

pub fn is_unconstrained(value: &str) -> bool {
    let v = value.trim();
    v.is_empty() || v.eq_ignore_ascii_case(ALL_SENTINEL)
}

impl ListQuery {
    /// Ordered query parameters: `page`, optional `page_size`, optional
    /// `search`, then filters in descriptor order followed by any
    /// undeclared keys in sorted order.
    pub fn params(&self, descriptor: &EntityDescriptor) -> Vec<(String, String)> {
        let mut out = vec![("page".to_string(), self.page.max(1).to_string())];
        if self.page_size != 0 && self.page_size != SERVER_PAGE_SIZE {
            out.push(("page_size".to_string(), self.page_size.to_string()));
        }
        let search = self.search.trim();
        if !search.is_empty() {
            out.push(("search".to_string(), search.to_string()));
        }
        for def in descriptor.filters.iter() {
            if let Some(value) = self.filters.get(&def.key) {
                if !is_unconstrained(value) {
                    out.push((def.key.clone(), value.trim().to_string()));
                }
            }
        }
        for (key, value) in self.filters.iter() {
            if descriptor.find_filter(key).is_some() || is_unconstrained(value) {
                continue;
            }
            out.push((key.clone(), value.trim().to_string()));
        }
        out
    }

    pub fn to_query_string(&self, descriptor: &EntityDescriptor) -> String {
        let mut url = match reqwest::Url::parse("http://query.invalid/") {
            Ok(url) => url,
            Err(_) => return String::new(),
        };
        url.query_pairs_mut().extend_pairs(self.params(descriptor));
        url.query().unwrap_or_default().to_string()
    }
}

pub fn build_url(
    base_url: &str,
    path: &str,
    params: &[(String, String)],
) -> Result<reqwest::Url, String> {
    let mut base = base_url.trim().to_string();
    if !base.ends_with('/') {
        base.push('/');
    }
    let base = reqwest::Url::parse(&base).map_err(|e| format!("invalid base url '{base}': {e}"))?;
    let mut url = base
        .join(path.trim_start_matches('/'))
        .map_err(|e| format!("invalid path '{path}': {e}"))?;
    if !params.is_empty() {
        url.query_pairs_mut().extend_pairs(params.iter());
    }
    Ok(url)
}
