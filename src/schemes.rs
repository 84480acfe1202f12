// Paging through the government-scheme catalogue

use std::collections::HashSet;

use crate::backend::{BackendClient, BackendError};
use crate::models::{SchemeQuery, SchemeRecord};

pub const PAGE_SIZE: u32 = 8;

/// Walks the scheme list page by page with fixed filters.
#[derive(Debug, Clone)]
pub struct SchemeCursor {
    query: SchemeQuery,
    total: Option<u32>,
    seen: HashSet<String>,
}

impl SchemeCursor {
    pub fn new(search: Option<String>, scheme_type: Option<String>) -> Self {
        Self::with_page_size(PAGE_SIZE, search, scheme_type)
    }

    pub fn with_page_size(limit: u32, search: Option<String>, scheme_type: Option<String>) -> Self {
        let blank_to_none = |s: Option<String>| s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        Self {
            query: SchemeQuery {
                limit: limit.max(1),
                offset: 0,
                search: blank_to_none(search),
                scheme_type: blank_to_none(scheme_type),
            },
            total: None,
            seen: HashSet::new(),
        }
    }

    pub fn offset(&self) -> u32 {
        self.query.offset
    }

    pub fn total(&self) -> Option<u32> {
        self.total
    }

    pub fn is_exhausted(&self) -> bool {
        self.total.is_some_and(|total| self.query.offset >= total)
    }

    /// Fetches the next page. Returns an empty page once the catalogue is exhausted.
    pub async fn next_page(&mut self, backend: &BackendClient) -> Result<Vec<SchemeRecord>, BackendError> {
        if self.is_exhausted() {
            return Ok(Vec::new());
        }
        let page = backend.list_schemes(&self.query).await?;
        self.total = Some(page.total);
        self.query.offset += self.query.limit;

        let mut schemes = page.schemes;
        schemes.truncate(self.query.limit as usize);
        for scheme in &schemes {
            if !self.seen.insert(scheme.id.clone()) {
                tracing::warn!(id = %scheme.id, offset = page.offset, "Scheme repeated across pages");
            }
        }
        Ok(schemes)
    }
}
