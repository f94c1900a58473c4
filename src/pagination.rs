//! Page requests and paginated responses

use crate::config::CommentsConfig;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Pagination metadata returned alongside a page of items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: u64,
    pub per_page: u32,
    pub total_pages: u64,
    pub page: u32,
}

impl PageMeta {
    pub fn new(total: u64, per_page: u32, page: u32) -> Self {
        let total_pages = if per_page == 0 {
            0
        } else {
            total.div_ceil(per_page as u64)
        };
        Self {
            total,
            per_page,
            total_pages,
            page,
        }
    }
}

/// A page of items plus its metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

/// A validated, 1-indexed page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub per_page: u32,
    pub page: u32,
}

impl PageRequest {
    /// Apply defaults and clamp `per_page` to the configured maximum.
    pub fn resolve(per_page: Option<u32>, page: Option<u32>, config: &CommentsConfig) -> Result<Self> {
        let per_page = per_page.unwrap_or(config.default_per_page);
        let page = page.unwrap_or(1);

        if per_page == 0 {
            return Err(Error::Validation("perPage must be at least 1".to_string()));
        }
        if page == 0 {
            return Err(Error::Validation("page must be at least 1".to_string()));
        }

        Ok(Self {
            per_page: per_page.min(config.max_per_page),
            page,
        })
    }

    /// Global offset of the first item on this page
    pub fn start_index(&self) -> usize {
        (self.page as usize - 1) * self.per_page as usize
    }

    /// Global offset one past the last item on this page
    pub fn end_index(&self) -> usize {
        self.start_index() + self.per_page as usize
    }
}
