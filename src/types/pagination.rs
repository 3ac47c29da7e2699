//! Pagination types for list endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::config::{DEFAULT_PAGE_NUMBER, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::domain::{BookingResponse, UserResponse};

/// `?page=&per_page=` query parameters; pages are 1-indexed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, IntoParams)]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    #[param(example = 1)]
    pub page: u64,
    #[serde(default = "default_per_page")]
    #[param(example = 20)]
    pub per_page: u64,
}

fn default_page() -> u64 {
    DEFAULT_PAGE_NUMBER
}

fn default_per_page() -> u64 {
    DEFAULT_PAGE_SIZE
}

impl PaginationParams {
    pub fn new(page: u64, per_page: u64) -> Self {
        Self { page, per_page }
    }

    /// Zero-based page index
    pub fn page_index(&self) -> u64 {
        self.page.max(1) - 1
    }

    pub fn offset(&self) -> u64 {
        self.page_index() * self.limit()
    }

    /// Page size clamped to `1..=MAX_PAGE_SIZE`
    pub fn limit(&self) -> u64 {
        self.per_page.clamp(1, MAX_PAGE_SIZE)
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE_NUMBER,
            per_page: DEFAULT_PAGE_SIZE,
        }
    }
}

/// A page of results with its metadata
#[derive(Debug, Serialize, ToSchema)]
#[aliases(BookingPage = Paginated<BookingResponse>, UserPage = Paginated<UserResponse>)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub meta: PaginationMeta,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaginationMeta {
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
    pub total_pages: u64,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, params: PaginationParams, total: u64) -> Self {
        let per_page = params.limit();
        Self {
            data,
            meta: PaginationMeta {
                page: params.page_index() + 1,
                per_page,
                total,
                total_pages: total.div_ceil(per_page),
            },
        }
    }

    /// Convert every item, keeping the metadata
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            data: self.data.into_iter().map(f).collect(),
            meta: self.meta,
        }
    }
}
