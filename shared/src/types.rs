//! Common types used across the workspace

use serde::{Deserialize, Serialize};

/// Offset/limit window over a record collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub offset: u64,
    pub limit: u32,
}

impl PageRequest {
    pub fn first(limit: u32) -> Self {
        Self { offset: 0, limit }
    }

    /// Window following a page that returned `received` rows
    pub fn next(&self, received: usize) -> Self {
        Self {
            offset: self.offset + received as u64,
            limit: self.limit,
        }
    }

    /// Whether a page of `received` rows closes the collection.
    ///
    /// The server may cap pages below the requested limit, so a short page
    /// only ends the walk once an earlier page came back larger than it.
    /// An empty page always does.
    pub fn is_last(&self, received: usize, largest_page: usize) -> bool {
        received == 0 || (received < self.limit as usize && received < largest_page)
    }
}

/// One page of records as returned by the persistence API.
///
/// `fetched` counts raw rows received, including any the adapter could not
/// decode, so that pagination never stops early on a skipped row.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub records: Vec<T>,
    pub fetched: usize,
}

impl<T> Page<T> {
    pub fn new(records: Vec<T>) -> Self {
        let fetched = records.len();
        Self { records, fetched }
    }
}
