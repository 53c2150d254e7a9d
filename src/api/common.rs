//! Common API utilities and shared types
//!
//! Query strings shared by the HTML views and the JSON API.

use serde::Deserialize;

use crate::models::{ContactFilter, ListParams, DEFAULT_PER_PAGE};
use crate::services::ContentError;

/// Default page size for admin listings
pub const ADMIN_PER_PAGE: u32 = 20;

/// Parse `?page=`. Absent or blank means the first page; anything other
/// than a positive integer is `None`.
pub fn page_number(raw: Option<&str>) -> Option<u32> {
    match raw.map(str::trim) {
        None | Some("") => Some(1),
        Some(value) => value.parse::<u32>().ok().filter(|page| *page > 0),
    }
}

/// Public listings report an unusable page number as not found
fn public_list_params(raw: Option<&str>) -> Result<ListParams, ContentError> {
    let page = page_number(raw)
        .ok_or_else(|| ContentError::NotFound(format!("page '{}'", raw.unwrap_or_default())))?;
    Ok(ListParams::new(page, DEFAULT_PER_PAGE))
}

/// `?page=N` on public listings
#[derive(Debug, Default, Deserialize)]
pub struct PageQueryParams {
    #[serde(default)]
    pub page: Option<String>,
}

impl PageQueryParams {
    pub fn list_params(&self) -> Result<ListParams, ContentError> {
        public_list_params(self.page.as_deref())
    }
}

/// `?q=...&page=N` on search
#[derive(Debug, Default, Deserialize)]
pub struct SearchQueryParams {
    #[serde(default)]
    pub q: String,
    #[serde(default)]
    pub page: Option<String>,
}

impl SearchQueryParams {
    pub fn list_params(&self) -> Result<ListParams, ContentError> {
        public_list_params(self.page.as_deref())
    }
}

/// Admin contact listing: `?is_read=&q=&page=&per_page=`
#[derive(Debug, Default, Deserialize)]
pub struct ContactListQuery {
    #[serde(default)]
    pub is_read: Option<bool>,
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default)]
    pub per_page: Option<u32>,
}

impl ContactListQuery {
    pub fn filter(&self) -> ContactFilter {
        ContactFilter {
            is_read: self.is_read,
            search: self
                .q
                .as_deref()
                .map(str::trim)
                .filter(|q| !q.is_empty())
                .map(str::to_string),
        }
    }

    /// Moderators get the first page for an unusable page number
    pub fn list_params(&self) -> ListParams {
        ListParams::new(
            page_number(self.page.as_deref()).unwrap_or(1),
            self.per_page.unwrap_or(ADMIN_PER_PAGE),
        )
    }
}
