mod auth;
mod booking;
mod cart;
mod catalog;
mod notification;
mod order;
mod pay;
mod report;
mod staff;
mod upload;

pub use auth::*;
pub use booking::*;
pub use cart::*;
pub use catalog::*;
pub use notification::*;
pub use order::*;
pub use pay::*;
pub use report::*;
pub use staff::*;
pub use upload::*;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;
pub const MAX_PAGE: i64 = 1_000_000;

#[derive(Deserialize, Debug, Default, Clone, Copy)]
pub struct Pagination {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl Pagination {
    /// Returns `(page, limit, offset)` with page clamped to 1..=MAX_PAGE and limit to 1..=100.
    pub fn resolve(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).clamp(1, MAX_PAGE);
        let limit = self
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        (page, limit, (page - 1) * limit)
    }
}

/// Trims an optional text edit. A field that is sent but blank is rejected.
pub fn trimmed_edit<'a>(value: Option<&'a str>, field: &str) -> AppResult<Option<&'a str>> {
    match value.map(str::trim) {
        Some("") => Err(AppError::bad_request(format!("{} cannot be empty", field))),
        trimmed => Ok(trimmed),
    }
}

#[derive(Serialize, Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_defaults() {
        assert_eq!(Pagination::default().resolve(), (1, 20, 0));
    }

    #[test]
    fn pagination_clamps() {
        let p = Pagination {
            page: Some(0),
            limit: Some(1000),
        };
        assert_eq!(p.resolve(), (1, 100, 0));

        let p = Pagination {
            page: Some(3),
            limit: Some(10),
        };
        assert_eq!(p.resolve(), (3, 10, 20));
    }

    #[test]
    fn huge_page_is_capped() {
        let p = Pagination {
            page: Some(i64::MAX),
            limit: Some(20),
        };
        let (page, limit, offset) = p.resolve();
        assert_eq!(page, MAX_PAGE);
        assert_eq!(limit, 20);
        assert_eq!(offset, (MAX_PAGE - 1) * 20);
    }

    #[test]
    fn blank_edits_are_rejected() {
        assert_eq!(trimmed_edit(None, "Title").unwrap(), None);
        assert_eq!(trimmed_edit(Some("  Gold  "), "Title").unwrap(), Some("Gold"));
        assert!(matches!(
            trimmed_edit(Some("   "), "Title"),
            Err(AppError::BadRequest(msg)) if msg == "Title cannot be empty"
        ));
        assert!(trimmed_edit(Some(""), "Name").is_err());
    }
}
