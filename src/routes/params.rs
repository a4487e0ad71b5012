//! Query parameter helpers shared by paginated list endpoints.

use serde::{Deserialize, Serialize};

const MAX_LIMIT: i64 = 100;

/// Common pagination parameters applied to list endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, rocket::form::FromForm)]
pub struct PaginationParams {
    /// One-based page index (defaults to the first page).
    #[field(default = 1)]
    pub page: i64,
    /// Number of items per page (clamped between 1 and 100, default 10).
    #[field(default = 10)]
    pub limit: i64,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self { page: 1, limit: 10 }
    }
}

impl PaginationParams {
    /// Normalized 1-based page index.
    pub fn page(&self) -> i64 {
        self.page.max(1)
    }

    /// Normalized page size capped at [`MAX_LIMIT`].
    pub fn limit(&self) -> i64 {
        self.limit.clamp(1, MAX_LIMIT)
    }

    /// Row offset corresponding to the normalized page.
    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.limit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocket::form::Form;

    #[test]
    fn parses_pagination_query() {
        let parsed: PaginationParams = Form::parse("page=3&limit=20").unwrap();
        assert_eq!(parsed.page(), 3);
        assert_eq!(parsed.limit(), 20);
        assert_eq!(parsed.offset(), 40);

        let defaults: PaginationParams = Form::parse("").unwrap();
        assert_eq!(defaults.page(), 1);
        assert_eq!(defaults.limit(), 10);
        assert_eq!(defaults.offset(), 0);
    }

    #[test]
    fn clamps_out_of_range_values() {
        let parsed: PaginationParams = Form::parse("page=0&limit=1000").unwrap();
        assert_eq!(parsed.page(), 1);
        assert_eq!(parsed.limit(), 100);
    }
}
