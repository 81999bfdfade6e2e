use serde::{Deserialize, Serialize};

use crate::CoreError;

pub const MAX_PAGE_SIZE: u32 = 100;

/// 1-based page request. Only constructed in range, so the arithmetic below
/// never sees a zero page or size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    page: u32,
    size: u32,
}

impl PageRequest {
    pub fn new(page: u32, size: u32) -> Result<Self, CoreError> {
        if page < 1 {
            return Err(CoreError::Validation("page must be at least 1".into()));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&size) {
            return Err(CoreError::Validation(format!(
                "page size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        Ok(Self { page, size })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.size)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, size: 10 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total: u64) -> Self {
        let size = u64::from(request.size);
        let total_pages = if total == 0 { 1 } else { total.div_ceil(size) };
        Self {
            items,
            page: request.page,
            size: request.size,
            total,
            total_pages,
            has_next: u64::from(request.page) < total_pages,
            has_prev: request.page > 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_requests() {
        assert!(PageRequest::new(0, 10).is_err());
        assert!(PageRequest::new(1, 0).is_err());
        assert!(PageRequest::new(1, 101).is_err());
        assert!(PageRequest::new(3, 100).is_ok());
    }

    #[test]
    fn defaults_are_in_range() {
        let request = PageRequest::default();
        assert_eq!((request.page(), request.size()), (1, 10));
        assert_eq!(request.offset(), 0);
    }

    #[test]
    fn zero_size_cannot_reach_page_math() {
        let err = PageRequest::new(1, 0).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        let err = PageRequest::new(0, 5).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn page_arithmetic() {
        let request = PageRequest::new(2, 10).unwrap();
        assert_eq!(request.offset(), 10);

        let page = Page::new(vec![1, 2, 3], request, 23);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_next);
        assert!(page.has_prev);

        let last = Page::new(vec![1], PageRequest::new(3, 10).unwrap(), 21);
        assert!(!last.has_next);
    }

    #[test]
    fn empty_listing_has_one_page() {
        let page: Page<u8> = Page::new(Vec::new(), PageRequest::default(), 0);
        assert_eq!(page.total_pages, 1);
        assert!(!page.has_next);
        assert!(!page.has_prev);
    }
}
