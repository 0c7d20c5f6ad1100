use serde::Deserialize;

use crate::{
    config::Config,
    error::{AppError, Result},
};

/// Raw `?page=&page_size=` query parameters.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// A validated page window. `page` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn resolve(page: Option<u32>, page_size: Option<u32>, config: &Config) -> Result<Self> {
        let page = page.unwrap_or(1);
        if page == 0 {
            return Err(AppError::validation("page must be at least 1"));
        }

        let page_size = match page_size {
            Some(0) => return Err(AppError::validation("page_size must be at least 1")),
            Some(size) => size.min(config.max_page_size),
            None => config.default_page_size,
        };

        Ok(Self { page, page_size })
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.page_size)
    }

    /// Slices an already-ordered list into this page.
    pub fn slice<T: Clone>(&self, items: &[T]) -> Vec<T> {
        let start = usize::try_from(self.offset()).unwrap_or(usize::MAX);
        items
            .iter()
            .skip(start)
            .take(self.page_size as usize)
            .cloned()
            .collect()
    }
}

impl PageQuery {
    pub fn resolve(&self, config: &Config) -> Result<PageRequest> {
        PageRequest::resolve(self.page, self.page_size, config)
    }
}
