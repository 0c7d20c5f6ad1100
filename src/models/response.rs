use serde::{Deserialize, Serialize};

use crate::utils::pagination::PageRequest;

/// 标准API响应格式
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
            message: None,
        }
    }

    pub fn success_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data,
            message: Some(message.into()),
        }
    }
}

/// 分页结果结构
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PaginatedResult<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u64,
}

impl<T> PaginatedResult<T> {
    pub fn new(data: Vec<T>, total: u64, request: PageRequest) -> Self {
        let per_page = u64::from(request.page_size);
        Self {
            data,
            total,
            page: request.page,
            per_page: request.page_size,
            total_pages: total.div_ceil(per_page),
        }
    }

    pub fn empty(request: PageRequest) -> Self {
        Self::new(Vec::new(), 0, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_rounds_up() {
        let page = PaginatedResult::new(vec![1, 2], 21, PageRequest { page: 1, page_size: 10 });
        assert_eq!(page.total_pages, 3);

        let empty: PaginatedResult<i32> = PaginatedResult::empty(PageRequest { page: 1, page_size: 10 });
        assert_eq!(empty.total_pages, 0);
        assert!(empty.data.is_empty());
    }
}
