pub mod extract;
pub mod middleware;
pub mod pagination;
pub mod validation;
