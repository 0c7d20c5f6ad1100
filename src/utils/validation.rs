use crate::error::{AppError, Result};
use regex::Regex;
use std::sync::OnceLock;

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 150;

fn username_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9_.-]+$").ok())
        .as_ref()
}

/// 验证用户名格式
pub fn validate_username(username: &str) -> Result<()> {
    if username.trim().is_empty() {
        return Err(AppError::validation("Username may not be blank."));
    }

    let length = username.chars().count();
    if length < USERNAME_MIN {
        return Err(AppError::validation("Username must be at least 3 characters."));
    }
    if length > USERNAME_MAX {
        return Err(AppError::validation("Username may not exceed 150 characters."));
    }

    let pattern = username_pattern().ok_or_else(|| AppError::internal("username pattern failed to compile"))?;
    if !pattern.is_match(username) {
        return Err(AppError::validation(
            "Username may only contain letters, digits and . _ - characters.",
        ));
    }

    Ok(())
}
