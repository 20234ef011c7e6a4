//! `$select` 解析

use regex::Regex;
use std::sync::OnceLock;

use crate::core::error::{ODataError, ODataResult};
use crate::utils::split_top_level;

fn select_item() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\*|[A-Za-z_][A-Za-z0-9_]*(/[A-Za-z_][A-Za-z0-9_]*)*)$").expect("static regex")
    })
}

/// 解析选择列表；空字符串得到空列表
pub fn parse_select(input: &str) -> ODataResult<Vec<String>> {
    if input.trim().is_empty() {
        return Ok(Vec::new());
    }
    let parts = split_top_level(input, ',').map_err(|offset| {
        ODataError::invalid_option(format!("unbalanced $select at offset {}", offset))
    })?;
    let mut items: Vec<String> = Vec::with_capacity(parts.len());
    for part in parts {
        if !select_item().is_match(part) {
            return Err(ODataError::invalid_option(format!(
                "invalid $select item '{}'",
                part
            )));
        }
        if !items.iter().any(|i| i == part) {
            items.push(part.to_string());
        }
    }
    Ok(items)
}

pub fn is_select_all(select: &[String]) -> bool {
    select.iter().any(|s| s == "*")
}
