//! 参数化 SQL 片段

use std::fmt;

use super::dialect::count_placeholders;
use crate::core::Value;

/// SQL 文本与按顺序绑定的参数；占位符统一为 `?`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SqlFragment {
    pub sql: String,
    pub args: Vec<Value>,
}

impl SqlFragment {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(sql: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    pub fn push_str(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    /// 追加一个占位符并绑定值
    pub fn bind(&mut self, value: Value) -> &mut Self {
        self.sql.push('?');
        self.args.push(value);
        self
    }

    pub fn push_fragment(&mut self, other: &SqlFragment) -> &mut Self {
        self.sql.push_str(&other.sql);
        self.args.extend(other.args.iter().cloned());
        self
    }

    /// 用分隔符连接多个片段
    pub fn join(parts: &[SqlFragment], separator: &str) -> SqlFragment {
        let mut out = SqlFragment::default();
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                out.push_str(separator);
            }
            out.push_fragment(part);
        }
        out
    }

    /// `(sql)`
    pub fn parenthesized(&self) -> SqlFragment {
        SqlFragment {
            sql: format!("({})", self.sql),
            args: self.args.clone(),
        }
    }

    pub fn placeholder_count(&self) -> usize {
        count_placeholders(&self.sql)
    }

    /// 占位符个数与参数个数一致
    pub fn is_consistent(&self) -> bool {
        self.placeholder_count() == self.args.len()
    }
}

impl fmt::Display for SqlFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}
