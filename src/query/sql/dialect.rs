//! SQL 方言
//!
//! 标识符引用、类型名映射与占位符编号。片段内部统一使用 `?`，
//! PostgreSQL 在语句组装完成后重新编号为 `$n`。

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

use crate::core::metadata::PropertyType;

/// 目标数据库方言
///
/// 两种方言都用双引号引用标识符。SQLite 同样接受 ANSI 双引号，
/// 反引号与方括号只是它的兼容写法，这里不生成。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    #[default]
    Sqlite,
    Postgres,
}

const RESERVED_WORDS: &[&str] = &[
    "all", "and", "as", "asc", "between", "by", "case", "check", "column", "create", "default",
    "delete", "desc", "distinct", "drop", "else", "end", "exists", "from", "group", "having", "in",
    "index", "insert", "into", "is", "join", "key", "like", "limit", "not", "null", "offset", "on",
    "or", "order", "primary", "references", "select", "set", "table", "then", "to", "union",
    "unique", "update", "user", "using", "values", "when", "where",
];

fn plain_identifier() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z_][a-z0-9_]*$").expect("static regex"))
}

impl SqlDialect {
    pub fn name(&self) -> &'static str {
        match self {
            SqlDialect::Sqlite => "sqlite",
            SqlDialect::Postgres => "postgres",
        }
    }

    /// 总是加引号
    pub fn quote(&self, identifier: &str) -> String {
        format!("\"{}\"", identifier.replace('"', "\"\""))
    }

    /// 只在必要时加引号：含大写或特殊字符，或者是保留字
    pub fn quote_if_needed(&self, identifier: &str) -> String {
        if plain_identifier().is_match(identifier) && !RESERVED_WORDS.contains(&identifier) {
            identifier.to_string()
        } else {
            self.quote(identifier)
        }
    }

    /// `qualifier.column`，两部分都按需加引号
    pub fn column(&self, qualifier: Option<&str>, column: &str) -> String {
        match qualifier {
            Some(q) => format!("{}.{}", self.quote_if_needed(q), self.quote_if_needed(column)),
            None => self.quote_if_needed(column),
        }
    }

    /// `FROM` 中的表，别名与表名不同时追加 `AS alias`
    pub fn table_ref(&self, table: &str, alias: &str) -> String {
        if table == alias {
            self.quote_if_needed(table)
        } else {
            format!("{} AS {}", self.quote_if_needed(table), self.quote_if_needed(alias))
        }
    }

    pub fn cast_type(&self, target: PropertyType) -> &'static str {
        match self {
            SqlDialect::Sqlite => match target {
                t if t.is_integer() => "INTEGER",
                PropertyType::Boolean => "INTEGER",
                PropertyType::Decimal => "NUMERIC",
                PropertyType::Double | PropertyType::Single => "REAL",
                PropertyType::Binary => "BLOB",
                _ => "TEXT",
            },
            SqlDialect::Postgres => match target {
                PropertyType::Byte | PropertyType::SByte | PropertyType::Int16 => "SMALLINT",
                PropertyType::Int32 => "INTEGER",
                PropertyType::Int64 => "BIGINT",
                PropertyType::UInt64 | PropertyType::Decimal => "NUMERIC",
                PropertyType::Double => "DOUBLE PRECISION",
                PropertyType::Single => "REAL",
                PropertyType::Boolean => "BOOLEAN",
                PropertyType::Date => "DATE",
                PropertyType::TimeOfDay => "TIME",
                PropertyType::DateTimeOffset => "TIMESTAMPTZ",
                PropertyType::Duration => "INTERVAL",
                PropertyType::Guid => "UUID",
                PropertyType::Binary => "BYTEA",
                _ => "TEXT",
            },
        }
    }

    /// 浮点除法（`divby`）使用的类型
    pub fn real_type(&self) -> &'static str {
        match self {
            SqlDialect::Sqlite => "REAL",
            SqlDialect::Postgres => "DOUBLE PRECISION",
        }
    }

    /// 把 `?` 重新编号为方言占位符；字符串与带引号的标识符中的 `?` 不变
    pub fn renumber_placeholders(&self, sql: &str) -> String {
        if *self == SqlDialect::Sqlite {
            return sql.to_string();
        }
        let mut out = String::with_capacity(sql.len() + 8);
        let mut n = 0usize;
        let mut quote: Option<char> = None;
        for c in sql.chars() {
            match (quote, c) {
                (None, '\'') | (None, '"') => {
                    quote = Some(c);
                    out.push(c);
                }
                (Some(q), c) if c == q => {
                    quote = None;
                    out.push(c);
                }
                (None, '?') => {
                    n += 1;
                    out.push('$');
                    out.push_str(&n.to_string());
                }
                _ => out.push(c),
            }
        }
        out
    }
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 统计引号之外的 `?` 个数
pub fn count_placeholders(sql: &str) -> usize {
    let mut count = 0;
    let mut quote: Option<char> = None;
    for c in sql.chars() {
        match (quote, c) {
            (None, '\'') | (None, '"') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            (None, '?') => count += 1,
            _ => {}
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_if_needed() {
        let d = SqlDialect::Sqlite;
        assert_eq!(d.quote_if_needed("price"), "price");
        assert_eq!(d.quote_if_needed("order"), "\"order\"");
        assert_eq!(d.quote_if_needed("Price"), "\"Price\"");
        assert_eq!(d.column(Some("products"), "id"), "products.id");
        assert_eq!(d.table_ref("categories", "categories_1"), "categories AS categories_1");
    }

    #[test]
    fn test_both_dialects_use_double_quotes() {
        for d in [SqlDialect::Sqlite, SqlDialect::Postgres] {
            assert_eq!(d.quote("Unit Price"), "\"Unit Price\"");
            assert_eq!(d.quote("a\"b"), "\"a\"\"b\"");
        }
    }

    #[test]
    fn test_renumber_skips_quoted() {
        let sql = "a = ? AND b LIKE '?%' AND c IN (?, ?)";
        assert_eq!(
            SqlDialect::Postgres.renumber_placeholders(sql),
            "a = $1 AND b LIKE '?%' AND c IN ($2, $3)"
        );
        assert_eq!(SqlDialect::Sqlite.renumber_placeholders(sql), sql);
        assert_eq!(count_placeholders(sql), 3);
    }

    #[test]
    fn test_cast_types() {
        assert_eq!(SqlDialect::Sqlite.cast_type(PropertyType::Int32), "INTEGER");
        assert_eq!(SqlDialect::Postgres.cast_type(PropertyType::Int64), "BIGINT");
        assert_eq!(SqlDialect::Postgres.cast_type(PropertyType::Double), "DOUBLE PRECISION");
    }
}
